//! `gatehouse keys generate`

use anyhow::Context;
use gatehouse_token::KeyPair;
use std::fs;
use std::path::{Path, PathBuf};

/// Generate a keypair and either save it under `output` or print it.
pub fn generate(output: Option<PathBuf>, bits: usize) -> anyhow::Result<()> {
    let keypair = KeyPair::generate_with_bits("private", bits)?;

    match output {
        Some(dir) => {
            let (private_path, public_path) = save(&keypair, &dir)?;
            println!("Generated {bits}-bit RSA keypair:");
            println!("  Private key: {}", private_path.display());
            println!("  Public key:  {}", public_path.display());
            println!();
            println!("Keep the private key out of version control.");
            println!("Tokens signed with it carry the key id \"private\".");
        }
        None => {
            println!("{}", keypair.private_key_pem().trim_end());
            println!("{}", keypair.public_key_pem().trim_end());
        }
    }
    Ok(())
}

/// Write `private.pem` and `public.pem` into `dir`, creating it if needed.
fn save(keypair: &KeyPair, dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let private_path = dir.join("private.pem");
    let public_path = dir.join("public.pem");
    keypair.save_to_files(&private_path, &public_path)?;
    Ok((private_path, public_path))
}
