//! Command implementations for the `gatehouse` CLI.

pub mod check;
pub mod keys;
pub mod token;

use anyhow::Context;
use gatehouse_token::KeyPair;
use std::fs;
use std::path::Path;

/// The public key PEM in `path`. A private key file yields its public half.
pub fn read_public_key(path: &Path) -> anyhow::Result<String> {
    let pem = fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    if pem.contains("PRIVATE KEY") {
        let keypair = KeyPair::from_private_key_pem("cli", &pem)
            .with_context(|| format!("parsing private key {}", path.display()))?;
        return Ok(keypair.public_key_pem().to_string());
    }
    Ok(pem)
}
