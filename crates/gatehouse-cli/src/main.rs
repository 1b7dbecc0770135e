mod commands;

use clap::{Parser, Subcommand};
use gatehouse_core::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about = "Gatehouse operator CLI")]
struct Cli {
    /// Config file; supplies defaults such as the issuer and policy files.
    #[arg(long, global = true, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signing key management
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Issue, verify and check tokens
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate an RSA keypair. Prints both PEMs unless --output is given.
    Generate {
        /// Directory for private.pem and public.pem
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Sign a token with a private key file
    Issue {
        /// Private key PEM; the key id is the file stem
        #[arg(long)]
        key: PathBuf,

        #[arg(long)]
        subject: String,

        /// Defaults to the configured issuer
        #[arg(long)]
        issuer: Option<String>,

        /// Role claim; repeat for several
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Lifetime, e.g. "8760h" or "30d"
        #[arg(long, default_value = "8760h")]
        ttl: String,
    },

    /// Verify a token's signature and validity window
    Verify {
        /// Public (or private) key PEM
        #[arg(long = "public-key")]
        public_key: PathBuf,

        token: String,
    },

    /// Walk a token through verification and both policies
    Check {
        /// Public (or private) key PEM
        #[arg(long)]
        key: PathBuf,

        token: String,

        /// Authorization rule, e.g. admin_only
        #[arg(long, default_value = "admin_only")]
        rule: String,

        /// Targeted user id for rules that compare it with the subject
        #[arg(long)]
        user_id: Option<String>,

        /// Defaults to the configured issuer
        #[arg(long)]
        issuer: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.cmd {
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { output, bits } => commands::keys::generate(output, bits)?,
        },

        Command::Token { cmd } => match cmd {
            TokenCommand::Issue {
                key,
                subject,
                issuer,
                roles,
                ttl,
            } => {
                let issuer = issuer.unwrap_or_else(|| config.auth.issuer.clone());
                let token = commands::token::issue(&key, &subject, &issuer, roles, &ttl)?;
                println!("{token}");
            }
            TokenCommand::Verify { public_key, token } => {
                let claims = commands::token::verify(&public_key, &token)?;
                println!("{}", serde_json::to_string_pretty(&claims)?);
            }
            TokenCommand::Check {
                key,
                token,
                rule,
                user_id,
                issuer,
            } => {
                let issuer = issuer.unwrap_or_else(|| config.auth.issuer.clone());
                let report = commands::check::run(
                    &config,
                    &key,
                    &token,
                    &issuer,
                    &rule,
                    user_id.as_deref(),
                )?;
                print!("{report}");
                if !report.allowed() {
                    std::process::exit(1);
                }
            }
        },
    }

    Ok(())
}
