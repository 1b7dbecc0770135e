//! Shared service state, built once at startup.

use crate::error::ErrorClassifier;
use crate::gateway::AuthGateway;
use crate::metrics::Metrics;
use anyhow::Context;
use gatehouse_core::AppConfig;
use gatehouse_core::user::{UserStore, bootstrap_admin, create_store};
use gatehouse_policy::PolicyStore;
use gatehouse_token::{Algorithm, KeyPair, KeyStore, TokenIssuer, TokenVerifier};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Key id used when no private key file is configured.
pub const EPHEMERAL_KID: &str = "ephemeral";

/// Everything handlers and stages need. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AuthGateway>,
    pub tokens: TokenIssuer,
    pub users: Arc<dyn UserStore>,
    pub metrics: Arc<Metrics>,
    pub classifier: ErrorClassifier,
    pub token_ttl: Duration,
}

impl AppState {
    /// Load keys, policies and users as configured.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        cfg.validate()?;

        let keypair = match &cfg.auth.private_key_file {
            Some(path) => KeyPair::load_from_file(path)
                .with_context(|| format!("loading signing key {}", path.display()))?,
            None => {
                tracing::warn!("no private key configured; generating an ephemeral signing key");
                KeyPair::generate(EPHEMERAL_KID)?
            }
        };
        let keypair = Arc::new(keypair);

        let mut keys = KeyStore::from_key_pair(&keypair, &cfg.auth.issuer);
        for path in &cfg.auth.public_key_files {
            let kid = keys
                .load_public_key_file(path)
                .with_context(|| format!("loading public key {}", path.display()))?;
            tracing::info!(kid = %kid, "trusting additional public key");
        }

        let policies = PolicyStore::load(
            cfg.policy.authentication_file.as_deref(),
            cfg.policy.authorization_file.as_deref(),
        )
        .context("loading policies")?;

        let algorithms = cfg
            .auth
            .algorithms
            .iter()
            .map(|name| Algorithm::from_str(name).with_context(|| format!("algorithm {name}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let verifier = TokenVerifier::new(algorithms.clone()).with_leeway(cfg.auth.leeway_secs);

        let mut tokens = TokenIssuer::new(keypair.clone());
        if let Some(first) = algorithms.first() {
            tokens = tokens.with_algorithm(*first);
        }

        let users = create_store(&cfg.users).context("opening user store")?;
        bootstrap_admin(users.as_ref(), &cfg.auth.admin).await?;

        tracing::info!(
            kid = %keypair.kid(),
            issuer = %cfg.auth.issuer,
            algorithms = ?verifier.algorithms(),
            "auth gateway ready"
        );
        let gateway = AuthGateway::new(verifier, Arc::new(keys), Arc::new(policies), &cfg.auth.issuer);

        Ok(Self {
            gateway: Arc::new(gateway),
            tokens,
            users,
            metrics: Arc::new(Metrics::new()),
            classifier: ErrorClassifier::new(cfg.server.forbidden_as_unauthorized),
            token_ttl: cfg.auth.token_ttl()?,
        })
    }

    /// Assemble state from ready-made parts, with default counters and
    /// classification.
    pub fn from_parts(
        gateway: AuthGateway,
        tokens: TokenIssuer,
        users: Arc<dyn UserStore>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            gateway: Arc::new(gateway),
            tokens,
            users,
            metrics: Arc::new(Metrics::new()),
            classifier: ErrorClassifier::default(),
            token_ttl,
        }
    }

    /// Render authorization denials as 403 instead of 401.
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Issuer every accepted token must carry.
    pub fn issuer(&self) -> &str {
        self.gateway.issuer()
    }
}
