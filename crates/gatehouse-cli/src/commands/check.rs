//! `gatehouse token check`: one token through every gate a guarded route
//! would apply.

use super::read_public_key;
use super::token::SingleKey;
use anyhow::{Context, anyhow};
use gatehouse_core::AppConfig;
use gatehouse_policy::{AuthenticationFacts, AuthorizationFacts, PolicyStore, Rule};
use gatehouse_token::TokenVerifier;
use std::fmt;
use std::path::Path;

/// Outcome of one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Outcomes in evaluation order. Stops at the first failure.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub stages: Vec<StageOutcome>,
}

impl CheckReport {
    fn record(&mut self, stage: &'static str, passed: bool, detail: impl Into<String>) -> bool {
        self.stages.push(StageOutcome {
            stage,
            passed,
            detail: detail.into(),
        });
        passed
    }

    /// True when every gate passed.
    pub fn allowed(&self) -> bool {
        !self.stages.is_empty() && self.stages.iter().all(|s| s.passed)
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.stages {
            let mark = if outcome.passed { "pass" } else { "FAIL" };
            writeln!(f, "[{mark}] {:<14} {}", outcome.stage, outcome.detail)?;
        }
        let verdict = if self.allowed() { "allowed" } else { "denied" };
        writeln!(f, "=> {verdict}")
    }
}

/// Verify `token`, then evaluate the authentication policy and `rule`.
///
/// Policy files named in `config` replace the built-in ones.
pub fn run(
    config: &AppConfig,
    key: &Path,
    token: &str,
    issuer: &str,
    rule: &str,
    user_id: Option<&str>,
) -> anyhow::Result<CheckReport> {
    let rule: Rule = rule.parse().map_err(|e: String| anyhow!(e))?;
    let public_key_pem = read_public_key(key)?;
    let policies = PolicyStore::load(
        config.policy.authentication_file.as_deref(),
        config.policy.authorization_file.as_deref(),
    )
    .context("loading policies")?;
    let token = token.trim();

    let mut report = CheckReport::default();

    let claims = match TokenVerifier::default().verify(token, &SingleKey(public_key_pem.clone())) {
        Ok(claims) => {
            report.record(
                "verify",
                true,
                format!("sub={} iss={} roles={:?}", claims.sub, claims.iss, claims.roles),
            );
            claims
        }
        Err(e) => {
            report.record("verify", false, e.to_string());
            return Ok(report);
        }
    };

    let facts = AuthenticationFacts::new(public_key_pem, token, issuer);
    let authenticated = policies.authentication_query().evaluate(&facts);
    let passed = matches!(authenticated, Ok(true));
    let detail = match authenticated {
        Ok(true) => format!("issuer {issuer} accepted"),
        Ok(false) => format!("rejected (expected issuer {issuer})"),
        Err(e) => e.to_string(),
    };
    if !report.record("authenticate", passed, detail) {
        return Ok(report);
    }

    let mut facts = AuthorizationFacts::new(claims.roles.clone(), claims.sub.as_str());
    if let Some(user_id) = user_id {
        facts = facts.with_user_id(user_id);
    }
    let authorized = policies
        .authorization_query(rule)
        .ok_or_else(|| anyhow!("no query prepared for {rule}"))?
        .evaluate(&facts);
    let detail = match &authorized {
        Ok(true) => format!("{rule} granted"),
        Ok(false) => format!("{rule} denied"),
        Err(e) => e.to_string(),
    };
    report.record("authorize", matches!(authorized, Ok(true)), detail);

    Ok(report)
}
