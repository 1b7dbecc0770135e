//! The process-wide pair of authentication and authorization policies.

use crate::document::{PolicyDocument, PolicyHandle};
use crate::error::PolicyError;
use crate::facts::{AuthenticationFacts, AuthorizationFacts};
use crate::query::PreparedQuery;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Built-in authentication policy.
pub const AUTHENTICATION_POLICY: &str = include_str!("../policies/authentication.datalog");

/// Built-in authorization policy.
pub const AUTHORIZATION_POLICY: &str = include_str!("../policies/authorization.datalog");

/// Query the authentication policy answers.
pub const AUTHENTICATION_QUERY: &str = "x = data.gatehouse.authentication.auth";

const AUTHORIZATION_PACKAGE: &str = "gatehouse.authorization";

/// Capability a route requires, i.e. which authorization rule to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    /// Any authenticated subject.
    Any,
    /// `ADMIN` role.
    AdminOnly,
    /// `USER` role.
    UserOnly,
    /// `ADMIN`, or `USER` acting on their own record.
    AdminOrSubject,
}

impl Rule {
    pub const ALL: [Rule; 4] = [
        Rule::Any,
        Rule::AdminOnly,
        Rule::UserOnly,
        Rule::AdminOrSubject,
    ];

    /// Rule name inside the authorization policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Any => "rule_any",
            Rule::AdminOnly => "rule_admin_only",
            Rule::UserOnly => "rule_user_only",
            Rule::AdminOrSubject => "rule_admin_or_subject",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rule {
    type Err = String;

    /// Accepts both `admin_only` and `rule_admin_only`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("rule_").unwrap_or(s);
        match name {
            "any" => Ok(Rule::Any),
            "admin_only" => Ok(Rule::AdminOnly),
            "user_only" => Ok(Rule::UserOnly),
            "admin_or_subject" => Ok(Rule::AdminOrSubject),
            _ => Err(format!(
                "unknown rule '{s}' (expected any, admin_only, user_only or admin_or_subject)"
            )),
        }
    }
}

/// Both policies, loaded and prepared. Read-only once built.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    authentication: PreparedQuery,
    authorization: BTreeMap<Rule, PreparedQuery>,
}

impl PolicyStore {
    /// The policies compiled into the binary.
    pub fn embedded() -> Result<Self, PolicyError> {
        Self::from_sources(AUTHENTICATION_POLICY, AUTHORIZATION_POLICY)
    }

    /// Load both policies from text.
    pub fn from_sources(authentication: &str, authorization: &str) -> Result<Self, PolicyError> {
        let authentication = PolicyDocument::load("authentication", authentication)?;
        let authorization = PolicyDocument::load("authorization", authorization)?;
        Self::from_documents(&authentication, &authorization)
    }

    /// Use the given files where present, the built-in text otherwise.
    pub fn load(
        authentication: Option<&Path>,
        authorization: Option<&Path>,
    ) -> Result<Self, PolicyError> {
        let authentication = match authentication {
            Some(path) => PolicyDocument::load_file(path)?,
            None => PolicyDocument::load("authentication", AUTHENTICATION_POLICY)?,
        };
        let authorization = match authorization {
            Some(path) => PolicyDocument::load_file(path)?,
            None => PolicyDocument::load("authorization", AUTHORIZATION_POLICY)?,
        };
        Self::from_documents(&authentication, &authorization)
    }

    fn from_documents(
        authentication: &PolicyHandle,
        authorization: &PolicyHandle,
    ) -> Result<Self, PolicyError> {
        let authentication = PreparedQuery::prepare(authentication, AUTHENTICATION_QUERY)?;

        let authorization = Rule::ALL
            .into_iter()
            .map(|rule| {
                let expression = format!("x = data.{AUTHORIZATION_PACKAGE}.{rule}");
                PreparedQuery::prepare(authorization, &expression).map(|query| (rule, query))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        tracing::info!(
            authentication = %authentication.expression(),
            rules = authorization.len(),
            "policies prepared"
        );

        Ok(Self {
            authentication,
            authorization,
        })
    }

    /// Whether the token in `facts` is acceptable. Errors deny.
    pub fn authenticate(&self, facts: &AuthenticationFacts) -> bool {
        self.authentication.decide(facts)
    }

    /// Whether `facts` satisfy `rule`. Errors deny.
    pub fn authorize(&self, rule: Rule, facts: &AuthorizationFacts) -> bool {
        self.authorization
            .get(&rule)
            .is_some_and(|query| query.decide(facts))
    }

    pub fn authentication_query(&self) -> &PreparedQuery {
        &self.authentication
    }

    pub fn authorization_query(&self, rule: Rule) -> Option<&PreparedQuery> {
        self.authorization.get(&rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(roles: &[&str], subject: &str, user_id: Option<&str>) -> AuthorizationFacts {
        let facts = AuthorizationFacts::new(roles.iter().map(|r| r.to_string()).collect(), subject);
        match user_id {
            Some(id) => facts.with_user_id(id),
            None => facts,
        }
    }

    #[test]
    fn test_embedded_policies_load() {
        let store = PolicyStore::embedded().unwrap();
        for rule in Rule::ALL {
            assert!(store.authorization_query(rule).is_some(), "{rule}");
        }
    }

    #[test]
    fn test_admin_only() {
        let store = PolicyStore::embedded().unwrap();
        assert!(store.authorize(Rule::AdminOnly, &facts(&["ADMIN"], "1", None)));
        assert!(!store.authorize(Rule::AdminOnly, &facts(&["USER"], "1", None)));
        assert!(!store.authorize(Rule::AdminOnly, &facts(&[], "1", None)));
    }

    #[test]
    fn test_user_only() {
        let store = PolicyStore::embedded().unwrap();
        assert!(store.authorize(Rule::UserOnly, &facts(&["USER"], "1", None)));
        assert!(!store.authorize(Rule::UserOnly, &facts(&["ADMIN"], "1", None)));
    }

    #[test]
    fn test_admin_or_subject() {
        let store = PolicyStore::embedded().unwrap();
        let rule = Rule::AdminOrSubject;

        assert!(store.authorize(rule, &facts(&["ADMIN"], "1", Some("2"))));
        assert!(store.authorize(rule, &facts(&["USER"], "2", Some("2"))));
        assert!(!store.authorize(rule, &facts(&["USER"], "1", Some("2"))));
        assert!(!store.authorize(rule, &facts(&["USER"], "1", None)));
        assert!(!store.authorize(rule, &facts(&[], "2", Some("2"))));
    }

    #[test]
    fn test_any_needs_a_subject() {
        let store = PolicyStore::embedded().unwrap();
        assert!(store.authorize(Rule::Any, &facts(&[], "1", None)));
        assert!(!store.authorize(Rule::Any, &facts(&["ADMIN"], "", None)));
    }

    #[test]
    fn test_rule_names_parse() {
        assert_eq!("admin_only".parse::<Rule>().unwrap(), Rule::AdminOnly);
        assert_eq!("rule_admin_or_subject".parse::<Rule>().unwrap(), Rule::AdminOrSubject);
        assert!("root".parse::<Rule>().is_err());
    }

    #[test]
    fn test_override_must_keep_every_rule() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authorization.datalog");
        std::fs::write(
            &path,
            "package gatehouse.authorization;\nrule_admin_only(true) <- role(\"ADMIN\");\n",
        )
        .unwrap();

        let err = PolicyStore::load(None, Some(&path)).unwrap_err();
        assert!(matches!(err, PolicyError::Query { .. }));
    }

    #[test]
    fn test_override_changes_decision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authorization.datalog");
        let stricter = AUTHORIZATION_POLICY.replace(
            "rule_admin_only(true) <- role(\"ADMIN\");",
            "rule_admin_only(true) <- role(\"ADMIN\"), role(\"AUDITED\");",
        );
        std::fs::write(&path, stricter).unwrap();

        let store = PolicyStore::load(None, Some(&path)).unwrap();
        assert!(!store.authorize(Rule::AdminOnly, &facts(&["ADMIN"], "1", None)));
        assert!(store.authorize(Rule::AdminOnly, &facts(&["ADMIN", "AUDITED"], "1", None)));
    }

    #[test]
    fn test_bad_override_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authentication.datalog");
        std::fs::write(&path, "package gatehouse.authentication;\nauth(true) <- ").unwrap();

        let err = PolicyStore::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, PolicyError::Compile { .. }));
    }
}
