//! Policy documents: named, immutable rule text.

use crate::error::PolicyError;
use biscuit_auth::builder::AuthorizerBuilder;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

static PACKAGE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*package\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*;\s*$")
        .expect("package header pattern is valid")
});

static RULE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\([^)]*\)\s*<-")
        .expect("rule head pattern is valid")
});

/// A loaded policy document.
///
/// The first non-blank line declares the package (`package a.b;`); the rest is
/// Datalog. The text is compiled once by [`PolicyDocument::load`] and never
/// changes afterwards, so a document can be shared freely between requests.
pub struct PolicyDocument {
    name: String,
    package: String,
    compiled: AuthorizerBuilder,
    heads: BTreeSet<String>,
}

impl fmt::Debug for PolicyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyDocument")
            .field("name", &self.name)
            .field("package", &self.package)
            .field("rules", &self.heads)
            .finish_non_exhaustive()
    }
}

/// Shared handle to a loaded document.
pub type PolicyHandle = Arc<PolicyDocument>;

impl PolicyDocument {
    /// Parse and compile `text`.
    pub fn load(name: impl Into<String>, text: &str) -> Result<PolicyHandle, PolicyError> {
        let name = name.into();

        let mut lines = text.lines();
        let header = lines
            .by_ref()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| PolicyError::compile(&name, "empty policy document"))?;
        let package = PACKAGE_HEADER
            .captures(header)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                PolicyError::compile(&name, "first line must be a `package <path>;` declaration")
            })?;

        let rules: String = lines.collect::<Vec<_>>().join("\n");

        let compiled = AuthorizerBuilder::new()
            .code(rules.as_str())
            .map_err(|e| PolicyError::compile(&name, e.to_string()))?;

        let heads: BTreeSet<String> = RULE_HEAD
            .captures_iter(&rules)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect();
        if heads.is_empty() {
            return Err(PolicyError::compile(&name, "document defines no rules"));
        }

        tracing::debug!(policy = %name, package = %package, rules = heads.len(), "loaded policy");

        Ok(Arc::new(Self {
            name,
            package,
            compiled,
            heads,
        }))
    }

    /// Load a document from a file. The document name is the file name.
    pub fn load_file(path: &Path) -> Result<PolicyHandle, PolicyError> {
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::load(name, &text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package path declared in the header, e.g. `gatehouse.authorization`.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Names of the rules this document defines.
    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.heads.iter().map(String::as_str)
    }

    pub fn defines(&self, rule: &str) -> bool {
        self.heads.contains(rule)
    }

    /// A fresh authorizer seeded with the compiled rules.
    pub(crate) fn authorizer(&self) -> AuthorizerBuilder {
        self.compiled.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_package_and_rules() {
        let doc = PolicyDocument::load(
            "authz",
            "\npackage app.authz;\n\nallow(true) <- role(\"ADMIN\");\nother(true) <- role(\"USER\");\n",
        )
        .unwrap();

        assert_eq!(doc.name(), "authz");
        assert_eq!(doc.package(), "app.authz");
        assert!(doc.defines("allow"));
        assert!(doc.defines("other"));
        assert!(!doc.defines("role"));
        assert_eq!(doc.rules().count(), 2);
    }

    #[test]
    fn test_missing_header_is_compile_error() {
        let err = PolicyDocument::load("p", "allow(true) <- role(\"ADMIN\");").unwrap_err();
        assert!(matches!(err, PolicyError::Compile { .. }));

        let err = PolicyDocument::load("p", "   \n").unwrap_err();
        assert!(matches!(err, PolicyError::Compile { .. }));
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let err = PolicyDocument::load("p", "package a;\nallow(true) <- role(\"ADMIN\"")
            .unwrap_err();
        assert!(matches!(err, PolicyError::Compile { ref name, .. } if name == "p"));
    }

    #[test]
    fn test_document_without_rules_is_rejected() {
        let err = PolicyDocument::load("p", "package a;\nrole(\"ADMIN\");").unwrap_err();
        assert!(matches!(err, PolicyError::Compile { .. }));
    }

    #[test]
    fn test_compiled_rules_are_reused() {
        let doc = PolicyDocument::load("p", "package a;\nok(true) <- subject(\"u\");").unwrap();

        for _ in 0..3 {
            let mut authorizer = doc
                .authorizer()
                .fact(biscuit_auth::macros::fact!("subject(\"u\")"))
                .unwrap()
                .build_unauthenticated()
                .unwrap();
            let found: Vec<(bool,)> = authorizer.query("x($r) <- ok($r)").unwrap();
            assert_eq!(found, vec![(true,)]);
        }
        assert!(format!("{doc:?}").contains("\"ok\""));
    }

    #[test]
    fn test_load_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.datalog");
        std::fs::write(&path, "package x.y;\nok(true) <- subject($s);\n").unwrap();

        let doc = PolicyDocument::load_file(&path).unwrap();
        assert_eq!(doc.name(), "custom.datalog");
        assert_eq!(doc.package(), "x.y");
    }
}
