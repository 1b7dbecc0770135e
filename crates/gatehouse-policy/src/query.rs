//! Prepared queries and evaluation.

use crate::document::PolicyHandle;
use crate::error::PolicyError;
use crate::facts::FactSet;
use biscuit_auth::AuthorizerLimits;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*([a-z_][A-Za-z0-9_]*)\s*=\s*data\.([A-Za-z_][A-Za-z0-9_.]*)\.([A-Za-z_][A-Za-z0-9_]*)\s*$",
    )
    .expect("query pattern is valid")
});

/// Upper bound on one evaluation. The rules are tiny; hitting this means the
/// document is wrong, and the call is denied.
const MAX_EVALUATION_TIME: Duration = Duration::from_millis(100);

/// A query expression (`result = data.<package>.<rule>`) bound to a document.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    document: PolicyHandle,
    expression: String,
    variable: String,
    rule: String,
}

impl PreparedQuery {
    /// Bind `expression` to `document`, checking that the package matches and
    /// that the rule exists.
    pub fn prepare(document: &PolicyHandle, expression: &str) -> Result<Self, PolicyError> {
        let caps = QUERY.captures(expression).ok_or_else(|| {
            PolicyError::query(expression, "expected `<var> = data.<package>.<rule>`")
        })?;
        let (variable, package, rule) = (&caps[1], &caps[2], &caps[3]);

        if package != document.package() {
            return Err(PolicyError::query(
                expression,
                format!(
                    "package {package} does not match policy {} ({})",
                    document.name(),
                    document.package()
                ),
            ));
        }
        if !document.defines(rule) {
            return Err(PolicyError::query(
                expression,
                format!("policy {} defines no rule {rule}", document.name()),
            ));
        }

        Ok(Self {
            document: document.clone(),
            expression: expression.trim().to_string(),
            variable: variable.to_string(),
            rule: rule.to_string(),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Run the rule against `facts` and return the bound boolean.
    ///
    /// No binding means `false`. Conflicting bindings or a non-boolean
    /// binding are evaluation errors.
    pub fn evaluate(&self, facts: &dyn FactSet) -> Result<bool, PolicyError> {
        let fail = |e: &dyn ToString| PolicyError::evaluation(&self.expression, e.to_string());

        let mut builder = self.document.authorizer().set_limits(AuthorizerLimits {
            max_time: MAX_EVALUATION_TIME,
            ..Default::default()
        });
        for fact in facts.to_facts()? {
            builder = builder.fact(fact).map_err(|e| fail(&e))?;
        }
        let mut authorizer = builder.build_unauthenticated().map_err(|e| fail(&e))?;

        let query = format!("{}($result) <- {}($result)", self.variable, self.rule);
        let bindings: Vec<(bool,)> = authorizer.query(query.as_str()).map_err(|e| fail(&e))?;

        match bindings.as_slice() {
            [] => Ok(false),
            [(decision,)] => Ok(*decision),
            _ => Err(PolicyError::evaluation(
                &self.expression,
                format!("{} conflicting bindings", bindings.len()),
            )),
        }
    }

    /// [`evaluate`](Self::evaluate), with every failure counted as a denial.
    pub fn decide(&self, facts: &dyn FactSet) -> bool {
        match self.evaluate(facts) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(query = %self.expression, error = %e, "policy evaluation failed, denying");
                false
            }
        }
    }
}
