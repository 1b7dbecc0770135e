//! # gatehouse-policy
//!
//! Declarative authentication and authorization decisions.
//!
//! A policy is Datalog text under a `package a.b;` header. It is loaded once,
//! prepared against a query of the form `x = data.<package>.<rule>`, then
//! evaluated against a small typed fact set:
//!
//! - [`AuthenticationFacts`]: public key PEM, raw token, expected issuer
//! - [`AuthorizationFacts`]: roles, subject, targeted user id
//!
//! Evaluation is deterministic and does no IO. A missing binding, a
//! non-boolean binding or an evaluation error all mean "denied".
//!
//! ```ignore
//! let store = PolicyStore::embedded()?;
//! let ok = store.authorize(Rule::AdminOnly, &AuthorizationFacts::new(roles, subject));
//! ```

pub mod document;
pub mod error;
pub mod facts;
pub mod query;
pub mod store;

pub use document::{PolicyDocument, PolicyHandle};
pub use error::PolicyError;
pub use facts::{AuthenticationFacts, AuthorizationFacts, FactSet};
pub use query::PreparedQuery;
pub use store::{AUTHENTICATION_POLICY, AUTHORIZATION_POLICY, PolicyStore, Rule};
