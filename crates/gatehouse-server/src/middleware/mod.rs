//! The standard stages.
//!
//! Canonical order for a guarded route:
//!
//! ```text
//! Logger → Errors → Metrics → Panics → Authenticate → Authorize → handler
//! ```

pub mod auth;
pub mod errors;
pub mod logger;
pub mod metrics;
pub mod panics;

pub use auth::{Authenticate, Authorize};
pub use errors::Errors;
pub use logger::Logger;
pub use metrics::Metrics;
pub use panics::Panics;
