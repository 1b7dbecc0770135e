//! Policy document sources.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[policy]` section. Unset files fall back to the built-in policies.
///
/// Files are read once at startup; edits need a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub authentication_file: Option<PathBuf>,

    #[serde(default)]
    pub authorization_file: Option<PathBuf>,
}
