//! User store selection.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where user records live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserBackend {
    /// Process memory; lost on restart.
    #[default]
    Memory,
    /// A JSON file rewritten on every change.
    File,
}

/// `[users]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsersConfig {
    #[serde(default)]
    pub backend: UserBackend,

    /// Path of the JSON file for the `file` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}
