//! # gatehouse-core
//!
//! Configuration and user records shared by the Gatehouse server and CLI.

pub mod config;
pub mod user;

pub use config::{AppConfig, ConfigError, load_config};
pub use user::{NewUser, User, UserError, UserStore, UserView};
