//! User records.
//!
//! Users are only looked up after a caller has been authenticated (or while
//! exchanging a password for a token); the auth gateway itself never reads
//! them.

pub mod password;
pub mod store;

pub use password::{authenticate, bootstrap_admin, create_user, hash_password, verify_password};
pub use store::{FileUserStore, MemoryUserStore, UserStore, create_store};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Full administrative access.
pub const ROLE_ADMIN: &str = "ADMIN";

/// Access to the caller's own records.
pub const ROLE_USER: &str = "USER";

/// Errors raised by user storage and credential checks.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,

    #[error("email {0} is already in use")]
    Conflict(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// Unknown email, wrong password or disabled account. Deliberately
    /// indistinguishable.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("user storage failed: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UserError {
    fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(default)]
    pub department: Option<String>,
    pub enabled: bool,
    pub password_hash: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Data for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(default)]
    pub department: Option<String>,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), UserError> {
        if self.name.trim().is_empty() {
            return Err(UserError::validation("name", "is required"));
        }
        if !is_plausible_email(&self.email) {
            return Err(UserError::validation("email", "must be a valid email address"));
        }
        if self.roles.is_empty() {
            return Err(UserError::validation("roles", "at least one role is required"));
        }
        if let Some(role) = self
            .roles
            .iter()
            .find(|r| r.as_str() != ROLE_ADMIN && r.as_str() != ROLE_USER)
        {
            return Err(UserError::Validation {
                field: "roles".to_string(),
                message: format!("unknown role {role}"),
            });
        }
        if self.password.chars().count() < 8 {
            return Err(UserError::validation("password", "must be at least 8 characters"));
        }
        Ok(())
    }
}

impl User {
    /// Validate `new`, hash its password and build an enabled user.
    pub fn create(new: NewUser, now: DateTime<Utc>) -> Result<Self, UserError> {
        new.validate()?;
        let password_hash = hash_password(&new.password)?;

        Ok(Self {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            email: new.email.trim().to_lowercase(),
            roles: new.roles,
            department: new.department,
            enabled: true,
            password_hash,
            date_created: now,
            date_updated: now,
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The record without credential material.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            department: self.department.clone(),
            enabled: self.enabled,
            date_created: self.date_created,
            date_updated: self.date_updated,
        }
    }
}

/// What callers get to see of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub enabled: bool,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            name: "Bill Kennedy".into(),
            email: "Bill@Example.com ".into(),
            roles: vec![ROLE_USER.into()],
            department: None,
            password: "gophers-rule".into(),
        }
    }

    #[test]
    fn test_create_normalises_and_hashes() {
        let user = User::create(new_user(), Utc::now()).unwrap();
        assert_eq!(user.email, "bill@example.com");
        assert!(user.enabled);
        assert!(user.has_role(ROLE_USER));
        assert_ne!(user.password_hash, "gophers-rule");
        assert!(verify_password("gophers-rule", &user.password_hash));
    }

    #[test]
    fn test_validation_names_the_field() {
        let cases: [(fn(&mut NewUser), &str); 5] = [
            (|u| u.name = " ".into(), "name"),
            (|u| u.email = "nope".into(), "email"),
            (|u| u.roles.clear(), "roles"),
            (|u| u.roles = vec!["ROOT".into()], "roles"),
            (|u| u.password = "short".into(), "password"),
        ];

        for (mutate, expected) in cases {
            let mut new = new_user();
            mutate(&mut new);
            match new.validate() {
                Err(UserError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error on {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_view_has_no_password_hash() {
        let user = User::create(new_user(), Utc::now()).unwrap();
        let json = serde_json::to_string(&user.view()).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }
}
