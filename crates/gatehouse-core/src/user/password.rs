//! Password hashing and credential checks.

use super::{NewUser, ROLE_ADMIN, ROLE_USER, User, UserError, UserStore};
use crate::config::AdminConfig;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};

/// Hash a password with Argon2 and a random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

/// Check a password against a PHC hash. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Run CPU-heavy credential work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, UserError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| UserError::PasswordHash(format!("hashing task failed: {e}")))
}

/// [`User::create`], with the password hashed off the async worker.
pub async fn create_user(new: NewUser, now: DateTime<Utc>) -> Result<User, UserError> {
    blocking(move || User::create(new, now)).await?
}

/// Look up a user by email and check the password.
///
/// Every failure, including a disabled account, is
/// [`UserError::AuthenticationFailed`].
pub async fn authenticate(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<User, UserError> {
    let user = match store.query_by_email(email).await {
        Ok(user) => user,
        Err(UserError::NotFound) => return Err(UserError::AuthenticationFailed),
        Err(e) => return Err(e),
    };

    let (candidate, hash) = (password.to_string(), user.password_hash.clone());
    if !blocking(move || verify_password(&candidate, &hash)).await? {
        return Err(UserError::AuthenticationFailed);
    }
    if !user.enabled {
        tracing::info!(user_id = %user.id, "sign-in attempt on disabled account");
        return Err(UserError::AuthenticationFailed);
    }
    Ok(user)
}

/// On startup, if the store is empty, create an admin user.
///
/// Password source (highest precedence first):
/// - env `GATEHOUSE_ADMIN_PASSWORD`
/// - `[auth.admin].password`
///
/// Returns the created user, or `None` when nothing was done.
pub async fn bootstrap_admin(
    store: &dyn UserStore,
    admin: &AdminConfig,
) -> Result<Option<User>, UserError> {
    if store.count().await? > 0 {
        return Ok(None);
    }

    let Some(password) = admin.password() else {
        tracing::warn!("user store is empty and no admin password is configured");
        return Ok(None);
    };

    let user = create_user(
        NewUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            roles: vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()],
            department: None,
            password,
        },
        Utc::now(),
    )
    .await?;
    store.create(user.clone()).await?;

    tracing::warn!(user_id = %user.id, email = %user.email, "bootstrapped admin user");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::MemoryUserStore;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn admin_config(password: &str) -> AdminConfig {
        AdminConfig {
            password: Some(password.to_string()),
            ..AdminConfig::default()
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not a hash"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_the_worker_free() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = ticks.clone();
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        });

        // On a single-threaded runtime the ticker only runs if hashing yields.
        let user = create_user(
            NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                roles: vec![ROLE_USER.into()],
                department: None,
                password: "analytical-engine".into(),
            },
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(ticks.load(Ordering::SeqCst) > 0);
        assert!(verify_password("analytical-engine", &user.password_hash));

        ticker.abort();
    }

    #[tokio::test]
    async fn test_create_user_validates_first() {
        let err = create_user(
            NewUser {
                name: "Ada".into(),
                email: "not-an-email".into(),
                roles: vec![ROLE_USER.into()],
                department: None,
                password: "analytical-engine".into(),
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserError::Validation { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_bootstrap_then_authenticate() {
        let store = MemoryUserStore::new();
        let admin = bootstrap_admin(&store, &admin_config("gophers-rule"))
            .await
            .unwrap()
            .unwrap();
        assert!(admin.has_role(ROLE_ADMIN));

        let user = authenticate(&store, "admin@example.com", "gophers-rule")
            .await
            .unwrap();
        assert_eq!(user.id, admin.id);

        // Second run is a no-op.
        assert!(
            bootstrap_admin(&store, &admin_config("other-password"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_authentication_failures_look_alike() {
        let store = MemoryUserStore::new();
        bootstrap_admin(&store, &admin_config("gophers-rule"))
            .await
            .unwrap();

        for (email, password) in [
            ("admin@example.com", "wrong-password"),
            ("nobody@example.com", "gophers-rule"),
        ] {
            let err = authenticate(&store, email, password).await.unwrap_err();
            assert!(matches!(err, UserError::AuthenticationFailed), "{email}");
        }
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_sign_in() {
        let store = MemoryUserStore::new();
        let mut user = User::create(
            NewUser {
                name: "Off".into(),
                email: "off@example.com".into(),
                roles: vec![ROLE_USER.into()],
                department: None,
                password: "gophers-rule".into(),
            },
            Utc::now(),
        )
        .unwrap();
        user.enabled = false;
        store.create(user).await.unwrap();

        let err = authenticate(&store, "off@example.com", "gophers-rule")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::AuthenticationFailed));
    }
}
