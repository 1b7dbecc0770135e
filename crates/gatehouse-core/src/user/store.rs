//! User storage backends.

use super::{User, UserError};
use crate::config::{UserBackend, UsersConfig};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::RwLock as AsyncRwLock;
use uuid::Uuid;

/// Trait for user storage backends.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Store a new user. Emails are unique (case-insensitive).
    async fn create(&self, user: User) -> Result<(), UserError>;

    /// Get a user by id.
    async fn query_by_id(&self, id: Uuid) -> Result<User, UserError>;

    /// Get a user by email.
    async fn query_by_email(&self, email: &str) -> Result<User, UserError>;

    /// Number of stored users.
    async fn count(&self) -> Result<usize, UserError>;
}

/// Create a storage backend based on configuration.
pub fn create_store(config: &UsersConfig) -> Result<Arc<dyn UserStore>, UserError> {
    match config.backend {
        UserBackend::Memory => Ok(Arc::new(MemoryUserStore::new())),
        UserBackend::File => {
            let path = config
                .path
                .as_deref()
                .unwrap_or_else(|| Path::new("users.json"));
            Ok(Arc::new(FileUserStore::open(path)?))
        }
    }
}

type Users = BTreeMap<Uuid, User>;

fn lock_failed(e: impl std::fmt::Display) -> UserError {
    UserError::Storage(format!("user table lock poisoned: {e}"))
}

fn insert(users: &mut Users, user: User) -> Result<(), UserError> {
    if users
        .values()
        .any(|u| u.email.eq_ignore_ascii_case(&user.email))
    {
        return Err(UserError::Conflict(user.email));
    }
    users.insert(user.id, user);
    Ok(())
}

fn by_email(users: &Users, email: &str) -> Result<User, UserError> {
    let email = email.trim();
    users
        .values()
        .find(|u| u.email.eq_ignore_ascii_case(email))
        .cloned()
        .ok_or(UserError::NotFound)
}

/// In-memory storage; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Users>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: User) -> Result<(), UserError> {
        let mut users = self.users.write().map_err(lock_failed)?;
        insert(&mut users, user)
    }

    async fn query_by_id(&self, id: Uuid) -> Result<User, UserError> {
        let users = self.users.read().map_err(lock_failed)?;
        users.get(&id).cloned().ok_or(UserError::NotFound)
    }

    async fn query_by_email(&self, email: &str) -> Result<User, UserError> {
        let users = self.users.read().map_err(lock_failed)?;
        by_email(&users, email)
    }

    async fn count(&self) -> Result<usize, UserError> {
        Ok(self.users.read().map_err(lock_failed)?.len())
    }
}

/// JSON file storage. The whole table is held in memory and the file is
/// rewritten on every change, from the blocking pool.
#[derive(Debug)]
pub struct FileUserStore {
    path: PathBuf,
    users: AsyncRwLock<Users>,
}

impl FileUserStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self, UserError> {
        let users: Users = match std::fs::read(path) {
            Ok(raw) => {
                let list: Vec<User> = serde_json::from_slice(&raw).map_err(|e| {
                    UserError::Storage(format!("failed to parse {}: {e}", path.display()))
                })?;
                list.into_iter().map(|u| (u.id, u)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Users::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), users = users.len(), "opened user file");
        Ok(Self {
            path: path.to_path_buf(),
            users: AsyncRwLock::new(users),
        })
    }

    async fn persist(&self, users: &Users) -> Result<(), UserError> {
        let list: Vec<&User> = users.values().collect();
        let json = serde_json::to_vec_pretty(&list)
            .map_err(|e| UserError::Storage(e.to_string()))?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &json))
            .await
            .map_err(|e| UserError::Storage(format!("user file writer failed: {e}")))?
    }
}

/// Write `contents` next to `path`, then rename over it.
fn replace_file(path: &Path, contents: &[u8]) -> Result<(), UserError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn create(&self, user: User) -> Result<(), UserError> {
        let mut users = self.users.write().await;
        let id = user.id;
        insert(&mut users, user)?;
        if let Err(e) = self.persist(&users).await {
            users.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    async fn query_by_id(&self, id: Uuid) -> Result<User, UserError> {
        let users = self.users.read().await;
        users.get(&id).cloned().ok_or(UserError::NotFound)
    }

    async fn query_by_email(&self, email: &str) -> Result<User, UserError> {
        by_email(&*self.users.read().await, email)
    }

    async fn count(&self) -> Result<usize, UserError> {
        Ok(self.users.read().await.len())
    }
}
