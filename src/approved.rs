//! In-memory approved-user registry with optional persistence (spec §4.10,
//! component C10).

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

/// A user who has sent enough successfully-checked messages to be exempt
/// from the expensive checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedUser {
    pub user_id: String,
    pub user_name: String,
    pub count: u64,
    pub first_seen: SystemTime,
}

/// Persistence contract for the approved-user registry (spec §6). All
/// operations are idempotent; `write` is an upsert.
#[async_trait]
pub trait ApprovedUserStore: Send + Sync {
    async fn read(&self) -> std::io::Result<Vec<ApprovedUser>>;
    async fn write(&self, user: &ApprovedUser) -> std::io::Result<()>;
    async fn delete(&self, user_id: &str) -> std::io::Result<()>;
}

pub struct ApprovedUsers {
    users: RwLock<HashMap<String, ApprovedUser>>,
    first_messages_count: u64,
    store: Option<Box<dyn ApprovedUserStore>>,
}

impl ApprovedUsers {
    pub fn new(first_messages_count: u64) -> Self {
        ApprovedUsers { users: RwLock::new(HashMap::new()), first_messages_count, store: None }
    }

    pub fn with_store(first_messages_count: u64, store: Box<dyn ApprovedUserStore>) -> Self {
        ApprovedUsers { users: RwLock::new(HashMap::new()), first_messages_count, store: Some(store) }
    }

    /// Loads the in-memory map from the backing store, if one is configured.
    pub async fn load(&self) -> std::io::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        let loaded = store.read().await?;
        let mut users = self.users.write().await;
        users.clear();
        for user in loaded {
            users.insert(user.user_id.clone(), user);
        }
        Ok(())
    }

    pub async fn is_approved(&self, user_id: &str) -> bool {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|user| user.count > self.first_messages_count)
            .unwrap_or(false)
    }

    /// Records that `user_id` produced a message that was actually checked
    /// (not skipped as too-short) and came back ham. Persists the updated
    /// record while the user is still below the approval threshold.
    pub async fn record_checked_ham(&self, user_id: &str, user_name: &str, now: SystemTime) {
        let mut users = self.users.write().await;
        let user = users.entry(user_id.to_owned()).or_insert_with(|| ApprovedUser {
            user_id: user_id.to_owned(),
            user_name: user_name.to_owned(),
            count: 0,
            first_seen: now,
        });
        user.count += 1;
        user.user_name = user_name.to_owned();

        if user.count <= self.first_messages_count {
            if let Some(store) = &self.store {
                if let Err(err) = store.write(user).await {
                    warn!(user_id, error = %err, "failed to persist approved-user record");
                }
            }
        }
    }

    pub async fn add(&self, user: ApprovedUser) {
        if let Some(store) = &self.store {
            if let Err(err) = store.write(&user).await {
                warn!(user_id = %user.user_id, error = %err, "failed to persist added approved user");
            }
        }
        self.users.write().await.insert(user.user_id.clone(), user);
    }

    pub async fn remove(&self, user_id: &str) {
        if let Some(store) = &self.store {
            if let Err(err) = store.delete(user_id).await {
                warn!(user_id, error = %err, "failed to persist removal of approved user");
            }
        }
        self.users.write().await.remove(user_id);
    }

    /// Returns a snapshot of every currently approved-or-tracked user.
    pub async fn approved_users(&self) -> Vec<ApprovedUser> {
        self.users.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn user_becomes_approved_strictly_after_threshold() {
        let registry = ApprovedUsers::new(2);
        let now = SystemTime::now();

        registry.record_checked_ham("1", "alice", now).await;
        assert!(!registry.is_approved("1").await);

        registry.record_checked_ham("1", "alice", now).await;
        assert!(!registry.is_approved("1").await, "count == threshold is not strictly greater");

        registry.record_checked_ham("1", "alice", now).await;
        assert!(registry.is_approved("1").await);
    }

    #[tokio::test]
    async fn unknown_user_is_not_approved() {
        let registry = ApprovedUsers::new(1);
        assert!(!registry.is_approved("missing").await);
    }

    #[tokio::test]
    async fn snapshot_reflects_additions_and_removals() {
        let registry = ApprovedUsers::new(1);
        registry
            .add(ApprovedUser {
                user_id: "7".to_owned(),
                user_name: "bob".to_owned(),
                count: 5,
                first_seen: SystemTime::now(),
            })
            .await;
        assert_eq!(registry.approved_users().await.len(), 1);

        registry.remove("7").await;
        assert_eq!(registry.approved_users().await.len(), 0);
    }
}
