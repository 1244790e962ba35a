//! Document store abstraction
//!
//! Users and issues are persisted as whole documents: embedded lists
//! (notifications, update history, media) live inside their owner. Writes are
//! plain read-modify-write; the store does not serialize concurrent requests
//! touching the same document.

mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgStore;

use crate::models::{
    Issue, IssueFilter, Notification, PageRequest, StatusCount, User, UserStats,
};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is not connected")]
    Unavailable,

    #[error("duplicate value for unique field '{field}'")]
    Duplicate { field: String },

    #[error(transparent)]
    Database(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Whether the backing connection was established.
    fn is_ready(&self) -> bool;

    // Users
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_clerk_id(&self, clerk_id: &str) -> StoreResult<Option<User>>;
    /// Users among `ids` that exist, in no particular order.
    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    /// Persists profile fields, role and address. Stats and notifications are untouched.
    async fn update_user_profile(&self, user: &User) -> StoreResult<()>;
    async fn set_user_stats(&self, user_id: Uuid, stats: &UserStats) -> StoreResult<()>;
    async fn set_notifications(
        &self,
        user_id: Uuid,
        notifications: &[Notification],
    ) -> StoreResult<()>;
    /// Deletes the user and, by ownership, their issues.
    async fn delete_user_by_clerk_id(&self, clerk_id: &str) -> StoreResult<bool>;
    async fn count_users(&self) -> StoreResult<i64>;

    // Issues
    async fn insert_issue(&self, issue: &Issue) -> StoreResult<()>;
    async fn find_issue(&self, id: Uuid) -> StoreResult<Option<Issue>>;
    /// Issues among `ids` that exist, in no particular order.
    async fn find_issues(&self, ids: &[Uuid]) -> StoreResult<Vec<Issue>>;
    async fn save_issue(&self, issue: &Issue) -> StoreResult<()>;
    async fn delete_issue(&self, id: Uuid) -> StoreResult<bool>;
    /// Newest first. Without a page, returns every match.
    async fn list_issues(
        &self,
        filter: &IssueFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<(Vec<Issue>, i64)>;
    /// Issue counts grouped by status, optionally restricted to one owner.
    async fn count_issues_by_status(&self, user_id: Option<Uuid>)
        -> StoreResult<Vec<StatusCount>>;
}

/// Stand-in used when no connection could be established at startup.
///
/// Every call fails fast with [`StoreError::Unavailable`] instead of hanging.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedStore;

#[async_trait]
impl Store for DisconnectedStore {
    fn is_ready(&self) -> bool {
        false
    }

    async fn find_user(&self, _id: Uuid) -> StoreResult<Option<User>> {
        Err(StoreError::Unavailable)
    }

    async fn find_user_by_clerk_id(&self, _clerk_id: &str) -> StoreResult<Option<User>> {
        Err(StoreError::Unavailable)
    }

    async fn find_users(&self, _ids: &[Uuid]) -> StoreResult<Vec<User>> {
        Err(StoreError::Unavailable)
    }

    async fn insert_user(&self, _user: &User) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    async fn update_user_profile(&self, _user: &User) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    async fn set_user_stats(&self, _user_id: Uuid, _stats: &UserStats) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    async fn set_notifications(
        &self,
        _user_id: Uuid,
        _notifications: &[Notification],
    ) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    async fn delete_user_by_clerk_id(&self, _clerk_id: &str) -> StoreResult<bool> {
        Err(StoreError::Unavailable)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Err(StoreError::Unavailable)
    }

    async fn insert_issue(&self, _issue: &Issue) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    async fn find_issue(&self, _id: Uuid) -> StoreResult<Option<Issue>> {
        Err(StoreError::Unavailable)
    }

    async fn find_issues(&self, _ids: &[Uuid]) -> StoreResult<Vec<Issue>> {
        Err(StoreError::Unavailable)
    }

    async fn save_issue(&self, _issue: &Issue) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    async fn delete_issue(&self, _id: Uuid) -> StoreResult<bool> {
        Err(StoreError::Unavailable)
    }

    async fn list_issues(
        &self,
        _filter: &IssueFilter,
        _page: Option<PageRequest>,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        Err(StoreError::Unavailable)
    }

    async fn count_issues_by_status(
        &self,
        _user_id: Option<Uuid>,
    ) -> StoreResult<Vec<StatusCount>> {
        Err(StoreError::Unavailable)
    }
}
