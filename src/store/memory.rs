//! In-memory store used by the test-suite.
//!
//! Mirrors the unique constraints and cascading delete of the PostgreSQL schema.

use super::{Store, StoreError, StoreResult};
use crate::models::*;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    issues: HashMap<Uuid, Issue>,
}

impl Inner {
    fn check_unique(&self, user: &User) -> StoreResult<()> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.clerk_id == user.clerk_id {
                return Err(StoreError::Duplicate {
                    field: "clerkId".to_string(),
                });
            }
            if other.email == user.email {
                return Err(StoreError::Duplicate {
                    field: "email".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(issue: &Issue, filter: &IssueFilter) -> bool {
    filter.status.map_or(true, |s| issue.status == s)
        && filter.category.map_or(true, |c| issue.category == c)
        && filter.urgency.map_or(true, |u| issue.urgency == u)
        && filter
            .clerk_id
            .as_deref()
            .map_or(true, |id| issue.clerk_id == id)
}

#[async_trait]
impl Store for MemoryStore {
    fn is_ready(&self) -> bool {
        true
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_clerk_id(&self, clerk_id: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.clerk_id == clerk_id)
            .cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_unique(user)?;
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user_profile(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_unique(user)?;
        if let Some(existing) = inner.users.get_mut(&user.id) {
            existing.email = user.email.clone();
            existing.first_name = user.first_name.clone();
            existing.last_name = user.last_name.clone();
            existing.image_url = user.image_url.clone();
            existing.phone = user.phone.clone();
            existing.address = user.address.clone();
            existing.role = user.role;
            existing.is_active = user.is_active;
            existing.updated_at = user.updated_at;
        }
        Ok(())
    }

    async fn set_user_stats(&self, user_id: Uuid, stats: &UserStats) -> StoreResult<()> {
        if let Some(user) = self.inner.lock().await.users.get_mut(&user_id) {
            user.stats = *stats;
        }
        Ok(())
    }

    async fn set_notifications(
        &self,
        user_id: Uuid,
        notifications: &[Notification],
    ) -> StoreResult<()> {
        if let Some(user) = self.inner.lock().await.users.get_mut(&user_id) {
            user.notifications = notifications.to_vec();
        }
        Ok(())
    }

    async fn delete_user_by_clerk_id(&self, clerk_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(id) = inner
            .users
            .values()
            .find(|u| u.clerk_id == clerk_id)
            .map(|u| u.id)
        else {
            return Ok(false);
        };
        inner.users.remove(&id);
        inner.issues.retain(|_, issue| issue.user_id != id);
        Ok(true)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().await.users.len() as i64)
    }

    async fn insert_issue(&self, issue: &Issue) -> StoreResult<()> {
        self.inner
            .lock()
            .await
            .issues
            .insert(issue.id, issue.clone());
        Ok(())
    }

    async fn find_issue(&self, id: Uuid) -> StoreResult<Option<Issue>> {
        Ok(self.inner.lock().await.issues.get(&id).cloned())
    }

    async fn find_issues(&self, ids: &[Uuid]) -> StoreResult<Vec<Issue>> {
        let inner = self.inner.lock().await;
        Ok(ids.iter().filter_map(|id| inner.issues.get(id).cloned()).collect())
    }

    async fn save_issue(&self, issue: &Issue) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.issues.get_mut(&issue.id) {
            *existing = issue.clone();
        }
        Ok(())
    }

    async fn delete_issue(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.lock().await.issues.remove(&id).is_some())
    }

    async fn list_issues(
        &self,
        filter: &IssueFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let inner = self.inner.lock().await;
        let mut found: Vec<Issue> = inner
            .issues
            .values()
            .filter(|issue| matches(issue, filter))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = found.len() as i64;

        let found = match page {
            Some(page) => found
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .collect(),
            None => found,
        };
        Ok((found, total))
    }

    async fn count_issues_by_status(
        &self,
        user_id: Option<Uuid>,
    ) -> StoreResult<Vec<StatusCount>> {
        let inner = self.inner.lock().await;
        let counts = IssueStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: inner
                    .issues
                    .values()
                    .filter(|i| i.status == status && user_id.map_or(true, |u| i.user_id == u))
                    .count() as i64,
            })
            .filter(|c| c.count > 0)
            .collect();
        Ok(counts)
    }
}
