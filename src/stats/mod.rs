//! Per-user issue counters
//!
//! `User.stats` is a cache. Callers refresh it after every mutation that can
//! change a user's counts; nothing keeps it in sync otherwise.

use crate::models::{IssueStatus, StatusCount, UserStats};
use crate::store::{Store, StoreResult};
use uuid::Uuid;

impl UserStats {
    pub fn from_counts(counts: &[StatusCount]) -> Self {
        let count_of = |status: IssueStatus| -> i64 {
            counts
                .iter()
                .filter(|c| c.status == status)
                .map(|c| c.count)
                .sum()
        };
        Self {
            total_reports: counts.iter().map(|c| c.count).sum(),
            resolved_reports: count_of(IssueStatus::Resolved),
            pending_reports: count_of(IssueStatus::Pending),
        }
    }
}

/// Recount the user's issues by status and persist the result.
pub async fn recompute(store: &dyn Store, user_id: Uuid) -> StoreResult<UserStats> {
    let counts = store.count_issues_by_status(Some(user_id)).await?;
    let stats = UserStats::from_counts(&counts);
    store.set_user_stats(user_id, &stats).await?;
    tracing::debug!(
        user_id = %user_id,
        total = stats.total_reports,
        resolved = stats.resolved_reports,
        pending = stats.pending_reports,
        "User stats recomputed"
    );
    Ok(stats)
}
