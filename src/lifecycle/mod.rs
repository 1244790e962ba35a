//! Issue lifecycle
//!
//! Owns the status field, its append-only history and the resolution
//! timestamps. Any status may move to any other; `resolvedAt`/`rejectedAt`
//! record the most recent transition into those states and are never cleared.
//!
//! Every mutation that touches status also refreshes the owner's cached stats
//! and appends a notification for them.

use crate::error::AppError;
use crate::models::{Issue, IssueEdit, IssueStatus, IssueUpdate, Media, NewIssue, NewUpdate};
use crate::notifications;
use crate::stats;
use crate::store::Store;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Author recorded for history entries that come from plain field edits.
const SYSTEM_AUTHOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: IssueStatus,
    pub to: IssueStatus,
}

impl Issue {
    pub fn new(owner_id: Uuid, input: NewIssue, media: Media, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: owner_id,
            clerk_id: input.clerk_id,
            title: input.title,
            description: input.description,
            category: input.category,
            location: input.location,
            priority: input.urgency.priority(),
            urgency: input.urgency,
            status: IssueStatus::Pending,
            media,
            updates: Vec::new(),
            assigned_to: None,
            resolved_at: None,
            rejected_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a history entry, moving to `update.status` when it differs from the current one.
    pub fn apply_update(&mut self, update: NewUpdate, now: DateTime<Utc>) -> Option<StatusChange> {
        let change = update
            .status
            .filter(|s| *s != self.status)
            .map(|to| StatusChange {
                from: self.status,
                to,
            });

        self.updates.push(IssueUpdate {
            id: Uuid::new_v4(),
            message: update.message,
            updated_by: update.updated_by,
            status: update.status.unwrap_or(self.status),
            created_at: now,
        });

        if let Some(change) = change {
            self.status = change.to;
            match change.to {
                IssueStatus::Resolved => self.resolved_at = Some(now),
                IssueStatus::Rejected => self.rejected_at = Some(now),
                IssueStatus::Pending | IssueStatus::InProgress => {}
            }
        }
        self.updated_at = now;
        change
    }

    /// Overwrite the provided fields. A status change is recorded in the history
    /// exactly as [`Issue::apply_update`] would.
    pub fn edit_fields(&mut self, edit: IssueEdit, now: DateTime<Utc>) -> Option<StatusChange> {
        if let Some(title) = edit.title {
            self.title = title;
        }
        if let Some(description) = edit.description {
            self.description = description;
        }
        if let Some(category) = edit.category {
            self.category = category;
        }
        if let Some(address) = edit.address {
            self.location.address = address;
        }
        if let Some(urgency) = edit.urgency {
            self.urgency = urgency;
            self.priority = urgency.priority();
        }
        self.updated_at = now;

        let status = edit.status.filter(|s| *s != self.status)?;
        self.apply_update(
            NewUpdate {
                message: format!("Status changed from {} to {}", self.status, status),
                updated_by: edit.updated_by.unwrap_or_else(|| SYSTEM_AUTHOR.to_string()),
                status: Some(status),
            },
            now,
        )
    }
}

// =============================================================================
// Store-backed operations
// =============================================================================

/// Create an issue for an existing user and refresh their stats.
pub async fn create_issue(
    store: &dyn Store,
    input: NewIssue,
    media: Media,
) -> Result<Issue, AppError> {
    let owner = store
        .find_user_by_clerk_id(&input.clerk_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let issue = Issue::new(owner.id, input, media, Utc::now());
    store.insert_issue(&issue).await?;
    tracing::info!(
        issue_id = %issue.id,
        user_id = %owner.id,
        category = %issue.category,
        priority = issue.priority,
        "Issue created"
    );

    stats::recompute(store, owner.id).await?;
    Ok(issue)
}

pub async fn find_issue(store: &dyn Store, id: Uuid) -> Result<Issue, AppError> {
    store.find_issue(id).await?.ok_or(AppError::NotFound("Issue"))
}

/// Append an update entry, then notify the owner and refresh their stats.
pub async fn apply_update(
    store: &dyn Store,
    id: Uuid,
    update: NewUpdate,
) -> Result<Issue, AppError> {
    let mut issue = find_issue(store, id).await?;
    let message = update.message.clone();
    let change = issue.apply_update(update, Utc::now());
    store.save_issue(&issue).await?;

    tracing::info!(
        issue_id = %issue.id,
        status = %issue.status,
        status_changed = change.is_some(),
        "Issue update recorded"
    );

    match change {
        Some(change) => after_status_change(store, &issue, change).await?,
        None => {
            let (text, kind) = notifications::comment_message(&issue, &message);
            notify_owner(store, &issue, text, kind).await?;
        }
    }
    Ok(issue)
}

/// Apply a partial edit. Status changes go through the history like any update.
pub async fn edit_issue(store: &dyn Store, id: Uuid, edit: IssueEdit) -> Result<Issue, AppError> {
    let mut issue = find_issue(store, id).await?;
    let change = issue.edit_fields(edit, Utc::now());
    store.save_issue(&issue).await?;
    tracing::info!(issue_id = %issue.id, status_changed = change.is_some(), "Issue edited");

    if let Some(change) = change {
        after_status_change(store, &issue, change).await?;
    }
    Ok(issue)
}

/// Delete an issue permanently. Returns the removed document so callers can clean up its media.
pub async fn delete_issue(store: &dyn Store, id: Uuid) -> Result<Issue, AppError> {
    let issue = find_issue(store, id).await?;
    if !store.delete_issue(id).await? {
        return Err(AppError::NotFound("Issue"));
    }
    tracing::info!(issue_id = %issue.id, user_id = %issue.user_id, "Issue deleted");

    stats::recompute(store, issue.user_id).await?;
    Ok(issue)
}

async fn after_status_change(
    store: &dyn Store,
    issue: &Issue,
    change: StatusChange,
) -> Result<(), AppError> {
    stats::recompute(store, issue.user_id).await?;
    let (text, kind) = notifications::status_message(issue, change.to);
    notify_owner(store, issue, text, kind).await
}

async fn notify_owner(
    store: &dyn Store,
    issue: &Issue,
    message: String,
    kind: crate::models::NotificationType,
) -> Result<(), AppError> {
    match notifications::notify(store, issue.user_id, issue.id, message, kind).await {
        Err(AppError::NotFound(_)) => {
            tracing::warn!(issue_id = %issue.id, user_id = %issue.user_id, "Issue owner missing, notification dropped");
            Ok(())
        }
        other => other.map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Location, Urgency};

    fn new_issue(urgency: Urgency) -> Issue {
        Issue::new(
            Uuid::new_v4(),
            NewIssue {
                clerk_id: "user_1".into(),
                title: "Pothole".into(),
                description: "Large hole".into(),
                category: Category::Potholes,
                location: Location {
                    address: "Main St".into(),
                    coordinates: None,
                },
                urgency,
            },
            Media::default(),
            Utc::now(),
        )
    }

    fn update(status: Option<IssueStatus>) -> NewUpdate {
        NewUpdate {
            message: "Crew dispatched".into(),
            updated_by: "admin".into(),
            status,
        }
    }

    #[test]
    fn test_new_issue_defaults() {
        let issue = new_issue(Urgency::Critical);
        assert_eq!(issue.status, IssueStatus::Pending);
        assert_eq!(issue.priority, 4);
        assert!(issue.updates.is_empty());
        assert!(issue.media.images.is_empty() && issue.media.videos.is_empty());
        assert!(issue.resolved_at.is_none());
    }

    #[test]
    fn test_apply_update_with_status() {
        let mut issue = new_issue(Urgency::Medium);
        let change = issue.apply_update(update(Some(IssueStatus::InProgress)), Utc::now());
        assert_eq!(
            change,
            Some(StatusChange {
                from: IssueStatus::Pending,
                to: IssueStatus::InProgress
            })
        );
        assert_eq!(issue.status, IssueStatus::InProgress);
        assert_eq!(issue.updates.len(), 1);
        assert_eq!(issue.updates[0].status, IssueStatus::InProgress);
        assert_eq!(issue.updates[0].updated_by, "admin");
    }

    #[test]
    fn test_apply_update_without_status_records_current() {
        let mut issue = new_issue(Urgency::Medium);
        assert!(issue.apply_update(update(None), Utc::now()).is_none());
        assert_eq!(issue.status, IssueStatus::Pending);
        assert_eq!(issue.updates[0].status, IssueStatus::Pending);

        // same status is a comment, not a transition
        assert!(issue
            .apply_update(update(Some(IssueStatus::Pending)), Utc::now())
            .is_none());
        assert_eq!(issue.updates.len(), 2);
    }

    #[test]
    fn test_resolution_timestamps_are_kept() {
        let mut issue = new_issue(Urgency::Medium);
        let resolved = Utc::now();
        issue.apply_update(update(Some(IssueStatus::Resolved)), resolved);
        assert_eq!(issue.resolved_at, Some(resolved));
        assert!(issue.rejected_at.is_none());

        issue.apply_update(update(Some(IssueStatus::Rejected)), Utc::now());
        assert!(issue.rejected_at.is_some());
        assert_eq!(issue.resolved_at, Some(resolved));

        // reopening is allowed and leaves the audit timestamps in place
        issue.apply_update(update(Some(IssueStatus::Pending)), Utc::now());
        assert_eq!(issue.status, IssueStatus::Pending);
        assert_eq!(issue.resolved_at, Some(resolved));
    }

    #[test]
    fn test_edit_fields_recomputes_priority() {
        let mut issue = new_issue(Urgency::Low);
        assert_eq!(issue.priority, 1);
        let change = issue.edit_fields(
            IssueEdit {
                urgency: Some(Urgency::High),
                title: Some("Deep pothole".into()),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(change.is_none());
        assert_eq!(issue.priority, 3);
        assert_eq!(issue.title, "Deep pothole");
        assert!(issue.updates.is_empty());
    }

    #[test]
    fn test_edit_fields_status_goes_through_history() {
        let mut issue = new_issue(Urgency::Medium);
        let change = issue.edit_fields(
            IssueEdit {
                status: Some(IssueStatus::Resolved),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(change.map(|c| c.to), Some(IssueStatus::Resolved));
        assert!(issue.resolved_at.is_some());
        assert_eq!(issue.updates.len(), 1);
        assert_eq!(issue.updates[0].updated_by, SYSTEM_AUTHOR);
        assert_eq!(
            issue.updates[0].message,
            "Status changed from pending to resolved"
        );
    }
}
