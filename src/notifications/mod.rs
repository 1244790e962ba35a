//! Per-user notification inbox
//!
//! Notifications are embedded in the user document, newest first, and capped
//! at [`MAX_NOTIFICATIONS`]. Clients poll for them.

use crate::error::AppError;
use crate::models::{
    Issue, IssueStatus, IssueSummary, Notification, NotificationType, NotificationWithIssue, User,
};
use crate::store::Store;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

pub const MAX_NOTIFICATIONS: usize = 50;
pub const DEFAULT_PAGE_SIZE: usize = 20;

// =============================================================================
// Inbox operations
// =============================================================================

/// Insert at the front and drop whatever falls beyond the cap.
pub fn push(inbox: &mut Vec<Notification>, notification: Notification) {
    inbox.insert(0, notification);
    inbox.truncate(MAX_NOTIFICATIONS);
}

pub fn unread_count(inbox: &[Notification]) -> usize {
    inbox.iter().filter(|n| !n.is_read).count()
}

/// The first `limit` entries, optionally unread only. Order is preserved.
pub fn page(inbox: &[Notification], unread_only: bool, limit: usize) -> Vec<Notification> {
    inbox
        .iter()
        .filter(|n| !unread_only || !n.is_read)
        .take(limit)
        .cloned()
        .collect()
}

pub fn mark_read(inbox: &mut [Notification], id: Uuid) -> Option<&Notification> {
    let notification = inbox.iter_mut().find(|n| n.id == id)?;
    notification.is_read = true;
    Some(notification)
}

/// Returns how many entries changed.
pub fn mark_all_read(inbox: &mut [Notification]) -> usize {
    inbox
        .iter_mut()
        .filter(|n| !n.is_read)
        .map(|n| n.is_read = true)
        .count()
}

pub fn status_message(issue: &Issue, status: IssueStatus) -> (String, NotificationType) {
    let kind = match status {
        IssueStatus::Resolved => NotificationType::Resolved,
        IssueStatus::Rejected => NotificationType::Rejected,
        IssueStatus::Pending | IssueStatus::InProgress => NotificationType::StatusUpdate,
    };
    (
        format!("Your issue \"{}\" is now {}", issue.title, status),
        kind,
    )
}

pub fn comment_message(issue: &Issue, message: &str) -> (String, NotificationType) {
    (
        format!("New update on your issue \"{}\": {}", issue.title, message),
        NotificationType::Comment,
    )
}

// =============================================================================
// Store-backed operations
// =============================================================================

async fn user_by_clerk_id(store: &dyn Store, clerk_id: &str) -> Result<User, AppError> {
    store
        .find_user_by_clerk_id(clerk_id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Append a notification to a user's inbox.
pub async fn notify(
    store: &dyn Store,
    user_id: Uuid,
    issue_id: Uuid,
    message: String,
    kind: NotificationType,
) -> Result<Notification, AppError> {
    let mut user = store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let notification = Notification {
        id: Uuid::new_v4(),
        issue_id,
        message,
        kind,
        is_read: false,
        created_at: Utc::now(),
    };
    push(&mut user.notifications, notification.clone());
    store
        .set_notifications(user.id, &user.notifications)
        .await?;

    tracing::info!(
        user_id = %user.id,
        issue_id = %issue_id,
        kind = ?kind,
        inbox_size = user.notifications.len(),
        "Notification appended"
    );
    Ok(notification)
}

/// A page of the inbox plus the unread count over the whole inbox.
pub async fn list(
    store: &dyn Store,
    clerk_id: &str,
    unread_only: bool,
    limit: usize,
) -> Result<(Vec<Notification>, usize), AppError> {
    let user = user_by_clerk_id(store, clerk_id).await?;
    Ok((
        page(&user.notifications, unread_only, limit),
        unread_count(&user.notifications),
    ))
}

/// Attach the title, status and category of each referenced issue.
pub async fn with_issues(
    store: &dyn Store,
    notifications: Vec<Notification>,
) -> Result<Vec<NotificationWithIssue>, AppError> {
    let mut ids: Vec<Uuid> = notifications.iter().map(|n| n.issue_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let issues: HashMap<Uuid, IssueSummary> = store
        .find_issues(&ids)
        .await?
        .iter()
        .map(|issue| (issue.id, IssueSummary::from(issue)))
        .collect();

    Ok(notifications
        .into_iter()
        .map(|notification| NotificationWithIssue {
            issue: issues.get(&notification.issue_id).cloned(),
            notification,
        })
        .collect())
}

pub async fn mark_one_read(
    store: &dyn Store,
    clerk_id: &str,
    notification_id: Uuid,
) -> Result<Notification, AppError> {
    let mut user = user_by_clerk_id(store, clerk_id).await?;
    let notification = mark_read(&mut user.notifications, notification_id)
        .cloned()
        .ok_or(AppError::NotFound("Notification"))?;
    store
        .set_notifications(user.id, &user.notifications)
        .await?;
    Ok(notification)
}

pub async fn mark_everything_read(store: &dyn Store, clerk_id: &str) -> Result<usize, AppError> {
    let mut user = user_by_clerk_id(store, clerk_id).await?;
    let changed = mark_all_read(&mut user.notifications);
    if changed > 0 {
        store
            .set_notifications(user.id, &user.notifications)
            .await?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(message: &str, is_read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            issue_id: Uuid::new_v4(),
            message: message.to_string(),
            kind: NotificationType::StatusUpdate,
            is_read,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_push_caps_inbox() {
        let mut inbox = Vec::new();
        for i in 0..MAX_NOTIFICATIONS {
            push(&mut inbox, notification(&format!("n{}", i), false));
        }
        assert_eq!(inbox.len(), MAX_NOTIFICATIONS);
        assert_eq!(inbox.last().unwrap().message, "n0");

        push(&mut inbox, notification("newest", false));
        assert_eq!(inbox.len(), MAX_NOTIFICATIONS);
        assert_eq!(inbox[0].message, "newest");
        assert_eq!(inbox.last().unwrap().message, "n1");
        assert!(inbox.iter().all(|n| n.message != "n0"));
    }

    #[test]
    fn test_unread_count_ignores_page_limit() {
        let mut inbox = Vec::new();
        for i in 0..10 {
            push(&mut inbox, notification(&format!("n{}", i), i % 2 == 0));
        }
        let first = page(&inbox, false, 3);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].message, "n9");
        assert_eq!(unread_count(&inbox), 5);

        let unread = page(&inbox, true, 20);
        assert_eq!(unread.len(), 5);
        assert!(unread.iter().all(|n| !n.is_read));
    }

    #[test]
    fn test_mark_read() {
        let mut inbox = vec![notification("a", false), notification("b", false)];
        let id = inbox[1].id;
        assert!(mark_read(&mut inbox, id).unwrap().is_read);
        assert!(!inbox[0].is_read);
        assert!(mark_read(&mut inbox, Uuid::new_v4()).is_none());

        assert_eq!(mark_all_read(&mut inbox), 1);
        assert_eq!(unread_count(&inbox), 0);
        assert_eq!(mark_all_read(&mut inbox), 0);
    }

    #[tokio::test]
    async fn test_notify_persists_capped_inbox() {
        use crate::models::{Role, UserProfile};
        use crate::store::memory::MemoryStore;

        let store = MemoryStore::new();
        let user = User::new(
            UserProfile {
                clerk_id: "user_1".into(),
                email: "user_1@example.com".into(),
                first_name: "Test".into(),
                last_name: None,
                image_url: None,
                phone: None,
                address: None,
            },
            Role::User,
            Utc::now(),
        );
        store.insert_user(&user).await.unwrap();

        let issue_id = Uuid::new_v4();
        for i in 0..=MAX_NOTIFICATIONS {
            notify(&store, user.id, issue_id, format!("n{}", i), NotificationType::Comment)
                .await
                .unwrap();
        }

        let (inbox, unread) = list(&store, "user_1", false, 100).await.unwrap();
        assert_eq!(inbox.len(), MAX_NOTIFICATIONS);
        assert_eq!(unread, MAX_NOTIFICATIONS);
        assert_eq!(inbox[0].message, format!("n{}", MAX_NOTIFICATIONS));
        assert_eq!(inbox.last().unwrap().message, "n1");

        assert!(matches!(
            notify(&store, Uuid::new_v4(), issue_id, "x".into(), NotificationType::Comment).await,
            Err(AppError::NotFound("User"))
        ));
        assert!(matches!(
            list(&store, "nobody", false, 10).await,
            Err(AppError::NotFound("User"))
        ));
    }

    #[test]
    fn test_message_kinds() {
        let issue = crate::models::Issue {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            clerk_id: "user_1".into(),
            title: "Broken lamp".into(),
            description: "Dark street".into(),
            category: crate::models::Category::StreetLights,
            location: crate::models::Location {
                address: "Elm St".into(),
                coordinates: None,
            },
            urgency: crate::models::Urgency::Low,
            status: IssueStatus::Pending,
            priority: 1,
            media: Default::default(),
            updates: Vec::new(),
            assigned_to: None,
            resolved_at: None,
            rejected_at: None,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let (text, kind) = status_message(&issue, IssueStatus::Resolved);
        assert_eq!(text, "Your issue \"Broken lamp\" is now resolved");
        assert_eq!(kind, NotificationType::Resolved);
        assert_eq!(
            status_message(&issue, IssueStatus::InProgress).1,
            NotificationType::StatusUpdate
        );
        assert_eq!(
            comment_message(&issue, "Parts ordered").1,
            NotificationType::Comment
        );
    }
}
