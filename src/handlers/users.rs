//! User profile, stats and notification handlers

use super::extract::{ApiJson, ApiQuery};
use super::AppState;
use crate::auth;
use crate::error::{ApiResult, AppError};
use crate::models::*;
use crate::notifications::{self, DEFAULT_PAGE_SIZE, MAX_NOTIFICATIONS};
use crate::stats;
use crate::store::StoreError;
use crate::uploads;
use crate::validation::{normalize_address, validate_user_profile};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub unread_only: Option<String>,
    pub limit: Option<String>,
}

impl NotificationQuery {
    fn unread_only(&self) -> bool {
        self.unread_only
            .as_deref()
            .map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
    }

    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_NOTIFICATIONS)
    }
}

async fn find_user(state: &AppState, clerk_id: &str) -> Result<User, AppError> {
    state
        .store
        .find_user_by_clerk_id(clerk_id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

// =============================================================================
// Profile
// =============================================================================

/// Create the user or refresh their profile, keyed by `clerkId`.
pub async fn upsert_user(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<UpsertUserRequest>,
) -> ApiResult<User> {
    let mut profile = validate_user_profile(&input).map_err(|e| state.fail(e))?;
    profile.address = profile.address.map(normalize_address);
    let role = auth::role_for_email(&profile.email, &state.admin_emails);
    let store = state.store();

    let existing = store
        .find_user_by_clerk_id(&profile.clerk_id)
        .await
        .map_err(|e| state.fail(e))?;

    if let Some(mut user) = existing {
        user.apply_profile(profile, Utc::now());
        // the allow-list only ever promotes
        if role == Role::Admin {
            user.role = Role::Admin;
        }
        store
            .update_user_profile(&user)
            .await
            .map_err(|e| state.fail(e))?;
        tracing::info!(user_id = %user.id, role = ?user.role, "User profile updated");
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::success(user).with_message("User profile updated successfully")),
        ));
    }

    let clerk_id = profile.clerk_id.clone();
    let user = User::new(profile, role, Utc::now());
    match store.insert_user(&user).await {
        Ok(()) => {
            tracing::info!(user_id = %user.id, role = ?user.role, "User created");
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::success(user).with_message("User profile created successfully")),
            ))
        }
        // a concurrent upsert for the same clerkId got there first
        Err(StoreError::Duplicate { field }) if field == "clerkId" => {
            let existing = find_user(&state, &clerk_id)
                .await
                .map_err(|e| state.fail(e))?;
            Ok((
                StatusCode::OK,
                Json(ApiResponse::success(existing).with_message("User profile already exists")),
            ))
        }
        Err(e) => Err(state.fail(e)),
    }
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(clerk_id): Path<String>,
) -> ApiResult<User> {
    let user = find_user(&state, &clerk_id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((StatusCode::OK, Json(ApiResponse::success(user))))
}

/// Recount the user's issues before answering.
pub async fn user_stats(
    State(state): State<AppState>,
    Path(clerk_id): Path<String>,
) -> ApiResult<UserStats> {
    let user = find_user(&state, &clerk_id)
        .await
        .map_err(|e| state.fail(e))?;
    let stats = stats::recompute(state.store(), user.id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((StatusCode::OK, Json(ApiResponse::success(stats))))
}

/// Merge the provided address parts into the stored address.
pub async fn update_address(
    State(state): State<AppState>,
    Path(clerk_id): Path<String>,
    ApiJson(input): ApiJson<Address>,
) -> ApiResult<User> {
    let mut user = find_user(&state, &clerk_id)
        .await
        .map_err(|e| state.fail(e))?;
    user.address.merge(normalize_address(input));
    user.updated_at = Utc::now();
    state
        .store
        .update_user_profile(&user)
        .await
        .map_err(|e| state.fail(e))?;
    tracing::info!(user_id = %user.id, "User address updated");
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(user).with_message("Address updated successfully")),
    ))
}

/// Delete the user together with their issues and those issues' media.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(clerk_id): Path<String>,
) -> ApiResult<()> {
    let user = find_user(&state, &clerk_id)
        .await
        .map_err(|e| state.fail(e))?;
    let filter = IssueFilter {
        clerk_id: Some(clerk_id.clone()),
        ..Default::default()
    };
    let (issues, _) = state
        .store
        .list_issues(&filter, None)
        .await
        .map_err(|e| state.fail(e))?;

    if !state
        .store
        .delete_user_by_clerk_id(&clerk_id)
        .await
        .map_err(|e| state.fail(e))?
    {
        return Err(state.fail(AppError::NotFound("User")));
    }
    tracing::info!(user_id = %user.id, issues = issues.len(), "User deleted");

    for issue in &issues {
        uploads::remove_files(&state.upload_dir, issue.media.filenames()).await;
    }
    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok("User profile deleted successfully")),
    ))
}

// =============================================================================
// Notifications
// =============================================================================

pub async fn list_notifications(
    State(state): State<AppState>,
    Path(clerk_id): Path<String>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> ApiResult<Vec<NotificationWithIssue>> {
    let (page, unread) =
        notifications::list(state.store(), &clerk_id, query.unread_only(), query.limit())
            .await
            .map_err(|e| state.fail(e))?;
    let page = notifications::with_issues(state.store(), page)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(page).with_unread_count(unread)),
    ))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path((clerk_id, notification_id)): Path<(String, String)>,
) -> ApiResult<Notification> {
    let notification_id = Uuid::parse_str(notification_id.trim())
        .map_err(|_| state.fail(AppError::NotFound("Notification")))?;
    let notification = notifications::mark_one_read(state.store(), &clerk_id, notification_id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(notification).with_message("Notification marked as read")),
    ))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Path(clerk_id): Path<String>,
) -> ApiResult<()> {
    let changed = notifications::mark_everything_read(state.store(), &clerk_id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok("All notifications marked as read").with_count(changed)),
    ))
}
