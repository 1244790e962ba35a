//! Issue handlers

use super::extract::{body_rejection, ApiJson, ApiQuery};
use super::AppState;
use crate::auth;
use crate::error::{ApiResult, AppError};
use crate::lifecycle;
use crate::models::*;
use crate::store::Store;
use crate::uploads::{self, MediaKind, UploadedFile};
use crate::validation::{
    parse_page, validate_add_update, validate_create_issue, validate_issue_edit,
    validate_issue_filter, ValidationError,
};
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const DEFAULT_LOCATIONS_LIMIT: i64 = 1000;
pub const MAX_LOCATIONS_LIMIT: i64 = 5000;

#[derive(Debug, Default, Deserialize)]
pub struct IssueListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserIssuesQuery {
    pub status: Option<String>,
}

/// Malformed ids cannot name an existing issue.
fn parse_issue_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound("Issue"))
}

// =============================================================================
// Create
// =============================================================================

/// Report a new issue. Accepts JSON or `multipart/form-data` with media files.
pub async fn create_issue(State(state): State<AppState>, request: Request) -> ApiResult<Issue> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("multipart/form-data"));

    let (form, files) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| state.fail(body_rejection(e.status(), e.body_text())))?;
        read_issue_form(multipart)
            .await
            .map_err(|e| state.fail(e))?
    } else {
        let ApiJson(form) = ApiJson::<CreateIssueRequest>::from_request(request, &state).await?;
        (form, Vec::new())
    };

    let input = validate_create_issue(&form).map_err(|e| state.fail(e))?;
    uploads::check_counts(&files).map_err(|e| state.fail(e))?;
    for file in &files {
        file.check(state.max_upload_size).map_err(|e| {
            tracing::warn!(filename = %file.original_filename, error = %e, "Upload rejected");
            state.fail(e)
        })?;
    }

    let media = uploads::store_files(&state.upload_dir, files)
        .await
        .map_err(|e| state.fail(e))?;

    match lifecycle::create_issue(state.store(), input, media.clone()).await {
        Ok(issue) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(issue).with_message("Issue reported successfully")),
        )),
        Err(e) => {
            uploads::remove_files(&state.upload_dir, media.filenames()).await;
            Err(state.fail(e))
        }
    }
}

async fn read_issue_form(
    mut multipart: Multipart,
) -> Result<(CreateIssueRequest, Vec<UploadedFile>), AppError> {
    let malformed =
        |e: axum::extract::multipart::MultipartError| body_rejection(e.status(), e.body_text());

    let mut form = CreateIssueRequest::default();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(kind) = MediaKind::from_field(&name) {
            let original_filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(malformed)?;
            files.push(UploadedFile {
                kind,
                original_filename,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        if field.file_name().is_some() {
            return Err(ValidationError::UnexpectedField { field: name }.into());
        }

        let value = field.text().await.map_err(malformed)?;
        match name.as_str() {
            "clerkId" => form.clerk_id = Some(value),
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            "category" => form.category = Some(value),
            "urgency" => form.urgency = Some(value),
            "location" => form.location = Some(location_field(value)),
            "coordinates" => form.coordinates = Some(Value::String(value)),
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok((form, files))
}

/// Form clients send `location` either as the address itself or as a JSON object.
fn location_field(raw: String) -> Value {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::String(raw),
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Embed each issue's reporter, looked up in one batch.
async fn with_owners(
    store: &dyn Store,
    issues: Vec<Issue>,
) -> Result<Vec<IssueWithOwner>, AppError> {
    let mut ids: Vec<Uuid> = issues.iter().map(|issue| issue.user_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let owners: HashMap<Uuid, OwnerSummary> = store
        .find_users(&ids)
        .await?
        .iter()
        .map(|user| (user.id, OwnerSummary::of(user)))
        .collect();

    Ok(issues
        .into_iter()
        .map(|issue| IssueWithOwner {
            owner: owners.get(&issue.user_id).cloned(),
            issue,
        })
        .collect())
}

/// List issues, newest first, with filters and pagination.
pub async fn list_issues(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IssueListQuery>,
) -> ApiResult<Vec<IssueWithOwner>> {
    let filter = validate_issue_filter(&query.status, &query.category, &query.urgency)
        .map_err(|e| state.fail(e))?;
    let page = parse_page(&query.page, &query.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);

    if !state.store.is_ready() {
        tracing::warn!("Store disconnected, returning empty issue list");
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::success(Vec::new()).with_pagination(Pagination::new(0, page))),
        ));
    }

    let (issues, total) = state
        .store
        .list_issues(&filter, Some(page))
        .await
        .map_err(|e| state.fail(e))?;
    let issues = with_owners(state.store(), issues)
        .await
        .map_err(|e| state.fail(e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(issues).with_pagination(Pagination::new(total, page))),
    ))
}

/// Map projection of issues that carry usable coordinates.
pub async fn issue_locations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IssueListQuery>,
) -> ApiResult<Vec<IssueLocation>> {
    let filter = validate_issue_filter(&query.status, &query.category, &query.urgency)
        .map_err(|e| state.fail(e))?;
    let page = parse_page(&query.page, &query.limit, DEFAULT_LOCATIONS_LIMIT, MAX_LOCATIONS_LIMIT);

    if !state.store.is_ready() {
        tracing::warn!("Store disconnected, returning no issue locations");
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::success(Vec::new()).with_count(0)),
        ));
    }

    let (issues, _) = state
        .store
        .list_issues(&filter, Some(page))
        .await
        .map_err(|e| state.fail(e))?;

    let locations: Vec<IssueLocation> = issues.iter().filter_map(IssueLocation::from_issue).collect();
    let count = locations.len();
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(locations).with_count(count)),
    ))
}

/// Every issue reported by one user, newest first.
pub async fn user_issues(
    State(state): State<AppState>,
    Path(clerk_id): Path<String>,
    ApiQuery(query): ApiQuery<UserIssuesQuery>,
) -> ApiResult<Vec<Issue>> {
    let mut filter =
        validate_issue_filter(&query.status, &None, &None).map_err(|e| state.fail(e))?;
    filter.clerk_id = Some(clerk_id);

    if !state.store.is_ready() {
        tracing::warn!("Store disconnected, returning empty user issue list");
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::success(Vec::new()).with_count(0)),
        ));
    }

    let (issues, _) = state
        .store
        .list_issues(&filter, None)
        .await
        .map_err(|e| state.fail(e))?;
    let count = issues.len();
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(issues).with_count(count)),
    ))
}

/// One issue with its reporter's contact details.
pub async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<IssueWithOwner> {
    let id = parse_issue_id(&id).map_err(|e| state.fail(e))?;
    let issue = lifecycle::find_issue(state.store(), id)
        .await
        .map_err(|e| state.fail(e))?;
    let owner = state
        .store
        .find_user(issue.user_id)
        .await
        .map_err(|e| state.fail(e))?
        .map(|user| OwnerSummary::with_phone(&user));
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(IssueWithOwner { issue, owner })),
    ))
}

/// Aggregate counts for the admin dashboard. Zeroed when the store is unreachable.
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    if !state.store.is_ready() {
        tracing::warn!("Store disconnected, returning empty dashboard");
        return Ok((StatusCode::OK, Json(ApiResponse::success(DashboardStats::default()))));
    }

    let counts = state.store.count_issues_by_status(None).await;
    let users = state.store.count_users().await;
    let (breakdown, total_users) = match (counts, users) {
        (Ok(breakdown), Ok(total_users)) => (breakdown, total_users),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Dashboard query failed, returning empty dashboard");
            return Ok((StatusCode::OK, Json(ApiResponse::success(DashboardStats::default()))));
        }
    };

    let count_of = |status: IssueStatus| -> i64 {
        breakdown
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.count)
            .sum()
    };
    let stats = DashboardStats {
        total_issues: breakdown.iter().map(|c| c.count).sum(),
        total_users,
        pending_issues: count_of(IssueStatus::Pending),
        in_progress_issues: count_of(IssueStatus::InProgress),
        resolved_issues: count_of(IssueStatus::Resolved),
        breakdown,
    };
    Ok((StatusCode::OK, Json(ApiResponse::success(stats))))
}

// =============================================================================
// Mutations
// =============================================================================

/// Partial edit. Status changes require a staff caller when enforced.
pub async fn edit_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<EditIssueRequest>,
) -> ApiResult<Issue> {
    let id = parse_issue_id(&id).map_err(|e| state.fail(e))?;
    let edit = validate_issue_edit(&input).map_err(|e| state.fail(e))?;

    if edit.status.is_some() {
        auth::require_staff(state.store(), &headers, state.require_admin_role)
            .await
            .map_err(|e| state.fail(e))?;
    }

    let issue = lifecycle::edit_issue(state.store(), id, edit)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(issue).with_message("Issue updated successfully")),
    ))
}

/// Append a history entry, optionally moving the issue to a new status.
pub async fn add_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<AddUpdateRequest>,
) -> ApiResult<Issue> {
    let id = parse_issue_id(&id).map_err(|e| state.fail(e))?;
    let update = validate_add_update(&input).map_err(|e| state.fail(e))?;

    if update.status.is_some() {
        auth::require_staff(state.store(), &headers, state.require_admin_role)
            .await
            .map_err(|e| state.fail(e))?;
    }

    let issue = lifecycle::apply_update(state.store(), id, update)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(issue).with_message("Update added successfully")),
    ))
}

pub async fn delete_issue(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_issue_id(&id).map_err(|e| state.fail(e))?;
    let issue = lifecycle::delete_issue(state.store(), id)
        .await
        .map_err(|e| state.fail(e))?;

    uploads::remove_files(&state.upload_dir, issue.media.filenames()).await;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok("Issue deleted successfully")),
    ))
}
