//! HTTP request handlers

pub mod extract;
pub mod issues;
pub mod middleware;
pub mod users;


use crate::error::{ApiError, AppError};
use crate::models::ApiResponse;
use crate::store::Store;
use crate::uploads::{MAX_IMAGES, MAX_VIDEOS};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir};

/// Room for form fields and multipart framing on top of the files themselves.
const FORM_OVERHEAD: usize = 1024 * 1024;

/// Body limit for every route other than issue creation.
pub const JSON_BODY_LIMIT: usize = 100 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub upload_dir: PathBuf,
    pub max_upload_size: usize,
    pub is_production: bool,
    pub require_admin_role: bool,
    pub admin_emails: Arc<Vec<String>>,
}

impl AppState {
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Render an error; internal details are hidden in production.
    pub fn fail(&self, err: impl Into<AppError>) -> ApiError {
        err.into().expose(!self.is_production)
    }

    /// Body limit for issue creation, which may carry every media file at once.
    fn upload_body_limit(&self) -> usize {
        self.max_upload_size
            .saturating_mul(MAX_IMAGES + MAX_VIDEOS)
            .saturating_add(FORM_OVERHEAD)
    }
}

/// Build the application router: the API under `/api`, media under `/uploads`.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/issues",
            post(issues::create_issue)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(state.upload_body_limit()))
                .get(issues::list_issues),
        )
        .route("/issues/locations", get(issues::issue_locations))
        .route("/issues/stats/dashboard", get(issues::dashboard_stats))
        .route("/issues/user/:clerk_id", get(issues::user_issues))
        .route(
            "/issues/:id",
            get(issues::get_issue)
                .put(issues::edit_issue)
                .delete(issues::delete_issue),
        )
        .route("/issues/:id/updates", post(issues::add_update))
        .route("/users/profile", post(users::upsert_user))
        .route(
            "/users/profile/:clerk_id",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/users/stats/:clerk_id", get(users::user_stats))
        .route("/users/address/:clerk_id", put(users::update_address))
        .route(
            "/users/notifications/:clerk_id",
            get(users::list_notifications),
        )
        .route(
            "/users/notifications/:clerk_id/read-all",
            put(users::mark_all_notifications_read),
        )
        .route(
            "/users/notifications/:clerk_id/:notification_id/read",
            put(users::mark_notification_read),
        );

    Router::new()
        .route("/", get(root))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&state.upload_dir))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers,
        ))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "CityCare API is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
    }))
}

async fn not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Route not found")),
    )
}
