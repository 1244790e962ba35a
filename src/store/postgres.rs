//! PostgreSQL-backed document store
//!
//! Each user and issue is one row; embedded lists are JSONB columns.

use super::{Store, StoreError, StoreResult};
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// PostgreSQL unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                let field = match db_err.constraint() {
                    Some("uq_users_email") => "email",
                    Some("uq_users_clerk_id") => "clerkId",
                    Some(other) => other,
                    None => "unknown",
                };
                StoreError::Duplicate {
                    field: field.to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                tracing::warn!(error = %err, "Store connection unavailable");
                StoreError::Unavailable
            }
            other => StoreError::Database(other),
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    clerk_id: String,
    email: String,
    first_name: String,
    last_name: Option<String>,
    image_url: Option<String>,
    phone: Option<String>,
    address: Json<Address>,
    role: Role,
    is_active: bool,
    total_reports: i64,
    resolved_reports: i64,
    pending_reports: i64,
    notifications: Json<Vec<Notification>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            clerk_id: row.clerk_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            image_url: row.image_url,
            phone: row.phone,
            address: row.address.0,
            role: row.role,
            is_active: row.is_active,
            stats: UserStats {
                total_reports: row.total_reports,
                resolved_reports: row.resolved_reports,
                pending_reports: row.pending_reports,
            },
            notifications: row.notifications.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct IssueRow {
    id: Uuid,
    user_id: Uuid,
    clerk_id: String,
    title: String,
    description: String,
    category: Category,
    address: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    urgency: Urgency,
    status: IssueStatus,
    priority: i32,
    images: Json<Vec<MediaItem>>,
    videos: Json<Vec<MediaItem>>,
    updates: Json<Vec<IssueUpdate>>,
    assigned_to: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IssueRow> for Issue {
    fn from(row: IssueRow) -> Self {
        let coordinates = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            user_id: row.user_id,
            clerk_id: row.clerk_id,
            title: row.title,
            description: row.description,
            category: row.category,
            location: Location {
                address: row.address,
                coordinates,
            },
            urgency: row.urgency,
            status: row.status,
            priority: row.priority,
            media: Media {
                images: row.images.0,
                videos: row.videos.0,
            },
            updates: row.updates.0,
            assigned_to: row.assigned_to,
            resolved_at: row.resolved_at,
            rejected_at: row.rejected_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn push_issue_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &IssueFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(category) = filter.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(urgency) = filter.urgency {
        qb.push(" AND urgency = ").push_bind(urgency);
    }
    if let Some(ref clerk_id) = filter.clerk_id {
        qb.push(" AND clerk_id = ").push_bind(clerk_id.clone());
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    fn is_ready(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_clerk_id(&self, clerk_id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE clerk_id = $1")
            .bind(clerk_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, clerk_id, email, first_name, last_name, image_url, phone, address,
                role, is_active, total_reports, resolved_reports, pending_reports,
                notifications, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(user.id)
        .bind(&user.clerk_id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.image_url)
        .bind(&user.phone)
        .bind(Json(&user.address))
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.stats.total_reports)
        .bind(user.stats.resolved_reports)
        .bind(user.stats.pending_reports)
        .bind(Json(&user.notifications))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_user_profile(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                first_name = $3,
                last_name = $4,
                image_url = $5,
                phone = $6,
                address = $7,
                role = $8,
                is_active = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.image_url)
        .bind(&user.phone)
        .bind(Json(&user.address))
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_user_stats(&self, user_id: Uuid, stats: &UserStats) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                total_reports = $2,
                resolved_reports = $3,
                pending_reports = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(stats.total_reports)
        .bind(stats.resolved_reports)
        .bind(stats.pending_reports)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_notifications(
        &self,
        user_id: Uuid,
        notifications: &[Notification],
    ) -> StoreResult<()> {
        sqlx::query("UPDATE users SET notifications = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(Json(notifications))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_user_by_clerk_id(&self, clerk_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE clerk_id = $1")
            .bind(clerk_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_issue(&self, issue: &Issue) -> StoreResult<()> {
        let coordinates = issue.location.coordinates;
        sqlx::query(
            r#"
            INSERT INTO issues (
                id, user_id, clerk_id, title, description, category, address,
                latitude, longitude, urgency, status, priority, images, videos,
                updates, assigned_to, resolved_at, rejected_at, rejection_reason,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(issue.id)
        .bind(issue.user_id)
        .bind(&issue.clerk_id)
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(issue.category)
        .bind(&issue.location.address)
        .bind(coordinates.map(|c| c.latitude))
        .bind(coordinates.map(|c| c.longitude))
        .bind(issue.urgency)
        .bind(issue.status)
        .bind(issue.priority)
        .bind(Json(&issue.media.images))
        .bind(Json(&issue.media.videos))
        .bind(Json(&issue.updates))
        .bind(&issue.assigned_to)
        .bind(issue.resolved_at)
        .bind(issue.rejected_at)
        .bind(&issue.rejection_reason)
        .bind(issue.created_at)
        .bind(issue.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_issue(&self, id: Uuid) -> StoreResult<Option<Issue>> {
        let row = sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Issue::from))
    }

    async fn find_issues(&self, ids: &[Uuid]) -> StoreResult<Vec<Issue>> {
        let rows = sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Issue::from).collect())
    }

    async fn save_issue(&self, issue: &Issue) -> StoreResult<()> {
        let coordinates = issue.location.coordinates;
        sqlx::query(
            r#"
            UPDATE issues SET
                title = $2,
                description = $3,
                category = $4,
                address = $5,
                latitude = $6,
                longitude = $7,
                urgency = $8,
                status = $9,
                priority = $10,
                images = $11,
                videos = $12,
                updates = $13,
                assigned_to = $14,
                resolved_at = $15,
                rejected_at = $16,
                rejection_reason = $17,
                updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(issue.id)
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(issue.category)
        .bind(&issue.location.address)
        .bind(coordinates.map(|c| c.latitude))
        .bind(coordinates.map(|c| c.longitude))
        .bind(issue.urgency)
        .bind(issue.status)
        .bind(issue.priority)
        .bind(Json(&issue.media.images))
        .bind(Json(&issue.media.videos))
        .bind(Json(&issue.updates))
        .bind(&issue.assigned_to)
        .bind(issue.resolved_at)
        .bind(issue.rejected_at)
        .bind(&issue.rejection_reason)
        .bind(issue.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_issue(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM issues WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_issues(
        &self,
        filter: &IssueFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<(Vec<Issue>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM issues");
        push_issue_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC");
        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(page.limit)
                .push(" OFFSET ")
                .push_bind(page.offset());
        }
        let rows = qb
            .build_query_as::<IssueRow>()
            .fetch_all(&self.pool)
            .await?;

        let total = match page {
            Some(_) => {
                let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM issues");
                push_issue_filter(&mut count, filter);
                count
                    .build_query_scalar::<i64>()
                    .fetch_one(&self.pool)
                    .await?
            }
            None => rows.len() as i64,
        };

        Ok((rows.into_iter().map(Issue::from).collect(), total))
    }

    async fn count_issues_by_status(
        &self,
        user_id: Option<Uuid>,
    ) -> StoreResult<Vec<StatusCount>> {
        let rows: Vec<(IssueStatus, i64)> = match user_id {
            Some(user_id) => {
                sqlx::query_as(
                    r#"
                    SELECT status, COUNT(*) AS count
                    FROM issues
                    WHERE user_id = $1
                    GROUP BY status
                    ORDER BY status
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT status, COUNT(*) AS count FROM issues GROUP BY status ORDER BY status",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }
}
