//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 4] = [
        IssueStatus::Pending,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
        IssueStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Pending => "pending",
            IssueStatus::InProgress => "in-progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_urgency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }

    /// Priority derived from urgency. Issues never store an independent priority.
    pub fn priority(self) -> i32 {
        match self {
            Urgency::Low => 1,
            Urgency::Medium => 2,
            Urgency::High => 3,
            Urgency::Critical => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_category")]
pub enum Category {
    Potholes,
    #[serde(rename = "Street Lights")]
    #[sqlx(rename = "Street Lights")]
    StreetLights,
    #[serde(rename = "Garbage Collection")]
    #[sqlx(rename = "Garbage Collection")]
    GarbageCollection,
    #[serde(rename = "Water Supply")]
    #[sqlx(rename = "Water Supply")]
    WaterSupply,
    Drainage,
    #[serde(rename = "Public Property Damage")]
    #[sqlx(rename = "Public Property Damage")]
    PublicPropertyDamage,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Potholes,
        Category::StreetLights,
        Category::GarbageCollection,
        Category::WaterSupply,
        Category::Drainage,
        Category::PublicPropertyDamage,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Potholes => "Potholes",
            Category::StreetLights => "Street Lights",
            Category::GarbageCollection => "Garbage Collection",
            Category::WaterSupply => "Water Supply",
            Category::Drainage => "Drainage",
            Category::PublicPropertyDamage => "Public Property Damage",
            Category::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Moderator,
}

impl Role {
    /// Admins and moderators may move issues through their lifecycle.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StatusUpdate,
    Comment,
    Resolved,
    Rejected,
}

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

macro_rules! impl_str_enum {
    ($ty:ty, $all:expr) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $all.into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant(s.to_string()))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_str_enum!(IssueStatus, IssueStatus::ALL);
impl_str_enum!(Category, Category::ALL);
impl_str_enum!(
    Urgency,
    [Urgency::Low, Urgency::Medium, Urgency::High, Urgency::Critical]
);

// =============================================================================
// Issue
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub url: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub images: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
}

impl Media {
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.images
            .iter()
            .chain(self.videos.iter())
            .map(|m| m.filename.as_str())
    }
}

/// One entry of an issue's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpdate {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub message: String,
    pub updated_by: String,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub clerk_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: Location,
    pub urgency: Urgency,
    pub status: IssueStatus,
    pub priority: i32,
    pub media: Media,
    pub updates: Vec<IssueUpdate>,
    pub assigned_to: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new issue.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub clerk_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: Location,
    pub urgency: Urgency,
}

/// Validated partial edit of an issue. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct IssueEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub address: Option<String>,
    pub urgency: Option<Urgency>,
    pub status: Option<IssueStatus>,
    pub updated_by: Option<String>,
}

/// Validated history entry request.
#[derive(Debug, Clone)]
pub struct NewUpdate {
    pub message: String,
    pub updated_by: String,
    pub status: Option<IssueStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub category: Option<Category>,
    pub urgency: Option<Urgency>,
    pub clerk_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Rows to skip. Saturates for pages far past the end.
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    #[serde(rename = "_id")]
    pub status: IssueStatus,
    pub count: i64,
}

/// Map-view projection served to the client map.
#[derive(Debug, Clone, Serialize)]
pub struct IssueLocation {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub category: Category,
    pub status: IssueStatus,
    pub urgency: Urgency,
    pub location: LocationPoint,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationPoint {
    pub address: String,
    pub coordinates: Coordinates,
}

impl IssueLocation {
    /// Projects an issue onto the map view, skipping issues without usable coordinates.
    pub fn from_issue(issue: &Issue) -> Option<Self> {
        let coordinates = issue.location.coordinates.filter(Coordinates::is_valid)?;
        Some(Self {
            id: issue.id,
            title: issue.title.clone(),
            category: issue.category,
            status: issue.status,
            urgency: issue.urgency,
            location: LocationPoint {
                address: issue.location.address.clone(),
                coordinates,
            },
        })
    }
}

/// Issue with its reporter embedded, as served to list and detail views.
#[derive(Debug, Clone, Serialize)]
pub struct IssueWithOwner {
    #[serde(flatten)]
    pub issue: Issue,
    /// `None` when the reporter no longer exists.
    pub owner: Option<OwnerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub image_url: Option<String>,
    /// Only filled on the detail view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl OwnerSummary {
    pub fn of(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            image_url: user.image_url.clone(),
            phone: None,
        }
    }

    pub fn with_phone(user: &User) -> Self {
        Self {
            phone: user.phone.clone(),
            ..Self::of(user)
        }
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    /// Overlays the provided parts, keeping existing values where a part is absent.
    pub fn merge(&mut self, other: Address) {
        fn pick(current: &mut Option<String>, incoming: Option<String>) {
            if let Some(value) = incoming.filter(|v| !v.trim().is_empty()) {
                *current = Some(value);
            }
        }
        pick(&mut self.street, other.street);
        pick(&mut self.city, other.city);
        pick(&mut self.state, other.state);
        pick(&mut self.zip_code, other.zip_code);
    }
}

/// Cached per-user issue counts. Only as fresh as the last recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_reports: i64,
    pub resolved_reports: i64,
    pub pending_reports: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub issue_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification with a summary of the issue it refers to.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationWithIssue {
    #[serde(flatten)]
    pub notification: Notification,
    /// `None` once the issue has been deleted.
    pub issue: Option<IssueSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub status: IssueStatus,
    pub category: Category,
}

impl From<&Issue> for IssueSummary {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id,
            title: issue.title.clone(),
            status: issue.status,
            category: issue.category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub clerk_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub role: Role,
    pub is_active: bool,
    pub stats: UserStats,
    pub notifications: Vec<Notification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated user profile, keyed by the identity provider's id.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub clerk_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

impl User {
    pub fn new(profile: UserProfile, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            clerk_id: profile.clerk_id,
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            image_url: profile.image_url,
            phone: profile.phone,
            address: profile.address.unwrap_or_default(),
            role,
            is_active: true,
            stats: UserStats::default(),
            notifications: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the required fields and keeps optional ones that the profile omits.
    pub fn apply_profile(&mut self, profile: UserProfile, now: DateTime<Utc>) {
        self.email = profile.email;
        self.first_name = profile.first_name;
        if profile.last_name.is_some() {
            self.last_name = profile.last_name;
        }
        if profile.image_url.is_some() {
            self.image_url = profile.image_url;
        }
        if profile.phone.is_some() {
            self.phone = profile.phone;
        }
        if let Some(address) = profile.address {
            self.address = address;
        }
        self.updated_at = now;
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Issue submission as sent by the client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    pub clerk_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Either the address string or `{address, coordinates}`.
    pub location: Option<serde_json::Value>,
    pub urgency: Option<String>,
    pub coordinates: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub urgency: Option<String>,
    pub status: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUpdateRequest {
    pub message: Option<String>,
    pub updated_by: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub clerk_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(total: i64, request: PageRequest) -> Self {
        let pages = if request.limit > 0 {
            (total + request.limit - 1) / request.limit
        } else {
            0
        };
        Self {
            total,
            page: request.page,
            pages,
            limit: request.limit,
        }
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            pagination: None,
            count: None,
            unread_count: None,
            field: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error: None,
            pagination: None,
            count: None,
            unread_count: None,
            field: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_unread_count(mut self, unread: usize) -> Self {
        self.unread_count = Some(unread);
        self
    }
}

impl ApiResponse<()> {
    /// A successful response with only a message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            data: None,
            ..Self::success(())
        }
        .with_message(message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_issues: i64,
    pub total_users: i64,
    pub pending_issues: i64,
    pub in_progress_issues: i64,
    pub resolved_issues: i64,
    pub breakdown: Vec<StatusCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_follows_urgency() {
        assert_eq!(Urgency::Low.priority(), 1);
        assert_eq!(Urgency::Medium.priority(), 2);
        assert_eq!(Urgency::High.priority(), 3);
        assert_eq!(Urgency::Critical.priority(), 4);
        assert_eq!(Urgency::default(), Urgency::Medium);
    }

    #[test]
    fn test_page_offset_saturates() {
        assert_eq!(PageRequest { page: 1, limit: 50 }.offset(), 0);
        assert_eq!(PageRequest { page: 3, limit: 20 }.offset(), 40);
        assert_eq!(
            PageRequest {
                page: i64::MAX,
                limit: 100
            }
            .offset(),
            i64::MAX
        );
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("in-progress".parse(), Ok(IssueStatus::InProgress));
        assert_eq!(" Street Lights ".parse(), Ok(Category::StreetLights));
        assert_eq!("critical".parse(), Ok(Urgency::Critical));
        assert!("done".parse::<IssueStatus>().is_err());
        assert!("potholes".parse::<Category>().is_err());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_value(IssueStatus::InProgress).unwrap(),
            "in-progress"
        );
        assert_eq!(
            serde_json::to_value(Category::PublicPropertyDamage).unwrap(),
            "Public Property Damage"
        );
        assert_eq!(
            serde_json::to_value(NotificationType::StatusUpdate).unwrap(),
            "status_update"
        );
    }

    #[test]
    fn test_pagination_pages() {
        let p = Pagination::new(101, PageRequest { page: 2, limit: 50 });
        assert_eq!(p.pages, 3);
        assert_eq!(Pagination::new(0, PageRequest { page: 1, limit: 50 }).pages, 0);
        assert_eq!(PageRequest { page: 3, limit: 20 }.offset(), 40);
    }

    #[test]
    fn test_address_merge_keeps_missing_parts() {
        let mut address = Address {
            street: Some("1 Main St".into()),
            city: Some("Pune".into()),
            state: None,
            zip_code: Some("411001".into()),
        };
        address.merge(Address {
            city: Some("Mumbai".into()),
            state: Some("MH".into()),
            zip_code: Some("".into()),
            ..Default::default()
        });
        assert_eq!(address.street.as_deref(), Some("1 Main St"));
        assert_eq!(address.city.as_deref(), Some("Mumbai"));
        assert_eq!(address.state.as_deref(), Some("MH"));
        assert_eq!(address.zip_code.as_deref(), Some("411001"));
    }

    #[test]
    fn test_error_envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::<()>::error("Issue not found")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Issue not found");
        assert!(body.get("data").is_none());
        assert!(body.get("pagination").is_none());
    }
}
