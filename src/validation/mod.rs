//! Input validation module

use crate::models::{
    Address, AddUpdateRequest, Category, Coordinates, CreateIssueRequest, EditIssueRequest,
    IssueEdit, IssueFilter, IssueStatus, Location, NewIssue, NewUpdate, PageRequest, Urgency,
    UpsertUserRequest, UserProfile,
};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_NAME_LEN: usize = 100;
const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidChoice { field: String, value: String },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid file type: {mime_type}")]
    InvalidFileType { mime_type: String },

    #[error("File too large (max {max_mb} MB)")]
    FileTooLarge { max_mb: usize },

    #[error("Too many files for '{field}' (max {max})")]
    TooManyFiles { field: String, max: usize },

    #[error("Unexpected file field '{field}'")]
    UnexpectedField { field: String },

    #[error("Malformed request: {0}")]
    Malformed(String),
}

/// Returns the trimmed value, or `None` when absent or blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ValidationError> {
    present(value).ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

fn check_len(value: &str, field: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

fn parse_choice<T: FromStr>(value: &str, field: &str) -> Result<T, ValidationError> {
    value.parse().map_err(|_| ValidationError::InvalidChoice {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn optional_choice<T: FromStr>(
    value: &Option<String>,
    field: &str,
) -> Result<Option<T>, ValidationError> {
    present(value).map(|v| parse_choice(v, field)).transpose()
}

// =============================================================================
// Issues
// =============================================================================

/// Validate an issue submission
pub fn validate_create_issue(input: &CreateIssueRequest) -> Result<NewIssue, ValidationError> {
    let clerk_id = required(&input.clerk_id, "clerkId")?;
    let title = required(&input.title, "title")?;
    check_len(title, "title", MAX_TITLE_LEN)?;
    let description = required(&input.description, "description")?;
    check_len(description, "description", MAX_DESCRIPTION_LEN)?;
    let category: Category = parse_choice(required(&input.category, "category")?, "category")?;
    let urgency = optional_choice::<Urgency>(&input.urgency, "urgency")?.unwrap_or_default();

    let mut location = match &input.location {
        Some(value) => parse_location(value)?,
        None => None,
    }
    .ok_or_else(|| ValidationError::Required {
        field: "location".to_string(),
    })?;

    // A top-level coordinates field takes precedence over one nested in location
    if let Some(coordinates) = input.coordinates.as_ref().and_then(parse_coordinates) {
        location.coordinates = Some(coordinates);
    }

    Ok(NewIssue {
        clerk_id: clerk_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        category,
        location,
        urgency,
    })
}

/// Accepts a bare address string or an object with `address` and optional `coordinates`.
fn parse_location(value: &Value) -> Result<Option<Location>, ValidationError> {
    let (address, coordinates) = match value {
        Value::String(address) => (address.as_str(), None),
        Value::Object(map) => {
            let address = map.get("address").and_then(Value::as_str).unwrap_or("");
            (address, map.get("coordinates").and_then(parse_coordinates))
        }
        Value::Null => return Ok(None),
        other => {
            return Err(ValidationError::Malformed(format!(
                "location must be a string or an object, got {}",
                other
            )))
        }
    };

    let address = address.trim();
    if address.is_empty() {
        return Ok(None);
    }
    Ok(Some(Location {
        address: address.to_string(),
        coordinates,
    }))
}

/// Parses client coordinates leniently.
///
/// Accepts an object or a JSON-encoded string, keyed by `lat`/`lng` or
/// `latitude`/`longitude`, with numeric or numeric-string values. Anything
/// that does not yield two finite numbers is dropped.
pub fn parse_coordinates(value: &Value) -> Option<Coordinates> {
    let value = match value {
        Value::String(raw) => serde_json::from_str::<Value>(raw).ok()?,
        other => other.clone(),
    };
    let map = value.as_object()?;

    let number = |keys: [&str; 2]| -> Option<f64> {
        keys.iter().find_map(|key| match map.get(*key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    };

    let coordinates = Coordinates {
        latitude: number(["latitude", "lat"])?,
        longitude: number(["longitude", "lng"])?,
    };
    coordinates.is_valid().then_some(coordinates)
}

/// Validate a partial issue edit. Blank fields count as absent.
pub fn validate_issue_edit(input: &EditIssueRequest) -> Result<IssueEdit, ValidationError> {
    let title = present(&input.title);
    if let Some(title) = title {
        check_len(title, "title", MAX_TITLE_LEN)?;
    }
    let description = present(&input.description);
    if let Some(description) = description {
        check_len(description, "description", MAX_DESCRIPTION_LEN)?;
    }

    Ok(IssueEdit {
        title: title.map(str::to_string),
        description: description.map(str::to_string),
        category: optional_choice(&input.category, "category")?,
        address: present(&input.location).map(str::to_string),
        urgency: optional_choice(&input.urgency, "urgency")?,
        status: optional_choice(&input.status, "status")?,
        updated_by: present(&input.updated_by).map(str::to_string),
    })
}

/// Validate a history entry
pub fn validate_add_update(input: &AddUpdateRequest) -> Result<NewUpdate, ValidationError> {
    let message = required(&input.message, "message")?;
    check_len(message, "message", MAX_MESSAGE_LEN)?;
    let updated_by = required(&input.updated_by, "updatedBy")?;
    check_len(updated_by, "updatedBy", MAX_NAME_LEN)?;

    Ok(NewUpdate {
        message: message.to_string(),
        updated_by: updated_by.to_string(),
        status: optional_choice(&input.status, "status")?,
    })
}

/// Validate list filters. Unknown enum values are rejected rather than matching nothing.
pub fn validate_issue_filter(
    status: &Option<String>,
    category: &Option<String>,
    urgency: &Option<String>,
) -> Result<IssueFilter, ValidationError> {
    Ok(IssueFilter {
        status: optional_choice(status, "status")?,
        category: optional_choice(category, "category")?,
        urgency: optional_choice(urgency, "urgency")?,
        clerk_id: None,
    })
}

/// Parse pagination parameters, falling back to defaults for junk input.
pub fn parse_page(
    page: &Option<String>,
    limit: &Option<String>,
    default_limit: i64,
    max_limit: i64,
) -> PageRequest {
    let parse = |v: &Option<String>| present(v).and_then(|v| v.parse::<i64>().ok());
    PageRequest {
        page: parse(page).unwrap_or(1).max(1),
        limit: parse(limit).unwrap_or(default_limit).clamp(1, max_limit),
    }
}

// =============================================================================
// Users
// =============================================================================

/// Validate a profile upsert. The email is normalised to lowercase.
pub fn validate_user_profile(input: &UpsertUserRequest) -> Result<UserProfile, ValidationError> {
    let clerk_id = required(&input.clerk_id, "clerkId")?;
    let email = required(&input.email, "email")?.to_lowercase();
    let first_name = required(&input.first_name, "firstName")?;
    check_len(first_name, "firstName", MAX_NAME_LEN)?;

    if !validator::validate_email(email.as_str()) {
        return Err(ValidationError::InvalidEmail);
    }

    let last_name = present(&input.last_name);
    if let Some(last_name) = last_name {
        check_len(last_name, "lastName", MAX_NAME_LEN)?;
    }

    Ok(UserProfile {
        clerk_id: clerk_id.to_string(),
        email,
        first_name: first_name.to_string(),
        last_name: last_name.map(str::to_string),
        image_url: present(&input.image_url).map(str::to_string),
        phone: present(&input.phone).map(str::to_string),
        address: input.address.clone(),
    })
}

/// Trim address parts; blank parts are treated as absent.
pub fn normalize_address(input: Address) -> Address {
    let clean = |v: Option<String>| present(&v).map(str::to_string);
    Address {
        street: clean(input.street),
        city: clean(input.city),
        state: clean(input.state),
        zip_code: clean(input.zip_code),
    }
}

// =============================================================================
// Uploads
// =============================================================================

/// Validate an uploaded media file.
///
/// `expected_kind` is the top-level MIME type the form field accepts
/// (`image` or `video`). The declared content type and the type sniffed from
/// the file's magic bytes must both belong to it.
pub fn validate_media_upload(
    expected_kind: &str,
    declared_mime: &str,
    detected_mime: Option<&str>,
    file_size: usize,
    max_size_bytes: usize,
) -> Result<(), ValidationError> {
    if file_size > max_size_bytes {
        return Err(ValidationError::FileTooLarge {
            max_mb: max_size_bytes / (1024 * 1024),
        });
    }

    let prefix = format!("{}/", expected_kind);
    if !declared_mime.starts_with(&prefix) {
        return Err(ValidationError::InvalidFileType {
            mime_type: declared_mime.to_string(),
        });
    }

    match detected_mime {
        Some(detected) if detected.starts_with(&prefix) => Ok(()),
        Some(detected) => Err(ValidationError::InvalidFileType {
            mime_type: format!("{} (declared {})", detected, declared_mime),
        }),
        None => Err(ValidationError::InvalidFileType {
            mime_type: format!("unrecognized content (declared {})", declared_mime),
        }),
    }
}

/// Dangerous file extensions that could be executed if misconfigured
const DANGEROUS_EXTENSIONS: &[&str] = &[
    ".php", ".phtml", ".php5", ".asp", ".aspx", ".jsp", ".cgi", ".pl", ".py", ".rb",
    ".exe", ".bat", ".cmd", ".com", ".msi", ".dll", ".sh", ".bash", ".js", ".mjs", ".html",
    ".htm", ".svg", ".htaccess", ".jar",
];

/// Reject filenames ending in, or hiding, an executable extension (e.g. `shell.php.jpg`).
pub fn validate_filename_extensions(filename: &str) -> Result<(), ValidationError> {
    let lower = filename.to_lowercase();

    for ext in DANGEROUS_EXTENSIONS {
        if lower.ends_with(ext) || lower.contains(&format!("{}.", ext)) {
            return Err(ValidationError::InvalidFileType {
                mime_type: format!("filename contains dangerous extension: {}", ext),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_request() -> CreateIssueRequest {
        CreateIssueRequest {
            clerk_id: Some("user_1".into()),
            title: Some("Pothole".into()),
            description: Some("Large hole".into()),
            category: Some("Potholes".into()),
            location: Some(json!("Main St")),
            urgency: None,
            coordinates: None,
        }
    }

    #[test]
    fn test_validate_create_issue_defaults_urgency() {
        let issue = validate_create_issue(&issue_request()).unwrap();
        assert_eq!(issue.urgency, Urgency::Medium);
        assert_eq!(issue.category, Category::Potholes);
        assert_eq!(issue.location.address, "Main St");
        assert!(issue.location.coordinates.is_none());
    }

    #[test]
    fn test_validate_create_issue_missing_fields() {
        for field in ["clerkId", "title", "description", "category", "location"] {
            let mut input = issue_request();
            match field {
                "clerkId" => input.clerk_id = None,
                "title" => input.title = Some("   ".into()),
                "description" => input.description = None,
                "category" => input.category = None,
                _ => input.location = Some(json!({ "address": "" })),
            }
            match validate_create_issue(&input) {
                Err(ValidationError::Required { field: f }) => assert_eq!(f, field),
                other => panic!("expected Required for {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_validate_create_issue_bounds() {
        let mut input = issue_request();
        input.title = Some("x".repeat(MAX_TITLE_LEN + 1));
        assert!(matches!(
            validate_create_issue(&input),
            Err(ValidationError::TooLong { max: MAX_TITLE_LEN, .. })
        ));

        let mut input = issue_request();
        input.description = Some("x".repeat(MAX_DESCRIPTION_LEN + 1));
        assert!(matches!(
            validate_create_issue(&input),
            Err(ValidationError::TooLong { .. })
        ));

        let mut input = issue_request();
        input.category = Some("Graffiti".into());
        assert!(matches!(
            validate_create_issue(&input),
            Err(ValidationError::InvalidChoice { .. })
        ));

        let mut input = issue_request();
        input.urgency = Some("urgent".into());
        assert!(matches!(
            validate_create_issue(&input),
            Err(ValidationError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn test_location_object_with_coordinates() {
        let mut input = issue_request();
        input.location = Some(json!({
            "address": "Station Rd",
            "coordinates": { "lat": 18.52, "lng": "73.85" }
        }));
        let issue = validate_create_issue(&input).unwrap();
        assert_eq!(issue.location.address, "Station Rd");
        assert_eq!(
            issue.location.coordinates,
            Some(Coordinates {
                latitude: 18.52,
                longitude: 73.85
            })
        );
    }

    #[test]
    fn test_parse_coordinates_variants() {
        let expected = Some(Coordinates {
            latitude: 1.5,
            longitude: -2.0,
        });
        assert_eq!(parse_coordinates(&json!({"latitude": 1.5, "longitude": -2.0})), expected);
        assert_eq!(parse_coordinates(&json!({"lat": "1.5", "lng": "-2"})), expected);
        assert_eq!(parse_coordinates(&json!(r#"{"lat":1.5,"lng":-2}"#)), expected);
        assert_eq!(parse_coordinates(&json!({"lat": "north", "lng": 2})), None);
        assert_eq!(parse_coordinates(&json!({"lat": 1.0})), None);
        assert_eq!(parse_coordinates(&json!("not json")), None);
    }

    #[test]
    fn test_validate_issue_edit() {
        let edit = validate_issue_edit(&EditIssueRequest {
            title: Some("".into()),
            urgency: Some("high".into()),
            status: Some("resolved".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(edit.title.is_none());
        assert_eq!(edit.urgency, Some(Urgency::High));
        assert_eq!(edit.status, Some(IssueStatus::Resolved));

        assert!(validate_issue_edit(&EditIssueRequest {
            status: Some("closed".into()),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_validate_add_update() {
        let update = validate_add_update(&AddUpdateRequest {
            message: Some("Crew dispatched".into()),
            updated_by: Some("admin".into()),
            status: Some("in-progress".into()),
        })
        .unwrap();
        assert_eq!(update.status, Some(IssueStatus::InProgress));

        assert!(matches!(
            validate_add_update(&AddUpdateRequest {
                message: Some("Hello".into()),
                ..Default::default()
            }),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_parse_page() {
        let page = parse_page(&Some("0".into()), &Some("abc".into()), 50, 100);
        assert_eq!(page, PageRequest { page: 1, limit: 50 });
        let page = parse_page(&Some("3".into()), &Some("500".into()), 50, 100);
        assert_eq!(page, PageRequest { page: 3, limit: 100 });
    }

    #[test]
    fn test_validate_user_profile() {
        let profile = validate_user_profile(&UpsertUserRequest {
            clerk_id: Some("user_1".into()),
            email: Some("  Jane@Example.COM ".into()),
            first_name: Some("Jane".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(profile.email, "jane@example.com");

        assert!(matches!(
            validate_user_profile(&UpsertUserRequest {
                clerk_id: Some("user_1".into()),
                email: Some("not-an-email".into()),
                first_name: Some("Jane".into()),
                ..Default::default()
            }),
            Err(ValidationError::InvalidEmail)
        ));
        assert!(matches!(
            validate_user_profile(&UpsertUserRequest {
                clerk_id: Some("user_1".into()),
                email: Some("jane@example.com".into()),
                ..Default::default()
            }),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_media_upload() {
        let max = 50 * 1024 * 1024;
        assert!(validate_media_upload("image", "image/png", Some("image/png"), 1024, max).is_ok());
        assert!(matches!(
            validate_media_upload("image", "image/png", Some("image/png"), max + 1, max),
            Err(ValidationError::FileTooLarge { max_mb: 50 })
        ));
        assert!(validate_media_upload("image", "video/mp4", Some("video/mp4"), 10, max).is_err());
        assert!(validate_media_upload("image", "image/png", Some("application/pdf"), 10, max).is_err());
        assert!(validate_media_upload("video", "video/mp4", None, 10, max).is_err());
    }

    #[test]
    fn test_validate_filename_extensions() {
        assert!(validate_filename_extensions("pothole.jpg").is_ok());
        assert!(validate_filename_extensions("clip.MP4").is_ok());
        assert!(validate_filename_extensions("shell.php").is_err());
        assert!(validate_filename_extensions("image.exe.jpg").is_err());
        assert!(validate_filename_extensions("PAGE.HTML").is_err());
    }
}
