//! Caller identification and staff authorization
//!
//! Authentication itself happens at the identity provider. Requests carry the
//! provider's user id in `X-Clerk-User-Id`, and authorization decisions are
//! made against the `role` stored for that user.

use crate::error::AppError;
use crate::models::{Role, User};
use crate::store::Store;
use axum::http::HeaderMap;

pub const CLERK_USER_HEADER: &str = "x-clerk-user-id";

/// The caller's external user id, if the request carries one.
pub fn caller_clerk_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CLERK_USER_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Role assigned at user creation or profile update.
pub fn role_for_email(email: &str, admin_emails: &[String]) -> Role {
    if admin_emails.iter().any(|a| a.eq_ignore_ascii_case(email)) {
        Role::Admin
    } else {
        Role::User
    }
}

/// Require the caller to be an admin or moderator. A no-op when `enforced` is off.
pub async fn require_staff(
    store: &dyn Store,
    headers: &HeaderMap,
    enforced: bool,
) -> Result<Option<User>, AppError> {
    if !enforced {
        return Ok(None);
    }

    let Some(clerk_id) = caller_clerk_id(headers) else {
        return Err(AppError::Forbidden(
            "Authentication required to change issue status".to_string(),
        ));
    };

    match store.find_user_by_clerk_id(clerk_id).await? {
        Some(user) if user.role.is_staff() && user.is_active => Ok(Some(user)),
        _ => {
            tracing::warn!(clerk_id = %clerk_id, "Status change refused for non-staff caller");
            Err(AppError::Forbidden(
                "Only admins and moderators can change issue status".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::store::memory::MemoryStore;
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn user(clerk_id: &str, role: Role) -> User {
        User::new(
            UserProfile {
                clerk_id: clerk_id.into(),
                email: format!("{}@example.com", clerk_id),
                first_name: "Test".into(),
                last_name: None,
                image_url: None,
                phone: None,
                address: None,
            },
            role,
            Utc::now(),
        )
    }

    fn headers(clerk_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CLERK_USER_HEADER, HeaderValue::from_str(clerk_id).unwrap());
        headers
    }

    #[test]
    fn test_caller_clerk_id() {
        assert_eq!(caller_clerk_id(&headers(" user_1 ")), Some("user_1"));
        assert_eq!(caller_clerk_id(&headers("")), None);
        assert_eq!(caller_clerk_id(&HeaderMap::new()), None);
    }

    #[test]
    fn test_role_for_email() {
        let admins = vec!["chief@city.gov".to_string()];
        assert_eq!(role_for_email("Chief@City.gov", &admins), Role::Admin);
        assert_eq!(role_for_email("someone@city.gov", &admins), Role::User);
        assert_eq!(role_for_email("chief@city.gov", &[]), Role::User);
    }

    #[tokio::test]
    async fn test_require_staff() {
        let store = MemoryStore::new();
        store.insert_user(&user("admin_1", Role::Admin)).await.unwrap();
        store.insert_user(&user("mod_1", Role::Moderator)).await.unwrap();
        store.insert_user(&user("user_1", Role::User)).await.unwrap();

        assert!(require_staff(&store, &HeaderMap::new(), false)
            .await
            .unwrap()
            .is_none());
        assert!(require_staff(&store, &headers("admin_1"), true).await.is_ok());
        assert!(require_staff(&store, &headers("mod_1"), true).await.is_ok());
        assert!(matches!(
            require_staff(&store, &headers("user_1"), true).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_staff(&store, &headers("ghost"), true).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_staff(&store, &HeaderMap::new(), true).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
