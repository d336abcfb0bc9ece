use serde::{Deserialize, Serialize};

use super::repo_types::{Role, User};

/// Fields are optional so missing ones surface as 400 with a message
/// instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// General update payload. A password here is rejected outright; the
/// credential does not change through this route.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub profile_picture: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_PICTURE;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn auth_response_carries_no_credential() {
        let response = AuthResponse {
            token: "tok".into(),
            user: User {
                id: Uuid::new_v4(),
                name: "Ana".into(),
                email: "ana@example.com".into(),
                role: Role::User,
                profile_picture: DEFAULT_PICTURE.into(),
                created_at: OffsetDateTime::now_utc(),
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"token\":\"tok\""));
        assert!(!json.contains("password"));
    }

    #[test]
    fn update_request_surfaces_a_password_field() {
        let payload: UpdateRequest =
            serde_json::from_str(r#"{"name":"Bo","password":"sneaky"}"#).unwrap();
        assert_eq!(payload.password.as_deref(), Some("sneaky"));
    }

    #[test]
    fn register_request_tolerates_missing_fields() {
        let payload: RegisterRequest = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert!(payload.name.is_none());
        assert!(payload.password.is_none());
        assert!(payload.role.is_none());
    }
}
