use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account roles, a closed set so policy checks stay exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::User => f.write_str("user"),
        }
    }
}

/// User record as read on all normal paths. The credential column is
/// excluded at the query level and has no field here, so it cannot appear
/// in any JSON this type produces.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_picture: String,
    pub created_at: OffsetDateTime,
}

/// Login-only read that includes the stored hash. Deliberately not
/// serializable.
#[derive(Debug, Clone, FromRow)]
pub struct UserWithCredential {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile_picture: String,
    pub created_at: OffsetDateTime,
}

impl UserWithCredential {
    pub fn into_public(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
            profile_picture: self.profile_picture,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_PICTURE;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Role::User,
            profile_picture: DEFAULT_PICTURE.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
        assert_eq!(serde_json::to_value(Role::User).unwrap(), "user");
    }

    #[test]
    fn role_rejects_unknown_values() {
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }

    #[test]
    fn default_role_is_user() {
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn public_user_json_never_contains_a_credential() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("ana@example.com"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn into_public_drops_the_hash() {
        let record = UserWithCredential {
            id: Uuid::new_v4(),
            name: "Bo".into(),
            email: "bo@example.com".into(),
            password_hash: "$argon2id$...".into(),
            role: Role::Admin,
            profile_picture: DEFAULT_PICTURE.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let public = record.into_public();
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }
}
