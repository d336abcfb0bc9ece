use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::{
    accounts::repo_types::{Role, User},
    error::ApiError,
    state::AppState,
};

/// Identity resolved by the authentication gate: the only input any
/// downstream role or ownership check may trust.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

/// Pulls the token out of `Authorization: Bearer <token>`. Single exit per
/// rejection: an absent header, a non-Bearer scheme and an empty token all
/// report the same "no token" condition exactly once.
pub(crate) fn bearer_token(header: Option<&str>) -> Result<&str, ApiError> {
    let auth = header.ok_or_else(|| ApiError::Unauthenticated("no token".into()))?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("no token".into()))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            ApiError::Unauthenticated("invalid or expired token".into())
        })?;

        // The id must still resolve to a record; reads here exclude the
        // credential column.
        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token for unknown user");
                ApiError::Unauthenticated("user not found".into())
            })?;

        Ok(CurrentUser {
            id: user.id,
            role: user.role,
        })
    }
}

/// Authorization gate for admin-only routes. Runs the authentication gate
/// first, then checks the resolved role.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let caller = CurrentUser::from_request_parts(parts, state).await?;
        if caller.role != Role::Admin {
            warn!(caller_id = %caller.id, role = %caller.role, "admin route denied");
            return Err(ApiError::Forbidden(format!(
                "role '{}' may not access this route",
                caller.role
            )));
        }
        Ok(RequireAdmin(caller))
    }
}
