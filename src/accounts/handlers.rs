use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::{CurrentUser, RequireAdmin},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    storage,
};

use super::{
    dto::{AuthResponse, LoginRequest, PictureResponse, RegisterRequest, UpdateRequest},
    policy,
    repo_types::{User, UserWithCredential},
};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts/register", post(register))
        .route("/accounts/login", post(login))
        .route("/accounts", get(list_accounts))
        .route(
            "/accounts/:id",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route(
            "/accounts/:id/profile-picture",
            post(upload_picture).layer(DefaultBodyLimit::max(MAX_PICTURE_BYTES + 16 * 1024)),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let (name, email, password) = match (payload.name, payload.email, payload.password) {
        (Some(n), Some(e), Some(p)) => (n, e, p),
        _ => {
            warn!("register missing required fields");
            return Err(ApiError::BadRequest(
                "name, email and password are required".into(),
            ));
        }
    };

    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::BadRequest("invalid email".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::BadRequest(
            "password must be at least 6 characters".into(),
        ));
    }

    if User::email_taken(&state.db, &email).await? {
        warn!(%email, "email already registered");
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let hash = hash_password(&password)?;
    // A concurrent register with the same email loses on the unique index,
    // which the error mapping turns into Conflict.
    let user = User::create(&state.db, &name, &email, &hash, payload.role.unwrap_or_default())
        .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (email, password) = match (payload.email, payload.password) {
        (Some(e), Some(p)) => (e, p),
        _ => {
            return Err(ApiError::BadRequest(
                "email and password are required".into(),
            ))
        }
    };
    let email = email.trim().to_lowercase();

    // Unknown email and wrong password fall through to the same answer.
    let Some(record) = UserWithCredential::find_by_email(&state.db, &email).await? else {
        warn!(%email, "login unknown email");
        return Err(invalid_credentials());
    };

    if !verify_password(&password, &record.password_hash)? {
        warn!(user_id = %record.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let keys = JwtKeys::from_ref(&state);
    let user = record.into_public();
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse { token, user }))
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("invalid credentials".into())
}

#[instrument(skip(state))]
pub async fn list_accounts(
    State(state): State<AppState>,
    RequireAdmin(_caller): RequireAdmin,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = User::list(&state.db).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    if !policy::can_access(&caller, id) {
        warn!(caller_id = %caller.id, target = %id, "account read denied");
        return Err(ApiError::Forbidden(
            "you may only access your own account".into(),
        ));
    }

    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRequest>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;

    if payload.password.is_some() {
        warn!(caller_id = %caller.id, "password change attempted through update");
        return Err(ApiError::BadRequest(
            "the password cannot be changed through this route".into(),
        ));
    }
    if !policy::can_access(&caller, id) {
        warn!(caller_id = %caller.id, target = %id, "account update denied");
        return Err(ApiError::Forbidden(
            "you may only update your own account".into(),
        ));
    }
    if let Some(requested) = payload.role {
        if !policy::role_change_allowed(&caller, requested) {
            warn!(caller_id = %caller.id, requested = %requested, "role change denied");
            return Err(ApiError::Forbidden("only an admin may change roles".into()));
        }
    }

    let name = match payload.name.as_deref() {
        Some(n) => {
            let n = n.trim();
            if n.is_empty() {
                return Err(ApiError::BadRequest("name must not be empty".into()));
            }
            Some(n.to_string())
        }
        None => None,
    };
    let email = match payload.email.as_deref() {
        Some(e) => {
            let e = e.trim().to_lowercase();
            if !is_valid_email(&e) {
                return Err(ApiError::BadRequest("invalid email".into()));
            }
            Some(e)
        }
        None => None,
    };

    let user = User::update(&state.db, id, name.as_deref(), email.as_deref(), payload.role)
        .await?
        .ok_or_else(|| not_found(id))?;

    info!(user_id = %user.id, "account updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    RequireAdmin(_caller): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;

    let user = User::delete(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    // Detached: the response never waits on, or fails with, the file removal.
    storage::cleanup_picture(state.storage.clone(), user.profile_picture.clone());

    info!(user_id = %user.id, "account deleted");
    Ok(Json(user))
}

#[instrument(skip(state, multipart))]
pub async fn upload_picture(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<PictureResponse>, ApiError> {
    let id = parse_id(&id)?;

    if !policy::can_access(&caller, id) {
        warn!(caller_id = %caller.id, target = %id, "picture upload denied");
        return Err(ApiError::Forbidden(
            "you may only change your own profile picture".into(),
        ));
    }

    let mut file: Option<(&'static str, bytes::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("profile_picture") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let Some(ext) = image_ext(&content_type) else {
            warn!(%content_type, "unsupported picture type");
            return Err(ApiError::BadRequest(
                "only jpeg, png and gif images are allowed".into(),
            ));
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("could not read uploaded file: {e}")))?;
        if data.len() > MAX_PICTURE_BYTES {
            return Err(ApiError::BadRequest("picture exceeds the 5 MiB limit".into()));
        }
        file = Some((ext, data));
        break;
    }
    let Some((ext, data)) = file else {
        return Err(ApiError::BadRequest(
            "a profile_picture file is required".into(),
        ));
    };

    let current = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let filename = format!(
        "profile-{}-{}.{}",
        id,
        OffsetDateTime::now_utc().unix_timestamp(),
        ext
    );
    let reference = state.storage.save(&filename, data).await.map_err(|e| {
        error!(error = %e, user_id = %id, "picture save failed");
        ApiError::Internal(e)
    })?;

    // Old non-default picture goes away best-effort, in the background.
    storage::cleanup_picture(state.storage.clone(), current.profile_picture);

    let user = User::set_picture(&state.db, id, &reference)
        .await?
        .ok_or_else(|| not_found(id))?;

    info!(user_id = %user.id, reference = %user.profile_picture, "profile picture updated");
    Ok(Json(PictureResponse {
        profile_picture: user.profile_picture,
    }))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid account id '{raw}'")))
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("no account with id {id}"))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn image_ext(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
