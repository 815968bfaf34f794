use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        activation::{decode_uid, encode_uid, ActivationTokens},
        dto::{
            AuthResponse, DetailResponse, LoginRequest, PublicUser, RefreshRequest,
            RegisterRequest,
        },
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo::User,
    },
    error::{ApiError, ApiJson},
    state::AppState,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/users/activate/:uid/:token", get(activate))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() {
        warn!("blank username");
        return Err(ApiError::validation("username", "May not be blank."));
    }
    if payload.username.chars().count() > 150 {
        warn!("username too long");
        return Err(ApiError::validation(
            "username",
            "Must be 150 characters or fewer.",
        ));
    }
    if !is_valid_username(&payload.username) {
        warn!("invalid username characters");
        return Err(ApiError::validation(
            "username",
            "May contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("email", "Enter a valid email address."));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::validation(
            "password",
            "Must be at least 8 characters.",
        ));
    }

    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already registered");
        return Err(ApiError::Conflict("Username already registered.".into()));
    }
    if User::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered.".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.username, &payload.email, &hash).await?;

    // Mail delivery runs out of process; the delivery worker picks the
    // activation link up from the log stream.
    let tokens = ActivationTokens::from_ref(&state);
    let activation_path = format!(
        "/users/activate/{}/{}",
        encode_uid(user.id),
        tokens.make_token(&user)
    );
    info!(
        user_id = %user.id,
        email = %user.email,
        activation_path = %activation_path,
        "user registered, activation pending"
    );

    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let username = payload.username.trim();

    let user = match User::find_by_username(&state.db, username).await? {
        Some(u) => u,
        None => {
            warn!(username = %username, "login unknown username");
            return Err(ApiError::unauthenticated("Invalid credentials."));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthenticated("Invalid credentials."));
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login before activation");
        return Err(ApiError::unauthenticated("Invalid credentials."));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::unauthenticated("Invalid or expired refresh token."))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("User not found."))?;
    if !user.is_active {
        warn!(user_id = %user.id, "refresh for inactive account");
        return Err(ApiError::unauthenticated("User is inactive."));
    }

    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    info!(user_id = %user.id, "token pair refreshed");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, params))]
pub async fn activate(
    State(state): State<AppState>,
    params: Path<(String, String)>,
) -> Result<Json<DetailResponse>, ApiError> {
    let Path((uid, token)) = params;

    let user_id = decode_uid(&uid).ok_or(ApiError::InvalidIdentifier)?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    // The token covers the pre-activation account state, so a replay after
    // activation fails here rather than through any stored nonce.
    let tokens = ActivationTokens::from_ref(&state);
    if !tokens.check_token(&user, &token) {
        warn!(user_id = %user.id, "activation token rejected");
        return Err(ApiError::InvalidToken);
    }

    User::mark_active(&state.db, user.id).await?;
    info!(user_id = %user.id, "account activated");

    Ok(Json(DetailResponse {
        detail: "Account activated successfully.".into(),
    }))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}
