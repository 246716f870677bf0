use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use models::User;

use crate::{error::ApiError, Result, SharedState};

pub const SESSION_COOKIE: &str = "session";

/// Login and registration form data.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// POST /api/register
/// Creates a user and logs them in straight away.
pub async fn register(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse> {
    let username = creds.username.trim().to_string();
    if username.is_empty() || creds.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password must not be empty".to_string(),
        ));
    }
    if state.store.find_user(&username)?.is_some() {
        return Err(ApiError::BadRequest("username already taken".to_string()));
    }

    let hash = hash_password(&creds.password)?;
    let user_id = state.store.create_user(&username, &hash)?;
    let jar = start_session(&state, user_id, jar)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({ "id": user_id, "username": username })),
    ))
}

/// POST /api/login
pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse> {
    let user = state
        .store
        .find_user(creds.username.trim())?
        .ok_or(ApiError::InvalidLogin)?;
    if !verify_password(&creds.password, &user.password_hash) {
        return Err(ApiError::InvalidLogin);
    }

    let jar = start_session(&state, user.id, jar)?;
    Ok((jar, Json(json!({ "id": user.id, "username": user.username }))))
}

/// POST /api/logout
pub async fn logout(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.store.delete_session(cookie.value())?;
    }
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    Ok((jar, Json(json!({ "status": "logged out" }))))
}

/// Resolves the session cookie to a user, or fails with 401.
pub fn authenticate(state: &crate::AppState, jar: &CookieJar) -> Result<User> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized)?;
    state
        .store
        .session_user(&token)?
        .ok_or(ApiError::Unauthorized)
}

fn start_session(state: &crate::AppState, user_id: i64, jar: CookieJar) -> Result<CookieJar> {
    let token = Uuid::new_v4().to_string();
    state.store.create_session(&token, user_id)?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build();
    Ok(jar.add(cookie))
}

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

/// Checks a plaintext password against a stored Argon2 hash. Malformed
/// stored hashes simply fail verification.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
