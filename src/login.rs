use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use lazy_static::lazy_static;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::Database;
use crate::users::{self, User, WORKING};

use crate::roles;
#[cfg(feature = "web")]
use crate::{app::SharedState, users::UserSummary};
#[cfg(feature = "web")]
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, CookieJar};

/// Cookie carrying the access token for browser clients
pub const SESSION_COOKIE: &str = "session";

/// Which of the two tokens a session entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// An issued token
#[derive(Debug, Clone)]
pub struct Session {
    /// Employee the token belongs to
    pub emp_id: String,

    pub kind: TokenKind,

    /// Time when the token stops being accepted
    pub expires_at: SystemTime,
}

/// Access and refresh token handed out at login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

/// Registration form sent by the sign-up page
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(alias = "emp_id")]
    pub emp_id: String,
    #[serde(alias = "eng_name")]
    pub eng_name: String,
    #[serde(default, alias = "kh_name")]
    pub kh_name: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Hash a password using Argon2id with a fresh salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::Internal("Password hashing failed".to_string()))
}

/// Check a plaintext password against a stored Argon2 hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash format".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Register a new employee account
pub fn register(db: &mut Database, form: Registration) -> AppResult<()> {
    let emp_id = form.emp_id.trim();
    if emp_id.is_empty() || form.eng_name.trim().is_empty() || form.password.is_empty() {
        return Err(AppError::bad_request("Employee ID, name, and password are required"));
    }
    if form.password != form.confirm_password {
        return Err(AppError::bad_request("Passwords do not match"));
    }
    if users::find(db, emp_id).is_some() {
        return Err(AppError::bad_request("Employee ID already registered"));
    }

    let user = User {
        emp_id: emp_id.to_string(),
        name: form.eng_name.clone(),
        eng_name: form.eng_name,
        kh_name: form.kh_name,
        working_status: WORKING.to_string(),
        password_hash: hash_password(&form.password)?,
        ..User::default()
    };
    info!("registered employee {}", user.emp_id);
    db.users.push(user);
    Ok(())
}

/// Verify credentials; `username` may be the email, name or employee id
pub fn authenticate(db: &Database, username: &str, password: &str) -> AppResult<User> {
    let username = username.trim();
    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());
    if username.is_empty() {
        return Err(invalid());
    }

    let user = db
        .users
        .iter()
        .find(|u| u.emp_id == username || u.email == username || u.name == username)
        .ok_or_else(invalid)?;

    if user.password_hash.is_empty() || !verify_password(password.trim(), &user.password_hash)? {
        return Err(invalid());
    }
    Ok(user.clone())
}

/// Reset a password on behalf of `caller`
///
/// Employees may reset their own password; admins may reset anyone's.
pub fn reset_password_as(
    db: &mut Database,
    caller: &str,
    emp_id: &str,
    new_password: &str,
) -> AppResult<()> {
    let emp_id = emp_id.trim();
    if caller != emp_id && !roles::is_admin(db, caller) {
        warn!("employee {} tried to reset the password of {}", caller, emp_id);
        return Err(AppError::Forbidden(
            "Only admins can reset another employee's password".to_string(),
        ));
    }
    reset_password(db, emp_id, new_password)
}

pub fn reset_password(db: &mut Database, emp_id: &str, new_password: &str) -> AppResult<()> {
    if emp_id.is_empty() || new_password.is_empty() {
        return Err(AppError::bad_request(
            "Employee ID and new password are required",
        ));
    }
    let hash = hash_password(new_password)?;
    let user = db
        .users
        .iter_mut()
        .find(|u| u.emp_id == emp_id)
        .ok_or_else(|| AppError::not_found("Employee ID not found"))?;
    user.password_hash = hash;
    Ok(())
}

fn insert_session(emp_id: &str, kind: TokenKind, lifetime: Duration) -> String {
    let token = Uuid::new_v4().to_string();
    let session = Session {
        emp_id: emp_id.to_string(),
        kind,
        expires_at: SystemTime::now() + lifetime,
    };
    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.insert(token.clone(), session);
    token
}

/// Issue a fresh access/refresh token pair for an employee
pub fn issue_tokens(emp_id: &str, access_secs: u64, refresh_secs: u64) -> TokenPair {
    purge_expired();
    TokenPair {
        access_token: insert_session(emp_id, TokenKind::Access, Duration::from_secs(access_secs)),
        refresh_token: insert_session(emp_id, TokenKind::Refresh, Duration::from_secs(refresh_secs)),
    }
}

/// Return the employee id behind a token if it is live and of the right kind
pub fn validate_token(token: &str, kind: TokenKind) -> Option<String> {
    let sessions = SESSIONS.read().unwrap_or_else(|e| e.into_inner());
    sessions
        .get(token)
        .filter(|s| s.kind == kind && s.expires_at > SystemTime::now())
        .map(|s| s.emp_id.clone())
}

/// Trade a refresh token for a new access token
pub fn refresh(refresh_token: &str, access_secs: u64) -> AppResult<String> {
    let emp_id = validate_token(refresh_token, TokenKind::Refresh)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;
    Ok(insert_session(&emp_id, TokenKind::Access, Duration::from_secs(access_secs)))
}

/// Drop every token held by an employee
pub fn revoke_user(emp_id: &str) {
    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.retain(|_, s| s.emp_id != emp_id);
}

fn purge_expired() {
    let now = SystemTime::now();
    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.retain(|_, s| s.expires_at > now);
}

// Web handler functions below (only compiled with "web" feature)

/// Employee id of the authenticated caller, set by [`require_auth`]
#[cfg(feature = "web")]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub email: String,
    pub roles: Vec<String>,
    pub profile: String,
}

#[cfg(feature = "web")]
fn profile_of(db: &Database, user: &User) -> UserProfile {
    let profile = if user.face_photo.is_empty() {
        "/IMG/default-profile.png".to_string()
    } else {
        user.face_photo.clone()
    };
    UserProfile {
        summary: UserSummary::from(user),
        email: user.email.clone(),
        roles: roles::roles_of(db, &user.emp_id),
        profile,
    }
}

#[cfg(feature = "web")]
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserProfile,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(alias = "emp_id")]
    pub emp_id: String,
    pub new_password: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Handle login: verify credentials, issue tokens and set the session cookie
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(credentials): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let (user, profile) = state.store.read(|db| {
        authenticate(db, &credentials.username, &credentials.password)
            .map(|user| {
                let profile = profile_of(db, &user);
                (user, profile)
            })
    })??;

    let tokens = issue_tokens(
        &user.emp_id,
        state.config.access_token_secs,
        state.config.refresh_token_secs,
    );
    info!("employee {} logged in", user.emp_id);

    let mut cookie = Cookie::new(SESSION_COOKIE, tokens.access_token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            tokens,
            user: profile,
        }),
    ))
}

#[cfg(feature = "web")]
pub async fn handle_register(
    State(state): State<SharedState>,
    Json(form): Json<Registration>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    state.store.write(|db| register(db, form))?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "User registered successfully" })),
    ))
}

#[cfg(feature = "web")]
pub async fn handle_reset_password(
    State(state): State<SharedState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.write(|db| {
        reset_password_as(db, &caller, &request.emp_id, &request.new_password)
    })?;
    revoke_user(request.emp_id.trim());
    Ok(Json(serde_json::json!({ "message": "Password reset successfully" })))
}

#[cfg(feature = "web")]
pub async fn handle_refresh(
    State(state): State<SharedState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let access_token = refresh(&request.refresh_token, state.config.access_token_secs)?;
    Ok(Json(serde_json::json!({ "accessToken": access_token })))
}

/// Handle logout: revoke the caller's tokens and clear the cookie
#[cfg(feature = "web")]
pub async fn handle_logout(
    jar: CookieJar,
    Extension(CurrentUser(emp_id)): Extension<CurrentUser>,
) -> (CookieJar, Json<serde_json::Value>) {
    revoke_user(&emp_id);
    info!("employee {} logged out", emp_id);
    (
        jar.remove(Cookie::from(SESSION_COOKIE)),
        Json(serde_json::json!({ "message": "Logged out" })),
    )
}

#[cfg(feature = "web")]
pub async fn handle_profile(
    State(state): State<SharedState>,
    Extension(CurrentUser(emp_id)): Extension<CurrentUser>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state.store.read(|db| {
        users::find(db, &emp_id)
            .map(|user| profile_of(db, user))
            .ok_or_else(|| AppError::not_found("User not found"))
    })??;
    Ok(Json(profile))
}

/// Authentication middleware
///
/// Accepts an `Authorization: Bearer <token>` header or the session cookie.
/// On success the caller's employee id is stored as a [`CurrentUser`]
/// request extension; otherwise the request is answered with 401.
#[cfg(feature = "web")]
pub async fn require_auth(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    let token = bearer.or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()));

    if let Some(emp_id) = token.and_then(|t| validate_token(&t, TokenKind::Access)) {
        request.extensions_mut().insert(CurrentUser(emp_id));
        return next.run(request).await;
    }

    warn!("rejected unauthenticated request to {}", request.uri().path());
    AppError::Unauthorized("Authentication failed".to_string()).into_response()
}
