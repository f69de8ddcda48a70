use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::store::Database;

#[cfg(feature = "web")]
use crate::app::SharedState;
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

pub const WORKING: &str = "Working";

/// A factory employee that can log in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub emp_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub eng_name: String,
    #[serde(default)]
    pub kh_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub dept_name: String,
    #[serde(default)]
    pub sect_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub working_status: String,
    #[serde(default)]
    pub face_photo: String,
    /// Argon2 hash, empty for employees imported without a password.
    /// Never send a `User` to a client; use [`UserSummary`] instead.
    #[serde(default)]
    pub password_hash: String,
}

impl User {
    pub fn is_working(&self) -> bool {
        self.working_status == WORKING
    }
}

/// Public view of a user, as returned by search and role endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub emp_id: String,
    pub name: String,
    pub eng_name: String,
    pub kh_name: String,
    pub job_title: String,
    pub dept_name: String,
    pub sect_name: String,
    pub working_status: String,
    pub phone_number: String,
    pub face_photo: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            emp_id: user.emp_id.clone(),
            name: user.name.clone(),
            eng_name: user.eng_name.clone(),
            kh_name: user.kh_name.clone(),
            job_title: user.job_title.clone(),
            dept_name: user.dept_name.clone(),
            sect_name: user.sect_name.clone(),
            working_status: user.working_status.clone(),
            phone_number: user.phone_number.clone(),
            face_photo: user.face_photo.clone(),
        }
    }
}

pub fn find<'a>(db: &'a Database, emp_id: &str) -> Option<&'a User> {
    db.users.iter().find(|u| u.emp_id == emp_id)
}

/// Working employees whose id contains `q` (case-insensitive)
pub fn search(db: &Database, q: &str) -> Vec<UserSummary> {
    let needle = q.to_lowercase();
    db.users
        .iter()
        .filter(|u| u.is_working() && u.emp_id.to_lowercase().contains(&needle))
        .map(UserSummary::from)
        .collect()
}

pub fn details(db: &Database, emp_id: &str) -> AppResult<UserSummary> {
    if emp_id.is_empty() {
        return Err(AppError::bad_request("Employee ID is required"));
    }
    db.users
        .iter()
        .find(|u| u.emp_id == emp_id && u.is_working())
        .map(UserSummary::from)
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Distinct job titles of working employees, sorted
pub fn job_titles(db: &Database) -> Vec<String> {
    db.users
        .iter()
        .filter(|u| u.is_working() && !u.job_title.is_empty())
        .map(|u| u.job_title.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn by_job_title(db: &Database, job_title: &str) -> Vec<UserSummary> {
    db.users
        .iter()
        .filter(|u| u.is_working() && u.job_title == job_title)
        .map(UserSummary::from)
        .collect()
}

/// Insert or update an employee record, keeping any existing password
pub fn upsert(db: &mut Database, mut user: User) -> AppResult<bool> {
    if user.emp_id.trim().is_empty() {
        return Err(AppError::bad_request("Employee ID is required"));
    }
    if user.working_status.is_empty() {
        user.working_status = WORKING.to_string();
    }
    if user.name.is_empty() {
        user.name = user.eng_name.clone();
    }

    match db.users.iter_mut().find(|u| u.emp_id == user.emp_id) {
        Some(existing) => {
            if user.password_hash.is_empty() {
                user.password_hash = std::mem::take(&mut existing.password_hash);
            }
            *existing = user;
            Ok(false)
        }
        None => {
            db.users.push(user);
            Ok(true)
        }
    }
}

// Web handler functions below (only compiled with "web" feature)

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct DetailsQuery {
    #[serde(rename = "empId", alias = "emp_id", default)]
    pub emp_id: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct JobTitleQuery {
    #[serde(rename = "jobTitle", default)]
    pub job_title: String,
}

#[cfg(feature = "web")]
pub async fn handle_search(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    Ok(Json(state.store.read(|db| search(db, &query.q))?))
}

#[cfg(feature = "web")]
pub async fn handle_details(
    State(state): State<SharedState>,
    Query(query): Query<DetailsQuery>,
) -> Result<Json<UserSummary>, AppError> {
    Ok(Json(state.store.read(|db| details(db, &query.emp_id))??))
}

#[cfg(feature = "web")]
pub async fn handle_job_titles(
    State(state): State<SharedState>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.store.read(job_titles)?))
}

#[cfg(feature = "web")]
pub async fn handle_by_job_title(
    State(state): State<SharedState>,
    Query(query): Query<JobTitleQuery>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    if query.job_title.is_empty() {
        return Err(AppError::bad_request("Job title is required"));
    }
    Ok(Json(state.store.read(|db| by_job_title(db, &query.job_title))?))
}

#[cfg(feature = "web")]
pub async fn handle_list(State(state): State<SharedState>) -> Result<Json<Vec<UserSummary>>, AppError> {
    Ok(Json(
        state
            .store
            .read(|db| db.users.iter().map(UserSummary::from).collect())?,
    ))
}

/// Create or update an employee; passwords are never accepted here
#[cfg(feature = "web")]
pub async fn handle_upsert(
    State(state): State<SharedState>,
    Json(mut user): Json<User>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    user.password_hash.clear();
    let emp_id = user.emp_id.clone();
    let (created, summary) = state.store.write(|db| {
        let created = upsert(db, user)?;
        let summary = find(db, &emp_id)
            .map(UserSummary::from)
            .ok_or_else(|| AppError::Internal("user vanished after save".to_string()))?;
        Ok((created, summary))
    })?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(summary)))
}
