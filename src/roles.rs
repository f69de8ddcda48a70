use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::store::Database;
use crate::users::{self, User, UserSummary};

#[cfg(feature = "web")]
use crate::{app::SharedState, login::CurrentUser};
#[cfg(feature = "web")]
use axum::{
    Extension, Json,
    extract::{Path as AxumPath, State},
};

pub const SUPER_ADMIN: &str = "Super Admin";
pub const ADMIN: &str = "Admin";

/// A role and the employees that hold it
///
/// Membership is derived from job titles when the role is saved; super
/// admins are added one by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub role: String,
    #[serde(rename = "jobTitles")]
    pub job_titles: Vec<String>,
    pub users: Vec<UserSummary>,
}

impl RoleEntry {
    fn has_member(&self, user: &User) -> bool {
        self.users.iter().any(|u| u.emp_id == user.emp_id)
            || (!user.job_title.is_empty() && self.job_titles.contains(&user.job_title))
    }
}

/// Create or replace a role; members are the working users with a listed job title
///
/// Returns `true` when the role did not exist before.
pub fn upsert_role(db: &mut Database, role: &str, job_titles: Vec<String>) -> AppResult<bool> {
    if role.trim().is_empty() {
        return Err(AppError::bad_request("Role name is required"));
    }

    let members: Vec<UserSummary> = db
        .users
        .iter()
        .filter(|u| u.is_working() && job_titles.contains(&u.job_title))
        .map(UserSummary::from)
        .collect();

    match db.roles.iter_mut().find(|r| r.role == role) {
        Some(entry) => {
            entry.job_titles = job_titles;
            entry.users = members;
            Ok(false)
        }
        None => {
            db.roles.push(RoleEntry {
                role: role.to_string(),
                job_titles,
                users: members,
            });
            Ok(true)
        }
    }
}

pub fn list_roles(db: &Database) -> Vec<RoleEntry> {
    let mut roles = db.roles.clone();
    roles.sort_by(|a, b| a.role.cmp(&b.role));
    roles
}

/// Every role an employee holds, admin roles included
pub fn roles_of(db: &Database, emp_id: &str) -> Vec<String> {
    db.roles
        .iter()
        .filter(|r| r.users.iter().any(|u| u.emp_id == emp_id))
        .map(|r| r.role.clone())
        .collect()
}

/// Whether the employee holds `Admin` or `Super Admin`
pub fn is_admin(db: &Database, emp_id: &str) -> bool {
    roles_of(db, emp_id)
        .iter()
        .any(|r| r == SUPER_ADMIN || r == ADMIN)
}

/// Roles shown on the employee's profile; admin roles are left out
pub fn user_roles(db: &Database, emp_id: &str) -> Vec<String> {
    roles_of(db, emp_id)
        .into_iter()
        .filter(|r| r != SUPER_ADMIN && r != ADMIN)
        .collect()
}

pub fn add_super_admin(db: &mut Database, emp_id: &str) -> AppResult<()> {
    let mut summary = users::find(db, emp_id)
        .map(UserSummary::from)
        .ok_or_else(|| AppError::not_found("User not found"))?;
    summary.job_title = "Developer".to_string();

    if !db.roles.iter().any(|r| r.role == SUPER_ADMIN) {
        db.roles.push(RoleEntry {
            role: SUPER_ADMIN.to_string(),
            job_titles: vec!["Developer".to_string()],
            users: Vec::new(),
        });
    }
    let entry = db
        .roles
        .iter_mut()
        .find(|r| r.role == SUPER_ADMIN)
        .ok_or_else(|| AppError::Internal("Super Admin role missing".to_string()))?;

    if entry.users.iter().any(|u| u.emp_id == emp_id) {
        return Err(AppError::bad_request("User is already a Super Admin"));
    }
    entry.users.push(summary);
    info!("{} registered as super admin", emp_id);
    Ok(())
}

pub fn remove_super_admin(db: &mut Database, emp_id: &str, protected: &[String]) -> AppResult<()> {
    let entry = db
        .roles
        .iter_mut()
        .find(|r| r.role == SUPER_ADMIN)
        .ok_or_else(|| AppError::not_found("Super Admin role not found"))?;

    if protected.iter().any(|p| p == emp_id) {
        return Err(AppError::Forbidden(
            "Cannot delete protected Super Admin users".to_string(),
        ));
    }

    let before = entry.users.len();
    entry.users.retain(|u| u.emp_id != emp_id);
    if entry.users.len() == before {
        return Err(AppError::not_found("User not found in Super Admin role"));
    }
    info!("{} removed from super admins", emp_id);
    Ok(())
}

struct MenuItem {
    path: &'static str,
    title: &'static str,
    roles: &'static [&'static str],
    required_emp_ids: &'static [&'static str],
}

struct MenuSection {
    id: &'static str,
    title: &'static str,
    roles: &'static [&'static str],
    items: &'static [MenuItem],
}

const fn item(path: &'static str, title: &'static str, roles: &'static [&'static str]) -> MenuItem {
    MenuItem {
        path,
        title,
        roles,
        required_emp_ids: &[],
    }
}

const NAVIGATION: &[MenuSection] = &[
    MenuSection {
        id: "qc2-system",
        title: "QC2",
        roles: &[],
        items: &[
            item("/bundle-registration", "Bundle Registration", &["Bundle Registration"]),
            item("/washing", "Washing", &["Washing"]),
            item("/opa", "OPA", &["OPA"]),
            item("/ironing", "Ironing", &["Ironing"]),
            item("/qc2-inspection", "QC2 Inspection", &["QC2 Inspection"]),
            item("/packing", "Packing", &["Packing"]),
        ],
    },
    MenuSection {
        id: "fabric-cutting",
        title: "F & C",
        roles: &[],
        items: &[
            item("/Fabric", "Fabric", &["Fabric"]),
            item("/cutting", "Cutting", &["Cutting"]),
            item("/scc", "SCC", &["SCC"]),
        ],
    },
    MenuSection {
        id: "sewing-qc",
        title: "Sewing",
        roles: &[],
        items: &[
            item("/roving", "QC Inline Roving", &["QC Roving"]),
            item("/details", "QC1 Inspection", &["QC1 Inspection"]),
            item("/inline-emp", "Print QR", &["Printing"]),
        ],
    },
    MenuSection {
        id: "qa-inspection",
        title: "QA",
        roles: &[],
        items: &[
            item("/audit", "Audit", &["QA Audit"]),
            item("/final-inspection", "Final Inspection", &["QA Audit"]),
        ],
    },
    MenuSection {
        id: "admin-panel",
        title: "Admin",
        roles: &[],
        items: &[
            item("/ieadmin", "IE Admin", &["IE", "System Administration"]),
            item("/sysadmin", "System Admin", &["System Administration"]),
            item("/yqms", "YQMS", &["YQMS"]),
            item("/role-management", "Role Management", &[ADMIN, SUPER_ADMIN]),
            item("/user-list", "User Management", &[ADMIN, SUPER_ADMIN]),
        ],
    },
    MenuSection {
        id: "analytics",
        title: "Analytics",
        roles: &[],
        items: &[
            item("/download-data", "Download Data", &["Download Data"]),
            item("/live-dashboard", "Live Dashboard", &["Live Dashboard"]),
            item("/powerbi", "Power BI", &["Power BI"]),
            item("/qa-pivot", "QA Evaluation", &["QA Pivot"]),
            item("/qc1-sunrise", "QC1 Sunrise", &["QC1 Sunrise"]),
        ],
    },
    MenuSection {
        id: "settings",
        title: "Settings",
        roles: &[ADMIN, SUPER_ADMIN],
        items: &[MenuItem {
            path: "/super-admin-assign",
            title: "Super Admin Assign",
            roles: &[],
            required_emp_ids: &["YM6702", "YM7903"],
        }],
    },
];

/// A navigation entry the caller may open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavLink {
    pub path: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSection {
    pub id: String,
    pub title: String,
    pub items: Vec<NavLink>,
}

fn has_access(db: &Database, user: &User, is_admin: bool, roles: &[&str], emp_ids: &[&str]) -> bool {
    if !emp_ids.is_empty() {
        return emp_ids.contains(&user.emp_id.as_str());
    }
    if is_admin {
        return true;
    }
    db.roles
        .iter()
        .any(|r| roles.contains(&r.role.as_str()) && r.has_member(user))
}

/// Navigation menu filtered down to what `user` may see
///
/// Admins and super admins see every role-gated link. Links restricted to
/// named employees stay restricted even for admins. Sections that end up
/// empty are dropped unless the section itself is granted.
pub fn accessible_menu(db: &Database, user: &User) -> Vec<NavSection> {
    let is_admin = is_admin(db, &user.emp_id);

    NAVIGATION
        .iter()
        .filter_map(|section| {
            let items: Vec<NavLink> = section
                .items
                .iter()
                .filter(|i| has_access(db, user, is_admin, i.roles, i.required_emp_ids))
                .map(|i| NavLink {
                    path: i.path.to_string(),
                    title: i.title.to_string(),
                })
                .collect();
            let section_granted =
                !section.roles.is_empty() && has_access(db, user, is_admin, section.roles, &[]);
            if items.is_empty() && !section_granted {
                return None;
            }
            Some(NavSection {
                id: section.id.to_string(),
                title: section.title.to_string(),
                items,
            })
        })
        .collect()
}

// Web handler functions below (only compiled with "web" feature)

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
    #[serde(rename = "jobTitles", default)]
    pub job_titles: Vec<String>,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct SuperAdminRequest {
    pub user: SuperAdminUser,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct SuperAdminUser {
    pub emp_id: String,
}

#[cfg(feature = "web")]
pub async fn handle_save_role(
    State(state): State<SharedState>,
    Json(request): Json<RoleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let created = state
        .store
        .write(|db| upsert_role(db, &request.role, request.job_titles))?;
    let verb = if created { "added" } else { "updated" };
    info!("role {} {}", request.role, verb);
    Ok(Json(serde_json::json!({
        "message": format!("Role {} successfully", verb)
    })))
}

#[cfg(feature = "web")]
pub async fn handle_list_roles(
    State(state): State<SharedState>,
) -> Result<Json<Vec<RoleEntry>>, AppError> {
    Ok(Json(state.store.read(list_roles)?))
}

#[cfg(feature = "web")]
pub async fn handle_user_roles(
    State(state): State<SharedState>,
    AxumPath(emp_id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let roles = state.store.read(|db| user_roles(db, &emp_id))?;
    Ok(Json(serde_json::json!({ "roles": roles })))
}

#[cfg(feature = "web")]
pub async fn handle_add_super_admin(
    State(state): State<SharedState>,
    Json(request): Json<SuperAdminRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .store
        .write(|db| add_super_admin(db, &request.user.emp_id))?;
    Ok(Json(serde_json::json!({ "message": "Super Admin registered successfully" })))
}

#[cfg(feature = "web")]
pub async fn handle_remove_super_admin(
    State(state): State<SharedState>,
    AxumPath(emp_id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let protected = state.config.protected_super_admins.clone();
    state
        .store
        .write(|db| remove_super_admin(db, &emp_id, &protected))?;
    Ok(Json(serde_json::json!({ "message": "Super Admin removed successfully" })))
}

#[cfg(feature = "web")]
pub async fn handle_menu(
    State(state): State<SharedState>,
    Extension(CurrentUser(emp_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<NavSection>>, AppError> {
    let menu = state.store.read(|db| {
        users::find(db, &emp_id)
            .map(|user| accessible_menu(db, user))
            .ok_or_else(|| AppError::not_found("User not found"))
    })??;
    Ok(Json(menu))
}
