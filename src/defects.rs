//! Sewing defect catalog
//!
//! Every defect carries a severity per buyer. The roving form looks the
//! severity up here when it classifies an inspection, so the same defect can
//! be critical for one buyer and minor for another.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::buyer::BUYERS;
use crate::error::{AppError, AppResult};
use crate::inspection::{Severity, keyword_severity};
use crate::store::Database;

#[cfg(feature = "web")]
use crate::app::SharedState;
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
};

/// First code handed out when the catalog is empty
pub const FIRST_CODE: u32 = 1001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerDefectStatus {
    pub buyer_name: String,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub is_minor: bool,
}

impl BuyerDefectStatus {
    pub fn major(buyer_name: &str) -> Self {
        BuyerDefectStatus {
            buyer_name: buyer_name.to_string(),
            is_critical: false,
            is_minor: false,
        }
    }

    pub fn severity(&self) -> Severity {
        if self.is_critical {
            Severity::Critical
        } else if self.is_minor {
            Severity::Minor
        } else {
            Severity::Major
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SewingDefect {
    pub code: u32,
    pub short_eng: String,
    pub english: String,
    pub khmer: String,
    #[serde(default)]
    pub chinese: String,
    pub repair: String,
    pub category_english: String,
    #[serde(default)]
    pub category_khmer: String,
    #[serde(default)]
    pub category_chinese: String,
    #[serde(rename = "type")]
    pub defect_type: String,
    #[serde(default)]
    pub is_common: String,
    #[serde(default)]
    pub status_by_buyer: Vec<BuyerDefectStatus>,
}

impl SewingDefect {
    fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.english.eq_ignore_ascii_case(name)
            || self.short_eng.eq_ignore_ascii_case(name)
            || (!self.khmer.is_empty() && self.khmer == name)
            || (!self.chinese.is_empty() && self.chinese == name)
    }

    /// Severity for `buyer`, Major when the buyer has no entry
    pub fn severity_for(&self, buyer: &str) -> Severity {
        self.status_by_buyer
            .iter()
            .find(|s| s.buyer_name == buyer)
            .map(BuyerDefectStatus::severity)
            .unwrap_or(Severity::Major)
    }
}

/// Fields accepted when adding a defect
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewDefect {
    pub short_eng: String,
    pub english: String,
    pub khmer: String,
    pub chinese: String,
    pub repair: String,
    pub category_english: String,
    pub category_khmer: String,
    pub category_chinese: String,
    #[serde(rename = "type")]
    pub defect_type: String,
    pub is_common: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectFilter {
    pub category_english: Option<String>,
    #[serde(rename = "type")]
    pub defect_type: Option<String>,
    pub is_common: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectCategory {
    pub english: String,
    pub khmer: String,
    pub chinese: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectOptions {
    pub repairs: Vec<String>,
    pub types: Vec<String>,
    pub categories: Vec<DefectCategory>,
    pub next_code: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerStatusUpdate {
    pub defect_code: u32,
    pub buyer_name: String,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub is_minor: bool,
}

fn next_code(db: &Database) -> u32 {
    db.defects
        .iter()
        .map(|d| d.code + 1)
        .max()
        .unwrap_or(FIRST_CODE)
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Add a defect to the catalog with the next free code
///
/// New defects start out as Major for every known buyer.
pub fn add_defect(db: &mut Database, new: NewDefect) -> AppResult<SewingDefect> {
    if [
        &new.short_eng,
        &new.english,
        &new.khmer,
        &new.category_english,
        &new.repair,
        &new.defect_type,
    ]
    .iter()
    .any(|f| is_blank(f))
    {
        return Err(AppError::bad_request(
            "Required fields are missing. Please fill out all fields marked with *.",
        ));
    }

    if let Some(existing) = db
        .defects
        .iter()
        .find(|d| d.short_eng == new.short_eng || d.english == new.english)
    {
        let name = if existing.short_eng == new.short_eng {
            &new.short_eng
        } else {
            &new.english
        };
        return Err(AppError::Conflict(format!(
            "Defect with name '{}' already exists.",
            name
        )));
    }

    let defect = SewingDefect {
        code: next_code(db),
        short_eng: new.short_eng,
        english: new.english,
        khmer: new.khmer,
        chinese: new.chinese,
        repair: new.repair,
        category_english: new.category_english,
        category_khmer: new.category_khmer,
        category_chinese: new.category_chinese,
        defect_type: new.defect_type,
        is_common: new.is_common,
        status_by_buyer: BUYERS.iter().map(|b| BuyerDefectStatus::major(b)).collect(),
    };
    info!("sewing defect {} added as {}", defect.english, defect.code);
    db.defects.push(defect.clone());
    Ok(defect)
}

pub fn delete_defect(db: &mut Database, code: u32) -> AppResult<()> {
    let before = db.defects.len();
    db.defects.retain(|d| d.code != code);
    if db.defects.len() == before {
        return Err(AppError::not_found("Sewing Defect not found."));
    }
    info!("sewing defect {} deleted", code);
    Ok(())
}

pub fn list(db: &Database, filter: &DefectFilter) -> Vec<SewingDefect> {
    let matches = |wanted: &Option<String>, actual: &str| match wanted {
        Some(w) if !w.is_empty() => w == actual,
        _ => true,
    };
    let mut defects: Vec<SewingDefect> = db
        .defects
        .iter()
        .filter(|d| {
            matches(&filter.category_english, &d.category_english)
                && matches(&filter.defect_type, &d.defect_type)
                && matches(&filter.is_common, &d.is_common)
        })
        .cloned()
        .collect();
    defects.sort_by_key(|d| d.code);
    defects
}

fn distinct_values<F>(db: &Database, field: F) -> Vec<String>
where
    F: Fn(&SewingDefect) -> &str,
{
    db.defects
        .iter()
        .map(field)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Choices offered by the "add defect" form
pub fn options(db: &Database) -> DefectOptions {
    let mut categories: Vec<DefectCategory> = Vec::new();
    for d in db.defects.iter().filter(|d| !d.category_english.is_empty()) {
        let category = DefectCategory {
            english: d.category_english.clone(),
            khmer: d.category_khmer.clone(),
            chinese: d.category_chinese.clone(),
        };
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    categories.sort_by(|a, b| a.english.cmp(&b.english));

    DefectOptions {
        repairs: distinct_values(db, |d| d.repair.as_str()),
        types: distinct_values(db, |d| d.defect_type.as_str()),
        categories,
        next_code: next_code(db),
    }
}

/// Set buyer severities on catalog entries
///
/// A status flagged both critical and minor is stored as critical. Nothing
/// is changed when any update names an unknown defect code.
pub fn apply_buyer_statuses(db: &mut Database, updates: &[BuyerStatusUpdate]) -> AppResult<usize> {
    if let Some(missing) = updates
        .iter()
        .find(|u| !db.defects.iter().any(|d| d.code == u.defect_code))
    {
        return Err(AppError::NotFound(format!(
            "Sewing defect {} not found",
            missing.defect_code
        )));
    }

    for update in updates {
        let Some(defect) = db.defects.iter_mut().find(|d| d.code == update.defect_code) else {
            continue;
        };
        let status = BuyerDefectStatus {
            buyer_name: update.buyer_name.clone(),
            is_critical: update.is_critical,
            is_minor: update.is_minor && !update.is_critical,
        };
        match defect
            .status_by_buyer
            .iter_mut()
            .find(|s| s.buyer_name == update.buyer_name)
        {
            Some(existing) => *existing = status,
            None => defect.status_by_buyer.push(status),
        }
    }
    info!("updated {} buyer defect statuses", updates.len());
    Ok(updates.len())
}

/// Severity of a defect, by name, for the buyer of the order
///
/// Names missing from the catalog fall back to [`keyword_severity`].
pub fn severity_for(db: &Database, name: &str, buyer: &str) -> Severity {
    db.defects
        .iter()
        .find(|d| d.matches_name(name))
        .map(|d| d.severity_for(buyer))
        .unwrap_or_else(|| keyword_severity(name))
}

// Web handler functions below (only compiled with "web" feature)

#[cfg(feature = "web")]
pub async fn handle_list(
    State(state): State<SharedState>,
    Query(filter): Query<DefectFilter>,
) -> Result<Json<Vec<SewingDefect>>, AppError> {
    Ok(Json(state.store.read(|db| list(db, &filter))?))
}

#[cfg(feature = "web")]
pub async fn handle_options(
    State(state): State<SharedState>,
) -> Result<Json<DefectOptions>, AppError> {
    Ok(Json(state.store.read(options)?))
}

#[cfg(feature = "web")]
pub async fn handle_add(
    State(state): State<SharedState>,
    Json(new): Json<NewDefect>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let defect = state.store.write(|db| add_defect(db, new))?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Sewing defect added successfully",
            "defect": defect,
        })),
    ))
}

#[cfg(feature = "web")]
pub async fn handle_delete(
    State(state): State<SharedState>,
    AxumPath(code): AxumPath<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let code: u32 = code
        .parse()
        .map_err(|_| AppError::bad_request("Invalid defect code format."))?;
    state.store.write(|db| delete_defect(db, code))?;
    Ok(Json(serde_json::json!({ "message": "Sewing defect deleted successfully" })))
}

#[cfg(feature = "web")]
pub async fn handle_buyer_statuses(
    State(state): State<SharedState>,
    Json(updates): Json<Vec<BuyerStatusUpdate>>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.write(|db| apply_buyer_statuses(db, &updates))?;
    Ok(Json(serde_json::json!({
        "message": "Sewing defect buyer statuses updated successfully."
    })))
}

#[cfg(feature = "web")]
pub async fn handle_buyers() -> Json<Vec<&'static str>> {
    Json(BUYERS.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_prefers_critical_then_minor() {
        let mut status = BuyerDefectStatus::major("Costco");
        assert_eq!(status.severity(), Severity::Major);
        status.is_minor = true;
        assert_eq!(status.severity(), Severity::Minor);
        status.is_critical = true;
        assert_eq!(status.severity(), Severity::Critical);
    }
}
