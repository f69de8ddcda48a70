use log::info;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::store::Database;

#[cfg(feature = "web")]
use crate::app::SharedState;
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
};

/// Most MO numbers returned by one search
pub const MO_SEARCH_LIMIT: usize = 100;

/// One sewing operation of an order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderOperation {
    #[serde(rename = "Tg_No", default)]
    pub tg_no: String,
    #[serde(rename = "Tg_Code", default)]
    pub tg_code: String,
    #[serde(rename = "Ma_Code", default)]
    pub ma_code: String,
    #[serde(default)]
    pub ch_name: String,
    #[serde(default)]
    pub kh_name: String,
}

/// Order master data used by the roving form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineOrder {
    #[serde(rename = "St_No")]
    pub st_no: String,
    #[serde(rename = "By_Style", default)]
    pub by_style: String,
    #[serde(rename = "Dept_Type", default)]
    pub dept_type: String,
    #[serde(rename = "orderData", default)]
    pub order_data: Vec<OrderOperation>,
}

/// Head count of a sewing line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineWorker {
    pub line_no: String,
    pub real_worker_count: u32,
    #[serde(default)]
    pub edited_worker_count: Option<u32>,
}

impl LineWorker {
    /// Workers the line is expected to have inspected each round
    pub fn target_workers(&self) -> u32 {
        self.edited_worker_count.unwrap_or(self.real_worker_count)
    }
}

/// MO numbers containing `term`, compared case-insensitively
///
/// The term is matched literally; regex metacharacters carry no meaning.
pub fn search_mo(db: &Database, term: &str) -> AppResult<Vec<String>> {
    if term.trim().is_empty() {
        return Err(AppError::bad_request("Search term is required"));
    }
    let pattern = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(db
        .inline_orders
        .iter()
        .filter(|o| pattern.is_match(&o.st_no))
        .map(|o| o.st_no.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MO_SEARCH_LIMIT)
        .collect())
}

pub fn order_details(db: &Database, st_no: &str) -> AppResult<InlineOrder> {
    if st_no.is_empty() {
        return Err(AppError::bad_request("St_No is required"));
    }
    db.inline_orders
        .iter()
        .find(|o| o.st_no == st_no)
        .cloned()
        .ok_or_else(|| AppError::not_found("MO No not found"))
}

/// Swap in a new order list; orders with the same MO, style and department are merged
pub fn replace_orders(db: &mut Database, orders: Vec<InlineOrder>) -> usize {
    let mut merged: Vec<InlineOrder> = Vec::new();
    for order in orders {
        match merged.iter_mut().find(|o| {
            o.st_no == order.st_no && o.by_style == order.by_style && o.dept_type == order.dept_type
        }) {
            Some(existing) => existing.order_data.extend(order.order_data),
            None => merged.push(order),
        }
    }
    let count = merged.len();
    db.inline_orders = merged;
    info!("inline orders replaced, {} orders", count);
    count
}

pub fn line_worker<'a>(db: &'a Database, line_no: &str) -> Option<&'a LineWorker> {
    db.line_workers.iter().find(|w| w.line_no == line_no)
}

/// Override the head count of a line; `None` reverts to the real count
pub fn set_edited_count(
    db: &mut Database,
    line_no: &str,
    count: Option<u32>,
) -> AppResult<LineWorker> {
    let worker = db
        .line_workers
        .iter_mut()
        .find(|w| w.line_no == line_no)
        .ok_or_else(|| AppError::NotFound(format!("Line {} not found", line_no)))?;
    worker.edited_worker_count = count;
    Ok(worker.clone())
}

/// Replace the line list, keeping edited counts of lines that survive
pub fn replace_workers(db: &mut Database, workers: Vec<LineWorker>) -> usize {
    let previous = std::mem::take(&mut db.line_workers);
    db.line_workers = workers
        .into_iter()
        .map(|mut w| {
            if w.edited_worker_count.is_none() {
                w.edited_worker_count = previous
                    .iter()
                    .find(|p| p.line_no == w.line_no)
                    .and_then(|p| p.edited_worker_count);
            }
            w
        })
        .collect();
    db.line_workers.sort_by(|a, b| natural_line_order(&a.line_no, &b.line_no));
    db.line_workers.len()
}

fn natural_line_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

// Web handler functions below (only compiled with "web" feature)

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct DetailsQuery {
    #[serde(rename = "stNo", default)]
    pub st_no: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct WorkerCountRequest {
    pub edited_worker_count: Option<u32>,
}

#[cfg(feature = "web")]
pub async fn handle_search_mo(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.store.read(|db| search_mo(db, &query.search))??))
}

#[cfg(feature = "web")]
pub async fn handle_order_details(
    State(state): State<SharedState>,
    Query(query): Query<DetailsQuery>,
) -> Result<Json<InlineOrder>, AppError> {
    Ok(Json(state.store.read(|db| order_details(db, &query.st_no))??))
}

#[cfg(feature = "web")]
pub async fn handle_line_workers(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LineWorker>>, AppError> {
    Ok(Json(state.store.read(|db| db.line_workers.clone())?))
}

#[cfg(feature = "web")]
pub async fn handle_set_worker_count(
    State(state): State<SharedState>,
    AxumPath(line_no): AxumPath<String>,
    Json(request): Json<WorkerCountRequest>,
) -> Result<Json<LineWorker>, AppError> {
    let worker = state
        .store
        .write(|db| set_edited_count(db, &line_no, request.edited_worker_count))?;
    info!(
        "line {} target set to {}",
        worker.line_no,
        worker.target_workers()
    );
    Ok(Json(worker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_sort_numerically() {
        let mut db = Database::default();
        let workers = ["10", "2", "1"]
            .iter()
            .map(|l| LineWorker {
                line_no: l.to_string(),
                real_worker_count: 20,
                edited_worker_count: None,
            })
            .collect();
        replace_workers(&mut db, workers);
        let order: Vec<&str> = db.line_workers.iter().map(|w| w.line_no.as_str()).collect();
        assert_eq!(order, vec!["1", "2", "10"]);
    }
}
