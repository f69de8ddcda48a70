//! QC Inline Roving records
//!
//! A record collects every roving round done on one MO and sewing line on
//! one day. Each round ("inspection rep", 1st to 5th) belongs to a QC
//! inspector and holds one entry per operator checked.

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::buyer::determine_buyer;
use crate::defects;
use crate::error::{AppError, AppResult};
use crate::inspection::{
    self, CheckResult, Garment, InspectionType, QualityStatus, RovingStatus, SeverityTally,
};
use crate::orders;
use crate::store::Database;

#[cfg(feature = "web")]
use crate::app::SharedState;
#[cfg(feature = "web")]
use crate::buyer::aql_level;
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

/// Most inspection rounds recorded per date, MO and line
pub const MAX_INSPECTION_REPS: usize = 5;

/// Largest quantity accepted for one defect line of one garment
pub const MAX_DEFECT_QTY: u32 = 999;

pub const COMPLETED: &str = "Completed";
pub const NOT_COMPLETE: &str = "Not Complete";

fn pending() -> RovingStatus {
    RovingStatus::Pending
}

/// Failed garments of one operator inspection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RejectGarments {
    #[serde(rename = "totalCount", default)]
    pub total_count: u32,
    #[serde(default)]
    pub garments: Vec<Garment>,
}

/// One operator checked during a roving round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RovingEntry {
    pub operator_emp_id: String,
    pub operator_eng_name: String,
    pub operator_kh_name: String,
    pub operator_job_title: String,
    pub operator_dept_name: String,
    pub operator_sect_name: String,
    pub tg_no: String,
    pub tg_code: String,
    pub ma_code: String,
    pub operation_ch_name: String,
    pub operation_kh_name: String,
    #[serde(rename = "type")]
    pub inspection_type: InspectionType,
    pub spi: String,
    pub spi_image: String,
    pub measurement: String,
    pub measurement_image: String,
    pub checked_quantity: u32,
    pub inspection_time: String,
    #[serde(rename = "qualityStatus")]
    pub quality_status: QualityStatus,
    #[serde(rename = "rejectGarments")]
    pub reject_garments: Vec<RejectGarments>,
    #[serde(default = "pending")]
    pub overall_roving_status: RovingStatus,
}

impl Default for RovingEntry {
    fn default() -> Self {
        RovingEntry {
            operator_emp_id: String::new(),
            operator_eng_name: String::new(),
            operator_kh_name: String::new(),
            operator_job_title: String::new(),
            operator_dept_name: String::new(),
            operator_sect_name: String::new(),
            tg_no: String::new(),
            tg_code: String::new(),
            ma_code: String::new(),
            operation_ch_name: String::new(),
            operation_kh_name: String::new(),
            inspection_type: InspectionType::default(),
            spi: String::new(),
            spi_image: String::new(),
            measurement: String::new(),
            measurement_image: String::new(),
            checked_quantity: 0,
            inspection_time: String::new(),
            quality_status: QualityStatus::default(),
            reject_garments: Vec::new(),
            overall_roving_status: RovingStatus::Pending,
        }
    }
}

impl RovingEntry {
    pub fn garments(&self) -> impl Iterator<Item = &Garment> {
        self.reject_garments.iter().flat_map(|r| r.garments.iter())
    }

    pub fn defect_count(&self) -> u32 {
        self.garments()
            .fold(0u32, |n, g| n.saturating_add(g.defect_count()))
    }
}

/// One roving round of a QC inspector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionRep {
    pub inspection_rep_name: String,
    pub emp_id: String,
    pub eng_name: String,
    #[serde(default)]
    pub total_operators: u32,
    #[serde(default)]
    pub complete_inspect_operators: u32,
    #[serde(rename = "Inspect_status", default)]
    pub inspect_status: String,
    #[serde(rename = "inlineData", default)]
    pub inline_data: Vec<RovingEntry>,
}

impl InspectionRep {
    fn refresh_status(&mut self) {
        self.complete_inspect_operators = self.inline_data.len() as u32;
        self.inspect_status = if self.total_operators > 0
            && self.complete_inspect_operators >= self.total_operators
        {
            COMPLETED.to_string()
        } else {
            NOT_COMPLETE.to_string()
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RovingRecord {
    pub inline_roving_id: u64,
    pub report_name: String,
    pub inspection_date: String,
    pub mo_no: String,
    pub line_no: String,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub inspection_rep: Vec<InspectionRep>,
}

impl RovingRecord {
    pub fn entries(&self) -> impl Iterator<Item = (&InspectionRep, &RovingEntry)> {
        self.inspection_rep
            .iter()
            .flat_map(|rep| rep.inline_data.iter().map(move |e| (rep, e)))
    }
}

/// Body of a save request
///
/// The round is normally sent as `inspection_rep_item`; a one-element
/// `inspection_rep` array is accepted as well.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SaveRequest {
    pub inspection_date: String,
    pub mo_no: String,
    pub line_no: String,
    pub report_name: Option<String>,
    pub inspection_rep_item: Option<InspectionRep>,
    pub inspection_rep: Vec<InspectionRep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Created(RovingRecord),
    Updated(RovingRecord),
}

/// Derive the computed fields of an entry
///
/// Garments without defects are dropped from the reject list, the garment
/// counts and quality status are recomputed and the overall roving status is
/// classified with the severities the buyer has for each defect. A defect
/// quantity above [`MAX_DEFECT_QTY`] is refused.
pub fn prepare_entry(
    mut entry: RovingEntry,
    buyer: &str,
    catalog: &Database,
) -> AppResult<RovingEntry> {
    if let Some(defect) = entry
        .garments()
        .flat_map(|g| g.defects.iter())
        .find(|d| d.count > MAX_DEFECT_QTY)
    {
        return Err(AppError::BadRequest(format!(
            "Defect quantity {} for '{}' exceeds the limit of {}",
            defect.count, defect.name, MAX_DEFECT_QTY
        )));
    }

    let mut garments: Vec<Garment> = entry
        .reject_garments
        .drain(..)
        .flat_map(|r| r.garments)
        .collect();
    for garment in garments.iter_mut() {
        garment.normalize();
    }
    garments.retain(Garment::is_fail);

    let tally = inspection::tally(&garments, |name| defects::severity_for(catalog, name, buyer));
    entry.quality_status = inspection::quality_status(&garments);
    if entry.checked_quantity == 0 {
        entry.checked_quantity = entry.inspection_type.sample_size() as u32;
    }
    entry.overall_roving_status = classify_entry(&entry, &tally);
    entry.reject_garments = vec![RejectGarments {
        total_count: garments
            .iter()
            .fold(0u32, |n, g| n.saturating_add(g.defect_count())),
        garments,
    }];
    Ok(entry)
}

fn classify_entry(entry: &RovingEntry, tally: &SeverityTally) -> RovingStatus {
    inspection::classify(
        CheckResult::parse(&entry.spi),
        CheckResult::parse(&entry.measurement),
        tally,
    )
}

/// Save one roving round
///
/// Records are keyed by date, MO and line. A round with a known name gets
/// its first new entry appended; a new round is added while fewer than
/// [`MAX_INSPECTION_REPS`] exist.
pub fn save(db: &mut Database, request: SaveRequest) -> AppResult<SaveOutcome> {
    let SaveRequest {
        inspection_date,
        mo_no,
        line_no,
        report_name,
        inspection_rep_item,
        inspection_rep,
    } = request;

    let rep_item = inspection_rep_item.or_else(|| inspection_rep.into_iter().next());
    let Some(mut rep_item) = rep_item.filter(|_| {
        !inspection_date.is_empty() && !mo_no.is_empty() && !line_no.is_empty()
    }) else {
        return Err(AppError::bad_request(
            "Missing required fields: inspection_date, mo_no, line_no, or inspection_rep_item.",
        ));
    };
    if rep_item.inspection_rep_name.is_empty()
        || rep_item.emp_id.is_empty()
        || rep_item.eng_name.is_empty()
    {
        return Err(AppError::bad_request(
            "inspection_rep_item is missing required fields like inspection_rep_name, emp_id, or eng_name.",
        ));
    }

    let buyer = determine_buyer(&mo_no);
    let catalog: &Database = db;
    rep_item.inline_data = rep_item
        .inline_data
        .into_iter()
        .map(|e| prepare_entry(e, buyer, catalog))
        .collect::<AppResult<Vec<_>>>()?;

    let existing = db.roving.iter_mut().find(|r| {
        r.inspection_date == inspection_date && r.mo_no == mo_no && r.line_no == line_no
    });

    if let Some(record) = existing {
        let rep_count = record.inspection_rep.len();
        match record
            .inspection_rep
            .iter_mut()
            .find(|rep| rep.inspection_rep_name == rep_item.inspection_rep_name)
        {
            Some(rep) => {
                if let Some(entry) = rep_item.inline_data.into_iter().next() {
                    rep.inline_data.push(entry);
                }
                rep.emp_id = rep_item.emp_id;
                rep.eng_name = rep_item.eng_name;
                rep.refresh_status();
            }
            None if rep_count < MAX_INSPECTION_REPS => {
                rep_item.refresh_status();
                record.inspection_rep.push(rep_item);
            }
            None => {
                return Err(AppError::bad_request(
                    "Maximum number of 5 inspection reports already recorded for this combination.",
                ));
            }
        }
        if let Some(name) = report_name.filter(|n| !n.is_empty()) {
            record.report_name = name;
        }
        if record.buyer_name.is_empty() {
            record.buyer_name = buyer.to_string();
        }
        info!(
            "roving record {} updated ({} rounds)",
            record.inline_roving_id,
            record.inspection_rep.len()
        );
        return Ok(SaveOutcome::Updated(record.clone()));
    }

    let id = db
        .roving
        .iter()
        .map(|r| r.inline_roving_id)
        .max()
        .map_or(1, |max| max + 1);
    rep_item.refresh_status();
    let record = RovingRecord {
        inline_roving_id: id,
        report_name: report_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Report for {} - {} - {}", inspection_date, line_no, mo_no)),
        inspection_date,
        mo_no,
        line_no,
        buyer_name: buyer.to_string(),
        inspection_rep: vec![rep_item],
    };
    info!("roving record {} created", record.inline_roving_id);
    db.roving.push(record.clone());
    Ok(SaveOutcome::Created(record))
}

/// Parse an inspection date, either `M/D/YYYY` (zero padding optional) or `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let mut parts = raw.split('/').map(|p| p.trim().parse::<u32>());
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(month)), Some(Ok(day)), Some(Ok(year)), None) => {
            NaiveDate::from_ymd_opt(year as i32, month, day)
        }
        _ => None,
    }
}

/// Query filter for roving reports
///
/// Every field is optional. Both the snake case and camel case query names
/// used by the report pages are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RovingFilter {
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    pub inspection_date: Option<String>,
    #[serde(alias = "lineNo")]
    pub line_no: Option<String>,
    #[serde(alias = "moNo")]
    pub mo_no: Option<String>,
    #[serde(alias = "qcId", alias = "emp_id")]
    pub qc_id: Option<String>,
    #[serde(alias = "operatorId")]
    pub operator_id: Option<String>,
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn bound(value: &Option<String>) -> Option<NaiveDate> {
    let raw = given(value)?;
    let date = parse_date(raw);
    if date.is_none() {
        warn!("ignoring unparseable date filter {:?}", raw);
    }
    date
}

impl RovingFilter {
    pub fn matches(&self, record: &RovingRecord) -> bool {
        let date = parse_date(&record.inspection_date);
        let on_or_after = |b: Option<NaiveDate>| b.is_none_or(|b| date.is_some_and(|d| d >= b));
        let on_or_before = |b: Option<NaiveDate>| b.is_none_or(|b| date.is_some_and(|d| d <= b));

        on_or_after(bound(&self.start_date))
            && on_or_before(bound(&self.end_date))
            && bound(&self.inspection_date).is_none_or(|b| date == Some(b))
            && given(&self.line_no).is_none_or(|l| record.line_no == l)
            && given(&self.mo_no).is_none_or(|m| record.mo_no == m)
            && given(&self.qc_id)
                .is_none_or(|q| record.inspection_rep.iter().any(|rep| rep.emp_id == q))
            && given(&self.operator_id)
                .is_none_or(|o| record.entries().any(|(_, e)| e.operator_emp_id == o))
    }
}

pub fn filter_records(db: &Database, filter: &RovingFilter) -> Vec<RovingRecord> {
    let records: Vec<RovingRecord> = db
        .roving
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    debug!("roving filter {:?} matched {} records", filter, records.len());
    records
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn distinct_mo_nos(db: &Database) -> Vec<String> {
    distinct(db.roving.iter().map(|r| r.mo_no.as_str()))
}

pub fn distinct_buyers(db: &Database) -> Vec<String> {
    distinct(db.roving.iter().map(|r| r.buyer_name.as_str()))
}

pub fn distinct_operations(db: &Database) -> Vec<String> {
    distinct(
        db.roving
            .iter()
            .flat_map(|r| r.entries())
            .map(|(_, e)| e.operation_kh_name.as_str()),
    )
}

pub fn distinct_qc_ids(db: &Database) -> Vec<String> {
    distinct(
        db.roving
            .iter()
            .flat_map(|r| r.inspection_rep.iter())
            .map(|rep| rep.emp_id.as_str()),
    )
}

/// English ordinal of `n`: 1st, 2nd, 3rd, 4th, 11th, 21st
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Which roving round (1st to 5th) is due next on a line
///
/// A round is complete once at least the line's target number of operators
/// has been inspected that many times on the given day.
pub fn inspection_ordinal(db: &Database, line_no: &str, inspection_date: &str) -> AppResult<String> {
    if line_no.is_empty() || inspection_date.is_empty() {
        return Err(AppError::bad_request(
            "Line number and inspection date are required.",
        ));
    }
    let well_formed = inspection_date.len() == 10
        && inspection_date
            .char_indices()
            .all(|(i, c)| if i == 2 || i == 5 { c == '/' } else { c.is_ascii_digit() });
    if !well_formed {
        return Err(AppError::bad_request(
            "Invalid inspection date format. Expected MM/DD/YYYY.",
        ));
    }

    let Some(line) = orders::line_worker(db, line_no) else {
        return Ok("N/A (Line not configured)".to_string());
    };
    let target = line.target_workers();
    if target == 0 {
        return Ok("N/A (Target 0 workers)".to_string());
    }

    let mut per_operator: HashMap<&str, u32> = HashMap::new();
    for record in db
        .roving
        .iter()
        .filter(|r| r.line_no == line_no && r.inspection_date == inspection_date)
    {
        for (_, entry) in record.entries() {
            if !entry.operator_emp_id.is_empty() {
                *per_operator.entry(entry.operator_emp_id.as_str()).or_default() += 1;
            }
        }
    }

    let mut completed = 0;
    for round in 1..=MAX_INSPECTION_REPS as u32 {
        let finished = per_operator.values().filter(|&&n| n >= round).count() as u32;
        if finished >= target {
            completed = round;
        } else {
            break;
        }
    }

    let next = completed + 1;
    if next > MAX_INSPECTION_REPS as u32 {
        Ok(format!("{} (Completed)", ordinal(MAX_INSPECTION_REPS as u32)))
    } else {
        Ok(ordinal(next))
    }
}

/// Operators already inspected in one round
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompletedQuery {
    pub line_no: String,
    pub inspection_date: String,
    pub mo_no: Option<String>,
    pub operation_id: Option<String>,
    pub inspection_rep_name: String,
}

pub fn completed_operators(db: &Database, query: &CompletedQuery) -> u32 {
    db.roving
        .iter()
        .filter(|r| r.line_no == query.line_no && r.inspection_date == query.inspection_date)
        .filter(|r| given(&query.mo_no).is_none_or(|m| r.mo_no == m))
        .flat_map(|r| r.inspection_rep.iter())
        .find(|rep| {
            rep.inspection_rep_name == query.inspection_rep_name
                && given(&query.operation_id)
                    .is_none_or(|op| rep.inline_data.iter().any(|e| e.tg_no == op))
        })
        .map_or(0, |rep| rep.complete_inspect_operators)
}

/// One row of the roving report grid: an operator on one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorSummary {
    pub inspection_date: String,
    pub line_no: String,
    pub mo_no: String,
    pub operator_emp_id: String,
    pub operator_eng_name: String,
    pub tg_no: String,
    pub operation_kh_name: String,
    pub total_checked: u32,
    pub total_defects: u32,
    /// Overall status per round name
    pub inspections: BTreeMap<String, RovingStatus>,
}

pub fn operator_summaries(records: &[RovingRecord]) -> Vec<OperatorSummary> {
    let mut rows: Vec<OperatorSummary> = Vec::new();
    for record in records {
        for (rep, entry) in record.entries() {
            let position = rows.iter().position(|row| {
                row.inspection_date == record.inspection_date
                    && row.line_no == record.line_no
                    && row.mo_no == record.mo_no
                    && row.operator_emp_id == entry.operator_emp_id
                    && row.tg_no == entry.tg_no
            });
            let row = match position {
                Some(i) => &mut rows[i],
                None => {
                    rows.push(OperatorSummary {
                        inspection_date: record.inspection_date.clone(),
                        line_no: record.line_no.clone(),
                        mo_no: record.mo_no.clone(),
                        operator_emp_id: entry.operator_emp_id.clone(),
                        operator_eng_name: entry.operator_eng_name.clone(),
                        tg_no: entry.tg_no.clone(),
                        operation_kh_name: entry.operation_kh_name.clone(),
                        total_checked: 0,
                        total_defects: 0,
                        inspections: BTreeMap::new(),
                    });
                    let last = rows.len() - 1;
                    &mut rows[last]
                }
            };
            row.total_checked = row.total_checked.saturating_add(entry.checked_quantity);
            row.total_defects = row.total_defects.saturating_add(entry.defect_count());
            row.inspections
                .insert(rep.inspection_rep_name.clone(), entry.overall_roving_status);
        }
    }
    rows
}

/// Number of operator inspections per overall status, in display order
pub fn status_counts(records: &[RovingRecord]) -> Vec<(RovingStatus, usize)> {
    RovingStatus::ALL
        .iter()
        .map(|status| {
            let n = records
                .iter()
                .flat_map(|r| r.entries())
                .filter(|(_, e)| e.overall_roving_status == *status)
                .count();
            (*status, n)
        })
        .collect()
}

// Web handler functions below (only compiled with "web" feature)

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct OrdinalQuery {
    #[serde(default)]
    pub line_no: String,
    #[serde(default)]
    pub inspection_date: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct BuyerQuery {
    #[serde(rename = "moNo", default)]
    pub mo_no: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub mo_no: String,
    pub entry: RovingEntry,
}

#[cfg(feature = "web")]
pub async fn handle_save(
    State(state): State<SharedState>,
    Json(request): Json<SaveRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let outcome = state.store.write(|db| save(db, request))?;
    let (status, message, record) = match outcome {
        SaveOutcome::Created(record) => (
            StatusCode::CREATED,
            "QC Inline Roving data saved successfully (new record created).",
            record,
        ),
        SaveOutcome::Updated(record) => (
            StatusCode::OK,
            "QC Inline Roving data updated successfully.",
            record,
        ),
    };
    Ok((
        status,
        Json(serde_json::json!({ "message": message, "data": record })),
    ))
}

#[cfg(feature = "web")]
pub async fn handle_reports(
    State(state): State<SharedState>,
    Query(filter): Query<RovingFilter>,
) -> Result<Json<Vec<RovingRecord>>, AppError> {
    Ok(Json(state.store.read(|db| filter_records(db, &filter))?))
}

#[cfg(feature = "web")]
pub async fn handle_operator_summary(
    State(state): State<SharedState>,
    Query(filter): Query<RovingFilter>,
) -> Result<Json<Vec<OperatorSummary>>, AppError> {
    let records = state.store.read(|db| filter_records(db, &filter))?;
    Ok(Json(operator_summaries(&records)))
}

#[cfg(feature = "web")]
pub async fn handle_mo_nos(State(state): State<SharedState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.store.read(distinct_mo_nos)?))
}

#[cfg(feature = "web")]
pub async fn handle_buyers(State(state): State<SharedState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.store.read(distinct_buyers)?))
}

#[cfg(feature = "web")]
pub async fn handle_operations(
    State(state): State<SharedState>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.store.read(distinct_operations)?))
}

#[cfg(feature = "web")]
pub async fn handle_qc_ids(State(state): State<SharedState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.store.read(distinct_qc_ids)?))
}

#[cfg(feature = "web")]
pub async fn handle_inspection_ordinal(
    State(state): State<SharedState>,
    Query(query): Query<OrdinalQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ordinal = state
        .store
        .read(|db| inspection_ordinal(db, &query.line_no, &query.inspection_date))??;
    Ok(Json(serde_json::json!({ "inspectionTimeOrdinal": ordinal })))
}

#[cfg(feature = "web")]
pub async fn handle_completed_operators(
    State(state): State<SharedState>,
    Query(query): Query<CompletedQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = state.store.read(|db| completed_operators(db, &query))?;
    Ok(Json(serde_json::json!({ "completeInspectOperators": count })))
}

#[cfg(feature = "web")]
pub async fn handle_buyer_status(
    Query(query): Query<BuyerQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if query.mo_no.is_empty() {
        return Err(AppError::bad_request("MO number is required"));
    }
    let buyer = determine_buyer(&query.mo_no);
    Ok(Json(serde_json::json!({
        "buyerName": buyer,
        "aqlLevel": aql_level(buyer),
    })))
}

/// Classify an entry without saving it, for the live status on the form
#[cfg(feature = "web")]
pub async fn handle_classify(
    State(state): State<SharedState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let buyer = determine_buyer(&request.mo_no);
    let entry = state
        .store
        .read(|db| prepare_entry(request.entry, buyer, db))??;
    let status = entry.overall_roving_status;
    Ok(Json(serde_json::json!({
        "buyerName": buyer,
        "aqlLevel": aql_level(buyer),
        "status": status,
        "tier": status.tier(),
        "qualityStatus": entry.quality_status,
        "checkedQuantity": entry.checked_quantity,
        "totalDefects": entry.defect_count(),
    })))
}
