//! Roving pairing inspection
//!
//! Pairing checks top, middle and bottom parts (T/M/B) of an operator's
//! work. Each part cell carries a measurement deviation, written as a
//! fraction of an inch, and any defects found on it. A part is rejected when
//! its measurement is out of tolerance or it has a defect.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AppError, AppResult};
use crate::roving::parse_date;
use crate::store::Database;

#[cfg(feature = "web")]
use crate::app::SharedState;
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::{Query, State},
};

pub const PART_TYPES: [&str; 3] = ["T", "M", "B"];
pub const DEFAULT_PART_QTY: u32 = 5;
pub const DEFAULT_TOLERANCE: &str = "1/8";
/// Marker the form stores for a measurement inside tolerance
pub const CHECK_MARK: &str = "✔";

/// Numeric value of a measurement such as `"-1 1/8"`, `"3/16"` or `"0.5"`
///
/// Blank cells and the check mark count as zero, as do malformed parts.
pub fn parse_fraction(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() || raw == CHECK_MARK {
        return 0.0;
    }
    let (sign, magnitude) = match raw.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, raw),
    };
    let total: f64 = magnitude
        .split_whitespace()
        .map(|part| match part.split_once('/') {
            Some((num, den)) => match (num.parse::<f64>(), den.parse::<f64>()) {
                (Ok(n), Ok(d)) if d != 0.0 => n / d,
                _ => 0.0,
            },
            None => part.parse::<f64>().unwrap_or(0.0),
        })
        .sum();
    sign * total
}

pub fn is_out_of_tolerance(value: &str, tolerance: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value == CHECK_MARK {
        return false;
    }
    parse_fraction(value).abs() > parse_fraction(tolerance)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartMeasurement {
    #[serde(rename = "partNo")]
    pub part_no: u32,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    #[serde(rename = "partType")]
    pub part_type: String,
    #[serde(default)]
    pub measurements: Vec<PartMeasurement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairingDefect {
    pub defect_name_eng: String,
    pub defect_name_khmer: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartDefects {
    pub part_no: u32,
    pub defects: Vec<PairingDefect>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartDefectDetails {
    pub part_type: String,
    pub defects_for_part: Vec<PartDefects>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasurementSummary {
    pub total_rejects: u32,
    pub positive_rejects: u32,
    pub negative_rejects: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefectSummary {
    pub total_rejected_parts: u32,
    pub total_defect_qty: u32,
    pub defect_details: Vec<PartDefectDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalSummary {
    #[serde(rename = "totalParts")]
    pub total_parts: u32,
    #[serde(rename = "totalRejects")]
    pub total_rejects: u32,
    #[serde(rename = "totalPass")]
    pub total_pass: u32,
    #[serde(rename = "passRate")]
    pub pass_rate: String,
    pub t_qty: u32,
    pub m_qty: u32,
    pub b_qty: u32,
}

/// One operator checked in a pairing round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingItem {
    pub inspection_rep_name: String,
    pub operator_emp_id: String,
    pub operator_eng_name: String,
    pub operator_kh_name: String,
    pub operator_job_title: String,
    pub operator_dept_name: String,
    pub operator_sect_name: String,
    #[serde(rename = "accessoryComplete")]
    pub accessory_complete: String,
    #[serde(rename = "accessoryRemark")]
    pub accessory_remark: String,
    #[serde(rename = "measurementData")]
    pub measurement_data: Vec<MeasurementSet>,
    #[serde(rename = "measurementSummary")]
    pub measurement_summary: MeasurementSummary,
    #[serde(rename = "defectSummary")]
    pub defect_summary: DefectSummary,
    #[serde(rename = "totalSummary")]
    pub total_summary: TotalSummary,
}

/// Computed totals of a pairing item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairingSummary {
    pub measurement: MeasurementSummary,
    pub defect: DefectSummary,
    pub total: TotalSummary,
}

fn quantity(item: &PairingItem, part_type: &str) -> u32 {
    item.measurement_data
        .iter()
        .find(|m| m.part_type == part_type)
        .map_or(DEFAULT_PART_QTY, |m| m.measurements.len() as u32)
}

/// Recompute every summary of a pairing item from its cells
pub fn evaluate(item: &PairingItem, tolerance: &str) -> PairingSummary {
    let mut rejected: BTreeSet<(String, u32)> = BTreeSet::new();

    let mut measurement = MeasurementSummary::default();
    for set in &item.measurement_data {
        for cell in &set.measurements {
            if is_out_of_tolerance(&cell.value, tolerance) {
                measurement.total_rejects += 1;
                if parse_fraction(&cell.value) > 0.0 {
                    measurement.positive_rejects += 1;
                } else {
                    measurement.negative_rejects += 1;
                }
                rejected.insert((set.part_type.clone(), cell.part_no));
            }
        }
    }

    let mut defect_parts: BTreeSet<(String, u32)> = BTreeSet::new();
    let mut total_defect_qty: u32 = 0;
    for details in &item.defect_summary.defect_details {
        // any recorded defect rejects the part, whatever its quantity
        for part in details.defects_for_part.iter().filter(|p| !p.defects.is_empty()) {
            total_defect_qty = part
                .defects
                .iter()
                .fold(total_defect_qty, |n, d| n.saturating_add(d.count));
            defect_parts.insert((details.part_type.clone(), part.part_no));
        }
    }
    let defect = DefectSummary {
        total_rejected_parts: defect_parts.len() as u32,
        total_defect_qty,
        defect_details: item.defect_summary.defect_details.clone(),
    };
    rejected.extend(defect_parts);

    let (t_qty, m_qty, b_qty) = (
        quantity(item, PART_TYPES[0]),
        quantity(item, PART_TYPES[1]),
        quantity(item, PART_TYPES[2]),
    );
    let total_parts = t_qty.saturating_add(m_qty).saturating_add(b_qty);
    let total_rejects = rejected.len() as u32;
    let total_pass = total_parts.saturating_sub(total_rejects);
    let pass_rate = if total_parts > 0 {
        format!("{:.2}%", total_pass as f64 / total_parts as f64 * 100.0)
    } else {
        "0.00%".to_string()
    };

    PairingSummary {
        measurement,
        defect,
        total: TotalSummary {
            total_parts,
            total_rejects,
            total_pass,
            pass_rate,
            t_qty,
            m_qty,
            b_qty,
        },
    }
}

/// Pairing results for one date, line and MO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingRecord {
    pub pairing_id: u64,
    pub report_name: String,
    pub inspection_date: String,
    #[serde(rename = "lineNo")]
    pub line_no: String,
    #[serde(rename = "moNo")]
    pub mo_no: String,
    pub emp_id: String,
    pub eng_name: String,
    #[serde(rename = "operationNo")]
    pub operation_no: u32,
    #[serde(rename = "operationName")]
    pub operation_name: String,
    #[serde(rename = "operationName_kh")]
    pub operation_name_kh: String,
    #[serde(rename = "pairingData")]
    pub pairing_data: Vec<PairingItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairingRequest {
    pub report_name: String,
    pub inspection_date: String,
    #[serde(rename = "lineNo")]
    pub line_no: String,
    #[serde(rename = "moNo")]
    pub mo_no: String,
    pub emp_id: String,
    pub eng_name: String,
    #[serde(rename = "operationNo")]
    pub operation_no: u32,
    #[serde(rename = "operationName")]
    pub operation_name: String,
    #[serde(rename = "operationName_kh")]
    pub operation_name_kh: String,
    pub tolerance: Option<String>,
    #[serde(rename = "pairingDataItem")]
    pub pairing_data_item: Option<PairingItem>,
}

/// Save a pairing item, replacing an earlier one of the same round and operator
///
/// Summaries sent by the client are ignored and recomputed.
pub fn save(db: &mut Database, request: PairingRequest) -> AppResult<PairingRecord> {
    let item = request.pairing_data_item.filter(|i| !i.operator_emp_id.is_empty());
    let Some(mut item) = item.filter(|_| {
        !request.inspection_date.is_empty() && !request.line_no.is_empty() && !request.mo_no.is_empty()
    }) else {
        return Err(AppError::bad_request(
            "Missing required fields: inspection_date, lineNo, moNo, or operator.",
        ));
    };

    let tolerance = request.tolerance.as_deref().unwrap_or(DEFAULT_TOLERANCE);
    let summary = evaluate(&item, tolerance);
    item.measurement_summary = summary.measurement;
    item.defect_summary = summary.defect;
    item.total_summary = summary.total;

    let existing = db.pairing.iter_mut().find(|r| {
        r.inspection_date == request.inspection_date
            && r.line_no == request.line_no
            && r.mo_no == request.mo_no
    });
    if let Some(record) = existing {
        record.pairing_data.retain(|p| {
            !(p.inspection_rep_name == item.inspection_rep_name
                && p.operator_emp_id == item.operator_emp_id)
        });
        record.pairing_data.push(item);
        info!("pairing record {} updated", record.pairing_id);
        return Ok(record.clone());
    }

    let pairing_id = db.pairing.iter().map(|r| r.pairing_id).max().map_or(1, |m| m + 1);
    let record = PairingRecord {
        pairing_id,
        report_name: if request.report_name.is_empty() {
            "QC Inline Roving Pairing".to_string()
        } else {
            request.report_name
        },
        inspection_date: request.inspection_date,
        line_no: request.line_no,
        mo_no: request.mo_no,
        emp_id: request.emp_id,
        eng_name: request.eng_name,
        operation_no: request.operation_no,
        operation_name: request.operation_name,
        operation_name_kh: request.operation_name_kh,
        pairing_data: vec![item],
    };
    info!("pairing record {} created", pairing_id);
    db.pairing.push(record.clone());
    Ok(record)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingFilterOptions {
    pub qc_ids: Vec<String>,
    pub operator_ids: Vec<String>,
    pub line_nos: Vec<String>,
    pub mo_nos: Vec<String>,
}

fn same_day(record: &PairingRecord, date: Option<&str>) -> bool {
    match date.filter(|d| !d.is_empty()) {
        Some(d) => parse_date(d).is_some_and(|d| parse_date(&record.inspection_date) == Some(d)),
        None => true,
    }
}

/// Distinct filter values over the records of one day (all days when `date` is empty)
pub fn filter_options(db: &Database, date: Option<&str>) -> PairingFilterOptions {
    let mut qc_ids = BTreeSet::new();
    let mut operator_ids = BTreeSet::new();
    let mut line_nos = BTreeSet::new();
    let mut mo_nos = BTreeSet::new();

    for record in db.pairing.iter().filter(|r| same_day(r, date)) {
        qc_ids.insert(record.emp_id.clone());
        line_nos.insert(record.line_no.clone());
        mo_nos.insert(record.mo_no.clone());
        operator_ids.extend(record.pairing_data.iter().map(|p| p.operator_emp_id.clone()));
    }

    let sorted = |set: BTreeSet<String>| -> Vec<String> {
        set.into_iter().filter(|v| !v.is_empty()).collect()
    };
    PairingFilterOptions {
        qc_ids: sorted(qc_ids),
        operator_ids: sorted(operator_ids),
        line_nos: sorted(line_nos),
        mo_nos: sorted(mo_nos),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairingFilter {
    #[serde(alias = "date")]
    pub inspection_date: Option<String>,
    #[serde(alias = "qcId")]
    pub qc_id: Option<String>,
    #[serde(alias = "operatorId")]
    pub operator_id: Option<String>,
    #[serde(alias = "lineNo")]
    pub line_no: Option<String>,
    #[serde(alias = "moNo")]
    pub mo_no: Option<String>,
}

/// Result of one round in the pairing report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCell {
    pub total_parts: u32,
    pub total_rejects: u32,
    pub measurement_rejects: u32,
    pub defect_qty: u32,
    pub pass_rate: String,
    pub accessory_complete: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingReportRow {
    pub inspection_date: String,
    pub line_no: String,
    pub mo_no: String,
    pub operator_emp_id: String,
    pub operator_eng_name: String,
    pub inspections: BTreeMap<String, PairingCell>,
}

/// Report grid: one row per operator and day, one column per round
pub fn report_rows(db: &Database, filter: &PairingFilter) -> Vec<PairingReportRow> {
    let wanted = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
    let (qc, operator, line, mo) = (
        wanted(&filter.qc_id),
        wanted(&filter.operator_id),
        wanted(&filter.line_no),
        wanted(&filter.mo_no),
    );

    let mut rows: Vec<PairingReportRow> = Vec::new();
    let records = db.pairing.iter().filter(|r| {
        same_day(r, filter.inspection_date.as_deref())
            && qc.as_ref().is_none_or(|q| &r.emp_id == q)
            && line.as_ref().is_none_or(|l| &r.line_no == l)
            && mo.as_ref().is_none_or(|m| &r.mo_no == m)
    });
    for record in records {
        for item in record
            .pairing_data
            .iter()
            .filter(|p| operator.as_ref().is_none_or(|o| &p.operator_emp_id == o))
        {
            let cell = PairingCell {
                total_parts: item.total_summary.total_parts,
                total_rejects: item.total_summary.total_rejects,
                measurement_rejects: item.measurement_summary.total_rejects,
                defect_qty: item.defect_summary.total_defect_qty,
                pass_rate: item.total_summary.pass_rate.clone(),
                accessory_complete: item.accessory_complete.clone(),
            };
            let key = |row: &PairingReportRow| {
                row.inspection_date == record.inspection_date
                    && row.line_no == record.line_no
                    && row.mo_no == record.mo_no
                    && row.operator_emp_id == item.operator_emp_id
            };
            match rows.iter_mut().find(|row| key(row)) {
                Some(row) => {
                    row.inspections.insert(item.inspection_rep_name.clone(), cell);
                }
                None => rows.push(PairingReportRow {
                    inspection_date: record.inspection_date.clone(),
                    line_no: record.line_no.clone(),
                    mo_no: record.mo_no.clone(),
                    operator_emp_id: item.operator_emp_id.clone(),
                    operator_eng_name: item.operator_eng_name.clone(),
                    inspections: BTreeMap::from([(item.inspection_rep_name.clone(), cell)]),
                }),
            }
        }
    }
    rows
}

// Web handler functions below (only compiled with "web" feature)

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct OptionsQuery {
    pub date: Option<String>,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub tolerance: Option<String>,
    pub item: PairingItem,
}

#[cfg(feature = "web")]
pub async fn handle_save(
    State(state): State<SharedState>,
    Json(request): Json<PairingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = state.store.write(|db| save(db, request))?;
    Ok(Json(serde_json::json!({
        "message": "QC Roving Pairing data saved successfully.",
        "data": record,
    })))
}

#[cfg(feature = "web")]
pub async fn handle_evaluate(Json(request): Json<EvaluateRequest>) -> Json<PairingSummary> {
    let tolerance = request.tolerance.as_deref().unwrap_or(DEFAULT_TOLERANCE);
    Json(evaluate(&request.item, tolerance))
}

#[cfg(feature = "web")]
pub async fn handle_filter_options(
    State(state): State<SharedState>,
    Query(query): Query<OptionsQuery>,
) -> Result<Json<PairingFilterOptions>, AppError> {
    Ok(Json(
        state.store.read(|db| filter_options(db, query.date.as_deref()))?,
    ))
}

#[cfg(feature = "web")]
pub async fn handle_report(
    State(state): State<SharedState>,
    Query(filter): Query<PairingFilter>,
) -> Result<Json<Vec<PairingReportRow>>, AppError> {
    Ok(Json(state.store.read(|db| report_rows(db, &filter))?))
}
