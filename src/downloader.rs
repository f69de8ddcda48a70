use crate::error::{AppError, AppResult};
use crate::roving::{InspectionRep, RovingEntry, RovingRecord};

/// Column headers of the roving export, one row per operator inspection
pub const HEADERS: [&str; 16] = [
    "Inspection Date",
    "Line No",
    "MO No",
    "Buyer",
    "Inspection",
    "QC ID",
    "QC Name",
    "Operator ID",
    "Operator Name",
    "Operation No",
    "Operation",
    "SPI",
    "Measurement",
    "Checked Qty",
    "Defect Qty",
    "Overall Status",
];

fn row_values(record: &RovingRecord, rep: &InspectionRep, entry: &RovingEntry) -> [String; 16] {
    [
        record.inspection_date.clone(),
        record.line_no.clone(),
        record.mo_no.clone(),
        record.buyer_name.clone(),
        rep.inspection_rep_name.clone(),
        rep.emp_id.clone(),
        rep.eng_name.clone(),
        entry.operator_emp_id.clone(),
        entry.operator_eng_name.clone(),
        entry.tg_no.clone(),
        entry.operation_kh_name.clone(),
        entry.spi.clone(),
        entry.measurement.clone(),
        entry.checked_quantity.to_string(),
        entry.defect_count().to_string(),
        entry.overall_roving_status.to_string(),
    ]
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Export roving records to CSV
///
/// Commas, quotes and newlines inside values are quoted the usual way.
///
/// # Examples
/// ```
/// use roving_qc::downloader::roving_to_csv;
///
/// let csv = roving_to_csv(&[]);
/// assert!(csv.starts_with("Inspection Date,Line No,MO No"));
/// assert_eq!(csv.lines().count(), 1);
/// ```
pub fn roving_to_csv(records: &[RovingRecord]) -> String {
    let mut csv_content = HEADERS.join(",");
    csv_content.push('\n');

    for record in records {
        for (rep, entry) in record.entries() {
            let line: Vec<String> = row_values(record, rep, entry)
                .iter()
                .map(|v| escape_csv(v))
                .collect();
            csv_content.push_str(&line.join(","));
            csv_content.push('\n');
        }
    }

    csv_content
}

/// Export roving records to an XLSX workbook held in memory
#[cfg(feature = "web")]
pub fn roving_to_xlsx(records: &[RovingRecord]) -> AppResult<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let xlsx_err = |e: rust_xlsxwriter::XlsxError| AppError::Internal(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Roving").map_err(xlsx_err)?;

    let bold = Format::new().set_bold();
    for (c, header) in HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, c as u16, *header, &bold)
            .map_err(xlsx_err)?;
    }

    let mut r: u32 = 1;
    for record in records {
        for (rep, entry) in record.entries() {
            for (c, value) in row_values(record, rep, entry).iter().enumerate() {
                // checked and defect quantities stay numeric
                if c == 13 || c == 14 {
                    let n: f64 = value.parse().unwrap_or(0.0);
                    worksheet.write_number(r, c as u16, n).map_err(xlsx_err)?;
                } else {
                    worksheet.write_string(r, c as u16, value).map_err(xlsx_err)?;
                }
            }
            r += 1;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(xlsx_err)
}
