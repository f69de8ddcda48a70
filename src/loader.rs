use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::orders::{InlineOrder, LineWorker, OrderOperation};

/// Leading bytes of a zip archive, which every `.xlsx` file is
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// An uploaded master list split into header-keyed rows
///
/// Header names are trimmed and compared case-insensitively. Blank lines are
/// skipped.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header_row: Vec<String>, rows: Vec<Vec<String>>) -> Table {
        let headers = header_row
            .into_iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        Table { headers, rows }
    }

    pub fn parse(content: &str) -> AppResult<Table> {
        let mut lines = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let header_line = lines
            .next()
            .ok_or_else(|| AppError::bad_request("CSV file is empty"))?;
        let rows = lines.map(parse_csv_row).collect();

        Ok(Table::new(parse_csv_row(header_line), rows))
    }

    /// Read the first worksheet of an `.xlsx` workbook
    #[cfg(feature = "web")]
    pub fn from_xlsx(bytes: &[u8]) -> AppResult<Table> {
        use calamine::{Reader, Xlsx};
        use std::io::Cursor;

        let xlsx_err = |e: calamine::XlsxError| AppError::BadRequest(format!("Invalid Excel file: {}", e));

        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(xlsx_err)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AppError::bad_request("No sheets found in Excel file"))?;
        let range = workbook.worksheet_range(&sheet_name).map_err(xlsx_err)?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
            .filter(|row| row.iter().any(|v| !v.trim().is_empty()));
        let header_row = rows
            .next()
            .ok_or_else(|| AppError::bad_request("Excel sheet is empty"))?;

        Ok(Table::new(header_row, rows.collect()))
    }

    /// Pick the parser from the upload's content: xlsx workbooks are zip
    /// archives, anything else must be UTF-8 CSV
    pub fn from_upload(bytes: &[u8]) -> AppResult<Table> {
        if bytes.starts_with(ZIP_MAGIC) {
            #[cfg(feature = "web")]
            return Table::from_xlsx(bytes);
            #[cfg(not(feature = "web"))]
            return Err(AppError::bad_request("Excel uploads need the web feature"));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| AppError::bad_request("CSV file must be UTF-8 encoded"))?;
        Table::parse(content)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn require(&self, column: &str) -> AppResult<usize> {
        self.index(column)
            .ok_or_else(|| AppError::BadRequest(format!("Upload is missing the '{}' column", column)))
    }

    fn index(&self, column: &str) -> Option<usize> {
        let column = column.to_lowercase();
        self.headers.iter().position(|h| *h == column)
    }

    /// Rows as column name to value maps, with the 1-based data row number
    pub fn records(&self) -> impl Iterator<Item = (usize, HashMap<&str, &str>)> {
        self.rows.iter().enumerate().map(|(i, row)| {
            let record = self
                .headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.as_str(), v.trim()))
                .collect();
            (i + 1, record)
        })
    }
}

#[cfg(feature = "web")]
fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;

    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        // whole numbers come back as floats
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // escaped quote
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            _ => current_field.push(c),
        }
    }

    result.push(current_field);
    result
}

fn field<'a>(record: &HashMap<&str, &'a str>, column: &str) -> &'a str {
    record.get(column).copied().unwrap_or("")
}

fn number(record: &HashMap<&str, &str>, column: &str, row: usize) -> AppResult<Option<u32>> {
    let raw = field(record, column);
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>().map(Some).map_err(|_| {
        AppError::BadRequest(format!(
            "Row {}: '{}' is not a valid {} value",
            row, raw, column
        ))
    })
}

/// Inline orders from a CSV with one operation per row
///
/// Expected columns: `St_No`, `By_Style`, `Dept_Type`, `Tg_No`, `Tg_Code`,
/// `Ma_Code`, `ch_name`, `kh_name`. Only `St_No` is required.
pub fn orders_from_csv(content: &str) -> AppResult<Vec<InlineOrder>> {
    orders_from_table(&Table::parse(content)?)
}

/// Inline orders from the first sheet of an `.xlsx` workbook, same columns
/// as [`orders_from_csv`]
#[cfg(feature = "web")]
pub fn orders_from_xlsx(bytes: &[u8]) -> AppResult<Vec<InlineOrder>> {
    orders_from_table(&Table::from_xlsx(bytes)?)
}

pub fn orders_from_table(table: &Table) -> AppResult<Vec<InlineOrder>> {
    table.require("st_no")?;

    let mut orders: Vec<InlineOrder> = Vec::new();
    for (row, record) in table.records() {
        let st_no = field(&record, "st_no");
        if st_no.is_empty() {
            return Err(AppError::BadRequest(format!("Row {}: St_No is empty", row)));
        }
        let by_style = field(&record, "by_style");
        let dept_type = field(&record, "dept_type");
        let operation = OrderOperation {
            tg_no: field(&record, "tg_no").to_string(),
            tg_code: field(&record, "tg_code").to_string(),
            ma_code: field(&record, "ma_code").to_string(),
            ch_name: field(&record, "ch_name").to_string(),
            kh_name: field(&record, "kh_name").to_string(),
        };

        let existing = orders
            .iter_mut()
            .find(|o| o.st_no == st_no && o.by_style == by_style && o.dept_type == dept_type);
        let order = match existing {
            Some(order) => order,
            None => {
                orders.push(InlineOrder {
                    st_no: st_no.to_string(),
                    by_style: by_style.to_string(),
                    dept_type: dept_type.to_string(),
                    order_data: Vec::new(),
                });
                let last = orders.len() - 1;
                &mut orders[last]
            }
        };
        if !operation.tg_no.is_empty() {
            order.order_data.push(operation);
        }
    }
    Ok(orders)
}

/// Line head counts from a CSV with `line_no`, `real_worker_count` and an
/// optional `edited_worker_count` column
pub fn workers_from_csv(content: &str) -> AppResult<Vec<LineWorker>> {
    workers_from_table(&Table::parse(content)?)
}

#[cfg(feature = "web")]
pub fn workers_from_xlsx(bytes: &[u8]) -> AppResult<Vec<LineWorker>> {
    workers_from_table(&Table::from_xlsx(bytes)?)
}

pub fn workers_from_table(table: &Table) -> AppResult<Vec<LineWorker>> {
    table.require("line_no")?;
    table.require("real_worker_count")?;

    table
        .records()
        .map(|(row, record)| {
            let line_no = field(&record, "line_no");
            if line_no.is_empty() {
                return Err(AppError::BadRequest(format!("Row {}: line_no is empty", row)));
            }
            Ok(LineWorker {
                line_no: line_no.to_string(),
                real_worker_count: number(&record, "real_worker_count", row)?.unwrap_or(0),
                edited_worker_count: number(&record, "edited_worker_count", row)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        let row = parse_csv_row(r#"GPAR123,"Pocket, left","say ""hi""""#);
        assert_eq!(row, vec!["GPAR123", "Pocket, left", "say \"hi\""]);
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(Table::parse("\n\n").is_err());
    }
}
