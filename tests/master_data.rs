use roving_qc::loader::{Table, orders_from_csv, workers_from_csv};
use roving_qc::orders;
use roving_qc::store::Database;

const ORDERS_CSV: &str = "\u{feff}St_No,By_Style,Dept_Type,Tg_No,Tg_Code,Ma_Code,ch_name,kh_name\r
GPCO1200,STY-1,Sewing,10,TG10,MA1,上领,ដេរក\r
GPCO1200,STY-1,Sewing,11,TG11,MA2,\"Pocket, left\",ហោប៉ៅ\r
gpco1300,STY-2,Sewing,10,TG10,MA1,上领,ដេរក\r
\r
PTAR(77),STY-3,Sewing,,,,,\r
";

fn loaded() -> Database {
    let mut db = Database::default();
    let parsed = orders_from_csv(ORDERS_CSV).unwrap();
    assert_eq!(orders::replace_orders(&mut db, parsed), 3);
    db
}

#[test]
fn orders_are_grouped_per_mo() {
    let db = loaded();
    let order = orders::order_details(&db, "GPCO1200").unwrap();
    assert_eq!(order.by_style, "STY-1");
    assert_eq!(order.order_data.len(), 2);
    assert_eq!(order.order_data[1].ch_name, "Pocket, left");

    // rows without an operation still register the MO
    assert!(orders::order_details(&db, "PTAR(77)").unwrap().order_data.is_empty());
    assert!(orders::order_details(&db, "MISSING").is_err());
    assert!(orders::order_details(&db, "").is_err());
}

#[test]
fn mo_search_is_literal_and_case_insensitive() {
    let db = loaded();
    assert_eq!(orders::search_mo(&db, "gpco").unwrap(), vec!["GPCO1200", "gpco1300"]);
    assert_eq!(orders::search_mo(&db, "(77").unwrap(), vec!["PTAR(77)"]);
    assert!(orders::search_mo(&db, ".*").unwrap().is_empty());
    assert!(orders::search_mo(&db, "  ").is_err());
}

#[test]
fn worker_import_keeps_manual_overrides() {
    let mut db = Database::default();
    let first = workers_from_csv("line_no,real_worker_count\n10,30\n2,25\n").unwrap();
    orders::replace_workers(&mut db, first);
    let lines: Vec<&str> = db.line_workers.iter().map(|w| w.line_no.as_str()).collect();
    assert_eq!(lines, vec!["2", "10"]);

    orders::set_edited_count(&mut db, "10", Some(28)).unwrap();
    assert!(orders::set_edited_count(&mut db, "99", Some(1)).is_err());

    let second = workers_from_csv("line_no,real_worker_count\n10,32\n").unwrap();
    orders::replace_workers(&mut db, second);
    let line = orders::line_worker(&db, "10").unwrap();
    assert_eq!(line.real_worker_count, 32);
    assert_eq!(line.target_workers(), 28);
}

#[test]
fn bad_worker_rows_name_the_row() {
    let err = workers_from_csv("line_no,real_worker_count\n1,20\n2,many\n").unwrap_err();
    assert_eq!(err.to_string(), "Row 2: 'many' is not a valid real_worker_count value");

    assert!(workers_from_csv("line,count\n1,2\n").is_err());
}

#[cfg(feature = "web")]
fn workbook(rows: &[&[&str]]) -> Vec<u8> {
    use rust_xlsxwriter::Workbook;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            match value.parse::<f64>() {
                Ok(n) => sheet.write_number(r as u32, c as u16, n).unwrap(),
                Err(_) => sheet.write_string(r as u32, c as u16, *value).unwrap(),
            };
        }
    }
    workbook.save_to_buffer().unwrap()
}

#[cfg(feature = "web")]
#[test]
fn orders_load_from_excel() {
    let bytes = workbook(&[
        &["St_No", "By_Style", "Dept_Type", "Tg_No", "kh_name"],
        &["GPAR0100", "STY-9", "Sewing", "10", "ដេរក"],
        &["GPAR0100", "STY-9", "Sewing", "11", "ហោប៉ៅ"],
    ]);
    let parsed = roving_qc::loader::orders_from_xlsx(&bytes).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].order_data.len(), 2);
    // numeric cells read back without a trailing ".0"
    assert_eq!(parsed[0].order_data[0].tg_no, "10");
}

#[cfg(feature = "web")]
#[test]
fn uploads_are_sniffed_as_excel_or_csv() {
    let bytes = workbook(&[&["line_no", "real_worker_count"], &["3", "27"]]);
    let from_excel = roving_qc::loader::workers_from_table(&Table::from_upload(&bytes).unwrap()).unwrap();
    assert_eq!(from_excel[0].line_no, "3");
    assert_eq!(from_excel[0].real_worker_count, 27);
    assert_eq!(roving_qc::loader::workers_from_xlsx(&bytes).unwrap(), from_excel);

    let csv = b"line_no,real_worker_count\n3,27\n";
    let from_csv = roving_qc::loader::workers_from_table(&Table::from_upload(csv).unwrap()).unwrap();
    assert_eq!(from_csv, from_excel);

    assert!(Table::from_upload(b"PK\x03\x04 not a workbook").is_err());
    assert!(Table::from_upload(&[0xff, 0xfe, 0x00]).is_err());
}
