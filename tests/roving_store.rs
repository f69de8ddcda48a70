use roving_qc::error::AppError;
use roving_qc::inspection::{QualityStatus, RovingStatus};
use roving_qc::orders::{self, LineWorker};
use roving_qc::roving::{
    self, COMPLETED, NOT_COMPLETE, RovingFilter, SaveOutcome, SaveRequest,
};
use roving_qc::store::{Database, Store};
use serde_json::json;

fn entry(operator: &str, defects: serde_json::Value) -> serde_json::Value {
    json!({
        "operator_emp_id": operator,
        "operator_eng_name": format!("Operator {}", operator),
        "tg_no": "12",
        "operation_kh_name": "Attach collar",
        "type": "Normal",
        "spi": "Pass",
        "measurement": "Pass",
        "inspection_time": "09:15",
        "rejectGarments": [{ "totalCount": 0, "garments": [{ "defects": defects }] }]
    })
}

fn request(date: &str, rep: &str, qc: &str, total: u32, entry: serde_json::Value) -> SaveRequest {
    serde_json::from_value(json!({
        "inspection_date": date,
        "mo_no": "GPCO1200",
        "line_no": "7",
        "inspection_rep_item": {
            "inspection_rep_name": rep,
            "emp_id": qc,
            "eng_name": "QC Inspector",
            "total_operators": total,
            "inlineData": [entry]
        }
    }))
    .unwrap()
}

fn created(outcome: SaveOutcome) -> roving::RovingRecord {
    match outcome {
        SaveOutcome::Created(record) => record,
        SaveOutcome::Updated(_) => panic!("expected a new record"),
    }
}

#[test]
fn first_save_creates_classified_record() {
    let mut db = Database::default();
    let req = request(
        "03/07/2025",
        "First Inspection",
        "QC01",
        2,
        entry("OP1", json!([{ "name": "Skip stitch", "count": 1 }])),
    );
    let record = created(roving::save(&mut db, req).unwrap());

    assert_eq!(record.inline_roving_id, 1);
    assert_eq!(record.buyer_name, "Costco");
    assert_eq!(record.report_name, "Report for 03/07/2025 - 7 - GPCO1200");

    let rep = &record.inspection_rep[0];
    assert_eq!(rep.complete_inspect_operators, 1);
    assert_eq!(rep.inspect_status, NOT_COMPLETE);

    let saved = &rep.inline_data[0];
    // not in the catalog, "skip" reads as a major defect
    assert_eq!(saved.overall_roving_status, RovingStatus::RejectMajorSingle);
    assert_eq!(saved.quality_status, QualityStatus::Reject);
    assert_eq!(saved.checked_quantity, 5);
    assert_eq!(saved.defect_count(), 1);
    assert_eq!(saved.reject_garments[0].total_count, 1);
}

#[test]
fn clean_garments_are_dropped_and_pass() {
    let mut db = Database::default();
    let req = request("03/07/2025", "First Inspection", "QC01", 1, entry("OP1", json!([])));
    let record = created(roving::save(&mut db, req).unwrap());
    let saved = &record.inspection_rep[0].inline_data[0];

    assert_eq!(saved.overall_roving_status, RovingStatus::Pass);
    assert_eq!(saved.quality_status, QualityStatus::Pass);
    assert!(saved.reject_garments[0].garments.is_empty());
    assert_eq!(record.inspection_rep[0].inspect_status, COMPLETED);
}

#[test]
fn same_round_appends_operator() {
    let mut db = Database::default();
    roving::save(
        &mut db,
        request("03/07/2025", "First Inspection", "QC01", 2, entry("OP1", json!([]))),
    )
    .unwrap();
    let outcome = roving::save(
        &mut db,
        request("03/07/2025", "First Inspection", "QC01", 2, entry("OP2", json!([]))),
    )
    .unwrap();

    let SaveOutcome::Updated(record) = outcome else {
        panic!("expected an update");
    };
    assert_eq!(db.roving.len(), 1);
    let rep = &record.inspection_rep[0];
    assert_eq!(rep.inline_data.len(), 2);
    assert_eq!(rep.complete_inspect_operators, 2);
    assert_eq!(rep.inspect_status, COMPLETED);
}

#[test]
fn at_most_five_rounds() {
    let mut db = Database::default();
    for round in ["1st", "2nd", "3rd", "4th", "5th"] {
        roving::save(&mut db, request("03/07/2025", round, "QC01", 1, entry("OP1", json!([]))))
            .unwrap();
    }
    let err = roving::save(
        &mut db,
        request("03/07/2025", "6th", "QC01", 1, entry("OP1", json!([]))),
    )
    .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(db.roving[0].inspection_rep.len(), 5);
}

#[test]
fn missing_fields_are_rejected() {
    let mut db = Database::default();
    let mut req = request("03/07/2025", "1st", "QC01", 1, entry("OP1", json!([])));
    req.line_no.clear();
    assert!(matches!(roving::save(&mut db, req), Err(AppError::BadRequest(_))));

    let mut req = request("03/07/2025", "1st", "", 1, entry("OP1", json!([])));
    req.mo_no = "GPCO1200".to_string();
    assert!(matches!(roving::save(&mut db, req), Err(AppError::BadRequest(_))));
    assert!(db.roving.is_empty());
}

#[test]
fn rep_array_is_accepted() {
    let mut db = Database::default();
    let req: SaveRequest = serde_json::from_value(json!({
        "inspection_date": "03/07/2025",
        "mo_no": "GPAR0001",
        "line_no": "3",
        "inspection_rep": [{
            "inspection_rep_name": "1st",
            "emp_id": "QC09",
            "eng_name": "QC Nine",
            "inlineData": [entry("OP5", json!([]))]
        }]
    }))
    .unwrap();
    let record = created(roving::save(&mut db, req).unwrap());
    assert_eq!(record.buyer_name, "Aritzia");
}

#[test]
fn ordinal_follows_completed_rounds() {
    let mut db = Database::default();
    orders::replace_workers(
        &mut db,
        vec![
            LineWorker {
                line_no: "7".to_string(),
                real_worker_count: 2,
                edited_worker_count: None,
            },
            LineWorker {
                line_no: "8".to_string(),
                real_worker_count: 0,
                edited_worker_count: None,
            },
        ],
    );

    assert_eq!(roving::inspection_ordinal(&db, "7", "03/07/2025").unwrap(), "1st");
    assert_eq!(
        roving::inspection_ordinal(&db, "9", "03/07/2025").unwrap(),
        "N/A (Line not configured)"
    );
    assert_eq!(
        roving::inspection_ordinal(&db, "8", "03/07/2025").unwrap(),
        "N/A (Target 0 workers)"
    );
    assert!(roving::inspection_ordinal(&db, "7", "3/7/2025").is_err());

    for operator in ["OP1", "OP2"] {
        roving::save(&mut db, request("03/07/2025", "1st", "QC01", 2, entry(operator, json!([]))))
            .unwrap();
    }
    assert_eq!(roving::inspection_ordinal(&db, "7", "03/07/2025").unwrap(), "2nd");

    // one operator seen twice does not finish the second round
    roving::save(&mut db, request("03/07/2025", "2nd", "QC01", 2, entry("OP1", json!([])))).unwrap();
    assert_eq!(roving::inspection_ordinal(&db, "7", "03/07/2025").unwrap(), "2nd");

    orders::set_edited_count(&mut db, "7", Some(1)).unwrap();
    assert_eq!(roving::inspection_ordinal(&db, "7", "03/07/2025").unwrap(), "3rd");
}

#[test]
fn filters_compare_calendar_dates() {
    let mut db = Database::default();
    roving::save(&mut db, request("03/07/2025", "1st", "QC01", 1, entry("OP1", json!([])))).unwrap();
    roving::save(&mut db, request("03/15/2025", "1st", "QC02", 1, entry("OP2", json!([])))).unwrap();
    roving::save(&mut db, request("04/02/2025", "1st", "QC01", 1, entry("OP3", json!([])))).unwrap();

    let march = RovingFilter {
        start_date: Some("3/1/2025".to_string()),
        end_date: Some("2025-03-31".to_string()),
        ..RovingFilter::default()
    };
    assert_eq!(roving::filter_records(&db, &march).len(), 2);

    let by_qc = RovingFilter {
        qc_id: Some("QC01".to_string()),
        ..RovingFilter::default()
    };
    assert_eq!(roving::filter_records(&db, &by_qc).len(), 2);

    let by_operator = RovingFilter {
        operator_id: Some("OP2".to_string()),
        ..march
    };
    let found = roving::filter_records(&db, &by_operator);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].inspection_date, "03/15/2025");

    assert_eq!(roving::distinct_qc_ids(&db), vec!["QC01", "QC02"]);
    assert_eq!(roving::distinct_mo_nos(&db), vec!["GPCO1200"]);
}

#[test]
fn operator_summary_groups_rounds() {
    let mut db = Database::default();
    roving::save(&mut db, request("03/07/2025", "1st", "QC01", 1, entry("OP1", json!([])))).unwrap();
    roving::save(
        &mut db,
        request(
            "03/07/2025",
            "2nd",
            "QC01",
            1,
            entry("OP1", json!([{ "name": "Stain", "count": 2 }])),
        ),
    )
    .unwrap();

    let rows = roving::operator_summaries(&db.roving);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_checked, 10);
    assert_eq!(rows[0].total_defects, 2);
    assert_eq!(rows[0].inspections["1st"], RovingStatus::Pass);
    assert_eq!(rows[0].inspections["2nd"], RovingStatus::RejectMinorMultiple);
}

#[test]
fn store_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db").join("qc.bin.gz");

    {
        let store = Store::open(&path).unwrap();
        store
            .write(|db| {
                roving::save(db, request("03/07/2025", "1st", "QC01", 1, entry("OP1", json!([]))))
            })
            .unwrap();
    }
    assert!(path.exists());

    let store = Store::open(&path).unwrap();
    let records = store.read(|db| db.roving.clone()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].inspection_rep[0].inline_data[0].overall_roving_status,
        RovingStatus::Pass
    );

    // a failed write leaves the stored data alone
    let err = store.write(|db| {
        db.roving.clear();
        Err::<(), _>(AppError::bad_request("nope"))
    });
    assert!(err.is_err());
    assert_eq!(store.read(|db| db.roving.len()).unwrap(), 1);
    let reopened = Store::open(&path).unwrap();
    assert_eq!(reopened.read(|db| db.roving.len()).unwrap(), 1);
}

#[test]
fn unsaved_changes_are_not_applied() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"plain file").unwrap();
    let store = Store::open(blocker.join("qc.bin.gz")).unwrap();

    let result = store.write(|db| {
        roving::save(db, request("03/07/2025", "1st", "QC01", 1, entry("OP1", json!([]))))
    });
    assert!(matches!(result, Err(AppError::Storage(_))));
    assert_eq!(store.read(|db| db.roving.len()).unwrap(), 0);

    // the store keeps working after the failure
    assert_eq!(store.read(|db| db.users.len()).unwrap(), 0);
}

#[test]
fn oversized_defect_quantities_are_refused() {
    let mut db = Database::default();
    let huge = json!([
        { "name": "Broken stitch", "count": 2147483648u64 },
        { "name": "Broken stitch", "count": 2147483648u64 }
    ]);
    let err = roving::save(&mut db, request("03/07/2025", "1st", "QC01", 1, entry("OP1", huge)))
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(err.to_string().contains("Broken stitch"));
    assert!(db.roving.is_empty());

    let at_limit = json!([
        { "name": "Broken stitch", "count": roving::MAX_DEFECT_QTY },
        { "name": "Open seam", "count": roving::MAX_DEFECT_QTY }
    ]);
    let record = created(
        roving::save(&mut db, request("03/07/2025", "1st", "QC01", 1, entry("OP1", at_limit)))
            .unwrap(),
    );
    let saved = &record.inspection_rep[0].inline_data[0];
    assert_eq!(saved.overall_roving_status, RovingStatus::RejectMajorMultiple);
    assert_eq!(saved.defect_count(), 2 * roving::MAX_DEFECT_QTY);
}

#[test]
fn forged_backup_lengths_fail_to_decode() {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    // one user whose id claims to be a terabyte long
    let mut forged = Vec::new();
    forged.extend_from_slice(&1u64.to_le_bytes());
    forged.extend_from_slice(&(1u64 << 40).to_le_bytes());
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&forged).unwrap();
    let backup = encoder.finish().unwrap();

    assert!(roving_qc::saving::deserialize_from_memory(&backup).is_err());
    assert!(roving_qc::saving::deserialize_from_memory(b"not gzip at all").is_err());
}

#[test]
fn snapshot_restores_into_another_store() {
    let source = Store::in_memory(Database::default());
    source
        .write(|db| roving::save(db, request("03/07/2025", "1st", "QC01", 1, entry("OP1", json!([])))))
        .unwrap();
    let bytes = source.snapshot().unwrap();

    let target = Store::in_memory(Database::default());
    target
        .replace(roving_qc::saving::deserialize_from_memory(&bytes).unwrap())
        .unwrap();
    assert_eq!(target.read(|db| db.roving.len()).unwrap(), 1);
}
