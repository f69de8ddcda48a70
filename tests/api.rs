#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use roving_qc::app::{AppState, build_router};
use roving_qc::config::Config;
use roving_qc::store::{Database, Store};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_app(storage: &std::path::Path) -> Router {
    let config = Config {
        storage_dir: storage.to_path_buf(),
        ..Config::default()
    };
    build_router(AppState::new(Store::in_memory(Database::default()), config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &Router, emp_id: &str) -> String {
    let (status, _) = send(
        app,
        json_request(
            "POST",
            "/api/register",
            None,
            json!({
                "empId": emp_id,
                "engName": "Test Inspector",
                "password": "pw",
                "confirmPassword": "pw"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/login",
            None,
            json!({ "username": emp_id, "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["user"]["emp_id"], emp_id);
    body["accessToken"].as_str().unwrap().to_string()
}

fn roving_body(operator: &str) -> Value {
    json!({
        "inspection_date": "03/07/2025",
        "mo_no": "GPCO1200",
        "line_no": "7",
        "inspection_rep_item": {
            "inspection_rep_name": "First Inspection",
            "emp_id": "YM7001",
            "eng_name": "Test Inspector",
            "total_operators": 2,
            "inlineData": [{
                "operator_emp_id": operator,
                "spi": "Pass",
                "measurement": "Reject",
                "rejectGarments": [{ "garments": [] }]
            }]
        }
    })
}

#[tokio::test]
async fn health_is_public_and_data_is_not() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());

    let (status, body) = send(
        &app,
        Request::builder().uri("/api/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["status"], "ok");

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/sewing-defects")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap()["message"],
        "Authentication failed"
    );

    let (status, _) = send(&app, get("/api/sewing-defects", "bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_login_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/login",
            None,
            json!({ "username": "ghost", "password": "x" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn roving_save_report_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7001").await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/save-qc-inline-roving", Some(&token), roving_body("OP1")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let entry = &body["data"]["inspection_rep"][0]["inlineData"][0];
    assert_eq!(entry["overall_roving_status"], "Reject");
    assert_eq!(body["data"]["buyer_name"], "Costco");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/save-qc-inline-roving", Some(&token), roving_body("OP2")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/api/qc-inline-roving-reports?lineNo=7", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let reports: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["inspection_rep"][0]["Inspect_status"], "Completed");

    let (status, body) = send(&app, get("/api/qc-inline-roving/export.csv", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(body).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().nth(1).unwrap().ends_with(",Reject"));

    let (status, body) = send(
        &app,
        get(
            "/api/inspections-completed?line_no=7&inspection_date=03/07/2025&inspection_rep_name=First%20Inspection",
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap()["completeInspectOperators"],
        2
    );
}

#[tokio::test]
async fn classify_preview_does_not_save() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7002").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/qc-inline-roving/classify",
            Some(&token),
            json!({
                "mo_no": "GPAR0100",
                "entry": {
                    "spi": "Pass",
                    "measurement": "Pass",
                    "rejectGarments": [{ "garments": [
                        { "defects": [{ "name": "Needle hole", "count": 1 }] }
                    ]}]
                }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "Reject-Critical");
    assert_eq!(body["tier"], "red");
    assert_eq!(body["buyerName"], "Aritzia");
    assert_eq!(body["aqlLevel"], 1.5);

    let (_, body) = send(&app, get("/api/qc-inline-roving-reports", &token)).await;
    assert_eq!(serde_json::from_slice::<Vec<Value>>(&body).unwrap().len(), 0);
}

#[tokio::test]
async fn backup_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7003").await;
    send(
        &app,
        json_request("POST", "/api/save-qc-inline-roving", Some(&token), roving_body("OP1")),
    )
    .await;

    let (status, backup) = send(&app, get("/api/backup", &token)).await;
    assert_eq!(status, StatusCode::OK);

    // restore into a fresh server
    let other = test_app(dir.path());
    let other_token = login(&other, "YM7004").await;
    let (status, body) = send(&other, multipart_backup(&other_token, &backup)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["rovingRecords"], 1);

    let (_, body) = send(&other, get("/api/qc-inline-roving-mo-nos", &other_token)).await;
    assert_eq!(
        serde_json::from_slice::<Vec<String>>(&body).unwrap(),
        vec!["GPCO1200"]
    );
}

fn multipart_backup(token: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "qcboundary";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"backup\"; filename=\"qc.bin.gz\"\r\nContent-Type: application/gzip\r\n\r\n",
        b = boundary
    )
    .into_bytes();
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/restore")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn forged_backup_is_rejected_and_data_kept() {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7006").await;
    send(
        &app,
        json_request("POST", "/api/save-qc-inline-roving", Some(&token), roving_body("OP1")),
    )
    .await;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&1u64.to_le_bytes()).unwrap();
    encoder.write_all(&(1u64 << 40).to_le_bytes()).unwrap();
    let forged = encoder.finish().unwrap();

    let (status, _) = send(&app, multipart_backup(&token, &forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/api/qc-inline-roving-reports", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Vec<Value>>(&body).unwrap().len(), 1);
}

#[tokio::test]
async fn oversized_counts_do_not_break_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7007").await;

    let mut body = roving_body("OP1");
    body["inspection_rep_item"]["inlineData"][0]["rejectGarments"] = json!([{ "garments": [
        { "defects": [
            { "name": "Broken stitch", "count": 2147483648u64 },
            { "name": "Broken stitch", "count": 2147483648u64 }
        ]}
    ]}]);
    let (status, _) = send(
        &app,
        json_request("POST", "/api/save-qc-inline-roving", Some(&token), body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/save-qc-inline-roving", Some(&token), roving_body("OP1")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn password_reset_needs_the_owner_or_an_admin() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7008").await;
    login(&app, "YM7009").await;

    let reset = |emp_id: &str| json!({ "empId": emp_id, "newPassword": "changed" });
    let (status, _) = send(
        &app,
        json_request("POST", "/api/reset-password", None, reset("YM7009")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/reset-password", Some(&token), reset("YM7009")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/reset-password", Some(&token), reset("YM7008")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn buyer_lookup_reports_aql() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7010").await;

    let (status, body) = send(&app, get("/api/buyer-by-mo?moNo=PTCOM100", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["buyerName"], "MWW");
    assert_eq!(body["aqlLevel"], 2.5);
}

#[tokio::test]
async fn defect_catalog_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = login(&app, "YM7005").await;

    let new_defect = json!({
        "shortEng": "Stain",
        "english": "Oil stain",
        "khmer": "ប្រឡាក់",
        "repair": "Clean",
        "categoryEnglish": "Cleanliness",
        "type": "Appearance"
    });
    let (status, _) = send(
        &app,
        json_request("POST", "/api/sewing-defects", Some(&token), new_defect.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        json_request("POST", "/api/sewing-defects", Some(&token), new_defect),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request("DELETE", "/api/sewing-defects/abc", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        json_request("DELETE", "/api/sewing-defects/1001", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
