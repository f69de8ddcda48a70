use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::graph::{self, GraphOptions};
use crate::loader::Table;
use crate::roving::{RovingFilter, filter_records};
use crate::store::Store;
use crate::{
    defects, downloader, images, loader, login, orders, pairing, roles, roving, saving, users,
};

/// Largest accepted request body, which bounds image and backup uploads
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub store: Store,
    pub config: Config,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Store, config: Config) -> SharedState {
        Arc::new(AppState { store, config })
    }
}

/// Build the complete HTTP API
///
/// Login, registration, token refresh and the static buyer list are public.
/// Every other route sits behind [`login::require_auth`].
pub fn build_router(state: SharedState) -> Router {
    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/login", post(login::handle_login))
        .route("/api/register", post(login::handle_register))
        .route("/api/refresh-token", post(login::handle_refresh))
        .route("/api/buyers", get(defects::handle_buyers));

    let protected = Router::new()
        // session
        .route("/api/logout", post(login::handle_logout))
        .route("/api/reset-password", post(login::handle_reset_password))
        .route("/api/user-profile", get(login::handle_profile))
        .route("/api/menu", get(roles::handle_menu))
        // users and roles
        .route("/api/users", get(users::handle_list).post(users::handle_upsert))
        .route("/api/search-users", get(users::handle_search))
        .route("/api/user-details", get(users::handle_details))
        .route("/api/job-titles", get(users::handle_job_titles))
        .route("/api/users-by-job-title", get(users::handle_by_job_title))
        .route(
            "/api/role-management",
            get(roles::handle_list_roles).post(roles::handle_save_role),
        )
        .route("/api/user-roles/:emp_id", get(roles::handle_user_roles))
        .route(
            "/api/role-management/super-admin",
            post(roles::handle_add_super_admin),
        )
        .route(
            "/api/role-management/super-admin/:emp_id",
            delete(roles::handle_remove_super_admin),
        )
        // defect catalog
        .route(
            "/api/sewing-defects",
            get(defects::handle_list).post(defects::handle_add),
        )
        .route("/api/sewing-defects/options", get(defects::handle_options))
        .route(
            "/api/sewing-defects/buyer-statuses",
            post(defects::handle_buyer_statuses),
        )
        .route("/api/sewing-defects/:code", delete(defects::handle_delete))
        // order master data
        .route("/api/inline-orders-mo-numbers", get(orders::handle_search_mo))
        .route("/api/inline-orders-details", get(orders::handle_order_details))
        .route("/api/line-workers", get(orders::handle_line_workers))
        .route("/api/line-workers/:line_no", put(orders::handle_set_worker_count))
        .route("/api/upload/inline-orders", post(upload_inline_orders))
        .route("/api/upload/line-workers", post(upload_line_workers))
        // roving inspections
        .route("/api/save-qc-inline-roving", post(roving::handle_save))
        .route("/api/qc-inline-roving/classify", post(roving::handle_classify))
        .route("/api/qc-inline-roving-reports", get(roving::handle_reports))
        .route("/api/qc-inline-roving-reports-filtered", get(roving::handle_reports))
        .route(
            "/api/qc-inline-roving/operator-summary",
            get(roving::handle_operator_summary),
        )
        .route("/api/qc-inline-roving-mo-nos", get(roving::handle_mo_nos))
        .route("/api/qc-inline-roving-buyers", get(roving::handle_buyers))
        .route("/api/qc-inline-roving-operations", get(roving::handle_operations))
        .route("/api/qc-inline-roving-qc-ids", get(roving::handle_qc_ids))
        .route(
            "/api/qc-inline-roving/inspection-time-info",
            get(roving::handle_inspection_ordinal),
        )
        .route("/api/inspections-completed", get(roving::handle_completed_operators))
        .route("/api/buyer-by-mo", get(roving::handle_buyer_status))
        .route("/api/upload-roving-image", post(upload_roving_image))
        .route("/api/qc-inline-roving/export.csv", get(export_csv))
        .route("/api/qc-inline-roving/export.xlsx", get(export_xlsx))
        .route("/api/qc-inline-roving/status-chart.png", get(status_chart))
        .route("/api/qc-inline-roving/reject-trend.png", get(reject_trend))
        // roving pairing
        .route("/api/save-qc-roving-pairing", post(pairing::handle_save))
        .route("/api/roving-pairing/evaluate", post(pairing::handle_evaluate))
        .route("/api/roving-pairing/filters", get(pairing::handle_filter_options))
        .route("/api/roving-pairing/report-data", get(pairing::handle_report))
        // maintenance
        .route("/api/backup", get(export_backup))
        .route("/api/restore", post(restore_backup))
        .route_layer(middleware::from_fn(login::require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .nest_service("/storage", ServeDir::new(&state.config.storage_dir))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(log_requests))
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

/// Open the database and serve the API until the process is stopped
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(config.data_file())?;
    let bind_addr = config.bind_addr.clone();
    let app = build_router(AppState::new(store, config));

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("QC backend listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        Body::from(Bytes::from(body)),
    )
        .into_response()
}

fn png(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], Body::from(body)).into_response()
}

// Read every multipart field into memory, keyed by field name
async fn collect_fields(mut multipart: Multipart) -> AppResult<HashMap<String, Vec<u8>>> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
        fields.insert(name, data.to_vec());
    }
    Ok(fields)
}

fn text_field(fields: &HashMap<String, Vec<u8>>, name: &str) -> String {
    fields
        .get(name)
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .unwrap_or_default()
}

/// The uploaded master list in the `file` field, CSV or `.xlsx`
fn table_upload(fields: &HashMap<String, Vec<u8>>) -> AppResult<Table> {
    let bytes = fields
        .get("file")
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::bad_request("No file uploaded"))?;
    Table::from_upload(bytes)
}

async fn upload_roving_image(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let fields = collect_fields(multipart).await?;
    let bytes = fields
        .get("imageFile")
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::bad_request("No image file provided"))?;

    let hint: Vec<String> = ["imageType", "date", "lineNo", "moNo", "operatorId"]
        .iter()
        .map(|name| text_field(&fields, name))
        .filter(|value| !value.is_empty())
        .collect();
    let hint = if hint.is_empty() {
        "roving".to_string()
    } else {
        hint.join("-")
    };

    let path = images::store_inspection_image(
        bytes,
        &hint,
        &state.config.storage_dir,
        state.config.max_image_width,
    )?;
    Ok(Json(serde_json::json!({
        "message": "Image uploaded successfully",
        "imagePath": path,
    })))
}

async fn upload_inline_orders(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let fields = collect_fields(multipart).await?;
    let parsed = loader::orders_from_table(&table_upload(&fields)?)?;
    let count = state
        .store
        .write(|db| Ok(orders::replace_orders(db, parsed)))?;
    info!("imported {} inline orders", count);
    Ok(Json(serde_json::json!({
        "message": format!("{} inline orders imported", count),
        "count": count,
    })))
}

async fn upload_line_workers(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let fields = collect_fields(multipart).await?;
    let parsed = loader::workers_from_table(&table_upload(&fields)?)?;
    let count = state
        .store
        .write(|db| Ok(orders::replace_workers(db, parsed)))?;
    info!("imported head counts for {} lines", count);
    Ok(Json(serde_json::json!({
        "message": format!("{} lines imported", count),
        "count": count,
    })))
}

async fn export_csv(
    State(state): State<SharedState>,
    Query(filter): Query<RovingFilter>,
) -> Result<Response, AppError> {
    let records = state.store.read(|db| filter_records(db, &filter))?;
    let csv = downloader::roving_to_csv(&records);
    Ok(attachment("text/csv; charset=utf-8", "qc_inline_roving.csv", csv.into_bytes()))
}

async fn export_xlsx(
    State(state): State<SharedState>,
    Query(filter): Query<RovingFilter>,
) -> Result<Response, AppError> {
    let records = state.store.read(|db| filter_records(db, &filter))?;
    let workbook = downloader::roving_to_xlsx(&records)?;
    Ok(attachment(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "qc_inline_roving.xlsx",
        workbook,
    ))
}

async fn status_chart(
    State(state): State<SharedState>,
    Query(filter): Query<RovingFilter>,
) -> Result<Response, AppError> {
    let records = state.store.read(|db| filter_records(db, &filter))?;
    Ok(png(graph::status_chart(&records, &GraphOptions::default())?))
}

async fn reject_trend(
    State(state): State<SharedState>,
    Query(filter): Query<RovingFilter>,
) -> Result<Response, AppError> {
    let records = state.store.read(|db| filter_records(db, &filter))?;
    let options = GraphOptions {
        title: "Daily Reject Rate".to_string(),
        x_label: "Date".to_string(),
        y_label: "Reject %".to_string(),
        ..GraphOptions::default()
    };
    Ok(png(graph::reject_trend_chart(&records, &options)?))
}

async fn export_backup(State(state): State<SharedState>) -> Result<Response, AppError> {
    let snapshot = state.store.snapshot()?;
    let file_name = format!("qc-backup-{}.bin.gz", chrono::Local::now().format("%Y%m%d-%H%M%S"));
    Ok(attachment("application/gzip", &file_name, snapshot))
}

async fn restore_backup(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let fields = collect_fields(multipart).await?;
    let bytes = fields
        .get("backup")
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::bad_request("No backup file received"))?;

    let db = saving::deserialize_from_memory(bytes)
        .map_err(|e| AppError::BadRequest(format!("Failed to load backup: {}", e)))?;
    let summary = serde_json::json!({
        "message": "Backup restored",
        "rovingRecords": db.roving.len(),
        "pairingRecords": db.pairing.len(),
        "users": db.users.len(),
    });
    state.store.replace(db)?;
    info!("database restored from uploaded backup");

    Ok((StatusCode::OK, Json(summary)))
}
