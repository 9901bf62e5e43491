use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde_json::{json, Value};

use gridstore_core::models::{Page, Record, UploadReport};
use gridstore_core::query::parse_list_request;

use crate::error::ApiResult;
use crate::extract::AuthUser;
use crate::routes::form::UploadForm;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/upload", post(upload))
        .route("/{id}", get(get_record).delete(delete_record))
}

/// `GET /api/data` — paginated listing. Every query key that is not a
/// reserved paging/sort/search parameter is treated as a `field_operator`
/// filter, so the raw pairs go straight to the request parser.
async fn list(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Page<Record>>> {
    let request = parse_list_request(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let page = state.store.list_records(&claims.id, request).await?;
    Ok(Json(page))
}

async fn get_record(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Record>> {
    let record = state.store.get_record(&claims.id, &id).await?;
    Ok(Json(record))
}

async fn delete_record(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.store.delete_record(&claims.id, &id).await?;
    Ok(Json(json!({ "success": true })))
}

/// `POST /api/data/upload` — multipart CSV import into an optional existing
/// grid. Blank rows are reported, per-row failures are skipped, neither
/// aborts the batch.
async fn upload(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadReport>> {
    let form = UploadForm::read(&mut multipart).await?;
    let grid_id = form.text("gridId").map(str::to_string);

    let parsed = form.parse_csv().await?;
    let total_records = parsed.rows.len();

    let (inserted_count, skipped_count) = state
        .store
        .bulk_insert(&claims.id, grid_id, parsed.rows)
        .await?;

    info!(
        "user {} uploaded {} records ({} inserted, {} skipped)",
        claims.id, total_records, inserted_count, skipped_count
    );

    Ok(Json(UploadReport {
        total_records,
        inserted_count,
        skipped_count,
        validation_errors: parsed.validation_errors,
    }))
}
