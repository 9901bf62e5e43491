use axum::extract::{Multipart, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

use gridstore_core::errors::GridError;
use gridstore_core::models::Grid;

use crate::error::ApiResult;
use crate::extract::AuthUser;
use crate::routes::form::UploadForm;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/create", post(create))
        .route("/{id}", get(get_grid).put(rename).delete(delete_grid))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<Vec<Grid>>> {
    let grids = state.store.list_grids(&claims.id).await?;
    Ok(Json(grids))
}

/// `POST /api/grids/create` — multipart CSV into a new named grid, or a
/// transactional replacement of an existing one when `gridId` and
/// `isReplacement` are set.
async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = UploadForm::read(&mut multipart).await?;

    let name = form
        .text("name")
        .ok_or_else(|| GridError::validation("Grid name is required"))?
        .to_string();
    let existing_grid_id = form.text("gridId").map(str::to_string);
    let is_replacement = form
        .text("isReplacement")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let parsed = form.parse_csv().await?;

    let (grid_id, records_inserted) = state
        .store
        .create_grid(
            &claims.id,
            &name,
            existing_grid_id,
            is_replacement,
            parsed.column_order,
            parsed.rows,
        )
        .await?;

    info!(
        "user {} {} grid {} with {} records",
        claims.id,
        if is_replacement { "replaced" } else { "created" },
        grid_id,
        records_inserted
    );

    Ok(Json(json!({
        "gridId": grid_id,
        "recordsInserted": records_inserted,
        "validationErrors": parsed.validation_errors,
    })))
}

async fn get_grid(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Grid>> {
    let grid = state.store.get_grid(&claims.id, &id).await?;
    Ok(Json(grid))
}

#[derive(Deserialize)]
struct RenameRequest {
    name: String,
}

async fn rename(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> ApiResult<Json<Value>> {
    state.store.rename_grid(&claims.id, &id, &body.name).await?;
    Ok(Json(json!({ "success": true })))
}

async fn delete_grid(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.store.delete_grid(&claims.id, &id).await?;
    Ok(Json(json!({ "success": true })))
}
