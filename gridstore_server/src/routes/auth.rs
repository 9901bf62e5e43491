use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

use gridstore_core::auth::{
    hash_password, sign_token, validate_registration, verify_password, Claims,
};
use gridstore_core::errors::GridError;

use crate::error::ApiResult;
use crate::extract::AuthUser;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    confirm_password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    validate_registration(&body.name, &body.email, &body.password, &body.confirm_password)?;

    let hash = hash_password(&body.password);
    let user = state
        .store
        .create_user(body.name.trim(), body.email.trim(), &hash)
        .await?;

    info!("registered user {}", user.email);

    let token = sign_token(&Claims::for_user(&user), &state.token_secret)?;
    Ok(Json(json!({ "user": user, "token": token })))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let (user, stored_hash) = state
        .store
        .user_by_email(body.email.trim())
        .await?
        .ok_or(GridError::InvalidCredentials)?;

    if !verify_password(&body.password, &stored_hash) {
        return Err(GridError::InvalidCredentials.into());
    }

    state.store.set_user_status(&user.id, "active").await?;

    let token = sign_token(&Claims::for_user(&user), &state.token_secret)?;
    Ok(Json(json!({ "user": user, "token": token })))
}

async fn logout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<Value>> {
    state.store.set_user_status(&claims.id, "inactive").await?;
    Ok(Json(json!({ "success": true })))
}

async fn me(AuthUser(claims): AuthUser) -> Json<Value> {
    Json(json!({ "user": claims.user() }))
}
