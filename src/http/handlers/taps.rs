use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::read_tap_form;
use crate::error::AppError;
use crate::http::server::AppState;
use crate::security::AuthContext;

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let taps = state.catalog.list().await?;
    Ok(Json(json!({
        "success": true,
        "total": taps.len(),
        "taps": taps,
        "timestamp": Utc::now(),
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tap = state.catalog.get(&id).await?;
    Ok(Json(json!({ "success": true, "tap": tap })))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (fields, image) = read_tap_form(multipart).await?;
    let tap = state.catalog.create(&actor.email, &fields, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "tapId": tap.id,
            "message": "Tap created successfully",
            "tap": tap,
        })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthContext>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let (fields, image) = read_tap_form(multipart).await?;
    let tap = state.catalog.update(&actor.email, &id, &fields, image).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Tap updated successfully",
        "tap": tap,
    })))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.catalog.delete(&actor.email, &id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Tap deleted successfully",
        "deletedId": id,
    })))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.catalog.stats().await?;
    Ok(Json(json!({
        "success": true,
        "stats": stats,
        "timestamp": Utc::now(),
    })))
}
