use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::TapFilter;
use crate::error::AppError;
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let taps = state.catalog.list_public(query.category.as_deref()).await?;
    Ok(Json(json!({
        "success": true,
        "count": taps.len(),
        "data": taps,
        "message": "Available taps retrieved successfully",
    })))
}

pub async fn query(
    State(state): State<AppState>,
    body: Result<Json<TapFilter>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(filter) = body?;
    let taps = state.catalog.query(&filter).await?;
    Ok(Json(json!({
        "success": true,
        "count": taps.len(),
        "data": taps,
        "message": "Matching taps retrieved successfully.",
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tap = state.catalog.get(&id).await?;
    Ok(Json(json!({
        "success": true,
        "data": tap,
        "message": "Tap retrieved successfully",
    })))
}
