use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::http::server::AppState;
use crate::security::AuthContext;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub email: Option<String>,
    pub new_role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(body) = body?;
    let account = state.accounts.register(body.email, body.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful, wait for admin approval",
            "userId": account.email,
            "role": account.role,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    let outcome = state.accounts.login(body.email, body.password).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": outcome.token,
        "role": outcome.role,
        "email": outcome.email,
        "expiresIn": outcome.expires_in,
    })))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let users = state.accounts.list_users().await?;
    Ok(Json(json!({
        "success": true,
        "count": users.len(),
        "users": users,
    })))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthContext>,
    body: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    let change = state
        .accounts
        .update_role(&actor, body.email, body.new_role)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "User role updated successfully",
        "user": {
            "email": change.email,
            "oldRole": change.old_role,
            "newRole": change.new_role,
            "updatedBy": change.updated_by,
        },
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthContext>,
    Path(email): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.accounts.delete_user(&actor, &email).await?;
    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
        "deletedEmail": email,
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthContext>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    state
        .accounts
        .change_password(&actor, body.current_password, body.new_password)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Password updated successfully",
    })))
}
