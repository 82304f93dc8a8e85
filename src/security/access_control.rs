//! Authorization chain: bearer token, then role re-checked against the store.
//!
//! Gates are axum middleware and compose with `route_layer`. The token gate
//! attaches an [`AuthContext`]; the role gates require it and replace it with
//! one carrying the role read from the store.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::domain::Role;
use crate::error::{codes, AppError, RoleRequirement};
use crate::observability::metrics;
use crate::security::token::{TokenError, TokenService};
use crate::store::Store;

/// State shared by the auth gates.
#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenService,
    pub store: Arc<dyn Store>,
}

/// Identity attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub email: String,
    pub role: Role,
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn reject(gate: &'static str, error: AppError) -> Response {
    tracing::debug!(gate, code = error.code(), "Request rejected by auth gate");
    metrics::record_auth_rejection(gate, error.code());
    error.into_response()
}

pub async fn require_token(
    State(auth): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return reject(
            "token",
            AppError::unauthenticated(codes::AUTH_REQUIRED, "Access token required"),
        );
    };

    let claims = match auth.tokens.verify(token) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            return reject(
                "token",
                AppError::unauthenticated(codes::TOKEN_EXPIRED, "Token has expired"),
            );
        }
        Err(_) => {
            return reject(
                "token",
                AppError::unauthenticated(codes::INVALID_TOKEN, "Invalid token"),
            );
        }
    };

    request.extensions_mut().insert(AuthContext {
        email: claims.email,
        role: claims.role,
    });
    next.run(request).await
}

/// Re-read the account behind `ctx` and check its current role.
/// Store failures reject (fail closed).
pub async fn authorize_role(
    store: &dyn Store,
    ctx: &AuthContext,
    requirement: RoleRequirement,
) -> Result<AuthContext, AppError> {
    let account = store.get_account(&ctx.email).await.map_err(|e| {
        metrics::record_store_error("permission_check");
        AppError::internal_with_code(codes::PERMISSION_CHECK_FAILED, "Permission check failed", e)
    })?;

    let Some(account) = account else {
        return Err(AppError::unauthenticated(codes::USER_NOT_FOUND, "User not found"));
    };

    if !requirement.allows(account.role) {
        tracing::info!(
            email = %account.email,
            current_role = %account.role,
            required = %requirement,
            "Insufficient role"
        );
        return Err(AppError::Forbidden {
            current_role: account.role,
            required: requirement,
        });
    }

    Ok(AuthContext {
        email: account.email,
        role: account.role,
    })
}

async fn require_role(
    auth: &AuthState,
    requirement: RoleRequirement,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(ctx) = request.extensions().get::<AuthContext>().cloned() else {
        return reject(
            "role",
            AppError::unauthenticated(codes::AUTH_REQUIRED, "Authentication required"),
        );
    };

    match authorize_role(auth.store.as_ref(), &ctx, requirement).await {
        Ok(fresh) => {
            request.extensions_mut().insert(fresh);
            next.run(request).await
        }
        Err(e) => reject("role", e),
    }
}

pub async fn require_admin(State(auth): State<AuthState>, request: Request<Body>, next: Next) -> Response {
    require_role(&auth, RoleRequirement::AdminOrAbove, request, next).await
}

pub async fn require_super_admin(
    State(auth): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    require_role(&auth, RoleRequirement::SuperAdminOnly, request, next).await
}

/// Reject actions a caller aims at their own account.
pub fn ensure_not_self(actor: &AuthContext, target_email: &str, message: &str) -> Result<(), AppError> {
    if actor.email == target_email {
        tracing::warn!(email = %actor.email, "Self-targeted action rejected");
        return Err(AppError::SelfAction(message.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Account;
    use crate::store::MemoryStore;
    use axum::http::HeaderValue;

    fn ctx(email: &str, role: Role) -> AuthContext {
        AuthContext {
            email: email.to_string(),
            role,
        }
    }

    async fn store_with(email: &str, role: Role) -> MemoryStore {
        let store = MemoryStore::new();
        let mut account = Account::new(email, "hash");
        account.role = role;
        store.create_account(&account).await.unwrap();
        store
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[tokio::test]
    async fn test_role_is_read_from_store_not_token() {
        // Token says admin, store says user
        let store = store_with("a@x.com", Role::User).await;
        let err = authorize_role(&store, &ctx("a@x.com", Role::Admin), RoleRequirement::AdminOrAbove)
            .await
            .unwrap_err();
        match err {
            AppError::Forbidden { current_role, required } => {
                assert_eq!(current_role, Role::User);
                assert_eq!(required, RoleRequirement::AdminOrAbove);
            }
            other => panic!("unexpected {other:?}"),
        }

        // Token says user, store says admin: refreshed
        let store = store_with("b@x.com", Role::Admin).await;
        let fresh = authorize_role(&store, &ctx("b@x.com", Role::User), RoleRequirement::AdminOrAbove)
            .await
            .unwrap();
        assert_eq!(fresh.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_account_and_store_failure() {
        let store = MemoryStore::new();
        let err = authorize_role(&store, &ctx("gone@x.com", Role::Admin), RoleRequirement::AdminOrAbove)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::USER_NOT_FOUND);

        store.set_unavailable(true);
        let err = authorize_role(&store, &ctx("gone@x.com", Role::Admin), RoleRequirement::AdminOrAbove)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::PERMISSION_CHECK_FAILED);
    }

    #[tokio::test]
    async fn test_super_admin_only() {
        let store = store_with("a@x.com", Role::Admin).await;
        assert!(authorize_role(&store, &ctx("a@x.com", Role::Admin), RoleRequirement::SuperAdminOnly)
            .await
            .is_err());
    }

    #[test]
    fn test_self_action_guard() {
        let me = ctx("root@x.com", Role::SuperAdmin);
        let err = ensure_not_self(&me, "root@x.com", "Cannot delete your own account").unwrap_err();
        assert_eq!(err.code(), codes::SELF_ACTION);
        assert!(ensure_not_self(&me, "other@x.com", "x").is_ok());
    }
}
