//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every handler and its gates
//! - Wire up middleware (tracing, request ID, timeout, body limit, CORS)
//! - Serve plain TCP or TLS with graceful shutdown
//! - Apply rate-limit policy updates from the config watcher
//!
//! # Gate order
//! `route_layer` wraps outermost-last, so layers are listed innermost first.
//! Catalog writes run token → role → rate limit → handler; account entry
//! points and public routes run the rate limit alone.

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::accounts::AccountService;
use crate::catalog::CatalogService;
use crate::config::AppConfig;
use crate::http::handlers::{accounts, public, system, taps};
use crate::http::request::{propagate_request_id, request_id, set_request_id};
use crate::media::ObjectStore;
use crate::observability::metrics::track_requests;
use crate::security::access_control::{require_admin, require_super_admin, require_token};
use crate::security::headers::{cors_layer, with_security_headers};
use crate::security::rate_limit::rate_limit_middleware;
use crate::security::{
    AuthState, PasswordError, PasswordHasher, RateLimitPolicy, RateLimiter, TokenService,
};
use crate::store::Store;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub limiter: Arc<RateLimiter>,
    pub auth: AuthState,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn Store>,
        media: Arc<dyn ObjectStore>,
    ) -> Result<Self, PasswordError> {
        let tokens = TokenService::new(&config.auth.token_secret, config.auth.token_ttl_secs);
        let hasher = PasswordHasher::new(
            config.auth.hash_memory_kib,
            config.auth.hash_iterations,
            config.auth.hash_parallelism,
        )?;
        let limiter = Arc::new(RateLimiter::new(
            store.clone(),
            RateLimitPolicy::from(&config.rate_limit),
        ));

        Ok(Self {
            accounts: AccountService::new(store.clone(), hasher, tokens.clone()),
            catalog: CatalogService::new(
                store.clone(),
                media,
                config.storage.folder.clone(),
                config.storage.max_image_bytes,
            ),
            limiter,
            auth: AuthState {
                tokens,
                store: store.clone(),
            },
            store,
        })
    }
}

/// HTTP server for the admin API.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        media: Arc<dyn ObjectStore>,
    ) -> Result<Self, PasswordError> {
        let state = AppState::new(&config, store, media)?;
        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            state,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let token = from_fn_with_state(state.auth.clone(), require_token);
        let admin = from_fn_with_state(state.auth.clone(), require_admin);
        let super_admin = from_fn_with_state(state.auth.clone(), require_super_admin);
        let rate_limit = from_fn_with_state(state.limiter.clone(), rate_limit_middleware);

        let entry = Router::new()
            .route("/register", post(accounts::register))
            .route("/login", post(accounts::login))
            .route_layer(rate_limit.clone());

        let users = Router::new()
            .route("/users", get(accounts::list_users))
            .route("/update-role", put(accounts::update_role))
            .route("/delete-user/{email}", delete(accounts::delete_user))
            .route("/rate-limits", get(system::rate_limits))
            .route("/rate-limits/{address}", delete(system::reset_rate_limit))
            .route_layer(super_admin)
            .route_layer(token.clone());

        let catalog = Router::new()
            .route(
                "/taps",
                get(taps::list).merge(post(taps::create).route_layer(rate_limit.clone())),
            )
            .route(
                "/taps/{id}",
                get(taps::get)
                    .delete(taps::delete)
                    .merge(put(taps::update).route_layer(rate_limit.clone())),
            )
            .route("/stats", get(taps::stats))
            .route_layer(admin)
            .route_layer(token.clone());

        let own_account = Router::new()
            .route("/change-password", put(accounts::change_password))
            .route_layer(token);

        let public_routes = Router::new()
            .route("/taps", get(public::list))
            .route("/taps/query", post(public::query))
            .route("/taps/{id}", get(public::get))
            .route_layer(rate_limit);

        let api = Router::new()
            .route("/health", get(system::health))
            .nest(
                "/api/admin",
                entry.merge(users).merge(catalog).merge(own_account),
            )
            .nest("/api/public", public_routes)
            .layer(middleware::from_fn(track_requests))
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .with_state(state);

        let api = if config.security.enable_headers {
            with_security_headers(api)
        } else {
            api
        };

        api.layer(cors_layer(&config.security.cors_origins))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = request_id(request).unwrap_or("-"),
                )
            }))
            .layer(set_request_id())
    }

    /// Shared state, for bootstrapping and tests.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloader = spawn_policy_reloader(self.state.limiter.clone(), config_updates);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: axum_server::tls_rustls::RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let reloader = spawn_policy_reloader(self.state.limiter.clone(), config_updates);
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let handle = axum_server::Handle::new();

        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            signal_handle.graceful_shutdown(Some(grace));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        reloader.abort();
        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Swap the rate-limit policy whenever a new config arrives.
fn spawn_policy_reloader(
    limiter: Arc<RateLimiter>,
    mut updates: mpsc::UnboundedReceiver<AppConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            limiter.update_policy(RateLimitPolicy::from(&config.rate_limit));
        }
    })
}
