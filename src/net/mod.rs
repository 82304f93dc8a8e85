//! Network layer.
//!
//! The listener is a plain `tokio::net::TcpListener` handed to axum, or an
//! `axum-server` TLS acceptor when `[listener.tls]` is configured. This
//! module only loads the TLS material.

pub mod tls;

pub use tls::load_tls_config;
