//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::io;
use std::path::Path;

use crate::config::TlsConfig;

fn require_file(path: &Path, what: &str) -> io::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{what} not found: {}", path.display()),
        ))
    }
}

/// Load the PEM certificate chain and private key named in `[listener.tls]`.
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    let cert = Path::new(&tls.cert_path);
    let key = Path::new(&tls.key_path);
    require_file(cert, "Certificate file")?;
    require_file(key, "Private key file")?;

    tracing::debug!(cert = %cert.display(), key = %key.display(), "Loading TLS material");
    RustlsConfig::from_pem_file(cert, key).await
}
