// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TLS certificate loading (spec.md §4.1, §6). The control plane is
//! WSS-only; `enableSsl=false` is rejected at startup rather than honored
//! (spec.md §9, resolving an Open Question).

use axum_server::tls_rustls::RustlsConfig;

use crate::config::ServerConfig;
use crate::error::TransportError;

/// Load the PEM certificate chain and private key named by `config`.
///
/// Requires both `certificatePath` and `certificateKeyPath` to be set;
/// `enableSsl=false` is refused outright since this deployment is WSS-only.
pub async fn load_rustls_config(config: &ServerConfig) -> Result<RustlsConfig, TransportError> {
    if !config.enable_ssl {
        return Err(TransportError::Tls("enableSsl=false is not supported; the control plane is WSS-only".to_owned()));
    }

    let cert_path = config
        .certificate_path
        .as_ref()
        .ok_or_else(|| TransportError::Tls("certificatePath is required".to_owned()))?;
    let key_path = config
        .certificate_key_path
        .as_ref()
        .ok_or_else(|| TransportError::Tls("certificateKeyPath is required".to_owned()))?;

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| TransportError::Tls(e.to_string()))
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tests;
