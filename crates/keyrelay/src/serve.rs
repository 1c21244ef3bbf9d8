// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyrelay serve` command implementation.
//!
//! Wires the configured credential provider and secrets client into the
//! auth handler, builds the sink handles with their wrapping and
//! encryption settings, and runs both halves of the pipeline until a
//! shutdown signal arrives.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use keyrelay_auth::{
    output_channel, AuthHandler, AuthHandlerConfig, JwtFileProvider, RetryPolicy,
    WorkloadIdentityProvider,
};
use keyrelay_client::{ClientError, SecretsClient};
use keyrelay_config::{AuthMethodKind, KeyrelayConfig, SinkConfig};
use keyrelay_core::{CredentialProvider, ProviderError, SinkError};
use keyrelay_crypto::KeyPair;
use keyrelay_sink::{FileSink, SinkEncryption, SinkHandle, SinkServer};

use crate::shutdown;

/// Startup failed before the pipeline could run.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("secrets client: {0}")]
    Client(#[from] ClientError),

    #[error("credential provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("sink setup: {0}")]
    Sink(#[from] SinkError),

    #[error("peer public key {path}: {reason}")]
    PeerKey { path: PathBuf, reason: String },
}

/// Consumer-side key file: the reader's X25519 public key, base64-encoded.
#[derive(Deserialize)]
struct PeerKeyFile {
    curve25519_public_key: String,
}

/// Runs the `keyrelay serve` command.
///
/// Builds the client, provider, and sinks from config, installs the
/// signal handler, and drives the auth handler and sink server to
/// completion. Supports graceful shutdown via SIGINT/SIGTERM.
pub async fn run_serve(config: KeyrelayConfig) -> Result<(), ServeError> {
    init_tracing(&config.agent.log_level);

    info!(agent = config.agent.name.as_str(), "starting keyrelay serve");

    let client = Arc::new(SecretsClient::with_namespace(
        &config.service.address,
        Duration::from_secs(config.service.timeout_secs),
        config.service.namespace.as_deref(),
    )?);
    info!(address = config.service.address.as_str(), "secrets client ready");

    let provider = build_provider(&config)?;
    info!(provider = provider.name(), "credential provider ready");

    let sinks = build_sinks(&config.sinks)?;
    info!(sinks = sinks.len(), "sinks configured");

    let handler_config = AuthHandlerConfig {
        retry: RetryPolicy {
            initial_backoff: Duration::from_millis(config.auth.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.auth.retry.max_backoff_ms),
            max_retries: config.auth.retry.max_retries,
            renewal_shares_budget: config.auth.retry.renewal_shares_budget,
        },
        lease_fraction: config.auth.lease_fraction,
    };

    let cancel = shutdown::install_signal_handler();
    let (tx, rx) = output_channel();

    let handler = AuthHandler::new(client.clone(), provider, handler_config, tx);
    let server = SinkServer::new(client, sinks);

    let handler_task = tokio::spawn(handler.run(cancel.clone()));
    let server_task = tokio::spawn(server.run(cancel.clone(), rx));

    // The handler exits on cancellation and drops its sender; the server
    // then drains the channel and returns.
    let _ = handler_task.await;
    let _ = server_task.await;

    info!("keyrelay serve shutdown complete");
    Ok(())
}

/// Instantiate the configured credential provider.
fn build_provider(config: &KeyrelayConfig) -> Result<Arc<dyn CredentialProvider>, ServeError> {
    let auth = &config.auth;
    let provider: Arc<dyn CredentialProvider> = match auth.method {
        AuthMethodKind::WorkloadIdentity => Arc::new(WorkloadIdentityProvider::new(
            &auth.mount_path,
            &auth.role,
            auth.credentials_path.as_ref().map(PathBuf::from),
        )?),
        AuthMethodKind::JwtFile => {
            // Validation guarantees the path is present for this method.
            let path = auth.credentials_path.clone().ok_or_else(|| {
                ProviderError::Config("jwt_file method requires auth.credentials_path".into())
            })?;
            Arc::new(JwtFileProvider::new(
                &auth.mount_path,
                &auth.role,
                PathBuf::from(path),
                Duration::from_secs(auth.poll_interval_secs),
            )?)
        }
    };
    Ok(provider)
}

/// Build one [`SinkHandle`] per configured sink, loading peer keys and
/// generating a fresh keypair for each encrypted sink.
fn build_sinks(configs: &[SinkConfig]) -> Result<Vec<SinkHandle>, ServeError> {
    configs
        .iter()
        .map(|cfg| {
            let sink = Arc::new(FileSink::new(Path::new(&cfg.path), cfg.mode)?);

            let encryption = match &cfg.peer_public_key_path {
                Some(key_path) => {
                    let peer_public_key = load_peer_key(Path::new(key_path))?;
                    Some(SinkEncryption {
                        keypair: KeyPair::generate(),
                        peer_public_key,
                        aad: cfg.aad.clone(),
                    })
                }
                None => None,
            };

            Ok(SinkHandle {
                sink,
                wrap_ttl: cfg.wrap_ttl_secs.map(Duration::from_secs),
                encryption,
            })
        })
        .collect()
}

/// Read and decode the consumer's public key file.
fn load_peer_key(path: &Path) -> Result<Vec<u8>, ServeError> {
    let peer_key_err = |reason: String| ServeError::PeerKey {
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read(path).map_err(|e| peer_key_err(e.to_string()))?;
    let parsed: PeerKeyFile =
        serde_json::from_slice(&raw).map_err(|e| peer_key_err(e.to_string()))?;
    let key = BASE64
        .decode(parsed.curve25519_public_key.as_bytes())
        .map_err(|e| peer_key_err(format!("invalid base64: {e}")))?;

    if key.len() != 32 {
        return Err(peer_key_err(format!(
            "expected a 32-byte X25519 key, got {} bytes",
            key.len()
        )));
    }
    Ok(key)
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keyrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_peer_key(dir: &Path, key: &[u8]) -> PathBuf {
        let path = dir.join("peer.json");
        let body = serde_json::json!({ "curve25519_public_key": BASE64.encode(key) });
        std::fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();
        path
    }

    #[test]
    fn peer_key_file_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let reader = KeyPair::generate();
        let path = write_peer_key(dir.path(), &reader.public_bytes());

        let loaded = load_peer_key(&path).unwrap();
        assert_eq!(loaded, reader.public_bytes().to_vec());
    }

    #[test]
    fn short_peer_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_peer_key(dir.path(), &[0u8; 16]);

        let err = load_peer_key(&path).unwrap_err();
        assert!(matches!(err, ServeError::PeerKey { .. }));
    }

    #[test]
    fn missing_peer_key_file_is_rejected() {
        let err = load_peer_key(Path::new("/nonexistent/peer.json")).unwrap_err();
        assert!(matches!(err, ServeError::PeerKey { .. }));
    }

    #[test]
    fn sinks_build_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let reader = KeyPair::generate();
        let key_path = write_peer_key(dir.path(), &reader.public_bytes());

        let configs = vec![
            SinkConfig {
                path: dir.path().join("plain").display().to_string(),
                mode: 0o640,
                wrap_ttl_secs: None,
                peer_public_key_path: None,
                aad: String::new(),
            },
            SinkConfig {
                path: dir.path().join("sealed").display().to_string(),
                mode: 0o600,
                wrap_ttl_secs: Some(60),
                peer_public_key_path: Some(key_path.display().to_string()),
                aad: "sealed".into(),
            },
        ];

        let handles = build_sinks(&configs).unwrap();
        assert_eq!(handles.len(), 2);
        assert!(handles[0].encryption.is_none());
        assert!(handles[0].wrap_ttl.is_none());
        assert_eq!(handles[1].wrap_ttl, Some(Duration::from_secs(60)));
        let enc = handles[1].encryption.as_ref().unwrap();
        assert_eq!(enc.peer_public_key, reader.public_bytes().to_vec());
        assert_eq!(enc.aad, "sealed");
    }

    #[tokio::test]
    async fn provider_builds_for_jwt_file_method() {
        let dir = tempfile::tempdir().unwrap();
        let jwt = dir.path().join("jwt");
        std::fs::write(&jwt, "token").unwrap();

        let mut config = KeyrelayConfig::default();
        config.auth.method = AuthMethodKind::JwtFile;
        config.auth.role = "apps".into();
        config.auth.credentials_path = Some(jwt.display().to_string());

        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "jwt-file");
        provider.shutdown().await;
    }

    #[test]
    fn jwt_file_method_without_a_path_is_rejected() {
        let mut config = KeyrelayConfig::default();
        config.auth.method = AuthMethodKind::JwtFile;
        config.auth.role = "apps".into();

        let err = build_provider(&config).err().unwrap();
        assert!(matches!(err, ServeError::Provider(_)));
    }
}
