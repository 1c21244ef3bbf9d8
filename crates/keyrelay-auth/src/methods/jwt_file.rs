// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed-JWT-file credential provider with rotation detection.
//!
//! Reads a signed JWT from a configured path and polls the file on an
//! interval. When the content changes, the provider fires its push signal
//! so the auth handler re-authenticates immediately instead of waiting
//! for the lease checkpoint.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use keyrelay_core::types::Credential;
use keyrelay_core::{CredentialProvider, ProviderError};

pub struct JwtFileProvider {
    mount_path: String,
    role: String,
    path: PathBuf,
    signal_rx: watch::Receiver<u64>,
    poller: JoinHandle<()>,
}

impl JwtFileProvider {
    /// Spawn the rotation poller. Must be called from within a tokio
    /// runtime.
    pub fn new(
        mount_path: &str,
        role: &str,
        path: PathBuf,
        poll_interval: Duration,
    ) -> Result<Self, ProviderError> {
        if role.is_empty() {
            return Err(ProviderError::Config("role must not be empty".into()));
        }
        if mount_path.is_empty() {
            return Err(ProviderError::Config("mount path must not be empty".into()));
        }

        // Baseline on current content so only genuine rotations fire.
        let baseline = std::fs::read(&path).ok().map(|bytes| content_hash(&bytes));

        let (signal_tx, signal_rx) = watch::channel(0u64);
        let poller = tokio::spawn(poll_for_rotation(
            path.clone(),
            poll_interval,
            baseline,
            signal_tx,
        ));

        Ok(Self {
            mount_path: mount_path.trim_end_matches('/').to_string(),
            role: role.to_string(),
            path,
            signal_rx,
            poller,
        })
    }
}

#[async_trait]
impl CredentialProvider for JwtFileProvider {
    fn name(&self) -> &str {
        "jwt-file"
    }

    async fn credentials(&self) -> Result<Credential, ProviderError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ProviderError::Io {
                path: self.path.clone(),
                source,
            })?;

        let jwt = raw.trim();
        if jwt.is_empty() {
            return Err(ProviderError::Invalid(format!(
                "jwt file {} is empty",
                self.path.display()
            )));
        }

        Ok(Credential {
            path: format!("{}/login", self.mount_path),
            payload: serde_json::json!({
                "role": self.role,
                "jwt": jwt,
            }),
        })
    }

    fn signal(&self) -> Option<watch::Receiver<u64>> {
        Some(self.signal_rx.clone())
    }

    async fn shutdown(&self) {
        self.poller.abort();
        debug!("jwt file poller stopped");
    }
}

/// Poll `path` forever, bumping `signal_tx` whenever non-empty content
/// with a new hash appears. Exits when every receiver is gone.
async fn poll_for_rotation(
    path: PathBuf,
    interval: Duration,
    mut last_hash: Option<u64>,
    signal_tx: watch::Sender<u64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if signal_tx.is_closed() {
            return;
        }

        let Ok(bytes) = tokio::fs::read(&path).await else {
            trace!(path = %path.display(), "jwt file not readable yet");
            continue;
        };
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let hash = content_hash(&bytes);
        if last_hash != Some(hash) {
            last_hash = Some(hash);
            debug!(path = %path.display(), "jwt file rotated");
            signal_tx.send_modify(|v| *v = v.wrapping_add(1));
        }
    }
}

fn content_hash(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_jwt_and_builds_login_payload() {
        let dir = tempfile::tempdir().unwrap();
        let jwt_path = dir.path().join("jwt");
        std::fs::write(&jwt_path, "signed.jwt.value\n").unwrap();

        let provider =
            JwtFileProvider::new("auth/jwt", "test", jwt_path, Duration::from_secs(60)).unwrap();

        let cred = provider.credentials().await.unwrap();
        assert_eq!(cred.path, "auth/jwt/login");
        assert_eq!(cred.payload["jwt"], "signed.jwt.value");
        provider.shutdown().await;
    }

    #[tokio::test]
    async fn signal_fires_on_rotation_but_not_at_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let jwt_path = dir.path().join("jwt");
        std::fs::write(&jwt_path, "first-token").unwrap();

        let provider = JwtFileProvider::new(
            "auth/jwt",
            "test",
            jwt_path.clone(),
            Duration::from_millis(20),
        )
        .unwrap();
        let mut signal = provider.signal().unwrap();
        signal.mark_unchanged();

        // Unchanged content must not fire.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!signal.has_changed().unwrap());

        // Rotation must fire within a few poll intervals.
        std::fs::write(&jwt_path, "second-token").unwrap();
        tokio::time::timeout(Duration::from_secs(2), signal.changed())
            .await
            .expect("signal should fire after rotation")
            .unwrap();

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn signal_fires_when_the_file_first_appears() {
        let dir = tempfile::tempdir().unwrap();
        let jwt_path = dir.path().join("jwt");

        let provider = JwtFileProvider::new(
            "auth/jwt",
            "test",
            jwt_path.clone(),
            Duration::from_millis(20),
        )
        .unwrap();
        let mut signal = provider.signal().unwrap();
        signal.mark_unchanged();

        std::fs::write(&jwt_path, "late-token").unwrap();
        tokio::time::timeout(Duration::from_secs(2), signal.changed())
            .await
            .expect("signal should fire when the file appears")
            .unwrap();

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = JwtFileProvider::new(
            "auth/jwt",
            "test",
            dir.path().join("missing"),
            Duration::from_secs(60),
        )
        .unwrap();

        let err = provider.credentials().await.unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
        provider.shutdown().await;
    }
}
