// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sink server: receives acquired tokens from the auth handler and
//! fans each one out to every configured sink concurrently.
//!
//! Per sink, the token may first be response-wrapped (replacing the raw
//! token with single-use [`WrapInfo`]) and then sealed into an encryption
//! envelope for the sink's peer key. A failure in one sink never blocks
//! delivery to the others, and the server pulls the next token only after
//! the current fan-out completes.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use keyrelay_core::{Secret, SecretsBackend, Sink, SinkError, WrapError};
use keyrelay_crypto::{Envelope, KeyExchangeError, KeyPair};

/// Why a single sink delivery failed. Logged and dropped; delivery to the
/// remaining sinks proceeds regardless.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("response wrapping failed: {0}")]
    Wrap(#[from] WrapError),

    #[error("envelope encryption failed: {0}")]
    KeyExchange(#[from] KeyExchangeError),

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink write failed: {0}")]
    Sink(#[from] SinkError),
}

/// Envelope-encryption settings for one sink.
pub struct SinkEncryption {
    /// This process's keypair for the sink. Generated fresh at startup;
    /// its public half rides along in every envelope.
    pub keypair: KeyPair,
    /// The reader's X25519 public key bytes.
    pub peer_public_key: Vec<u8>,
    /// Additional authenticated data binding envelopes to this sink.
    pub aad: String,
}

/// One destination plus its per-sink delivery transforms.
pub struct SinkHandle {
    pub sink: Arc<dyn Sink>,
    /// When set, deliver single-use wrap-token metadata instead of the raw
    /// token.
    pub wrap_ttl: Option<Duration>,
    pub encryption: Option<SinkEncryption>,
}

impl SinkHandle {
    pub fn plain(sink: Arc<dyn Sink>) -> Self {
        Self {
            sink,
            wrap_ttl: None,
            encryption: None,
        }
    }
}

/// Fans acquired tokens out to the configured sinks.
pub struct SinkServer {
    backend: Arc<dyn SecretsBackend>,
    sinks: Vec<SinkHandle>,
}

impl SinkServer {
    pub fn new(backend: Arc<dyn SecretsBackend>, sinks: Vec<SinkHandle>) -> Self {
        Self { backend, sinks }
    }

    /// Drive deliveries until the channel closes or `cancel` fires.
    ///
    /// The receive happens only after the previous fan-out finished, so
    /// together with the channel's single slot at most one undelivered
    /// token is ever in flight.
    pub async fn run(self, cancel: CancellationToken, mut rx: mpsc::Receiver<Secret>) {
        info!(sinks = self.sinks.len(), "sink server started");
        loop {
            let secret = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sink server stopping on shutdown signal");
                    break;
                }
                received = rx.recv() => match received {
                    Some(secret) => secret,
                    None => {
                        info!("token channel closed, sink server stopping");
                        break;
                    }
                },
            };

            self.deliver_all(&secret).await;
        }
    }

    /// Deliver one token to every sink concurrently, isolating failures.
    async fn deliver_all(&self, secret: &Secret) {
        let deliveries = self.sinks.iter().map(|handle| async move {
            match self.deliver_one(handle, secret).await {
                Ok(()) => {
                    debug!(sink = handle.sink.name(), "token delivered");
                }
                Err(err) => {
                    error!(sink = handle.sink.name(), error = %err, "sink delivery failed");
                }
            }
        });
        join_all(deliveries).await;
    }

    async fn deliver_one(
        &self,
        handle: &SinkHandle,
        secret: &Secret,
    ) -> Result<(), DeliveryError> {
        let payload = self.prepare_payload(handle, secret).await?;
        handle.sink.write(&payload).await?;
        Ok(())
    }

    /// Apply the sink's transforms: wrap first, then encrypt.
    async fn prepare_payload(
        &self,
        handle: &SinkHandle,
        secret: &Secret,
    ) -> Result<Vec<u8>, DeliveryError> {
        let plaintext = match handle.wrap_ttl {
            Some(ttl) => {
                let info = self
                    .backend
                    .wrap(serde_json::json!({ "token": secret.token }), ttl)
                    .await?;
                serde_json::to_vec(&info)?
            }
            None => secret.token.clone().into_bytes(),
        };

        match &handle.encryption {
            Some(enc) => {
                // Fresh derivation per delivery keeps the encryption path
                // uniform even if the peer key is swapped at runtime later.
                let shared = enc.keypair.derive_shared_key(&enc.peer_public_key)?;
                let envelope =
                    Envelope::seal(&enc.keypair, &shared, &plaintext, enc.aad.as_bytes())?;
                Ok(serde_json::to_vec(&envelope)?)
            }
            None => Ok(plaintext),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use keyrelay_core::WrapInfo;
    use keyrelay_test_utils::{FakeBackend, MemorySink};

    fn secret(token: &str) -> Secret {
        Secret {
            token: token.into(),
            accessor: None,
            lease_duration: Duration::from_secs(300),
            renewable: true,
            wrap_info: None,
        }
    }

    fn backend_with_token() -> Arc<FakeBackend> {
        let backend = Arc::new(FakeBackend::new(Duration::from_secs(300), true));
        backend.set_token("s.server".into());
        backend
    }

    #[tokio::test]
    async fn plain_sink_receives_the_raw_token() {
        let backend = backend_with_token();
        let sink = Arc::new(MemorySink::new("mem"));
        let server = SinkServer::new(backend, vec![SinkHandle::plain(sink.clone())]);

        server.deliver_all(&secret("s.raw-token")).await;
        assert_eq!(sink.payloads(), vec![b"s.raw-token".to_vec()]);
    }

    #[tokio::test]
    async fn wrapped_sink_receives_wrap_info_not_the_token() {
        let backend = backend_with_token();
        let sink = Arc::new(MemorySink::new("mem"));
        let server = SinkServer::new(
            backend.clone(),
            vec![SinkHandle {
                sink: sink.clone(),
                wrap_ttl: Some(Duration::from_secs(60)),
                encryption: None,
            }],
        );

        server.deliver_all(&secret("s.raw-token")).await;

        let payloads = sink.payloads();
        assert_eq!(payloads.len(), 1);
        let info: WrapInfo = serde_json::from_slice(&payloads[0]).unwrap();
        assert!(info.token.starts_with("w.fake-"));
        assert_eq!(info.ttl, Duration::from_secs(60));

        // The raw token appears nowhere in the delivered bytes.
        let text = String::from_utf8(payloads[0].clone()).unwrap();
        assert!(!text.contains("s.raw-token"));

        // The single-use token redeems to the original.
        let value = backend.unwrap(&info.token).await.unwrap();
        assert_eq!(value["token"], "s.raw-token");
    }

    #[tokio::test]
    async fn encrypted_sink_receives_an_envelope_only_the_peer_can_open() {
        let backend = backend_with_token();
        let sink = Arc::new(MemorySink::new("mem"));
        let reader = KeyPair::generate();

        let server = SinkServer::new(
            backend,
            vec![SinkHandle {
                sink: sink.clone(),
                wrap_ttl: None,
                encryption: Some(SinkEncryption {
                    keypair: KeyPair::generate(),
                    peer_public_key: reader.public_bytes().to_vec(),
                    aad: "sink-a".into(),
                }),
            }],
        );

        server.deliver_all(&secret("s.sealed-token")).await;

        let payloads = sink.payloads();
        let envelope: Envelope = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(envelope.open(&reader, b"sink-a").unwrap(), b"s.sealed-token");
        assert!(envelope.open(&reader, b"wrong-aad").is_err());
        assert!(envelope.open(&KeyPair::generate(), b"sink-a").is_err());
    }

    #[tokio::test]
    async fn one_failing_sink_does_not_block_the_others() {
        let backend = backend_with_token();
        let healthy = Arc::new(MemorySink::new("healthy"));
        let broken = Arc::new(MemorySink::new("broken"));
        broken.set_failing(true);

        let server = SinkServer::new(
            backend,
            vec![
                SinkHandle::plain(broken.clone()),
                SinkHandle::plain(healthy.clone()),
            ],
        );

        server.deliver_all(&secret("s.token")).await;
        assert_eq!(healthy.delivery_count(), 1);
        assert_eq!(broken.delivery_count(), 0);
    }

    #[tokio::test]
    async fn malformed_peer_key_fails_delivery_without_writing() {
        let backend = backend_with_token();
        let sink = Arc::new(MemorySink::new("mem"));

        let server = SinkServer::new(
            backend,
            vec![SinkHandle {
                sink: sink.clone(),
                wrap_ttl: None,
                encryption: Some(SinkEncryption {
                    keypair: KeyPair::generate(),
                    peer_public_key: vec![0u8; 16],
                    aad: String::new(),
                }),
            }],
        );

        server.deliver_all(&secret("s.token")).await;
        assert_eq!(sink.delivery_count(), 0);
    }

    #[tokio::test]
    async fn run_returns_when_the_channel_closes() {
        let backend = backend_with_token();
        let sink = Arc::new(MemorySink::new("mem"));
        let server = SinkServer::new(backend, vec![SinkHandle::plain(sink.clone())]);

        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.run(cancel, rx));

        tx.send(secret("s.one")).await.unwrap();
        drop(tx);

        task.await.unwrap();
        assert_eq!(sink.payloads(), vec![b"s.one".to_vec()]);
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let backend = backend_with_token();
        let server = SinkServer::new(backend, vec![]);

        let (_tx, rx) = mpsc::channel::<Secret>(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.run(cancel.clone(), rx));

        cancel.cancel();
        task.await.unwrap();
    }
}
