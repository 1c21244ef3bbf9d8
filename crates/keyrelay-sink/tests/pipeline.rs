// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline tests: credential provider through auth handler to
//! encrypted, wrapped file delivery, exercised against the in-memory fake
//! backend with real time and real filesystem sinks.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use keyrelay_auth::{output_channel, AuthHandler, AuthHandlerConfig, JwtFileProvider, RetryPolicy};
use keyrelay_core::{Secret, SecretsBackend, WrapError, WrapInfo};
use keyrelay_crypto::{Envelope, KeyPair};
use keyrelay_sink::{FileSink, SinkEncryption, SinkHandle, SinkServer};
use keyrelay_test_utils::{FakeBackend, MemorySink};

fn fast_config() -> AuthHandlerConfig {
    AuthHandlerConfig {
        retry: RetryPolicy {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            max_retries: 4,
            renewal_shares_budget: false,
        },
        lease_fraction: 0.5,
    }
}

/// Poll until `path` exists with non-empty content, or panic after 5s.
async fn wait_for_file(path: &Path) -> Vec<u8> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(bytes) = std::fs::read(path) {
            if !bytes.is_empty() {
                return bytes;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Poll until the file content differs from `previous`, or panic after 5s.
async fn wait_for_change(path: &Path, previous: &[u8]) -> Vec<u8> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(bytes) = std::fs::read(path) {
            if !bytes.is_empty() && bytes != previous {
                return bytes;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} to change",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn jwt_login_to_encrypted_wrapped_file_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let jwt_path = dir.path().join("jwt");
    std::fs::write(&jwt_path, "signed.jwt.one").unwrap();

    let backend = Arc::new(FakeBackend::new(Duration::from_secs(300), true));
    let provider = Arc::new(
        JwtFileProvider::new("auth/jwt", "apps", jwt_path.clone(), Duration::from_millis(25))
            .unwrap(),
    );

    // One encrypted+wrapped sink and one plain sink, fed from the same
    // handler.
    let reader = KeyPair::generate();
    let sealed_path = dir.path().join("sealed");
    let plain_path = dir.path().join("plain");
    let sinks = vec![
        SinkHandle {
            sink: Arc::new(FileSink::new(&sealed_path, 0o600).unwrap()),
            wrap_ttl: Some(Duration::from_secs(60)),
            encryption: Some(SinkEncryption {
                keypair: KeyPair::generate(),
                peer_public_key: reader.public_bytes().to_vec(),
                aad: "sealed-sink".into(),
            }),
        },
        SinkHandle::plain(Arc::new(FileSink::new(&plain_path, 0o600).unwrap())),
    ];

    let (tx, rx) = output_channel();
    let cancel = CancellationToken::new();
    let handler = AuthHandler::new(backend.clone(), provider, fast_config(), tx);
    let server = SinkServer::new(backend.clone(), sinks);

    let handler_task = tokio::spawn(handler.run(cancel.clone()));
    let server_task = tokio::spawn(server.run(cancel.clone(), rx));

    // The plain sink sees the raw token.
    let plain = wait_for_file(&plain_path).await;
    assert_eq!(plain, b"s.fake-1");

    // The sealed sink sees an envelope that only the reader key opens,
    // containing wrap metadata rather than the token itself.
    let sealed = wait_for_file(&sealed_path).await;
    let envelope: Envelope = serde_json::from_slice(&sealed).unwrap();
    assert!(envelope.open(&KeyPair::generate(), b"sealed-sink").is_err());

    let inner = envelope.open(&reader, b"sealed-sink").unwrap();
    let info: WrapInfo = serde_json::from_slice(&inner).unwrap();
    assert!(info.token.starts_with("w.fake-"));
    assert_eq!(info.creation_path, "sys/wrapping/wrap");

    // The wrap token redeems the real token exactly once.
    let value = backend.unwrap(&info.token).await.unwrap();
    assert_eq!(value["token"], "s.fake-1");
    let err = backend.unwrap(&info.token).await.unwrap_err();
    assert!(matches!(err, WrapError::AlreadyUnwrapped));

    cancel.cancel();
    handler_task.await.unwrap();
    server_task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn jwt_rotation_delivers_a_fresh_token() {
    let dir = tempfile::tempdir().unwrap();
    let jwt_path = dir.path().join("jwt");
    std::fs::write(&jwt_path, "signed.jwt.one").unwrap();

    let backend = Arc::new(FakeBackend::new(Duration::from_secs(3600), true));
    let provider = Arc::new(
        JwtFileProvider::new("auth/jwt", "apps", jwt_path.clone(), Duration::from_millis(25))
            .unwrap(),
    );

    let token_path = dir.path().join("token");
    let sinks = vec![SinkHandle::plain(Arc::new(
        FileSink::new(&token_path, 0o600).unwrap(),
    ))];

    let (tx, rx) = output_channel();
    let cancel = CancellationToken::new();
    let handler = AuthHandler::new(backend.clone(), provider, fast_config(), tx);
    let server = SinkServer::new(backend.clone(), sinks);

    let handler_task = tokio::spawn(handler.run(cancel.clone()));
    let server_task = tokio::spawn(server.run(cancel.clone(), rx));

    let first = wait_for_file(&token_path).await;
    assert_eq!(first, b"s.fake-1");

    // Rotating the credential file forces a fresh login long before the
    // hour-long lease would.
    std::fs::write(&jwt_path, "signed.jwt.two").unwrap();
    let second = wait_for_change(&token_path, &first).await;
    assert_eq!(second, b"s.fake-2");
    assert_eq!(backend.installed_token().as_deref(), Some("s.fake-2"));

    cancel.cancel();
    handler_task.await.unwrap();
    server_task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn fan_out_keeps_healthy_sinks_flowing_past_a_broken_one() {
    let backend = Arc::new(FakeBackend::new(Duration::from_secs(300), true));
    backend.set_token("s.preauth".into());

    let broken = Arc::new(MemorySink::new("broken"));
    broken.set_failing(true);
    let healthy = Arc::new(MemorySink::new("healthy"));

    let sinks = vec![
        SinkHandle::plain(broken.clone()),
        SinkHandle::plain(healthy.clone()),
    ];
    let server = SinkServer::new(backend, sinks);

    let (tx, rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let server_task = tokio::spawn(server.run(cancel, rx));

    for n in 1..=3u32 {
        tx.send(Secret {
            token: format!("s.batch-{n}"),
            accessor: None,
            lease_duration: Duration::from_secs(300),
            renewable: true,
            wrap_info: None,
        })
        .await
        .unwrap();
    }
    drop(tx);
    server_task.await.unwrap();

    assert_eq!(broken.delivery_count(), 0);
    assert_eq!(
        healthy.payloads(),
        vec![
            b"s.batch-1".to_vec(),
            b"s.batch-2".to_vec(),
            b"s.batch-3".to_vec()
        ]
    );
}
