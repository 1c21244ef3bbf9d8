// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink trait: the delivery-side boundary of the pipeline.

use async_trait::async_trait;

use crate::error::SinkError;

/// A delivery target for one serialized token payload.
///
/// The sink server calls [`write`](Sink::write) once per authentication
/// cycle with the fully prepared payload (already wrapped and/or encrypted
/// if the sink is configured for it). Sinks must make the payload visible
/// atomically: a concurrent reader never observes a partial write.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Human-readable sink name, used in logs.
    fn name(&self) -> &str;

    /// Deliver one payload. Failures are reported but not retried; the
    /// next authentication cycle produces a fresh payload.
    async fn write(&self, payload: &[u8]) -> Result<(), SinkError>;
}
