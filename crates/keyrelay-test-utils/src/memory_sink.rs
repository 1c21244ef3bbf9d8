// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory sink recording every delivered payload.

use std::sync::Mutex;

use async_trait::async_trait;

use keyrelay_core::{Sink, SinkError};

/// A sink that captures payloads for assertions, optionally failing every
/// write to exercise failure isolation in the fan-out.
pub struct MemorySink {
    name: String,
    failing: Mutex<bool>,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failing: Mutex::new(false),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Toggle write failure.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Every payload delivered so far, in order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }

    /// Number of successful deliveries.
    pub fn delivery_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, payload: &[u8]) -> Result<(), SinkError> {
        if *self.failing.lock().unwrap() {
            return Err(SinkError::Io {
                path: format!("memory://{}", self.name).into(),
                source: std::io::Error::other("scripted failure"),
            });
        }
        self.payloads.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}
