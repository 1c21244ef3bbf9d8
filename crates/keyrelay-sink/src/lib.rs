// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token delivery for the keyrelay agent.
//!
//! [`SinkServer`] consumes tokens emitted by the auth handler and fans
//! them out to every configured [`SinkHandle`], applying per-sink response
//! wrapping and envelope encryption. [`FileSink`] is the concrete on-disk
//! destination, writing atomically via rename.

pub mod file;
pub mod server;

pub use file::FileSink;
pub use server::{DeliveryError, SinkEncryption, SinkHandle, SinkServer};
