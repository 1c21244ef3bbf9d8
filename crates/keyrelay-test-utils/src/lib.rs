// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test fakes for the keyrelay workspace.
//!
//! These implement the core capability traits in memory so handler and
//! sink-server behavior can be tested deterministically, without a live
//! secrets service or filesystem.

pub mod fake_backend;
pub mod memory_sink;

pub use fake_backend::FakeBackend;
pub use memory_sink::MemorySink;
