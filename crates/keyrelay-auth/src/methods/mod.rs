// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concrete credential provider variants.

pub mod jwt_file;
pub mod workload;

pub use jwt_file::JwtFileProvider;
pub use workload::WorkloadIdentityProvider;
