// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Concurrent plumbing and scheduling fabric for the waveguide SDR
//! signal-analysis engine: the mailbox/worker primitives, the sample
//! buffer pool, the frequency-correction registry, the spectral tuner,
//! and the analyzer that ties them together behind a small message-based
//! client API.

pub mod analyzer;
pub mod corrector;
pub mod error;
pub mod mailbox;
pub mod messages;
pub mod pool;
pub mod source;
pub mod throttle;
pub mod tuner;
pub mod worker;

pub mod inspector;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{CoreError, DynResult};
