// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Error types returned across the engine's public seams (spec §7).
//!
//! Invariant violations that indicate a programming bug rather than a
//! runtime condition (misusing the buffer pool, double-submitting an
//! overridable request) are not represented here — they panic, the way
//! the original's `SU_ERROR("BUG: ...")` paths do.

use thiserror::Error;

/// A fault an inspector reports back to its owner, matching the
/// "dedicated inspector response kind" categories of spec.md §7.
#[derive(Debug, Clone, Error)]
pub enum InspectorFault {
    #[error("inspector halted before completing the request")]
    Halted,
    #[error("source read failed: {0}")]
    SourceReadFailed(String),
    #[error("estimator failed: {0}")]
    EstimatorFailed(String),
}

/// Errors surfaced from `waveguide-core`'s public API.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    #[error("bad handle: {0}")]
    BadHandle(String),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("wrong object kind: expected {expected}, got {got}")]
    WrongKind { expected: String, got: String },

    #[error("timed out waiting for halt acknowledgement")]
    HaltTimeout,

    #[error(transparent)]
    Inspector(#[from] InspectorFault),
}

/// Used at construction/bootstrap seams that combine heterogeneous error
/// sources, mirroring the teacher's top-level `trx_core::lib` alias.
pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
