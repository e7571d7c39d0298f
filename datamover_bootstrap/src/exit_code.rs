// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Codes
//!
//! Process exit codes forming the CLI contract:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | success |
//! | 1    | user error (invalid config, missing file) |
//! | 2    | transient / retryable failure |
//! | 3    | non-retryable runtime failure |
//! | 4    | partial success (some files failed, others succeeded) |
//! | 130  | cancelled |
//!
//! The binary maps its domain error class onto [`FailureKind`]; this module
//! keeps the numeric contract in one place.

/// Outcome category as seen by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Invalid configuration, missing files, bad arguments.
    User,
    /// Retryable failure (network, throttling, timeout).
    Transient,
    /// Non-retryable runtime failure (integrity, resource, unknown).
    Runtime,
    /// Some entries failed while others succeeded.
    Partial,
    /// Cooperative cancellation.
    Cancelled,
}

/// Process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    UserError = 1,
    TransientFailure = 2,
    RuntimeFailure = 3,
    PartialSuccess = 4,
    Cancelled = 130,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::User => ExitCode::UserError,
            FailureKind::Transient => ExitCode::TransientFailure,
            FailureKind::Runtime => ExitCode::RuntimeFailure,
            FailureKind::Partial => ExitCode::PartialSuccess,
            FailureKind::Cancelled => ExitCode::Cancelled,
        }
    }
}

/// Terminates the process with the given exit code.
pub fn exit_with(code: ExitCode) -> ! {
    std::process::exit(code.code())
}
