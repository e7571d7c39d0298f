// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Research Datamover Bootstrap
//!
//! Entry-point concerns kept out of the application crate: CLI parsing and
//! hardening, exit-code mapping, logger initialization, signal handling,
//! cooperative shutdown, and platform queries. The application crate
//! depends on this one, never the other way around, so these modules stay
//! free of domain types.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ParseError, RecoverStrategyArg, ValidatedCli, ValidatedCommand};
pub use exit_code::{exit_with, ExitCode, FailureKind};
pub use logger::{init_tracing, BootstrapLogger, ConsoleLogger, NoOpLogger};
pub use shutdown::{CancellationToken, ShutdownCoordinator, DEFAULT_GRACE_PERIOD_SECS};

/// Parses and validates the command line; the first thing `main` calls.
pub fn bootstrap_cli() -> Result<ValidatedCli, ParseError> {
    cli::parse_and_validate()
}
