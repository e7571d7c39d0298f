// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Argument Hardening
//!
//! Semantic validation applied after clap parsing and before anything
//! touches the filesystem or spawns a subprocess. Arguments are rejected
//! for embedded NUL/control characters, excessive length, and path
//! traversal components, keeping hostile input out of subprocess argv and
//! file-name construction.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Maximum accepted argument length in bytes.
const MAX_ARG_LEN: usize = 4096;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error("unsafe argument rejected: {0}")]
    UnsafeArgument(String),

    #[error("unsafe path rejected: {0}")]
    UnsafePath(String),
}

/// Stateless argument validation helpers.
pub struct SecureArgParser;

impl SecureArgParser {
    /// Rejects NUL bytes, control characters, and oversized arguments.
    pub fn validate_argument(arg: &str) -> Result<(), ParseError> {
        if arg.len() > MAX_ARG_LEN {
            return Err(ParseError::UnsafeArgument(format!(
                "argument exceeds {} bytes",
                MAX_ARG_LEN
            )));
        }
        if arg.chars().any(|c| c == '\0' || (c.is_control() && c != '\t')) {
            return Err(ParseError::UnsafeArgument(
                "argument contains control characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates a path argument: no traversal components, no control
    /// characters.
    pub fn validate_path(path: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(path)?;
        let parsed = Path::new(path);
        for component in parsed.components() {
            if matches!(component, Component::ParentDir) {
                return Err(ParseError::UnsafePath(format!(
                    "'{}' contains a parent-directory component",
                    path
                )));
            }
        }
        Ok(parsed.to_path_buf())
    }

    /// Validates a `key=value` override pair, returning the split parts.
    pub fn validate_override(pair: &str) -> Result<(String, String), ParseError> {
        Self::validate_argument(pair)?;
        let (key, value) = pair.split_once('=').ok_or_else(|| ParseError::InvalidValue {
            arg: "set".to_string(),
            reason: format!("'{}' is not of the form key=value", pair),
        })?;
        if key.trim().is_empty() {
            return Err(ParseError::InvalidValue {
                arg: "set".to_string(),
                reason: "override key must not be empty".to_string(),
            });
        }
        Ok((key.trim().to_string(), value.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests control characters and NUL bytes are rejected.
    #[test]
    fn test_argument_hardening() {
        assert!(SecureArgParser::validate_argument("normal-value_1").is_ok());
        assert!(SecureArgParser::validate_argument("with\ttab").is_ok());
        assert!(SecureArgParser::validate_argument("evil\0byte").is_err());
        assert!(SecureArgParser::validate_argument("line\nbreak").is_err());
        assert!(SecureArgParser::validate_argument(&"x".repeat(MAX_ARG_LEN + 1)).is_err());
    }

    /// Tests traversal components are rejected but plain relative and
    /// absolute paths pass.
    #[test]
    fn test_path_hardening() {
        assert!(SecureArgParser::validate_path("/data/source").is_ok());
        assert!(SecureArgParser::validate_path("project.yaml").is_ok());
        assert!(SecureArgParser::validate_path("../../etc/passwd").is_err());
        assert!(SecureArgParser::validate_path("/data/../etc").is_err());
    }

    /// Tests override splitting and its failure modes.
    #[test]
    fn test_override_validation() {
        let (key, value) = SecureArgParser::validate_override("project.name=lab").unwrap();
        assert_eq!(key, "project.name");
        assert_eq!(value, "lab");
        assert!(SecureArgParser::validate_override("no-equals").is_err());
        assert!(SecureArgParser::validate_override("=value").is_err());
    }
}
