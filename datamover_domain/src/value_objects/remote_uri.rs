// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Remote URI Value Object
//!
//! Type-safe representation of transfer sources and destinations. The system
//! recognizes exactly two scheme families:
//!
//! - `file://<absolute-path>` or a raw absolute path for local trees
//! - `s3://<bucket>/<key-prefix>` for object-store destinations
//!
//! Anything else is rejected at parse time with
//! [`MoverError::UnsupportedScheme`], which keeps scheme checks out of the
//! transfer adapters: by the time a [`RemoteUri`] reaches an engine, only
//! capability mismatches remain to be detected.
//!
//! ## Usage Examples
//!
//! ```
//! use datamover_domain::value_objects::{RemoteUri, UriScheme};
//!
//! let dest = RemoteUri::parse("s3://lab-archive/genomics/run-42").unwrap();
//! assert_eq!(dest.scheme(), UriScheme::S3);
//! assert_eq!(dest.bucket(), Some("lab-archive"));
//! assert_eq!(dest.key_prefix(), Some("genomics/run-42"));
//!
//! let src = RemoteUri::parse("/data/run-42").unwrap();
//! assert_eq!(src.scheme(), UriScheme::File);
//! assert!(src.is_local());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::PathBuf;

use crate::MoverError;

/// Scheme family of a [`RemoteUri`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UriScheme {
    /// Local filesystem (`file://` or a raw absolute path).
    File,
    /// S3-compatible object store (`s3://bucket/prefix`).
    S3,
}

impl Display for UriScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriScheme::File => write!(f, "file"),
            UriScheme::S3 => write!(f, "s3"),
        }
    }
}

/// Parsed transfer endpoint.
///
/// Immutable once constructed; `join` produces a new value. The original
/// string form is retained so round-tripping through configuration files is
/// lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteUri {
    raw: String,
    scheme: UriScheme,
    authority: String,
    path: String,
}

impl RemoteUri {
    /// Parses a URI or raw absolute path.
    ///
    /// # Errors
    ///
    /// - [`MoverError::UnsupportedScheme`] for any scheme other than `file`
    ///   or `s3`
    /// - [`MoverError::InvalidConfiguration`] for relative paths, empty
    ///   input, or an `s3://` URI without a bucket
    pub fn parse(input: &str) -> Result<Self, MoverError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MoverError::InvalidConfiguration("URI cannot be empty".to_string()));
        }

        if let Some(rest) = trimmed.strip_prefix("s3://") {
            let (bucket, prefix) = match rest.split_once('/') {
                Some((b, p)) => (b, p.trim_end_matches('/')),
                None => (rest, ""),
            };
            if bucket.is_empty() {
                return Err(MoverError::InvalidConfiguration(format!(
                    "S3 URI '{}' is missing a bucket name",
                    trimmed
                )));
            }
            return Ok(Self {
                raw: trimmed.to_string(),
                scheme: UriScheme::S3,
                authority: bucket.to_string(),
                path: prefix.to_string(),
            });
        }

        if let Some(rest) = trimmed.strip_prefix("file://") {
            if !rest.starts_with('/') {
                return Err(MoverError::InvalidConfiguration(format!(
                    "file URI '{}' must carry an absolute path",
                    trimmed
                )));
            }
            return Ok(Self {
                raw: trimmed.to_string(),
                scheme: UriScheme::File,
                authority: String::new(),
                path: rest.to_string(),
            });
        }

        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(MoverError::UnsupportedScheme(format!(
                "'{}' (scheme '{}')",
                trimmed, scheme
            )));
        }

        // Raw path form. Only absolute paths are accepted so that workflow
        // behavior does not depend on the process working directory.
        if trimmed.starts_with('/') {
            return Ok(Self {
                raw: trimmed.to_string(),
                scheme: UriScheme::File,
                authority: String::new(),
                path: trimmed.to_string(),
            });
        }

        Err(MoverError::InvalidConfiguration(format!(
            "Path '{}' must be absolute (or use file:// / s3://)",
            trimmed
        )))
    }

    pub fn scheme(&self) -> UriScheme {
        self.scheme
    }

    pub fn is_local(&self) -> bool {
        self.scheme == UriScheme::File
    }

    pub fn is_remote(&self) -> bool {
        !self.is_local()
    }

    /// Bucket name for object-store URIs.
    pub fn bucket(&self) -> Option<&str> {
        match self.scheme {
            UriScheme::S3 => Some(&self.authority),
            UriScheme::File => None,
        }
    }

    /// Key prefix for object-store URIs (may be empty).
    pub fn key_prefix(&self) -> Option<&str> {
        match self.scheme {
            UriScheme::S3 => Some(&self.path),
            UriScheme::File => None,
        }
    }

    /// Local filesystem path for `file` URIs.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.scheme {
            UriScheme::File => Some(PathBuf::from(&self.path)),
            UriScheme::S3 => None,
        }
    }

    /// Appends a path segment, producing a new URI.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        let path = if self.path.is_empty() || self.path.ends_with('/') {
            format!("{}{}", self.path, segment)
        } else {
            format!("{}/{}", self.path, segment)
        };
        let raw = match self.scheme {
            UriScheme::S3 => format!("s3://{}/{}", self.authority, path),
            UriScheme::File => path.clone(),
        };
        Self {
            raw,
            scheme: self.scheme,
            authority: self.authority.clone(),
            path,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<String> for RemoteUri {
    type Error = MoverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RemoteUri> for String {
    fn from(uri: RemoteUri) -> Self {
        uri.raw
    }
}
