// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transfer Engine Adapters
//!
//! Infrastructure implementations of the domain's `TransferEngine` port:
//!
//! - [`bulk_parallel`]: s5cmd-style bulk-parallel CLI (many objects,
//!   S3-style stores, 64 MiB parts)
//! - [`cloud_sync`]: rclone-style multi-cloud sync CLI (heterogeneous
//!   backends, incremental sync, 128 MiB parts)
//! - [`archive_bundler`]: bundles small files via the bundling engine and
//!   uploads via the bulk-parallel adapter
//!
//! plus the shared subprocess discipline ([`process`]), the
//! single-writer/many-reader progress cell ([`progress`]), and deterministic
//! auto-selection ([`selector`]).

pub mod archive_bundler;
pub mod bulk_parallel;
pub mod cloud_sync;
pub mod process;
pub mod progress;
pub mod selector;

pub use archive_bundler::ArchiveBundlerEngine;
pub use bulk_parallel::BulkParallelEngine;
pub use cloud_sync::CloudSyncEngine;
pub use selector::EngineSelector;

use std::path::Path;

use datamover_domain::{RemoteUri, UriScheme};

/// Renders a URI as the argument form the transfer CLIs expect.
///
/// Local directories and S3 prefixes used as a *source* get a recursive
/// wildcard; destinations get a trailing slash so the tools treat them as
/// prefixes.
pub(crate) fn endpoint_spec(uri: &RemoteUri, is_source: bool) -> String {
    match uri.scheme() {
        UriScheme::File => {
            let path = uri.local_path().unwrap_or_default();
            if is_source && path.is_dir() {
                format!("{}/*", path.display().to_string().trim_end_matches('/'))
            } else if is_source {
                path.display().to_string()
            } else {
                format!("{}/", path.display().to_string().trim_end_matches('/'))
            }
        }
        UriScheme::S3 => {
            let trimmed = uri.as_str().trim_end_matches('/');
            if is_source {
                format!("{}/*", trimmed)
            } else {
                format!("{}/", trimmed)
            }
        }
    }
}

/// Counts files and bytes under a local source, honoring an explicit file
/// list when present. Unreadable entries are skipped; totals are advisory
/// (they feed percentage and ETA, not accounting).
pub(crate) fn local_totals(root: &Path, files: Option<&[String]>) -> (u64, u64) {
    match files {
        Some(files) => {
            let mut count = 0u64;
            let mut bytes = 0u64;
            for relative in files {
                if let Ok(metadata) = std::fs::metadata(root.join(relative)) {
                    if metadata.is_file() {
                        count += 1;
                        bytes += metadata.len();
                    }
                }
            }
            (count, bytes)
        }
        None => {
            let mut count = 0u64;
            let mut bytes = 0u64;
            for entry in walkdir::WalkDir::new(root).into_iter().flatten() {
                if entry.file_type().is_file() {
                    if let Ok(metadata) = entry.metadata() {
                        count += 1;
                        bytes += metadata.len();
                    }
                }
            }
            (count, bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests endpoint rendering for both schemes and both roles.
    #[test]
    fn test_endpoint_spec() {
        let remote = RemoteUri::parse("s3://bucket/prefix").unwrap();
        assert_eq!(endpoint_spec(&remote, true), "s3://bucket/prefix/*");
        assert_eq!(endpoint_spec(&remote, false), "s3://bucket/prefix/");

        let dir = tempfile::TempDir::new().unwrap();
        let local = RemoteUri::parse(&dir.path().display().to_string()).unwrap();
        assert!(endpoint_spec(&local, true).ends_with("/*"));
        assert!(endpoint_spec(&local, false).ends_with('/'));
    }

    /// Tests totals for the whole-tree and explicit-list cases.
    #[test]
    fn test_local_totals() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.dat"), vec![0u8; 100]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.dat"), vec![0u8; 50]).unwrap();

        let (files, bytes) = local_totals(dir.path(), None);
        assert_eq!(files, 2);
        assert_eq!(bytes, 150);

        let list = vec!["a.dat".to_string(), "missing.dat".to_string()];
        let (files, bytes) = local_totals(dir.path(), Some(&list));
        assert_eq!(files, 1);
        assert_eq!(bytes, 100);
    }
}
