// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bundling Engine
//!
//! Groups many small files into fewer archive objects with a sidecar
//! manifest for reverse lookup.
//!
//! ## Packing
//!
//! First-fit-decreasing by file size with a hard size cap B (default
//! 256 MiB) and a per-bundle file-count cap F (default 10,000). Files
//! larger than B are never bundled; they pass through to the transfer
//! stage unchanged.
//!
//! ## Addressing and idempotence
//!
//! Bundle object names derive from the sorted SHA-256 digests of their
//! members, so re-running on the same inputs produces the same names and
//! rewriting an existing object with identical content is a no-op. The
//! packing itself is deterministic (stable sort, stable tie-break on
//! relative path), so the same input set always yields the same bundle
//! set.
//!
//! ## Format
//!
//! A stream-oriented tar archive, gzip-compressed when requested. The
//! manifest records each entry's header offset within the uncompressed tar
//! stream, its size, and its SHA-256.

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use datamover_domain::{BundleId, MoverError};

use super::manifest::{BundleManifest, ManifestEntry};

/// Packing configuration.
#[derive(Debug, Clone, Copy)]
pub struct BundlerConfig {
    /// Hard cap B on bundle payload bytes (default 256 MiB).
    pub target_bundle_size: u64,
    /// Hard cap F on members per bundle (default 10,000).
    pub max_files_per_bundle: usize,
    /// Gzip the archives (driven by the `auto_compression` flag).
    pub compress: bool,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            target_bundle_size: 256 * 1024 * 1024,
            max_files_per_bundle: 10_000,
            compress: false,
        }
    }
}

/// One candidate file for bundling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInput {
    pub absolute_path: PathBuf,
    /// `/`-separated path relative to the bundling root.
    pub relative_path: String,
    pub size: u64,
}

impl BundleInput {
    /// Scans a local tree into bundle inputs. Unreadable entries are
    /// skipped with a warning, matching the analyzer's failure model.
    pub fn scan(root: &Path) -> Result<Vec<BundleInput>, MoverError> {
        if !root.exists() {
            return Err(MoverError::PathNotFound(root.display().to_string()));
        }
        let mut inputs = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("skipping unstatable file {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| MoverError::InternalError(e.to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            inputs.push(BundleInput {
                absolute_path: entry.path().to_path_buf(),
                relative_path: relative,
                size: metadata.len(),
            });
        }
        Ok(inputs)
    }
}

/// One planned bundle before writing.
#[derive(Debug, Clone, Default)]
pub struct PlannedBundle {
    pub members: Vec<BundleInput>,
    pub total_bytes: u64,
}

/// Packing plan: bundles plus the files that bypass bundling.
#[derive(Debug, Clone, Default)]
pub struct BundlePlan {
    pub bundles: Vec<PlannedBundle>,
    /// Files larger than the bundle cap, transferred as-is.
    pub passthrough: Vec<BundleInput>,
}

impl BundlePlan {
    pub fn bundled_file_count(&self) -> usize {
        self.bundles.iter().map(|b| b.members.len()).sum()
    }
}

/// A bundle written to the staging area.
#[derive(Debug, Clone)]
pub struct WrittenBundle {
    pub id: BundleId,
    pub archive_path: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: BundleManifest,
    /// False when an identical object already existed (idempotent rerun).
    pub freshly_written: bool,
}

/// The bundling engine.
#[derive(Debug, Clone, Default)]
pub struct Bundler {
    config: BundlerConfig,
}

impl Bundler {
    pub fn new(config: BundlerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BundlerConfig {
        &self.config
    }

    /// First-fit-decreasing packing under the size and count caps.
    pub fn plan(&self, mut inputs: Vec<BundleInput>) -> BundlePlan {
        // Deterministic order: size descending, then relative path.
        inputs.sort_by(|a, b| b.size.cmp(&a.size).then(a.relative_path.cmp(&b.relative_path)));

        let mut plan = BundlePlan::default();
        for input in inputs {
            if input.size > self.config.target_bundle_size {
                plan.passthrough.push(input);
                continue;
            }
            let slot = plan.bundles.iter_mut().find(|bundle| {
                bundle.total_bytes + input.size <= self.config.target_bundle_size
                    && bundle.members.len() < self.config.max_files_per_bundle
            });
            match slot {
                Some(bundle) => {
                    bundle.total_bytes += input.size;
                    bundle.members.push(input);
                }
                None => {
                    plan.bundles.push(PlannedBundle {
                        total_bytes: input.size,
                        members: vec![input],
                    });
                }
            }
        }
        plan
    }

    /// Writes one planned bundle and its manifest into `out_dir`.
    ///
    /// Rewriting a bundle whose object already exists is a no-op (the
    /// content hash guarantees identical bytes would be produced).
    pub fn write_bundle(&self, bundle: &PlannedBundle, out_dir: &Path) -> Result<WrittenBundle, MoverError> {
        if bundle.members.is_empty() {
            return Err(MoverError::InvalidConfiguration(
                "cannot write an empty bundle".to_string(),
            ));
        }
        std::fs::create_dir_all(out_dir)?;

        // Hash members in parallel; hashing dominates bundling time for
        // small-file trees.
        let hashes: Vec<(String, String)> = bundle
            .members
            .par_iter()
            .map(|member| sha256_file(&member.absolute_path).map(|digest| (member.relative_path.clone(), digest)))
            .collect::<Result<Vec<_>, MoverError>>()?;
        let digest_by_path: std::collections::BTreeMap<&str, &str> =
            hashes.iter().map(|(path, digest)| (path.as_str(), digest.as_str())).collect();

        let id = BundleId::from_member_hashes(hashes.iter().map(|(_, digest)| digest))?;
        let object_name = id.object_name(self.config.compress);
        let archive_path = out_dir.join(&object_name);

        if archive_path.exists() {
            tracing::debug!("bundle {} already staged; skipping rewrite", object_name);
            let manifest_path = out_dir.join(id.manifest_name());
            let manifest = BundleManifest::load(&manifest_path)?;
            return Ok(WrittenBundle {
                id,
                archive_path,
                manifest_path,
                manifest,
                freshly_written: false,
            });
        }

        // Write through a temp name so a crash never leaves a torn object
        // under the content-addressed name.
        let tmp_path = out_dir.join(format!(".tmp-{}", object_name));
        let file = std::fs::File::create(&tmp_path)?;
        let offsets = if self.config.compress {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let (offsets, encoder) = write_tar_stream(encoder, &bundle.members)?;
            encoder.finish()?.sync_all()?;
            offsets
        } else {
            let (offsets, file) = write_tar_stream(file, &bundle.members)?;
            file.sync_all()?;
            offsets
        };
        std::fs::rename(&tmp_path, &archive_path)?;

        let bundle_sha256 = sha256_file(&archive_path)?;
        let entries = bundle
            .members
            .iter()
            .zip(offsets)
            .map(|(member, offset)| ManifestEntry {
                path: member.relative_path.clone(),
                size: member.size,
                offset,
                sha256: digest_by_path
                    .get(member.relative_path.as_str())
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            })
            .collect();

        let manifest = BundleManifest {
            bundle_id: id.clone(),
            bundle_name: object_name,
            bundle_sha256,
            compressed: self.config.compress,
            created_at: chrono::Utc::now(),
            entries,
        };
        let manifest_path = manifest.save(out_dir)?;

        Ok(WrittenBundle {
            id,
            archive_path,
            manifest_path,
            manifest,
            freshly_written: true,
        })
    }

    /// Writes every planned bundle, returning them in plan order.
    pub fn write_all(&self, plan: &BundlePlan, out_dir: &Path) -> Result<Vec<WrittenBundle>, MoverError> {
        plan.bundles.iter().map(|b| self.write_bundle(b, out_dir)).collect()
    }

    /// Streams the members of a bundle back to their original relative
    /// paths under `dest_root`, verifying each entry's digest.
    pub fn restore(
        &self,
        manifest: &BundleManifest,
        bundle_path: &Path,
        dest_root: &Path,
    ) -> Result<u64, MoverError> {
        let file = std::fs::File::open(bundle_path)?;
        let reader: Box<dyn Read> = if manifest.compressed {
            Box::new(flate2::read::GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let mut archive = tar::Archive::new(reader);
        let expected: std::collections::BTreeMap<&str, &ManifestEntry> =
            manifest.entries.iter().map(|e| (e.path.as_str(), e)).collect();

        let mut restored = 0u64;
        for entry in archive.entries().map_err(MoverError::from)? {
            let mut entry = entry.map_err(MoverError::from)?;
            let path_in_archive = entry
                .path()
                .map_err(MoverError::from)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            let Some(manifest_entry) = expected.get(path_in_archive.as_str()) else {
                tracing::warn!("archive entry '{}' not present in manifest; skipping", path_in_archive);
                continue;
            };
            // Containment check; tar paths are attacker-controllable in
            // principle.
            if path_in_archive.starts_with('/') || path_in_archive.split('/').any(|c| c == "..") {
                return Err(MoverError::InvalidConfiguration(format!(
                    "archive entry '{}' escapes the restore root",
                    path_in_archive
                )));
            }

            let dest_path = dest_root.join(&path_in_archive);
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut hasher = Sha256::new();
            let mut output = std::fs::File::create(&dest_path)?;
            let mut buffer = [0u8; 64 * 1024];
            loop {
                let read = entry.read(&mut buffer)?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[..read]);
                output.write_all(&buffer[..read])?;
            }
            let digest = hex::encode(hasher.finalize());
            if digest != manifest_entry.sha256 {
                return Err(MoverError::ChecksumMismatch(format!(
                    "restored '{}' hashes to {} but manifest says {}",
                    path_in_archive, digest, manifest_entry.sha256
                )));
            }
            restored += 1;
        }
        Ok(restored)
    }
}

/// Counting writer so entry offsets within the tar stream are known.
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Appends every member to a tar stream over `sink`, returning each
/// entry's header offset and the sink.
fn write_tar_stream<W: Write>(sink: W, members: &[BundleInput]) -> Result<(Vec<u64>, W), MoverError> {
    let mut builder = tar::Builder::new(CountingWriter::new(sink));
    let mut offsets = Vec::with_capacity(members.len());
    for member in members {
        offsets.push(builder.get_mut().written);
        builder
            .append_path_with_name(&member.absolute_path, &member.relative_path)
            .map_err(MoverError::from)?;
    }
    let counting = builder.into_inner().map_err(MoverError::from)?;
    Ok((offsets, counting.inner))
}

/// Streaming SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String, MoverError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
