// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Selector
//!
//! Resolves a workflow's engine choice to a concrete adapter. For pinned
//! engines it checks availability; for `auto` it gathers the availability
//! and capability set and delegates the ranking decision to the domain's
//! deterministic rule.

use std::collections::BTreeMap;
use std::sync::Arc;

use datamover_domain::services::engine_selection::{rank_engines, EngineCandidate};
use datamover_domain::services::transfer_engine::{EngineKind, TransferEngine};
use datamover_domain::{DataPattern, DomainProfile, MoverError, RemoteUri};

/// Registry of constructed adapters plus the auto-selection glue.
pub struct EngineSelector {
    engines: BTreeMap<EngineKind, Arc<dyn TransferEngine>>,
}

impl EngineSelector {
    pub fn new(engines: Vec<Arc<dyn TransferEngine>>) -> Self {
        let engines = engines.into_iter().map(|e| (e.kind(), e)).collect();
        Self { engines }
    }

    pub fn get(&self, kind: EngineKind) -> Option<Arc<dyn TransferEngine>> {
        self.engines.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<EngineKind> {
        self.engines.keys().copied().collect()
    }

    /// Resolves a pinned engine, verifying availability.
    pub async fn resolve_fixed(&self, kind: EngineKind) -> Result<Arc<dyn TransferEngine>, MoverError> {
        let engine = self
            .get(kind)
            .ok_or_else(|| MoverError::InvalidConfiguration(format!("engine '{}' is not registered", kind)))?;
        if !engine.is_available().await {
            return Err(MoverError::EngineUnavailable(format!(
                "engine '{}' is not available on this host",
                kind
            )));
        }
        Ok(engine)
    }

    /// Auto-selects an engine for a transfer.
    ///
    /// Deterministic given the same (pattern, profile, endpoints,
    /// availability set).
    pub async fn auto_select(
        &self,
        pattern: Option<&DataPattern>,
        profile: &DomainProfile,
        source: &RemoteUri,
        destination: &RemoteUri,
    ) -> Result<Arc<dyn TransferEngine>, MoverError> {
        let mut candidates = Vec::with_capacity(self.engines.len());
        for engine in self.engines.values() {
            candidates.push(EngineCandidate {
                kind: engine.kind(),
                capabilities: engine.capabilities(),
                available: engine.is_available().await,
            });
        }

        let ranked = rank_engines(pattern, profile, source.scheme(), destination.scheme(), &candidates);
        let choice = ranked.first().copied().ok_or_else(|| {
            MoverError::EngineUnavailable(format!(
                "no available engine supports {} -> {}",
                source.scheme(),
                destination.scheme()
            ))
        })?;
        tracing::info!(engine = %choice, "auto-selected transfer engine (candidates: {:?})", ranked);
        self.get(choice)
            .ok_or_else(|| MoverError::InternalError(format!("ranked engine '{}' missing from registry", choice)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use datamover_domain::services::transfer_engine::EngineCapabilities;
    use datamover_domain::{TransferId, TransferProgress, TransferRequest, TransferResult, UriScheme};

    struct FakeEngine {
        kind: EngineKind,
        available: bool,
    }

    #[async_trait]
    impl TransferEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        fn kind(&self) -> EngineKind {
            self.kind
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                schemes: vec![UriScheme::File, UriScheme::S3],
                multipart: true,
                checksum: true,
                resume: false,
                bandwidth_limit: false,
            }
        }

        async fn upload(&self, _request: &TransferRequest) -> Result<TransferResult, MoverError> {
            unimplemented!("selector tests never transfer")
        }

        async fn download(&self, _request: &TransferRequest) -> Result<TransferResult, MoverError> {
            unimplemented!("selector tests never transfer")
        }

        async fn sync(&self, _request: &TransferRequest) -> Result<TransferResult, MoverError> {
            unimplemented!("selector tests never transfer")
        }

        fn progress(&self, _transfer_id: &TransferId) -> Option<TransferProgress> {
            None
        }

        async fn cancel(&self, _transfer_id: &TransferId) -> Result<(), MoverError> {
            Ok(())
        }
    }

    fn selector(available: &[EngineKind]) -> EngineSelector {
        EngineSelector::new(
            EngineKind::ALL
                .iter()
                .map(|&kind| {
                    Arc::new(FakeEngine {
                        kind,
                        available: available.contains(&kind),
                    }) as Arc<dyn TransferEngine>
                })
                .collect(),
        )
    }

    fn small_pattern() -> DataPattern {
        let mut pattern = DataPattern::new("/data");
        pattern.total_files = 1_000;
        pattern.median_file_size_bytes = 4 * 1024;
        pattern
    }

    /// Tests auto-selection picks the bundler for a small-median tree and
    /// respects availability.
    #[tokio::test]
    async fn test_auto_selection() {
        let profile = DomainProfile::generic(8, 0.9);
        let source = RemoteUri::parse("/data").unwrap();
        let destination = RemoteUri::parse("s3://bucket/x").unwrap();

        let all = selector(&EngineKind::ALL);
        let chosen = all
            .auto_select(Some(&small_pattern()), &profile, &source, &destination)
            .await
            .unwrap();
        assert_eq!(chosen.kind(), EngineKind::ArchivalBundler);

        // With the bundler unavailable the next-ranked engine wins.
        let partial = selector(&[EngineKind::BulkParallel, EngineKind::MultiCloudSync]);
        let chosen = partial
            .auto_select(Some(&small_pattern()), &profile, &source, &destination)
            .await
            .unwrap();
        assert_eq!(chosen.kind(), EngineKind::BulkParallel);
    }

    /// Tests the no-engine case surfaces as EngineUnavailable.
    #[tokio::test]
    async fn test_no_available_engine() {
        let none = selector(&[]);
        let profile = DomainProfile::generic(4, 0.0);
        let result = none
            .auto_select(
                None,
                &profile,
                &RemoteUri::parse("/data").unwrap(),
                &RemoteUri::parse("s3://bucket/x").unwrap(),
            )
            .await;
        assert!(matches!(result, Err(MoverError::EngineUnavailable(_))));
    }

    /// Tests pinned engines fail fast when unavailable.
    #[tokio::test]
    async fn test_fixed_resolution() {
        let partial = selector(&[EngineKind::BulkParallel]);
        assert!(partial.resolve_fixed(EngineKind::BulkParallel).await.is_ok());
        assert!(matches!(
            partial.resolve_fixed(EngineKind::MultiCloudSync).await,
            Err(MoverError::EngineUnavailable(_))
        ));
    }
}
