// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recommendation Engine
//!
//! Fuses the pattern analyzer, cost calculator, and domain profile outputs
//! into a ranked set of optimization suggestions and a tool choice.
//!
//! ## Ordering contract
//!
//! Suggestions are ordered by descending estimated monthly savings, ties
//! broken by lower implementation risk (a static property of the suggestion
//! type), then by type name, so the ranking is deterministic for identical
//! inputs.

use serde::{Deserialize, Serialize};

use crate::entities::data_pattern::{DataPattern, DEFAULT_BUNDLE_TARGET};
use crate::entities::domain_profile::DomainProfile;
use crate::services::cost_model::{CostCalculator, CostScenario, StorageClass};
use crate::services::transfer_engine::EngineKind;
use crate::MoverError;

/// Kind of an optimization suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    EnableBundling,
    SwitchEngine,
    TierStorage,
    EnableCompression,
    AdjustConcurrency,
    PreWarmRegion,
    EnableEncryption,
    DeferToOffPeak,
}

impl SuggestionKind {
    /// Static implementation-risk ranking used as the ordering tie-breaker
    /// (lower is safer).
    pub fn implementation_risk(&self) -> u8 {
        match self {
            SuggestionKind::AdjustConcurrency => 0,
            SuggestionKind::EnableBundling => 1,
            SuggestionKind::EnableEncryption => 1,
            SuggestionKind::DeferToOffPeak => 1,
            SuggestionKind::TierStorage => 2,
            SuggestionKind::EnableCompression => 2,
            SuggestionKind::PreWarmRegion => 2,
            SuggestionKind::SwitchEngine => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::EnableBundling => "enable_bundling",
            SuggestionKind::SwitchEngine => "switch_engine",
            SuggestionKind::TierStorage => "tier_storage",
            SuggestionKind::EnableCompression => "enable_compression",
            SuggestionKind::AdjustConcurrency => "adjust_concurrency",
            SuggestionKind::PreWarmRegion => "pre_warm_region",
            SuggestionKind::EnableEncryption => "enable_encryption",
            SuggestionKind::DeferToOffPeak => "defer_to_off_peak",
        }
    }
}

/// Numeric impact estimate attached to a suggestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub cost_savings_monthly: f64,
    /// Human-readable time impact ("~40% fewer requests", "+2x throughput").
    #[serde(default)]
    pub time_savings: Option<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// One ranked optimization suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub description: String,
    pub impact: ImpactEstimate,
}

/// Tool choice grounded in observed data characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecommendation {
    pub task: String,
    pub recommended_tool: EngineKind,
    /// Confidence in [0, 1], derived from how clearly the data favors the
    /// tool.
    pub confidence: f64,
    pub reasoning: String,
}

/// Scenario set plus the spread across it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysis {
    pub scenarios: Vec<CostScenario>,
    pub potential_savings: f64,
}

/// Complete recommendation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub tool_recommendations: Vec<ToolRecommendation>,
    pub optimization_suggestions: Vec<OptimizationSuggestion>,
    pub cost_analysis: CostAnalysis,
}

/// Fuses analysis, cost, and profile data into a [`Recommendation`].
#[derive(Debug, Clone, Default)]
pub struct RecommendationService {
    calculator: CostCalculator,
}

impl RecommendationService {
    pub fn new(calculator: CostCalculator) -> Self {
        Self { calculator }
    }

    /// Produces the ranked recommendation for a pattern.
    pub fn recommend(
        &self,
        pattern: &DataPattern,
        profile: Option<&DomainProfile>,
        region: &str,
        class: StorageClass,
    ) -> Result<Recommendation, MoverError> {
        let scenarios = self.calculator.default_scenarios(pattern, profile, region, class)?;
        let potential_savings = CostCalculator::potential_savings(&scenarios);

        let mut suggestions = Vec::new();
        self.suggest_bundling(pattern, region, class, &mut suggestions)?;
        self.suggest_tiering(pattern, region, class, &mut suggestions)?;
        self.suggest_compression(pattern, profile, region, class, &mut suggestions)?;
        self.suggest_concurrency(pattern, profile, &mut suggestions);
        self.suggest_encryption(profile, &mut suggestions);

        // Savings desc, then risk asc, then name for determinism.
        suggestions.sort_by(|a, b| {
            b.impact
                .cost_savings_monthly
                .partial_cmp(&a.impact.cost_savings_monthly)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.kind.implementation_risk().cmp(&b.kind.implementation_risk()))
                .then(a.kind.as_str().cmp(b.kind.as_str()))
        });

        Ok(Recommendation {
            tool_recommendations: self.recommend_tools(pattern, profile),
            optimization_suggestions: suggestions,
            cost_analysis: CostAnalysis {
                scenarios,
                potential_savings,
            },
        })
    }

    fn suggest_bundling(
        &self,
        pattern: &DataPattern,
        region: &str,
        class: StorageClass,
        out: &mut Vec<OptimizationSuggestion>,
    ) -> Result<(), MoverError> {
        if pattern.small_file_fraction() < 0.3 || pattern.file_sizes.under_1_mib < 100 {
            return Ok(());
        }
        let savings = self.calculator.bundling_savings(pattern, region, class)?;
        let bundles = pattern.estimated_bundles(DEFAULT_BUNDLE_TARGET);
        out.push(OptimizationSuggestion {
            kind: SuggestionKind::EnableBundling,
            description: format!(
                "Pack {} small files into ~{} bundles before upload",
                pattern.file_sizes.under_1_mib, bundles
            ),
            impact: ImpactEstimate {
                cost_savings_monthly: savings,
                time_savings: Some(format!(
                    "~{} fewer PUT requests",
                    pattern.file_sizes.under_1_mib.saturating_sub(bundles)
                )),
                assumptions: vec![format!("{} MiB bundle target", DEFAULT_BUNDLE_TARGET / (1024 * 1024))],
            },
        });
        Ok(())
    }

    fn suggest_tiering(
        &self,
        pattern: &DataPattern,
        region: &str,
        class: StorageClass,
        out: &mut Vec<OptimizationSuggestion>,
    ) -> Result<(), MoverError> {
        let savings = self.calculator.tiering_savings(pattern, region, class)?;
        if savings <= 0.01 {
            return Ok(());
        }
        out.push(OptimizationSuggestion {
            kind: SuggestionKind::TierStorage,
            description: format!("Lifecycle cold objects from {} to {}", class, class.colder()),
            impact: ImpactEstimate {
                cost_savings_monthly: savings,
                time_savings: None,
                assumptions: vec!["50% of bytes cold after 30 days".to_string()],
            },
        });
        Ok(())
    }

    fn suggest_compression(
        &self,
        pattern: &DataPattern,
        profile: Option<&DomainProfile>,
        region: &str,
        class: StorageClass,
        out: &mut Vec<OptimizationSuggestion>,
    ) -> Result<(), MoverError> {
        let ratio = profile.map(|p| p.typical_compression_ratio(1.3)).unwrap_or(1.3);
        if ratio <= 1.05 {
            return Ok(());
        }
        let rates = RateTableProbe::storage_rate(&self.calculator, pattern, region, class)?;
        let stored_gib = pattern.total_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
        let savings = (stored_gib - stored_gib / ratio) * rates;
        if savings <= 0.01 {
            return Ok(());
        }
        out.push(OptimizationSuggestion {
            kind: SuggestionKind::EnableCompression,
            description: format!("Compress bundles in flight (expected ratio {:.2})", ratio),
            impact: ImpactEstimate {
                cost_savings_monthly: savings,
                time_savings: None,
                assumptions: vec![format!("domain-typical compression ratio {:.2}", ratio)],
            },
        });
        Ok(())
    }

    fn suggest_concurrency(
        &self,
        pattern: &DataPattern,
        profile: Option<&DomainProfile>,
        out: &mut Vec<OptimizationSuggestion>,
    ) {
        let Some(profile) = profile else { return };
        if pattern.total_files < 100 {
            return;
        }
        out.push(OptimizationSuggestion {
            kind: SuggestionKind::AdjustConcurrency,
            description: format!(
                "Use {} parallel streams (the '{}' profile optimum)",
                profile.transfer.optimal_concurrency, profile.name
            ),
            impact: ImpactEstimate {
                cost_savings_monthly: 0.0,
                time_savings: Some("higher sustained throughput on many-object trees".to_string()),
                assumptions: vec![],
            },
        });
    }

    fn suggest_encryption(&self, profile: Option<&DomainProfile>, out: &mut Vec<OptimizationSuggestion>) {
        let Some(profile) = profile else { return };
        if !profile.security.encryption_required {
            return;
        }
        out.push(OptimizationSuggestion {
            kind: SuggestionKind::EnableEncryption,
            description: format!("The '{}' profile requires server-side encryption at rest", profile.name),
            impact: ImpactEstimate {
                cost_savings_monthly: 0.0,
                time_savings: None,
                assumptions: vec!["encryption applied by the object store".to_string()],
            },
        });
    }

    fn recommend_tools(&self, pattern: &DataPattern, profile: Option<&DomainProfile>) -> Vec<ToolRecommendation> {
        let mut tools = Vec::new();
        let small_fraction = pattern.small_file_fraction();
        let median = pattern.median_file_size_bytes;

        let (engine, confidence, reasoning) = if pattern.total_files > 0 && median < 1024 * 1024 && small_fraction > 0.5
        {
            (
                EngineKind::ArchivalBundler,
                (0.6 + small_fraction * 0.4).min(1.0),
                format!(
                    "{:.0}% of files are under 1 MiB (median {} bytes); bundling avoids per-object overhead",
                    small_fraction * 100.0,
                    median
                ),
            )
        } else if median > 100 * 1024 * 1024 {
            (
                EngineKind::BulkParallel,
                0.9,
                format!("median object size {} bytes favors multipart parallel upload", median),
            )
        } else {
            let preferred = profile
                .and_then(|p| p.transfer.preferred_engines.first().copied())
                .unwrap_or(EngineKind::BulkParallel);
            (
                preferred,
                0.6,
                "mixed object sizes; falling back to the domain profile preference".to_string(),
            )
        };
        tools.push(ToolRecommendation {
            task: "primary_transfer".to_string(),
            recommended_tool: engine,
            confidence,
            reasoning,
        });

        tools.push(ToolRecommendation {
            task: "incremental_sync".to_string(),
            recommended_tool: EngineKind::MultiCloudSync,
            confidence: 0.7,
            reasoning: "repeat reconciliation benefits from delta detection and filters".to_string(),
        });
        tools
    }
}

// Storage-rate probe kept separate so the compression estimate reuses the
// calculator's table instead of duplicating prices.
struct RateTableProbe;

impl RateTableProbe {
    fn storage_rate(
        calculator: &CostCalculator,
        pattern: &DataPattern,
        region: &str,
        class: StorageClass,
    ) -> Result<f64, MoverError> {
        use crate::services::cost_model::ScenarioParams;
        let gib = pattern.total_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
        if gib <= f64::EPSILON {
            return Ok(0.0);
        }
        let scenario = calculator.scenario(pattern, &ScenarioParams::current(region, class))?;
        Ok(scenario.monthly_costs.storage / gib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::data_pattern::SMALL_FILE_THRESHOLD;

    fn small_file_pattern(files: u64, each_size: u64) -> DataPattern {
        let mut pattern = DataPattern::new("/data");
        for _ in 0..files {
            pattern.total_files += 1;
            pattern.total_size_bytes += each_size;
            let entry = pattern.file_types.entry("fastq".to_string()).or_default();
            entry.count += 1;
            entry.total_size += each_size;
            pattern.file_sizes.record(each_size);
        }
        pattern.file_sizes.finalize(pattern.total_files);
        pattern.median_file_size_bytes = each_size;
        pattern
    }

    /// Tests S1's ranking claim: for 10,000 tiny files, enable_bundling is
    /// the top suggestion and the bundler is the recommended tool.
    #[test]
    fn test_small_file_tree_ranks_bundling_first() {
        let service = RecommendationService::default();
        let pattern = small_file_pattern(10_000, 4 * 1024);
        let recommendation = service
            .recommend(&pattern, None, "us-east-1", StorageClass::Standard)
            .unwrap();

        assert_eq!(
            recommendation.optimization_suggestions[0].kind,
            SuggestionKind::EnableBundling
        );
        let tool = &recommendation.tool_recommendations[0];
        assert_eq!(tool.recommended_tool, EngineKind::ArchivalBundler);
        assert!(tool.confidence >= 0.8);
        assert!(recommendation.cost_analysis.potential_savings >= 0.0);
    }

    /// Tests a large-object tree recommends the bulk-parallel CLI with no
    /// bundling suggestion.
    #[test]
    fn test_large_object_tree() {
        let service = RecommendationService::default();
        let mut pattern = DataPattern::new("/data");
        pattern.total_files = 1;
        pattern.total_size_bytes = 10 * 1024 * 1024 * 1024;
        pattern.median_file_size_bytes = pattern.total_size_bytes;
        let entry = pattern.file_types.entry("nc".to_string()).or_default();
        entry.count = 1;
        entry.total_size = pattern.total_size_bytes;

        let recommendation = service
            .recommend(&pattern, None, "us-east-1", StorageClass::Standard)
            .unwrap();
        assert_eq!(
            recommendation.tool_recommendations[0].recommended_tool,
            EngineKind::BulkParallel
        );
        assert!(!recommendation
            .optimization_suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::EnableBundling));
    }

    /// Tests the ordering contract: savings descending with the risk
    /// tie-breaker applied.
    #[test]
    fn test_suggestion_ordering() {
        let service = RecommendationService::default();
        let pattern = small_file_pattern(5_000, SMALL_FILE_THRESHOLD / 2);
        let recommendation = service
            .recommend(&pattern, None, "us-east-1", StorageClass::Standard)
            .unwrap();

        let suggestions = &recommendation.optimization_suggestions;
        for pair in suggestions.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let savings_ordered = a.impact.cost_savings_monthly > b.impact.cost_savings_monthly;
            let tied = (a.impact.cost_savings_monthly - b.impact.cost_savings_monthly).abs() < 1e-12;
            assert!(
                savings_ordered
                    || (tied && a.kind.implementation_risk() <= b.kind.implementation_risk()),
                "ordering violated between {:?} and {:?}",
                a.kind,
                b.kind
            );
        }
    }

    /// Tests determinism across repeated invocations.
    #[test]
    fn test_deterministic_output() {
        let service = RecommendationService::default();
        let pattern = small_file_pattern(2_000, 8 * 1024);
        let first = service
            .recommend(&pattern, None, "us-east-1", StorageClass::Standard)
            .unwrap();
        let second = service
            .recommend(&pattern, None, "us-east-1", StorageClass::Standard)
            .unwrap();
        assert_eq!(first, second);
    }
}
