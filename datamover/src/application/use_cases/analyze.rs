// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Analyze Use Case
//!
//! Runs the pattern analyzer over a path and, on request, fuses the
//! result with the domain profile and cost model into a recommendation.
//! This is the `datamover analyze` entry point and the first step of
//! every workflow execution.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use datamover_bootstrap::shutdown::CancellationToken;
use datamover_domain::services::cost_model::StorageClass;
use datamover_domain::{CostCalculator, DataPattern, MoverError, Recommendation, RecommendationService};

use crate::infrastructure::analysis::PatternAnalyzer;
use crate::infrastructure::profiles;

/// Region assumed when the caller did not name a destination.
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub path: PathBuf,
    pub domain_hint: Option<String>,
    pub with_recommendation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub pattern: DataPattern,
    pub recommendation: Option<Recommendation>,
}

/// Analyzes `request.path`, optionally producing recommendations.
pub async fn run(
    analyzer: &PatternAnalyzer,
    request: &AnalyzeRequest,
    cancel: &CancellationToken,
) -> Result<AnalysisOutcome, MoverError> {
    let pattern = analyzer
        .analyze(&request.path, request.domain_hint.as_deref(), cancel)
        .await?;

    let recommendation = if request.with_recommendation {
        let domain = request
            .domain_hint
            .clone()
            .or_else(|| pattern.domain_hints.primary().map(str::to_string));
        let profile = profiles::profile_for(domain.as_deref(), pattern.small_file_fraction());
        let service = RecommendationService::new(CostCalculator::with_default_rates());
        Some(service.recommend(&pattern, Some(&profile), DEFAULT_REGION, StorageClass::Standard)?)
    } else {
        None
    };

    Ok(AnalysisOutcome { pattern, recommendation })
}
