// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Services
//!
//! Stateless business operations: cost modeling, domain detection, engine
//! auto-selection, and recommendation fusion, plus the transfer-engine port
//! implemented by the infrastructure adapters.

pub mod cost_model;
pub mod datetime_serde;
pub mod domain_detection;
pub mod engine_selection;
pub mod recommendation_service;
pub mod transfer_engine;

pub use cost_model::{CostCalculator, CostScenario, MonthlyCosts, RateTable, ScenarioParams, StorageClass};
pub use engine_selection::{rank_engines, EngineCandidate};
pub use recommendation_service::{
    CostAnalysis, ImpactEstimate, OptimizationSuggestion, Recommendation, RecommendationService, SuggestionKind,
    ToolRecommendation,
};
pub use transfer_engine::{EngineCapabilities, EngineKind, TransferEngine};
