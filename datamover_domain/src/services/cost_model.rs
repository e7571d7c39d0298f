// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cost Model
//!
//! Object-store pricing model: given a [`DataPattern`] and scenario
//! parameters, computes monthly storage, request, and transfer costs. The
//! calculator is a pure function of its inputs and an embedded rate table
//! that is replaceable at construction (for price updates or private
//! endpoints with negotiated rates).
//!
//! ## Default scenarios
//!
//! 1. **current**: every object at the requested class, one PUT per file.
//! 2. **bundled**: PUTs collapse to bundle count + large-file count;
//!    storage unchanged.
//! 3. **bundled+tiered**: bundled, plus a cold fraction (default 0.5)
//!    lifecycled to the infrequent-access class.
//! 4. **bundled+tiered+compressed**: storage bytes additionally scaled by
//!    the domain profile's compression ratio.
//!
//! Monetary arithmetic stays in f64 USD; rounding to two decimals happens
//! only at presentation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::entities::data_pattern::{DataPattern, DEFAULT_BUNDLE_TARGET};
use crate::entities::domain_profile::DomainProfile;
use crate::MoverError;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Object storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Standard,
    InfrequentAccess,
    Archive,
    DeepArchive,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "standard",
            StorageClass::InfrequentAccess => "infrequent_access",
            StorageClass::Archive => "archive",
            StorageClass::DeepArchive => "deep_archive",
        }
    }

    /// Next cheaper class a lifecycle rule would move cold objects to.
    pub fn colder(&self) -> StorageClass {
        match self {
            StorageClass::Standard => StorageClass::InfrequentAccess,
            StorageClass::InfrequentAccess => StorageClass::Archive,
            StorageClass::Archive | StorageClass::DeepArchive => StorageClass::DeepArchive,
        }
    }
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = MoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(StorageClass::Standard),
            "infrequent_access" | "ia" => Ok(StorageClass::InfrequentAccess),
            "archive" | "glacier" => Ok(StorageClass::Archive),
            "deep_archive" => Ok(StorageClass::DeepArchive),
            other => Err(MoverError::InvalidConfiguration(format!(
                "Unknown storage class '{}'",
                other
            ))),
        }
    }
}

/// Unit prices for one (region, class) cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageRates {
    pub storage_usd_per_gib_month: f64,
    pub put_usd_per_1k: f64,
    pub get_usd_per_1k: f64,
    pub egress_usd_per_gib: f64,
}

/// Region the rate table falls back to for unlisted regions.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Per-region, per-class price table.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<String, BTreeMap<StorageClass, StorageRates>>,
}

impl RateTable {
    pub fn new(rates: BTreeMap<String, BTreeMap<StorageClass, StorageRates>>) -> Self {
        Self { rates }
    }

    /// Embedded default rates for the supported regions.
    pub fn embedded_default() -> Self {
        fn region(multiplier: f64) -> BTreeMap<StorageClass, StorageRates> {
            let mut classes = BTreeMap::new();
            classes.insert(
                StorageClass::Standard,
                StorageRates {
                    storage_usd_per_gib_month: 0.023 * multiplier,
                    put_usd_per_1k: 0.005,
                    get_usd_per_1k: 0.0004,
                    egress_usd_per_gib: 0.09,
                },
            );
            classes.insert(
                StorageClass::InfrequentAccess,
                StorageRates {
                    storage_usd_per_gib_month: 0.0125 * multiplier,
                    put_usd_per_1k: 0.01,
                    get_usd_per_1k: 0.001,
                    egress_usd_per_gib: 0.09,
                },
            );
            classes.insert(
                StorageClass::Archive,
                StorageRates {
                    storage_usd_per_gib_month: 0.0036 * multiplier,
                    put_usd_per_1k: 0.03,
                    get_usd_per_1k: 0.01,
                    egress_usd_per_gib: 0.09,
                },
            );
            classes.insert(
                StorageClass::DeepArchive,
                StorageRates {
                    storage_usd_per_gib_month: 0.00099 * multiplier,
                    put_usd_per_1k: 0.05,
                    get_usd_per_1k: 0.02,
                    egress_usd_per_gib: 0.09,
                },
            );
            classes
        }

        let mut rates = BTreeMap::new();
        rates.insert("us-east-1".to_string(), region(1.0));
        rates.insert("us-west-2".to_string(), region(1.0));
        rates.insert("eu-west-1".to_string(), region(1.05));
        rates.insert("ap-southeast-2".to_string(), region(1.1));
        Self { rates }
    }

    /// Looks up rates, falling back to the default region for unlisted
    /// ones.
    pub fn lookup(&self, region: &str, class: StorageClass) -> Result<StorageRates, MoverError> {
        let region_rates = self
            .rates
            .get(region)
            .or_else(|| self.rates.get(DEFAULT_REGION))
            .ok_or_else(|| MoverError::InvalidConfiguration(format!("rate table has no region '{}'", region)))?;
        region_rates
            .get(&class)
            .copied()
            .ok_or_else(|| MoverError::InvalidConfiguration(format!("rate table has no class '{}'", class)))
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::embedded_default()
    }
}

/// Inputs for one cost scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub name: String,
    pub region: String,
    pub storage_class: StorageClass,
    /// Collapse small-file PUTs into bundle PUTs.
    pub bundled: bool,
    /// Fraction of bytes lifecycled to the colder class; `None` disables
    /// tiering.
    pub cold_fraction: Option<f64>,
    /// Storage divisor from compression (1.0 = none).
    pub compression_ratio: f64,
    /// Monthly GET requests per stored object.
    pub requests_per_object_month: f64,
    /// Monthly egress in GiB.
    pub egress_gib_month: f64,
}

impl ScenarioParams {
    pub fn current(region: impl Into<String>, class: StorageClass) -> Self {
        Self {
            name: "current".to_string(),
            region: region.into(),
            storage_class: class,
            bundled: false,
            cold_fraction: None,
            compression_ratio: 1.0,
            requests_per_object_month: 0.1,
            egress_gib_month: 0.0,
        }
    }
}

/// Monthly cost breakdown in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCosts {
    pub storage: f64,
    pub requests: f64,
    pub transfer: f64,
    pub total: f64,
}

/// One evaluated scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostScenario {
    pub name: String,
    pub monthly_costs: MonthlyCosts,
    pub assumptions: Vec<String>,
}

/// Pure pricing engine over a replaceable rate table.
#[derive(Debug, Clone)]
pub struct CostCalculator {
    table: RateTable,
}

impl CostCalculator {
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }

    pub fn with_default_rates() -> Self {
        Self::new(RateTable::embedded_default())
    }

    /// Object count a scenario stores (bundling collapses small files).
    fn object_count(pattern: &DataPattern, bundled: bool) -> u64 {
        if bundled {
            pattern.estimated_bundles(DEFAULT_BUNDLE_TARGET) + pattern.large_file_count()
        } else {
            pattern.total_files
        }
    }

    /// Evaluates one scenario for a pattern.
    pub fn scenario(&self, pattern: &DataPattern, params: &ScenarioParams) -> Result<CostScenario, MoverError> {
        if params.compression_ratio < 1.0 {
            return Err(MoverError::InvalidConfiguration(format!(
                "compression ratio {} must be >= 1.0",
                params.compression_ratio
            )));
        }
        let rates = self.table.lookup(&params.region, params.storage_class)?;
        let mut assumptions = Vec::new();

        let stored_gib = (pattern.total_size_bytes as f64 / GIB) / params.compression_ratio;
        if params.compression_ratio > 1.0 {
            assumptions.push(format!("compression ratio {:.2}", params.compression_ratio));
        }

        let storage = match params.cold_fraction {
            Some(fraction) => {
                let fraction = fraction.clamp(0.0, 1.0);
                let colder = self.table.lookup(&params.region, params.storage_class.colder())?;
                assumptions.push(format!(
                    "{:.0}% of bytes lifecycled to {}",
                    fraction * 100.0,
                    params.storage_class.colder()
                ));
                stored_gib * (1.0 - fraction) * rates.storage_usd_per_gib_month
                    + stored_gib * fraction * colder.storage_usd_per_gib_month
            }
            None => stored_gib * rates.storage_usd_per_gib_month,
        };

        let objects = Self::object_count(pattern, params.bundled);
        if params.bundled {
            assumptions.push(format!(
                "{} small files packed into {} bundles",
                pattern.file_sizes.under_1_mib,
                pattern.estimated_bundles(DEFAULT_BUNDLE_TARGET)
            ));
        }
        let put_cost = (objects as f64 / 1000.0) * rates.put_usd_per_1k;
        let get_cost = (objects as f64 * params.requests_per_object_month / 1000.0) * rates.get_usd_per_1k;
        let requests = put_cost + get_cost;

        let transfer = params.egress_gib_month * rates.egress_usd_per_gib;

        Ok(CostScenario {
            name: params.name.clone(),
            monthly_costs: MonthlyCosts {
                storage,
                requests,
                transfer,
                total: storage + requests + transfer,
            },
            assumptions,
        })
    }

    /// Evaluates the four default scenarios for a pattern.
    pub fn default_scenarios(
        &self,
        pattern: &DataPattern,
        profile: Option<&DomainProfile>,
        region: &str,
        class: StorageClass,
    ) -> Result<Vec<CostScenario>, MoverError> {
        // Media-heavy trees are treated as incompressible; anything else
        // gets the generic text-ish default.
        let compression_ratio = profile
            .map(|p| p.typical_compression_ratio(1.3))
            .unwrap_or(1.3)
            .max(1.0);

        let current = ScenarioParams::current(region, class);
        let bundled = ScenarioParams {
            name: "bundled".to_string(),
            bundled: true,
            ..current.clone()
        };
        let tiered = ScenarioParams {
            name: "bundled+tiered".to_string(),
            bundled: true,
            cold_fraction: Some(0.5),
            ..current.clone()
        };
        let compressed = ScenarioParams {
            name: "bundled+tiered+compressed".to_string(),
            bundled: true,
            cold_fraction: Some(0.5),
            compression_ratio,
            ..current.clone()
        };

        Ok(vec![
            self.scenario(pattern, &current)?,
            self.scenario(pattern, &bundled)?,
            self.scenario(pattern, &tiered)?,
            self.scenario(pattern, &compressed)?,
        ])
    }

    /// Spread between the most and least expensive scenario; never
    /// negative.
    pub fn potential_savings(scenarios: &[CostScenario]) -> f64 {
        let totals: Vec<f64> = scenarios
            .iter()
            .map(|s| s.monthly_costs.total)
            .filter(|t| t.is_finite())
            .collect();
        match (
            totals.iter().cloned().fold(f64::INFINITY, f64::min),
            totals.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ) {
            (min, max) if min.is_finite() && max.is_finite() => (max - min).max(0.0),
            _ => 0.0,
        }
    }

    /// Monthly saving of the bundled scenario over the naive one.
    pub fn bundling_savings(
        &self,
        pattern: &DataPattern,
        region: &str,
        class: StorageClass,
    ) -> Result<f64, MoverError> {
        let current = self.scenario(pattern, &ScenarioParams::current(region, class))?;
        let bundled = self.scenario(
            pattern,
            &ScenarioParams {
                name: "bundled".to_string(),
                bundled: true,
                ..ScenarioParams::current(region, class)
            },
        )?;
        Ok((current.monthly_costs.total - bundled.monthly_costs.total).max(0.0))
    }

    /// Monthly saving of lifecycling half the bytes to the colder class.
    pub fn tiering_savings(&self, pattern: &DataPattern, region: &str, class: StorageClass) -> Result<f64, MoverError> {
        let flat = self.scenario(pattern, &ScenarioParams::current(region, class))?;
        let tiered = self.scenario(
            pattern,
            &ScenarioParams {
                name: "tiered".to_string(),
                cold_fraction: Some(0.5),
                ..ScenarioParams::current(region, class)
            },
        )?;
        Ok((flat.monthly_costs.storage - tiered.monthly_costs.storage).max(0.0))
    }
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::with_default_rates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

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
        pattern
    }

    /// Tests that bundling strictly reduces request costs for a PUT-heavy
    /// small-file tree (scenario S1's cost claim).
    #[test]
    fn test_bundled_cheaper_for_small_files() {
        let calculator = CostCalculator::with_default_rates();
        let pattern = small_file_pattern(10_000, 4 * 1024);

        let scenarios = calculator
            .default_scenarios(&pattern, None, "us-east-1", StorageClass::Standard)
            .unwrap();
        let current = &scenarios[0];
        let bundled = &scenarios[1];
        assert!(bundled.monthly_costs.total < current.monthly_costs.total);
        assert!(bundled.monthly_costs.requests < current.monthly_costs.requests);

        let savings = calculator
            .bundling_savings(&pattern, "us-east-1", StorageClass::Standard)
            .unwrap();
        assert!(savings > 0.0);
    }

    /// Tests the tiered scenario stores cold bytes at the colder rate.
    #[test]
    fn test_tiering_reduces_storage() {
        let calculator = CostCalculator::with_default_rates();
        let pattern = small_file_pattern(100, 1024 * 1024);

        let flat = calculator
            .scenario(&pattern, &ScenarioParams::current("us-east-1", StorageClass::Standard))
            .unwrap();
        let tiered = calculator
            .scenario(
                &pattern,
                &ScenarioParams {
                    name: "tiered".to_string(),
                    cold_fraction: Some(0.5),
                    ..ScenarioParams::current("us-east-1", StorageClass::Standard)
                },
            )
            .unwrap();
        assert!(tiered.monthly_costs.storage < flat.monthly_costs.storage);
    }

    /// Tests unknown regions fall back to the default region instead of
    /// failing.
    #[test]
    fn test_unknown_region_fallback() {
        let table = RateTable::embedded_default();
        let fallback = table.lookup("mars-north-1", StorageClass::Standard).unwrap();
        let default = table.lookup(DEFAULT_REGION, StorageClass::Standard).unwrap();
        assert_eq!(fallback, default);
    }

    /// Tests savings are clamped to zero and compression ratios below 1
    /// are rejected.
    #[test]
    fn test_guard_rails() {
        let calculator = CostCalculator::with_default_rates();
        let pattern = small_file_pattern(10, 512);
        assert!(calculator
            .scenario(
                &pattern,
                &ScenarioParams {
                    compression_ratio: 0.5,
                    ..ScenarioParams::current("us-east-1", StorageClass::Standard)
                },
            )
            .is_err());

        assert_eq!(CostCalculator::potential_savings(&[]), 0.0);
    }

    proptest! {
        /// Property: scaling a pattern's bytes by k > 1 never decreases
        /// storage cost.
        #[test]
        fn prop_storage_cost_monotone(
            files in 1u64..500,
            size in 1u64..1_000_000,
            k in 2u64..8,
        ) {
            let calculator = CostCalculator::with_default_rates();
            let base = small_file_pattern(files, size);
            let scaled = small_file_pattern(files, size * k);
            let params = ScenarioParams::current("us-east-1", StorageClass::Standard);

            let base_cost = calculator.scenario(&base, &params).unwrap();
            let scaled_cost = calculator.scenario(&scaled, &params).unwrap();
            prop_assert!(scaled_cost.monthly_costs.storage >= base_cost.monthly_costs.storage);
        }

        /// Property: potential savings across the default scenarios are
        /// never negative.
        #[test]
        fn prop_savings_non_negative(files in 0u64..300, size in 0u64..2_000_000) {
            let calculator = CostCalculator::with_default_rates();
            let pattern = small_file_pattern(files, size);
            let scenarios = calculator
                .default_scenarios(&pattern, None, "us-east-1", StorageClass::Standard)
                .unwrap();
            prop_assert!(CostCalculator::potential_savings(&scenarios) >= 0.0);
        }
    }
}
