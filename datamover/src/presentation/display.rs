// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Display Helpers
//!
//! Human-readable rendering of the core data structures for the CLI.
//! Monetary values are rounded to two decimals here and nowhere else.

use byte_unit::{Byte, UnitType};

use datamover_domain::{
    CostScenario, DataPattern, Recommendation, RecoveryPlan, ValidationReport, WorkflowExecution,
};

use crate::application::services::workflow_engine::{ExecutionPlan, ExecutionSummary};
use crate::application::use_cases::diagnose::DiagnosticReport;

/// Binary-unit byte formatting ("3.81 MiB").
pub fn format_bytes(bytes: u64) -> String {
    format!("{:.2}", Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary))
}

/// Two-decimal USD formatting; presentation is the only rounding point.
pub fn format_usd(amount: f64) -> String {
    format!("${:.2}", amount)
}

pub fn render_pattern(pattern: &DataPattern) -> String {
    let mut out = String::new();
    out.push_str(&format!("Source: {}\n", pattern.source_path));
    out.push_str(&format!(
        "Files: {}  Total: {}  Median: {}\n",
        pattern.total_files,
        format_bytes(pattern.total_size_bytes),
        format_bytes(pattern.median_file_size_bytes),
    ));
    out.push_str(&format!(
        "Small files (<=1 MiB): {} ({:.1}%)\n",
        pattern.file_sizes.under_1_mib, pattern.file_sizes.small_file_percentage
    ));
    if !pattern.domain_hints.detected_domains.is_empty() {
        let domains: Vec<String> = pattern
            .domain_hints
            .detected_domains
            .iter()
            .map(|d| {
                format!(
                    "{} ({:.0}%)",
                    d,
                    pattern.domain_hints.confidence.get(d).copied().unwrap_or(0.0) * 100.0
                )
            })
            .collect();
        out.push_str(&format!("Detected domains: {}\n", domains.join(", ")));
    }
    out.push_str("Top file types:\n");
    let mut types: Vec<_> = pattern.file_types.iter().collect();
    types.sort_by(|a, b| b.1.total_size.cmp(&a.1.total_size));
    for (ext, stats) in types.into_iter().take(8) {
        let label = if ext.is_empty() { "(none)" } else { ext };
        out.push_str(&format!(
            "  .{:<12} {:>8} files  {}\n",
            label,
            stats.count,
            format_bytes(stats.total_size)
        ));
    }
    out.push_str(&format!(
        "Estimated bundles at 256 MiB: {}  (potential monthly saving {})\n",
        pattern.efficiency.estimated_bundles,
        format_usd(pattern.efficiency.bundling_cost_savings)
    ));
    out
}

pub fn render_scenarios(scenarios: &[CostScenario]) -> String {
    let mut out = String::from("Cost scenarios (monthly):\n");
    for scenario in scenarios {
        out.push_str(&format!(
            "  {:<28} storage {:>9}  requests {:>9}  transfer {:>9}  total {:>9}\n",
            scenario.name,
            format_usd(scenario.monthly_costs.storage),
            format_usd(scenario.monthly_costs.requests),
            format_usd(scenario.monthly_costs.transfer),
            format_usd(scenario.monthly_costs.total),
        ));
    }
    out
}

pub fn render_recommendation(recommendation: &Recommendation) -> String {
    let mut out = String::new();
    out.push_str("Tool recommendations:\n");
    for tool in &recommendation.tool_recommendations {
        out.push_str(&format!(
            "  {:<18} -> {:<18} ({:.0}% confidence) {}\n",
            tool.task,
            tool.recommended_tool.to_string(),
            tool.confidence * 100.0,
            tool.reasoning
        ));
    }
    out.push_str("Suggestions (best first):\n");
    for (rank, suggestion) in recommendation.optimization_suggestions.iter().enumerate() {
        out.push_str(&format!(
            "  {}. [{}] {} (saves {}/month)\n",
            rank + 1,
            suggestion.kind.as_str(),
            suggestion.description,
            format_usd(suggestion.impact.cost_savings_monthly)
        ));
    }
    out.push_str(&render_scenarios(&recommendation.cost_analysis.scenarios));
    out.push_str(&format!(
        "Potential savings: {}/month\n",
        format_usd(recommendation.cost_analysis.potential_savings)
    ));
    out
}

pub fn render_validation(report: &ValidationReport) -> String {
    let mut out = String::new();
    if report.is_valid() {
        out.push_str("Configuration is valid.\n");
    } else {
        out.push_str(&format!("Configuration has {} error(s):\n", report.errors.len()));
        for error in &report.errors {
            out.push_str(&format!("  error: {}\n", error));
        }
    }
    for warning in &report.warnings {
        out.push_str(&format!("  warning: {}\n", warning));
    }
    for suggestion in &report.suggestions {
        out.push_str(&format!("  suggestion: {}\n", suggestion));
    }
    out
}

pub fn render_execution(execution: &WorkflowExecution) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Execution {}  workflow '{}'  state {}  progress {:.1}%\n",
        execution.id,
        execution.workflow_name,
        execution.state,
        execution.progress * 100.0
    ));
    if let Some(ref error) = execution.error {
        out.push_str(&format!("  error: {}\n", error));
    }
    if execution.partial_success {
        out.push_str("  partial success: some files failed\n");
    }
    out.push_str("Steps:\n");
    for (index, step) in execution.steps.iter().enumerate() {
        let duration = step
            .duration_ms
            .map(|ms| format!(" ({:.1}s)", ms as f64 / 1000.0))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {}. {:<20} {:<9} attempts={}{}\n",
            index + 1,
            step.name,
            format!("{:?}", step.status).to_lowercase(),
            step.attempts,
            duration
        ));
    }
    out
}

pub fn render_summaries(summaries: &[ExecutionSummary]) -> String {
    if summaries.is_empty() {
        return "No active executions.\n".to_string();
    }
    let mut out = String::from("Active executions:\n");
    for summary in summaries {
        out.push_str(&format!(
            "  {}  {:<24} {:<9} {:.1}%\n",
            summary.id,
            summary.workflow_name,
            summary.state.to_string(),
            summary.progress * 100.0
        ));
    }
    out
}

pub fn render_plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Dry run for workflow '{}' ({} steps, ~{:.0}s estimated):\n",
        plan.workflow_name,
        plan.steps.len(),
        plan.estimated_total_secs
    ));
    for (index, step) in plan.steps.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {:<20} [{}] weight {:.2}  ~{:.0}s\n",
            index + 1,
            step.name,
            step.step_type,
            step.weight,
            step.estimated_duration_secs
        ));
    }
    if !plan.cost_scenarios.is_empty() {
        out.push_str(&render_scenarios(&plan.cost_scenarios));
    }
    out
}

pub fn render_recovery_plan(plan: &RecoveryPlan, executed: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Recovery strategy: {}  risk: {}  recommended: {}\n",
        plan.strategy, plan.risk, plan.recommended
    ));
    for note in &plan.notes {
        out.push_str(&format!("  note: {}\n", note));
    }
    out.push_str("Plan:\n");
    for (index, step) in plan.steps.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", index + 1, step));
    }
    out.push_str(if executed {
        "Recovery started.\n"
    } else {
        "Plan not executed.\n"
    });
    out
}

pub fn render_diagnostics(report: &DiagnosticReport) -> String {
    let mut out = String::from("Diagnostics:\n");
    for check in &report.checks {
        out.push_str(&format!("  [{:?}] {:<22} {}\n", check.status, check.name, check.detail));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests byte and USD formatting rules.
    #[test]
    fn test_formatting() {
        assert_eq!(format_usd(1.005), "$1.00");
        assert_eq!(format_usd(0.0), "$0.00");
        assert!(format_bytes(4 * 1024 * 1024).contains("MiB"));
        assert!(format_bytes(10).contains("B"));
    }

    /// Tests pattern rendering stays panic-free for an empty pattern.
    #[test]
    fn test_render_empty_pattern() {
        let pattern = DataPattern::new("/empty");
        let rendered = render_pattern(&pattern);
        assert!(rendered.contains("/empty"));
        assert!(rendered.contains("Files: 0"));
    }
}
