// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Prometheus registry for operational metrics: workflow lifecycle
//! counters, transfer volume, active-execution and speed gauges, and a
//! per-step-type duration histogram. The workflow engine and the transfer
//! path update these; `export` renders the text exposition format for
//! scraping or the `diagnose` command.

use prometheus::{Gauge, HistogramOpts, HistogramVec, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use datamover_domain::{MoverError, StepKind, TransferResult};

/// Prometheus metrics for the datamover.
pub struct MetricsService {
    registry: Registry,
    workflows_started: IntCounter,
    workflows_completed: IntCounter,
    workflows_failed: IntCounter,
    workflows_cancelled: IntCounter,
    bytes_transferred: IntCounter,
    files_transferred: IntCounter,
    active_executions: IntGauge,
    transfer_speed_bps: Gauge,
    step_duration_seconds: HistogramVec,
}

impl MetricsService {
    pub fn new() -> Result<Self, MoverError> {
        let registry = Registry::new();

        let workflows_started =
            IntCounter::with_opts(Opts::new("datamover_workflows_started_total", "Workflow executions started"))
                .map_err(metric_err)?;
        let workflows_completed = IntCounter::with_opts(Opts::new(
            "datamover_workflows_completed_total",
            "Workflow executions completed successfully",
        ))
        .map_err(metric_err)?;
        let workflows_failed =
            IntCounter::with_opts(Opts::new("datamover_workflows_failed_total", "Workflow executions failed"))
                .map_err(metric_err)?;
        let workflows_cancelled = IntCounter::with_opts(Opts::new(
            "datamover_workflows_cancelled_total",
            "Workflow executions cancelled",
        ))
        .map_err(metric_err)?;
        let bytes_transferred =
            IntCounter::with_opts(Opts::new("datamover_bytes_transferred_total", "Bytes moved by transfers"))
                .map_err(metric_err)?;
        let files_transferred =
            IntCounter::with_opts(Opts::new("datamover_files_transferred_total", "Files moved by transfers"))
                .map_err(metric_err)?;
        let active_executions =
            IntGauge::with_opts(Opts::new("datamover_active_executions", "Currently running executions"))
                .map_err(metric_err)?;
        let transfer_speed_bps = Gauge::with_opts(Opts::new(
            "datamover_transfer_speed_bps",
            "Most recent transfer speed estimate in bytes per second",
        ))
        .map_err(metric_err)?;
        let step_duration_seconds = HistogramVec::new(
            HistogramOpts::new("datamover_step_duration_seconds", "Workflow step duration").buckets(vec![
                0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0, 7200.0,
            ]),
            &["step_type"],
        )
        .map_err(metric_err)?;

        for metric in [
            Box::new(workflows_started.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(workflows_completed.clone()),
            Box::new(workflows_failed.clone()),
            Box::new(workflows_cancelled.clone()),
            Box::new(bytes_transferred.clone()),
            Box::new(files_transferred.clone()),
            Box::new(active_executions.clone()),
            Box::new(transfer_speed_bps.clone()),
            Box::new(step_duration_seconds.clone()),
        ] {
            registry.register(metric).map_err(metric_err)?;
        }

        Ok(Self {
            registry,
            workflows_started,
            workflows_completed,
            workflows_failed,
            workflows_cancelled,
            bytes_transferred,
            files_transferred,
            active_executions,
            transfer_speed_bps,
            step_duration_seconds,
        })
    }

    pub fn workflow_started(&self) {
        self.workflows_started.inc();
        self.active_executions.inc();
    }

    pub fn workflow_completed(&self) {
        self.workflows_completed.inc();
        self.active_executions.dec();
    }

    pub fn workflow_failed(&self) {
        self.workflows_failed.inc();
        self.active_executions.dec();
    }

    pub fn workflow_cancelled(&self) {
        self.workflows_cancelled.inc();
        self.active_executions.dec();
    }

    /// Folds a terminal transfer result into the volume counters.
    pub fn record_transfer(&self, result: &TransferResult) {
        self.bytes_transferred.inc_by(result.bytes_transferred);
        self.files_transferred.inc_by(result.files_transferred);
    }

    pub fn record_speed(&self, bytes_per_second: f64) {
        self.transfer_speed_bps.set(bytes_per_second);
    }

    pub fn observe_step_duration(&self, step_type: StepKind, seconds: f64) {
        self.step_duration_seconds
            .with_label_values(&[step_type.as_str()])
            .observe(seconds);
    }

    /// Prometheus text exposition of all registered metrics.
    pub fn export(&self) -> Result<String, MoverError> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(metric_err)
    }
}

fn metric_err(e: prometheus::Error) -> MoverError {
    MoverError::InternalError(format!("metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datamover_domain::{EngineKind, TransferId};
    use std::time::Duration;

    /// Tests lifecycle counters and the active gauge stay consistent.
    #[test]
    fn test_lifecycle_counters() {
        let metrics = MetricsService::new().unwrap();
        metrics.workflow_started();
        metrics.workflow_started();
        metrics.workflow_completed();
        metrics.workflow_failed();

        let export = metrics.export().unwrap();
        assert!(export.contains("datamover_workflows_started_total 2"));
        assert!(export.contains("datamover_workflows_completed_total 1"));
        assert!(export.contains("datamover_workflows_failed_total 1"));
        assert!(export.contains("datamover_active_executions 0"));
    }

    /// Tests transfer volume accounting and step histograms appear in the
    /// export.
    #[test]
    fn test_transfer_accounting() {
        let metrics = MetricsService::new().unwrap();
        let result = TransferResult::succeeded(
            TransferId::new(),
            EngineKind::BulkParallel,
            4096,
            7,
            Duration::from_secs(2),
        );
        metrics.record_transfer(&result);
        metrics.observe_step_duration(StepKind::Transfer, 2.0);

        let export = metrics.export().unwrap();
        assert!(export.contains("datamover_bytes_transferred_total 4096"));
        assert!(export.contains("datamover_files_transferred_total 7"));
        assert!(export.contains("step_type=\"transfer\""));
    }
}
