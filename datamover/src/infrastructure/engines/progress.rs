// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shared Transfer Progress
//!
//! Single-writer / many-reader progress cell for live transfers. The
//! adapter owning a transfer holds the [`ProgressTracker`] (the writer);
//! the UI, logs, and the workflow engine's poller read snapshots through
//! cloned [`ProgressCell`] handles. Readers take a short read lock; the
//! writer never blocks on readers for long because snapshots are
//! copy-out.
//!
//! ## Update contract
//!
//! - `bytes_transferred` is monotone within one attempt; regressions from
//!   noisy subprocess output are ignored. A retry calls
//!   [`ProgressTracker::reset_for_retry`] to start a new monotone sequence.
//! - The cell is refreshed at least every 2 seconds or every 16 MiB,
//!   whichever comes first.
//! - Speed is an EWMA over a 10-second window; ETA is
//!   `remaining / max(speed, ε)` and absent while speed is undetermined.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

use datamover_domain::{TransferId, TransferProgress};

/// Update cadence: maximum time between cell refreshes.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(2);

/// Update cadence: maximum bytes between cell refreshes (16 MiB).
pub const UPDATE_BYTES: u64 = 16 * 1024 * 1024;

/// EWMA window for the speed estimate.
const SPEED_WINDOW: Duration = Duration::from_secs(10);

/// Readable handle onto a live transfer's progress.
#[derive(Clone)]
pub struct ProgressCell {
    inner: Arc<RwLock<TransferProgress>>,
}

impl ProgressCell {
    pub fn new(transfer_id: TransferId) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TransferProgress::new(transfer_id))),
        }
    }

    /// Copy-out snapshot; safe to call from any thread at any rate.
    pub fn snapshot(&self) -> TransferProgress {
        self.inner.read().clone()
    }
}

/// EWMA speed estimator over observed byte counters.
struct SpeedEstimator {
    last_observation: Option<(Instant, u64)>,
    ewma_bps: Option<f64>,
}

impl SpeedEstimator {
    fn new() -> Self {
        Self {
            last_observation: None,
            ewma_bps: None,
        }
    }

    /// Folds a new total-bytes observation into the estimate.
    fn observe(&mut self, now: Instant, total_bytes: u64) -> Option<f64> {
        if let Some((then, bytes_then)) = self.last_observation {
            let dt = now.duration_since(then).as_secs_f64();
            if dt > 0.0 && total_bytes >= bytes_then {
                let instantaneous = (total_bytes - bytes_then) as f64 / dt;
                let alpha = (dt / SPEED_WINDOW.as_secs_f64()).clamp(0.0, 1.0);
                self.ewma_bps = Some(match self.ewma_bps {
                    Some(previous) => previous + alpha * (instantaneous - previous),
                    None => instantaneous,
                });
            }
        }
        self.last_observation = Some((now, total_bytes));
        self.ewma_bps
    }

    fn reset(&mut self) {
        self.last_observation = None;
        self.ewma_bps = None;
    }
}

/// Writer half of a progress cell; owned by the transfer adapter.
pub struct ProgressTracker {
    cell: ProgressCell,
    estimator: SpeedEstimator,
    last_flush: Instant,
    last_flush_bytes: u64,
    bytes: u64,
    files_done: u64,
}

impl ProgressTracker {
    pub fn new(transfer_id: TransferId, bytes_total: Option<u64>, files_total: Option<u64>) -> Self {
        let cell = ProgressCell::new(transfer_id);
        {
            let mut progress = cell.inner.write();
            progress.bytes_total = bytes_total;
            progress.files_total = files_total;
        }
        Self {
            cell,
            estimator: SpeedEstimator::new(),
            last_flush: Instant::now(),
            last_flush_bytes: 0,
            bytes: 0,
            files_done: 0,
        }
    }

    /// Reader handle to hand out.
    pub fn cell(&self) -> ProgressCell {
        self.cell.clone()
    }

    /// Records an absolute byte counter; regressions are ignored so the
    /// sequence stays monotone within the attempt.
    pub fn record_bytes(&mut self, total_bytes: u64) {
        if total_bytes > self.bytes {
            self.bytes = total_bytes;
        }
        self.maybe_flush(false);
    }

    /// Records completion of one more file.
    pub fn record_file_done(&mut self) {
        self.files_done += 1;
        self.maybe_flush(false);
    }

    /// Adds a byte delta (for adapters that report increments).
    pub fn add_bytes(&mut self, delta: u64) {
        self.bytes += delta;
        self.maybe_flush(false);
    }

    /// Forces a cell refresh regardless of cadence.
    pub fn flush(&mut self) {
        self.maybe_flush(true);
    }

    /// Starts a new monotone sequence for a retry attempt.
    pub fn reset_for_retry(&mut self) {
        self.bytes = 0;
        self.files_done = 0;
        self.estimator.reset();
        let mut progress = self.cell.inner.write();
        progress.bytes_transferred = 0;
        progress.files_done = 0;
        progress.current_speed_bps = None;
        progress.eta_seconds = None;
        progress.recompute_percentage();
        progress.last_update = Utc::now();
        self.last_flush = Instant::now();
        self.last_flush_bytes = 0;
    }

    fn maybe_flush(&mut self, force: bool) {
        let now = Instant::now();
        let due_by_time = now.duration_since(self.last_flush) >= UPDATE_INTERVAL;
        let due_by_bytes = self.bytes.saturating_sub(self.last_flush_bytes) >= UPDATE_BYTES;
        if !(force || due_by_time || due_by_bytes) {
            return;
        }

        let speed = self.estimator.observe(now, self.bytes);
        let mut progress = self.cell.inner.write();
        // Writer-side monotonicity guard; the cell never goes backwards
        // within an attempt even if call order is surprising.
        if self.bytes > progress.bytes_transferred {
            progress.bytes_transferred = self.bytes;
        }
        progress.files_done = self.files_done.max(progress.files_done);
        progress.current_speed_bps = speed;
        progress.eta_seconds = match (speed, progress.bytes_total) {
            (Some(bps), Some(total)) if bps > f64::EPSILON && total >= progress.bytes_transferred => {
                Some(((total - progress.bytes_transferred) as f64 / bps).round() as u64)
            }
            _ => None,
        };
        progress.recompute_percentage();
        progress.last_update = Utc::now();
        drop(progress);

        self.last_flush = now;
        self.last_flush_bytes = self.bytes;
    }
}
