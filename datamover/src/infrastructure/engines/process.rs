// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Subprocess Discipline
//!
//! Scoped lifecycle management for the external transfer executables. Every
//! child process gets:
//!
//! - a dedicated temporary working directory, removed when the process
//!   handle is dropped;
//! - stdout handed to the adapter line by line for progress parsing;
//! - stderr drained into a bounded ring buffer whose tail is attached to
//!   error records;
//! - terminate-then-kill cancellation: a polite terminate request, a grace
//!   period (10 s), then a forced kill;
//! - `kill_on_drop`, so no exit path (normal, error, cancel, panic) leaves
//!   an orphan.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

use datamover_bootstrap::platform;
use datamover_domain::MoverError;

/// Lines of subprocess output retained for error context.
pub const RING_CAPACITY: usize = 200;

/// Bounded buffer of the most recent output lines.
pub struct OutputRingBuffer {
    capacity: usize,
    lines: VecDeque<String>,
}

impl OutputRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Joined tail, newest last.
    pub fn tail(&self, max_lines: usize) -> String {
        let skip = self.lines.len().saturating_sub(max_lines);
        self.lines.iter().skip(skip).cloned().collect::<Vec<_>>().join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A supervised child process.
pub struct ManagedProcess {
    child: Child,
    program: String,
    ring: Arc<Mutex<OutputRingBuffer>>,
    // Held for its Drop; the child's scratch space disappears with the
    // handle.
    _workdir: tempfile::TempDir,
}

impl ManagedProcess {
    /// Spawns `program` with `args` in a fresh working directory.
    ///
    /// # Errors
    ///
    /// `MoverError::EngineUnavailable` when the executable cannot be
    /// spawned.
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self, MoverError> {
        let workdir = tempfile::TempDir::new().map_err(MoverError::from)?;
        let program_name = program.display().to_string();

        let mut child = Command::new(program)
            .args(args)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MoverError::EngineUnavailable(format!("failed to spawn '{}': {}", program_name, e)))?;

        let ring = Arc::new(Mutex::new(OutputRingBuffer::new(RING_CAPACITY)));

        // Drain stderr in the background so the child never blocks on a
        // full pipe and the tail is available for error records.
        if let Some(stderr) = child.stderr.take() {
            let ring = Arc::clone(&ring);
            let name = program_name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "subprocess", "[{}] {}", name, line);
                    ring.lock().push(line);
                }
            });
        }

        Ok(Self {
            child,
            program: program_name,
            ring,
            _workdir: workdir,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Takes the stdout line reader; callable once.
    pub fn stdout_lines(&mut self) -> Option<Lines<BufReader<ChildStdout>>> {
        self.child.stdout.take().map(|out| BufReader::new(out).lines())
    }

    /// Pushes a stdout line into the shared tail (adapters call this while
    /// parsing so errors carry both streams).
    pub fn remember_line(&self, line: &str) {
        self.ring.lock().push(line.to_string());
    }

    /// Most recent output lines for error context.
    pub fn tail(&self) -> String {
        self.ring.lock().tail(20)
    }

    /// Waits for natural exit.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus, MoverError> {
        self.child.wait().await.map_err(MoverError::from)
    }

    /// Terminate-then-kill escalation.
    ///
    /// Sends a polite terminate request, waits up to `grace`, then forces a
    /// kill. Always reaps the child.
    pub async fn terminate(&mut self, grace: Duration) -> Result<(), MoverError> {
        let delivered = self.child.id().map(platform::send_terminate).unwrap_or(false);

        if delivered {
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!("subprocess '{}' exited after terminate: {}", self.program, status);
                    return Ok(());
                }
                Ok(Err(e)) => return Err(MoverError::from(e)),
                Err(_) => {
                    tracing::warn!(
                        "subprocess '{}' ignored terminate for {:?}; killing",
                        self.program,
                        grace
                    );
                }
            }
        }

        self.child.start_kill().map_err(MoverError::from)?;
        self.child.wait().await.map_err(MoverError::from)?;
        Ok(())
    }
}

/// Classifies a subprocess failure from its exit code and output tail.
///
/// Adapters call this before crossing the engine boundary so the workflow
/// engine only ever sees taxonomy-classified errors.
pub fn classify_subprocess_failure(engine: &str, code: Option<i32>, tail: &str) -> MoverError {
    let lowered = tail.to_ascii_lowercase();

    if lowered.contains("slowdown") || lowered.contains("slow down") || lowered.contains("throttl") || lowered.contains("too many requests") {
        return MoverError::Throttled(format!("{}: {}", engine, last_line(tail)));
    }
    if lowered.contains("timeout") || lowered.contains("timed out") || lowered.contains("deadline") {
        return MoverError::Timeout(format!("{}: {}", engine, last_line(tail)));
    }
    if lowered.contains("connection") || lowered.contains("network") || lowered.contains("tls") || lowered.contains("broken pipe") || lowered.contains("reset by peer") || lowered.contains("5xx") || lowered.contains("internal error (500") || lowered.contains("503") {
        return MoverError::NetworkError(format!("{}: {}", engine, last_line(tail)));
    }
    if lowered.contains("access denied") || lowered.contains("accessdenied") || lowered.contains("forbidden") || lowered.contains("permission denied") || lowered.contains("invalidaccesskeyid") || lowered.contains("signaturedoesnotmatch") {
        return MoverError::PermissionDenied(format!("{}: {}", engine, last_line(tail)));
    }
    if lowered.contains("no such bucket") || lowered.contains("nosuchbucket") || lowered.contains("no such file") || lowered.contains("not found") || lowered.contains("404") {
        return MoverError::PathNotFound(format!("{}: {}", engine, last_line(tail)));
    }
    if lowered.contains("no space left") || lowered.contains("disk full") {
        return MoverError::DiskFull(format!("{}: {}", engine, last_line(tail)));
    }
    if lowered.contains("quota") {
        return MoverError::QuotaExceeded(format!("{}: {}", engine, last_line(tail)));
    }
    if lowered.contains("checksum") || lowered.contains("md5 mismatch") || lowered.contains("digest mismatch") {
        return MoverError::ChecksumMismatch(format!("{}: {}", engine, last_line(tail)));
    }

    MoverError::SubprocessFailed {
        engine: engine.to_string(),
        code,
        tail: tail.lines().rev().take(5).collect::<Vec<_>>().into_iter().rev().collect::<Vec<_>>().join("\n"),
    }
}

fn last_line(tail: &str) -> String {
    tail.lines().last().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use datamover_domain::ErrorClass;

    /// Tests the ring buffer keeps only the newest lines.
    #[test]
    fn test_ring_buffer_bounds() {
        let mut ring = OutputRingBuffer::new(3);
        for i in 0..10 {
            ring.push(format!("line-{}", i));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.tail(10), "line-7\nline-8\nline-9");
        assert_eq!(ring.tail(1), "line-9");
    }

    /// Tests raw failure text maps onto the taxonomy the retry logic
    /// expects.
    #[test]
    fn test_failure_classification() {
        let throttled = classify_subprocess_failure("bulk-parallel", Some(1), "ERROR SlowDown: reduce request rate");
        assert_eq!(throttled.error_class(), ErrorClass::Transient);

        let denied = classify_subprocess_failure("bulk-parallel", Some(1), "fatal: AccessDenied on s3://bucket");
        assert_eq!(denied.error_class(), ErrorClass::Configuration);

        let network = classify_subprocess_failure("multi-cloud-sync", Some(1), "read: connection reset by peer");
        assert_eq!(network.error_class(), ErrorClass::Transient);

        let integrity = classify_subprocess_failure("bulk-parallel", Some(1), "upload failed: checksum mismatch");
        assert_eq!(integrity.error_class(), ErrorClass::Integrity);

        let unknown = classify_subprocess_failure("bulk-parallel", Some(42), "segmentation fault");
        assert_eq!(unknown.error_class(), ErrorClass::Unknown);
        match unknown {
            MoverError::SubprocessFailed { code, .. } => assert_eq!(code, Some(42)),
            other => panic!("expected SubprocessFailed, got {:?}", other),
        }
    }

    /// Tests spawn failure surfaces as EngineUnavailable rather than a raw
    /// I/O error.
    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let result = ManagedProcess::spawn(Path::new("/nonexistent/transfer-tool"), &[]);
        match result {
            Err(MoverError::EngineUnavailable(msg)) => assert!(msg.contains("transfer-tool")),
            other => panic!("expected EngineUnavailable, got {:?}", other.map(|_| ())),
        }
    }

    /// Tests a real child's stdout is readable line by line and the
    /// process reaps cleanly.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_read_stdout() {
        let mut process = ManagedProcess::spawn(
            Path::new("/bin/sh"),
            &["-c".to_string(), "printf 'one\\ntwo\\n'".to_string()],
        )
        .unwrap();

        let mut lines = process.stdout_lines().unwrap();
        let mut seen = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            seen.push(line);
        }
        assert_eq!(seen, vec!["one", "two"]);

        let status = process.wait().await.unwrap();
        assert!(status.success());
    }

    /// Tests terminate-then-kill stops a sleeping child well within the
    /// grace budget.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_escalation() {
        let mut process = ManagedProcess::spawn(
            Path::new("/bin/sh"),
            &["-c".to_string(), "sleep 30".to_string()],
        )
        .unwrap();
        assert!(process.id().is_some());

        let started = std::time::Instant::now();
        process.terminate(Duration::from_secs(2)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
