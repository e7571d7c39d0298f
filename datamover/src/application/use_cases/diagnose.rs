// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Diagnose Use Case
//!
//! Environment and configuration health checks: transfer-engine
//! availability, data-directory writability, and host resources. The
//! optional issue class restricts the checks (`engines`, `storage`,
//! `host`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use datamover_bootstrap::platform;
use datamover_domain::MoverError;

use crate::infrastructure::engines::EngineSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub checks: Vec<DiagnosticCheck>,
}

impl DiagnosticReport {
    pub fn worst_status(&self) -> CheckStatus {
        let mut worst = CheckStatus::Pass;
        for check in &self.checks {
            match check.status {
                CheckStatus::Fail => return CheckStatus::Fail,
                CheckStatus::Warn => worst = CheckStatus::Warn,
                CheckStatus::Pass => {}
            }
        }
        worst
    }
}

/// Runs the diagnostics, optionally restricted to one issue class.
pub async fn run(
    selector: &EngineSelector,
    data_dir: &Path,
    class: Option<&str>,
) -> Result<DiagnosticReport, MoverError> {
    let mut checks = Vec::new();
    let wanted = |name: &str| class.map(|c| c.eq_ignore_ascii_case(name)).unwrap_or(true);

    if wanted("engines") {
        for kind in selector.kinds() {
            let Some(engine) = selector.get(kind) else { continue };
            let available = engine.is_available().await;
            checks.push(DiagnosticCheck {
                name: format!("engine:{}", kind),
                status: if available { CheckStatus::Pass } else { CheckStatus::Warn },
                detail: if available {
                    format!("{} is runnable", engine.name())
                } else {
                    format!("{} is not available on this host", engine.name())
                },
            });
        }
        let any_available = checks
            .iter()
            .any(|c| c.name.starts_with("engine:") && c.status == CheckStatus::Pass);
        if !any_available {
            checks.push(DiagnosticCheck {
                name: "engines:any".to_string(),
                status: CheckStatus::Fail,
                detail: "no transfer engine is available; install the bulk-parallel or sync CLI".to_string(),
            });
        }
    }

    if wanted("storage") {
        let probe = data_dir.join(".diagnose-probe");
        let writable = std::fs::create_dir_all(data_dir)
            .and_then(|_| std::fs::write(&probe, b"probe"))
            .and_then(|_| std::fs::remove_file(&probe));
        checks.push(match writable {
            Ok(()) => DiagnosticCheck {
                name: "storage:data-dir".to_string(),
                status: CheckStatus::Pass,
                detail: format!("{} is writable", data_dir.display()),
            },
            Err(e) => DiagnosticCheck {
                name: "storage:data-dir".to_string(),
                status: CheckStatus::Fail,
                detail: format!("{}: {}", data_dir.display(), e),
            },
        });
    }

    if wanted("host") {
        let cores = platform::logical_cores();
        checks.push(DiagnosticCheck {
            name: "host:cores".to_string(),
            status: if cores >= 2 { CheckStatus::Pass } else { CheckStatus::Warn },
            detail: format!("{} logical cores", cores),
        });
        if let Some(memory) = platform::total_memory_bytes() {
            let gib = memory as f64 / (1024.0 * 1024.0 * 1024.0);
            checks.push(DiagnosticCheck {
                name: "host:memory".to_string(),
                status: if gib >= 2.0 { CheckStatus::Pass } else { CheckStatus::Warn },
                detail: format!("{:.1} GiB total memory", gib),
            });
        }
    }

    Ok(DiagnosticReport { checks })
}
