// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Raw clap definitions for the `datamover` binary. Parsing stops at
//! syntactic structure; semantic hardening (path traversal, control
//! characters, bounds) lives in the sibling validator module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Research data-movement orchestrator.
#[derive(Debug, Parser)]
#[command(name = "datamover", version, about = "Analyze, optimize, and move research data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose (debug-level) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Root directory for persisted executions, checkpoints, and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze a source tree and report its data pattern
    Analyze {
        /// Path to analyze
        path: PathBuf,

        /// Research-domain hint ("genomics", "climate", ...)
        #[arg(long)]
        domain: Option<String>,

        /// Also produce optimization recommendations
        #[arg(long)]
        recommend: bool,
    },

    /// Generate a project configuration from an analyzed tree
    GenerateConfig {
        /// Path the configuration should describe
        path: PathBuf,

        /// Template flavor
        #[arg(long, default_value = "optimized", value_parser = ["minimal", "optimized", "comprehensive"])]
        template: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overrides as key=value (e.g. project.name=mylab)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Validate a project configuration file
    Validate {
        /// Configuration file (YAML or TOML)
        config: PathBuf,
    },

    /// Operate on workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Plan or execute recovery for a failed execution
    Recover {
        /// Execution id
        id: String,

        /// Recovery strategy
        #[arg(long, default_value = "auto", value_parser = ["auto", "manual", "retry"])]
        strategy: String,

        /// Ask before executing the plan
        #[arg(long)]
        interactive: bool,

        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,

        /// Execute even when the plan is not recommended
        #[arg(long)]
        force: bool,
    },

    /// Run environment and configuration diagnostics
    Diagnose {
        /// Restrict to one issue class (engines, storage, config)
        #[arg(long)]
        class: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkflowAction {
    /// Start a workflow execution
    Run {
        /// Project configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Workflow name
        #[arg(short, long)]
        name: String,

        /// Stream progress until the execution finishes
        #[arg(long)]
        follow: bool,

        /// Build the plan and estimates without touching external state
        #[arg(long)]
        dry_run: bool,
    },

    /// Show one execution
    Status {
        /// Execution id
        id: String,
    },

    /// List active executions
    List,

    /// Cancel a running execution
    Cancel {
        /// Execution id
        id: String,
    },
}

/// Parses the process arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests representative command lines parse into the expected shapes.
    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["datamover", "analyze", "/data", "--domain", "genomics", "--recommend"])
            .unwrap();
        match cli.command {
            Commands::Analyze { path, domain, recommend } => {
                assert_eq!(path, PathBuf::from("/data"));
                assert_eq!(domain.as_deref(), Some("genomics"));
                assert!(recommend);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_workflow_run() {
        let cli = Cli::try_parse_from([
            "datamover", "workflow", "run", "--config", "project.yaml", "--name", "nightly", "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Workflow {
                action: WorkflowAction::Run {
                    config,
                    name,
                    follow,
                    dry_run,
                },
            } => {
                assert_eq!(config, PathBuf::from("project.yaml"));
                assert_eq!(name, "nightly");
                assert!(!follow);
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_template_rejected() {
        assert!(Cli::try_parse_from(["datamover", "generate-config", "/data", "--template", "fancy"]).is_err());
    }

    #[test]
    fn test_verbose_quiet_conflict() {
        assert!(Cli::try_parse_from(["datamover", "-v", "-q", "workflow", "list"]).is_err());
    }
}
