// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Facade
//!
//! Combines the clap parser with the hardening validator, producing a
//! `ValidatedCli` the binary can dispatch without re-checking input.

pub mod parser;
pub mod validator;

pub use parser::{parse_cli, Cli, Commands, WorkflowAction};
pub use validator::{ParseError, SecureArgParser};

use std::path::PathBuf;

/// Fully validated invocation.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub quiet: bool,
    pub data_dir: Option<PathBuf>,
}

/// Strategy argument of the `recover` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverStrategyArg {
    Auto,
    Manual,
    Retry,
}

#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Analyze {
        path: PathBuf,
        domain: Option<String>,
        recommend: bool,
    },
    GenerateConfig {
        path: PathBuf,
        template: String,
        output: Option<PathBuf>,
        overrides: Vec<(String, String)>,
    },
    Validate {
        config: PathBuf,
    },
    WorkflowRun {
        config: PathBuf,
        name: String,
        follow: bool,
        dry_run: bool,
    },
    WorkflowStatus {
        id: String,
    },
    WorkflowList,
    WorkflowCancel {
        id: String,
    },
    Recover {
        id: String,
        strategy: RecoverStrategyArg,
        interactive: bool,
        dry_run: bool,
        force: bool,
    },
    Diagnose {
        class: Option<String>,
    },
}

/// Parses and validates the process arguments.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(parse_cli())
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    if let Some(ref dir) = cli.data_dir {
        SecureArgParser::validate_path(&dir.to_string_lossy())?;
    }

    let command = match cli.command {
        Commands::Analyze { path, domain, recommend } => {
            let path = SecureArgParser::validate_path(&path.to_string_lossy())?;
            if let Some(ref domain) = domain {
                SecureArgParser::validate_argument(domain)?;
            }
            ValidatedCommand::Analyze { path, domain, recommend }
        }
        Commands::GenerateConfig {
            path,
            template,
            output,
            overrides,
        } => {
            let path = SecureArgParser::validate_path(&path.to_string_lossy())?;
            let output = match output {
                Some(out) => Some(SecureArgParser::validate_path(&out.to_string_lossy())?),
                None => None,
            };
            let overrides = overrides
                .iter()
                .map(|pair| SecureArgParser::validate_override(pair))
                .collect::<Result<Vec<_>, _>>()?;
            ValidatedCommand::GenerateConfig {
                path,
                template,
                output,
                overrides,
            }
        }
        Commands::Validate { config } => ValidatedCommand::Validate {
            config: SecureArgParser::validate_path(&config.to_string_lossy())?,
        },
        Commands::Workflow { action } => match action {
            WorkflowAction::Run {
                config,
                name,
                follow,
                dry_run,
            } => {
                let config = SecureArgParser::validate_path(&config.to_string_lossy())?;
                SecureArgParser::validate_argument(&name)?;
                ValidatedCommand::WorkflowRun {
                    config,
                    name,
                    follow,
                    dry_run,
                }
            }
            WorkflowAction::Status { id } => {
                SecureArgParser::validate_argument(&id)?;
                ValidatedCommand::WorkflowStatus { id }
            }
            WorkflowAction::List => ValidatedCommand::WorkflowList,
            WorkflowAction::Cancel { id } => {
                SecureArgParser::validate_argument(&id)?;
                ValidatedCommand::WorkflowCancel { id }
            }
        },
        Commands::Recover {
            id,
            strategy,
            interactive,
            dry_run,
            force,
        } => {
            SecureArgParser::validate_argument(&id)?;
            let strategy = match strategy.as_str() {
                "auto" => RecoverStrategyArg::Auto,
                "manual" => RecoverStrategyArg::Manual,
                "retry" => RecoverStrategyArg::Retry,
                other => {
                    return Err(ParseError::InvalidValue {
                        arg: "strategy".to_string(),
                        reason: format!("unknown strategy '{}'", other),
                    })
                }
            };
            ValidatedCommand::Recover {
                id,
                strategy,
                interactive,
                dry_run,
                force,
            }
        }
        Commands::Diagnose { class } => {
            if let Some(ref class) = class {
                SecureArgParser::validate_argument(class)?;
            }
            ValidatedCommand::Diagnose { class }
        }
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
        quiet: cli.quiet,
        data_dir: cli.data_dir,
    })
}
