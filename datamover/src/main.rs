// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Datamover Binary
//!
//! Entry point: parses and validates arguments via the bootstrap crate,
//! wires the infrastructure together, dispatches the requested use case,
//! and maps the outcome onto the exit-code contract (0 success, 1 user
//! error, 2 transient, 3 runtime, 4 partial success, 130 cancelled).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use datamover_bootstrap::shutdown::ShutdownCoordinator;
use datamover_bootstrap::{signals, ExitCode, FailureKind, RecoverStrategyArg, ValidatedCli, ValidatedCommand};
use datamover_domain::services::transfer_engine::TransferEngine;
use datamover_domain::{CostCalculator, ErrorClass, ExecutionState, MoverError};

use datamover::application::services::recovery_manager::RecoveryManager;
use datamover::application::services::workflow_engine::WorkflowEngine;
use datamover::application::use_cases;
use datamover::infrastructure::analysis::PatternAnalyzer;
use datamover::infrastructure::bundling::Bundler;
use datamover::infrastructure::engines::{ArchiveBundlerEngine, BulkParallelEngine, CloudSyncEngine, EngineSelector};
use datamover::infrastructure::metrics::MetricsService;
use datamover::infrastructure::persistence::JsonExecutionStore;
use datamover::infrastructure::runtime::{ResourceGovernor, StepRunner};
use datamover::presentation::display;

fn main() {
    let cli = match datamover_bootstrap::bootstrap_cli() {
        Ok(cli) => cli,
        Err(error) => {
            eprintln!("error: {}", error);
            datamover_bootstrap::exit_with(ExitCode::UserError);
        }
    };
    datamover_bootstrap::init_tracing(cli.verbose, cli.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("error: failed to start runtime: {}", error);
            datamover_bootstrap::exit_with(ExitCode::RuntimeFailure);
        }
    };
    let code = runtime.block_on(run(cli));
    datamover_bootstrap::exit_with(code);
}

/// Everything the use cases need, wired once at startup.
struct App {
    engine: WorkflowEngine,
    recovery: RecoveryManager,
    selector: Arc<EngineSelector>,
    analyzer: PatternAnalyzer,
    data_dir: PathBuf,
    coordinator: ShutdownCoordinator,
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".local/share/datamover"))
        .unwrap_or_else(|| PathBuf::from(".datamover"))
}

/// Engine settings come from the project file when the invocation names
/// one; every other command runs on defaults.
fn settings_for(command: &ValidatedCommand) -> datamover_domain::EngineSettings {
    let config_path = match command {
        ValidatedCommand::WorkflowRun { config, .. } | ValidatedCommand::Validate { config } => Some(config),
        _ => None,
    };
    config_path
        .and_then(|path| datamover::infrastructure::config::load_project(path).ok())
        .map(|config| config.settings)
        .unwrap_or_default()
}

fn build_app(data_dir: PathBuf, settings: &datamover_domain::EngineSettings) -> Result<App, MoverError> {
    let coordinator = ShutdownCoordinator::default();
    signals::install_signal_handlers(coordinator.clone());

    let store = Arc::new(JsonExecutionStore::open(&data_dir)?);
    let metrics = Arc::new(MetricsService::new()?);
    let governor = Arc::new(ResourceGovernor::new(settings.max_concurrent_workflows));

    let bulk = Arc::new(BulkParallelEngine::new());
    let sync = Arc::new(CloudSyncEngine::new());
    let bundler_engine = Arc::new(ArchiveBundlerEngine::new(Bundler::default(), Arc::clone(&bulk)));
    let selector = Arc::new(EngineSelector::new(vec![
        bulk as Arc<dyn TransferEngine>,
        sync as Arc<dyn TransferEngine>,
        bundler_engine as Arc<dyn TransferEngine>,
    ]));

    let runner = Arc::new(StepRunner::new(
        PatternAnalyzer::new(CostCalculator::with_default_rates()),
        Bundler::default(),
        Arc::clone(&selector),
        Arc::clone(&metrics),
        Arc::clone(&governor),
        data_dir.join("staging"),
        store.manifests_dir(),
        Duration::from_millis(settings.progress_poll_interval_ms.max(50)),
    ));
    let engine = WorkflowEngine::new(
        store.clone(),
        runner,
        governor,
        metrics,
        Duration::from_millis(settings.progress_poll_interval_ms.max(50)),
    );
    let recovery = RecoveryManager::new(store, engine.clone());

    Ok(App {
        engine,
        recovery,
        selector,
        analyzer: PatternAnalyzer::new(CostCalculator::with_default_rates()),
        data_dir,
        coordinator,
    })
}

async fn run(cli: ValidatedCli) -> ExitCode {
    let settings = settings_for(&cli.command);
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| settings.data_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_data_dir);
    let app = match build_app(data_dir, &settings) {
        Ok(app) => app,
        Err(error) => return report_error(&error),
    };

    match dispatch(&app, cli.command).await {
        Ok(code) => code,
        Err(error) => report_error(&error),
    }
}

async fn dispatch(app: &App, command: ValidatedCommand) -> Result<ExitCode, MoverError> {
    match command {
        ValidatedCommand::Analyze { path, domain, recommend } => {
            let outcome = use_cases::analyze::run(
                &app.analyzer,
                &use_cases::analyze::AnalyzeRequest {
                    path,
                    domain_hint: domain,
                    with_recommendation: recommend,
                },
                &app.coordinator.token(),
            )
            .await?;
            print!("{}", display::render_pattern(&outcome.pattern));
            if let Some(ref recommendation) = outcome.recommendation {
                print!("{}", display::render_recommendation(recommendation));
            }
            Ok(ExitCode::Success)
        }

        ValidatedCommand::GenerateConfig {
            path,
            template,
            output,
            overrides,
        } => {
            let outcome = use_cases::analyze::run(
                &app.analyzer,
                &use_cases::analyze::AnalyzeRequest {
                    path,
                    domain_hint: None,
                    with_recommendation: false,
                },
                &app.coordinator.token(),
            )
            .await?;
            let template: use_cases::generate_config::ConfigTemplate = template.parse()?;
            let config = use_cases::generate_config::run(&outcome.pattern, template, &overrides)?;

            let target = output.clone().unwrap_or_else(|| PathBuf::from("project.yaml"));
            let rendered = datamover::infrastructure::config::render_project(&config, &target)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", rendered),
            }
            Ok(ExitCode::Success)
        }

        ValidatedCommand::Validate { config } => {
            let outcome = use_cases::validate_config::run(&config)?;
            print!("{}", display::render_validation(&outcome.report));
            Ok(if outcome.report.is_valid() {
                ExitCode::Success
            } else {
                ExitCode::UserError
            })
        }

        ValidatedCommand::WorkflowRun {
            config,
            name,
            follow,
            dry_run,
        } => {
            match use_cases::run_workflow::run(&app.engine, &config, &name, dry_run).await? {
                use_cases::run_workflow::RunOutcome::Planned(plan) => {
                    print!("{}", display::render_plan(&plan));
                    Ok(ExitCode::Success)
                }
                use_cases::run_workflow::RunOutcome::Started(id) => {
                    println!("Started execution {}", id);
                    if follow {
                        follow_execution(app, &id.to_string()).await
                    } else {
                        Ok(ExitCode::Success)
                    }
                }
            }
        }

        ValidatedCommand::WorkflowStatus { id } => {
            let execution = use_cases::show_workflow::status(&app.engine, &id).await?;
            print!("{}", display::render_execution(&execution));
            Ok(exit_code_for_state(&execution))
        }

        ValidatedCommand::WorkflowList => {
            print!("{}", display::render_summaries(&use_cases::show_workflow::list(&app.engine)));
            Ok(ExitCode::Success)
        }

        ValidatedCommand::WorkflowCancel { id } => {
            use_cases::cancel_workflow::run(&app.engine, &id).await?;
            println!("Cancellation requested for {}", id);
            Ok(ExitCode::Success)
        }

        ValidatedCommand::Recover {
            id,
            strategy,
            interactive,
            dry_run,
            force,
        } => {
            let mode = match strategy {
                RecoverStrategyArg::Auto => use_cases::recover::RecoveryMode::Auto,
                RecoverStrategyArg::Manual => use_cases::recover::RecoveryMode::Manual,
                RecoverStrategyArg::Retry => use_cases::recover::RecoveryMode::Retry,
            };
            let request = use_cases::recover::RecoverRequest {
                execution_id: id.clone(),
                mode,
                // Interactive mode shows the plan first; execution happens
                // on a second, confirmed invocation.
                dry_run: dry_run || interactive,
                force,
            };
            let outcome = use_cases::recover::run(&app.recovery, &request).await?;
            print!("{}", display::render_recovery_plan(&outcome.plan, outcome.executed));
            if outcome.executed {
                println!("Follow with: datamover workflow status {}", id);
            }
            Ok(ExitCode::Success)
        }

        ValidatedCommand::Diagnose { class } => {
            let report = use_cases::diagnose::run(&app.selector, &app.data_dir, class.as_deref()).await?;
            print!("{}", display::render_diagnostics(&report));
            Ok(match report.worst_status() {
                use_cases::diagnose::CheckStatus::Fail => ExitCode::RuntimeFailure,
                _ => ExitCode::Success,
            })
        }
    }
}

/// Streams status lines until the execution is terminal; wires Ctrl-C to
/// cancellation.
async fn follow_execution(app: &App, raw_id: &str) -> Result<ExitCode, MoverError> {
    let token = app.coordinator.token();
    let mut cancelled_by_signal = false;
    loop {
        let execution = use_cases::show_workflow::status(&app.engine, raw_id).await?;
        println!(
            "{} {:>6.1}%  step {}/{}",
            execution.state,
            execution.progress * 100.0,
            execution.current_step + 1,
            execution.total_steps
        );
        if execution.state.is_terminal() {
            return Ok(exit_code_for_state(&execution));
        }
        if token.is_cancelled() && !cancelled_by_signal {
            cancelled_by_signal = true;
            let _ = use_cases::cancel_workflow::run(&app.engine, raw_id).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Exit code for a terminal execution snapshot.
fn exit_code_for_state(execution: &datamover_domain::WorkflowExecution) -> ExitCode {
    match execution.state {
        ExecutionState::Completed if execution.partial_success => ExitCode::PartialSuccess,
        ExecutionState::Completed => ExitCode::Success,
        ExecutionState::Cancelled => ExitCode::Cancelled,
        ExecutionState::Failed => match execution.error_class {
            Some(ErrorClass::Transient) => ExitCode::TransientFailure,
            Some(ErrorClass::Configuration) => ExitCode::UserError,
            _ => ExitCode::RuntimeFailure,
        },
        // Non-terminal states (status of a live execution) report success.
        _ => ExitCode::Success,
    }
}

fn report_error(error: &MoverError) -> ExitCode {
    eprintln!("error: {}", error);
    let kind = match error.error_class() {
        ErrorClass::Configuration => FailureKind::User,
        ErrorClass::Transient => FailureKind::Transient,
        ErrorClass::Cancelled => FailureKind::Cancelled,
        ErrorClass::Integrity | ErrorClass::Resource | ErrorClass::Unknown => FailureKind::Runtime,
    };
    ExitCode::from_failure(kind)
}
