pub mod context;
pub mod events;
pub mod executor;
pub mod scenario;
pub mod state;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::driver::{AppiumClient, RemoteSession};
use crate::parser::types::ScenarioFile;
use crate::parser::yaml::parse_scenario_file;
use crate::utils::config::Config;

pub use context::ScenarioContext;
pub use events::*;
pub use executor::{apply_locators, build_steps, CommandStep};
pub use scenario::{fail, ScenarioRunner, ScenarioStep, StepAction, StepError, StepResult};
pub use state::*;

/// Options for `run` that are not part of the session config
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output: PathBuf,
    pub snapshot: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("./output"),
            snapshot: false,
        }
    }
}

/// Collect scenario files from a file or directory
pub fn collect_scenario_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let path = e.path();
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No scenario files found in {}", path.display());
    }
    Ok(files)
}

/// Parse every scenario up front so a typo fails before any session opens
pub fn load_scenarios(path: &Path) -> Result<Vec<ScenarioFile>> {
    collect_scenario_files(path)?
        .iter()
        .map(|file| parse_scenario_file(file))
        .collect()
}

/// Session config for one scenario: its header wins over the base config
pub fn scenario_config(base: &Config, scenario: &ScenarioFile) -> Config {
    let mut config = base.clone();
    if let Some(namespace) = &scenario.namespace {
        config.namespace = Some(namespace.clone());
    }
    if let Some(capabilities) = &scenario.capabilities {
        config.merge_capabilities(capabilities);
    }
    config
}

/// Run every scenario under `path` sequentially, one session each
pub async fn run_scenarios(path: &Path, config: &Config, options: &RunOptions) -> Result<RunSummary> {
    let scenarios = load_scenarios(path)?;
    let started = Instant::now();

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    emitter.emit(ScenarioEvent::RunStarted {
        scenario_count: scenarios.len(),
    });

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in &scenarios {
        let config = scenario_config(config, scenario);
        let report = match AppiumClient::connect(&config).await {
            Ok(client) => {
                run_with_session(scenario, Box::new(client), &config, &emitter, options).await
            }
            Err(e) => {
                log::error!("Cannot start session for {}: {:#}", scenario.display_name(), e);
                connect_failed(scenario, &format!("{:#}", e), &emitter)
            }
        };
        reports.push(report);
    }

    let summary = RunSummary::from_reports(&reports, started);
    emitter.emit(ScenarioEvent::RunFinished {
        summary: summary.clone(),
    });

    // Closing the channel lets the listener drain and exit
    drop(emitter);
    listener.await.context("Console listener failed")?;

    Ok(summary)
}

/// Run one parsed scenario on an already open session
pub async fn run_with_session(
    scenario: &ScenarioFile,
    session: Box<dyn RemoteSession>,
    config: &Config,
    emitter: &EventEmitter,
    options: &RunOptions,
) -> ScenarioReport {
    let name = scenario.display_name();
    let mut ctx = ScenarioContext::new(session, config, emitter.clone());
    ctx.env = scenario.env.clone();
    apply_locators(&mut ctx, scenario);

    let mut runner = ScenarioRunner::new(&name, ctx);
    if options.snapshot {
        runner = runner.with_snapshots(options.output.join("snapshots"));
    }
    runner.run(build_steps(scenario)).await
}

/// Report for a scenario whose session never opened
fn connect_failed(scenario: &ScenarioFile, reason: &str, emitter: &EventEmitter) -> ScenarioReport {
    let name = scenario.display_name();
    let names: Vec<&str> = scenario.steps.iter().map(|s| s.name.as_str()).collect();
    let mut report = ScenarioReport::new(&name, "", &names);
    report.start();
    report.abort(reason);
    report.finish();

    emitter.emit(ScenarioEvent::ScenarioFinished {
        name,
        status: report.status.clone(),
        elements_found: 0,
        elements_expected: 0,
        teardown: report.teardown.clone(),
        duration_ms: report.total_duration_ms,
    });
    report
}
