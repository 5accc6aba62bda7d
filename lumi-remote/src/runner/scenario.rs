//! Step sequencing
//!
//! A scenario is a list of named steps run strictly in order against one
//! session. A failing or panicking step is recorded and the next one runs;
//! only a dead session stops the sequence. The session is quit exactly once
//! when the runner is done, whatever happened before.

use super::context::ScenarioContext;
use super::events::{EventEmitter, ScenarioEvent};
use super::state::{ScenarioReport, TeardownStatus};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    /// The step did not achieve what it checks; the scenario continues
    #[error("{0}")]
    Failed(String),

    /// The session cannot be used any more; remaining steps are skipped
    #[error("session lost: {0}")]
    SessionFatal(String),
}

pub type StepResult = Result<(), StepError>;

/// Shorthand for `Err(StepError::Failed(..))`
pub fn fail<T>(message: impl Into<String>) -> Result<T, StepError> {
    Err(StepError::Failed(message.into()))
}

#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, ctx: &mut ScenarioContext) -> StepResult;

    /// Commands shown by `check`
    fn describe(&self) -> Vec<String> {
        Vec::new()
    }
}

struct FnStep<F>(F);

#[async_trait]
impl<F> StepAction for FnStep<F>
where
    F: for<'a> Fn(&'a mut ScenarioContext) -> BoxFuture<'a, StepResult> + Send + Sync,
{
    async fn run(&self, ctx: &mut ScenarioContext) -> StepResult {
        (self.0)(ctx).await
    }
}

pub struct ScenarioStep {
    name: String,
    action: Box<dyn StepAction>,
}

impl ScenarioStep {
    pub fn new(name: &str, action: impl StepAction + 'static) -> Self {
        Self {
            name: name.to_string(),
            action: Box::new(action),
        }
    }

    /// Step from a closure returning a boxed future
    ///
    /// ```ignore
    /// ScenarioStep::from_fn("Tap", |ctx| async move {
    ///     if ctx.click("test-button").await { Ok(()) } else { fail("tap failed") }
    /// }.boxed())
    /// ```
    pub fn from_fn<F>(name: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, FnStep(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &dyn StepAction {
        self.action.as_ref()
    }
}

pub struct ScenarioRunner {
    name: String,
    ctx: ScenarioContext,
    emitter: EventEmitter,
    snapshot_dir: Option<PathBuf>,
}

impl ScenarioRunner {
    pub fn new(name: &str, ctx: ScenarioContext) -> Self {
        let emitter = ctx.emitter().clone();
        Self {
            name: name.to_string(),
            ctx,
            emitter,
            snapshot_dir: None,
        }
    }

    /// Save a screenshot here after each failed step
    pub fn with_snapshots(mut self, dir: PathBuf) -> Self {
        self.snapshot_dir = Some(dir);
        self
    }

    pub async fn run(self, steps: Vec<ScenarioStep>) -> ScenarioReport {
        let ScenarioRunner {
            name,
            mut ctx,
            emitter,
            snapshot_dir,
        } = self;

        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        let mut report = ScenarioReport::new(&name, ctx.session_id(), &names);
        report.start();

        emitter.emit(ScenarioEvent::ScenarioStarted {
            name: name.clone(),
            session_id: ctx.session_id().to_string(),
            step_count: steps.len(),
        });

        for (index, step) in steps.iter().enumerate() {
            if let Some(reason) = &report.aborted {
                let reason = format!("session lost: {}", reason);
                report.steps[index].skip(reason.clone());
                emitter.emit(ScenarioEvent::StepSkipped {
                    index,
                    name: step.name().to_string(),
                    reason,
                });
                continue;
            }

            report.steps[index].start();
            emitter.emit(ScenarioEvent::StepStarted {
                index,
                name: step.name().to_string(),
            });

            let outcome = AssertUnwindSafe(step.action().run(&mut ctx))
                .catch_unwind()
                .await;

            let (found, expected) = ctx.take_tally();
            report.steps[index].record_elements(found, expected);

            let result = match outcome {
                Ok(result) => result,
                Err(panic) => Err(StepError::Failed(format!(
                    "step panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };

            // A fatal error absorbed by an action still ends the scenario
            let result = match (result, ctx.fatal_reason()) {
                (Err(StepError::SessionFatal(reason)), _) => {
                    ctx.mark_fatal(&reason);
                    Err(StepError::SessionFatal(reason))
                }
                (_, Some(reason)) => Err(StepError::SessionFatal(reason)),
                (result, None) => result,
            };

            let record = &mut report.steps[index];
            match result {
                Ok(()) => {
                    record.pass();
                    emitter.emit(ScenarioEvent::StepPassed {
                        index,
                        duration_ms: record.duration_ms.unwrap_or(0),
                    });
                }
                Err(err) => {
                    log::warn!("Step '{}' failed: {}", step.name(), err);
                    record.fail(err.to_string());
                    if let (StepError::Failed(_), Some(dir)) = (&err, &snapshot_dir) {
                        record.screenshot_path =
                            save_snapshot(&ctx, dir, &name, index, step.name()).await;
                    }
                    emitter.emit(ScenarioEvent::StepFailed {
                        index,
                        error: err.to_string(),
                        duration_ms: record.duration_ms.unwrap_or(0),
                    });
                    if let StepError::SessionFatal(reason) = err {
                        report.abort(&reason);
                    }
                }
            }
        }

        // Teardown: the runner owns the session and consumes it here
        let session = ctx.into_session();
        report.teardown = match session.quit().await {
            Ok(()) => TeardownStatus::Completed,
            Err(e) => {
                log::warn!("Session teardown failed: {}", e);
                TeardownStatus::Failed(e.to_string())
            }
        };

        report.finish();
        emitter.emit(ScenarioEvent::ScenarioFinished {
            name,
            status: report.status.clone(),
            elements_found: report.elements_found(),
            elements_expected: report.elements_expected(),
            teardown: report.teardown.clone(),
            duration_ms: report.total_duration_ms,
        });
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn save_snapshot(
    ctx: &ScenarioContext,
    dir: &Path,
    scenario: &str,
    index: usize,
    step: &str,
) -> Option<String> {
    let png = match ctx.session().screenshot().await {
        Ok(png) => png,
        Err(e) => {
            log::warn!("Failure snapshot unavailable: {}", e);
            return None;
        }
    };
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        log::warn!("Cannot create {}: {}", dir.display(), e);
        return None;
    }
    let file = dir.join(format!(
        "{}_{:02}_{}.png",
        slug(scenario),
        index + 1,
        slug(step)
    ));
    match tokio::fs::write(&file, png).await {
        Ok(()) => Some(file.display().to_string()),
        Err(e) => {
            log::warn!("Cannot write {}: {}", file.display(), e);
            None
        }
    }
}

fn slug(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
