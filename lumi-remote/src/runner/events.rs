use super::state::{RunSummary, ScenarioStatus, TeardownStatus};
use tokio::sync::broadcast;

/// Scenario execution events for real-time output
#[derive(Debug, Clone)]
pub enum ScenarioEvent {
    // Run events
    RunStarted {
        scenario_count: usize,
    },
    RunFinished {
        summary: RunSummary,
    },

    // Scenario events
    ScenarioStarted {
        name: String,
        session_id: String,
        step_count: usize,
    },
    ScenarioFinished {
        name: String,
        status: ScenarioStatus,
        elements_found: u32,
        elements_expected: u32,
        teardown: TeardownStatus,
        duration_ms: Option<u64>,
    },

    // Step events
    StepStarted {
        index: usize,
        name: String,
    },
    StepPassed {
        index: usize,
        duration_ms: u64,
    },
    StepFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
    StepSkipped {
        index: usize,
        name: String,
        reason: String,
    },

    /// Narrative line from inside a step
    Log {
        message: String,
    },
}

/// Event emitter for broadcasting scenario events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<ScenarioEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<ScenarioEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: ScenarioEvent) {
        let _ = self.sender.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(ScenarioEvent::Log {
            message: message.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScenarioEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<ScenarioEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        // Hidden draw target when piped, to keep escape codes out of logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut step_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::debug!("Console listener skipped {} events", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                ScenarioEvent::RunStarted { scenario_count } => {
                    println!(
                        "\n{} Running {} scenario(s)",
                        "▶".green().bold(),
                        scenario_count
                    );
                }

                ScenarioEvent::RunFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Run finished", "■".blue().bold());
                    println!("  Scenarios: {}", summary.total_scenarios);
                    println!("  Steps: {}", summary.total_steps);
                    println!(
                        "  {} passed, {} failed, {} skipped",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.skipped.to_string().yellow()
                    );
                    if summary.aborted_scenarios > 0 {
                        println!(
                            "  {} scenario(s) aborted",
                            summary.aborted_scenarios.to_string().red()
                        );
                    }
                    if summary.elements_expected > 0 {
                        println!(
                            "  Elements: {}/{} found",
                            summary.elements_found, summary.elements_expected
                        );
                    }
                    if let Some(duration) = summary.total_duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                }

                ScenarioEvent::ScenarioStarted {
                    name,
                    session_id,
                    step_count,
                } => {
                    println!(
                        "\n  {} Scenario: {} ({} steps, session {})",
                        "→".blue(),
                        name.white().bold(),
                        step_count,
                        session_id.cyan()
                    );
                }

                ScenarioEvent::ScenarioFinished {
                    name,
                    status,
                    elements_found,
                    elements_expected,
                    teardown,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    let status_str = match status {
                        ScenarioStatus::Passed => "PASSED".green().bold(),
                        ScenarioStatus::Failed => "FAILED".red().bold(),
                        ScenarioStatus::PartiallyPassed { passed, failed } => {
                            format!("PARTIAL ({}/{} passed)", passed, passed + failed)
                                .yellow()
                                .bold()
                        }
                        ScenarioStatus::Aborted { reason } => {
                            format!("ABORTED: {}", reason).red().bold()
                        }
                        _ => "UNKNOWN".white().bold(),
                    };
                    println!("  {} Scenario {} [{}]", "←".blue(), name, status_str);
                    if elements_expected > 0 {
                        println!(
                            "    Elements found: {}/{}",
                            elements_found, elements_expected
                        );
                    }
                    match teardown {
                        TeardownStatus::Completed => {}
                        TeardownStatus::NotRun => println!("    {}", "Teardown not run".yellow()),
                        TeardownStatus::Failed(e) => {
                            println!("    {} {}", "Teardown failed:".yellow(), e.dimmed())
                        }
                    }
                    if let Some(duration) = duration_ms {
                        println!("    Duration: {}ms", duration);
                    }
                }

                ScenarioEvent::StepStarted { index, name } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    step_text = format!("[{}] {}... ", index + 1, name.dimmed());
                    pb.set_message(step_text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                ScenarioEvent::StepPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✓".green(), step_text, duration_ms);
                }

                ScenarioEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✗".red(), step_text, duration_ms);
                    println!("        {}", error.red());
                }

                ScenarioEvent::StepSkipped {
                    index,
                    name,
                    reason,
                } => {
                    println!(
                        "    {} [{}] {} ({})",
                        "○".yellow(),
                        index + 1,
                        name,
                        reason.dimmed()
                    );
                }

                ScenarioEvent::Log { message } => {
                    multi.println(format!("        {}", message)).ok();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emitter_delivers_in_order() {
        let (emitter, mut receiver) = EventEmitter::new();
        emitter.emit(ScenarioEvent::StepStarted {
            index: 0,
            name: "Launch".to_string(),
        });
        emitter.log("✓ Found app-title");

        assert!(matches!(
            receiver.recv().await,
            Ok(ScenarioEvent::StepStarted { index: 0, .. })
        ));
        match receiver.recv().await {
            Ok(ScenarioEvent::Log { message }) => assert_eq!(message, "✓ Found app-title"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_listener_is_silent() {
        let emitter = EventEmitter::default();
        emitter.log("nobody is listening");
    }

    #[tokio::test]
    async fn test_listener_stops_when_emitters_drop() {
        let (emitter, receiver) = EventEmitter::new();
        let handle = tokio::spawn(ConsoleEventListener::listen(receiver));
        emitter.log("line");
        drop(emitter);
        assert!(handle.await.is_ok());
    }
}
