use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Instant;

/// Step execution status
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Passed | StepStatus::Failed { .. } | StepStatus::Skipped { .. }
        )
    }
}

/// State for a single step
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub duration_ms: Option<u64>,
    pub elements_found: u32,
    pub elements_expected: u32,
    pub screenshot_path: Option<String>,
}

impl StepRecord {
    pub fn new(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            elements_found: 0,
            elements_expected: 0,
            screenshot_path: None,
        }
    }

    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn pass(&mut self) {
        self.finish(StepStatus::Passed);
    }

    pub fn fail(&mut self, error: String) {
        self.finish(StepStatus::Failed { error });
    }

    pub fn skip(&mut self, reason: String) {
        self.status = StepStatus::Skipped { reason };
    }

    pub fn record_elements(&mut self, found: u32, expected: u32) {
        self.elements_found += found;
        self.elements_expected += expected;
    }

    fn finish(&mut self, status: StepStatus) {
        self.status = status;
        self.finished_at = Some(Instant::now());
        if let Some(start) = self.started_at {
            self.duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeardownStatus {
    NotRun,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScenarioStatus {
    Pending,
    Running,
    Passed,
    Failed,
    PartiallyPassed { passed: u32, failed: u32 },
    Aborted { reason: String },
}

/// Outcome of one scenario run against one session
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub run_id: String,
    pub scenario: String,
    pub session_id: String,
    pub started_at: DateTime<Local>,
    pub status: ScenarioStatus,
    pub steps: Vec<StepRecord>,
    pub aborted: Option<String>,
    pub teardown: TeardownStatus,
    pub total_duration_ms: Option<u64>,
    clock: Option<Instant>,
}

impl ScenarioReport {
    pub fn new(scenario: &str, session_id: &str, step_names: &[&str]) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            scenario: scenario.to_string(),
            session_id: session_id.to_string(),
            started_at: Local::now(),
            status: ScenarioStatus::Pending,
            steps: step_names
                .iter()
                .enumerate()
                .map(|(i, name)| StepRecord::new(i, name))
                .collect(),
            aborted: None,
            teardown: TeardownStatus::NotRun,
            total_duration_ms: None,
            clock: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ScenarioStatus::Running;
        self.started_at = Local::now();
        self.clock = Some(Instant::now());
    }

    /// Record a session-fatal condition; pending steps become skipped
    pub fn abort(&mut self, reason: &str) {
        if self.aborted.is_none() {
            self.aborted = Some(reason.to_string());
        }
        for step in &mut self.steps {
            if matches!(step.status, StepStatus::Pending) {
                step.skip(format!("session lost: {}", reason));
            }
        }
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.clock {
            self.total_duration_ms = Some(start.elapsed().as_millis() as u64);
        }

        let (passed, failed) = (self.passed(), self.failed());
        self.status = if let Some(reason) = &self.aborted {
            ScenarioStatus::Aborted {
                reason: reason.clone(),
            }
        } else if failed == 0 {
            ScenarioStatus::Passed
        } else if passed == 0 {
            ScenarioStatus::Failed
        } else {
            ScenarioStatus::PartiallyPassed { passed, failed }
        };
    }

    fn count(&self, pred: impl Fn(&StepStatus) -> bool) -> u32 {
        self.steps.iter().filter(|s| pred(&s.status)).count() as u32
    }

    pub fn passed(&self) -> u32 {
        self.count(|s| matches!(s, StepStatus::Passed))
    }

    pub fn failed(&self) -> u32 {
        self.count(|s| matches!(s, StepStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> u32 {
        self.count(|s| matches!(s, StepStatus::Skipped { .. }))
    }

    pub fn elements_found(&self) -> u32 {
        self.steps.iter().map(|s| s.elements_found).sum()
    }

    pub fn elements_expected(&self) -> u32 {
        self.steps.iter().map(|s| s.elements_expected).sum()
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed() == 0 && self.skipped() == 0
    }
}

/// Totals over every scenario in one invocation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_scenarios: u32,
    pub total_steps: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub aborted_scenarios: u32,
    pub elements_found: u32,
    pub elements_expected: u32,
    pub total_duration_ms: Option<u64>,
}

impl RunSummary {
    pub fn from_reports(reports: &[ScenarioReport], started: Instant) -> Self {
        let mut summary = Self {
            total_scenarios: reports.len() as u32,
            total_duration_ms: Some(started.elapsed().as_millis() as u64),
            ..Default::default()
        };
        for report in reports {
            summary.total_steps += report.steps.len() as u32;
            summary.passed += report.passed();
            summary.failed += report.failed();
            summary.skipped += report.skipped();
            summary.elements_found += report.elements_found();
            summary.elements_expected += report.elements_expected();
            if report.aborted.is_some() {
                summary.aborted_scenarios += 1;
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.aborted_scenarios == 0
    }
}
