//! Settle policies
//!
//! The automation protocol has no "UI is idle" signal, so every state-mutating
//! action is followed by a settle wait. The wait is injected as a
//! [`WaitPolicy`] so timing can be swapped without touching call sites.

use crate::driver::RemoteSession;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// What just happened, so the policy can pick how long to wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettleKind {
    /// After a tap; alerts may take a moment to appear
    AfterTap,
    /// After clearing or typing into a field
    AfterInput,
    /// After an alert button was pressed
    AfterDismiss,
    /// After a swipe or scroll
    AfterGesture,
}

/// Fixed delays per settle kind, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettleTimings {
    pub tap_ms: u64,
    pub input_ms: u64,
    pub dismiss_ms: u64,
    pub gesture_ms: u64,
}

impl Default for SettleTimings {
    fn default() -> Self {
        Self {
            tap_ms: 2000,
            input_ms: 1000,
            dismiss_ms: 500,
            gesture_ms: 1000,
        }
    }
}

impl SettleTimings {
    pub fn for_kind(&self, kind: SettleKind) -> Duration {
        let ms = match kind {
            SettleKind::AfterTap => self.tap_ms,
            SettleKind::AfterInput => self.input_ms,
            SettleKind::AfterDismiss => self.dismiss_ms,
            SettleKind::AfterGesture => self.gesture_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Which [`WaitPolicy`] a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    #[default]
    Fixed,
    Poll,
    None,
}

#[async_trait]
pub trait WaitPolicy: Send + Sync {
    /// Block the scenario until the UI is assumed settled
    async fn settle(&self, session: &dyn RemoteSession, kind: SettleKind);

    /// Explicit pause requested by a scenario step
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleep a fixed time per settle kind
#[derive(Debug, Clone, Default)]
pub struct FixedDelay {
    pub timings: SettleTimings,
}

impl FixedDelay {
    pub fn new(timings: SettleTimings) -> Self {
        Self { timings }
    }
}

#[async_trait]
impl WaitPolicy for FixedDelay {
    async fn settle(&self, _session: &dyn RemoteSession, kind: SettleKind) {
        tokio::time::sleep(self.timings.for_kind(kind)).await;
    }
}

/// Poll the page source until two consecutive snapshots are identical
///
/// The first snapshot is taken after `interval`, so a settle never returns
/// before at least one interval has elapsed. Gives up after `timeout`.
#[derive(Debug, Clone)]
pub struct PollUntilStable {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollUntilStable {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    async fn fingerprint(session: &dyn RemoteSession) -> Option<Vec<u8>> {
        match session.page_source().await {
            Ok(source) => Some(Sha256::digest(source.as_bytes()).to_vec()),
            Err(e) => {
                log::debug!("Page source unavailable while settling: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl WaitPolicy for PollUntilStable {
    async fn settle(&self, session: &dyn RemoteSession, kind: SettleKind) {
        let started = Instant::now();
        let mut previous: Option<Vec<u8>> = None;

        loop {
            tokio::time::sleep(self.interval).await;

            let Some(current) = Self::fingerprint(session).await else {
                return;
            };
            if previous.as_ref() == Some(&current) {
                log::trace!("UI stable after {:?} ({:?})", started.elapsed(), kind);
                return;
            }
            if started.elapsed() >= self.timeout {
                log::debug!("UI still changing after {:?} ({:?})", self.timeout, kind);
                return;
            }
            previous = Some(current);
        }
    }
}

/// Never wait
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

#[async_trait]
impl WaitPolicy for Immediate {
    async fn settle(&self, _session: &dyn RemoteSession, _kind: SettleKind) {}

    async fn pause(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakeSession;

    #[test]
    fn test_default_timings_in_range() {
        let timings = SettleTimings::default();
        for kind in [
            SettleKind::AfterTap,
            SettleKind::AfterInput,
            SettleKind::AfterDismiss,
            SettleKind::AfterGesture,
        ] {
            let d = timings.for_kind(kind);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(2000));
        }
    }

    #[tokio::test]
    async fn test_fixed_delay_sleeps() {
        let fake = FakeSession::sample_app();
        let policy = FixedDelay::new(SettleTimings {
            tap_ms: 30,
            input_ms: 0,
            dismiss_ms: 0,
            gesture_ms: 0,
        });
        let started = Instant::now();
        policy.settle(&fake, SettleKind::AfterTap).await;
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_poll_returns_once_stable() {
        let fake = FakeSession::sample_app();
        let policy = PollUntilStable::new(Duration::from_millis(5), Duration::from_secs(5));
        let started = Instant::now();
        policy.settle(&fake, SettleKind::AfterTap).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(fake.state().lock().unwrap().source_reads, 2);
    }

    #[tokio::test]
    async fn test_poll_stops_at_timeout_while_ui_keeps_changing() {
        let fake = FakeSession::sample_app();
        fake.state().lock().unwrap().volatile_source = true;
        let policy = PollUntilStable::new(Duration::from_millis(5), Duration::from_millis(100));

        let started = Instant::now();
        tokio::time::timeout(
            Duration::from_secs(2),
            policy.settle(&fake, SettleKind::AfterGesture),
        )
        .await
        .expect("settle should give up at its timeout");

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(1));
        assert!(fake.state().lock().unwrap().source_reads > 2);
    }

    #[tokio::test]
    async fn test_immediate_skips_pauses() {
        let started = Instant::now();
        Immediate.pause(Duration::from_secs(60)).await;
        assert!(started.elapsed() < Duration::from_millis(100));

        let started = Instant::now();
        FixedDelay::default().pause(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_poll_gives_up_on_dead_session() {
        let fake = FakeSession::sample_app();
        fake.state().lock().unwrap().session_dead = true;
        let policy = PollUntilStable::new(Duration::from_millis(5), Duration::from_secs(5));
        let started = Instant::now();
        policy.settle(&fake, SettleKind::AfterGesture).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_timings_deserialize_partial() {
        let timings: SettleTimings = serde_yaml::from_str("tapMs: 1500").unwrap();
        assert_eq!(timings.tap_ms, 1500);
        assert_eq!(timings.input_ms, 1000);
    }
}
