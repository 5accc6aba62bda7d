//! Scenario authoring surface
//!
//! [`ScenarioContext`] owns the session for the duration of a scenario and
//! exposes element-level actions by semantic key. Every action absorbs its
//! own faults and reports them as a narrative line; steps decide what a
//! `false` or `None` means for them.

use super::events::EventEmitter;
use crate::driver::{RemoteSession, WatchedSession};
use crate::interaction::{
    AlertRecovery, GestureEngine, InteractionExecutor, InteractionResult, LocatorCatalog,
    LocatorResolver, LocatorSpec, SettleKind, SwipeDirection, SwipePath, UiElementHandle,
    WaitPolicy,
};
use crate::utils::config::Config;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct ScenarioContext {
    session: WatchedSession,
    catalog: LocatorCatalog,
    resolver: LocatorResolver,
    executor: InteractionExecutor,
    alerts: AlertRecovery,
    gestures: GestureEngine,
    wait: Arc<dyn WaitPolicy>,
    emitter: EventEmitter,

    /// Scenario `env` block
    pub env: HashMap<String, String>,

    /// Values captured during the run (e.g. by `readText`)
    pub vars: HashMap<String, String>,

    swipe_margin: i32,
    swipe_duration_ms: u64,
    tally: (u32, u32),
}

impl ScenarioContext {
    pub fn new(session: Box<dyn RemoteSession>, config: &Config, emitter: EventEmitter) -> Self {
        let wait = config.wait_policy();
        Self {
            session: WatchedSession::new(session),
            catalog: LocatorCatalog::new(&config.locator_attribute, config.namespace.as_deref()),
            resolver: LocatorResolver::new(),
            executor: InteractionExecutor::new(Arc::clone(&wait)),
            alerts: AlertRecovery::new(
                &config.alert_selectors,
                config.back_keycode,
                Arc::clone(&wait),
            ),
            gestures: GestureEngine::new(config.gesture, Arc::clone(&wait)),
            wait,
            emitter,
            env: HashMap::new(),
            vars: HashMap::new(),
            swipe_margin: config.swipe_margin,
            swipe_duration_ms: config.swipe_duration_ms,
            tally: (0, 0),
        }
    }

    pub fn session(&self) -> &dyn RemoteSession {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn default_swipe_duration_ms(&self) -> u64 {
        self.swipe_duration_ms
    }

    pub fn default_swipe_margin(&self) -> i32 {
        self.swipe_margin
    }

    /// Narrative line shown under the running step
    pub fn note(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        self.emitter.log(message);
    }

    /// Fix a custom lookup chain for a key. False if the key is already in use.
    pub fn define_locator(&mut self, spec: LocatorSpec) -> bool {
        self.catalog.define(spec)
    }

    // ------------------------------------------------------------------
    // Element actions
    // ------------------------------------------------------------------

    pub async fn locate(&mut self, id: &str) -> Option<UiElementHandle> {
        let spec = self.catalog.spec_for(id);
        match self.resolver.resolve(&self.session, spec).await {
            Ok(handle) => {
                log::debug!("Found '{}' via {}", id, handle.matched_by().label());
                Some(handle)
            }
            Err(failure) => {
                log::debug!("{}", failure);
                None
            }
        }
    }

    pub async fn click(&mut self, id: &str) -> bool {
        let Some(handle) = self.locate(id).await else {
            self.note(format!("✗ {} not found", id));
            return false;
        };
        let label = handle.matched_by().label();
        match self.executor.click_checked(&self.session, handle).await {
            InteractionResult::Success(_) => {
                self.note(format!("✓ Clicked {} ({})", id, label));
                true
            }
            failure => {
                self.note(format!("✗ Click on {} failed: {}", id, failure));
                false
            }
        }
    }

    pub async fn type_text(&mut self, id: &str, text: &str) -> bool {
        let Some(handle) = self.locate(id).await else {
            self.note(format!("✗ {} not found", id));
            return false;
        };
        match self.executor.type_text_checked(&self.session, handle, text).await {
            InteractionResult::Success(rendered) => {
                self.note(format!(
                    "✓ Entered '{}' into {} (shows '{}')",
                    text,
                    id,
                    rendered.unwrap_or_default()
                ));
                true
            }
            failure => {
                self.note(format!("✗ Typing into {} failed: {}", id, failure));
                false
            }
        }
    }

    pub async fn read_text(&mut self, id: &str) -> Option<String> {
        let handle = self.locate(id).await?;
        self.executor.read_text(&self.session, &handle).await
    }

    pub async fn is_displayed(&mut self, id: &str) -> bool {
        match self.locate(id).await {
            Some(handle) => self.executor.is_displayed(&self.session, &handle).await,
            None => false,
        }
    }

    /// Tap the `index`-th element of a widget class (0-based, tree order)
    pub async fn click_nth_of_class(&mut self, class: &str, index: usize) -> bool {
        let mut handles = self
            .resolver
            .locate_all_by_class(&self.session, class)
            .await;
        if index >= handles.len() {
            self.note(format!(
                "✗ No {} #{} ({} on screen)",
                class,
                index + 1,
                handles.len()
            ));
            return false;
        }
        let handle = handles.swap_remove(index);
        match self.executor.click_checked(&self.session, handle).await {
            InteractionResult::Success(_) => {
                self.note(format!("✓ Clicked {} #{}", class, index + 1));
                true
            }
            failure => {
                self.note(format!("✗ Click on {} #{} failed: {}", class, index + 1, failure));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    pub async fn swipe(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, duration_ms: u64) -> bool {
        let ok = self
            .gestures
            .swipe(&self.session, x0, y0, x1, y1, duration_ms)
            .await;
        if ok {
            self.note(format!("✓ Swiped ({},{}) -> ({},{})", x0, y0, x1, y1));
        } else {
            self.note(format!("✗ Swipe ({},{}) -> ({},{}) failed", x0, y0, x1, y1));
        }
        ok
    }

    /// Swipe across an element, away from its edges
    pub async fn swipe_within(
        &mut self,
        id: &str,
        direction: SwipeDirection,
        margin: i32,
        duration_ms: u64,
    ) -> bool {
        let Some(handle) = self.locate(id).await else {
            self.note(format!("✗ {} not found", id));
            return false;
        };
        let path = SwipePath::within(handle.rect(), direction, margin);
        self.swipe(path.from.0, path.from.1, path.to.0, path.to.1, duration_ms)
            .await
    }

    /// Swipe across the middle of the window
    pub async fn scroll(&mut self, direction: SwipeDirection, duration_ms: u64) -> bool {
        let (width, height) = match self.session.window_size().await {
            Ok(size) => size,
            Err(e) => {
                self.note(format!("✗ Cannot scroll, window size unavailable: {}", e));
                return false;
            }
        };
        let path = SwipePath::screen(width, height, direction);
        self.swipe(path.from.0, path.from.1, path.to.0, path.to.1, duration_ms)
            .await
    }

    // ------------------------------------------------------------------
    // Recovery and timing
    // ------------------------------------------------------------------

    pub async fn dismiss_alert_if_present(&mut self) -> bool {
        self.alerts.dismiss_if_present(&self.session).await
    }

    /// Press the configured back key, ignoring faults
    pub async fn press_back(&mut self) -> bool {
        let command = crate::driver::DeviceCommand::PressKeycode(self.alerts.back_keycode());
        match self.session.execute_device_command(&command).await {
            Ok(()) => {
                self.wait.settle(&self.session, SettleKind::AfterDismiss).await;
                true
            }
            Err(e) => {
                self.note(format!("✗ Back navigation failed: {}", e));
                false
            }
        }
    }

    pub async fn settle(&self, kind: SettleKind) {
        self.wait.settle(&self.session, kind).await;
    }

    /// Explicit pause; skipped entirely when the run does not wait
    pub async fn pause(&self, duration: Duration) {
        self.wait.pause(duration).await;
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Check that each key exists; returns (found, expected)
    ///
    /// With `scroll_retry`, a missing key gets one more look after scrolling
    /// the window up. Visibility is reported but not counted. The counts are
    /// added to the current step's tally.
    pub async fn verify_elements(&mut self, ids: &[String], scroll_retry: bool) -> (u32, u32) {
        let mut found = 0;
        for id in ids {
            let mut handle = self.locate(id).await;
            let mut after_scroll = false;
            if handle.is_none() && scroll_retry {
                self.scroll(SwipeDirection::Up, self.swipe_duration_ms).await;
                handle = self.locate(id).await;
                after_scroll = true;
            }
            let Some(handle) = handle else {
                self.note(format!("✗ Missing: {}", id));
                continue;
            };
            found += 1;
            let suffix = if after_scroll { " (after scroll)" } else { "" };
            if self.executor.is_displayed(&self.session, &handle).await {
                self.note(format!("✓ Found: {}{}", id, suffix));
            } else {
                self.note(format!("✓ Found: {}{}, exists but not visible", id, suffix));
            }
        }
        let expected = ids.len() as u32;
        self.record_elements(found, expected);
        (found, expected)
    }

    pub fn record_elements(&mut self, found: u32, expected: u32) {
        self.tally.0 += found;
        self.tally.1 += expected;
    }

    /// Found/expected counts since the last call
    pub fn take_tally(&mut self) -> (u32, u32) {
        std::mem::take(&mut self.tally)
    }

    // ------------------------------------------------------------------
    // Session health
    // ------------------------------------------------------------------

    pub fn fatal_reason(&self) -> Option<String> {
        self.session.fatal_reason()
    }

    pub fn mark_fatal(&self, reason: &str) {
        self.session.mark_fatal(reason);
    }

    /// Give up the session for teardown
    pub fn into_session(self) -> Box<dyn RemoteSession> {
        self.session.into_inner()
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Captured vars first, then the scenario env, then the process env
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .cloned()
            .or_else(|| self.env.get(name).cloned())
            .or_else(|| std::env::var(name).ok())
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    /// Replace `${NAME}` placeholders; unknown names are left as written
    pub fn substitute_vars(&self, text: &str) -> String {
        if !text.contains("${") {
            return text.to_string();
        }
        let re = match Regex::new(r"\$\{([A-Za-z0-9_.]+)\}") {
            Ok(re) => re,
            Err(_) => return text.to_string(),
        };
        re.replace_all(text, |caps: &regex::Captures| {
            let key = &caps[1];
            if let Some(value) = self.get_var(key) {
                return value;
            }
            match key {
                "time" => chrono::Local::now().format("%H:%M:%S").to_string(),
                "date" => chrono::Local::now().format("%Y-%m-%d").to_string(),
                "timestamp" => chrono::Utc::now().timestamp().to_string(),
                _ => format!("${{{}}}", key),
            }
        })
        .to_string()
    }
}
