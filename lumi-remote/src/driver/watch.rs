//! Session-fatal watcher
//!
//! Components above the driver absorb every error into `false` or "absent".
//! That is right for missing elements and flaky commands, but a dead session
//! must still stop the scenario. [`WatchedSession`] sits between the
//! scenario and the real session and remembers the first fatal error it sees
//! pass through.

use super::actions::{By, DeviceCommand, ElementId, Rect, TouchChain, W3cActions};
use super::error::DriverResult;
use super::traits::RemoteSession;
use async_trait::async_trait;
use std::sync::Mutex;

pub struct WatchedSession {
    inner: Box<dyn RemoteSession>,
    fatal: Mutex<Option<String>>,
}

impl WatchedSession {
    pub fn new(inner: Box<dyn RemoteSession>) -> Self {
        Self {
            inner,
            fatal: Mutex::new(None),
        }
    }

    /// Reason of the first session-fatal error observed, if any
    pub fn fatal_reason(&self) -> Option<String> {
        self.fatal.lock().ok().and_then(|guard| guard.clone())
    }

    /// Mark the session unusable without a driver error
    pub fn mark_fatal(&self, reason: &str) {
        if let Ok(mut guard) = self.fatal.lock() {
            if guard.is_none() {
                *guard = Some(reason.to_string());
            }
        }
    }

    fn observe<T>(&self, result: DriverResult<T>) -> DriverResult<T> {
        if let Err(ref e) = result {
            if e.is_session_fatal() {
                log::warn!("Session {} is unusable: {}", self.inner.session_id(), e);
                self.mark_fatal(&e.to_string());
            }
        }
        result
    }

    /// Hand back the wrapped session for teardown
    pub fn into_inner(self) -> Box<dyn RemoteSession> {
        self.inner
    }
}

#[async_trait]
impl RemoteSession for WatchedSession {
    fn session_id(&self) -> &str {
        self.inner.session_id()
    }

    async fn find_element(&self, by: &By) -> DriverResult<ElementId> {
        self.observe(self.inner.find_element(by).await)
    }

    async fn find_elements(&self, by: &By) -> DriverResult<Vec<ElementId>> {
        self.observe(self.inner.find_elements(by).await)
    }

    async fn element_rect(&self, element: &ElementId) -> DriverResult<Rect> {
        self.observe(self.inner.element_rect(element).await)
    }

    async fn click_element(&self, element: &ElementId) -> DriverResult<()> {
        self.observe(self.inner.click_element(element).await)
    }

    async fn clear_element(&self, element: &ElementId) -> DriverResult<()> {
        self.observe(self.inner.clear_element(element).await)
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> DriverResult<()> {
        self.observe(self.inner.send_keys(element, text).await)
    }

    async fn element_attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> DriverResult<Option<String>> {
        self.observe(self.inner.element_attribute(element, name).await)
    }

    async fn element_text(&self, element: &ElementId) -> DriverResult<String> {
        self.observe(self.inner.element_text(element).await)
    }

    async fn is_displayed(&self, element: &ElementId) -> DriverResult<bool> {
        self.observe(self.inner.is_displayed(element).await)
    }

    async fn perform_actions(&self, actions: &W3cActions) -> DriverResult<()> {
        self.observe(self.inner.perform_actions(actions).await)
    }

    async fn perform_touch(&self, chain: &TouchChain) -> DriverResult<()> {
        self.observe(self.inner.perform_touch(chain).await)
    }

    async fn execute_device_command(&self, command: &DeviceCommand) -> DriverResult<()> {
        self.observe(self.inner.execute_device_command(command).await)
    }

    async fn page_source(&self) -> DriverResult<String> {
        self.observe(self.inner.page_source().await)
    }

    async fn window_size(&self) -> DriverResult<(u32, u32)> {
        self.observe(self.inner.window_size().await)
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.observe(self.inner.screenshot().await)
    }

    async fn quit(&self) -> DriverResult<()> {
        self.inner.quit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakeSession;

    #[tokio::test]
    async fn test_records_first_fatal_error() {
        let fake = FakeSession::sample_app();
        let state = fake.state();
        let watched = WatchedSession::new(Box::new(fake));

        assert!(watched.fatal_reason().is_none());
        assert!(watched
            .find_element(&By::Id("missing".to_string()))
            .await
            .is_err());
        assert!(watched.fatal_reason().is_none());

        state.lock().unwrap().session_dead = true;
        assert!(watched.page_source().await.is_err());
        let reason = watched.fatal_reason().unwrap();
        assert!(reason.contains("invalid session id") || reason.contains("terminated"));
    }
}
