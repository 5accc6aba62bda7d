//! Modal interruption recovery
//!
//! Confirmation dialogs pop up after many actions in the sample apps. Before
//! continuing, a step tries the known dismissal buttons in order; when none
//! of them can be clicked it presses the hardware back key instead.

use super::wait::{SettleKind, WaitPolicy};
use crate::driver::{By, DeviceCommand, RemoteSession};
use std::sync::Arc;

/// Android BACK key code
pub const KEYCODE_BACK: i32 = 4;

/// Default dismissal selectors, in the order they are tried
pub const DEFAULT_ALERT_SELECTORS: &[&str] = &["android:id/button1", "//*[@text='OK']", "//*[@text='ok']"];

/// Turn a selector string into a query: `//...` is XPath, anything else an id
pub fn parse_selector(selector: &str) -> By {
    if selector.starts_with("//") || selector.starts_with("(//") {
        By::XPath(selector.to_string())
    } else {
        By::Id(selector.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertState {
    MaybeInterrupted,
    Dismissed(AlertOutcome),
}

/// How the interruption was cleared
///
/// There is no "nothing to dismiss" outcome: when no button matches, the
/// back key is pressed without knowing whether a dialog was up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    DismissedByButton { selector: String },
    DismissedByFallback,
}

pub struct AlertRecovery {
    selectors: Vec<By>,
    back_keycode: i32,
    wait: Arc<dyn WaitPolicy>,
}

impl AlertRecovery {
    pub fn new(selectors: &[String], back_keycode: i32, wait: Arc<dyn WaitPolicy>) -> Self {
        Self {
            selectors: selectors.iter().map(|s| parse_selector(s)).collect(),
            back_keycode,
            wait,
        }
    }

    pub fn with_defaults(wait: Arc<dyn WaitPolicy>) -> Self {
        let selectors: Vec<String> = DEFAULT_ALERT_SELECTORS
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::new(&selectors, KEYCODE_BACK, wait)
    }

    pub fn back_keycode(&self) -> i32 {
        self.back_keycode
    }

    /// Advance the state machine by one transition
    async fn step(&self, session: &dyn RemoteSession, state: AlertState) -> AlertState {
        match state {
            AlertState::MaybeInterrupted => {
                for by in &self.selectors {
                    let element = match session.find_element(by).await {
                        Ok(element) => element,
                        Err(e) => {
                            log::trace!("Alert selector {} did not match: {}", by, e);
                            continue;
                        }
                    };
                    match session.click_element(&element).await {
                        Ok(()) => {
                            self.wait.settle(session, SettleKind::AfterDismiss).await;
                            return AlertState::Dismissed(AlertOutcome::DismissedByButton {
                                selector: by.value().to_string(),
                            });
                        }
                        Err(e) => log::debug!("Alert button {} not clickable: {}", by, e),
                    }
                }

                let back = DeviceCommand::PressKeycode(self.back_keycode);
                if let Err(e) = session.execute_device_command(&back).await {
                    log::warn!("Back navigation failed: {}", e);
                }
                AlertState::Dismissed(AlertOutcome::DismissedByFallback)
            }
            dismissed => dismissed,
        }
    }

    /// Clear an interruption if there is one
    pub async fn dismiss(&self, session: &dyn RemoteSession) -> AlertOutcome {
        let mut state = AlertState::MaybeInterrupted;
        loop {
            state = self.step(session, state).await;
            if let AlertState::Dismissed(outcome) = state {
                return outcome;
            }
        }
    }

    /// Always true, see [`AlertOutcome`]
    pub async fn dismiss_if_present(&self, session: &dyn RemoteSession) -> bool {
        match self.dismiss(session).await {
            AlertOutcome::DismissedByButton { .. } | AlertOutcome::DismissedByFallback => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{Call, FakeSession, ALERT_BUTTON_ID};
    use crate::interaction::wait::Immediate;

    fn recovery() -> AlertRecovery {
        AlertRecovery::with_defaults(Arc::new(Immediate))
    }

    #[test]
    fn test_parse_selector() {
        assert_eq!(
            parse_selector("android:id/button1"),
            By::Id("android:id/button1".to_string())
        );
        assert_eq!(
            parse_selector("//*[@text='OK']"),
            By::XPath("//*[@text='OK']".to_string())
        );
    }

    #[tokio::test]
    async fn test_dismiss_by_confirm_button() {
        let fake = FakeSession::sample_app();
        fake.state().lock().unwrap().open_alert();

        let outcome = recovery().dismiss(&fake).await;
        assert_eq!(
            outcome,
            AlertOutcome::DismissedByButton {
                selector: ALERT_BUTTON_ID.to_string()
            }
        );
        assert!(!fake.state().lock().unwrap().alert_open());
    }

    #[tokio::test]
    async fn test_dismiss_by_text_when_id_hidden() {
        let fake = FakeSession::sample_app();
        {
            let state = fake.state();
            let mut state = state.lock().unwrap();
            state.open_alert();
            state.element_mut(ALERT_BUTTON_ID).unwrap().by_bare_id = false;
        }

        let outcome = recovery().dismiss(&fake).await;
        assert_eq!(
            outcome,
            AlertOutcome::DismissedByButton {
                selector: "//*[@text='OK']".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fallback_to_back_key() {
        let fake = FakeSession::sample_app();
        assert!(recovery().dismiss_if_present(&fake).await);

        let state = fake.state();
        let state = state.lock().unwrap();
        assert!(state
            .calls
            .contains(&Call::Device(DeviceCommand::PressKeycode(KEYCODE_BACK))));
    }

    #[tokio::test]
    async fn test_true_even_when_session_is_dead() {
        let fake = FakeSession::sample_app();
        fake.state().lock().unwrap().session_dead = true;
        assert!(recovery().dismiss_if_present(&fake).await);
    }
}
