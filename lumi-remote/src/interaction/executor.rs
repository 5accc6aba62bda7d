//! Click and type on resolved elements
//!
//! Faults never escape: a failed tap or keystroke becomes
//! [`InteractionResult::TransportError`] and, through the bool forms, `false`.
//! A value that went through but renders differently is a
//! [`InteractionResult::Mismatch`].

use super::locator::UiElementHandle;
use super::wait::{SettleKind, WaitPolicy};
use crate::driver::{DriverError, ErrorKind, RemoteSession};
use std::fmt;
use std::sync::Arc;

/// Attribute holding the raw text of an input on Android
pub const RAW_TEXT_ATTRIBUTE: &str = "text";

/// Outcome of a single interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionResult {
    Success(Option<String>),
    NotFound(Option<String>),
    TransportError(Option<String>),
    /// The action went through but the element does not show the expected value
    Mismatch(Option<String>),
}

impl InteractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InteractionResult::Success(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            InteractionResult::Success(m)
            | InteractionResult::NotFound(m)
            | InteractionResult::TransportError(m)
            | InteractionResult::Mismatch(m) => m.as_deref(),
        }
    }

    pub(crate) fn from_error(err: &DriverError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => InteractionResult::NotFound(Some(err.to_string())),
            ErrorKind::Transport | ErrorKind::SessionFatal => {
                InteractionResult::TransportError(Some(err.to_string()))
            }
        }
    }
}

impl fmt::Display for InteractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            InteractionResult::Success(_) => "success",
            InteractionResult::NotFound(_) => "not found",
            InteractionResult::TransportError(_) => "transport error",
            InteractionResult::Mismatch(_) => "mismatch",
        };
        match self.message() {
            Some(m) => write!(f, "{}: {}", tag, m),
            None => f.write_str(tag),
        }
    }
}

pub struct InteractionExecutor {
    wait: Arc<dyn WaitPolicy>,
}

impl InteractionExecutor {
    pub fn new(wait: Arc<dyn WaitPolicy>) -> Self {
        Self { wait }
    }

    /// Tap the element, then settle
    pub async fn click_checked(
        &self,
        session: &dyn RemoteSession,
        handle: UiElementHandle,
    ) -> InteractionResult {
        match session.click_element(handle.element()).await {
            Ok(()) => {
                self.wait.settle(session, SettleKind::AfterTap).await;
                InteractionResult::Success(Some(format!(
                    "clicked {} ({})",
                    handle.key(),
                    handle.matched_by().label()
                )))
            }
            Err(e) => {
                log::warn!("Click on '{}' failed: {}", handle.key(), e);
                InteractionResult::from_error(&e)
            }
        }
    }

    pub async fn click(&self, session: &dyn RemoteSession, handle: UiElementHandle) -> bool {
        self.click_checked(session, handle).await.is_success()
    }

    /// Replace the element's content and confirm the new value rendered
    ///
    /// Read-back uses containment rather than equality because rendering may
    /// normalize case or whitespace.
    pub async fn type_text_checked(
        &self,
        session: &dyn RemoteSession,
        handle: UiElementHandle,
        text: &str,
    ) -> InteractionResult {
        let element = handle.element();

        if let Err(e) = session.clear_element(element).await {
            log::warn!("Clearing '{}' failed: {}", handle.key(), e);
            return InteractionResult::from_error(&e);
        }
        self.wait.settle(session, SettleKind::AfterInput).await;

        if let Err(e) = session.send_keys(element, text).await {
            log::warn!("Typing into '{}' failed: {}", handle.key(), e);
            return InteractionResult::from_error(&e);
        }
        self.wait.settle(session, SettleKind::AfterInput).await;

        match read_rendered(session, &handle).await {
            Some(rendered) if rendered_matches(&rendered, text) => {
                InteractionResult::Success(Some(rendered))
            }
            Some(rendered) => InteractionResult::Mismatch(Some(format!(
                "'{}' reads back as '{}'",
                handle.key(),
                rendered
            ))),
            None => InteractionResult::Mismatch(Some(format!(
                "could not read back '{}'",
                handle.key()
            ))),
        }
    }

    pub async fn type_text(
        &self,
        session: &dyn RemoteSession,
        handle: UiElementHandle,
        text: &str,
    ) -> bool {
        self.type_text_checked(session, handle, text)
            .await
            .is_success()
    }

    /// Current rendered value of the element
    pub async fn read_text(
        &self,
        session: &dyn RemoteSession,
        handle: &UiElementHandle,
    ) -> Option<String> {
        read_rendered(session, handle).await
    }

    pub async fn is_displayed(&self, session: &dyn RemoteSession, handle: &UiElementHandle) -> bool {
        session
            .is_displayed(handle.element())
            .await
            .unwrap_or(false)
    }
}

fn rendered_matches(rendered: &str, intended: &str) -> bool {
    rendered.contains(intended)
}

/// Raw text attribute first, displayed label second
async fn read_rendered(session: &dyn RemoteSession, handle: &UiElementHandle) -> Option<String> {
    match session
        .element_attribute(handle.element(), RAW_TEXT_ATTRIBUTE)
        .await
    {
        Ok(Some(value)) => return Some(value),
        Ok(None) => {}
        Err(e) => log::debug!("Attribute read on '{}' failed: {}", handle.key(), e),
    }

    match session.element_text(handle.element()).await {
        Ok(label) => Some(label),
        Err(e) => {
            log::debug!("Label read on '{}' failed: {}", handle.key(), e);
            None
        }
    }
}
