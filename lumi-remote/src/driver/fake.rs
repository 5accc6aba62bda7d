//! In-memory session used by unit tests
//!
//! Models a small React Native sample app: a title, a button that bumps a
//! counter and raises a confirmation alert, a text input with a submit button,
//! a swipe area and two switches. Lookups follow the same rules as
//! UiAutomator2 closely enough to exercise the locator fallback chain.

use super::actions::{By, DeviceCommand, ElementId, Rect, TouchChain, W3cActions};
use super::error::{DriverError, DriverResult};
use super::traits::RemoteSession;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub const ALERT_BUTTON_ID: &str = "android:id/button1";

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub element_id: String,
    pub resource_id: String,
    pub class: String,
    pub text: String,
    pub description: String,
    pub rect: Rect,
    pub displayed: bool,
    /// Whether the `text` attribute is exposed (otherwise only the label is)
    pub text_attribute: bool,
    /// Reachable through XPath predicates
    pub by_xpath: bool,
    /// Reachable through a bare `id` lookup
    pub by_bare_id: bool,
    /// Namespace under which a qualified `id` lookup matches
    pub qualified_ns: Option<String>,
}

impl FakeElement {
    pub fn new(resource_id: &str, class: &str, text: &str, rect: Rect) -> Self {
        Self {
            element_id: String::new(),
            resource_id: resource_id.to_string(),
            class: class.to_string(),
            text: text.to_string(),
            description: String::new(),
            rect,
            displayed: true,
            text_attribute: true,
            by_xpath: true,
            by_bare_id: true,
            qualified_ns: None,
        }
    }
}

/// Recorded session traffic
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find(By),
    Click(String),
    Clear(String),
    SendKeys(String, String),
    Actions(W3cActions),
    Touch(TouchChain),
    Device(DeviceCommand),
    Screenshot,
    Quit,
}

#[derive(Debug)]
pub struct FakeState {
    pub elements: Vec<FakeElement>,
    pub calls: Vec<Call>,
    pub session_dead: bool,
    pub w3c_actions: bool,
    pub legacy_touch: bool,
    pub xpath_supported: bool,
    /// Resource ids whose clicks fail with a protocol error
    pub failing_clicks: HashSet<String>,
    /// Resource ids whose send-keys fail with a protocol error
    pub failing_inputs: HashSet<String>,
    /// Resource ids that render typed text as bullets, like password fields
    pub masked_inputs: HashSet<String>,
    pub counter: u32,
    pub window: (u32, u32),
    /// Page source differs on every read, like a running animation
    pub volatile_source: bool,
    pub source_reads: u32,
    next_id: usize,
}

impl FakeState {
    fn new(elements: Vec<FakeElement>) -> Self {
        let mut state = Self {
            elements: Vec::new(),
            calls: Vec::new(),
            session_dead: false,
            w3c_actions: true,
            legacy_touch: true,
            xpath_supported: true,
            failing_clicks: HashSet::new(),
            failing_inputs: HashSet::new(),
            masked_inputs: HashSet::new(),
            counter: 0,
            window: (1080, 2280),
            volatile_source: false,
            source_reads: 0,
            next_id: 0,
        };
        for element in elements {
            state.insert(element);
        }
        state
    }

    pub fn insert(&mut self, mut element: FakeElement) {
        self.next_id += 1;
        element.element_id = format!("el-{}", self.next_id);
        self.elements.push(element);
    }

    pub fn remove(&mut self, resource_id: &str) {
        self.elements.retain(|e| e.resource_id != resource_id);
    }

    pub fn element_mut(&mut self, resource_id: &str) -> Option<&mut FakeElement> {
        self.elements
            .iter_mut()
            .find(|e| e.resource_id == resource_id)
    }

    pub fn text_of(&self, resource_id: &str) -> Option<String> {
        self.elements
            .iter()
            .find(|e| e.resource_id == resource_id)
            .map(|e| e.text.clone())
    }

    pub fn alert_open(&self) -> bool {
        self.elements.iter().any(|e| e.resource_id == ALERT_BUTTON_ID)
    }

    pub fn quit_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Quit)).count()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Click(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn open_alert(&mut self) {
        if !self.alert_open() {
            self.insert(FakeElement::new(
                ALERT_BUTTON_ID,
                "android.widget.Button",
                "OK",
                Rect::new(800, 1300, 200, 100),
            ));
        }
    }

    fn check_alive(&self) -> DriverResult<()> {
        if self.session_dead {
            Err(DriverError::from_w3c(
                "invalid session id",
                "A session is either terminated or not started",
            ))
        } else {
            Ok(())
        }
    }

    fn by_element_id(&self, element: &ElementId) -> DriverResult<&FakeElement> {
        self.elements
            .iter()
            .find(|e| e.element_id == element.as_str())
            .ok_or_else(|| DriverError::from_w3c("stale element reference", element.as_str()))
    }

    fn matches(&self, by: &By) -> DriverResult<Vec<&FakeElement>> {
        let found = match by {
            By::XPath(expr) => {
                if !self.xpath_supported {
                    return Err(DriverError::from_w3c(
                        "invalid selector",
                        "Locator Strategy 'xpath' is not supported",
                    ));
                }
                let (attr, value, contains) = parse_xpath(expr).ok_or_else(|| {
                    DriverError::from_w3c("invalid selector", &format!("Cannot evaluate {}", expr))
                })?;
                self.elements
                    .iter()
                    .filter(|e| e.by_xpath)
                    .filter(|e| {
                        let actual = match attr.as_str() {
                            "resource-id" => &e.resource_id,
                            "text" => &e.text,
                            "content-desc" => &e.description,
                            "class" => &e.class,
                            _ => return false,
                        };
                        if contains {
                            actual.contains(&value)
                        } else {
                            *actual == value
                        }
                    })
                    .collect()
            }
            By::Id(value) => self
                .elements
                .iter()
                .filter(|e| {
                    (e.by_bare_id && e.resource_id == *value)
                        || e.qualified_ns
                            .as_ref()
                            .map(|ns| format!("{}:id/{}", ns, e.resource_id) == *value)
                            .unwrap_or(false)
                })
                .collect(),
            By::AccessibilityId(value) => self
                .elements
                .iter()
                .filter(|e| !e.description.is_empty() && e.description == *value)
                .collect(),
            By::ClassName(value) => self.elements.iter().filter(|e| e.class == *value).collect(),
        };
        Ok(found)
    }

    fn apply_click(&mut self, resource_id: &str) {
        match resource_id {
            "test-button" => {
                self.counter += 1;
                let label = format!("{} times", self.counter);
                if let Some(counter) = self.element_mut("button-counter") {
                    counter.text = label;
                }
                self.open_alert();
            }
            "submit-button" => self.open_alert(),
            ALERT_BUTTON_ID => self.remove(ALERT_BUTTON_ID),
            "notifications-switch" => {
                if let Some(status) = self.element_mut("switch-status") {
                    status.text = "Notifications: ON".to_string();
                }
            }
            _ => {}
        }
    }
}

fn parse_xpath(expr: &str) -> Option<(String, String, bool)> {
    let exact = Regex::new(r#"^//\*\[@([\w-]+)=(?:'([^']*)'|"([^"]*)")\]$"#).ok()?;
    let contains = Regex::new(r#"^//\*\[contains\(@([\w-]+),\s*(?:'([^']*)'|"([^"]*)")\)\]$"#).ok()?;

    let (caps, is_contains) = match exact.captures(expr) {
        Some(caps) => (caps, false),
        None => (contains.captures(expr)?, true),
    };
    let attr = caps.get(1)?.as_str().to_string();
    let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
    Some((attr, value, is_contains))
}

/// Test double for [`RemoteSession`]
pub struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    pub fn new(elements: Vec<FakeElement>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::new(elements))),
        }
    }

    /// The sample app right after launch
    pub fn sample_app() -> Self {
        let mut first_switch = FakeElement::new(
            "notifications-switch",
            "android.widget.Switch",
            "",
            Rect::new(900, 1900, 120, 60),
        );
        first_switch.by_xpath = false;
        first_switch.by_bare_id = false;

        Self::new(vec![
            FakeElement::new(
                "app-title",
                "android.widget.TextView",
                "Appium Test App",
                Rect::new(0, 120, 1080, 90),
            ),
            FakeElement::new(
                "test-button",
                "android.widget.Button",
                "Press Me",
                Rect::new(340, 300, 400, 120),
            ),
            FakeElement::new(
                "button-counter",
                "android.widget.TextView",
                "0 times",
                Rect::new(340, 440, 400, 60),
            ),
            FakeElement::new(
                "text-input",
                "android.widget.EditText",
                "",
                Rect::new(60, 560, 960, 120),
            ),
            FakeElement::new(
                "submit-button",
                "android.widget.Button",
                "Submit",
                Rect::new(340, 700, 400, 120),
            ),
            FakeElement::new(
                "swipe-area",
                "android.view.ViewGroup",
                "",
                Rect::new(0, 1000, 1080, 800),
            ),
            first_switch,
            FakeElement::new(
                "dark-mode-switch",
                "android.widget.Switch",
                "",
                Rect::new(900, 2000, 120, 60),
            ),
            FakeElement::new(
                "switch-status",
                "android.widget.TextView",
                "Notifications: OFF",
                Rect::new(60, 2100, 960, 60),
            ),
        ])
    }

    pub fn state(&self) -> Arc<Mutex<FakeState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    fn session_id(&self) -> &str {
        "fake-session"
    }

    async fn find_element(&self, by: &By) -> DriverResult<ElementId> {
        let mut state = self.lock();
        state.calls.push(Call::Find(by.clone()));
        state.check_alive()?;
        let found = state.matches(by)?;
        found
            .first()
            .map(|e| ElementId(e.element_id.clone()))
            .ok_or_else(|| {
                DriverError::from_w3c(
                    "no such element",
                    &format!("An element could not be located using {}", by),
                )
            })
    }

    async fn find_elements(&self, by: &By) -> DriverResult<Vec<ElementId>> {
        let mut state = self.lock();
        state.calls.push(Call::Find(by.clone()));
        state.check_alive()?;
        let found = state.matches(by)?;
        Ok(found
            .iter()
            .map(|e| ElementId(e.element_id.clone()))
            .collect())
    }

    async fn element_rect(&self, element: &ElementId) -> DriverResult<Rect> {
        let state = self.lock();
        state.check_alive()?;
        Ok(state.by_element_id(element)?.rect)
    }

    async fn click_element(&self, element: &ElementId) -> DriverResult<()> {
        let mut state = self.lock();
        state.check_alive()?;
        let resource_id = state.by_element_id(element)?.resource_id.clone();
        state.calls.push(Call::Click(resource_id.clone()));
        if state.failing_clicks.contains(&resource_id) {
            return Err(DriverError::from_w3c(
                "unknown error",
                "An unknown server-side error occurred",
            ));
        }
        state.apply_click(&resource_id);
        Ok(())
    }

    async fn clear_element(&self, element: &ElementId) -> DriverResult<()> {
        let mut state = self.lock();
        state.check_alive()?;
        let resource_id = state.by_element_id(element)?.resource_id.clone();
        state.calls.push(Call::Clear(resource_id.clone()));
        if let Some(e) = state.element_mut(&resource_id) {
            e.text.clear();
        }
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.check_alive()?;
        let resource_id = state.by_element_id(element)?.resource_id.clone();
        state
            .calls
            .push(Call::SendKeys(resource_id.clone(), text.to_string()));
        if state.failing_inputs.contains(&resource_id) {
            return Err(DriverError::from_w3c(
                "element not interactable",
                "Cannot set the element's value",
            ));
        }
        let rendered = if state.masked_inputs.contains(&resource_id) {
            "•".repeat(text.chars().count())
        } else {
            text.to_string()
        };
        if let Some(e) = state.element_mut(&resource_id) {
            e.text.push_str(&rendered);
        }
        Ok(())
    }

    async fn element_attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> DriverResult<Option<String>> {
        let state = self.lock();
        state.check_alive()?;
        let e = state.by_element_id(element)?;
        Ok(match name {
            "text" if e.text_attribute => Some(e.text.clone()),
            "resource-id" => Some(e.resource_id.clone()),
            "class" => Some(e.class.clone()),
            _ => None,
        })
    }

    async fn element_text(&self, element: &ElementId) -> DriverResult<String> {
        let state = self.lock();
        state.check_alive()?;
        Ok(state.by_element_id(element)?.text.clone())
    }

    async fn is_displayed(&self, element: &ElementId) -> DriverResult<bool> {
        let state = self.lock();
        state.check_alive()?;
        Ok(state.by_element_id(element)?.displayed)
    }

    async fn perform_actions(&self, actions: &W3cActions) -> DriverResult<()> {
        let mut state = self.lock();
        state.check_alive()?;
        if !state.w3c_actions {
            return Err(DriverError::from_w3c(
                "unknown command",
                "The requested resource could not be found",
            ));
        }
        state.calls.push(Call::Actions(actions.clone()));
        Ok(())
    }

    async fn perform_touch(&self, chain: &TouchChain) -> DriverResult<()> {
        let mut state = self.lock();
        state.check_alive()?;
        if !state.legacy_touch {
            return Err(DriverError::from_w3c(
                "unknown method",
                "touch/perform is not supported",
            ));
        }
        state.calls.push(Call::Touch(chain.clone()));
        Ok(())
    }

    async fn execute_device_command(&self, command: &DeviceCommand) -> DriverResult<()> {
        let mut state = self.lock();
        state.check_alive()?;
        state.calls.push(Call::Device(command.clone()));
        if *command == DeviceCommand::PressKeycode(4) {
            state.remove(ALERT_BUTTON_ID);
        }
        Ok(())
    }

    async fn page_source(&self) -> DriverResult<String> {
        let mut state = self.lock();
        state.check_alive()?;
        state.source_reads += 1;
        let mut nodes: Vec<String> = state
            .elements
            .iter()
            .map(|e| {
                format!(
                    r#"<{} resource-id="{}" text="{}"/>"#,
                    e.class, e.resource_id, e.text
                )
            })
            .collect();
        if state.volatile_source {
            nodes.push(format!(r#"<android.widget.ProgressBar progress="{}"/>"#, state.source_reads));
        }
        Ok(format!("<hierarchy>{}</hierarchy>", nodes.join("")))
    }

    async fn window_size(&self) -> DriverResult<(u32, u32)> {
        let state = self.lock();
        state.check_alive()?;
        Ok(state.window)
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let mut state = self.lock();
        state.check_alive()?;
        state.calls.push(Call::Screenshot);
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn quit(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::Quit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xpath_forms() {
        assert_eq!(
            parse_xpath("//*[@resource-id='app-title']"),
            Some(("resource-id".to_string(), "app-title".to_string(), false))
        );
        assert_eq!(
            parse_xpath(r#"//*[@text="it's"]"#),
            Some(("text".to_string(), "it's".to_string(), false))
        );
        assert_eq!(
            parse_xpath("//*[contains(@text, 'Red')]"),
            Some(("text".to_string(), "Red".to_string(), true))
        );
        assert_eq!(parse_xpath("//android.widget.Button"), None);
    }

    #[tokio::test]
    async fn test_sample_button_raises_alert() {
        let fake = FakeSession::sample_app();
        let id = fake
            .find_element(&By::Id("test-button".to_string()))
            .await
            .unwrap();
        fake.click_element(&id).await.unwrap();

        let state = fake.state();
        let state = state.lock().unwrap();
        assert!(state.alert_open());
        assert_eq!(state.text_of("button-counter").unwrap(), "1 times");
    }
}
