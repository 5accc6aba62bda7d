use crate::interaction::alert::{DEFAULT_ALERT_SELECTORS, KEYCODE_BACK};
use crate::interaction::{
    FixedDelay, GestureEncoding, Immediate, PollUntilStable, SettleTimings, WaitMode, WaitPolicy,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable overriding the automation server URL
pub const SERVER_ENV: &str = "LUMI_SERVER_URL";

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:4723";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Automation server base URL
    pub server: String,

    /// Capabilities sent as `alwaysMatch` when the session is created
    pub capabilities: Map<String, Value>,

    /// Implicit element wait applied to the session (ms), 0 to skip
    pub implicit_wait_ms: u64,

    /// HTTP timeout per request (s)
    pub request_timeout_secs: u64,

    /// Package namespace for qualified resource ids (e.g. `com.testapp1`)
    pub namespace: Option<String>,

    /// Attribute used in the XPath lookup strategy
    pub locator_attribute: String,

    pub settle: SettleTimings,
    pub wait: WaitMode,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,

    pub gesture: GestureEncoding,
    pub swipe_margin: i32,
    pub swipe_duration_ms: u64,

    /// Alert dismissal selectors, tried in order; `//...` is XPath
    pub alert_selectors: Vec<String>,
    pub back_keycode: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            capabilities: default_capabilities(),
            implicit_wait_ms: 10_000,
            request_timeout_secs: 30,
            namespace: None,
            locator_attribute: "resource-id".to_string(),
            settle: SettleTimings::default(),
            wait: WaitMode::Fixed,
            poll_interval_ms: 250,
            poll_timeout_ms: 5000,
            gesture: GestureEncoding::Auto,
            swipe_margin: 50,
            swipe_duration_ms: 800,
            alert_selectors: DEFAULT_ALERT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            back_keycode: KEYCODE_BACK,
        }
    }
}

fn default_capabilities() -> Map<String, Value> {
    let caps = json!({
        "platformName": "Android",
        "appium:automationName": "UiAutomator2",
        "appium:deviceName": "Android Emulator",
        "appium:newCommandTimeout": 300,
        "appium:noReset": false,
        "appium:ensureWebviewsHavePages": true,
        "appium:nativeWebScreenshot": true,
        "appium:connectHardwareKeyboard": true,
    });
    match caps {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Config {
    /// Defaults, then the optional YAML file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config = serde_yaml::from_str(content)?;
        let overrides = std::mem::replace(&mut config.capabilities, default_capabilities());
        config.merge_capabilities(&overrides);
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(SERVER_ENV) {
            if !url.trim().is_empty() {
                self.server = url.trim().to_string();
            }
        }
    }

    /// Merge capabilities key by key; later values win
    pub fn merge_capabilities(&mut self, extra: &Map<String, Value>) {
        for (key, value) in extra {
            self.capabilities.insert(key.clone(), value.clone());
        }
    }

    pub fn wait_policy(&self) -> Arc<dyn WaitPolicy> {
        match self.wait {
            WaitMode::Fixed => Arc::new(FixedDelay::new(self.settle.clone())),
            WaitMode::Poll => Arc::new(PollUntilStable::new(
                Duration::from_millis(self.poll_interval_ms),
                Duration::from_millis(self.poll_timeout_ms),
            )),
            WaitMode::None => Arc::new(Immediate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.implicit_wait_ms, 10_000);
        assert_eq!(config.back_keycode, 4);
        assert_eq!(
            config.capabilities.get("appium:automationName"),
            Some(&json!("UiAutomator2"))
        );
        assert_eq!(config.alert_selectors[0], "android:id/button1");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
server: http://10.0.2.2:4723
namespace: com.testapp2
wait: poll
gesture: legacy
settle:
  tapMs: 1500
capabilities:
  appium:deviceName: Pixel 7
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.server, "http://10.0.2.2:4723");
        assert_eq!(config.namespace.as_deref(), Some("com.testapp2"));
        assert_eq!(config.wait, WaitMode::Poll);
        assert_eq!(config.gesture, GestureEncoding::Legacy);
        assert_eq!(config.settle.tap_ms, 1500);
        assert_eq!(config.settle.dismiss_ms, 500);
        assert_eq!(config.locator_attribute, "resource-id");
        assert_eq!(
            config.capabilities.get("appium:deviceName"),
            Some(&json!("Pixel 7"))
        );
        assert_eq!(config.capabilities.get("platformName"), Some(&json!("Android")));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("  \n").unwrap();
        assert_eq!(config.swipe_margin, 50);
    }

    #[test]
    fn test_merge_capabilities() {
        let mut config = Config::default();
        let mut extra = Map::new();
        extra.insert("appium:noReset".to_string(), json!(true));
        extra.insert("appium:app".to_string(), json!("/tmp/app.apk"));
        config.merge_capabilities(&extra);

        assert_eq!(config.capabilities.get("appium:noReset"), Some(&json!(true)));
        assert_eq!(config.capabilities.get("platformName"), Some(&json!("Android")));
        assert!(config.capabilities.contains_key("appium:app"));
    }

    #[test]
    fn test_invalid_wait_mode_is_error() {
        assert!(Config::from_yaml("wait: sometimes").is_err());
    }
}
