//! Request payloads for the remote automation protocol
//!
//! Locator queries, W3C pointer action sequences, legacy touch action chains
//! and device commands. Everything here serializes straight into the JSON
//! bodies the Appium server expects.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// W3C element reference key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Legacy (JSON wire protocol) element reference key
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Opaque id of an element on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Element bounding box in screen points
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Rect {
    #[serde(deserialize_with = "round_coord")]
    pub x: i32,
    #[serde(deserialize_with = "round_coord")]
    pub y: i32,
    #[serde(deserialize_with = "round_coord")]
    pub width: i32,
    #[serde(deserialize_with = "round_coord")]
    pub height: i32,
}

// XCUITest reports fractional points, UiAutomator2 integers.
fn round_coord<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as i32)
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }
}

/// A concrete element query as understood by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum By {
    XPath(String),
    Id(String),
    AccessibilityId(String),
    ClassName(String),
}

impl By {
    /// Strategy name on the wire
    pub fn using(&self) -> &'static str {
        match self {
            By::XPath(_) => "xpath",
            By::Id(_) => "id",
            By::AccessibilityId(_) => "accessibility id",
            By::ClassName(_) => "class name",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            By::XPath(v) | By::Id(v) | By::AccessibilityId(v) | By::ClassName(v) => v,
        }
    }

    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "using": self.using(),
            "value": self.value(),
        })
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.using(), self.value())
    }
}

/// Device-level commands that bypass the element tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Android key code (4 = BACK)
    PressKeycode(i32),
}

impl DeviceCommand {
    /// Script and arguments for `execute/sync`
    pub fn to_script(&self) -> (&'static str, serde_json::Value) {
        match self {
            DeviceCommand::PressKeycode(code) => {
                ("mobile: pressKey", serde_json::json!([{ "keycode": code }]))
            }
        }
    }
}

// ============================================================================
// W3C pointer actions
// ============================================================================

/// Body of `POST /session/{id}/actions`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct W3cActions {
    pub actions: Vec<PointerSource>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PointerSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub parameters: PointerParameters,
    pub actions: Vec<PointerAction>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PointerParameters {
    #[serde(rename = "pointerType")]
    pub pointer_type: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum PointerAction {
    #[serde(rename = "pointerMove")]
    Move {
        duration: u64,
        origin: &'static str,
        x: i32,
        y: i32,
    },
    #[serde(rename = "pointerDown")]
    Down { button: u32 },
    #[serde(rename = "pointerUp")]
    Up { button: u32 },
}

impl W3cActions {
    /// Single touch finger source
    pub fn touch(actions: Vec<PointerAction>) -> Self {
        Self {
            actions: vec![PointerSource {
                kind: "pointer",
                id: "finger".to_string(),
                parameters: PointerParameters {
                    pointer_type: "touch",
                },
                actions,
            }],
        }
    }
}

// ============================================================================
// Legacy touch actions
// ============================================================================

/// Body of `POST /session/{id}/touch/perform`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TouchChain {
    pub actions: Vec<TouchStep>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TouchStep {
    pub action: &'static str,
    pub options: TouchOptions,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct TouchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
}

impl TouchStep {
    pub fn at(action: &'static str, x: i32, y: i32) -> Self {
        Self {
            action,
            options: TouchOptions {
                x: Some(x),
                y: Some(y),
                ms: None,
            },
        }
    }

    pub fn wait(ms: u64) -> Self {
        Self {
            action: "wait",
            options: TouchOptions {
                ms: Some(ms),
                ..Default::default()
            },
        }
    }

    pub fn release() -> Self {
        Self {
            action: "release",
            options: TouchOptions::default(),
        }
    }
}
