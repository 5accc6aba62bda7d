use crate::interaction::{LocatorStrategy, SettleKind, SwipeDirection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::PathBuf;

/// Represents a parsed scenario file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioFile {
    #[serde(default)]
    pub name: Option<String>,

    /// Package namespace for qualified resource ids
    #[serde(default, alias = "appId")]
    pub namespace: Option<String>,

    /// Extra capabilities, merged over the configured ones
    #[serde(default)]
    pub capabilities: Option<Map<String, JsonValue>>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-key lookup chains replacing the standard one
    #[serde(default)]
    pub locators: HashMap<String, Vec<LocatorEntry>>,

    /// Filled by the parser, see [`crate::parser::yaml`]
    #[serde(skip)]
    pub steps: Vec<StepDef>,

    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl ScenarioFile {
    /// Header name, else the file stem
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.source
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "scenario".to_string())
    }
}

/// A named step and the commands it runs
#[derive(Debug, Clone, PartialEq)]
pub struct StepDef {
    pub name: String,
    pub commands: Vec<StepCommand>,
}

/// One entry of a `locators:` chain
///
/// ```yaml
/// locators:
///   color-option: [textContains, {attribute: content-desc}, bareId]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocatorEntry {
    Attribute(String),
    BareId,
    Qualified(String),
    AccessibilityId,
    TextContains,
}

impl LocatorEntry {
    pub fn to_strategy(&self) -> LocatorStrategy {
        match self {
            LocatorEntry::Attribute(attribute) => LocatorStrategy::AttributePredicate {
                attribute: attribute.clone(),
            },
            LocatorEntry::BareId => LocatorStrategy::BareId,
            LocatorEntry::Qualified(namespace) => LocatorStrategy::QualifiedId {
                namespace: namespace.clone(),
            },
            LocatorEntry::AccessibilityId => LocatorStrategy::AccessibilityId,
            LocatorEntry::TextContains => LocatorStrategy::TextContains,
        }
    }
}

/// All supported step commands
#[derive(Debug, Clone, PartialEq)]
pub enum StepCommand {
    Click(ClickParams),
    /// Click the first key that can be clicked
    ClickAny(Vec<String>),
    ClickClass(ClickClassParams),
    InputText(InputTextParams),
    ReadText(ReadTextParams),
    AssertText(AssertTextParams),
    DismissAlert,
    Back,
    Settle(SettleParams),
    Swipe(SwipeParams),
    SwipeElement(SwipeElementParams),
    Scroll(ScrollParams),
    VerifyElements(VerifyParams),
    Repeat(RepeatParams),
    Note(String),
}

impl StepCommand {
    /// Short form shown by `check` and in failures
    pub fn display(&self) -> String {
        match self {
            StepCommand::Click(p) => format!("click {}", p.id),
            StepCommand::ClickAny(ids) => format!("clickAny [{}]", ids.join(", ")),
            StepCommand::ClickClass(p) => format!("clickClass {} #{}", p.class, p.index + 1),
            StepCommand::InputText(p) => format!("inputText {} '{}'", p.id, p.text),
            StepCommand::ReadText(p) => format!("readText {}", p.id),
            StepCommand::AssertText(p) => format!("assertText {}", p.id),
            StepCommand::DismissAlert => "dismissAlert".to_string(),
            StepCommand::Back => "back".to_string(),
            StepCommand::Settle(SettleParams::Kind(kind)) => format!("settle {:?}", kind),
            StepCommand::Settle(SettleParams::Millis(ms)) => format!("settle {}ms", ms),
            StepCommand::Swipe(p) => format!(
                "swipe ({},{}) -> ({},{})",
                p.from[0], p.from[1], p.to[0], p.to[1]
            ),
            StepCommand::SwipeElement(p) => format!("swipeElement {} {:?}", p.id, p.direction),
            StepCommand::Scroll(p) => format!("scroll {:?}", p.direction),
            StepCommand::VerifyElements(p) => format!("verifyElements ({} keys)", p.ids.len()),
            StepCommand::Repeat(p) => format!("repeat x{} ({} commands)", p.times, p.commands.len()),
            StepCommand::Note(text) => format!("note '{}'", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickParams {
    pub id: String,

    /// A miss is noted but does not fail the step
    #[serde(default)]
    pub optional: bool,

    /// Scroll the window up once before looking
    #[serde(default)]
    pub scroll_first: bool,
}

impl ClickParams {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            optional: false,
            scroll_first: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickClassParams {
    pub class: String,

    /// 0-based position in tree order
    #[serde(default)]
    pub index: usize,

    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTextParams {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextParams {
    pub id: String,

    /// Variable to store the value in, besides the key itself
    #[serde(default, rename = "as")]
    pub store_as: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertTextParams {
    pub id: String,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub not_equals: Option<String>,

    /// Must differ from the value captured by the last `readText` of this key
    #[serde(default)]
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettleParams {
    Millis(u64),
    Kind(SettleKind),
}

impl Default for SettleParams {
    fn default() -> Self {
        SettleParams::Kind(SettleKind::AfterTap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeParams {
    pub from: [i32; 2],
    pub to: [i32; 2],
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeElementParams {
    pub id: String,
    pub direction: SwipeDirection,
    #[serde(default)]
    pub margin: Option<i32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollParams {
    pub direction: SwipeDirection,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyParams {
    pub ids: Vec<String>,
    #[serde(default)]
    pub scroll_retry: bool,

    /// Pass the step even when some keys are missing
    #[serde(default)]
    pub allow_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatParams {
    pub times: u32,
    pub commands: Vec<StepCommand>,
}
