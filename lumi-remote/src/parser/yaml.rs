use super::types::{
    AssertTextParams, ClickClassParams, ClickParams, InputTextParams, ReadTextParams,
    RepeatParams, ScenarioFile, ScrollParams, SettleParams, StepCommand, StepDef,
    SwipeElementParams, SwipeParams, VerifyParams,
};
use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::Path;

/// Parse a YAML scenario file
pub fn parse_scenario_file(path: &Path) -> Result<ScenarioFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let mut scenario = parse_yaml_content(&content)
        .with_context(|| format!("Failed to parse scenario: {}", path.display()))?;
    scenario.source = Some(path.to_path_buf());
    Ok(scenario)
}

/// Parse YAML content into a ScenarioFile
///
/// Accepts a header followed by a `---` line and the step list, a bare step
/// list, or a single mapping with a `steps` field.
pub fn parse_yaml_content(content: &str) -> Result<ScenarioFile> {
    // 1. Header / steps split on a `---` line
    if let Some((header, steps_yaml)) = split_document(content) {
        let mut scenario = if header.trim().is_empty() {
            ScenarioFile::default()
        } else {
            serde_yaml::from_str::<ScenarioFile>(header).context("Failed to parse YAML header")?
        };
        scenario.steps = parse_steps(steps_yaml)?;
        return Ok(scenario);
    }

    let value: Value = serde_yaml::from_str(content).context("Failed to parse YAML content")?;
    match value {
        // 2. Bare list of steps
        Value::Sequence(_) => Ok(ScenarioFile {
            steps: parse_steps_from_value(&value)?,
            ..Default::default()
        }),

        // 3. Single mapping with a `steps` field
        Value::Mapping(ref map) => {
            let mut scenario: ScenarioFile =
                serde_yaml::from_value(value.clone()).context("Failed to parse scenario header")?;
            if let Some(steps) = map.get(&Value::String("steps".to_string())) {
                scenario.steps = parse_steps_from_value(steps)?;
            }
            Ok(scenario)
        }

        Value::Null => Ok(ScenarioFile::default()),

        _ => anyhow::bail!("Invalid YAML format: expected step list or scenario mapping"),
    }
}

fn split_document(content: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&content[..offset], &content[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_steps(yaml: &str) -> Result<Vec<StepDef>> {
    let yaml = yaml.trim();
    if yaml.is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_yaml::from_str(yaml).context("Failed to parse YAML steps")?;
    parse_steps_from_value(&value)
}

/// Parse a list of `{step, do}` entries
pub fn parse_steps_from_value(value: &Value) -> Result<Vec<StepDef>> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| anyhow::anyhow!("Steps must be a list"))?;

    let mut steps = Vec::with_capacity(seq.len());
    for (i, item) in seq.iter().enumerate() {
        let step = parse_step_value(item).with_context(|| format!("In step #{}", i + 1))?;
        steps.push(step);
    }
    Ok(steps)
}

fn parse_step_value(value: &Value) -> Result<StepDef> {
    let map = value
        .as_mapping()
        .ok_or_else(|| anyhow::anyhow!("Invalid step: expected `step:` and `do:`"))?;

    let name = map
        .get(&Value::String("step".to_string()))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Step is missing a `step:` name"))?
        .to_string();

    let commands = match map.get(&Value::String("do".to_string())) {
        Some(cmds) => parse_commands_from_value(cmds).with_context(|| format!("In '{}'", name))?,
        None => Vec::new(),
    };

    Ok(StepDef { name, commands })
}

/// Parse a list of commands from a YAML value
pub fn parse_commands_from_value(value: &Value) -> Result<Vec<StepCommand>> {
    match value {
        Value::Sequence(seq) => seq.iter().map(parse_command_value).collect(),
        Value::Null => Ok(Vec::new()),
        _ => Ok(vec![parse_command_value(value)?]),
    }
}

/// Parse a single command from a YAML value
pub fn parse_command_value(value: &Value) -> Result<StepCommand> {
    match value {
        // Simple string command like "- dismissAlert" or "- back"
        Value::String(s) => parse_simple_command(s)?
            .ok_or_else(|| anyhow::anyhow!("Unknown command: {}", s)),

        // Command with parameters like "- click: test-button"
        Value::Mapping(map) => {
            let mut entries = map.iter();
            let (key, params) = match (entries.next(), entries.next()) {
                (Some(entry), None) => entry,
                _ => anyhow::bail!("Invalid command format: expected single key mapping"),
            };
            let name = key
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Command name must be a string"))?;

            if params.is_null() {
                if let Some(cmd) = parse_simple_command(name)? {
                    return Ok(cmd);
                }
            }
            parse_command_with_params(name, params)
        }

        _ => anyhow::bail!("Invalid command format: {:?}", value),
    }
}

/// Parse a command without parameters
fn parse_simple_command(name: &str) -> Result<Option<StepCommand>> {
    let cmd = match name {
        "dismissAlert" | "dismiss" => StepCommand::DismissAlert,
        "back" | "pressBack" => StepCommand::Back,
        "settle" | "wait" => StepCommand::Settle(SettleParams::default()),
        "scrollUp" => StepCommand::Scroll(ScrollParams {
            direction: crate::interaction::SwipeDirection::Up,
            duration_ms: None,
        }),
        "scrollDown" => StepCommand::Scroll(ScrollParams {
            direction: crate::interaction::SwipeDirection::Down,
            duration_ms: None,
        }),
        _ => return Ok(None),
    };
    Ok(Some(cmd))
}

/// Parse a command with parameters
fn parse_command_with_params(name: &str, params: &Value) -> Result<StepCommand> {
    let cmd = match name {
        "click" | "tap" => match params.as_str() {
            Some(id) => StepCommand::Click(ClickParams::new(id)),
            None => StepCommand::Click(serde_yaml::from_value(params.clone())?),
        },

        "clickAny" => {
            let ids: Vec<String> = serde_yaml::from_value(params.clone())
                .context("clickAny expects a list of keys")?;
            if ids.is_empty() {
                anyhow::bail!("clickAny needs at least one key");
            }
            StepCommand::ClickAny(ids)
        }

        "clickClass" => match params.as_str() {
            Some(class) => StepCommand::ClickClass(ClickClassParams {
                class: class.to_string(),
                index: 0,
                optional: false,
            }),
            None => StepCommand::ClickClass(serde_yaml::from_value(params.clone())?),
        },

        "inputText" | "type" => {
            let p: InputTextParams = serde_yaml::from_value(params.clone())
                .context("inputText expects `id` and `text`")?;
            StepCommand::InputText(p)
        }

        "readText" | "read" => match params.as_str() {
            Some(id) => StepCommand::ReadText(ReadTextParams {
                id: id.to_string(),
                store_as: None,
            }),
            None => StepCommand::ReadText(serde_yaml::from_value(params.clone())?),
        },

        "assertText" => {
            let p: AssertTextParams = serde_yaml::from_value(params.clone())?;
            if p.contains.is_none() && p.equals.is_none() && p.not_equals.is_none() && !p.changed {
                anyhow::bail!(
                    "assertText on '{}' needs one of contains, equals, notEquals, changed",
                    p.id
                );
            }
            StepCommand::AssertText(p)
        }

        "settle" | "wait" => StepCommand::Settle(
            serde_yaml::from_value(params.clone())
                .context("settle expects milliseconds or afterTap/afterInput/afterDismiss/afterGesture")?,
        ),

        "swipe" => {
            let p: SwipeParams = serde_yaml::from_value(params.clone())
                .context("swipe expects `from: [x, y]` and `to: [x, y]`")?;
            StepCommand::Swipe(p)
        }

        "swipeElement" => {
            let p: SwipeElementParams = serde_yaml::from_value(params.clone())?;
            StepCommand::SwipeElement(p)
        }

        "scroll" => {
            if params.is_string() {
                StepCommand::Scroll(ScrollParams {
                    direction: serde_yaml::from_value(params.clone())?,
                    duration_ms: None,
                })
            } else {
                StepCommand::Scroll(serde_yaml::from_value(params.clone())?)
            }
        }

        "verifyElements" | "verify" => {
            if params.is_sequence() {
                StepCommand::VerifyElements(VerifyParams {
                    ids: serde_yaml::from_value(params.clone())?,
                    scroll_retry: false,
                    allow_missing: false,
                })
            } else {
                StepCommand::VerifyElements(serde_yaml::from_value(params.clone())?)
            }
        }

        "repeat" => {
            let map = params
                .as_mapping()
                .ok_or_else(|| anyhow::anyhow!("repeat requires a mapping"))?;
            let times = map
                .get(&Value::String("times".to_string()))
                .and_then(|v| v.as_u64())
                .ok_or_else(|| anyhow::anyhow!("repeat requires `times`"))? as u32;
            let cmds_val = map
                .get(&Value::String("commands".to_string()))
                .or_else(|| map.get(&Value::String("do".to_string())))
                .ok_or_else(|| anyhow::anyhow!("repeat requires commands"))?;
            let commands = parse_commands_from_value(cmds_val)?;
            StepCommand::Repeat(RepeatParams { times, commands })
        }

        "note" | "echo" => {
            let text = params
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("note expects a string"))?;
            StepCommand::Note(text.to_string())
        }

        "dismissAlert" | "dismiss" | "back" | "pressBack" => parse_simple_command(name)?
            .ok_or_else(|| anyhow::anyhow!("Unknown command: {}", name))?,

        _ => anyhow::bail!("Unknown command: {}", name),
    };

    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{SettleKind, SwipeDirection};
    use crate::parser::types::LocatorEntry;

    #[test]
    fn test_parse_header_and_steps() {
        let yaml = r#"
name: Test App 1
namespace: com.testapp1
env:
  GREETING: Hello Appium!
---
- step: App launch verification
  do:
    - assertText: {id: app-title, contains: Appium Test App}
- step: Button interaction
  do:
    - readText: button-counter
    - click: test-button
    - dismissAlert
    - settle: afterInput
    - assertText: {id: button-counter, changed: true}
"#;
        let scenario = parse_yaml_content(yaml).unwrap();
        assert_eq!(scenario.name.as_deref(), Some("Test App 1"));
        assert_eq!(scenario.namespace.as_deref(), Some("com.testapp1"));
        assert_eq!(scenario.env.get("GREETING").unwrap(), "Hello Appium!");
        assert_eq!(scenario.steps.len(), 2);

        let button = &scenario.steps[1];
        assert_eq!(button.commands.len(), 5);
        assert_eq!(
            button.commands[1],
            StepCommand::Click(ClickParams::new("test-button"))
        );
        assert_eq!(button.commands[2], StepCommand::DismissAlert);
        assert_eq!(
            button.commands[3],
            StepCommand::Settle(SettleParams::Kind(SettleKind::AfterInput))
        );
    }

    #[test]
    fn test_parse_single_mapping_with_locators() {
        let yaml = r#"
name: Test App 2
capabilities:
  appium:noReset: true
locators:
  color-option: [textContains, {attribute: content-desc}]
steps:
  - step: Switches
    do:
      - clickClass: {class: android.widget.Switch, index: 1}
      - verifyElements: {ids: [switch-status], scrollRetry: true}
      - settle: 1500
"#;
        let scenario = parse_yaml_content(yaml).unwrap();
        assert_eq!(
            scenario.locators.get("color-option").unwrap(),
            &vec![
                LocatorEntry::TextContains,
                LocatorEntry::Attribute("content-desc".to_string())
            ]
        );
        assert!(scenario.capabilities.unwrap().contains_key("appium:noReset"));

        let cmds = &scenario.steps[0].commands;
        assert!(matches!(&cmds[0], StepCommand::ClickClass(p) if p.index == 1));
        assert!(matches!(&cmds[1], StepCommand::VerifyElements(p) if p.scroll_retry));
        assert_eq!(cmds[2], StepCommand::Settle(SettleParams::Millis(1500)));
    }

    #[test]
    fn test_parse_bare_step_list() {
        let yaml = r#"
- step: Scroll
  do:
    - scroll: up
    - swipe: {from: [500, 1000], to: [500, 300], durationMs: 1000}
    - swipeElement: {id: swipe-area, direction: down, margin: 50}
"#;
        let scenario = parse_yaml_content(yaml).unwrap();
        let cmds = &scenario.steps[0].commands;
        assert!(matches!(&cmds[0], StepCommand::Scroll(p) if p.direction == SwipeDirection::Up));
        assert!(matches!(&cmds[1], StepCommand::Swipe(p) if p.to == [500, 300]));
        assert!(matches!(&cmds[2], StepCommand::SwipeElement(p) if p.margin == Some(50)));
    }

    #[test]
    fn test_parse_repeat_and_optional() {
        let yaml = r#"
---
- step: More presses
  do:
    - repeat:
        times: 2
        commands:
          - click: {id: test-button, optional: true}
          - dismissAlert
"#;
        let scenario = parse_yaml_content(yaml).unwrap();
        match &scenario.steps[0].commands[0] {
            StepCommand::Repeat(p) => {
                assert_eq!(p.times, 2);
                assert!(matches!(&p.commands[0], StepCommand::Click(c) if c.optional));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_dashes_inside_values_do_not_split() {
        let yaml = "- step: Note\n  do:\n    - note: \"--- separator ---\"\n";
        let scenario = parse_yaml_content(yaml).unwrap();
        assert_eq!(
            scenario.steps[0].commands[0],
            StepCommand::Note("--- separator ---".to_string())
        );
    }

    #[test]
    fn test_bundled_scenarios_parse() {
        let app1 = parse_yaml_content(include_str!("../../scenarios/test_app1.yaml")).unwrap();
        assert_eq!(app1.display_name(), "Test App 1");
        assert_eq!(app1.steps.len(), 5);

        let app2 = parse_yaml_content(include_str!("../../scenarios/test_app2.yaml")).unwrap();
        assert_eq!(app2.namespace.as_deref(), Some("com.testapp2"));
        assert_eq!(app2.locators.len(), 2);
        assert_eq!(app2.steps.len(), 8);

        let app3 = parse_yaml_content(include_str!("../../scenarios/test_app3.yaml")).unwrap();
        assert_eq!(app3.namespace.as_deref(), Some("com.testapp3"));
        assert_eq!(app3.steps.len(), 8);
        let forms = &app3.steps[2];
        assert_eq!(forms.name, "Forms");
        assert!(matches!(
            forms.commands.last(),
            Some(StepCommand::AssertText(p)) if p.id == "form-name-input" && p.not_equals.is_some()
        ));
    }

    #[test]
    fn test_unknown_command_is_error() {
        let yaml = "- step: Bad\n  do:\n    - launchRocket: now\n";
        let err = parse_yaml_content(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown command: launchRocket"));
    }

    #[test]
    fn test_assert_text_needs_a_check() {
        let yaml = "- step: Bad\n  do:\n    - assertText: {id: app-title}\n";
        assert!(parse_yaml_content(yaml).is_err());
    }
}
