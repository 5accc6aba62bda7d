//! Steps built from YAML commands

use super::context::ScenarioContext;
use super::scenario::{fail, ScenarioStep, StepAction, StepError, StepResult};
use crate::interaction::{LocatorSpec, SwipeDirection};
use crate::parser::types::{AssertTextParams, ScenarioFile, SettleParams, StepCommand};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;

/// A step that runs a list of parsed commands in order
///
/// The first failing command fails the step; the commands after it are
/// not run.
pub struct CommandStep {
    commands: Vec<StepCommand>,
}

impl CommandStep {
    pub fn new(commands: Vec<StepCommand>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl StepAction for CommandStep {
    async fn run(&self, ctx: &mut ScenarioContext) -> StepResult {
        for command in &self.commands {
            execute_command(ctx, command).await?;
        }
        Ok(())
    }

    fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        describe_into(&self.commands, 0, &mut lines);
        lines
    }
}

fn describe_into(commands: &[StepCommand], depth: usize, lines: &mut Vec<String>) {
    for command in commands {
        lines.push(format!("{}{}", "  ".repeat(depth), command.display()));
        if let StepCommand::Repeat(params) = command {
            describe_into(&params.commands, depth + 1, lines);
        }
    }
}

/// Turn a parsed scenario into runnable steps
pub fn build_steps(scenario: &ScenarioFile) -> Vec<ScenarioStep> {
    scenario
        .steps
        .iter()
        .map(|def| ScenarioStep::new(&def.name, CommandStep::new(def.commands.clone())))
        .collect()
}

/// Register the scenario's `locators:` overrides
pub fn apply_locators(ctx: &mut ScenarioContext, scenario: &ScenarioFile) {
    for (key, entries) in &scenario.locators {
        let chain = entries.iter().map(|e| e.to_strategy()).collect();
        if !ctx.define_locator(LocatorSpec::new(key, chain)) {
            log::warn!("Locator for '{}' defined twice, keeping the first", key);
        }
    }
}

/// Execute a single command
pub fn execute_command<'a>(
    ctx: &'a mut ScenarioContext,
    command: &'a StepCommand,
) -> BoxFuture<'a, StepResult> {
    async move {
        log::debug!("Executing: {}", command.display());
        let result = run_command(ctx, command).await;

        // A session that died under this command ends the step right away
        if let Some(reason) = ctx.fatal_reason() {
            return Err(StepError::SessionFatal(reason));
        }
        result
    }
    .boxed()
}

async fn run_command(ctx: &mut ScenarioContext, command: &StepCommand) -> StepResult {
    match command {
        StepCommand::Click(params) => {
            let id = ctx.substitute_vars(&params.id);
            if params.scroll_first {
                let duration = ctx.default_swipe_duration_ms();
                ctx.scroll(SwipeDirection::Up, duration).await;
            }
            if ctx.click(&id).await {
                Ok(())
            } else if params.optional {
                ctx.note(format!("Skipped optional click on {}", id));
                Ok(())
            } else {
                fail(format!("Could not click '{}'", id))
            }
        }

        StepCommand::ClickAny(ids) => {
            for id in ids {
                let id = ctx.substitute_vars(id);
                if ctx.click(&id).await {
                    return Ok(());
                }
            }
            fail(format!("None of [{}] could be clicked", ids.join(", ")))
        }

        StepCommand::ClickClass(params) => {
            if ctx.click_nth_of_class(&params.class, params.index).await {
                Ok(())
            } else if params.optional {
                ctx.note(format!(
                    "Skipped optional click on {} #{}",
                    params.class,
                    params.index + 1
                ));
                Ok(())
            } else {
                fail(format!(
                    "Could not click {} #{}",
                    params.class,
                    params.index + 1
                ))
            }
        }

        StepCommand::InputText(params) => {
            let id = ctx.substitute_vars(&params.id);
            let text = ctx.substitute_vars(&params.text);
            if ctx.type_text(&id, &text).await {
                Ok(())
            } else if params.optional {
                ctx.note(format!("Skipped optional input into {}", id));
                Ok(())
            } else {
                fail(format!("Could not type into '{}'", id))
            }
        }

        StepCommand::ReadText(params) => {
            let id = ctx.substitute_vars(&params.id);
            let Some(value) = ctx.read_text(&id).await else {
                return fail(format!("Could not read text of '{}'", id));
            };
            ctx.note(format!("{} = '{}'", id, value));
            ctx.set_var(&id, &value);
            if let Some(name) = &params.store_as {
                ctx.set_var(name, &value);
            }
            Ok(())
        }

        StepCommand::AssertText(params) => assert_text(ctx, params).await,

        StepCommand::DismissAlert => {
            ctx.dismiss_alert_if_present().await;
            Ok(())
        }

        StepCommand::Back => {
            if ctx.press_back().await {
                Ok(())
            } else {
                fail("Back navigation failed")
            }
        }

        StepCommand::Settle(SettleParams::Kind(kind)) => {
            ctx.settle(*kind).await;
            Ok(())
        }

        StepCommand::Settle(SettleParams::Millis(ms)) => {
            ctx.pause(Duration::from_millis(*ms)).await;
            Ok(())
        }

        StepCommand::Swipe(params) => {
            let duration = params
                .duration_ms
                .unwrap_or_else(|| ctx.default_swipe_duration_ms());
            let [x0, y0] = params.from;
            let [x1, y1] = params.to;
            if ctx.swipe(x0, y0, x1, y1, duration).await {
                Ok(())
            } else {
                fail(format!("Swipe ({},{}) -> ({},{}) failed", x0, y0, x1, y1))
            }
        }

        StepCommand::SwipeElement(params) => {
            let id = ctx.substitute_vars(&params.id);
            let margin = params.margin.unwrap_or_else(|| ctx.default_swipe_margin());
            let duration = params
                .duration_ms
                .unwrap_or_else(|| ctx.default_swipe_duration_ms());
            if ctx.swipe_within(&id, params.direction, margin, duration).await {
                Ok(())
            } else {
                fail(format!("Could not swipe {:?} on '{}'", params.direction, id))
            }
        }

        StepCommand::Scroll(params) => {
            let duration = params
                .duration_ms
                .unwrap_or_else(|| ctx.default_swipe_duration_ms());
            if ctx.scroll(params.direction, duration).await {
                Ok(())
            } else {
                fail(format!("Scroll {:?} failed", params.direction))
            }
        }

        StepCommand::VerifyElements(params) => {
            let ids: Vec<String> = params.ids.iter().map(|id| ctx.substitute_vars(id)).collect();
            let (found, expected) = ctx.verify_elements(&ids, params.scroll_retry).await;
            ctx.note(format!("Found {}/{} elements", found, expected));
            if found < expected && !params.allow_missing {
                fail(format!("Only {}/{} elements found", found, expected))
            } else {
                Ok(())
            }
        }

        StepCommand::Repeat(params) => {
            for iteration in 1..=params.times {
                log::debug!("Repeat #{}", iteration);
                for inner in &params.commands {
                    execute_command(ctx, inner).await?;
                }
            }
            Ok(())
        }

        StepCommand::Note(text) => {
            let text = ctx.substitute_vars(text);
            ctx.note(text);
            Ok(())
        }
    }
}

async fn assert_text(ctx: &mut ScenarioContext, params: &AssertTextParams) -> StepResult {
    let id = ctx.substitute_vars(&params.id);
    let Some(actual) = ctx.read_text(&id).await else {
        return fail(format!("Could not read text of '{}'", id));
    };

    if let Some(expected) = &params.contains {
        let expected = ctx.substitute_vars(expected);
        if !actual.contains(&expected) {
            return fail(format!("'{}' is '{}', expected to contain '{}'", id, actual, expected));
        }
    }
    if let Some(expected) = &params.equals {
        let expected = ctx.substitute_vars(expected);
        if actual != expected {
            return fail(format!("'{}' is '{}', expected '{}'", id, actual, expected));
        }
    }
    if let Some(unexpected) = &params.not_equals {
        let unexpected = ctx.substitute_vars(unexpected);
        if actual == unexpected {
            return fail(format!("'{}' is still '{}'", id, actual));
        }
    }
    if params.changed {
        let Some(before) = ctx.vars.get(&id).cloned() else {
            return fail(format!("No earlier readText of '{}' to compare with", id));
        };
        if actual == before {
            return fail(format!("'{}' did not change from '{}'", id, before));
        }
    }

    ctx.note(format!("✓ {} = '{}'", id, actual));
    Ok(())
}
