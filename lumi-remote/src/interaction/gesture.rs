//! Touch gesture synthesis
//!
//! A swipe is built once as a list of [`PointerEvent`]s and then encoded for
//! whichever touch API the server speaks: the W3C pointer action sequence or
//! the older single-shot touch chain.

use super::wait::{SettleKind, WaitPolicy};
use crate::driver::actions::{PointerAction, TouchChain, TouchStep, W3cActions};
use crate::driver::{DriverResult, Rect, RemoteSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Encoding-independent pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press { x: i32, y: i32 },
    Move { x: i32, y: i32, duration_ms: u64 },
    Release { x: i32, y: i32 },
}

/// Press at the start, one linear move, release at the end
pub fn synthesize(x0: i32, y0: i32, x1: i32, y1: i32, duration_ms: u64) -> Vec<PointerEvent> {
    vec![
        PointerEvent::Press { x: x0, y: y0 },
        PointerEvent::Move {
            x: x1,
            y: y1,
            duration_ms,
        },
        PointerEvent::Release { x: x1, y: y1 },
    ]
}

pub fn encode_w3c(events: &[PointerEvent]) -> W3cActions {
    let mut actions = Vec::with_capacity(events.len() + 1);
    for event in events {
        match *event {
            PointerEvent::Press { x, y } => {
                actions.push(PointerAction::Move {
                    duration: 0,
                    origin: "viewport",
                    x,
                    y,
                });
                actions.push(PointerAction::Down { button: 0 });
            }
            PointerEvent::Move { x, y, duration_ms } => actions.push(PointerAction::Move {
                duration: duration_ms,
                origin: "viewport",
                x,
                y,
            }),
            PointerEvent::Release { .. } => actions.push(PointerAction::Up { button: 0 }),
        }
    }
    W3cActions::touch(actions)
}

pub fn encode_legacy(events: &[PointerEvent]) -> TouchChain {
    let mut actions = Vec::with_capacity(events.len() + 1);
    for event in events {
        match *event {
            PointerEvent::Press { x, y } => actions.push(TouchStep::at("press", x, y)),
            PointerEvent::Move { x, y, duration_ms } => {
                actions.push(TouchStep::wait(duration_ms));
                actions.push(TouchStep::at("moveTo", x, y));
            }
            PointerEvent::Release { .. } => actions.push(TouchStep::release()),
        }
    }
    TouchChain { actions }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GestureEncoding {
    /// W3C actions, switching to legacy touch if the server rejects them
    #[default]
    Auto,
    W3c,
    Legacy,
}

/// Direction the finger travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipePath {
    pub from: (i32, i32),
    pub to: (i32, i32),
}

impl SwipePath {
    /// Swipe across an element, keeping `margin` pixels from its edges
    pub fn within(rect: Rect, direction: SwipeDirection, margin: i32) -> Self {
        let (cx, cy) = rect.center();
        match direction {
            SwipeDirection::Up | SwipeDirection::Down => {
                let m = margin.max(0).min(rect.height / 4);
                let (low, high) = (rect.bottom() - m, rect.y + m);
                if direction == SwipeDirection::Up {
                    Self { from: (cx, low), to: (cx, high) }
                } else {
                    Self { from: (cx, high), to: (cx, low) }
                }
            }
            SwipeDirection::Left | SwipeDirection::Right => {
                let m = margin.max(0).min(rect.width / 4);
                let (right, left) = (rect.right() - m, rect.x + m);
                if direction == SwipeDirection::Left {
                    Self { from: (right, cy), to: (left, cy) }
                } else {
                    Self { from: (left, cy), to: (right, cy) }
                }
            }
        }
    }

    /// Scroll path across the whole window, 70% to 30% of the axis
    pub fn screen(width: u32, height: u32, direction: SwipeDirection) -> Self {
        let (w, h) = (width as i32, height as i32);
        let (near_x, far_x) = (w * 30 / 100, w * 70 / 100);
        let (near_y, far_y) = (h * 30 / 100, h * 70 / 100);
        let (cx, cy) = (w / 2, h / 2);
        match direction {
            SwipeDirection::Up => Self { from: (cx, far_y), to: (cx, near_y) },
            SwipeDirection::Down => Self { from: (cx, near_y), to: (cx, far_y) },
            SwipeDirection::Left => Self { from: (far_x, cy), to: (near_x, cy) },
            SwipeDirection::Right => Self { from: (near_x, cy), to: (far_x, cy) },
        }
    }
}

pub struct GestureEngine {
    encoding: GestureEncoding,
    wait: Arc<dyn WaitPolicy>,
}

impl GestureEngine {
    pub fn new(encoding: GestureEncoding, wait: Arc<dyn WaitPolicy>) -> Self {
        Self { encoding, wait }
    }

    /// Encoding used for the next gesture
    pub fn encoding(&self) -> GestureEncoding {
        self.encoding
    }

    async fn send(&mut self, session: &dyn RemoteSession, events: &[PointerEvent]) -> DriverResult<()> {
        match self.encoding {
            GestureEncoding::W3c => session.perform_actions(&encode_w3c(events)).await,
            GestureEncoding::Legacy => session.perform_touch(&encode_legacy(events)).await,
            GestureEncoding::Auto => match session.perform_actions(&encode_w3c(events)).await {
                Err(e) if e.is_unsupported() => {
                    log::info!("W3C actions rejected ({}), using legacy touch actions", e);
                    self.encoding = GestureEncoding::Legacy;
                    session.perform_touch(&encode_legacy(events)).await
                }
                other => other,
            },
        }
    }

    /// Linear swipe from (x0, y0) to (x1, y1), then settle
    pub async fn swipe(
        &mut self,
        session: &dyn RemoteSession,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        duration_ms: u64,
    ) -> bool {
        let events = synthesize(x0, y0, x1, y1, duration_ms);
        match self.send(session, &events).await {
            Ok(()) => {
                self.wait.settle(session, SettleKind::AfterGesture).await;
                true
            }
            Err(e) => {
                log::warn!("Swipe ({},{}) -> ({},{}) failed: {}", x0, y0, x1, y1, e);
                false
            }
        }
    }
}
