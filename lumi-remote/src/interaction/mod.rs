pub mod alert;
pub mod executor;
pub mod gesture;
pub mod locator;
pub mod wait;

pub use alert::{AlertOutcome, AlertRecovery};
pub use executor::{InteractionExecutor, InteractionResult};
pub use gesture::{GestureEncoding, GestureEngine, PointerEvent, SwipeDirection, SwipePath};
pub use locator::{LocateFailure, LocatorCatalog, LocatorResolver, LocatorSpec, LocatorStrategy, UiElementHandle};
pub use wait::{FixedDelay, Immediate, PollUntilStable, SettleKind, SettleTimings, WaitMode, WaitPolicy};
