pub mod actions;
pub mod appium;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod traits;
pub mod watch;

pub use actions::{By, DeviceCommand, ElementId, Rect};
pub use appium::AppiumClient;
pub use error::{DriverError, DriverResult, ErrorKind};
pub use traits::RemoteSession;
pub use watch::WatchedSession;
