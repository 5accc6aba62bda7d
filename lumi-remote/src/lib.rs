pub mod driver;
pub mod interaction;
pub mod parser;
pub mod runner;
pub mod utils;

// Re-export common items
pub use driver::{AppiumClient, RemoteSession};
pub use runner::{run_scenarios, RunOptions, ScenarioContext, ScenarioRunner, ScenarioStep};
pub use utils::config::Config;
