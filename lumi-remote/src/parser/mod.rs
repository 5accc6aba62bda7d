pub mod types;
pub mod yaml;

pub use types::{ScenarioFile, StepCommand, StepDef};
pub use yaml::parse_scenario_file;
