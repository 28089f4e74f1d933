pub mod agent;
pub mod locations;
pub mod predict;
pub mod seasonal;
pub mod tools;

pub use agent::{system_prompt, AgentReply, SolarAgent};
pub use locations::{lookup_location, LookupOutcome};
pub use predict::{predict, predict_with, prepare_features, PredictionError, PredictionResult, WeatherRecord};
pub use seasonal::{seasonal_defaults, Season, SeasonalDefaults, SeasonalError};
pub use tools::{solar_tools, Tool, ToolRegistry};
