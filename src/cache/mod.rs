pub mod resources;

pub use resources::{FeatureInfo, LazyResources, ModelChoice, SolarResources};
