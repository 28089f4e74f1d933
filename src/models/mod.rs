pub mod feature_schema;
pub mod tree_ensemble;

pub use feature_schema::FeatureSchema;
pub use tree_ensemble::{Comparison, EnsembleKind, TreeEnsemble};

use crate::error::ModelError;

/// A trained model that maps a feature vector, already in schema order, to
/// one number.
pub trait Regressor: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;
}
