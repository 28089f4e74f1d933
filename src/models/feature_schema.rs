use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ordered feature names a regressor was trained on. Column order matters:
/// the same values in a different order are a different input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let schema: FeatureSchema =
            serde_json::from_str(&raw).map_err(|e| ModelError::Invalid {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if schema.names.is_empty() {
            return Err(ModelError::Invalid {
                path: path.display().to_string(),
                message: "feature list is empty".to_string(),
            });
        }
        Ok(schema)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_ordered_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_features.json");
        std::fs::write(&path, r#"["Latitude","Longitude","MinTemp"]"#).unwrap();
        let schema = FeatureSchema::load(&path).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("MinTemp"), Some(2));
    }

    #[test]
    fn empty_list_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_features.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            FeatureSchema::load(&path),
            Err(ModelError::Invalid { .. })
        ));
    }
}
