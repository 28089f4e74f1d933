//! Process-wide, read-only prediction resources.
//!
//! Loading never fails as a whole: each artifact that cannot be read is
//! logged and left unset, and callers report the gap inline.

use crate::models::{FeatureSchema, Regressor, TreeEnsemble};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

pub const DATASET_FILE: &str = "solar_weather_dataset.csv";
pub const FEATURES_FILE: &str = "model_features.json";
pub const BOOSTED_MODEL_FILE: &str = "solar_xgb_model.json";
pub const FOREST_MODEL_FILE: &str = "solar_rf_model.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    GradientBoosted,
    RandomForest,
}

impl ModelChoice {
    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::GradientBoosted => "XGBoost",
            ModelChoice::RandomForest => "Random Forest",
        }
    }
}

#[derive(Default)]
pub struct SolarResources {
    pub medians: BTreeMap<String, f64>,
    pub schema: Option<FeatureSchema>,
    pub boosted: Option<Box<dyn Regressor>>,
    pub forest: Option<Box<dyn Regressor>>,
}

impl SolarResources {
    pub fn load(dir: &Path) -> Self {
        info!(dir = %dir.display(), "Loading data and models");

        let medians = match column_medians(&dir.join(DATASET_FILE)) {
            Ok(m) => {
                info!(columns = m.len(), "Medians calculated");
                m
            }
            Err(e) => {
                warn!(error = %e, "Could not load dataset for medians");
                BTreeMap::new()
            }
        };

        let schema = match FeatureSchema::load(&dir.join(FEATURES_FILE)) {
            Ok(s) => {
                info!(features = ?s.names(), "Features loaded");
                Some(s)
            }
            Err(e) => {
                warn!(error = %e, "Error loading model features");
                None
            }
        };

        let load_model = |file: &str, label: &str| -> Option<Box<dyn Regressor>> {
            let schema = schema.as_ref()?;
            match TreeEnsemble::load(&dir.join(file), schema) {
                Ok(m) => {
                    info!(trees = m.tree_count(), "{} model loaded", label);
                    Some(Box::new(m))
                }
                Err(e) => {
                    warn!(error = %e, "Error loading {} model", label);
                    None
                }
            }
        };
        let forest = load_model(FOREST_MODEL_FILE, "Random Forest");
        let boosted = load_model(BOOSTED_MODEL_FILE, "XGBoost");
        if schema.is_none() {
            warn!("Regressors skipped: no feature schema to resolve splits against");
        }

        Self {
            medians,
            schema,
            boosted,
            forest,
        }
    }

    pub fn regressor(&self, choice: ModelChoice) -> Option<&dyn Regressor> {
        match choice {
            ModelChoice::GradientBoosted => self.boosted.as_deref(),
            ModelChoice::RandomForest => self.forest.as_deref(),
        }
    }

    /// Required features grouped for display, each with its dataset median
    /// when the dataset had one.
    pub fn feature_info(&self) -> Option<FeatureInfo> {
        let schema = self.schema.as_ref()?;
        let mut info = FeatureInfo::default();
        for name in schema.names() {
            let entry = (name.clone(), self.medians.get(name).copied());
            match name.as_str() {
                "Latitude" | "Longitude" => info.location.push(entry),
                "month_sin" | "month_cos" | "Month" => info.temporal.push(entry),
                _ => info.weather.push(entry),
            }
        }
        Some(info)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeatureInfo {
    pub weather: Vec<(String, Option<f64>)>,
    pub location: Vec<(String, Option<f64>)>,
    pub temporal: Vec<(String, Option<f64>)>,
}

impl FeatureInfo {
    pub fn total(&self) -> usize {
        self.weather.len() + self.location.len() + self.temporal.len()
    }
}

impl fmt::Display for FeatureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Required features ({} total):", self.total())?;
        for (title, group) in [
            ("Weather", &self.weather),
            ("Location", &self.location),
            ("Temporal", &self.temporal),
        ] {
            writeln!(f, "\n{} features:", title)?;
            for (name, median) in group {
                match median {
                    Some(m) => writeln!(f, "  - {} (median: {:.2})", name, m)?,
                    None => writeln!(f, "  - {}", name)?,
                }
            }
        }
        Ok(())
    }
}

/// Median of every numeric column; a column with any non-numeric cell is
/// skipped, empty cells are ignored.
pub fn column_medians(path: &Path) -> Result<BTreeMap<String, f64>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut columns: Vec<Option<Vec<f64>>> = vec![Some(Vec::new()); headers.len()];

    for record in reader.records() {
        let record = record?;
        for (i, cell) in record.iter().enumerate() {
            let Some(Some(values)) = columns.get_mut(i) else {
                continue;
            };
            let cell = cell.trim();
            if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                continue;
            }
            match cell.parse::<f64>() {
                Ok(v) => values.push(v),
                Err(_) => columns[i] = None,
            }
        }
    }

    let mut out = BTreeMap::new();
    for (name, values) in headers.iter().zip(columns) {
        let Some(mut values) = values else { continue };
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        let median = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };
        out.insert(name.to_string(), median);
    }
    Ok(out)
}

/// Loads [`SolarResources`] on first use. Concurrent first callers block on
/// the same initialisation instead of racing.
pub struct LazyResources {
    dir: PathBuf,
    cell: OnceLock<SolarResources>,
}

impl LazyResources {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cell: OnceLock::new(),
        }
    }

    /// Already-initialised holder, mainly for tests and embedding.
    pub fn ready(resources: SolarResources) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(resources);
        Self {
            dir: PathBuf::new(),
            cell,
        }
    }

    pub fn get(&self) -> &SolarResources {
        self.cell.get_or_init(|| SolarResources::load(&self.dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medians_skip_text_columns_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATASET_FILE);
        std::fs::write(
            &path,
            "Location,MinTemp,Sunshine\nSydney,10,\nPerth,20,8\nHobart,30,6\nDarwin,40,NaN\n",
        )
        .unwrap();
        let m = column_medians(&path).unwrap();
        assert!(!m.contains_key("Location"));
        assert_eq!(m["MinTemp"], 25.0);
        assert_eq!(m["Sunshine"], 7.0);
    }

    #[test]
    fn missing_artifacts_leave_resources_unset() {
        let dir = tempfile::tempdir().unwrap();
        let r = SolarResources::load(dir.path());
        assert!(r.schema.is_none());
        assert!(r.boosted.is_none());
        assert!(r.forest.is_none());
        assert!(r.medians.is_empty());
    }

    #[test]
    fn feature_info_groups_by_kind() {
        let mut r = SolarResources::default();
        r.schema = Some(FeatureSchema::new(
            ["Latitude", "MinTemp", "month_sin"].iter().map(|s| s.to_string()).collect(),
        ));
        r.medians.insert("MinTemp".into(), 12.0);
        let info = r.feature_info().unwrap();
        assert_eq!(info.location, vec![("Latitude".to_string(), None)]);
        assert_eq!(info.weather, vec![("MinTemp".to_string(), Some(12.0))]);
        assert_eq!(info.temporal.len(), 1);
        assert!(info.to_string().contains("MinTemp (median: 12.00)"));
    }

    #[test]
    fn lazy_holder_initialises_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FEATURES_FILE), r#"["MinTemp"]"#).unwrap();
        let lazy = LazyResources::new(dir.path());
        let first = lazy.get() as *const SolarResources;
        std::fs::remove_file(dir.path().join(FEATURES_FILE)).unwrap();
        let second = lazy.get();
        assert_eq!(first, second as *const SolarResources);
        assert!(second.schema.is_some());
    }
}
