//! Feature validation and regressor invocation for solar PV output.

use crate::cache::{ModelChoice, SolarResources};
use crate::error::ModelError;
use crate::models::FeatureSchema;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use super::seasonal::month_encoding;

/// Named weather and location inputs. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeatherRecord {
    values: BTreeMap<String, f64>,
}

impl WeatherRecord {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Accepts numbers, numeric strings, booleans and `yes`/`no`. Nulls are
    /// treated as absent.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "weather record must be a JSON object".to_string())?;
        let mut values = BTreeMap::new();
        for (key, v) in obj {
            if let Some(n) = coerce_number(v).map_err(|e| format!("{}: {}", key, e))? {
                values.insert(key.clone(), n);
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// New record with `overrides` taking precedence over `self`.
    pub fn merged(&self, overrides: &WeatherRecord) -> WeatherRecord {
        let mut values = self.values.clone();
        values.extend(overrides.values.iter().map(|(k, v)| (k.clone(), *v)));
        WeatherRecord { values }
    }
}

pub fn coerce_number(v: &Value) -> Result<Option<f64>, String> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{} is not representable", n)),
        Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => {
            let t = s.trim();
            match t.to_ascii_lowercase().as_str() {
                "yes" | "true" => return Ok(Some(1.0)),
                "no" | "false" => return Ok(Some(0.0)),
                "" => return Ok(None),
                _ => {}
            }
            t.parse::<f64>()
                .map(Some)
                .map_err(|_| format!("'{}' is not a number", s))
        }
        other => Err(format!("unsupported value {}", other)),
    }
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("Model features not available")]
    SchemaUnavailable,

    #[error("{} model not available", .0.label())]
    ModelUnavailable(ModelChoice),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Fill whichever half of the month encoding is absent from `Month`, check
/// completeness against the schema and return values in schema order.
pub fn prepare_features(record: &WeatherRecord, schema: &FeatureSchema) -> Result<Vec<f64>, PredictionError> {
    let derived = record.get("Month").map(month_encoding);
    let lookup = |name: &str| -> Option<f64> {
        record.get(name).or_else(|| match (name, derived) {
            ("month_sin", Some((s, _))) => Some(s),
            ("month_cos", Some((_, c))) => Some(c),
            _ => None,
        })
    };

    let missing: Vec<String> = schema
        .names()
        .iter()
        .filter(|n| lookup(n.as_str()).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PredictionError::MissingParameters(missing));
    }

    Ok(schema.names().iter().filter_map(|n| lookup(n.as_str())).collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    #[serde(rename = "prediction_kWh_kWp")]
    pub prediction_kwh_kwp: f64,
    #[serde(rename = "input_parameters")]
    pub inputs: WeatherRecord,
    #[serde(skip)]
    pub model: ModelChoice,
}

pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

pub fn predict(record: &WeatherRecord, resources: &SolarResources) -> Result<PredictionResult, PredictionError> {
    predict_with(record, resources, ModelChoice::GradientBoosted)
}

pub fn predict_with(
    record: &WeatherRecord,
    resources: &SolarResources,
    choice: ModelChoice,
) -> Result<PredictionResult, PredictionError> {
    let schema = resources
        .schema
        .as_ref()
        .ok_or(PredictionError::SchemaUnavailable)?;
    let features = prepare_features(record, schema)?;
    let model = resources
        .regressor(choice)
        .ok_or(PredictionError::ModelUnavailable(choice))?;
    let raw = model.predict(&features)?;
    Ok(PredictionResult {
        prediction_kwh_kwp: round3(raw),
        inputs: record.clone(),
        model: choice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Regressor;

    struct Sum;

    impl Regressor for Sum {
        fn name(&self) -> &str {
            "sum"
        }

        fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
            Ok(features.iter().sum())
        }
    }

    fn schema(names: &[&str]) -> FeatureSchema {
        FeatureSchema::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn values_come_back_in_schema_order() {
        let record = WeatherRecord::from_pairs([("b", 2.0), ("a", 1.0), ("c", 3.0)]);
        let v = prepare_features(&record, &schema(&["c", "a", "b"])).unwrap();
        assert_eq!(v, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn every_missing_field_is_named() {
        let record = WeatherRecord::from_pairs([("a", 1.0)]);
        let err = prepare_features(&record, &schema(&["a", "b", "c"])).unwrap_err();
        match &err {
            PredictionError::MissingParameters(m) => assert_eq!(m, &vec!["b".to_string(), "c".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.to_string(), "Missing required parameters: b, c");
    }

    #[test]
    fn month_derives_cyclical_encoding() {
        let record = WeatherRecord::from_pairs([("Month", 3.0)]);
        let v = prepare_features(&record, &schema(&["month_sin", "month_cos"])).unwrap();
        assert!((v[0] - 1.0).abs() < 1e-12);
        assert!(v[1].abs() < 1e-12);
    }

    #[test]
    fn month_fills_only_the_absent_half() {
        let record = WeatherRecord::from_pairs([("Month", 3.0), ("month_cos", 0.5)]);
        let v = prepare_features(&record, &schema(&["month_sin", "month_cos"])).unwrap();
        assert!((v[0] - 1.0).abs() < 1e-12);
        assert_eq!(v[1], 0.5);
    }

    #[test]
    fn explicit_encoding_is_not_overwritten() {
        let record = WeatherRecord::from_pairs([("Month", 3.0), ("month_sin", 0.25), ("month_cos", 0.5)]);
        let v = prepare_features(&record, &schema(&["month_sin", "month_cos"])).unwrap();
        assert_eq!(v, vec![0.25, 0.5]);
    }

    #[test]
    fn prediction_is_rounded_and_echoes_inputs() {
        let resources = SolarResources {
            schema: Some(schema(&["a", "b"])),
            boosted: Some(Box::new(Sum)),
            ..Default::default()
        };
        let record = WeatherRecord::from_pairs([("a", 1.23456), ("b", 2.0)]);
        let out = predict(&record, &resources).unwrap();
        assert_eq!(out.prediction_kwh_kwp, 3.235);
        assert_eq!(out.inputs, record);
    }

    #[test]
    fn unloaded_model_is_reported() {
        let resources = SolarResources {
            schema: Some(schema(&["a"])),
            ..Default::default()
        };
        let record = WeatherRecord::from_pairs([("a", 1.0)]);
        let err = predict_with(&record, &resources, ModelChoice::RandomForest).unwrap_err();
        assert_eq!(err.to_string(), "Random Forest model not available");
    }

    #[test]
    fn json_coercion_handles_flags_and_nulls() {
        let v: Value = serde_json::from_str(r#"{"RainToday":"Yes","MinTemp":"12.5","Cloud9am":null,"x":true}"#).unwrap();
        let r = WeatherRecord::from_json(&v).unwrap();
        assert_eq!(r.get("RainToday"), Some(1.0));
        assert_eq!(r.get("MinTemp"), Some(12.5));
        assert_eq!(r.get("x"), Some(1.0));
        assert!(!r.contains("Cloud9am"));
        let bad: Value = serde_json::from_str(r#"{"MinTemp":"warm"}"#).unwrap();
        assert!(WeatherRecord::from_json(&bad).is_err());
    }
}
