//! The three tools the solar agent exposes to the chat model.
//!
//! Every tool answers with text. Failures are rendered into that text so
//! the model can read and react to them.

use crate::cache::LazyResources;
use crate::llm::ToolSpec;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::locations::lookup_location;
use super::predict::{predict, PredictionError, WeatherRecord};
use super::seasonal::seasonal_defaults;

/// A capability the chat model can invoke by name.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Description for the model prompt.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// `Err` is for arguments the tool cannot interpret at all.
    fn execute(&self, args: &Value) -> Result<String, String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered names, in registration order.
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.spec())
            .collect()
    }

    /// Look up and run a tool; unknown names and argument errors come back
    /// as text too.
    pub fn call(&self, name: &str, args: &Value) -> String {
        match self.get(name) {
            Some(tool) => tool
                .execute(args)
                .unwrap_or_else(|e| format!("Error: invalid arguments for {}: {}", name, e)),
            None => format!(
                "Error: unknown tool '{}'. Available tools: {}",
                name,
                self.order.join(", ")
            ),
        }
    }
}

/// Registry holding the location, seasonal and prediction tools.
pub fn solar_tools(resources: Arc<LazyResources>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(LookupLocationTool));
    registry.register(Arc::new(SeasonalDefaultsTool));
    registry.register(Arc::new(PredictSolarOutputTool { resources }));
    registry
}

pub struct LookupLocationTool;

impl Tool for LookupLocationTool {
    fn name(&self) -> &str {
        "lookup_location"
    }

    fn description(&self) -> &str {
        "Looks up coordinates for an Australian city. Use this tool FIRST to validate and get the coordinates for a location before making predictions."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "Name of the city in Australia (e.g., \"Sydney\", \"Melbourne\", \"Brisbane\")"
                }
            },
            "required": ["city"]
        })
    }

    fn execute(&self, args: &Value) -> Result<String, String> {
        let city = args
            .get("city")
            .and_then(Value::as_str)
            .ok_or_else(|| "'city' must be a string".to_string())?;
        Ok(lookup_location(city).to_string())
    }
}

pub struct SeasonalDefaultsTool;

impl Tool for SeasonalDefaultsTool {
    fn name(&self) -> &str {
        "get_seasonal_weather_defaults"
    }

    fn description(&self) -> &str {
        "Returns typical weather conditions for Australia based on the month/season. Use this tool to get default weather parameters when specific conditions are not provided."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "month": {
                    "type": "integer",
                    "description": "Month number (1-12). If not provided, will ask user to specify."
                }
            }
        })
    }

    fn execute(&self, args: &Value) -> Result<String, String> {
        let month = match args.get("month") {
            None | Some(Value::Null) => None,
            Some(v) => match month_arg(v) {
                Some(m) => Some(m),
                // not a whole number: report it the same way as 0 or 13
                None => {
                    let shown = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    return Ok(format!(
                        "Invalid month: {}. Please provide a month number between 1 and 12.",
                        shown
                    ));
                }
            },
        };
        Ok(match seasonal_defaults(month) {
            Ok(defaults) => defaults.to_string(),
            Err(e) => e.to_string(),
        })
    }
}

fn month_arg(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Inputs the prediction tool advertises, with the wording shown to the model.
const PREDICT_PARAMS: [(&str, &str); 21] = [
    ("Latitude", "Location latitude (use lookup_location tool to get this from city name)."),
    ("Longitude", "Location longitude (use lookup_location tool to get this from city name)."),
    ("MinTemp", "Minimum temperature (°C) during a particular day."),
    ("MaxTemp", "Maximum temperature (°C) during a particular day."),
    ("Rainfall", "Precipitation (mm) during a particular day."),
    ("Evaporation", "Class A pan evaporation (mm) during a particular day."),
    ("Sunshine", "Number of hours of bright sunshine."),
    ("WindGustSpeed", "The speed (km/h) of the strongest wind gust during a particular day."),
    ("WindSpeed9am", "Wind speed (km/h) averaged over 10 minutes prior to 9am."),
    ("WindSpeed3pm", "Wind speed (km/h) averaged over 10 minutes prior to 3pm."),
    ("Humidity9am", "Humidity (percent) at 9am."),
    ("Humidity3pm", "Humidity (percent) at 3pm."),
    ("Pressure9am", "Atmospheric pressure (hPa) reduced to mean sea level at 9am."),
    ("Pressure3pm", "Atmospheric pressure (hPa) reduced to mean sea level at 3pm."),
    ("Cloud9am", "Fraction of sky obscured by cloud at 9am (0-8 scale)."),
    ("Cloud3pm", "Fraction of sky obscured by cloud at 3pm (0-8 scale)."),
    ("Temp9am", "Temperature (°C) at 9am."),
    ("Temp3pm", "Temperature (°C) at 3pm."),
    ("RainToday", "If today is rainy then 1 (Yes). If today is not rainy then 0 (No)."),
    ("month_sin", "Cyclical encoding of month: sin(2π × month / 12). Captures seasonal patterns."),
    ("month_cos", "Cyclical encoding of month: cos(2π × month / 12). Captures seasonal patterns."),
];

pub struct PredictSolarOutputTool {
    resources: Arc<LazyResources>,
}

impl PredictSolarOutputTool {
    pub fn new(resources: Arc<LazyResources>) -> Self {
        Self { resources }
    }
}

impl Tool for PredictSolarOutputTool {
    fn name(&self) -> &str {
        "predict_solar_output"
    }

    fn description(&self) -> &str {
        "Predicts daily solar PV output (kWh/kWp) based on weather conditions using XGBoost model. Returns JSON containing the prediction (kWh/kWp) and the input parameters used."
    }

    fn parameters(&self) -> Value {
        let mut props = Map::new();
        for (name, description) in PREDICT_PARAMS {
            let kind = if name == "RainToday" { "integer" } else { "number" };
            props.insert(name.to_string(), json!({"type": kind, "description": description}));
        }
        props.insert(
            "Month".to_string(),
            json!({"type": "integer", "description": "Month number (1-12). Used to derive month_sin/month_cos when they are not given."}),
        );
        json!({"type": "object", "properties": props})
    }

    fn execute(&self, args: &Value) -> Result<String, String> {
        // only advertised fields are read
        let record = match args {
            Value::Null => WeatherRecord::default(),
            Value::Object(obj) => {
                let known: Map<String, Value> = obj
                    .iter()
                    .filter(|(k, _)| k.as_str() == "Month" || PREDICT_PARAMS.iter().any(|(n, _)| *n == k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                WeatherRecord::from_json(&Value::Object(known))?
            }
            other => WeatherRecord::from_json(other)?,
        };
        let resources = self.resources.get();

        let body = match predict(&record, resources) {
            Ok(result) => json!(result),
            Err(e @ PredictionError::MissingParameters(_)) => json!({
                "error": format!(
                    "{}. Please use get_seasonal_weather_defaults tool to get complete weather parameters.",
                    e
                )
            }),
            Err(e @ PredictionError::SchemaUnavailable) => json!({ "error": e.to_string() }),
            Err(e) => json!({ "error": e.to_string(), "input_parameters": record }),
        };
        Ok(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SolarResources;

    fn registry() -> ToolRegistry {
        solar_tools(Arc::new(LazyResources::ready(SolarResources::default())))
    }

    #[test]
    fn specs_keep_registration_order() {
        let names: Vec<String> = registry().specs().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["lookup_location", "get_seasonal_weather_defaults", "predict_solar_output"]
        );
    }

    #[test]
    fn unknown_tool_and_bad_args_are_text() {
        let r = registry();
        assert!(r.call("nope", &json!({})).starts_with("Error: unknown tool 'nope'"));
        assert!(r.call("lookup_location", &json!({"city": 3})).starts_with("Error: invalid arguments"));
    }

    #[test]
    fn seasonal_tool_handles_missing_and_fractional_month() {
        let r = registry();
        assert!(r
            .call("get_seasonal_weather_defaults", &json!({}))
            .starts_with("Please provide a month number"));
        assert_eq!(
            r.call("get_seasonal_weather_defaults", &json!({"month": 2.5})),
            "Invalid month: 2.5. Please provide a month number between 1 and 12."
        );
        assert!(r
            .call("get_seasonal_weather_defaults", &json!({"month": "7"}))
            .starts_with("Season: Winter (July)"));
    }

    #[test]
    fn predict_without_schema_reports_inline() {
        let out = registry().call("predict_solar_output", &json!({"MinTemp": 10}));
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["error"], "Model features not available");
    }

    #[test]
    fn predict_ignores_unadvertised_arguments() {
        let out = registry().call(
            "predict_solar_output",
            &json!({"MinTemp": 10, "city": "Sydney", "notes": ["sunny"]}),
        );
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["error"], "Model features not available");

        let out = registry().call("predict_solar_output", &json!({"MinTemp": "warm"}));
        assert!(out.starts_with("Error: invalid arguments for predict_solar_output"));
    }

    #[test]
    fn predict_parameters_list_all_inputs() {
        let params = PredictSolarOutputTool::new(Arc::new(LazyResources::ready(SolarResources::default()))).parameters();
        let props = params["properties"].as_object().unwrap();
        assert_eq!(props.len(), 22);
        assert_eq!(props["RainToday"]["type"], "integer");
    }
}
