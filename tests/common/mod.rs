#![allow(dead_code)]

use solar_ocr_bench_lib::error::LlmError;
use solar_ocr_bench_lib::llm::{ChatMessage, ChatModel, ToolSpec};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

pub const FEATURES: [&str; 21] = [
    "Latitude",
    "Longitude",
    "MinTemp",
    "MaxTemp",
    "Rainfall",
    "Evaporation",
    "Sunshine",
    "WindGustSpeed",
    "WindSpeed9am",
    "WindSpeed3pm",
    "Humidity9am",
    "Humidity3pm",
    "Pressure9am",
    "Pressure3pm",
    "Cloud9am",
    "Cloud3pm",
    "Temp9am",
    "Temp3pm",
    "RainToday",
    "month_sin",
    "month_cos",
];

/// Sunshine < 8 -> 1.0 else 3.0, on top of 0.5.
pub const BOOSTED_MODEL: &str = r#"{
  "kind": "gradient_boosted",
  "base_score": 0.5,
  "trees": [
    {"nodeid": 0, "split": "Sunshine", "split_condition": 8.0, "yes": 1, "no": 2, "missing": 2,
     "children": [{"nodeid": 1, "leaf": 1.0}, {"nodeid": 2, "leaf": 3.0}]}
  ]
}"#;

/// Mean of (Cloud3pm <= 4 -> 4.0 else 2.0) and a constant 3.0.
pub const FOREST_MODEL: &str = r#"{
  "kind": "random_forest",
  "trees": [
    {"nodeid": 0, "split": "f15", "split_condition": 4.0, "yes": 1, "no": 2,
     "children": [{"nodeid": 1, "leaf": 4.0}, {"nodeid": 2, "leaf": 2.0}]},
    {"nodeid": 0, "leaf": 3.0}
  ]
}"#;

pub fn write_artifacts(dir: &Path) {
    let names: Vec<String> = FEATURES.iter().map(|s| s.to_string()).collect();
    std::fs::write(
        dir.join("model_features.json"),
        serde_json::to_string(&names).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.join("solar_xgb_model.json"), BOOSTED_MODEL).unwrap();
    std::fs::write(dir.join("solar_rf_model.json"), FOREST_MODEL).unwrap();
    std::fs::write(
        dir.join("solar_weather_dataset.csv"),
        "Location,MinTemp,Sunshine\nSydney,10,7\nPerth,14,9\nHobart,6,5\n",
    )
    .unwrap();
}

/// Replays canned replies and remembers what it was sent.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<ChatMessage, LlmError>>>,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    pub tools_offered: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Result<ChatMessage, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            tools_offered: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl ChatModel for ScriptedChat {
    fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage, LlmError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        *self.tools_offered.lock().unwrap() = tools.iter().map(|t| t.name.clone()).collect();
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChatMessage::assistant("(script exhausted)")))
    }
}
