//! Tool-calling conversation loop around a hosted chat model.

use crate::llm::{ChatMessage, ChatModel, Role};
use chrono::{Datelike, Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::seasonal::Season;
use super::tools::ToolRegistry;

pub const DEFAULT_MAX_STEPS: usize = 10;

fn season_label(month: u32) -> &'static str {
    Season::of_month(month).map_or("", Season::range_label)
}

/// Instruction template stamped with `today`.
pub fn system_prompt(today: NaiveDate) -> String {
    format!(
        r#"You are a Solar Prediction Assistant for locations in Australia.

CURRENT DATE: {date}
CURRENT MONTH: {month}
CURRENT SEASON IN AUSTRALIA: {season}

IMPORTANT WORKFLOW:
1. If location is not provided, ask the user which city/location in Australia they want predictions for.
2. Use the lookup_location tool to validate and get coordinates for the location.
3. If month is not provided, ask the user which month they want the prediction for (or assume current month).
4. Use the get_seasonal_weather_defaults tool with the month to get typical weather conditions for that season.
5. Present the seasonal defaults to the user and ask if they want to:
   a) Use these default values for the prediction
   b) Provide their own specific weather parameters
   c) Modify some of the defaults
6. Finally, use the predict_solar_output tool with either the defaults or user-provided values.

Notes:
- The get_seasonal_weather_defaults tool provides realistic weather parameters based on Australian seasons
- If the user provides specific weather parameters, use those instead of defaults
- If the user provides a location and/or month in their initial query, use them directly
- Be helpful and guide users through the process
"#,
        date = today.format("%B %d, %Y"),
        month = today.month(),
        season = season_label(today.month()),
    )
}

/// One finished turn: the text shown to the user and the tools it took.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub tools_called: Vec<String>,
    pub steps: usize,
}

pub struct SolarAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    system_prompt: String,
    history: Vec<ChatMessage>,
    max_steps: usize,
}

impl SolarAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self::with_prompt(model, tools, system_prompt(Local::now().date_naive()))
    }

    pub fn with_prompt(model: Arc<dyn ChatModel>, tools: ToolRegistry, system_prompt: String) -> Self {
        Self {
            model,
            tools,
            history: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Forget the conversation, keeping only the system prompt.
    pub fn reset(&mut self) {
        self.history.clear();
        self.history.push(ChatMessage::system(self.system_prompt.clone()));
    }

    /// Send a user message and run tool calls until the model answers in
    /// plain text or the step limit is hit. Model failures become the reply.
    pub fn ask(&mut self, user_message: &str) -> AgentReply {
        self.history.push(ChatMessage::user(user_message));
        let specs = self.tools.specs();
        let mut tools_called = Vec::new();

        for step in 1..=self.max_steps {
            debug!(step, history = self.history.len(), "Agent loop step");
            let reply = match self.model.chat(&self.history, &specs) {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "Chat model call failed");
                    return AgentReply {
                        text: format!("Error: {}", e),
                        tools_called,
                        steps: step,
                    };
                }
            };

            if reply.tool_calls.is_empty() {
                let text = reply.content.clone();
                self.history.push(ChatMessage {
                    role: Role::Assistant,
                    ..reply
                });
                return AgentReply {
                    text,
                    tools_called,
                    steps: step,
                };
            }

            info!(count = reply.tool_calls.len(), "Agent invoked tools");
            let calls = reply.tool_calls.clone();
            self.history.push(reply);
            for call in calls {
                let output = self.tools.call(&call.name, &call.arguments);
                debug!(tool = %call.name, "Tool returned {} bytes", output.len());
                tools_called.push(call.name.clone());
                self.history.push(ChatMessage::tool_result(call.name, output));
            }
        }

        warn!("Max steps ({}) reached, stopping loop", self.max_steps);
        AgentReply {
            text: format!(
                "I could not finish within {} steps. Please try rephrasing your request.",
                self.max_steps
            ),
            tools_called,
            steps: self.max_steps,
        }
    }
}
