//! Hosted chat model capability and its Ollama client.

use crate::error::LlmError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Base64-encoded images for vision-language models.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn with_image(mut self, base64_image: String) -> Self {
        self.images.push(base64_image);
        self
    }
}

/// Descriptor handed to the model so it can request a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

pub trait ChatModel: Send + Sync {
    fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage, LlmError>;
}

/// Ollama `/api/chat`, non-streaming, temperature 0.
pub struct OllamaChat {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool<'a>>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    images: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<&'a str>,
}

#[derive(Serialize)]
struct OllamaTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

/// Some models send arguments as a JSON string instead of an object.
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}

impl ChatModel for OllamaChat {
    fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage, LlmError> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role,
                    content: &m.content,
                    images: &m.images,
                    tool_calls: m
                        .tool_calls
                        .iter()
                        .map(|c| OllamaToolCall {
                            function: OllamaFunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect(),
                    tool_name: m.tool_name.as_deref(),
                })
                .collect(),
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
            tools: tools
                .iter()
                .map(|t| OllamaTool {
                    kind: "function",
                    function: t,
                })
                .collect(),
        };

        debug!(model = %self.model, messages = messages.len(), tools = tools.len(), "Sending request to Ollama");

        let res = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaChatResponse = res.json()?;
        Ok(ChatMessage {
            tool_calls: parsed
                .message
                .tool_calls
                .into_iter()
                .map(|c| ToolCall {
                    name: c.function.name,
                    arguments: normalize_arguments(c.function.arguments),
                })
                .collect(),
            ..ChatMessage::assistant(parsed.message.content)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_function_tool_format() {
        let spec = ToolSpec {
            name: "lookup_location".into(),
            description: "Looks up coordinates".into(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let msg = ChatMessage::user("hi");
        let body = OllamaChatRequest {
            model: "m",
            messages: vec![OllamaMessage {
                role: msg.role,
                content: &msg.content,
                images: &msg.images,
                tool_calls: Vec::new(),
                tool_name: None,
            }],
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
            tools: vec![OllamaTool {
                kind: "function",
                function: &spec,
            }],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["tools"][0]["type"], "function");
        assert_eq!(v["tools"][0]["function"]["name"], "lookup_location");
        assert_eq!(v["messages"][0]["role"], "user");
        assert!(v["messages"][0].get("images").is_none());
    }

    #[test]
    fn response_tool_calls_parse() {
        let raw = r#"{"message":{"role":"assistant","content":"","tool_calls":[
            {"function":{"name":"lookup_location","arguments":{"city":"Perth"}}},
            {"function":{"name":"get_seasonal_weather_defaults","arguments":"{\"month\": 6}"}}]}}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(raw).unwrap();
        let calls: Vec<_> = parsed
            .message
            .tool_calls
            .into_iter()
            .map(|c| normalize_arguments(c.function.arguments))
            .collect();
        assert_eq!(calls[0]["city"], "Perth");
        assert_eq!(calls[1]["month"], 6);
    }
}
