//! LLM passes over OCR text: spelling correction and receipt field extraction.

use crate::evaluator::stringify_entities;
use crate::llm::{ChatMessage, ChatModel};
use crate::types::EntityMap;
use std::sync::Arc;
use tracing::warn;

pub trait TextCorrector: Send + Sync {
    /// Never fails: on any problem the input comes back unchanged.
    fn correct_text(&self, text: &str) -> String;
}

pub trait EntityExtractor: Send + Sync {
    /// `None` when the model call fails or its reply is not a JSON object.
    fn extract_entities(&self, text: &str) -> Option<EntityMap>;
}

fn correction_prompt(text: &str) -> String {
    format!(
        "You are an expert at correcting OCR errors. Please correct the following OCR-extracted text, fixing spelling mistakes, improving formatting, and ensuring coherence. Return only the corrected text without any explanation.\n\nOCR Text:\n{}",
        text
    )
}

fn extraction_prompt(text: &str) -> String {
    format!(
        r#"Extract the following information from the receipt text below:
1. Company Name (company)
2. Date (date) in MM/DD/YYYY format
3. Address (address)
4. Total Amount (total) (Do not include currency symbols)

Return the result as a Valid JSON object with keys: "company", "date", "address", "total".
Do not include any other text or markdown formatting.

Receipt Text:
{}"#,
        text
    )
}

/// Drop Markdown code fences models like to wrap JSON in.
pub fn strip_code_fences(reply: &str) -> String {
    reply.replace("```json", "").replace("```", "").trim().to_string()
}

pub fn parse_entities(reply: &str) -> Option<EntityMap> {
    let cleaned = strip_code_fences(reply);
    match serde_json::from_str::<serde_json::Value>(&cleaned) {
        Ok(serde_json::Value::Object(map)) => Some(stringify_entities(&map)),
        Ok(_) => {
            warn!("entity reply is not a JSON object");
            None
        }
        Err(e) => {
            warn!(error = %e, "could not parse entity reply");
            None
        }
    }
}

/// Both passes backed by one chat model.
pub struct Rectifier {
    model: Arc<dyn ChatModel>,
}

impl Rectifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn ask(&self, prompt: String) -> Option<String> {
        match self.model.chat(&[ChatMessage::user(prompt)], &[]) {
            Ok(reply) => Some(reply.content),
            Err(e) => {
                warn!(error = %e, "rectification call failed");
                None
            }
        }
    }
}

impl TextCorrector for Rectifier {
    fn correct_text(&self, text: &str) -> String {
        match self.ask(correction_prompt(text)) {
            Some(reply) => reply.trim().to_string(),
            None => text.to_string(),
        }
    }
}

impl EntityExtractor for Rectifier {
    fn extract_entities(&self, text: &str) -> Option<EntityMap> {
        parse_entities(&self.ask(extraction_prompt(text))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_parses() {
        let reply = "```json\n{\"company\": \"SHOP\", \"total\": 9.5}\n```";
        let m = parse_entities(reply).unwrap();
        assert_eq!(m["company"], "SHOP");
        assert_eq!(m["total"], "9.5");
    }

    #[test]
    fn prose_or_arrays_are_no_structured_data() {
        assert!(parse_entities("Here is the data: company SHOP").is_none());
        assert!(parse_entities("[1, 2]").is_none());
    }

    #[test]
    fn prompts_embed_the_text() {
        assert!(extraction_prompt("ABC").ends_with("Receipt Text:\nABC"));
        assert!(correction_prompt("ABC").ends_with("OCR Text:\nABC"));
    }
}
