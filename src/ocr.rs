//! Text extraction engines for receipt images.

use crate::config::AzureCredentials;
use crate::error::OcrError;
use crate::llm::{ChatMessage, ChatModel};
use crate::types::{OcrLine, OcrResult};
use base64::Engine as _;
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const AZURE_API_VERSION: &str = "2024-11-30";
const POLL_ATTEMPTS: usize = 60;
const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub const VISION_OCR_PROMPT: &str = "Extract all visible text from this image. Return only the extracted text without any additional formatting or explanation.";

pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn extract_text(&self, image: &Path) -> Result<OcrResult, OcrError>;
}

fn read_image(image: &Path) -> Result<Vec<u8>, OcrError> {
    fs::read(image).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcrError::FileNotFound(image.display().to_string())
        } else {
            OcrError::Io(e)
        }
    })
}

/// Local engine: runs the `tesseract` executable and reads stdout.
pub struct TesseractEngine {
    command: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(command: &str, language: &str) -> Self {
        Self {
            command: command.to_string(),
            language: language.to_string(),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn extract_text(&self, image: &Path) -> Result<OcrResult, OcrError> {
        if !image.exists() {
            return Err(OcrError::FileNotFound(image.display().to_string()));
        }
        let output = Command::new(&self.command)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| OcrError::Engine(format!("could not run {}: {}", self.command, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(OcrResult::from_text(&text))
    }
}

/// Azure Document Intelligence `prebuilt-read`: submit, then poll the
/// operation until it succeeds, fails or runs out of attempts.
pub struct AzureReadEngine {
    client: Client,
    credentials: AzureCredentials,
    poll_interval: Duration,
}

impl AzureReadEngine {
    pub fn new(credentials: AzureCredentials, timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::Engine(e.to_string()))?;
        Ok(Self {
            client,
            credentials,
            poll_interval: POLL_INTERVAL,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-read:analyze?api-version={}",
            self.credentials.endpoint.trim_end_matches('/'),
            AZURE_API_VERSION
        )
    }
}

fn network_error(e: reqwest::Error) -> OcrError {
    if e.is_connect() || e.is_timeout() {
        OcrError::Engine("Check your internet connection and try again.".to_string())
    } else {
        OcrError::Engine(format!("Network error: {}", e))
    }
}

/// Lines of every page of a succeeded `analyzeResult`.
pub fn parse_read_result(result: &serde_json::Value) -> OcrResult {
    let mut lines = Vec::new();
    let pages = result.get("pages").and_then(|p| p.as_array());
    for page in pages.into_iter().flatten() {
        let page_lines = page.get("lines").and_then(|l| l.as_array());
        for line in page_lines.into_iter().flatten() {
            let text = line
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or("")
                .to_string();
            let confidence = line.get("confidence").and_then(|c| c.as_f64());
            lines.push(OcrLine { text, confidence });
        }
    }
    OcrResult::from_lines(lines)
}

impl OcrEngine for AzureReadEngine {
    fn name(&self) -> &str {
        "azure-read"
    }

    fn extract_text(&self, image: &Path) -> Result<OcrResult, OcrError> {
        let bytes = read_image(image)?;
        let key = &self.credentials.key;

        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", key)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OcrError::Service {
                status: status.as_u16(),
                body: if body.is_empty() {
                    "Invalid key or endpoint?".to_string()
                } else {
                    body
                },
            });
        }

        let result_url = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| OcrError::Engine("No Operation-Location in response".to_string()))?
            .to_string();
        debug!(url = %result_url, "Azure read submitted");

        for attempt in 1..=POLL_ATTEMPTS {
            std::thread::sleep(self.poll_interval);
            let poll: serde_json::Value = self
                .client
                .get(&result_url)
                .header("Ocp-Apim-Subscription-Key", key)
                .send()
                .map_err(network_error)?
                .json()
                .map_err(|e| OcrError::Engine(format!("Invalid JSON: {}", e)))?;
            match poll.get("status").and_then(|s| s.as_str()).unwrap_or("") {
                "succeeded" => {
                    let result = poll
                        .get("analyzeResult")
                        .ok_or_else(|| OcrError::Engine("No analyzeResult".to_string()))?;
                    let out = parse_read_result(result);
                    info!(attempt, lines = out.lines.len(), "Azure read finished");
                    return Ok(out);
                }
                "failed" => {
                    let message = poll
                        .get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error");
                    return Err(OcrError::Engine(format!("OCR analysis failed: {}", message)));
                }
                other => debug!(attempt, status = other, "Azure read pending"),
            }
        }
        warn!(attempts = POLL_ATTEMPTS, "Azure read did not finish");
        Err(OcrError::Timeout)
    }
}

/// Hosted vision-language model asked to transcribe the image verbatim.
pub struct VisionOcrEngine {
    model: Arc<dyn ChatModel>,
}

impl VisionOcrEngine {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

impl OcrEngine for VisionOcrEngine {
    fn name(&self) -> &str {
        "vision-llm"
    }

    fn extract_text(&self, image: &Path) -> Result<OcrResult, OcrError> {
        let bytes = read_image(image)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let message = ChatMessage::user(VISION_OCR_PROMPT).with_image(encoded);
        let reply = self.model.chat(&[message], &[])?;
        let text = reply.content.trim();
        Ok(OcrResult {
            lines: text
                .lines()
                .map(|l| OcrLine {
                    text: l.to_string(),
                    confidence: None,
                })
                .collect(),
            content: Some(text.to_string()),
        })
    }
}
