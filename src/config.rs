use std::path::PathBuf;
use std::time::Duration;

const APP_DIR_NAME: &str = "solar-ocr-bench";

/// Load `.env` from the working directory, then from the app data dir so
/// installed users can keep credentials there. Already-set variables win.
pub fn load_env() {
    let _ = dotenvy::dotenv();
    if let Some(dir) = app_data_dir() {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }
    }
}

pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR_NAME))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Which engine backs the "raw OCR" pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOcrBackend {
    Tesseract,
    Azure,
}

impl RawOcrBackend {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "azure" => RawOcrBackend::Azure,
            _ => RawOcrBackend::Tesseract,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub key: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ollama_base_url: String,
    pub chat_model: String,
    pub vision_model: String,
    pub http_timeout: Duration,
    pub artifact_dir: PathBuf,
    pub dataset_dir: PathBuf,
    pub raw_ocr_backend: RawOcrBackend,
    pub tesseract_cmd: String,
    pub tesseract_lang: String,
    pub azure: Option<AzureCredentials>,
    pub db_path: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let timeout_secs = env_opt("HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(120);
        let azure = match (env_opt("AZURE_OCR_KEY"), env_opt("AZURE_OCR_ENDPOINT")) {
            (Some(key), Some(endpoint)) => Some(AzureCredentials {
                key,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            }),
            _ => None,
        };
        let db_path = env_opt("BENCH_DB_PATH").map(PathBuf::from).unwrap_or_else(|| {
            app_data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bench.db")
        });

        Self {
            ollama_base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434")
                .trim_end_matches('/')
                .to_string(),
            chat_model: env_or("OLLAMA_LLM", "qwen2.5:7b"),
            vision_model: env_or("OLLAMA_VLM", "llava:7b"),
            http_timeout: Duration::from_secs(timeout_secs),
            artifact_dir: PathBuf::from(env_or("SOLAR_ARTIFACT_DIR", ".")),
            dataset_dir: PathBuf::from(env_or("SROIE_DATASET_DIR", "data/SROIE2019/train")),
            raw_ocr_backend: RawOcrBackend::parse(&env_or("OCR_ENGINE", "tesseract")),
            tesseract_cmd: env_or("TESSERACT_CMD", "tesseract"),
            tesseract_lang: env_or("TESSERACT_LANG", "eng"),
            azure,
            db_path,
            log_level: env_or("LOG_LEVEL", "info"),
        }
    }

    /// Service summary for the `status` command. Never includes secrets.
    pub fn status_lines(&self) -> Vec<(String, String)> {
        vec![
            ("ollama".to_string(), self.ollama_base_url.clone()),
            ("chat_model".to_string(), self.chat_model.clone()),
            ("vision_model".to_string(), self.vision_model.clone()),
            (
                "raw_ocr".to_string(),
                match self.raw_ocr_backend {
                    RawOcrBackend::Tesseract => format!("tesseract ({})", self.tesseract_cmd),
                    RawOcrBackend::Azure => "azure prebuilt-read".to_string(),
                },
            ),
            (
                "azure".to_string(),
                if self.azure.is_some() { "configured" } else { "not_configured" }.to_string(),
            ),
            ("artifacts".to_string(), self.artifact_dir.display().to_string()),
            ("dataset".to_string(), self.dataset_dir.display().to_string()),
            ("store".to_string(), self.db_path.display().to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parse_defaults_to_tesseract() {
        assert_eq!(RawOcrBackend::parse("AZURE"), RawOcrBackend::Azure);
        assert_eq!(RawOcrBackend::parse("easyocr"), RawOcrBackend::Tesseract);
    }
}
