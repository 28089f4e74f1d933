use thiserror::Error;

/// Failures talking to a hosted chat or vision-language model.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Check your internet connection and try again.")]
    Connection,

    #[error("network error: {0}")]
    Network(String),

    #[error("model service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            LlmError::Connection
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not set in .env")]
    NotConfigured(&'static str),

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("OCR failed ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("OCR timed out. Try again.")]
    Timeout,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("could not read artifact {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid artifact {path}: {message}")]
    Invalid { path: String, message: String },

    #[error("feature vector has {got} values, model expects {expected}")]
    Width { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("No ground truth found")]
    NoGroundTruth,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not create store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Top-level error for the command layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Evaluate(#[from] EvaluateError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
