//! Command handlers behind the CLI. Each returns the text to print.

use crate::cache::{LazyResources, ModelChoice};
use crate::config::{AppConfig, RawOcrBackend};
use crate::db::RunStore;
use crate::error::{AppError, OcrError};
use crate::evaluator::{document_id, GroundTruthStore};
use crate::llm::{ChatModel, OllamaChat};
use crate::ocr::{AzureReadEngine, OcrEngine, TesseractEngine, VisionOcrEngine};
use crate::services::{
    list_images, pick_random, Benchmark, DocumentOutcome, PipelineKind, PipelineParts, Rectifier,
};
use crate::solar::{
    lookup_location, predict_with, seasonal_defaults, solar_tools, LookupOutcome, SolarAgent,
    WeatherRecord,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    pub config: AppConfig,
    pub resources: Arc<LazyResources>,
    pub ground_truth: GroundTruthStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            resources: Arc::new(LazyResources::new(config.artifact_dir.clone())),
            ground_truth: GroundTruthStore::new(&config.dataset_dir),
            config,
        }
    }

    fn ollama(&self, model: &str) -> Result<Arc<dyn ChatModel>, AppError> {
        Ok(Arc::new(OllamaChat::new(
            &self.config.ollama_base_url,
            model,
            self.config.http_timeout,
        )?))
    }

    fn raw_ocr_engine(&self) -> Result<Arc<dyn OcrEngine>, AppError> {
        Ok(match self.config.raw_ocr_backend {
            RawOcrBackend::Tesseract => Arc::new(TesseractEngine::new(
                &self.config.tesseract_cmd,
                &self.config.tesseract_lang,
            )),
            RawOcrBackend::Azure => {
                let credentials = self
                    .config
                    .azure
                    .clone()
                    .ok_or(OcrError::NotConfigured("AZURE_OCR_KEY / AZURE_OCR_ENDPOINT"))?;
                Arc::new(AzureReadEngine::new(credentials, self.config.http_timeout)?)
            }
        })
    }

    pub fn pipeline_parts(&self) -> Result<PipelineParts, AppError> {
        let rectifier = Arc::new(Rectifier::new(self.ollama(&self.config.chat_model)?));
        Ok(PipelineParts {
            raw_ocr: self.raw_ocr_engine()?,
            vision_ocr: Arc::new(VisionOcrEngine::new(self.ollama(&self.config.vision_model)?)),
            corrector: rectifier.clone(),
            extractor: rectifier,
        })
    }

    pub fn open_store(&self) -> Result<RunStore, AppError> {
        Ok(RunStore::open(&self.config.db_path)?)
    }
}

pub fn status(state: &AppState) -> String {
    state
        .config
        .status_lines()
        .into_iter()
        .map(|(k, v)| format!("{:<13}{}", format!("{}:", k), v))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn lookup(city: &str) -> String {
    lookup_location(city).to_string()
}

pub fn seasonal(month: i64) -> String {
    match seasonal_defaults(Some(month)) {
        Ok(d) => d.to_string(),
        Err(e) => e.to_string(),
    }
}

pub fn features(state: &AppState) -> String {
    match state.resources.get().feature_info() {
        Some(info) => info.to_string(),
        None => "Model features not available".to_string(),
    }
}

/// Inline JSON when it looks like an object, otherwise a file path.
fn read_record(input: &str) -> Result<WeatherRecord, AppError> {
    let raw = if input.trim_start().starts_with('{') {
        input.to_string()
    } else {
        std::fs::read_to_string(input)?
    };
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    WeatherRecord::from_json(&value).map_err(AppError::InvalidInput)
}

/// Seasonal defaults for `month` plus the coordinates of `city`, as a base
/// record explicit inputs are layered on.
fn base_record(city: Option<&str>, month: Option<i64>) -> Result<WeatherRecord, AppError> {
    let mut pairs: Vec<(String, f64)> = Vec::new();
    if let Some(m) = month {
        let defaults = seasonal_defaults(Some(m)).map_err(|e| AppError::InvalidInput(e.to_string()))?;
        pairs.extend(defaults.parameters().into_iter().map(|(k, v)| (k.to_string(), v)));
    }
    if let Some(city) = city {
        match lookup_location(city) {
            LookupOutcome::Found {
                latitude, longitude, ..
            } => {
                pairs.push(("Latitude".to_string(), latitude));
                pairs.push(("Longitude".to_string(), longitude));
            }
            other => return Err(AppError::InvalidInput(other.to_string())),
        }
    }
    Ok(WeatherRecord::from_pairs(pairs))
}

pub fn predict(
    state: &AppState,
    json: Option<&str>,
    city: Option<&str>,
    month: Option<i64>,
    model: ModelChoice,
) -> Result<String, AppError> {
    let explicit = match json {
        Some(input) => read_record(input)?,
        None => WeatherRecord::default(),
    };
    let record = base_record(city, month)?.merged(&explicit);
    let result = predict_with(&record, state.resources.get(), model)
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;
    info!(model = model.label(), prediction = result.prediction_kwh_kwp, "predicted");
    Ok(format!(
        "{} prediction: {} kWh/kWp\n{}",
        model.label(),
        result.prediction_kwh_kwp,
        serde_json::to_string_pretty(&result)?
    ))
}

/// One message, or a line-by-line session on stdin when `message` is `None`.
pub fn chat(state: &AppState, message: Option<&str>) -> Result<(), AppError> {
    let model = state.ollama(&state.config.chat_model)?;
    let mut agent = SolarAgent::new(model, solar_tools(state.resources.clone()));

    if let Some(message) = message {
        println!("{}", agent.ask(message).text);
        return Ok(());
    }

    println!("Solar prediction assistant. /reset clears the conversation, /quit exits.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                agent.reset();
                println!("Conversation cleared.");
            }
            text => {
                let reply = agent.ask(text);
                if !reply.tools_called.is_empty() {
                    println!("[tools: {}]", reply.tools_called.join(", "));
                }
                println!("{}", reply.text);
            }
        }
    }
    Ok(())
}

pub fn ocr(state: &AppState, kind: PipelineKind, image: &Path) -> Result<String, AppError> {
    let pipeline = state.pipeline_parts()?.build(kind);
    let output = pipeline.process(image);
    Ok(serde_json::to_string_pretty(&output)?)
}

pub fn ground_truth(state: &AppState, document: &str) -> Result<String, AppError> {
    let gt = state.ground_truth.load_ground_truth(document);
    if gt.is_empty() {
        return Ok(format!("No ground truth found for {}", document_id(document)));
    }
    Ok(serde_json::to_string_pretty(&gt)?)
}

/// Single-receipt view: extracted and reference text side by side with scores.
pub fn render_outcome(pipeline: &str, outcome: &DocumentOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} on {} ===\n", pipeline, outcome.document));
    out.push_str(&format!("Time Taken: {:.2} seconds\n", outcome.elapsed.as_secs_f64()));
    out.push_str("\n--- Extracted Text ---\n");
    out.push_str(&outcome.output.raw_text);
    out.push_str("\n\n--- Ground Truth Text ---\n");
    out.push_str(&outcome.ground_truth.ocr_text);
    out.push('\n');
    if !outcome.output.structured_data.is_empty() {
        out.push_str("\n--- Extracted Entities ---\n");
        for (k, v) in &outcome.output.structured_data {
            out.push_str(&format!("{}: {}\n", k, v));
        }
    }
    if let Some(entities) = &outcome.ground_truth.entities {
        out.push_str("\n--- Ground Truth Entities ---\n");
        for (k, v) in entities {
            out.push_str(&format!("{}: {}\n", k, v));
        }
    }
    out.push_str("\n--- Metrics ---\n");
    match (&outcome.metrics, &outcome.error) {
        (Some(m), _) => {
            if let Some(cer) = m.ocr_cer {
                out.push_str(&format!("ocr_cer: {:.4}\n", cer));
            }
            if let Some(wer) = m.ocr_wer {
                out.push_str(&format!("ocr_wer: {:.4}\n", wer));
            }
            if let Some(err) = &m.ocr_error {
                out.push_str(&format!("ocr_error: {}\n", err));
            }
            if let Some(acc) = m.entity_accuracy {
                out.push_str(&format!("entity_accuracy: {:.4}\n", acc));
                for f in &m.fields {
                    out.push_str(&format!(
                        "  {} {}: expected '{}', got '{}'\n",
                        if f.matched { "ok " } else { "err" },
                        f.field,
                        f.expected,
                        f.predicted.as_deref().unwrap_or("")
                    ));
                }
            }
        }
        (None, Some(err)) => out.push_str(&format!("error: {}\n", err)),
        (None, None) => {}
    }
    out
}

pub fn evaluate(state: &AppState, kind: PipelineKind, image: &Path) -> Result<String, AppError> {
    let pipeline = state.pipeline_parts()?.build(kind);
    let bench = Benchmark::new(&state.ground_truth, state.config.dataset_dir.display().to_string());
    let outcome = bench.process_document(&pipeline, image);
    Ok(render_outcome(pipeline.name(), &outcome))
}

pub fn benchmark(
    state: &AppState,
    samples: Option<usize>,
    kinds: &[PipelineKind],
    store: bool,
) -> Result<String, AppError> {
    let images = list_images(&state.config.dataset_dir)?;
    if images.is_empty() {
        return Ok("No images found.".to_string());
    }
    let parts = state.pipeline_parts()?;
    let pipelines: Vec<_> = if kinds.is_empty() {
        parts.build_all()
    } else {
        kinds.iter().map(|k| parts.build(*k)).collect()
    };

    let run_store = if store { Some(state.open_store()?) } else { None };
    let mut bench = Benchmark::new(&state.ground_truth, state.config.dataset_dir.display().to_string());
    if let Some(s) = &run_store {
        bench = bench.with_store(s);
    }
    let summaries = bench.run(&pipelines, &images, samples)?;

    let mut out = String::from("=== Final Summary ===\n");
    for s in &summaries {
        out.push_str(&format!("{}:\n", s.pipeline));
        out.push_str(&serde_json::to_string_pretty(s)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn verify(state: &AppState, image: Option<PathBuf>) -> Result<String, AppError> {
    let image = match image {
        Some(p) => p,
        None => {
            let images = list_images(&state.config.dataset_dir)?;
            match pick_random(&images) {
                Some(p) => p.clone(),
                None => {
                    return Ok("No images found. Please ensure the SROIE2019 dataset is downloaded and placed under `data/`.".to_string())
                }
            }
        }
    };

    let mut out = format!(
        "Testing with {}\nLLM Used: {}\nVLM Used: {}\n",
        image.display(),
        state.config.chat_model,
        state.config.vision_model
    );
    let gt = state.ground_truth.load_ground_truth(&image.to_string_lossy());
    out.push_str(&format!(
        "Ground Truth Entities: {}\nGround Truth Raw Text Length: {}\n",
        gt.entities
            .as_ref()
            .map(|e| serde_json::to_string(e).unwrap_or_default())
            .unwrap_or_else(|| "None".to_string()),
        gt.ocr_text.chars().count()
    ));

    let bench = Benchmark::new(&state.ground_truth, state.config.dataset_dir.display().to_string());
    for pipeline in state.pipeline_parts()?.build_all() {
        let o = bench.process_document(&pipeline, &image);
        out.push_str(&format!("\n--- Testing Pipeline: {} ---\n", pipeline.name()));
        out.push_str(&format!("Raw Text Length: {}\n", o.output.raw_text.chars().count()));
        out.push_str(&format!(
            "Structured Data: {}\n",
            serde_json::to_string(&o.output.structured_data)?
        ));
        out.push_str(&format!("Time Taken: {:.2} seconds\n", o.elapsed.as_secs_f64()));
        match (&o.metrics, &o.error) {
            (Some(m), _) => {
                let v = serde_json::to_value(m)?;
                if let Some(obj) = v.as_object() {
                    for (k, v) in obj {
                        out.push_str(&format!("{}: {}\n", k, v));
                    }
                }
            }
            (None, Some(e)) => out.push_str(&format!("error: {}\n", e)),
            (None, None) => {}
        }
        out.push_str(&"=".repeat(40));
        out.push('\n');
    }
    Ok(out)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "-".to_string())
}

pub fn history(state: &AppState, run: Option<i64>, limit: usize) -> Result<String, AppError> {
    let store = state.open_store()?;
    let Some(run_id) = run else {
        let runs = store.list_runs(limit)?;
        if runs.is_empty() {
            return Ok("No benchmark runs recorded.".to_string());
        }
        let mut out = format!(
            "{:>5}  {:<25}  {:<45}  {:>5}  {:>8}  {:>8}  {:>8}\n",
            "id", "created", "pipeline", "docs", "CER", "WER", "entity"
        );
        for r in runs {
            out.push_str(&format!(
                "{:>5}  {:<25}  {:<45}  {:>5}  {:>8}  {:>8}  {:>8}\n",
                r.id,
                r.created_at,
                r.pipeline_name,
                r.documents,
                fmt_opt(r.avg_cer),
                fmt_opt(r.avg_wer),
                fmt_opt(r.avg_entity_accuracy)
            ));
        }
        return Ok(out);
    };

    let Some(run) = store.get_run(run_id)? else {
        return Err(AppError::InvalidInput(format!("no run with id {}", run_id)));
    };
    let mut out = format!(
        "Run {} ({}) on {} at {}\n",
        run.id, run.pipeline_name, run.dataset, run.created_at
    );
    for d in store.run_documents(run_id)? {
        let m = d.metrics.unwrap_or_default();
        out.push_str(&format!(
            "{:<20}  cer {:>8}  wer {:>8}  entity {:>8}{}\n",
            d.document,
            fmt_opt(m.ocr_cer),
            fmt_opt(m.ocr_wer),
            fmt_opt(m.entity_accuracy),
            d.error.map(|e| format!("  ({})", e)).unwrap_or_default()
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_record_merges_defaults_and_coordinates() {
        let r = base_record(Some("perth"), Some(1)).unwrap();
        assert_eq!(r.get("Latitude"), Some(-31.9559));
        assert_eq!(r.get("MinTemp"), Some(20.0));
        assert!(r.contains("month_sin"));
        assert_eq!(r.len(), 21);
    }

    #[test]
    fn base_record_rejects_unknown_city() {
        assert!(matches!(
            base_record(Some("Atlantis"), None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn inline_record_is_parsed() {
        let r = read_record(r#"{"MinTemp": 3, "RainToday": "no"}"#).unwrap();
        assert_eq!(r.get("MinTemp"), Some(3.0));
        assert_eq!(r.get("RainToday"), Some(0.0));
    }
}
