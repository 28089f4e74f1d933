//! Runs pipelines over dataset images and aggregates their scores.

use crate::db::RunStore;
use crate::error::{AppError, StoreError};
use crate::evaluator::{document_id, evaluate, GroundTruthStore};
use crate::types::{EvaluationMetrics, GroundTruth, PipelineOutput};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::pipeline::Pipeline;

/// Sorted `img/*.jpg` under the dataset root.
pub fn list_images(dataset_dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let img_dir = dataset_dir.join("img");
    if !img_dir.is_dir() {
        return Err(AppError::Dataset(format!(
            "Dataset directory not found at {}",
            img_dir.display()
        )));
    }
    let mut images: Vec<PathBuf> = std::fs::read_dir(&img_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|x| x.to_str())
                    .map(|x| x.eq_ignore_ascii_case("jpg"))
                    .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}

pub fn pick_random(images: &[PathBuf]) -> Option<&PathBuf> {
    images.choose(&mut rand::thread_rng())
}

/// One pipeline applied to one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub document: String,
    pub output: PipelineOutput,
    pub ground_truth: GroundTruth,
    pub metrics: Option<EvaluationMetrics>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub pipeline: String,
    pub documents: usize,
    #[serde(rename = "Average CER", skip_serializing_if = "Option::is_none")]
    pub avg_cer: Option<f64>,
    #[serde(rename = "Average WER", skip_serializing_if = "Option::is_none")]
    pub avg_wer: Option<f64>,
    #[serde(rename = "Average Entity Accuracy", skip_serializing_if = "Option::is_none")]
    pub avg_entity_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<i64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Averages over the documents that produced each metric.
pub fn summarize(pipeline: &str, outcomes: &[DocumentOutcome]) -> PipelineSummary {
    let metrics: Vec<&EvaluationMetrics> = outcomes.iter().filter_map(|o| o.metrics.as_ref()).collect();
    let cer: Vec<f64> = metrics.iter().filter_map(|m| m.ocr_cer).collect();
    let wer: Vec<f64> = metrics.iter().filter_map(|m| m.ocr_wer).collect();
    let acc: Vec<f64> = metrics.iter().filter_map(|m| m.entity_accuracy).collect();
    PipelineSummary {
        pipeline: pipeline.to_string(),
        documents: outcomes.len(),
        avg_cer: mean(&cer),
        avg_wer: mean(&wer),
        avg_entity_accuracy: mean(&acc),
        run_id: None,
    }
}

pub struct Benchmark<'a> {
    ground_truth: &'a GroundTruthStore,
    store: Option<&'a RunStore>,
    dataset_label: String,
}

impl<'a> Benchmark<'a> {
    pub fn new(ground_truth: &'a GroundTruthStore, dataset_label: impl Into<String>) -> Self {
        Self {
            ground_truth,
            store: None,
            dataset_label: dataset_label.into(),
        }
    }

    pub fn with_store(mut self, store: &'a RunStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Process, load ground truth, score. Missing ground truth is recorded on
    /// the outcome rather than failing.
    pub fn process_document(&self, pipeline: &Pipeline, image: &Path) -> DocumentOutcome {
        let start = Instant::now();
        let output = pipeline.process(image);
        let elapsed = start.elapsed();
        let ground_truth = self.ground_truth.load_ground_truth(&image.to_string_lossy());
        let (metrics, error) = match evaluate(&output, &ground_truth) {
            Ok(m) => (Some(m), None),
            Err(e) => {
                warn!(image = %image.display(), error = %e, "document not scored");
                (None, Some(e.to_string()))
            }
        };
        DocumentOutcome {
            document: document_id(&image.to_string_lossy()),
            output,
            ground_truth,
            metrics,
            error,
            elapsed,
        }
    }

    /// Every pipeline over the first `limit` images (all when `None` or 0).
    pub fn run(
        &self,
        pipelines: &[Pipeline],
        images: &[PathBuf],
        limit: Option<usize>,
    ) -> Result<Vec<PipelineSummary>, StoreError> {
        let selected = match limit {
            Some(n) if n > 0 && n < images.len() => &images[..n],
            _ => images,
        };
        info!(selected = selected.len(), total = images.len(), "Evaluating");

        let mut summaries = Vec::with_capacity(pipelines.len());
        for pipeline in pipelines {
            info!(pipeline = pipeline.name(), "Running evaluation");
            let outcomes: Vec<DocumentOutcome> = selected
                .iter()
                .map(|image| self.process_document(pipeline, image))
                .collect();
            let mut summary = summarize(pipeline.name(), &outcomes);
            if let Some(store) = self.store {
                summary.run_id = Some(self.persist(store, &summary, &outcomes)?);
            }
            info!(
                pipeline = pipeline.name(),
                cer = ?summary.avg_cer,
                wer = ?summary.avg_wer,
                entity_accuracy = ?summary.avg_entity_accuracy,
                "Results"
            );
            summaries.push(summary);
        }
        Ok(summaries)
    }

    fn persist(
        &self,
        store: &RunStore,
        summary: &PipelineSummary,
        outcomes: &[DocumentOutcome],
    ) -> Result<i64, StoreError> {
        let run_id = store.record_run(
            &summary.pipeline,
            &self.dataset_label,
            summary.documents,
            summary.avg_cer,
            summary.avg_wer,
            summary.avg_entity_accuracy,
        )?;
        for o in outcomes {
            store.record_document(
                run_id,
                &o.document,
                o.metrics.as_ref(),
                &o.output.structured_data,
                o.error.as_deref(),
                Some(o.elapsed.as_millis() as i64),
            )?;
        }
        Ok(run_id)
    }
}
