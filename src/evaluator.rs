//! Ground truth loading and scoring against the SROIE-style dataset layout:
//! `<dataset>/box/<id>.txt` holds `x1,y1,...,y4,TEXT` lines and
//! `<dataset>/entities/<id>.txt` holds a JSON object with the four labels.

use crate::error::EvaluateError;
use crate::normalize::{normalize_field, normalize_transcript};
use crate::types::{
    EntityMap, EvaluationMetrics, FieldComparison, GroundTruth, PipelineOutput, ENTITY_FIELDS,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Text column index in a bounding-box annotation line.
const BOX_TEXT_FIELD: usize = 8;

pub struct GroundTruthStore {
    box_dir: PathBuf,
    entities_dir: PathBuf,
}

/// `X51008145450.jpg`, `/a/b/X51008145450.txt` and `X51008145450` all name the same document.
pub fn document_id(document: &str) -> String {
    Path::new(document)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(document)
        .to_string()
}

impl GroundTruthStore {
    pub fn new(dataset_dir: impl AsRef<Path>) -> Self {
        let dataset_dir = dataset_dir.as_ref();
        Self {
            box_dir: dataset_dir.join("box"),
            entities_dir: dataset_dir.join("entities"),
        }
    }

    /// Missing files are the normal "no ground truth" case, never an error.
    pub fn load_ground_truth(&self, document: &str) -> GroundTruth {
        let txt_name = format!("{}.txt", document_id(document));
        GroundTruth {
            ocr_text: self.load_transcript(&self.box_dir.join(&txt_name)),
            entities: self.load_entities(&self.entities_dir.join(&txt_name)),
        }
    }

    fn load_transcript(&self, path: &Path) -> String {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no box annotation");
                return String::new();
            }
        };
        parse_box_annotation(&String::from_utf8_lossy(&bytes))
    }

    fn load_entities(&self, path: &Path) -> Option<EntityMap> {
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no entity labels");
                return None;
            }
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(map)) => Some(stringify_entities(&map)),
            Ok(_) => {
                warn!(path = %path.display(), "entity labels are not a JSON object");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not parse entity labels");
                None
            }
        }
    }
}

/// Keep the text column of every annotation line, in file order. Text may
/// itself contain commas, so the line is split into at most nine fields.
pub fn parse_box_annotation(raw: &str) -> String {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim().replace('\u{FFFD}', "");
            let parts: Vec<&str> = line.splitn(BOX_TEXT_FIELD + 1, ',').collect();
            parts.get(BOX_TEXT_FIELD).map(|t| t.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON values to strings: strings as-is, numbers/bools rendered, nulls dropped.
pub fn stringify_entities(map: &serde_json::Map<String, serde_json::Value>) -> EntityMap {
    map.iter()
        .filter_map(|(k, v)| {
            let s = match v {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), s))
        })
        .collect()
}

/// Word and character error rates of `hypothesis` against `reference`.
/// Returns `None` when the reference is empty after normalisation.
pub fn error_rates(reference: &str, hypothesis: &str) -> Option<(f64, f64)> {
    let reference = normalize_transcript(reference);
    let hypothesis = normalize_transcript(hypothesis);
    if reference.is_empty() {
        return None;
    }

    let ref_words: Vec<&str> = reference.split(' ').collect();
    let hyp_words: Vec<&str> = if hypothesis.is_empty() {
        Vec::new()
    } else {
        hypothesis.split(' ').collect()
    };
    let wer = strsim::generic_levenshtein(&ref_words, &hyp_words) as f64 / ref_words.len() as f64;

    let ref_chars: Vec<char> = reference.chars().collect();
    let hyp_chars: Vec<char> = hypothesis.chars().collect();
    let cer = strsim::generic_levenshtein(&ref_chars, &hyp_chars) as f64 / ref_chars.len() as f64;

    Some((cer, wer))
}

/// Compare predicted against reference entities over the fixed checklist.
/// Only checklist fields present in the reference count; a field the
/// prediction lacks is a miss.
pub fn entity_accuracy(predicted: &EntityMap, reference: &EntityMap) -> (f64, Vec<FieldComparison>) {
    let mut comparisons = Vec::new();
    for field in ENTITY_FIELDS {
        let Some(expected) = reference.get(field) else {
            continue;
        };
        let predicted_value = predicted.get(field);
        let matched = predicted_value
            .map(|p| normalize_field(field, p) == normalize_field(field, expected))
            .unwrap_or(false);
        comparisons.push(FieldComparison {
            field: field.to_string(),
            expected: expected.clone(),
            predicted: predicted_value.cloned(),
            matched,
        });
    }
    let total = comparisons.len();
    let correct = comparisons.iter().filter(|c| c.matched).count();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    (accuracy, comparisons)
}

/// Score one pipeline output. OCR rates need reference text; entity accuracy
/// needs reference labels and a non-empty prediction.
pub fn evaluate(
    prediction: &PipelineOutput,
    ground_truth: &GroundTruth,
) -> Result<EvaluationMetrics, EvaluateError> {
    if ground_truth.is_empty() {
        return Err(EvaluateError::NoGroundTruth);
    }

    let mut metrics = EvaluationMetrics::default();

    if !ground_truth.ocr_text.is_empty() {
        match error_rates(&ground_truth.ocr_text, &prediction.raw_text) {
            Some((cer, wer)) => {
                metrics.ocr_cer = Some(cer);
                metrics.ocr_wer = Some(wer);
            }
            None => {
                metrics.ocr_error = Some("reference text is empty after normalization".to_string());
            }
        }
    }

    if let Some(reference) = ground_truth.entities.as_ref().filter(|e| !e.is_empty()) {
        if !prediction.structured_data.is_empty() {
            let (accuracy, fields) = entity_accuracy(&prediction.structured_data, reference);
            metrics.entity_accuracy = Some(accuracy);
            metrics.fields = fields;
        }
    }

    Ok(metrics)
}
