use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Receipt fields keyed by name (`company`, `date`, `address`, `total`).
pub type EntityMap = BTreeMap<String, String>;

/// The four structured fields every receipt is scored on.
pub const ENTITY_FIELDS: [&str; 4] = ["company", "date", "address", "total"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub lines: Vec<OcrLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl OcrResult {
    pub fn from_lines(lines: Vec<OcrLine>) -> Self {
        let content = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            lines,
            content: Some(content),
        }
    }

    pub fn from_text(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| OcrLine {
                text: l.to_string(),
                confidence: None,
            })
            .collect();
        Self::from_lines(lines)
    }

    pub fn text(&self) -> String {
        match &self.content {
            Some(c) => c.clone(),
            None => self
                .lines
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// What one pipeline produced for one receipt image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub raw_text: String,
    /// Empty when the pipeline has no extraction step or extraction failed.
    pub structured_data: EntityMap,
    pub pipeline_name: String,
}

/// Reference transcription and labels for one receipt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundTruth {
    pub ocr_text: String,
    pub entities: Option<EntityMap>,
}

impl GroundTruth {
    /// Labels that are present but empty count as no labels.
    pub fn has_entities(&self) -> bool {
        self.entities.as_ref().map_or(false, |e| !e.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.ocr_text.is_empty() && !self.has_entities()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: String,
    pub expected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted: Option<String>,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_cer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_wer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<FieldComparison>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_drops_blank_lines() {
        let r = OcrResult::from_text("SHOP A\n\n  TOTAL 9.00 \n");
        assert_eq!(r.lines.len(), 2);
        assert_eq!(r.text(), "SHOP A\nTOTAL 9.00");
    }

    #[test]
    fn ground_truth_empty_without_text_or_labels() {
        assert!(GroundTruth::default().is_empty());
        let mut gt = GroundTruth {
            ocr_text: String::new(),
            entities: Some(EntityMap::new()),
        };
        assert!(gt.is_empty());
        assert!(!gt.has_entities());
        gt.entities = Some([("company".to_string(), "A".to_string())].into_iter().collect());
        assert!(!gt.is_empty());
    }
}
