//! Receipt pipelines: one OCR engine, optionally followed by an LLM
//! correction pass and an entity extraction pass.

use crate::ocr::OcrEngine;
use crate::types::PipelineOutput;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::rectifier::{EntityExtractor, TextCorrector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum PipelineKind {
    /// Local OCR engine only
    RawOcr,
    /// Vision-language model transcription only
    MultimodalOcr,
    /// Local OCR engine, then entity extraction
    RawOcrEntities,
    /// Vision-language transcription, correction, then entity extraction
    MultimodalOcrEntities,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 4] = [
        PipelineKind::RawOcr,
        PipelineKind::MultimodalOcr,
        PipelineKind::RawOcrEntities,
        PipelineKind::MultimodalOcrEntities,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            PipelineKind::RawOcr => "Raw OCR",
            PipelineKind::MultimodalOcr => "Improved OCR (Multimodal)",
            PipelineKind::RawOcrEntities => "Raw OCR + Entity Analysis",
            PipelineKind::MultimodalOcrEntities => "Improved OCR (Multimodal) + Entity Analysis",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub struct Pipeline {
    name: String,
    ocr: Arc<dyn OcrEngine>,
    corrector: Option<Arc<dyn TextCorrector>>,
    extractor: Option<Arc<dyn EntityExtractor>>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        ocr: Arc<dyn OcrEngine>,
        corrector: Option<Arc<dyn TextCorrector>>,
        extractor: Option<Arc<dyn EntityExtractor>>,
    ) -> Self {
        Self {
            name: name.into(),
            ocr,
            corrector,
            extractor,
        }
    }

    pub fn raw_ocr(ocr: Arc<dyn OcrEngine>) -> Self {
        Self::new(PipelineKind::RawOcr.display_name(), ocr, None, None)
    }

    pub fn multimodal_ocr(vision: Arc<dyn OcrEngine>) -> Self {
        Self::new(PipelineKind::MultimodalOcr.display_name(), vision, None, None)
    }

    pub fn raw_ocr_with_entities(ocr: Arc<dyn OcrEngine>, extractor: Arc<dyn EntityExtractor>) -> Self {
        Self::new(PipelineKind::RawOcrEntities.display_name(), ocr, None, Some(extractor))
    }

    pub fn multimodal_ocr_with_entities(
        vision: Arc<dyn OcrEngine>,
        corrector: Arc<dyn TextCorrector>,
        extractor: Arc<dyn EntityExtractor>,
    ) -> Self {
        Self::new(
            PipelineKind::MultimodalOcrEntities.display_name(),
            vision,
            Some(corrector),
            Some(extractor),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Never fails: OCR errors give empty text, extraction errors give no
    /// structured data.
    pub fn process(&self, image: &Path) -> PipelineOutput {
        let mut text = match self.ocr.extract_text(image) {
            Ok(r) => r.text(),
            Err(e) => {
                warn!(pipeline = %self.name, engine = self.ocr.name(), image = %image.display(), error = %e, "OCR failed");
                String::new()
            }
        };
        if let Some(corrector) = &self.corrector {
            text = corrector.correct_text(&text);
        }
        let structured_data = self
            .extractor
            .as_ref()
            .and_then(|x| x.extract_entities(&text))
            .unwrap_or_default();
        debug!(pipeline = %self.name, chars = text.len(), fields = structured_data.len(), "processed");

        PipelineOutput {
            raw_text: text,
            structured_data,
            pipeline_name: self.name.clone(),
        }
    }
}

/// Engines and model passes the four pipelines are assembled from.
#[derive(Clone)]
pub struct PipelineParts {
    pub raw_ocr: Arc<dyn OcrEngine>,
    pub vision_ocr: Arc<dyn OcrEngine>,
    pub corrector: Arc<dyn TextCorrector>,
    pub extractor: Arc<dyn EntityExtractor>,
}

impl PipelineParts {
    pub fn build(&self, kind: PipelineKind) -> Pipeline {
        match kind {
            PipelineKind::RawOcr => Pipeline::raw_ocr(self.raw_ocr.clone()),
            PipelineKind::MultimodalOcr => Pipeline::multimodal_ocr(self.vision_ocr.clone()),
            PipelineKind::RawOcrEntities => {
                Pipeline::raw_ocr_with_entities(self.raw_ocr.clone(), self.extractor.clone())
            }
            PipelineKind::MultimodalOcrEntities => Pipeline::multimodal_ocr_with_entities(
                self.vision_ocr.clone(),
                self.corrector.clone(),
                self.extractor.clone(),
            ),
        }
    }

    pub fn build_all(&self) -> Vec<Pipeline> {
        PipelineKind::ALL.iter().map(|k| self.build(*k)).collect()
    }
}
