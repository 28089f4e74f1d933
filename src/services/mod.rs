pub mod benchmark;
pub mod pipeline;
pub mod rectifier;

pub use benchmark::{list_images, pick_random, summarize, Benchmark, DocumentOutcome, PipelineSummary};
pub use pipeline::{Pipeline, PipelineKind, PipelineParts};
pub use rectifier::{EntityExtractor, Rectifier, TextCorrector};
