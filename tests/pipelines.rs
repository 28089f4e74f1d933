mod common;

use common::ScriptedChat;
use solar_ocr_bench_lib::db::RunStore;
use solar_ocr_bench_lib::error::OcrError;
use solar_ocr_bench_lib::evaluator::{document_id, GroundTruthStore};
use solar_ocr_bench_lib::llm::ChatMessage;
use solar_ocr_bench_lib::ocr::OcrEngine;
use solar_ocr_bench_lib::services::{
    list_images, Benchmark, EntityExtractor, Pipeline, PipelineKind, PipelineParts, Rectifier,
};
use solar_ocr_bench_lib::types::{EntityMap, OcrResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Returns canned text per document id; unknown documents fail.
struct CannedOcr {
    texts: HashMap<String, String>,
}

impl CannedOcr {
    fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            texts: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        })
    }
}

impl OcrEngine for CannedOcr {
    fn name(&self) -> &str {
        "canned"
    }

    fn extract_text(&self, image: &Path) -> Result<OcrResult, OcrError> {
        self.texts
            .get(&document_id(&image.to_string_lossy()))
            .map(|t| OcrResult::from_text(t))
            .ok_or_else(|| OcrError::Engine("engine crashed".to_string()))
    }
}

struct FixedExtractor(EntityMap);

impl EntityExtractor for FixedExtractor {
    fn extract_entities(&self, _text: &str) -> Option<EntityMap> {
        Some(self.0.clone())
    }
}

fn entities(pairs: &[(&str, &str)]) -> EntityMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// a: transcript and labels, b: transcript only, c: nothing.
fn write_dataset(root: &Path) {
    for d in ["img", "box", "entities"] {
        fs::create_dir_all(root.join(d)).unwrap();
    }
    for id in ["a", "b", "c"] {
        fs::write(root.join("img").join(format!("{}.jpg", id)), b"").unwrap();
    }
    fs::write(root.join("img/readme.txt"), "not an image").unwrap();
    fs::write(
        root.join("box/a.txt"),
        "1,1,9,1,9,5,1,5,ACME STORE\n1,6,9,6,9,9,1,9,TOTAL 10.00\n",
    )
    .unwrap();
    fs::write(
        root.join("entities/a.txt"),
        r#"{"company": "ACME STORE", "date": "25/12/2018", "address": "1 MAIN ST", "total": "10.00"}"#,
    )
    .unwrap();
    fs::write(root.join("box/b.txt"), "0,0,0,0,0,0,0,0,hello there world\n").unwrap();
}

fn extracted() -> EntityMap {
    entities(&[
        ("company", "acme store"),
        ("date", "2018-12-25"),
        ("address", "1 main street"),
        ("total", "RM 10.00"),
    ])
}

#[test]
fn ocr_failure_yields_empty_text_and_no_entities() {
    let pipeline = Pipeline::raw_ocr_with_entities(
        CannedOcr::new(&[]),
        Arc::new(FixedExtractor(EntityMap::new())),
    );
    let out = pipeline.process(Path::new("missing.jpg"));
    assert_eq!(out.raw_text, "");
    assert!(out.structured_data.is_empty());
    assert_eq!(out.pipeline_name, "Raw OCR + Entity Analysis");
}

#[test]
fn multimodal_pipeline_corrects_then_extracts_with_one_model() {
    let chat = Arc::new(ScriptedChat::new(vec![
        Ok(ChatMessage::assistant("  ACME STORE\nTOTAL 10.00  ")),
        Ok(ChatMessage::assistant(
            "```json\n{\"company\": \"ACME STORE\", \"total\": 10.0, \"date\": null}\n```",
        )),
    ]));
    let rectifier = Arc::new(Rectifier::new(chat.clone()));
    let pipeline = Pipeline::multimodal_ocr_with_entities(
        CannedOcr::new(&[("a", "ACME ST0RE\nT0TAL 10.00")]),
        rectifier.clone(),
        rectifier,
    );

    let out = pipeline.process(Path::new("img/a.jpg"));
    assert_eq!(out.raw_text, "ACME STORE\nTOTAL 10.00");
    assert_eq!(out.structured_data, entities(&[("company", "ACME STORE"), ("total", "10.0")]));
    assert_eq!(out.pipeline_name, "Improved OCR (Multimodal) + Entity Analysis");

    let seen = chat.seen.lock().unwrap();
    assert!(seen[0][0].content.ends_with("ACME ST0RE\nT0TAL 10.00"));
    assert!(seen[1][0].content.ends_with("ACME STORE\nTOTAL 10.00"));
}

#[test]
fn parts_build_every_pipeline_in_order() {
    let parts = PipelineParts {
        raw_ocr: CannedOcr::new(&[]),
        vision_ocr: CannedOcr::new(&[]),
        corrector: Arc::new(Rectifier::new(Arc::new(ScriptedChat::new(vec![])))),
        extractor: Arc::new(FixedExtractor(EntityMap::new())),
    };
    let names: Vec<String> = parts.build_all().iter().map(|p| p.name().to_string()).collect();
    let expected: Vec<String> = PipelineKind::ALL.iter().map(|k| k.to_string()).collect();
    assert_eq!(names, expected);
}

#[test]
fn benchmark_scores_and_records_each_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let images = list_images(dir.path()).unwrap();
    assert_eq!(images.len(), 3);

    let engine = CannedOcr::new(&[
        ("a", "ACME STORE\nTOTAL 10.00"),
        ("b", "hello world"),
        ("c", "anything"),
    ]);
    let pipelines = vec![
        Pipeline::raw_ocr(engine.clone()),
        Pipeline::raw_ocr_with_entities(engine, Arc::new(FixedExtractor(extracted()))),
    ];

    let ground_truth = GroundTruthStore::new(dir.path());
    let store = RunStore::open(&dir.path().join("runs.db")).unwrap();
    let summaries = Benchmark::new(&ground_truth, "fixture")
        .with_store(&store)
        .run(&pipelines, &images, None)
        .unwrap();

    assert_eq!(summaries.len(), 2);
    let raw = &summaries[0];
    assert_eq!(raw.pipeline, "Raw OCR");
    assert_eq!(raw.documents, 3);
    // a is exact, b drops one of three words
    assert!((raw.avg_wer.unwrap() - 1.0 / 6.0).abs() < 1e-9);
    assert!(raw.avg_cer.unwrap() > 0.0);
    assert_eq!(raw.avg_entity_accuracy, None);

    let with_entities = &summaries[1];
    // address differs, company/date/total normalise to the same value
    assert_eq!(with_entities.avg_entity_accuracy, Some(0.75));

    let runs = store.list_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].pipeline_name, "Raw OCR + Entity Analysis");
    assert_eq!(runs[1].dataset, "fixture");
    assert_eq!(Some(runs[1].id), raw.run_id);

    let docs = store.run_documents(with_entities.run_id.unwrap()).unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.document.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    let a_fields = &docs[0].metrics.as_ref().unwrap().fields;
    assert_eq!(a_fields.iter().filter(|f| f.matched).count(), 3);
    assert_eq!(docs[0].entities, extracted());
    assert!(docs[2].metrics.is_none());
    assert_eq!(docs[2].error.as_deref(), Some("No ground truth found"));
    assert!(docs.iter().all(|d| d.duration_ms.is_some()));
}

#[test]
fn benchmark_limit_takes_leading_images() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let images = list_images(dir.path()).unwrap();
    let ground_truth = GroundTruthStore::new(dir.path());
    let pipelines = vec![Pipeline::raw_ocr(CannedOcr::new(&[("a", "ACME STORE TOTAL 10.00")]))];

    let summaries = Benchmark::new(&ground_truth, "fixture")
        .run(&pipelines, &images, Some(1))
        .unwrap();
    assert_eq!(summaries[0].documents, 1);
    assert_eq!(summaries[0].avg_cer, Some(0.0));
    assert_eq!(summaries[0].run_id, None);
}

#[test]
fn zero_sample_limit_runs_every_image() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let images = list_images(dir.path()).unwrap();
    let ground_truth = GroundTruthStore::new(dir.path());
    let pipelines = vec![Pipeline::raw_ocr(CannedOcr::new(&[("a", "ACME STORE TOTAL 10.00")]))];

    let summaries = Benchmark::new(&ground_truth, "fixture")
        .run(&pipelines, &images, Some(0))
        .unwrap();
    assert_eq!(summaries[0].documents, 3);
}
