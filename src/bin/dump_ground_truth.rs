//! Print reconstructed ground truth for documents of a receipt dataset.
//!
//! Usage: dump_ground_truth <dataset_dir> [document_id ...]
//! With no ids, every image under `<dataset_dir>/img` is dumped.

use solar_ocr_bench_lib::evaluator::{document_id, GroundTruthStore};
use solar_ocr_bench_lib::init_tracing;
use solar_ocr_bench_lib::services::list_images;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    init_tracing("warn");
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(dataset) = args.first().map(PathBuf::from) else {
        eprintln!("usage: dump_ground_truth <dataset_dir> [document_id ...]");
        return ExitCode::FAILURE;
    };

    let ids: Vec<String> = if args.len() > 1 {
        args[1..].to_vec()
    } else {
        match list_images(&dataset) {
            Ok(images) => images
                .iter()
                .map(|p| document_id(&p.to_string_lossy()))
                .collect(),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    let store = GroundTruthStore::new(&dataset);
    for id in ids {
        let gt = store.load_ground_truth(&id);
        println!("=== {} ===", id);
        if gt.is_empty() {
            println!("(no ground truth)\n");
            continue;
        }
        println!("{}", gt.ocr_text);
        match &gt.entities {
            Some(entities) => {
                for (k, v) in entities {
                    println!("  {}: {}", k, v);
                }
            }
            None => println!("  (no entity labels)"),
        }
        println!();
    }
    ExitCode::SUCCESS
}
