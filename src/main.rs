use std::process::ExitCode;

fn main() -> ExitCode {
    match solar_ocr_bench_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
