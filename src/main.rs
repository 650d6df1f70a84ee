// src/main.rs

use std::process::ExitCode;

use sitepipe::errors::SitepipeError;
use sitepipe::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("sitepipe error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

/// Failed builds list one line per task; anything else prints its chain.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<SitepipeError>() {
        Some(SitepipeError::BuildFailed { failures }) => {
            eprintln!("sitepipe: build failed ({} task(s))", failures.len());
            for failure in failures {
                eprintln!("  {failure}");
            }
        }
        _ => eprintln!("sitepipe error: {err:#}"),
    }
}
