//! formmat command-line interface.
//!
//! ```sh
//! formmat-cli assemble job.json
//! formmat-cli validate job.json
//! ```

mod config;
mod runner;

use std::process::ExitCode;

fn usage() {
    eprintln!("usage: formmat-cli <assemble|validate> <config.json>");
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 || !matches!(args[1].as_str(), "assemble" | "validate") {
        usage();
        return ExitCode::from(2);
    }

    let job = match config::load_config(&args[2]) {
        Ok(job) => job,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::from(1);
        }
    };

    match args[1].as_str() {
        "assemble" => {
            let report = match runner::run(&job) {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("assembly error: {err}");
                    return ExitCode::from(1);
                }
            };
            match serde_json::to_string_pretty(&report) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("report error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        "validate" => match runner::validate(&job) {
            Ok((rows, cols)) => {
                println!("configuration is valid: {} ({}x{} operator)", args[2], rows, cols);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("invalid configuration: {err}");
                ExitCode::from(1)
            }
        },
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}
