use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use sql_spy::report::{DEFAULT_THRESHOLD_MSEC, DEFAULT_TOP, ProfileReport, ReportOptions};
use sql_spy::types::TimingUnit;

#[derive(Parser, Debug)]
#[command(author, version, about = "Profile a sql-spy timing log")]
struct Args {
    /// Timing log with entries separated by blank lines
    log_file: PathBuf,
    /// Flag statements slower than this many milliseconds
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_MSEC)]
    threshold: u64,
    /// Number of flagged statements to list
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,
    #[arg(long, value_enum, default_value = "msec")]
    unit: TimingUnit,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let options = ReportOptions {
        threshold_msec: args.threshold,
        top: args.top,
        unit: args.unit,
    };
    let report = match ProfileReport::from_path(&args.log_file, options) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!("{}: {err}", args.log_file.display());
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::error!("{err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{report}");
    }
    ExitCode::SUCCESS
}
