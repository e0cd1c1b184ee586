mod driver;
mod figures;
mod scenario;

use clap::Parser;
use figures::StageContext;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Turns a directory of benchmark-run log files into the flat chart-data
/// tables the figure scripts consume.
#[derive(Parser, Debug)]
#[command(name = "etl")]
struct Args {
    /// Name of the tagged log folder under the output parent
    #[arg(short = 't', long, default_value = "")]
    output_folder_tag: String,

    /// Figure folder receiving chart-data files; its name selects the stage
    #[arg(short = 'd', long)]
    target_folder: PathBuf,

    /// Run-description file expected in the target folder
    #[arg(short = 'f', long)]
    description_filename: Option<String>,

    /// Parent directory holding tagged log folders
    #[arg(long, default_value = "output")]
    output_parent: PathBuf,

    /// Human-readable checkpoints and chattier logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageKind {
    E2ePerf,
    Nwrites,
    SensitivityDram,
    SensitivityWriteLog,
    Nthreads,
    Generic,
}

impl StageKind {
    /// The target folder's name picks the figure stage to run.
    fn from_target(target: &Path) -> Self {
        let name = target.to_string_lossy();
        if name.contains("e2e_perf") {
            StageKind::E2ePerf
        } else if name.contains("nwrites") {
            StageKind::Nwrites
        } else if name.contains("sensitivity_dram") {
            StageKind::SensitivityDram
        } else if name.contains("sensitivity_write_log") {
            StageKind::SensitivityWriteLog
        } else if name.contains("nthreads") {
            StageKind::Nthreads
        } else {
            StageKind::Generic
        }
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::FAILURE,
            };
        }
    };

    let default_filter = if args.verbose {
        "etl=debug,parser=debug"
    } else {
        "etl=info,parser=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tag_pattern = Regex::new(r"^[0-9a-zA-Z\-]*$").unwrap();
    if !tag_pattern.is_match(&args.output_folder_tag) {
        error!(tag = %args.output_folder_tag, "output folder tag must match ^[0-9a-zA-Z-]*$");
        return ExitCode::FAILURE;
    }

    let output_dir = args.output_parent.join(&args.output_folder_tag);
    if !output_dir.is_dir() {
        error!(dir = %output_dir.display(), "output folder not found");
        return ExitCode::FAILURE;
    }
    if !args.target_folder.is_dir() {
        error!(dir = %args.target_folder.display(), "target folder not found");
        return ExitCode::FAILURE;
    }
    if let Some(desc) = &args.description_filename {
        if !args.target_folder.join(desc).is_file() {
            warn!(file = %desc, "description file not found in target folder");
        }
    }

    let stage = StageKind::from_target(&args.target_folder);
    info!(?stage, output = %output_dir.display(), target = %args.target_folder.display(), "starting");

    let ctx = StageContext {
        output_dir: &output_dir,
        target_dir: &args.target_folder,
        checkpoint_dir: Path::new("."),
        indent: if args.verbose { 2 } else { 0 },
    };
    let result = match stage {
        StageKind::E2ePerf => figures::stage_e2e_perf(&ctx),
        StageKind::Nwrites => figures::stage_nwrites(&ctx),
        StageKind::SensitivityDram => figures::stage_sensitivity_dram(&ctx),
        StageKind::SensitivityWriteLog => figures::stage_sensitivity_write_log(&ctx),
        StageKind::Nthreads => figures::stage_nthreads(&ctx),
        StageKind::Generic => figures::stage_generic(&ctx),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "stage failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_selection_by_target_name() {
        assert_eq!(
            StageKind::from_target(Path::new("figures/e2e_perf")),
            StageKind::E2ePerf
        );
        assert_eq!(
            StageKind::from_target(Path::new("figures/sensitivity_dram_2")),
            StageKind::SensitivityDram
        );
        assert_eq!(
            StageKind::from_target(Path::new("figures/latency_cdf")),
            StageKind::Generic
        );
    }
}
