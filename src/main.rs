use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ctd_profiler::config::{CompareJob, IsolateJob};
use ctd_profiler::data::loader::{load_file, DEFAULT_PRESSURE_THRESHOLD};
use ctd_profiler::data::reference::{read_reference, ReferenceVariable};
use ctd_profiler::pipeline::{run_compare, run_isolate, CastSummary};

#[derive(Parser, Debug)]
#[command(author, version, about = "CTD cast processing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a cast file and print its sample count and column ranges
    Summary {
        /// AML `.csv` or Seabird `.cnv`/`.asc`/`.txt` file
        file: PathBuf,
        /// Skip samples shallower than this (dBar)
        #[arg(long, default_value_t = DEFAULT_PRESSURE_THRESHOLD)]
        threshold: f64,
    },
    /// Split an AML cast into down/up files using clock windows from a job file
    Isolate {
        /// JSON job file
        job: PathBuf,
    },
    /// Bin a Seabird and an AML cast onto common pressure bins
    Compare {
        /// JSON job file
        job: PathBuf,
    },
    /// Print the min/mean/max envelope of a reference profile as CSV
    Reference {
        /// CSV with depth,temp,temp_range,sal,sal_range,o2,o2_range
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Summary { file, threshold } => {
            let cast = load_file(&file, threshold)
                .with_context(|| format!("loading {}", file.display()))?;
            print!("{}", CastSummary { cast: &cast });
        }
        Command::Isolate { job } => {
            let job = IsolateJob::from_path(&job)?;
            let out = run_isolate(&job)?;
            info!(
                "down: {} samples -> {}, up: {} samples -> {}",
                out.down_samples,
                out.down.display(),
                out.up_samples,
                out.up.display()
            );
        }
        Command::Compare { job } => {
            let job = CompareJob::from_path(&job)?;
            let out = run_compare(&job)?;
            info!("comparison written to {}", out.display());
        }
        Command::Reference { file } => {
            let profile =
                read_reference(&file).with_context(|| format!("loading {}", file.display()))?;
            let mut writer = csv::Writer::from_writer(io::stdout());
            writer.write_record(["variable", "depth", "low", "mean", "high"])?;
            for var in ReferenceVariable::ALL {
                for p in profile.envelope(var) {
                    writer.serialize((var.label(), p.depth, p.low, p.mean, p.high))?;
                }
            }
            writer.flush()?;
        }
    }
    Ok(())
}
