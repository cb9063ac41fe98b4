//! End-to-end runs of the job files in [`crate::config`].

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use crate::config::{CompareJob, IsolateJob, LegChoice};
use crate::data::binning::PressureBins;
use crate::data::loader::{read_aml_csv, read_seabird};
use crate::data::model::{Cast, CastLegs, Variable};
use crate::data::separate::{isolate_windows, separate_by_clock, separate_by_index};
use crate::export::{
    format_datetime, write_binned_csv, write_cast_csv, write_cast_parquet, BinnedSeries,
};

/// Files written by [`run_isolate`].
#[derive(Debug, Clone)]
pub struct IsolateOutput {
    pub down: PathBuf,
    pub up: PathBuf,
    pub down_samples: usize,
    pub up_samples: usize,
}

/// Read the AML cast, keep the samples inside the down and up windows and
/// write one file per leg.
pub fn run_isolate(job: &IsolateJob) -> Result<IsolateOutput> {
    let cast = read_aml_csv(&job.input, &job.aml)
        .with_context(|| format!("reading AML cast {}", job.input.display()))?;
    let legs = isolate_windows(&cast, job.down, job.up)?;

    std::fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("creating {}", job.output_dir.display()))?;

    let down = job.output_path("down", "csv");
    let up = job.output_path("up", "csv");
    write_cast_csv(&down, &legs.down).with_context(|| format!("writing {}", down.display()))?;
    write_cast_csv(&up, &legs.up).with_context(|| format!("writing {}", up.display()))?;

    if job.parquet {
        for (name, leg) in [("down", &legs.down), ("up", &legs.up)] {
            let path = job.output_path(name, "parquet");
            write_cast_parquet(&path, leg)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    Ok(IsolateOutput {
        down,
        up,
        down_samples: legs.down.len(),
        up_samples: legs.up.len(),
    })
}

fn pick(legs: CastLegs, choice: LegChoice) -> Cast {
    match choice {
        LegChoice::Down => legs.down,
        LegChoice::Up => legs.up,
    }
}

/// Separate both casts, bin the chosen leg of each onto common pressure
/// bins and write a single comparison table.
pub fn run_compare(job: &CompareJob) -> Result<PathBuf> {
    let seabird = read_seabird(&job.seabird.path, &job.seabird.options)
        .with_context(|| format!("reading Seabird cast {}", job.seabird.path.display()))?;
    let aml = read_aml_csv(&job.aml.path, &job.aml.options)
        .with_context(|| format!("reading AML cast {}", job.aml.path.display()))?;

    let sb_leg = pick(separate_by_index(&seabird, job.seabird.legs)?, job.leg);
    let aml_leg = pick(separate_by_clock(&aml, job.aml.legs)?, job.leg);

    let all_pressure: Vec<f64> = sb_leg
        .pressure
        .iter()
        .chain(&aml_leg.pressure)
        .copied()
        .collect();
    let bins = PressureBins::spanning(&all_pressure, job.bin_width)
        .context("no samples left in the selected legs")?;

    let mut series = Vec::new();
    for (prefix, cast) in [("Seabird", &sb_leg), ("AML", &aml_leg)] {
        if cast.is_empty() {
            continue;
        }
        for var in cast.variables() {
            if var == Variable::Pressure {
                continue;
            }
            if let Some(col) = cast.column(var) {
                let means = bins.mean(&cast.pressure, col)?;
                series.push(BinnedSeries::new(format!("{prefix} {var}"), means));
            }
        }
    }

    if let Some(parent) = job.output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    write_binned_csv(&job.output, &bins.edges, &series)
        .with_context(|| format!("writing {}", job.output.display()))?;
    info!(
        "Compared {} Seabird and {} AML samples over {} bins",
        sb_leg.len(),
        aml_leg.len(),
        bins.len()
    );
    Ok(job.output.clone())
}

/// Human-readable overview of a cast.
#[derive(Debug, Clone)]
pub struct CastSummary<'a> {
    pub cast: &'a Cast,
}

impl fmt::Display for CastSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cast = self.cast;
        if let Some(src) = &cast.source {
            writeln!(f, "{} cast {}", cast.instrument, src.display())?;
        } else {
            writeln!(f, "{} cast", cast.instrument)?;
        }
        writeln!(f, "  samples: {}", cast.len())?;
        if let Some((start, end)) = cast.time_span() {
            writeln!(
                f,
                "  time:    {} .. {}",
                format_datetime(&start),
                format_datetime(&end)
            )?;
        }
        for (key, value) in &cast.metadata {
            writeln!(f, "  {key} = {value}")?;
        }
        for var in cast.variables() {
            if let Some((lo, hi)) = cast.range(var) {
                let unit = match var {
                    Variable::Pressure => "dBar",
                    Variable::Temperature => "°C",
                    Variable::Salinity => cast.salinity_scale.unit(),
                    _ => "",
                };
                let line = format!("  {:<16} {lo:>10.3} .. {hi:>10.3} {unit}", var.label());
                writeln!(f, "{}", line.trim_end())?;
            }
        }
        Ok(())
    }
}
