//! Writes a synthetic AML/Seabird cast pair plus matching job files into the
//! directory given as the first argument (default: current directory).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use ctd_profiler::data::compensation::psu_to_reference_salinity;

const SURFACE_SOAK_S: f64 = 20.0;
const DESCENT_RATE: f64 = 0.8;
const MAX_PRESSURE: f64 = 60.0;
const BOTTOM_PAUSE_S: f64 = 10.0;

/// Deterministic sensor noise from a splitmix64 stream.
struct Noise(u64);

impl Noise {
    /// Uniform in `[0, 1)`.
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Normal deviate (Box-Muller, cosine branch only).
    fn gauss(&mut self, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(f64::MIN_POSITIVE);
        let u2 = self.uniform();
        std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// Pressure at `t` seconds after switch-on: surface soak, descent, pause at
/// the bottom, ascent.
fn pressure_at(t: f64) -> f64 {
    let descent = MAX_PRESSURE / DESCENT_RATE;
    if t < SURFACE_SOAK_S {
        0.3
    } else if t < SURFACE_SOAK_S + descent {
        0.3 + (t - SURFACE_SOAK_S) * DESCENT_RATE
    } else if t < SURFACE_SOAK_S + descent + BOTTOM_PAUSE_S {
        MAX_PRESSURE
    } else {
        (MAX_PRESSURE - (t - SURFACE_SOAK_S - descent - BOTTOM_PAUSE_S) * DESCENT_RATE).max(0.2)
    }
}

fn cast_duration() -> f64 {
    SURFACE_SOAK_S + 2.0 * MAX_PRESSURE / DESCENT_RATE + BOTTOM_PAUSE_S + 5.0
}

/// Fjord-like profile: warm fresh surface layer over cold saline water.
struct Water {
    temp: f64,
    psu: f64,
    oxygen: f64,
    density: f64,
}

fn water_at(p: f64) -> Water {
    let temp = 8.0 + 6.0 * (-p / 15.0).exp();
    let psu = 34.0 - 6.0 * (-p / 10.0).exp();
    let oxygen = 280.0 - 1.2 * p;
    let density = 1000.0 + 0.78 * psu + 0.0045 * p - 0.12 * (temp - 10.0);
    Water {
        temp,
        psu,
        oxygen,
        density,
    }
}

fn write_aml(path: &Path, start: NaiveDateTime, noise: &mut Noise) -> Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "[instrument]")?;
    writeln!(out, "model=Base.X2")?;
    writeln!(out, "serial=25123")?;
    writeln!(out, "[cast]")?;
    writeln!(out, "date={}", start.format("%Y-%m-%d"))?;
    writeln!(out, "time={}.00", start.format("%H:%M:%S"))?;
    writeln!(out, "[data]")?;
    writeln!(
        out,
        "Date (yyyy-mm-dd),Time,Pressure (dBar),Temperature (C),Salinity (PSU),\
Aanderaa 4831,Turbidity (NTU),Density (kg m-3)"
    )?;

    let n = (cast_duration() * 2.0) as usize;
    for i in 0..n {
        let t = i as f64 * 0.5;
        let ts = start + Duration::milliseconds((t * 1000.0) as i64);
        let p = (pressure_at(t) + noise.gauss(0.02)).max(0.0);
        let w = water_at(p);
        writeln!(
            out,
            "{},{:02}:{:02}.{},{:.2},{:.3},{:.3},{:.2},{:.2},{:.3}",
            ts.format("%Y-%m-%d"),
            ts.minute(),
            ts.second(),
            ts.nanosecond() / 100_000_000,
            p,
            w.temp + noise.gauss(0.005),
            w.psu + noise.gauss(0.01),
            // The optode reports fresh-water oxygen; undo roughly the salinity effect.
            w.oxygen * (1.0 + 0.004 * w.psu) + noise.gauss(0.5),
            (0.4 + noise.gauss(0.05)).abs(),
            w.density,
        )?;
    }
    out.flush()?;
    Ok(n)
}

fn write_seabird(path: &Path, noise: &mut Noise) -> Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "* Sea-Bird SBE19plus Data File:")?;
    writeln!(out, "* FileName = synthetic.hex")?;
    for (i, name) in [
        "prdM: Pressure, Strain Gauge [db]",
        "t090C: Temperature [ITS-90, deg C]",
        "c0S/m: Conductivity [S/m]",
        "sbeox0Mm/L: Oxygen, SBE 43 [umol/l]",
        "depSM: Depth [salt water, m]",
        "sigma-t00: Density [sigma-t, kg/m^3 ]",
        "flag: 0.000e+00",
        "gsw_saA0: Absolute Salinity [g/kg]",
        "gsw_densityA0: Density, TEOS-10 [kg/m^3]",
    ]
    .iter()
    .enumerate()
    {
        writeln!(out, "# name {i} = {name}")?;
    }
    writeln!(out, "*END*")?;

    let n = (cast_duration() * 4.0) as usize;
    for i in 0..n {
        let t = i as f64 * 0.25;
        let p = (pressure_at(t) + noise.gauss(0.01)).max(0.0);
        let w = water_at(p);
        let cond = 0.09 * w.psu + 0.08 * w.temp;
        writeln!(
            out,
            "{:11.3} {:10.4} {:10.6} {:9.3} {:9.3} {:9.4} {:3.0} {:9.4} {:10.4}",
            p,
            w.temp + noise.gauss(0.002),
            cond,
            w.oxygen + noise.gauss(0.3),
            p * 0.993,
            w.density - 1000.0,
            0.0,
            psu_to_reference_salinity(w.psu),
            w.density,
        )?;
    }
    out.flush()?;
    Ok(n)
}

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut noise = Noise(42);
    let start = NaiveDate::from_ymd_opt(2023, 1, 14)
        .and_then(|d| d.and_hms_opt(16, 58, 30))
        .context("building start time")?;

    let aml_path = dir.join("sample_cast.csv");
    let sb_path = dir.join("sample_cast.cnv");
    let n_aml = write_aml(&aml_path, start, &mut noise)?;
    let n_sb = write_seabird(&sb_path, &mut noise)?;

    let hms = |t: NaiveDateTime| t.format("%H:%M:%S").to_string();
    let turn = SURFACE_SOAK_S + MAX_PRESSURE / DESCENT_RATE;
    let descent_start = start + Duration::seconds(SURFACE_SOAK_S as i64);
    let down_end = start + Duration::seconds(turn as i64);
    let up_start = down_end + Duration::seconds(BOTTOM_PAUSE_S as i64);
    let end = start + Duration::seconds(cast_duration() as i64);

    let isolate = serde_json::json!({
        "input": "sample_cast.csv",
        "down": { "start": hms(descent_start), "end": hms(down_end) },
        "up": { "start": hms(up_start), "end": hms(end) },
        "output_dir": "isolated",
    });
    let compare = serde_json::json!({
        "seabird": {
            "path": "sample_cast.cnv",
            // Leg indices count kept rows, so keep every row.
            "options": { "pressure_threshold": 0.0 },
            "legs": {
                "down_end": (turn * 4.0) as usize,
                "up_start": ((turn + BOTTOM_PAUSE_S) * 4.0) as usize,
            },
        },
        "aml": {
            "path": "sample_cast.csv",
            "options": {
                "pressure_threshold": 1.0,
                "reference_salinity": true,
                "compensate_oxygen": true,
            },
            "legs": { "down_end": hms(down_end), "up_start": hms(up_start) },
        },
        "output": "comparison_down.csv",
    });
    std::fs::write(dir.join("isolate.json"), serde_json::to_string_pretty(&isolate)?)?;
    std::fs::write(dir.join("compare.json"), serde_json::to_string_pretty(&compare)?)?;

    println!(
        "Wrote {n_aml} AML samples to {} and {n_sb} Seabird samples to {}",
        aml_path.display(),
        sb_path.display()
    );
    Ok(())
}
