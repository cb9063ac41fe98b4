use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use csv::StringRecord;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::compensation::{compensate_oxygen, psu_to_reference_salinity};
use super::model::{Cast, Instrument, MetadataValue, SalinityScale};
use crate::error::{CtdError, Result};

/// Samples shallower than this are skipped unless configured otherwise.
pub const DEFAULT_PRESSURE_THRESHOLD: f64 = 0.5;

/// A reconstructed timestamp more than this far behind its predecessor is
/// taken as a wrap into the next clock hour.
const ROLLOVER_TOLERANCE_MINUTES: i64 = 30;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a cast with default options. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`                 – AML export (`key=value` header, `[data]` block)
/// * `.cnv` / `.asc` / `.txt` – Seabird whitespace-delimited export
pub fn load_file(path: &Path, pressure_threshold: f64) -> Result<Cast> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => read_aml_csv(
            path,
            &AmlOptions {
                pressure_threshold,
                ..AmlOptions::default()
            },
        ),
        "cnv" | "asc" | "txt" => read_seabird(
            path,
            &SeabirdOptions {
                pressure_threshold,
                ..SeabirdOptions::default()
            },
        ),
        other => Err(CtdError::UnsupportedFormat(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// AML CSV loader
// ---------------------------------------------------------------------------

/// Header texts used to locate AML columns. Matching is exact (after
/// trimming surrounding whitespace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmlColumns {
    pub time: String,
    pub pressure: String,
    pub temperature: String,
    pub salinity: String,
    pub oxygen: String,
    /// Optional; the cast has no turbidity column if the header lacks it.
    pub turbidity: String,
    /// Optional.
    pub density: String,
}

impl Default for AmlColumns {
    fn default() -> Self {
        AmlColumns {
            time: "Time".to_string(),
            pressure: "Pressure (dBar)".to_string(),
            temperature: "Temperature (C)".to_string(),
            salinity: "Salinity (PSU)".to_string(),
            oxygen: "Aanderaa 4831".to_string(),
            turbidity: "Turbidity (NTU)".to_string(),
            density: "Density (kg m-3)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmlOptions {
    /// dBar; rows with a lower pressure are skipped.
    pub pressure_threshold: f64,
    pub columns: AmlColumns,
    /// Convert PSU to reference salinity (g/kg).
    pub reference_salinity: bool,
    /// Fill `corrected_oxygen` from the optode compensation.
    pub compensate_oxygen: bool,
}

impl Default for AmlOptions {
    fn default() -> Self {
        AmlOptions {
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            columns: AmlColumns::default(),
            reference_salinity: false,
            compensate_oxygen: false,
        }
    }
}

/// Column positions resolved from the header row.
struct AmlIndices {
    time: usize,
    pressure: usize,
    temperature: usize,
    salinity: usize,
    oxygen: usize,
    turbidity: Option<usize>,
    density: Option<usize>,
}

impl AmlIndices {
    fn locate(header: &StringRecord, columns: &AmlColumns) -> Result<Self> {
        let find = |name: &str| header.iter().position(|h| h == name);
        let require =
            |name: &str| find(name).ok_or_else(|| CtdError::MissingColumn(name.to_string()));

        Ok(AmlIndices {
            time: require(&columns.time)?,
            pressure: require(&columns.pressure)?,
            temperature: require(&columns.temperature)?,
            salinity: require(&columns.salinity)?,
            oxygen: require(&columns.oxygen)?,
            turbidity: find(&columns.turbidity),
            density: find(&columns.density),
        })
    }
}

enum Section {
    Metadata,
    Header,
    Data(AmlIndices, SampleClock),
}

/// Read an AML CSV export.
///
/// ```text
/// [cast]
/// date=2023-01-14
/// time=16:10:02.40
/// [data]
/// Date (yyyy-mm-dd),Time,Pressure (dBar),Temperature (C),Salinity (PSU),...
/// 2023-01-14,10:02.5,0.21,12.31,30.12,...
/// ```
///
/// Sample times carry only minute and second; the hour comes from the cast
/// start and advances when the minute wraps (see [`SampleClock`]).
pub fn read_aml_csv(path: &Path, opts: &AmlOptions) -> Result<Cast> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut metadata: BTreeMap<String, String> = BTreeMap::new();
    let mut section = Section::Metadata;

    let mut timestamps = Vec::new();
    let mut pressure = Vec::new();
    let mut temperature = Vec::new();
    let mut salinity = Vec::new();
    let mut oxygen = Vec::new();
    let mut turbidity = Vec::new();
    let mut density = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let first = record.get(0).unwrap_or("");

        let next = match &mut section {
            Section::Metadata => {
                if first == "[data]" {
                    Some(Section::Header)
                } else {
                    if let Some((key, value)) = first.split_once('=') {
                        metadata.insert(key.trim().to_string(), value.trim().to_string());
                    }
                    None
                }
            }
            Section::Header => {
                let indices = AmlIndices::locate(&record, &opts.columns)?;
                let start = cast_start(&metadata)?;
                debug!("AML cast start {start}, header at line {line}");
                Some(Section::Data(indices, SampleClock::new(start)))
            }
            Section::Data(idx, clock) => {
                let raw_time = field(&record, idx.time, &opts.columns.time, line)?;
                let ts = clock.timestamp(raw_time, line)?;

                let p = parse_f64(&record, idx.pressure, &opts.columns.pressure, line)?;
                if p < opts.pressure_threshold {
                    skipped += 1;
                    continue;
                }

                timestamps.push(ts);
                pressure.push(p);
                temperature.push(parse_f64(
                    &record,
                    idx.temperature,
                    &opts.columns.temperature,
                    line,
                )?);
                salinity.push(parse_f64(&record, idx.salinity, &opts.columns.salinity, line)?);
                oxygen.push(parse_f64(&record, idx.oxygen, &opts.columns.oxygen, line)?);
                if let Some(i) = idx.turbidity {
                    turbidity.push(parse_f64(&record, i, &opts.columns.turbidity, line)?);
                }
                if let Some(i) = idx.density {
                    density.push(parse_f64(&record, i, &opts.columns.density, line)?);
                }
                None
            }
        };
        if let Some(next) = next {
            section = next;
        }
    }

    let (has_turbidity, has_density) = match &section {
        Section::Data(idx, _) => (idx.turbidity.is_some(), idx.density.is_some()),
        Section::Header => {
            return Err(CtdError::EmptyInput(
                "no header row after [data]".to_string(),
            ))
        }
        Section::Metadata => return Err(CtdError::MissingMetadata("[data]".to_string())),
    };

    let mut salinity_scale = SalinityScale::Practical;
    if opts.reference_salinity {
        salinity.iter_mut().for_each(|s| *s = psu_to_reference_salinity(*s));
        salinity_scale = SalinityScale::Reference;
    }

    let corrected_oxygen = opts.compensate_oxygen.then(|| {
        (0..pressure.len())
            .map(|i| compensate_oxygen(oxygen[i], temperature[i], pressure[i], salinity[i], 0.0))
            .collect()
    });

    info!(
        "Loaded AML cast {}: {} samples ({} shallower than {} dBar skipped)",
        path.display(),
        pressure.len(),
        skipped,
        opts.pressure_threshold
    );
    if pressure.is_empty() {
        warn!("AML cast {} has no samples past the pressure threshold", path.display());
    }

    let cast = Cast {
        source: Some(path.to_path_buf()),
        instrument: Instrument::Aml,
        salinity_scale,
        metadata: metadata
            .iter()
            .map(|(k, v)| (k.clone(), MetadataValue::guess(v)))
            .collect(),
        timestamps: Some(timestamps),
        pressure,
        temperature,
        salinity,
        oxygen,
        corrected_oxygen,
        conductivity: None,
        turbidity: has_turbidity.then_some(turbidity),
        density: has_density.then_some(density),
    };
    cast.validate()?;
    Ok(cast)
}

/// Cast start from the `date` and `time` header keys. Fractional seconds
/// are dropped.
fn cast_start(metadata: &BTreeMap<String, String>) -> Result<NaiveDateTime> {
    let date_str = metadata
        .get("date")
        .ok_or_else(|| CtdError::MissingMetadata("date".to_string()))?;
    let time_str = metadata
        .get("time")
        .ok_or_else(|| CtdError::MissingMetadata("time".to_string()))?;

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| CtdError::InvalidTimestamp(format!("date '{date_str}': {e}")))?;
    let hms = time_str.split('.').next().unwrap_or(time_str);
    let time = NaiveTime::parse_from_str(hms, "%H:%M:%S")
        .map_err(|e| CtdError::InvalidTimestamp(format!("time '{time_str}': {e}")))?;

    Ok(NaiveDateTime::new(date, time))
}

/// Fields of a sample `Time` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SampleTime {
    hour: Option<u32>,
    minute: u32,
    second: u32,
    nanos: u32,
}

/// Parse `MM:SS[.f]` or `HH:MM:SS[.f]`. The fraction is a decimal fraction
/// of a second, so `3` is 0.3 s.
fn parse_sample_time(s: &str) -> Option<SampleTime> {
    let parts: Vec<&str> = s.split(':').collect();
    let (hour, minute, sec_part) = match parts.as_slice() {
        [m, s] => (None, *m, *s),
        [h, m, s] => (Some(h.parse::<u32>().ok()?), *m, *s),
        _ => return None,
    };
    let minute: u32 = minute.parse().ok()?;
    let (sec, frac) = match sec_part.split_once('.') {
        Some((sec, frac)) => (sec, frac),
        None => (sec_part, ""),
    };
    let second: u32 = sec.parse().ok()?;
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits: String = frac.chars().take(9).collect();
    let nanos: u32 = if digits.is_empty() {
        0
    } else {
        format!("{digits:0<9}").parse().ok()?
    };

    if hour.is_some_and(|h| h > 23) || minute > 59 || second > 59 {
        return None;
    }
    Some(SampleTime {
        hour,
        minute,
        second,
        nanos,
    })
}

/// Rebuilds full timestamps from minute/second sample times.
///
/// The hour starts at the cast start's hour. Whenever a reconstructed time
/// falls more than half an hour behind the previous sample (or the cast
/// start, for the first sample) the minute counter has wrapped and the hour
/// advances by one.
#[derive(Debug, Clone)]
pub struct SampleClock {
    hour_base: NaiveDateTime,
    start: NaiveDateTime,
    previous: Option<NaiveDateTime>,
}

impl SampleClock {
    pub fn new(start: NaiveDateTime) -> Self {
        let hour_base = start
            .date()
            .and_hms_opt(start.hour(), 0, 0)
            .unwrap_or(start);
        SampleClock {
            hour_base,
            start,
            previous: None,
        }
    }

    fn timestamp(&mut self, raw: &str, line: usize) -> Result<NaiveDateTime> {
        let st = parse_sample_time(raw).ok_or_else(|| {
            CtdError::parse(line, format!("invalid sample time '{raw}'"))
        })?;
        let offset = Duration::minutes(st.minute as i64)
            + Duration::seconds(st.second as i64)
            + Duration::nanoseconds(st.nanos as i64);

        let ts = match st.hour {
            Some(h) => {
                let day = self.hour_base.date().and_hms_opt(0, 0, 0).unwrap_or(self.hour_base);
                day + Duration::hours(h as i64) + offset
            }
            None => {
                let mut ts = self.hour_base + offset;
                let reference = self.previous.unwrap_or(self.start);
                if ts + Duration::minutes(ROLLOVER_TOLERANCE_MINUTES) < reference {
                    self.hour_base += Duration::hours(1);
                    ts += Duration::hours(1);
                    warn!("line {line}: sample clock rolled over into hour {}", ts.hour());
                }
                ts
            }
        };
        self.previous = Some(ts);
        Ok(ts)
    }
}

fn field<'r>(record: &'r StringRecord, idx: usize, name: &str, line: usize) -> Result<&'r str> {
    record
        .get(idx)
        .ok_or_else(|| CtdError::parse(line, format!("missing field '{name}'")))
}

fn parse_f64(record: &StringRecord, idx: usize, name: &str, line: usize) -> Result<f64> {
    let raw = field(record, idx, name, line)?;
    raw.parse::<f64>()
        .map_err(|_| CtdError::parse(line, format!("'{name}': '{raw}' is not a number")))
}

// ---------------------------------------------------------------------------
// Seabird loader
// ---------------------------------------------------------------------------

/// Zero-based field positions of a Seabird export. These follow the
/// variable order configured when the file was processed; the file itself
/// does not name them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeabirdColumns {
    pub pressure: usize,
    pub temperature: usize,
    pub conductivity: usize,
    pub oxygen: usize,
    /// Absolute salinity.
    pub salinity: usize,
    pub density: usize,
}

impl Default for SeabirdColumns {
    fn default() -> Self {
        SeabirdColumns {
            pressure: 0,
            temperature: 1,
            conductivity: 2,
            oxygen: 3,
            salinity: 7,
            density: 8,
        }
    }
}

impl SeabirdColumns {
    fn min_fields(&self) -> usize {
        [
            self.pressure,
            self.temperature,
            self.conductivity,
            self.oxygen,
            self.salinity,
            self.density,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeabirdOptions {
    pub pressure_threshold: f64,
    pub columns: SeabirdColumns,
}

impl Default for SeabirdOptions {
    fn default() -> Self {
        SeabirdOptions {
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            columns: SeabirdColumns::default(),
        }
    }
}

/// Read a Seabird plain-text export.
///
/// ```text
/// * Sea-Bird SBE19plus Data File:
/// # name 0 = prdM: Pressure, Strain Gauge [db]
/// *END*
///       1.021    12.3010   3.901234   245.112 ...
/// ```
///
/// Lines starting with `*` or `#` are headers; data fields are separated by
/// any run of whitespace.
pub fn read_seabird(path: &Path, opts: &SeabirdOptions) -> Result<Cast> {
    let reader = BufReader::new(File::open(path)?);
    let cols = &opts.columns;
    let min_fields = cols.min_fields();

    let mut pressure = Vec::new();
    let mut temperature = Vec::new();
    let mut conductivity = Vec::new();
    let mut oxygen = Vec::new();
    let mut salinity = Vec::new();
    let mut density = Vec::new();
    let mut skipped = 0usize;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line_no = line_num + 1;
        let line = line_result?;
        let trimmed = line.trim();

        if trimmed.is_empty() || line.starts_with('*') || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let get = |idx: usize, name: &str| -> Result<f64> {
            let raw = parts.get(idx).ok_or_else(|| {
                CtdError::parse(line_no, format!("missing field {idx} ({name})"))
            })?;
            raw.parse::<f64>()
                .map_err(|_| CtdError::parse(line_no, format!("{name}: '{raw}' is not a number")))
        };

        let p = get(cols.pressure, "pressure")?;
        if p < opts.pressure_threshold {
            skipped += 1;
            continue;
        }
        if parts.len() < min_fields {
            return Err(CtdError::parse(
                line_no,
                format!("expected at least {min_fields} fields, found {}", parts.len()),
            ));
        }

        pressure.push(p);
        temperature.push(get(cols.temperature, "temperature")?);
        conductivity.push(get(cols.conductivity, "conductivity")?);
        oxygen.push(get(cols.oxygen, "oxygen")?);
        salinity.push(get(cols.salinity, "salinity")?);
        density.push(get(cols.density, "density")?);
    }

    info!(
        "Loaded Seabird cast {}: {} samples ({} shallower than {} dBar skipped)",
        path.display(),
        pressure.len(),
        skipped,
        opts.pressure_threshold
    );

    let cast = Cast {
        source: Some(path.to_path_buf()),
        instrument: Instrument::Seabird,
        salinity_scale: SalinityScale::Absolute,
        metadata: BTreeMap::new(),
        timestamps: None,
        pressure,
        temperature,
        salinity,
        oxygen,
        corrected_oxygen: None,
        conductivity: Some(conductivity),
        turbidity: None,
        density: Some(density),
    };
    cast.validate()?;
    Ok(cast)
}
