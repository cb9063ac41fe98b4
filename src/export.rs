use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDateTime, Timelike};
use log::info;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::data::model::Cast;
use crate::error::{CtdError, Result};

// ---------------------------------------------------------------------------
// Cast CSV
// ---------------------------------------------------------------------------

/// One output row of a derived cast file.
#[derive(Debug, Serialize)]
struct CastRow {
    #[serde(rename = "Datetime")]
    datetime: Option<String>,
    #[serde(rename = "Pressure")]
    pressure: f64,
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Salinity")]
    salinity: f64,
    #[serde(rename = "Oxygen")]
    oxygen: f64,
    #[serde(rename = "Turbidity")]
    turbidity: Option<f64>,
}

/// `YYYY-MM-DD HH:MM:SS`, with a microsecond fraction only when non-zero.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

fn cast_rows(cast: &Cast) -> impl Iterator<Item = CastRow> + '_ {
    (0..cast.len()).map(move |i| CastRow {
        datetime: cast.timestamps.as_ref().map(|ts| format_datetime(&ts[i])),
        pressure: cast.pressure[i],
        temperature: cast.temperature[i],
        salinity: cast.salinity[i],
        oxygen: cast.oxygen[i],
        turbidity: cast.turbidity.as_ref().map(|t| t[i]),
    })
}

/// Write `Datetime,Pressure,Temperature,Salinity,Oxygen,Turbidity`, one row
/// per sample. Absent timestamps or turbidity are written as empty fields.
pub fn write_cast_csv(path: &Path, cast: &Cast) -> Result<()> {
    cast.validate()?;
    let mut writer = csv::Writer::from_path(path)?;
    if cast.is_empty() {
        writer.write_record(CAST_COLUMNS)?;
    }
    for row in cast_rows(cast) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} samples to {}", cast.len(), path.display());
    Ok(())
}

const CAST_COLUMNS: [&str; 6] = [
    "Datetime",
    "Pressure",
    "Temperature",
    "Salinity",
    "Oxygen",
    "Turbidity",
];

// ---------------------------------------------------------------------------
// Binned profiles
// ---------------------------------------------------------------------------

/// A labelled series of per-bin values sharing the table's bin edges.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedSeries {
    pub label: String,
    pub values: Vec<f64>,
}

impl BinnedSeries {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        BinnedSeries {
            label: label.into(),
            values,
        }
    }
}

/// Write a `Pressure` column of bin edges followed by one column per
/// series. NaN (empty bin) is written as an empty field. Numbers are
/// rendered the same way as in [`write_cast_csv`].
pub fn write_binned_csv(path: &Path, edges: &[f64], series: &[BinnedSeries]) -> Result<()> {
    for s in series {
        if s.values.len() != edges.len() {
            return Err(CtdError::LengthMismatch {
                what: s.label.clone(),
                expected: edges.len(),
                got: s.values.len(),
            });
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["Pressure".to_string()];
    header.extend(series.iter().map(|s| s.label.clone()));
    writer.write_record(&header)?;

    for (i, &edge) in edges.iter().enumerate() {
        let mut row = vec![Some(edge)];
        row.extend(series.iter().map(|s| Some(s.values[i]).filter(|v| !v.is_nan())));
        writer.serialize(&row)?;
    }
    writer.flush()?;
    info!(
        "Wrote {} bins x {} series to {}",
        edges.len(),
        series.len(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Write the same columns as [`write_cast_csv`] to a Parquet file.
pub fn write_cast_parquet(path: &Path, cast: &Cast) -> Result<()> {
    cast.validate()?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("Datetime", DataType::Utf8, true),
        Field::new("Pressure", DataType::Float64, false),
        Field::new("Temperature", DataType::Float64, false),
        Field::new("Salinity", DataType::Float64, false),
        Field::new("Oxygen", DataType::Float64, false),
        Field::new("Turbidity", DataType::Float64, true),
    ]));

    let datetimes: Vec<Option<String>> = match &cast.timestamps {
        Some(ts) => ts.iter().map(|t| Some(format_datetime(t))).collect(),
        None => vec![None; cast.len()],
    };
    let turbidity: Vec<Option<f64>> = match &cast.turbidity {
        Some(t) => t.iter().copied().map(Some).collect(),
        None => vec![None; cast.len()],
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(datetimes)),
        Arc::new(Float64Array::from(cast.pressure.clone())),
        Arc::new(Float64Array::from(cast.temperature.clone())),
        Arc::new(Float64Array::from(cast.salinity.clone())),
        Arc::new(Float64Array::from(cast.oxygen.clone())),
        Arc::new(Float64Array::from(turbidity)),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    info!("Wrote {} samples to {}", cast.len(), path.display());
    Ok(())
}
