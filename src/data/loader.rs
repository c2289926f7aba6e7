use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Reading, SensorTable, WeatherTable};

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time", "datetime"];
const PM_COLUMNS: &[&str] = &["pm", "pm25", "pm2_5"];
const LON_COLUMNS: &[&str] = &["lon", "longitude"];
const LAT_COLUMNS: &[&str] = &["lat", "latitude"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the primary sensor table. Dispatch by extension.
///
/// Required columns: a timestamp column (`timestamp`, `time` or `datetime`),
/// `pm` (or `pm25` / `pm2_5`), `lon` (or `longitude`) and `lat` (or
/// `latitude`). Rows whose timestamp cannot be parsed are dropped.
pub fn load_sensor_file(path: &Path) -> Result<SensorTable> {
    let raw = load_raw(path)?;
    let pm = raw.require(PM_COLUMNS)?;
    let lon = raw.require(LON_COLUMNS)?;
    let lat = raw.require(LAT_COLUMNS)?;

    let readings = raw
        .rows
        .into_iter()
        .filter_map(|row| {
            row.timestamp
                .map(|ts| Reading::new(ts, row.values[pm], row.values[lon], row.values[lat]))
        })
        .collect::<Vec<_>>();
    log::info!("loaded {} sensor readings from {}", readings.len(), path.display());
    Ok(SensorTable::from_readings(readings))
}

/// Load a weather table. Every non-timestamp column is a feature, in file
/// order. Rows are sorted by timestamp.
pub fn load_weather_file(path: &Path) -> Result<WeatherTable> {
    let raw = load_raw(path)?;
    let rows = raw
        .rows
        .into_iter()
        .filter_map(|row| row.timestamp.map(|ts| (ts, row.values)))
        .collect::<Vec<_>>();
    log::info!(
        "loaded {} weather rows with {} features from {}",
        rows.len(),
        raw.columns.len(),
        path.display()
    );
    WeatherTable::new(raw.columns, rows).context("building weather table")
}

/// Parse a timestamp in any of the accepted text layouts: RFC 3339, or
/// `YYYY-MM-DD HH:MM[:SS[.f]]` with a space or `T` separator.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

// ---------------------------------------------------------------------------
// RawTable – format-independent intermediate
// ---------------------------------------------------------------------------

struct RawRow {
    /// `None` when the source timestamp was missing or unparseable.
    timestamp: Option<NaiveDateTime>,
    values: Vec<f64>,
}

struct RawTable {
    /// Names of the value columns (timestamp column excluded).
    columns: Vec<String>,
    rows: Vec<RawRow>,
}

impl RawTable {
    fn require(&self, aliases: &[&str]) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| aliases.contains(&c.as_str()))
            .with_context(|| format!("missing '{}' column", aliases[0]))
    }

    fn report_dropped(self, path: &Path) -> Self {
        let dropped = self.rows.iter().filter(|r| r.timestamp.is_none()).count();
        if dropped > 0 {
            log::warn!(
                "{}: dropping {dropped} rows with unparseable timestamps",
                path.display()
            );
        }
        self
    }
}

fn load_raw(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let raw = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;
    Ok(raw.report_dropped(path))
}

fn timestamp_position<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<usize> {
    names
        .into_iter()
        .position(|n| TIMESTAMP_COLUMNS.contains(&n))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`:
///
/// ```json
/// [
///   { "timestamp": "2023-03-01 10:00:00", "pm": 12.5, "lon": 4.35, "lat": 50.85 },
///   ...
/// ]
/// ```
///
/// Columns are taken from the first record. Missing or null values are NaN.
fn load_json(path: &Path) -> Result<RawTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let Some(first) = records.first() else {
        return Ok(RawTable {
            columns: Vec::new(),
            rows: Vec::new(),
        });
    };
    let first = first.as_object().context("Row 0 is not a JSON object")?;
    let ts_key = first
        .keys()
        .find(|k| TIMESTAMP_COLUMNS.contains(&k.as_str()))
        .cloned()
        .context("JSON records have no timestamp field")?;
    let columns: Vec<String> = first.keys().filter(|k| **k != ts_key).cloned().collect();

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let timestamp = obj
            .get(&ts_key)
            .and_then(JsonValue::as_str)
            .and_then(parse_timestamp);

        let values = columns
            .iter()
            .map(|col| match obj.get(col) {
                None | Some(JsonValue::Null) => Ok(f64::NAN),
                Some(v) => v
                    .as_f64()
                    .with_context(|| format!("Row {i}, '{col}': not a number")),
            })
            .collect::<Result<Vec<f64>>>()?;

        rows.push(RawRow { timestamp, values });
    }

    Ok(RawTable { columns, rows })
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one timestamp column, all other
/// columns numeric. Empty cells are NaN.
fn load_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let ts_idx = timestamp_position(headers.iter().map(String::as_str))
        .context("CSV missing 'timestamp' column")?;
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let timestamp = record.get(ts_idx).and_then(parse_timestamp);
        let values = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != ts_idx)
            .map(|(col_idx, cell)| parse_cell(cell, row_no, &headers[col_idx]))
            .collect::<Result<Vec<f64>>>()?;

        if values.len() != columns.len() {
            bail!(
                "CSV row {row_no}: {} values but {} columns",
                values.len(),
                columns.len()
            );
        }

        rows.push(RawRow { timestamp, values });
    }

    Ok(RawTable { columns, rows })
}

fn parse_cell(s: &str, row: usize, col: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(f64::NAN);
    }
    s.parse::<f64>()
        .with_context(|| format!("Row {row}, '{col}': '{s}' is not a number"))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet table.
///
/// Expected schema:
/// - one timestamp column: Utf8 / LargeUtf8 text, or an Arrow `Timestamp`
///   of any unit (time zone ignored, values read as UTC)
/// - every other column numeric: Float64, Float32, Int64 or Int32
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let ts_idx = timestamp_position(schema.fields().iter().map(|f| f.name().as_str()))
            .context("Parquet file missing 'timestamp' column")?;
        let value_cols: Vec<usize> = (0..schema.fields().len()).filter(|i| *i != ts_idx).collect();
        if columns.is_none() {
            columns = Some(
                value_cols
                    .iter()
                    .map(|i| schema.field(*i).name().clone())
                    .collect(),
            );
        }

        let timestamps = extract_timestamps(batch.column(ts_idx))?;
        let value_arrays = value_cols
            .iter()
            .map(|i| {
                extract_f64(batch.column(*i))
                    .with_context(|| format!("column '{}'", schema.field(*i).name()))
            })
            .collect::<Result<Vec<_>>>()?;

        for (row, timestamp) in timestamps.into_iter().enumerate() {
            let values = value_arrays.iter().map(|col| col[row]).collect();
            rows.push(RawRow { timestamp, values });
        }
    }

    Ok(RawTable {
        columns: columns.unwrap_or_default(),
        rows,
    })
}

// -- Parquet / Arrow helpers --

fn downcast<'a, T: 'static>(col: &'a Arc<dyn Array>, what: &str) -> Result<&'a T> {
    col.as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("expected {what}"))
}

/// Read a numeric column as `f64`; nulls become NaN.
fn extract_f64(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    let values = match col.data_type() {
        DataType::Float64 => downcast::<Float64Array>(col, "Float64Array")?
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect(),
        DataType::Float32 => downcast::<Float32Array>(col, "Float32Array")?
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        DataType::Int64 => downcast::<Int64Array>(col, "Int64Array")?
            .iter()
            .map(|v| v.map_or(f64::NAN, |i| i as f64))
            .collect(),
        DataType::Int32 => downcast::<Int32Array>(col, "Int32Array")?
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        other => bail!("Expected numeric column, got {other:?}"),
    };
    Ok(values)
}

/// Read a timestamp column; nulls and unparseable text become `None`.
fn extract_timestamps(col: &Arc<dyn Array>) -> Result<Vec<Option<NaiveDateTime>>> {
    fn from_parts(secs: i64, nanos: i64) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(secs, nanos as u32).map(|dt| dt.naive_utc())
    }
    fn scaled(
        values: impl Iterator<Item = Option<i64>>,
        per_sec: i64,
    ) -> Vec<Option<NaiveDateTime>> {
        values
            .map(|v| {
                v.and_then(|v| {
                    from_parts(
                        v.div_euclid(per_sec),
                        v.rem_euclid(per_sec) * (1_000_000_000 / per_sec),
                    )
                })
            })
            .collect()
    }

    let values = match col.data_type() {
        DataType::Utf8 => downcast::<StringArray>(col, "StringArray")?
            .iter()
            .map(|v| v.and_then(parse_timestamp))
            .collect(),
        DataType::LargeUtf8 => downcast::<LargeStringArray>(col, "LargeStringArray")?
            .iter()
            .map(|v| v.and_then(parse_timestamp))
            .collect(),
        DataType::Timestamp(TimeUnit::Second, _) => {
            scaled(downcast::<TimestampSecondArray>(col, "TimestampSecondArray")?.iter(), 1)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => scaled(
            downcast::<TimestampMillisecondArray>(col, "TimestampMillisecondArray")?.iter(),
            1_000,
        ),
        DataType::Timestamp(TimeUnit::Microsecond, _) => scaled(
            downcast::<TimestampMicrosecondArray>(col, "TimestampMicrosecondArray")?.iter(),
            1_000_000,
        ),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => scaled(
            downcast::<TimestampNanosecondArray>(col, "TimestampNanosecondArray")?.iter(),
            1_000_000_000,
        ),
        other => bail!("Expected text or Timestamp column, got {other:?}"),
    };
    Ok(values)
}
