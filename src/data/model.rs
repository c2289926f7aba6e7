use std::cmp::Ordering;
use std::ops::Range;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Position – a longitude / latitude pair
// ---------------------------------------------------------------------------

/// Sensor position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub lon: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// IEEE total ordering on `(lon, lat)`, so positions can key a `BTreeMap`.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.lon
            .total_cmp(&other.lon)
            .then_with(|| self.lat.total_cmp(&other.lat))
    }
}

// ---------------------------------------------------------------------------
// Reading – one row of the primary table
// ---------------------------------------------------------------------------

/// A single particulate-matter measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    /// Mass concentration.
    pub pm: f64,
    pub position: Position,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, pm: f64, lon: f64, lat: f64) -> Self {
        Self {
            timestamp,
            pm,
            position: Position::new(lon, lat),
        }
    }
}

// ---------------------------------------------------------------------------
// SensorTable – the primary table
// ---------------------------------------------------------------------------

/// Position / mass readings keyed by timestamp. Not necessarily uniformly
/// sampled and not necessarily strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct SensorTable {
    pub readings: Vec<Reading>,
}

impl SensorTable {
    /// Build a table, sorting readings by timestamp. The sort is stable so
    /// readings sharing a timestamp keep their source order.
    pub fn from_readings(mut readings: Vec<Reading>) -> Self {
        readings.sort_by_key(|r| r.timestamp);
        Self { readings }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// WeatherTable – optional companion series
// ---------------------------------------------------------------------------

/// Weather observations: sorted timestamps with one fixed-width feature
/// vector per timestamp.
#[derive(Debug, Clone, Default)]
pub struct WeatherTable {
    columns: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<Vec<f64>>,
}

impl WeatherTable {
    /// Build a table from unsorted rows. Every row must have exactly
    /// `columns.len()` values.
    pub fn new(columns: Vec<String>, mut rows: Vec<(NaiveDateTime, Vec<f64>)>) -> Result<Self> {
        if let Some((row, (_, values))) = rows
            .iter()
            .enumerate()
            .find(|(_, (_, v))| v.len() != columns.len())
        {
            return Err(DatasetError::WeatherWidth {
                row,
                got: values.len(),
                expected: columns.len(),
            });
        }
        rows.sort_by_key(|(ts, _)| *ts);
        let (timestamps, values) = rows.into_iter().unzip();
        Ok(Self {
            columns,
            timestamps,
            values,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn row(&self, idx: usize) -> Option<&[f64]> {
        self.values.get(idx).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SnapshotIndex / TimeSpan – index bookkeeping
// ---------------------------------------------------------------------------

/// Half-open `[start, end)` range of reading positions forming one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotIndex {
    pub start: usize,
    pub end: usize,
}

impl SnapshotIndex {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Earliest and latest raw (pre-floor) timestamp covered by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

impl TimeSpan {
    /// Smallest span covering both `self` and `other`.
    pub fn union(self, other: Self) -> Self {
        Self {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        }
    }
}
