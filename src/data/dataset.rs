use std::fmt;
use std::ops::Range;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::calendar::CalendarFn;
use super::dedup::average_duplicates;
use super::filter::{compact_ranges, RetentionMask};
use super::model::{Position, SensorTable, SnapshotIndex, TimeSpan, WeatherTable};
use super::segment::{representative_timestamp, segment_intervals, split_batches};
use super::view::{Batch, BatchSlice};
use super::weather::{gate, match_snapshots};
use crate::config::DatasetConfig;
use crate::error::{DatasetError, Result};

/// Batches with fewer snapshots carry no sequential signal.
const MIN_BATCH_LEN: usize = 2;

// ---------------------------------------------------------------------------
// Construction stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Indexed,
    Segmented,
    WeatherMatched,
    WeatherGated,
    TimeFeatured,
    BatchSplit,
    UnitBatchPruned,
    Ready,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Indexed => "indexed",
            Stage::Segmented => "segmented",
            Stage::WeatherMatched => "weather-matched",
            Stage::WeatherGated => "weather-gated",
            Stage::TimeFeatured => "time-featured",
            Stage::BatchSplit => "batch-split",
            Stage::UnitBatchPruned => "unit-batch-pruned",
            Stage::Ready => "ready",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Dataset – the aligned container
// ---------------------------------------------------------------------------

/// Weather table plus the matched row for every retained snapshot.
#[derive(Debug, Clone)]
pub(super) struct WeatherStream {
    pub(super) table: WeatherTable,
    pub(super) snapshot_idx: Vec<usize>,
}

/// Readings aligned into batches of snapshots.
///
/// Owns every backing array. All per-snapshot arrays (`snapshots`,
/// `timestamps`, weather indices, calendar features) have the same length and
/// `batches` holds consecutive ranges over them.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub(super) pm: Vec<f64>,
    pub(super) gps: Vec<Position>,
    pub(super) weather: Option<WeatherStream>,
    pub(super) time: Option<Vec<Vec<f64>>>,
    pub(super) snapshots: Vec<SnapshotIndex>,
    pub(super) timestamps: Vec<NaiveDateTime>,
    pub(super) batches: Vec<Range<usize>>,
    raw_readings: usize,
    config: DatasetConfig,
}

/// Counts and shape information about a built [`Dataset`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub raw_readings: usize,
    pub readings: usize,
    pub snapshots: usize,
    pub batches: usize,
    pub min_batch_len: Option<usize>,
    pub max_batch_len: Option<usize>,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub weather_columns: Option<Vec<String>>,
    pub time_features: Option<usize>,
    pub config: DatasetConfig,
}

impl Dataset {
    /// Build from sensor readings only.
    pub fn build(sensors: SensorTable, config: DatasetConfig) -> Result<Self> {
        DatasetBuilder::new(sensors, config).build()
    }

    pub fn builder(sensors: SensorTable, config: DatasetConfig) -> DatasetBuilder {
        DatasetBuilder::new(sensors, config)
    }

    /// Number of retained batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Number of snapshots across all retained batches.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Number of deduplicated readings backing the dataset.
    pub fn reading_count(&self) -> usize {
        self.pm.len()
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn weather_columns(&self) -> Option<&[String]> {
        self.weather.as_ref().map(|w| w.table.columns())
    }

    pub fn has_weather(&self) -> bool {
        self.weather.is_some()
    }

    pub fn has_time(&self) -> bool {
        self.time.is_some()
    }

    /// The `idx`-th batch.
    pub fn get_batch(&self, idx: usize) -> Result<Batch<'_>> {
        let range = self.batches.get(idx).ok_or(DatasetError::IndexOutOfBounds {
            idx,
            len: self.len(),
        })?;
        Ok(Batch::new(self, range.clone()))
    }

    /// Batches selected by a slice with Python semantics (negative indices,
    /// clamping, stepping).
    pub fn get_batch_range(&self, slice: impl Into<BatchSlice>) -> Result<Vec<Batch<'_>>> {
        let slice: BatchSlice = slice.into();
        let indices = slice.indices(self.len())?;
        Ok(indices
            .into_iter()
            .map(|i| Batch::new(self, self.batches[i].clone()))
            .collect())
    }

    pub fn batches(&self) -> impl Iterator<Item = Batch<'_>> + '_ {
        self.batches.iter().map(move |r| Batch::new(self, r.clone()))
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            raw_readings: self.raw_readings,
            readings: self.reading_count(),
            snapshots: self.snapshot_count(),
            batches: self.len(),
            min_batch_len: self.batches.iter().map(|b| b.len()).min(),
            max_batch_len: self.batches.iter().map(|b| b.len()).max(),
            first_timestamp: self.timestamps.first().copied(),
            last_timestamp: self.timestamps.last().copied(),
            weather_columns: self.weather_columns().map(<[String]>::to_vec),
            time_features: self
                .time
                .as_ref()
                .map(|t| t.first().map_or(0, Vec::len)),
            config: self.config,
        }
    }
}

// ---------------------------------------------------------------------------
// DatasetBuilder – optional streams and the construction pipeline
// ---------------------------------------------------------------------------

/// Collects the optional streams and runs the construction pipeline.
pub struct DatasetBuilder {
    sensors: SensorTable,
    weather: Option<WeatherTable>,
    calendar: Option<CalendarFn>,
    config: DatasetConfig,
}

impl DatasetBuilder {
    pub fn new(sensors: SensorTable, config: DatasetConfig) -> Self {
        Self {
            sensors,
            weather: None,
            calendar: None,
            config,
        }
    }

    /// Gate snapshots on a weather table. Requires `minutes_to_weather`.
    pub fn weather(mut self, table: WeatherTable) -> Self {
        self.weather = Some(table);
        self
    }

    /// Attach calendar features computed from each snapshot timestamp.
    pub fn calendar<F>(mut self, encode: F) -> Self
    where
        F: Fn(NaiveDateTime) -> Vec<f64> + Send + Sync + 'static,
    {
        self.calendar = Some(Box::new(encode));
        self
    }

    /// Run the pipeline. The sensor table is consumed: its readings are
    /// floored, deduplicated and become the dataset's backing arrays.
    pub fn build(self) -> Result<Dataset> {
        let Self {
            sensors,
            weather,
            calendar,
            config,
        } = self;
        config.validate(weather.is_some())?;

        let raw_readings = sensors.len();
        let merged = average_duplicates(&sensors.readings, config.snapshot_minutes);
        log::debug!(
            "{}: {raw_readings} readings -> {} distinct (time, position) rows",
            Stage::Indexed,
            merged.len()
        );

        let floored: Vec<NaiveDateTime> = merged.iter().map(|m| m.reading.timestamp).collect();
        let mut snapshots = segment_intervals(&floored, config.snapshot_minutes);
        let mut timestamps: Vec<NaiveDateTime> = snapshots
            .iter()
            .map(|s| representative_timestamp(&floored[s.range()]).unwrap_or(floored[s.start]))
            .collect();
        let mut spans: Vec<TimeSpan> = snapshots
            .iter()
            .map(|s| {
                merged[s.start + 1..s.end]
                    .iter()
                    .fold(merged[s.start].span, |acc, m| acc.union(m.span))
            })
            .collect();
        log::debug!("{}: {} snapshots", Stage::Segmented, snapshots.len());

        let (pm, gps): (Vec<f64>, Vec<Position>) = merged
            .iter()
            .map(|m| (m.reading.pm, m.reading.position))
            .unzip();

        // `validate` guarantees a tolerance whenever a table is present.
        let weather = match weather.zip(config.minutes_to_weather) {
            Some((table, tolerance)) => {
                let matches = match_snapshots(table.timestamps(), &timestamps);
                log::debug!(
                    "{}: {} of {} snapshots matched against {} weather rows",
                    Stage::WeatherMatched,
                    matches.iter().flatten().count(),
                    matches.len(),
                    table.len()
                );

                let (mask, snapshot_idx) = gate(&matches, tolerance);
                snapshots = mask.compact(snapshots);
                timestamps = mask.compact(timestamps);
                spans = mask.compact(spans);
                log::debug!(
                    "{}: dropped {} snapshots further than {tolerance} min from weather",
                    Stage::WeatherGated,
                    mask.dropped()
                );
                Some(WeatherStream {
                    table,
                    snapshot_idx,
                })
            }
            None => None,
        };

        let time: Option<Vec<Vec<f64>>> =
            calendar.map(|encode| timestamps.iter().map(|ts| encode(*ts)).collect());
        if time.is_some() {
            log::debug!("{}: {} calendar vectors", Stage::TimeFeatured, timestamps.len());
        }

        let batches = split_batches(&spans, config.batch_gap_minutes());
        log::debug!("{}: {} batches", Stage::BatchSplit, batches.len());

        let mask = RetentionMask::from_ranges(snapshots.len(), &batches, MIN_BATCH_LEN);
        let kept = compact_ranges(&batches, MIN_BATCH_LEN);
        let snapshots = mask.compact(snapshots);
        let timestamps = mask.compact(timestamps);
        let time = mask.compact_opt(time);
        let weather = weather.map(|w| WeatherStream {
            snapshot_idx: mask.compact(w.snapshot_idx),
            table: w.table,
        });
        log::debug!(
            "{}: dropped {} unit batches",
            Stage::UnitBatchPruned,
            batches.len() - kept.len()
        );

        log::info!(
            "{}: {} batches, {} snapshots from {raw_readings} readings",
            Stage::Ready,
            kept.len(),
            snapshots.len()
        );

        Ok(Dataset {
            pm,
            gps,
            weather,
            time,
            snapshots,
            timestamps,
            batches: kept,
            raw_readings,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::calendar::{one_hot_calendar, CALENDAR_WIDTH};
    use crate::data::model::Reading;
    use chrono::{NaiveDate, TimeDelta};

    fn origin() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn at(minute: i64) -> NaiveDateTime {
        origin() + TimeDelta::minutes(minute)
    }

    fn sensors(minutes: &[i64]) -> SensorTable {
        SensorTable::from_readings(
            minutes
                .iter()
                .enumerate()
                .map(|(i, m)| Reading::new(at(*m), i as f64, 10.0 + i as f64, 50.0))
                .collect(),
        )
    }

    #[test]
    fn empty_table_builds_empty_dataset() {
        let ds = Dataset::build(SensorTable::default(), DatasetConfig::new(15)).unwrap();
        assert_eq!(ds.len(), 0);
        assert!(ds.is_empty());
        assert_eq!(ds.snapshot_count(), 0);
        assert!(matches!(
            ds.get_batch(0),
            Err(DatasetError::IndexOutOfBounds { idx: 0, len: 0 })
        ));
    }

    #[test]
    fn weather_without_tolerance_fails_fast() {
        let weather = WeatherTable::new(vec!["temp".into()], vec![(at(0), vec![1.0])]).unwrap();
        let err = Dataset::builder(sensors(&[0, 1]), DatasetConfig::new(15))
            .weather(weather)
            .build()
            .unwrap_err();
        assert_eq!(err, DatasetError::MissingWeatherTolerance);
    }

    #[test]
    fn one_snapshot_per_bucket() {
        // Buckets 0, 15, 30, 60; raw gaps 3→15 = 12, 16→30 = 14, 31→60 = 29.
        // The trailing bucket becomes a unit batch.
        let ds = Dataset::build(
            sensors(&[0, 3, 15, 16, 30, 31, 60]),
            DatasetConfig::new(15).with_batch_minutes(14),
        )
        .unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.snapshot_count(), 3);

        let batch = ds.get_batch(0).unwrap();
        assert_eq!(batch.timestamps(), &[at(0), at(15), at(30)]);
        let sizes: Vec<usize> = batch.pm().iter().map(|pm| pm.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2]);
        assert!(batch.weather().is_none());
        assert!(batch.time().is_none());
    }

    #[test]
    fn calendar_features_follow_snapshots() {
        let ds = Dataset::builder(sensors(&[0, 15, 30]), DatasetConfig::new(15))
            .calendar(one_hot_calendar)
            .build()
            .unwrap();
        assert!(ds.has_time());
        let batch = ds.get_batch(0).unwrap();
        let time = batch.time().unwrap();
        assert_eq!(time.len(), 3);
        assert!(time.iter().all(|t| t.len() == CALENDAR_WIDTH));
        assert_eq!(ds.summary().time_features, Some(CALENDAR_WIDTH));
    }

    #[test]
    fn all_unit_batches_are_pruned() {
        let ds = Dataset::build(sensors(&[0, 60, 120]), DatasetConfig::new(15)).unwrap();
        assert_eq!(ds.len(), 0);
        assert_eq!(ds.snapshot_count(), 0);
        assert_eq!(ds.reading_count(), 3);
    }

    #[test]
    fn summary_reports_shape() {
        let ds = Dataset::build(
            sensors(&[0, 1, 15, 100, 115, 130]),
            DatasetConfig::new(15),
        )
        .unwrap();
        let summary = ds.summary();
        assert_eq!(summary.raw_readings, 6);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.snapshots, 5);
        assert_eq!(summary.min_batch_len, Some(2));
        assert_eq!(summary.max_batch_len, Some(3));
        assert_eq!(summary.first_timestamp, Some(at(0)));
        assert_eq!(summary.last_timestamp, Some(at(120)));
        assert_eq!(summary.weather_columns, None);
    }
}
