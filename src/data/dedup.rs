use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};

use super::model::{Position, Reading, TimeSpan};

/// Round `ts` down to the nearest multiple of `minutes` since the Unix epoch.
pub fn floor_timestamp(ts: NaiveDateTime, minutes: u32) -> NaiveDateTime {
    let step = i64::from(minutes.max(1)) * 60;
    let secs = ts.and_utc().timestamp();
    let floored = secs.div_euclid(step) * step;
    DateTime::from_timestamp(floored, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(ts)
}

// ---------------------------------------------------------------------------
// GroupKey – (floored timestamp, exact position)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct GroupKey {
    timestamp: NaiveDateTime,
    position: Position,
}

// -- Manual Eq/Ord so positions (f64 pairs) can key a BTreeMap --

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.position.total_cmp(&other.position))
    }
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    pm_sum: f64,
    /// Finite `pm` values in `pm_sum`.
    pm_count: usize,
    count: usize,
    span: TimeSpan,
}

impl Accumulator {
    fn new(span: TimeSpan) -> Self {
        Self {
            pm_sum: 0.0,
            pm_count: 0,
            count: 0,
            span,
        }
    }

    fn push(&mut self, reading: &Reading, raw: TimeSpan) {
        if reading.pm.is_finite() {
            self.pm_sum += reading.pm;
            self.pm_count += 1;
        }
        self.count += 1;
        self.span = self.span.union(raw);
    }

    /// Mean of the finite values, NaN when there are none.
    fn pm_mean(&self) -> f64 {
        if self.pm_count == 0 {
            f64::NAN
        } else {
            self.pm_sum / self.pm_count as f64
        }
    }
}

// ---------------------------------------------------------------------------
// MergedReading – one row per distinct key
// ---------------------------------------------------------------------------

/// A deduplicated reading: the floored timestamp, averaged values, and the
/// raw time span of the readings merged into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedReading {
    pub reading: Reading,
    pub span: TimeSpan,
    /// Number of raw readings averaged into this row.
    pub count: usize,
}

/// Floor every timestamp to `snapshot_minutes` and merge readings that share
/// both the floored timestamp and the exact same position.
///
/// Output is ordered by `(floored timestamp, lon, lat)`. Readings at
/// different positions within one bucket stay distinct rows.
///
/// Missing (non-finite) `pm` values are skipped by the mean; a row whose
/// readings are all missing keeps `pm = NaN`. Positions compare with
/// `f64::total_cmp`, so NaN coordinates with the same bit pattern group
/// together and sort after every finite coordinate.
pub fn average_duplicates(readings: &[Reading], snapshot_minutes: u32) -> Vec<MergedReading> {
    let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();

    for r in readings {
        let key = GroupKey {
            timestamp: floor_timestamp(r.timestamp, snapshot_minutes),
            position: r.position,
        };
        let raw = TimeSpan {
            first: r.timestamp,
            last: r.timestamp,
        };
        groups
            .entry(key)
            .or_insert_with(|| Accumulator::new(raw))
            .push(r, raw);
    }

    groups
        .into_iter()
        .map(|(key, acc)| MergedReading {
            reading: Reading {
                timestamp: key.timestamp,
                pm: acc.pm_mean(),
                position: key.position,
            },
            span: acc.span,
            count: acc.count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn floors_to_epoch_aligned_buckets() {
        assert_eq!(floor_timestamp(at(10, 14, 59), 15), at(10, 0, 0));
        assert_eq!(floor_timestamp(at(10, 15, 0), 15), at(10, 15, 0));
        assert_eq!(floor_timestamp(at(10, 44, 30), 30), at(10, 30, 0));
    }

    #[test]
    fn merges_same_position_within_bucket() {
        let readings = vec![
            Reading::new(at(10, 1, 0), 10.0, 5.0, 50.0),
            Reading::new(at(10, 3, 0), 20.0, 5.0, 50.0),
            Reading::new(at(10, 4, 0), 7.0, 6.0, 50.0),
        ];
        let merged = average_duplicates(&readings, 15);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].reading.timestamp, at(10, 0, 0));
        assert_eq!(merged[0].reading.pm, 15.0);
        assert_eq!(merged[0].count, 2);
        assert_eq!(merged[0].span.first, at(10, 1, 0));
        assert_eq!(merged[0].span.last, at(10, 3, 0));
        assert_eq!(merged[1].reading.position, Position::new(6.0, 50.0));
        assert_eq!(merged[1].reading.pm, 7.0);
    }

    #[test]
    fn same_position_in_different_buckets_stays_apart() {
        let readings = vec![
            Reading::new(at(10, 1, 0), 10.0, 5.0, 50.0),
            Reading::new(at(10, 16, 0), 20.0, 5.0, 50.0),
        ];
        let merged = average_duplicates(&readings, 15);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn orders_groups_by_key() {
        let readings = vec![
            Reading::new(at(10, 20, 0), 1.0, 1.0, 1.0),
            Reading::new(at(10, 2, 0), 2.0, 9.0, 1.0),
            Reading::new(at(10, 3, 0), 3.0, 2.0, 1.0),
        ];
        let merged = average_duplicates(&readings, 15);
        let lons: Vec<f64> = merged.iter().map(|m| m.reading.position.lon).collect();
        assert_eq!(lons, vec![2.0, 9.0, 1.0]);
    }

    #[test]
    fn averaging_is_idempotent() {
        let readings = vec![
            Reading::new(at(10, 1, 0), 10.0, 5.0, 50.0),
            Reading::new(at(10, 3, 0), 20.0, 5.0, 50.0),
            Reading::new(at(10, 4, 0), 7.0, 6.0, 50.0),
            Reading::new(at(10, 31, 0), 1.0, 6.0, 50.0),
        ];
        let once: Vec<Reading> = average_duplicates(&readings, 15)
            .into_iter()
            .map(|m| m.reading)
            .collect();
        let twice: Vec<Reading> = average_duplicates(&once, 15)
            .into_iter()
            .map(|m| m.reading)
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_values_are_skipped_by_the_mean() {
        let readings = vec![
            Reading::new(at(10, 1, 0), 10.0, 5.0, 50.0),
            Reading::new(at(10, 2, 0), f64::NAN, 5.0, 50.0),
            Reading::new(at(10, 3, 0), 20.0, 5.0, 50.0),
            Reading::new(at(10, 4, 0), f64::NAN, 6.0, 50.0),
            Reading::new(at(10, 5, 0), f64::NAN, 6.0, 50.0),
        ];
        let merged = average_duplicates(&readings, 15);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].reading.pm, 15.0);
        assert_eq!(merged[0].count, 3);
        assert_eq!(merged[0].span.last, at(10, 3, 0));
        assert!(merged[1].reading.pm.is_nan());
        assert_eq!(merged[1].count, 2);
    }

    #[test]
    fn nan_positions_group_together() {
        let readings = vec![
            Reading::new(at(10, 1, 0), 4.0, f64::NAN, 50.0),
            Reading::new(at(10, 2, 0), 8.0, f64::NAN, 50.0),
            Reading::new(at(10, 3, 0), 1.0, 5.0, 50.0),
        ];
        let merged = average_duplicates(&readings, 15);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].reading.position, Position::new(5.0, 50.0));
        assert!(merged[1].reading.position.lon.is_nan());
        assert_eq!(merged[1].reading.pm, 6.0);
    }

    #[test]
    fn empty_input() {
        assert!(average_duplicates(&[], 15).is_empty());
    }
}
