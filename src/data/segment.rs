//! Gap-based segmentation of readings into snapshots and of snapshots into
//! batches.

use std::ops::Range;

use chrono::{NaiveDateTime, TimeDelta};

use super::model::{SnapshotIndex, TimeSpan};

/// Split `0..len` into contiguous runs, starting a new run at every `i`
/// (`1 <= i < len`) for which `is_boundary(i)` holds.
fn split_on_gaps(len: usize, is_boundary: impl Fn(usize) -> bool) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..len {
        if is_boundary(i) {
            runs.push(start..i);
            start = i;
        }
    }
    runs.push(start..len);
    runs
}

fn minutes_to_millis(minutes: u32) -> i64 {
    i64::from(minutes) * 60_000
}

/// Group a sorted timestamp sequence into snapshots. A new snapshot starts
/// wherever the gap to the previous timestamp is at least `threshold_minutes`.
pub fn segment_intervals(
    timestamps: &[NaiveDateTime],
    threshold_minutes: u32,
) -> Vec<SnapshotIndex> {
    let threshold = minutes_to_millis(threshold_minutes);
    split_on_gaps(timestamps.len(), |i| {
        (timestamps[i] - timestamps[i - 1]).num_milliseconds() >= threshold
    })
    .into_iter()
    .map(|r| SnapshotIndex::new(r.start, r.end))
    .collect()
}

/// Mean of a non-empty set of timestamps, at millisecond resolution.
pub fn representative_timestamp(timestamps: &[NaiveDateTime]) -> Option<NaiveDateTime> {
    let (&origin, _) = timestamps.split_first()?;
    let total: i128 = timestamps
        .iter()
        .map(|ts| i128::from((*ts - origin).num_milliseconds()))
        .sum();
    let mean = total / timestamps.len() as i128;
    Some(origin + TimeDelta::milliseconds(mean as i64))
}

/// Group consecutive snapshots into batches. A new batch starts wherever the
/// raw wall-clock gap between the last reading of one snapshot and the first
/// reading of the next exceeds `batch_minutes`.
///
/// Returned ranges index into `spans`.
pub fn split_batches(spans: &[TimeSpan], batch_minutes: u32) -> Vec<Range<usize>> {
    let threshold = minutes_to_millis(batch_minutes);
    split_on_gaps(spans.len(), |i| {
        (spans[i].first - spans[i - 1].last).num_milliseconds() > threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn minutes(offsets: &[i64]) -> Vec<NaiveDateTime> {
        let origin = NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        offsets
            .iter()
            .map(|m| origin + TimeDelta::minutes(*m))
            .collect()
    }

    fn span(first: i64, last: i64) -> TimeSpan {
        let ts = minutes(&[first, last]);
        TimeSpan {
            first: ts[0],
            last: ts[1],
        }
    }

    #[test]
    fn splits_where_gap_meets_threshold() {
        let ts = minutes(&[0, 1, 2, 20, 21, 40]);
        let snapshots = segment_intervals(&ts, 15);
        assert_eq!(
            snapshots,
            vec![
                SnapshotIndex::new(0, 3),
                SnapshotIndex::new(3, 5),
                SnapshotIndex::new(5, 6)
            ]
        );
        let sizes: Vec<usize> = snapshots.iter().map(SnapshotIndex::len).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
    }

    #[test]
    fn gap_equal_to_threshold_is_a_boundary() {
        let ts = minutes(&[0, 15, 29]);
        let snapshots = segment_intervals(&ts, 15);
        assert_eq!(
            snapshots,
            vec![SnapshotIndex::new(0, 1), SnapshotIndex::new(1, 3)]
        );
    }

    #[test]
    fn segments_partition_input() {
        let ts = minutes(&[0, 3, 3, 30, 31, 32, 90, 200, 201]);
        let snapshots = segment_intervals(&ts, 10);
        assert_eq!(snapshots.first().map(|s| s.start), Some(0));
        assert_eq!(snapshots.last().map(|s| s.end), Some(ts.len()));
        for pair in snapshots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for s in &snapshots {
            for i in s.start + 1..s.end {
                assert!((ts[i] - ts[i - 1]).num_minutes() < 10);
            }
            if s.start > 0 {
                assert!((ts[s.start] - ts[s.start - 1]).num_minutes() >= 10);
            }
        }
    }

    #[test]
    fn empty_timestamps_give_no_segments() {
        assert!(segment_intervals(&[], 15).is_empty());
    }

    #[test]
    fn representative_is_mean() {
        let ts = minutes(&[0, 1, 2]);
        assert_eq!(representative_timestamp(&ts), Some(ts[1]));
        assert_eq!(representative_timestamp(&[]), None);
    }

    #[test]
    fn batch_split_requires_gap_to_exceed_threshold() {
        let spans = vec![span(0, 2), span(17, 18), span(33, 40), span(100, 101)];
        // 2→17 = 15 (not > 15), 18→33 = 15, 40→100 = 60
        assert_eq!(split_batches(&spans, 15), vec![0..3, 3..4]);
        assert_eq!(split_batches(&spans, 14), vec![0..1, 1..2, 2..3, 3..4]);
    }

    #[test]
    fn batch_split_empty() {
        assert!(split_batches(&[], 15).is_empty());
    }
}
