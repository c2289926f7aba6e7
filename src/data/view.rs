//! Borrowed, read-only projections over a [`Dataset`].

use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use chrono::NaiveDateTime;

use super::dataset::Dataset;
use super::model::{Position, SnapshotIndex};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A run of at least two consecutive snapshots.
#[derive(Clone)]
pub struct Batch<'a> {
    dataset: &'a Dataset,
    range: Range<usize>,
}

impl<'a> Batch<'a> {
    pub(super) fn new(dataset: &'a Dataset, range: Range<usize>) -> Self {
        Self { dataset, range }
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Representative timestamp of every snapshot.
    pub fn timestamps(&self) -> &'a [NaiveDateTime] {
        &self.dataset.timestamps[self.range.clone()]
    }

    /// Mass values, one slice per snapshot.
    pub fn pm(&self) -> Vec<&'a [f64]> {
        self.snapshots().map(|s| s.pm()).collect()
    }

    /// Positions, one slice per snapshot.
    pub fn gps(&self) -> Vec<&'a [Position]> {
        self.snapshots().map(|s| s.gps()).collect()
    }

    /// Matched weather vector per snapshot, `None` without a weather table.
    pub fn weather(&self) -> Option<Vec<&'a [f64]>> {
        self.dataset.weather.as_ref()?;
        self.snapshots().map(|s| s.weather()).collect()
    }

    /// Calendar features per snapshot, `None` without a calendar encoder.
    pub fn time(&self) -> Option<Vec<&'a [f64]>> {
        self.dataset.time.as_ref()?;
        self.snapshots().map(|s| s.time()).collect()
    }

    /// The `idx`-th snapshot of this batch.
    pub fn get(&self, idx: usize) -> Result<Snapshot<'a>> {
        if idx >= self.len() {
            return Err(DatasetError::IndexOutOfBounds {
                idx,
                len: self.len(),
            });
        }
        Ok(Snapshot {
            dataset: self.dataset,
            idx: self.range.start + idx,
        })
    }

    pub fn snapshots(&self) -> impl Iterator<Item = Snapshot<'a>> + 'a {
        let dataset = self.dataset;
        self.range.clone().map(move |idx| Snapshot { dataset, idx })
    }
}

impl fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("snapshots", &self.range)
            .field("first", &self.timestamps().first())
            .field("last", &self.timestamps().last())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One time step: the readings of a single bucket plus its aligned features.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    dataset: &'a Dataset,
    idx: usize,
}

impl<'a> Snapshot<'a> {
    /// Mean timestamp of the bucket.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.dataset.timestamps[self.idx]
    }

    /// Position of the snapshot's readings in the backing arrays.
    pub fn index(&self) -> SnapshotIndex {
        self.dataset.snapshots[self.idx]
    }

    pub fn pm(&self) -> &'a [f64] {
        &self.dataset.pm[self.index().range()]
    }

    pub fn gps(&self) -> &'a [Position] {
        &self.dataset.gps[self.index().range()]
    }

    /// Row of the weather table matched to this snapshot.
    pub fn weather_index(&self) -> Option<usize> {
        self.dataset
            .weather
            .as_ref()
            .map(|w| w.snapshot_idx[self.idx])
    }

    pub fn weather(&self) -> Option<&'a [f64]> {
        let weather = self.dataset.weather.as_ref()?;
        weather.table.row(weather.snapshot_idx[self.idx])
    }

    pub fn time(&self) -> Option<&'a [f64]> {
        self.dataset
            .time
            .as_ref()
            .map(|t| t[self.idx].as_slice())
    }
}

impl fmt::Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("timestamp", &self.timestamp())
            .field("index", &self.index())
            .field("weather_index", &self.weather_index())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BatchSlice – Python-style slice over batches
// ---------------------------------------------------------------------------

/// `start:stop:step` with optional signed bounds. Negative bounds count from
/// the end, out-of-range bounds clamp, a negative step walks backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSlice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: isize,
}

impl BatchSlice {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self { start, stop, step }
    }

    /// Resolve against a sequence of `len` items.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>> {
        let step = self.step;
        if step == 0 {
            return Err(DatasetError::ZeroStep);
        }
        let len = len as isize;
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
        let resolve = |bound: Option<isize>, default: isize| match bound {
            None => default,
            Some(b) if b < 0 => (b + len).max(lower),
            Some(b) => b.min(upper),
        };
        let (start, stop) = if step > 0 {
            (resolve(self.start, lower), resolve(self.stop, upper))
        } else {
            (resolve(self.start, upper), resolve(self.stop, lower))
        };

        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(out)
    }
}

/// Bounds past `isize::MAX` clamp like any other out-of-range bound.
fn saturating_bound(bound: usize) -> isize {
    isize::try_from(bound).unwrap_or(isize::MAX)
}

impl From<Range<usize>> for BatchSlice {
    fn from(r: Range<usize>) -> Self {
        Self::new(Some(saturating_bound(r.start)), Some(saturating_bound(r.end)), 1)
    }
}

impl From<RangeFrom<usize>> for BatchSlice {
    fn from(r: RangeFrom<usize>) -> Self {
        Self::new(Some(saturating_bound(r.start)), None, 1)
    }
}

impl From<RangeTo<usize>> for BatchSlice {
    fn from(r: RangeTo<usize>) -> Self {
        Self::new(None, Some(saturating_bound(r.end)), 1)
    }
}

impl From<RangeFull> for BatchSlice {
    fn from(_: RangeFull) -> Self {
        Self::new(None, None, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(start: Option<isize>, stop: Option<isize>, step: isize, len: usize) -> Vec<usize> {
        BatchSlice::new(start, stop, step).indices(len).unwrap()
    }

    #[test]
    fn forward_slices() {
        assert_eq!(resolve(None, None, 1, 4), vec![0, 1, 2, 3]);
        assert_eq!(resolve(Some(1), Some(3), 1, 4), vec![1, 2]);
        assert_eq!(resolve(None, None, 2, 5), vec![0, 2, 4]);
    }

    #[test]
    fn negative_bounds_count_from_end() {
        assert_eq!(resolve(Some(-2), None, 1, 4), vec![2, 3]);
        assert_eq!(resolve(None, Some(-1), 1, 4), vec![0, 1, 2]);
    }

    #[test]
    fn bounds_clamp() {
        assert_eq!(resolve(Some(-10), Some(10), 1, 3), vec![0, 1, 2]);
        assert_eq!(resolve(Some(5), None, 1, 3), Vec::<usize>::new());
        assert_eq!(resolve(Some(2), Some(1), 1, 3), Vec::<usize>::new());
    }

    #[test]
    fn reverse_slices() {
        assert_eq!(resolve(None, None, -1, 4), vec![3, 2, 1, 0]);
        assert_eq!(resolve(Some(10), Some(0), -2, 5), vec![4, 2]);
        assert_eq!(resolve(Some(-1), Some(-10), -1, 3), vec![2, 1, 0]);
        assert_eq!(resolve(None, None, -1, 0), Vec::<usize>::new());
    }

    #[test]
    fn zero_step_is_an_error() {
        assert_eq!(
            BatchSlice::new(None, None, 0).indices(3),
            Err(DatasetError::ZeroStep)
        );
    }

    #[test]
    fn std_ranges_convert() {
        assert_eq!(BatchSlice::from(1usize..3).indices(5).unwrap(), vec![1, 2]);
        assert_eq!(BatchSlice::from(3usize..).indices(5).unwrap(), vec![3, 4]);
        assert_eq!(BatchSlice::from(..2usize).indices(5).unwrap(), vec![0, 1]);
        assert_eq!(BatchSlice::from(..).indices(2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn huge_range_bounds_clamp() {
        assert_eq!(
            BatchSlice::from(0usize..usize::MAX).indices(4).unwrap(),
            vec![0, 1, 2, 3]
        );
        assert!(BatchSlice::from(usize::MAX..).indices(4).unwrap().is_empty());
        assert_eq!(BatchSlice::from(..usize::MAX).indices(2).unwrap(), vec![0, 1]);
        assert_eq!(BatchSlice::from(1usize..usize::MAX).start, Some(1));
    }
}
