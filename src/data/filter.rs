use std::ops::Range;

// ---------------------------------------------------------------------------
// RetentionMask: which rows of a set of parallel arrays survive
// ---------------------------------------------------------------------------

/// Boolean keep/drop flags over a set of parallel arrays. Built once, then
/// applied to every array so they stay aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionMask {
    keep: Vec<bool>,
}

impl RetentionMask {
    pub fn from_predicate(len: usize, mut keep: impl FnMut(usize) -> bool) -> Self {
        Self {
            keep: (0..len).map(&mut keep).collect(),
        }
    }

    /// Keep the members of every range holding at least `min_len` rows.
    /// `ranges` must partition `0..len`.
    pub fn from_ranges(len: usize, ranges: &[Range<usize>], min_len: usize) -> Self {
        let mut keep = vec![false; len];
        for r in ranges.iter().filter(|r| r.len() >= min_len) {
            keep[r.clone()].fill(true);
        }
        Self { keep }
    }

    pub fn len(&self) -> usize {
        self.keep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keep.is_empty()
    }

    pub fn retained(&self) -> usize {
        self.keep.iter().filter(|k| **k).count()
    }

    pub fn dropped(&self) -> usize {
        self.len() - self.retained()
    }

    /// Indices of the rows that survive.
    pub fn retained_indices(&self) -> Vec<usize> {
        self.keep
            .iter()
            .enumerate()
            .filter(|(_, k)| **k)
            .map(|(i, _)| i)
            .collect()
    }

    /// Drop masked-out rows from `values` in a single pass.
    ///
    /// `values` must have the mask's length.
    pub fn compact<T>(&self, values: Vec<T>) -> Vec<T> {
        debug_assert_eq!(values.len(), self.keep.len());
        values
            .into_iter()
            .zip(&self.keep)
            .filter(|(_, k)| **k)
            .map(|(v, _)| v)
            .collect()
    }

    /// [`compact`](Self::compact) for an optional stream.
    pub fn compact_opt<T>(&self, values: Option<Vec<T>>) -> Option<Vec<T>> {
        values.map(|v| self.compact(v))
    }
}

/// Drop ranges shorter than `min_len` and lay the survivors out back to back,
/// matching arrays compacted with [`RetentionMask::from_ranges`].
pub fn compact_ranges(ranges: &[Range<usize>], min_len: usize) -> Vec<Range<usize>> {
    let mut offset = 0;
    ranges
        .iter()
        .filter(|r| r.len() >= min_len)
        .map(|r| {
            let start = offset;
            offset += r.len();
            start..offset
        })
        .collect()
}
