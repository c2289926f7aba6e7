use chrono::NaiveDateTime;

use super::filter::RetentionMask;

/// The weather reading closest to a snapshot timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherMatch {
    /// Index into the weather table.
    pub index: usize,
    /// Absolute distance in milliseconds.
    pub distance_ms: i64,
}

impl WeatherMatch {
    pub fn within(&self, tolerance_minutes: u32) -> bool {
        self.distance_ms <= i64::from(tolerance_minutes) * 60_000
    }
}

fn distance_ms(a: NaiveDateTime, b: NaiveDateTime) -> i64 {
    (a - b).num_milliseconds().abs()
}

/// Find the weather timestamp closest to `ts` by binary search.
///
/// `weather` must be sorted. When `ts` is equidistant from two readings the
/// earlier one wins. Returns `None` for an empty series.
pub fn nearest_weather(weather: &[NaiveDateTime], ts: NaiveDateTime) -> Option<WeatherMatch> {
    let insert = weather.partition_point(|w| *w < ts);
    let right = weather.get(insert).map(|w| WeatherMatch {
        index: insert,
        distance_ms: distance_ms(*w, ts),
    });
    let left = insert.checked_sub(1).map(|i| WeatherMatch {
        index: i,
        distance_ms: distance_ms(weather[i], ts),
    });
    match (left, right) {
        (Some(l), Some(r)) if r.distance_ms < l.distance_ms => Some(r),
        (Some(l), _) => Some(l),
        (None, r) => r,
    }
}

/// Match every snapshot timestamp against the weather series.
pub fn match_snapshots(
    weather: &[NaiveDateTime],
    snapshots: &[NaiveDateTime],
) -> Vec<Option<WeatherMatch>> {
    snapshots
        .iter()
        .map(|ts| nearest_weather(weather, *ts))
        .collect()
}

/// Accept matches within `tolerance_minutes`.
///
/// Returns the mask of surviving snapshots and, for each survivor, its
/// weather index.
pub fn gate(
    matches: &[Option<WeatherMatch>],
    tolerance_minutes: u32,
) -> (RetentionMask, Vec<usize>) {
    let mask = RetentionMask::from_predicate(matches.len(), |i| {
        matches[i].is_some_and(|m| m.within(tolerance_minutes))
    });
    let indices = matches
        .iter()
        .filter_map(|m| m.filter(|m| m.within(tolerance_minutes)))
        .map(|m| m.index)
        .collect();
    (mask, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn picks_closest_neighbour() {
        let weather = [at(10, 0), at(10, 30)];
        let m = nearest_weather(&weather, at(10, 20)).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.distance_ms, 10 * 60_000);
        assert!(m.within(15));
        assert!(!m.within(5));
    }

    #[test]
    fn tolerance_is_inclusive() {
        let weather = [at(10, 0), at(10, 30)];
        let m = nearest_weather(&weather, at(10, 20)).unwrap();
        assert!(m.within(10));
        assert!(!m.within(9));

        let (mask, idx) = gate(&[Some(m)], 10);
        assert_eq!(mask.retained(), 1);
        assert_eq!(idx, vec![1]);
    }

    #[test]
    fn tie_prefers_earlier_reading() {
        let weather = [at(10, 0), at(10, 30)];
        assert_eq!(nearest_weather(&weather, at(10, 15)).unwrap().index, 0);
    }

    #[test]
    fn clamps_at_both_ends() {
        let weather = [at(10, 0), at(10, 30)];
        assert_eq!(nearest_weather(&weather, at(9, 0)).unwrap().index, 0);
        assert_eq!(nearest_weather(&weather, at(12, 0)).unwrap().index, 1);
        assert_eq!(nearest_weather(&weather, at(10, 30)).unwrap().distance_ms, 0);
    }

    #[test]
    fn empty_weather_never_matches() {
        assert_eq!(nearest_weather(&[], at(10, 0)), None);
        let (mask, idx) = gate(&match_snapshots(&[], &[at(10, 0), at(11, 0)]), 60);
        assert_eq!(mask.retained(), 0);
        assert!(idx.is_empty());
    }

    #[test]
    fn gating_keeps_masks_and_indices_aligned() {
        let weather = [at(10, 0), at(10, 30), at(12, 0)];
        let snapshots = [at(10, 20), at(11, 15), at(12, 3)];
        let matches = match_snapshots(&weather, &snapshots);
        let (mask, idx) = gate(&matches, 15);
        assert_eq!(mask.retained_indices(), vec![0, 2]);
        assert_eq!(idx, vec![1, 2]);
        assert_eq!(mask.retained(), idx.len());

        let (mask, idx) = gate(&matches, 5);
        assert_eq!(mask.retained_indices(), vec![2]);
        assert_eq!(idx, vec![2]);
    }
}
