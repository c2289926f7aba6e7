use chrono::{Datelike, NaiveDateTime, Timelike};

/// Maps a snapshot timestamp to a calendar feature vector. Applied once per
/// retained snapshot.
pub type CalendarFn = Box<dyn Fn(NaiveDateTime) -> Vec<f64> + Send + Sync>;

const MONTHS: usize = 12;
const WEEKDAYS: usize = 7;
const HOURS: usize = 24;

/// Length of the vector produced by [`one_hot_calendar`].
pub const CALENDAR_WIDTH: usize = MONTHS + WEEKDAYS + HOURS;

/// Month, weekday (Monday first) and hour of day, one-hot encoded and
/// concatenated.
pub fn one_hot_calendar(ts: NaiveDateTime) -> Vec<f64> {
    let mut features = vec![0.0; CALENDAR_WIDTH];
    features[ts.month0() as usize] = 1.0;
    features[MONTHS + ts.weekday().num_days_from_monday() as usize] = 1.0;
    features[MONTHS + WEEKDAYS + ts.hour() as usize] = 1.0;
    features
}
