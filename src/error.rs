use thiserror::Error;

/// Result alias used by the alignment engine.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors raised while building or indexing a [`Dataset`](crate::data::dataset::Dataset).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("index {idx} out of bounds for length {len}")]
    IndexOutOfBounds { idx: usize, len: usize },

    #[error("slice step cannot be zero")]
    ZeroStep,

    #[error("weather table supplied but `minutes_to_weather` is not set")]
    MissingWeatherTolerance,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("weather row {row} has {got} values, expected {expected}")]
    WeatherWidth {
        row: usize,
        got: usize,
        expected: usize,
    },
}
