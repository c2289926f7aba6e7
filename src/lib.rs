//! Aligns particulate-matter/GPS readings, an optional weather series and
//! optional calendar features into batches of snapshots for sequence models.
//!
//! ```no_run
//! use std::path::Path;
//! use pm_snapshots::{
//!     load_sensor_file, load_weather_file, one_hot_calendar, Dataset, DatasetConfig,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let sensors = load_sensor_file(Path::new("sensors.parquet"))?;
//! let weather = load_weather_file(Path::new("weather.csv"))?;
//! let config = DatasetConfig::new(15).with_minutes_to_weather(30);
//!
//! let dataset = Dataset::builder(sensors, config)
//!     .weather(weather)
//!     .calendar(one_hot_calendar)
//!     .build()?;
//!
//! for batch in dataset.batches() {
//!     for snapshot in batch.snapshots() {
//!         println!("{} {:?}", snapshot.timestamp(), snapshot.weather());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;

pub use config::DatasetConfig;
pub use data::calendar::{one_hot_calendar, CalendarFn, CALENDAR_WIDTH};
pub use data::dataset::{Dataset, DatasetBuilder, DatasetSummary};
pub use data::loader::{load_sensor_file, load_weather_file};
pub use data::model::{Position, Reading, SensorTable, SnapshotIndex, WeatherTable};
pub use data::view::{Batch, BatchSlice, Snapshot};
pub use error::DatasetError;
