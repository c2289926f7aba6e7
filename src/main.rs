use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};

use pm_snapshots::{
    load_sensor_file, load_weather_file, one_hot_calendar, Dataset, DatasetConfig,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Align sensor, weather and calendar streams into batches of snapshots"
)]
struct Cli {
    /// Sensor readings (.csv, .json or .parquet) with timestamp, pm, lon, lat
    #[arg(value_hint = ValueHint::FilePath)]
    sensors: PathBuf,

    /// Weather table; every non-timestamp column becomes a feature
    #[arg(long, value_hint = ValueHint::FilePath)]
    weather: Option<PathBuf>,

    /// JSON config with snapshot_minutes / batch_minutes / minutes_to_weather
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Snapshot duration in minutes (overrides the config file)
    #[arg(long)]
    snapshot_minutes: Option<u32>,

    /// Gap in minutes that splits batches (defaults to the snapshot duration)
    #[arg(long)]
    batch_minutes: Option<u32>,

    /// Maximum distance in minutes to the matched weather reading
    #[arg(long)]
    minutes_to_weather: Option<u32>,

    /// Attach month / weekday / hour one-hot features
    #[arg(long)]
    calendar: bool,

    /// Print the summary as JSON instead of the batch table
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Config file values, overridden by flags. Falls back to 15 minute
    /// snapshots when neither sets a duration.
    fn dataset_config(&self) -> Result<DatasetConfig> {
        let mut config = match &self.config {
            Some(path) => DatasetConfig::from_json_file(path)?,
            None => DatasetConfig::new(15),
        };
        if let Some(minutes) = self.snapshot_minutes {
            config.snapshot_minutes = minutes;
        }
        if self.batch_minutes.is_some() {
            config.batch_minutes = self.batch_minutes;
        }
        if self.minutes_to_weather.is_some() {
            config.minutes_to_weather = self.minutes_to_weather;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.dataset_config()?;

    let sensors = load_sensor_file(&cli.sensors)?;
    let mut builder = Dataset::builder(sensors, config);
    if let Some(path) = &cli.weather {
        builder = builder.weather(load_weather_file(path)?);
    }
    if cli.calendar {
        builder = builder.calendar(one_hot_calendar);
    }
    let dataset = builder.build().context("building dataset")?;

    if cli.json {
        let summary = serde_json::to_string_pretty(&dataset.summary())?;
        println!("{summary}");
        return Ok(());
    }

    println!(
        "{:>6}  {:>9}  {:>8}  {:<19}  {:<19}",
        "batch", "snapshots", "readings", "start", "end"
    );
    for (i, batch) in dataset.batches().enumerate() {
        let readings: usize = batch.pm().iter().map(|pm| pm.len()).sum();
        let timestamps = batch.timestamps();
        let (Some(start), Some(end)) = (timestamps.first(), timestamps.last()) else {
            continue;
        };
        println!(
            "{i:>6}  {:>9}  {readings:>8}  {:<19}  {:<19}",
            batch.len(),
            start.format("%Y-%m-%d %H:%M:%S").to_string(),
            end.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
    }
    println!(
        "{} batches, {} snapshots, {} readings",
        dataset.len(),
        dataset.snapshot_count(),
        dataset.reading_count()
    );
    Ok(())
}
