//! Writes `sample_sensors.parquet` and `sample_weather.csv`: a few sensor
//! trips with stationary stretches and gaps, plus a half-hourly weather
//! series.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct SensorRows {
    timestamps: Vec<NaiveDateTime>,
    pm: Vec<f64>,
    lon: Vec<f64>,
    lat: Vec<f64>,
}

/// Simulate trips of `(start offset in hours, duration in minutes)`.
fn simulate_trips(trips: &[(i64, i64)], origin: NaiveDateTime, rng: &mut SimpleRng) -> SensorRows {
    let mut rows = SensorRows {
        timestamps: Vec::new(),
        pm: Vec::new(),
        lon: Vec::new(),
        lat: Vec::new(),
    };

    for &(start_hours, minutes) in trips {
        let mut ts = origin + TimeDelta::hours(start_hours);
        let end = ts + TimeDelta::minutes(minutes);
        let (mut lon, mut lat) = (4.35, 50.85);
        let mut level = rng.uniform(5.0, 40.0);

        while ts < end {
            // Roughly one stop in four: the sensor sits still and repeats its position.
            let stationary = rng.next_f64() < 0.25;
            if !stationary {
                lon += rng.gauss(0.0, 0.0008);
                lat += rng.gauss(0.0, 0.0005);
            }
            level = (level + rng.gauss(0.0, 1.5)).max(0.5);

            rows.timestamps.push(ts);
            rows.pm.push(level);
            rows.lon.push(lon);
            rows.lat.push(lat);

            ts += TimeDelta::seconds(rng.uniform(20.0, 90.0) as i64);
        }
    }
    rows
}

fn write_sensors(path: &str, rows: &SensorRows) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("timestamp", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new("pm", DataType::Float64, false),
        Field::new("lon", DataType::Float64, false),
        Field::new("lat", DataType::Float64, false),
    ]));

    let millis: Vec<i64> = rows
        .timestamps
        .iter()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(TimestampMillisecondArray::from(millis)),
            Arc::new(Float64Array::from(rows.pm.clone())),
            Arc::new(Float64Array::from(rows.lon.clone())),
            Arc::new(Float64Array::from(rows.lat.clone())),
        ],
    )
    .context("creating record batch")?;

    let file = std::fs::File::create(path).context("creating sensor output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_weather(
    path: &str,
    origin: NaiveDateTime,
    hours: i64,
    rng: &mut SimpleRng,
) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path).context("creating weather output file")?;
    writer.write_record(["timestamp", "temperature", "humidity", "wind_speed"])?;

    let mut temperature = 8.0;
    let mut rows = 0;
    for half_hour in 0..hours * 2 {
        // Missing observations, as in scraped archives.
        if rng.next_f64() < 0.1 {
            continue;
        }
        let ts = origin + TimeDelta::minutes(30 * half_hour);
        temperature += rng.gauss(0.0, 0.4);
        writer.write_record([
            ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{temperature:.1}"),
            format!("{:.0}", rng.uniform(55.0, 95.0)),
            format!("{:.1}", rng.uniform(0.0, 9.0)),
        ])?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let origin = NaiveDate::from_ymd_opt(2023, 3, 1)
        .and_then(|d| d.and_hms_opt(7, 0, 0))
        .context("invalid origin date")?;

    // Commutes on three days plus one short errand that ends up a unit batch.
    let trips = [(0, 75), (10, 60), (24, 90), (34, 10), (48, 80), (58, 65)];
    let rows = simulate_trips(&trips, origin, &mut rng);

    let sensor_path = "sample_sensors.parquet";
    write_sensors(sensor_path, &rows)?;
    let weather_path = "sample_weather.csv";
    let weather_rows = write_weather(weather_path, origin, 72, &mut rng)?;

    println!(
        "Wrote {} readings to {sensor_path} and {weather_rows} weather rows to {weather_path}",
        rows.timestamps.len()
    );
    Ok(())
}
