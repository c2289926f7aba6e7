/// Data layer: table types, loading, and the alignment pipeline.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files → SensorTable, WeatherTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    dedup      │  floor timestamps, average co-located readings
///   └──────────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   segment     │  readings → snapshots
///   └──────────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   weather     │  nearest match + gating (optional)
///   └──────────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   segment     │  snapshots → batches, unit batches pruned via filter
///   └──────────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   Dataset     │  backing arrays + index arrays, Batch / Snapshot views
///   └──────────────┘
/// ```

pub mod calendar;
pub mod dataset;
pub mod dedup;
pub mod filter;
pub mod loader;
pub mod model;
pub mod segment;
pub mod view;
pub mod weather;
