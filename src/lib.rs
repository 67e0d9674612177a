//! sensorcharts - embedded time-series storage for device sensor charts
//!
//! Devices push up to four numeric measurements per sample; each device's
//! layout is fixed on its first write and its samples live in the sample
//! table matching that width. Range queries are averaged down when the
//! result would exceed a byte budget.

pub mod config;
pub mod db;
pub mod downsample;
pub mod error;
pub mod events;
pub mod ingest;
pub mod ingestion;
pub mod query;
pub mod registry;
pub mod retention;
pub mod sqlite_pragma;
pub mod store;
pub mod types;

pub use config::ChartsConfig;
pub use error::{ChartsError, Result, SchemaConflict};
pub use events::{ChartValuesProvider, DispatchOutcome, EventDispatcher, HostEvent, JsonChartValues};
pub use ingestion::{start_event_ingestion, IngestionStats};
pub use query::{DataPoint, OutputFormat, QueryData, QueryOptions, QueryResult, Series, SortOrder};
pub use retention::DeviceDeletion;
pub use store::ChartStore;
pub use types::{DeviceSchema, MeasurementValue, Sample, Width};
