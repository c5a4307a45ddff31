mod catalog;
mod config;
mod error;
mod extraction;
mod manifest;
mod output;
mod trendpull;
mod types;

pub use error::TrendPullError;
pub use trendpull::*;

pub use config::{
    Credentials, NaMode, Staging, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

pub use catalog::resolver::{resolve_catalog, MetadataRecord, SensorCatalog};
pub use extraction::coordinator::{run_windows, FetchReport, WindowOutcome};
pub use extraction::merge::merge_staged;
pub use extraction::planner::{plan_windows, WindowPlan};
pub use extraction::stage::{StageHandle, StageSink};
pub use manifest::{read_manifest, DEFAULT_LOCATION_COLUMN, DEFAULT_NAME_COLUMN};

pub use types::record::{LongRecord, RawSample};
pub use types::sensor::{ResolvedSensor, SensorId, SensorSpec};
pub use types::window::TimeWindow;

pub use catalog::error::CatalogError;
pub use config::ConfigError;
pub use extraction::error::ExtractError;
pub use extraction::fetcher::WindowFetcher;
pub use manifest::ManifestError;
pub use output::{write_wide_csv, OutputError};
