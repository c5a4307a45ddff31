use crate::catalog::error::CatalogError;
use crate::config::ConfigError;
use crate::extraction::error::ExtractError;
use crate::manifest::ManifestError;
use crate::output::OutputError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrendPullError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Window duration must be positive, got {0}")]
    InvalidWindowDuration(chrono::Duration),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("No manifest sensor matched the upstream catalog; nothing to extract")]
    EmptyCatalog,

    #[error("All {attempted} fetch windows failed; no output written")]
    NoSuccessfulWindows { attempted: usize },
}
