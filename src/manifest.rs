//! Reads the sensor manifest: a tabular file naming each sensor's location
//! and variable name. One read at startup; the rest of the run works from
//! the resulting `SensorSpec` list.

use crate::types::sensor::SensorSpec;
use log::warn;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column headers used by the original log-map sheets; override them for
/// manifests with different layouts.
pub const DEFAULT_LOCATION_COLUMN: &str = "Log_variable_location";
pub const DEFAULT_NAME_COLUMN: &str = "Logged_variable_name";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest '{0}'")]
    Read(PathBuf, #[source] PolarsError),

    #[error("Manifest '{path}' is missing required column '{column}'")]
    MissingColumn {
        path: PathBuf,
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Reads a CSV manifest into sensor specs, preserving row order.
///
/// Rows with an empty location or name cell are skipped with a warning;
/// they cannot form a valid metadata path.
///
/// # Examples
///
/// ```no_run
/// # use trendpull::{read_manifest, ManifestError};
/// # async fn run() -> Result<(), ManifestError> {
/// let sensors = read_manifest()
///     .path("log_maps/Log_map_TMV23.csv")
///     .call()
///     .await?;
/// println!("{} sensors in manifest", sensors.len());
/// # Ok(())
/// # }
/// ```
#[bon::builder]
pub async fn read_manifest(
    #[builder(into)] path: PathBuf,
    location_column: Option<&str>,
    name_column: Option<&str>,
) -> Result<Vec<SensorSpec>, ManifestError> {
    let location_column = location_column.unwrap_or(DEFAULT_LOCATION_COLUMN).to_string();
    let name_column = name_column.unwrap_or(DEFAULT_NAME_COLUMN).to_string();

    tokio::task::spawn_blocking(move || {
        read_manifest_blocking(&path, &location_column, &name_column)
    })
    .await?
}

fn read_manifest_blocking(
    path: &Path,
    location_column: &str,
    name_column: &str,
) -> Result<Vec<SensorSpec>, ManifestError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| ManifestError::Read(path.to_path_buf(), e))?
        .finish()
        .map_err(|e| ManifestError::Read(path.to_path_buf(), e))?;

    let column = |name: &str| -> Result<StringChunked, ManifestError> {
        df.column(name)
            .map_err(|e| ManifestError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
                source: e,
            })?
            // Room identifiers can parse as numbers; normalize to strings.
            .cast(&DataType::String)
            .map_err(|e| ManifestError::Read(path.to_path_buf(), e))?
            .str()
            .map_err(|e| ManifestError::Read(path.to_path_buf(), e))
            .cloned()
    };
    let locations = column(location_column)?;
    let names = column(name_column)?;

    let mut specs = Vec::with_capacity(df.height());
    for (row, (location, name)) in locations.into_iter().zip(names.into_iter()).enumerate() {
        match (location, name) {
            (Some(location), Some(name)) => specs.push(SensorSpec::new(location, name)),
            _ => warn!("manifest row {} has an empty cell, skipped", row),
        }
    }
    Ok(specs)
}
