//! Writes the merged wide table to its destination as CSV: one row per
//! timestamp, one column per sensor, blank cells for missing readings.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Matches the timestamp format of the original extraction dumps.
const CSV_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to create output file '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to write output file '{0}'")]
    Csv(PathBuf, #[source] PolarsError),
}

/// Writes `frame` to `path`, creating parent directories as needed.
pub fn write_wide_csv(frame: &mut DataFrame, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OutputError::Io(path.to_path_buf(), e))?;
    }
    let mut file =
        std::fs::File::create(path).map_err(|e| OutputError::Io(path.to_path_buf(), e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_datetime_format(Some(CSV_DATETIME_FORMAT.to_string()))
        .finish(frame)
        .map_err(|e| OutputError::Csv(path.to_path_buf(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn writes_header_and_formatted_timestamps() -> Result<(), OutputError> {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        let mut df = DataFrame::new(vec![
            Int64Chunked::from_vec("time".into(), vec![ts])
                .into_datetime(TimeUnit::Milliseconds, None)
                .into_column(),
            Column::new("B/roomA/temp".into(), vec![21.5f64]),
        ])
        .expect("build frame");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join("wide.csv");
        write_wide_csv(&mut df, &path)?;

        let written = std::fs::read_to_string(&path).expect("read back");
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("time,B/roomA/temp"));
        assert_eq!(lines.next(), Some("2024-01-01 10:00:00,21.5"));
        Ok(())
    }
}
