//! This module provides the main entry point for extracting trend data from
//! a BMS API. A [`TrendPull`] client owns the HTTP connection and
//! credentials; [`TrendPull::extract`] runs the whole pipeline: resolve the
//! sensor catalog, plan the fetch windows, drain them under a bounded worker
//! pool, merge the staged results into one wide table, and optionally write
//! it to disk.

use crate::catalog::resolver::resolve_catalog;
use crate::config::{
    Credentials, NaMode, Staging, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::error::TrendPullError;
use crate::extraction::coordinator::run_windows;
use crate::extraction::fetcher::WindowFetcher;
use crate::extraction::merge::merge_staged;
use crate::extraction::planner::plan_windows;
use crate::extraction::stage::StageSink;
use crate::output::write_wide_csv;
use crate::types::sensor::SensorSpec;
use crate::types::window::TimeWindow;
use bon::bon;
use chrono::{Duration, NaiveDateTime};
use log::{info, warn};
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;

/// What an extraction run did: per-phase window counts, the shape of the
/// merged table, and the table itself.
#[derive(Debug)]
pub struct ExtractionReport {
    /// The merged wide table (`time` column plus one column per sensor).
    pub frame: DataFrame,
    pub windows_planned: usize,
    pub windows_staged: usize,
    pub windows_empty: usize,
    pub windows_failed: usize,
    /// Rows in the merged table after NA filtering.
    pub rows: usize,
    /// Sensor columns in the merged table (the time column not counted).
    pub columns: usize,
    /// Where the table was written, when an output path was given.
    pub output_path: Option<PathBuf>,
}

/// The client for extracting wide-format sensor tables from a BMS trend-data
/// API.
///
/// Create one with [`TrendPull::builder()`], then call
/// [`extract()`](TrendPull::extract) per run. The client holds the HTTP
/// connection pool (with a per-request timeout), the credentials used for
/// both endpoints, and the API base URL.
///
/// # Examples
///
/// ```no_run
/// use chrono::NaiveDate;
/// use trendpull::{Credentials, SensorSpec, TrendPull, TrendPullError};
///
/// # async fn run() -> Result<(), TrendPullError> {
/// let client = TrendPull::builder()
///     .credentials(Credentials::from_env()?)
///     .build()?;
///
/// let report = client
///     .extract()
///     .sensors(vec![SensorSpec::new("TMV23/1-2.602", "RT101")])
///     .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(4, 0, 0).unwrap())
///     .end(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(4, 0, 0).unwrap())
///     .output_path("SAVED_LOGS/TMV23_2024_01.csv")
///     .call()
///     .await?;
///
/// println!("{} rows x {} sensors", report.rows, report.columns);
/// # Ok(())
/// # }
/// ```
pub struct TrendPull {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

#[bon]
impl TrendPull {
    /// Builds a client.
    ///
    /// # Arguments
    ///
    /// * `.credentials(Credentials)`: **Required.** Basic-auth credentials
    ///   for the metadata and trend-data endpoints.
    /// * `.base_url(String)`: Optional. API root; defaults to
    ///   [`DEFAULT_BASE_URL`].
    /// * `.request_timeout(std::time::Duration)`: Optional. Per-request
    ///   timeout applied to every API call; defaults to 30 s. A timed-out
    ///   window fetch fails that window only, never the whole run.
    ///
    /// # Errors
    ///
    /// Returns [`TrendPullError::HttpClient`] if the underlying HTTP client
    /// cannot be constructed.
    #[builder]
    pub fn new(
        credentials: Credentials,
        #[builder(into)] base_url: Option<String>,
        request_timeout: Option<std::time::Duration>,
    ) -> Result<Self, TrendPullError> {
        let timeout = request_timeout
            .unwrap_or(std::time::Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TrendPullError::HttpClient)?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            credentials,
        })
    }

    /// Runs one extraction over `[start, end)`.
    ///
    /// The range is split into fixed-width windows, fetched concurrently,
    /// staged per window, and merged into one table with a row per distinct
    /// minute-normalized timestamp and a column per resolved sensor.
    /// Individual window failures are logged and counted, not fatal; the
    /// merge runs over whatever succeeded.
    ///
    /// # Arguments
    ///
    /// * `.sensors(Vec<SensorSpec>)`: **Required.** The manifest entries to
    ///   extract, e.g. from [`crate::read_manifest`].
    /// * `.start(NaiveDateTime)` / `.end(NaiveDateTime)`: **Required.**
    ///   Absolute bounds of the extraction, half-open. `start >= end` yields
    ///   an empty table without error.
    /// * `.window(chrono::Duration)`: Optional. Window width; defaults to
    ///   10 hours. Must be positive.
    /// * `.concurrency(usize)`: Optional. Worker-pool size; defaults to 8.
    ///   Must be at least 1.
    /// * `.na_mode(NaMode)`: Optional. Row-drop policy, defaults to
    ///   [`NaMode::All`] (drop rows that are entirely empty).
    /// * `.staging(Staging)`: Optional. Defaults to [`Staging::Disk`]
    ///   (per-window Parquet files in a scratch directory that is removed
    ///   when the run ends).
    /// * `.output_path(PathBuf)`: Optional. When set, the merged table is
    ///   written there as CSV.
    ///
    /// # Errors
    ///
    /// * [`TrendPullError::Catalog`] if the metadata query fails — nothing
    ///   is fetched in that case.
    /// * [`TrendPullError::EmptyCatalog`] if no sensor resolved; an
    ///   id-less trend-data query would pull the whole building.
    /// * [`TrendPullError::NoSuccessfulWindows`] if every planned window
    ///   failed; no output is written.
    /// * [`TrendPullError::Extract`] / [`TrendPullError::Output`] for stage,
    ///   merge, or write failures.
    #[builder]
    pub async fn extract(
        &self,
        sensors: Vec<SensorSpec>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        window: Option<Duration>,
        concurrency: Option<usize>,
        na_mode: Option<NaMode>,
        staging: Option<Staging>,
        #[builder(into)] output_path: Option<PathBuf>,
    ) -> Result<ExtractionReport, TrendPullError> {
        let window = window.unwrap_or_else(|| Duration::hours(10));
        if window <= Duration::zero() {
            return Err(TrendPullError::InvalidWindowDuration(window));
        }
        let concurrency = concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(TrendPullError::InvalidConcurrency);
        }
        let na_mode = na_mode.unwrap_or_default();
        let staging = staging.unwrap_or_default();

        let catalog =
            resolve_catalog(&self.http, &self.base_url, &self.credentials, &sensors).await?;
        if catalog.is_empty() {
            return Err(TrendPullError::EmptyCatalog);
        }

        let windows: Vec<TimeWindow> = plan_windows(start, end, window).collect();
        if windows.is_empty() {
            info!("Empty time range {} .. {}, nothing to fetch", start, end);
            return self
                .finish_run(DataFrame::default(), 0, 0, 0, 0, output_path)
                .await;
        }
        info!(
            "Planned {} windows of {} min over {} .. {}",
            windows.len(),
            window.num_minutes(),
            start,
            end
        );

        let sink = match staging {
            Staging::Memory => StageSink::memory(),
            Staging::Disk => StageSink::disk()?,
        };
        let fetcher = WindowFetcher::new(
            self.http.clone(),
            &self.base_url,
            self.credentials.clone(),
            Arc::new(catalog),
        );

        let report = run_windows(&sink, windows, concurrency, |w| fetcher.fetch_window(w)).await;
        if report.succeeded() == 0 {
            return Err(TrendPullError::NoSuccessfulWindows {
                attempted: report.attempted(),
            });
        }
        if report.failed() > 0 {
            warn!(
                "{} of {} windows failed and are excluded from the merge",
                report.failed(),
                report.attempted()
            );
        }

        let frame = merge_staged(&sink, &report.staged_handles(), na_mode).await?;
        self.finish_run(
            frame,
            report.attempted(),
            report.staged(),
            report.empty(),
            report.failed(),
            output_path,
        )
        .await
    }

    async fn finish_run(
        &self,
        frame: DataFrame,
        windows_planned: usize,
        windows_staged: usize,
        windows_empty: usize,
        windows_failed: usize,
        output_path: Option<PathBuf>,
    ) -> Result<ExtractionReport, TrendPullError> {
        let rows = frame.height();
        let columns = frame.width().saturating_sub(1);
        info!(
            "Merged table: {} rows x {} sensor columns ({} windows: {} staged, {} empty, {} failed)",
            rows, columns, windows_planned, windows_staged, windows_empty, windows_failed
        );

        let frame = if let Some(path) = &output_path {
            let target = path.clone();
            let mut frame = frame;
            let (frame, write_result) = task::spawn_blocking(move || {
                let result = write_wide_csv(&mut frame, &target);
                (frame, result)
            })
            .await
            .map_err(crate::extraction::error::ExtractError::from)?;
            write_result?;
            info!("Wrote output to {}", path.display());
            frame
        } else {
            frame
        };

        Ok(ExtractionReport {
            frame,
            windows_planned,
            windows_staged,
            windows_empty,
            windows_failed,
            rows,
            columns,
            output_path,
        })
    }
}
