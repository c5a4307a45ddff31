//! Runs window fetches under a bounded worker pool and tracks a per-window
//! outcome, so one bad window never takes down its siblings.

use crate::extraction::error::ExtractError;
use crate::extraction::stage::{StageHandle, StageSink};
use crate::types::record::LongRecord;
use crate::types::window::TimeWindow;
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::future::Future;

/// What became of one dispatched window.
#[derive(Debug)]
pub enum WindowOutcome {
    /// Fetched and published to the stage sink.
    Staged {
        window: TimeWindow,
        handle: StageHandle,
        records: usize,
    },
    /// Fetched successfully but the window held no data.
    Empty { window: TimeWindow },
    /// The fetch or the stage write failed; the error stays contained here.
    Failed {
        window: TimeWindow,
        error: ExtractError,
    },
}

/// All outcomes of a fetch phase, in completion order.
#[derive(Debug)]
pub struct FetchReport {
    pub outcomes: Vec<WindowOutcome>,
}

impl FetchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn staged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, WindowOutcome::Staged { .. }))
            .count()
    }

    pub fn empty(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, WindowOutcome::Empty { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, WindowOutcome::Failed { .. }))
            .count()
    }

    /// Windows that completed, whether or not they held data.
    pub fn succeeded(&self) -> usize {
        self.attempted() - self.failed()
    }

    /// Handles of every staged window, ascending by window index, ready for
    /// the merge.
    pub fn staged_handles(&self) -> Vec<StageHandle> {
        let mut handles: Vec<StageHandle> = self
            .outcomes
            .iter()
            .filter_map(|o| match o {
                WindowOutcome::Staged { handle, .. } => Some(*handle),
                _ => None,
            })
            .collect();
        handles.sort();
        handles
    }
}

/// Drains one fetch task per window through a pool of at most `concurrency`
/// in-flight requests. Windows complete in arbitrary order; the returned
/// report covers every dispatched window. Worker errors are captured as
/// [`WindowOutcome::Failed`], never propagated.
pub async fn run_windows<F, Fut>(
    sink: &StageSink,
    windows: Vec<TimeWindow>,
    concurrency: usize,
    fetch: F,
) -> FetchReport
where
    F: Fn(TimeWindow) -> Fut,
    Fut: Future<Output = Result<Vec<LongRecord>, ExtractError>>,
{
    let total = windows.len();
    info!(
        "Fetching {} windows with up to {} in flight",
        total, concurrency
    );
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress.set_message("Fetching windows");

    let fetch = &fetch;
    let progress_ref = &progress;
    let outcomes: Vec<WindowOutcome> = stream::iter(windows)
        .map(|window| async move {
            let outcome = match fetch(window).await {
                Ok(records) if records.is_empty() => WindowOutcome::Empty { window },
                Ok(records) => {
                    let count = records.len();
                    match sink.put(window.index, &records).await {
                        Ok(handle) => WindowOutcome::Staged {
                            window,
                            handle,
                            records: count,
                        },
                        Err(error) => {
                            warn!("Failed to stage window {}: {}", window, error);
                            WindowOutcome::Failed { window, error }
                        }
                    }
                }
                Err(error) => {
                    warn!("Window {} failed: {}", window, error);
                    WindowOutcome::Failed { window, error }
                }
            };
            progress_ref.inc(1);
            outcome
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    progress.finish_with_message("Fetch phase complete");
    let report = FetchReport { outcomes };
    info!(
        "Fetch phase: {} staged, {} empty, {} failed of {} windows",
        report.staged(),
        report.empty(),
        report.failed(),
        report.attempted()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::planner::plan_windows;
    use chrono::{Duration, NaiveDate};

    fn windows(count: usize) -> Vec<TimeWindow> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        plan_windows(start, start + Duration::hours(count as i64), Duration::hours(1)).collect()
    }

    fn record_for(window: &TimeWindow) -> LongRecord {
        LongRecord {
            id: 1,
            source_name: "B/roomA/temp".to_string(),
            timestamp: window.start,
            timestamp_tz_info: String::new(),
            value: window.index as f64,
        }
    }

    #[tokio::test]
    async fn partial_failure_keeps_sibling_windows() {
        let sink = StageSink::memory();
        let report = run_windows(&sink, windows(5), 3, |window| async move {
            if window.index == 2 {
                Err(ExtractError::StageLayout {
                    index: window.index,
                    message: "simulated fetch failure".to_string(),
                })
            } else {
                Ok(vec![record_for(&window)])
            }
        })
        .await;

        assert_eq!(report.attempted(), 5);
        assert_eq!(report.staged(), 4);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 4);

        let staged: Vec<usize> = report
            .staged_handles()
            .iter()
            .map(|h| h.window_index())
            .collect();
        assert_eq!(staged, vec![0, 1, 3, 4]);
    }

    #[tokio::test]
    async fn empty_windows_are_successes_without_handles() {
        let sink = StageSink::memory();
        let report = run_windows(&sink, windows(3), 8, |window| async move {
            if window.index == 1 {
                Ok(Vec::new())
            } else {
                Ok(vec![record_for(&window)])
            }
        })
        .await;

        assert_eq!(report.staged(), 2);
        assert_eq!(report.empty(), 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.staged_handles().len(), 2);
    }

    #[tokio::test]
    async fn zero_windows_produce_an_empty_report() {
        let sink = StageSink::memory();
        let report = run_windows(&sink, Vec::new(), 8, |_| async { Ok(Vec::new()) }).await;
        assert_eq!(report.attempted(), 0);
        assert_eq!(report.staged_handles().len(), 0);
    }
}
