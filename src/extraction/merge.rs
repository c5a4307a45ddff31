//! Merges staged windows into one wide, time-indexed table.
//!
//! Two streaming passes over the stage sink: the first discovers the set of
//! sensor names seen anywhere, the second builds one time series per sensor
//! and outer-joins it into a running accumulator. Every handle is re-read
//! once per sensor, trading repeated scans for never holding more than one
//! sensor's records plus the accumulator in memory.

use crate::config::NaMode;
use crate::extraction::error::ExtractError;
use crate::extraction::stage::{StageHandle, StageSink};
use log::info;
use polars::prelude::*;
use std::collections::HashSet;

const TIME_COL: &str = "time";

/// Builds the wide table from the given staged windows.
///
/// Handles are scanned in the order given; pass them ascending (as
/// [`crate::FetchReport::staged_handles`] returns them) so first-seen
/// de-duplication follows plan order. The result has a `time` column of
/// minute-normalized timestamps, unique and sorted ascending, plus one
/// column per sensor name seen across all windows. Rows are dropped
/// according to `na_mode`. Zero handles or zero records yield an empty
/// frame.
pub async fn merge_staged(
    sink: &StageSink,
    handles: &[StageHandle],
    na_mode: NaMode,
) -> Result<DataFrame, ExtractError> {
    // Pass 1: distinct sensor names, first-seen order.
    let mut names: Vec<String> = Vec::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    for &handle in handles {
        for record in sink.get(handle).await? {
            if seen_names.insert(record.source_name.clone()) {
                names.push(record.source_name);
            }
        }
    }
    if names.is_empty() {
        return Ok(DataFrame::default());
    }
    info!(
        "Merging {} sensors from {} staged windows",
        names.len(),
        handles.len()
    );

    // Pass 2: one series per sensor, outer-joined into the accumulator.
    let mut accumulator: Option<DataFrame> = None;
    for name in &names {
        let series = sensor_series(sink, handles, name).await?;
        let joined = match accumulator {
            None => series,
            Some(accum) => outer_join(accum, series)?,
        };
        accumulator = Some(apply_na_policy(joined, na_mode)?);
    }
    let merged = match accumulator {
        Some(df) => df,
        None => return Ok(DataFrame::default()),
    };

    // Residual duplicates cannot survive the per-sensor dedup plus the
    // joins, but the contract says first wins, so enforce it.
    let merged = merged.unique_stable(
        Some(&[TIME_COL.to_string()]),
        UniqueKeepStrategy::First,
        None,
    )?;
    let merged = merged.sort([TIME_COL], SortMultipleOptions::default())?;
    Ok(merged)
}

/// Scans every handle for one sensor's records and builds its single-column
/// series indexed by normalized timestamp. Duplicate timestamps: first
/// occurrence (in handle order) wins.
async fn sensor_series(
    sink: &StageSink,
    handles: &[StageHandle],
    name: &str,
) -> Result<DataFrame, ExtractError> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut times: Vec<i64> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for &handle in handles {
        for record in sink.get(handle).await? {
            if record.source_name != name {
                continue;
            }
            let millis = record.normalized_timestamp().and_utc().timestamp_millis();
            if seen.insert(millis) {
                times.push(millis);
                values.push(record.value);
            }
        }
    }

    let frame = DataFrame::new(vec![
        Int64Chunked::from_vec(TIME_COL.into(), times)
            .into_datetime(TimeUnit::Milliseconds, None)
            .into_column(),
        Column::new(name.into(), values),
    ])?;
    Ok(frame)
}

/// Full outer join on the time key; a timestamp present on either side
/// appears once in the result.
fn outer_join(left: DataFrame, right: DataFrame) -> Result<DataFrame, ExtractError> {
    let joined = left
        .lazy()
        .join(
            right.lazy(),
            [col(TIME_COL)],
            [col(TIME_COL)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .collect()?;
    Ok(joined)
}

fn apply_na_policy(df: DataFrame, na_mode: NaMode) -> Result<DataFrame, ExtractError> {
    let keep = match na_mode {
        NaMode::All => any_horizontal([col("*").exclude([TIME_COL]).is_not_null()])?,
        NaMode::Any => all_horizontal([col("*").exclude([TIME_COL]).is_not_null()])?,
    };
    Ok(df.lazy().filter(keep).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::LongRecord;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn record(name: &str, timestamp: NaiveDateTime, value: f64) -> LongRecord {
        LongRecord {
            id: 1,
            source_name: name.to_string(),
            timestamp,
            timestamp_tz_info: String::new(),
            value,
        }
    }

    async fn staged(windows: Vec<Vec<LongRecord>>) -> (StageSink, Vec<StageHandle>) {
        let sink = StageSink::memory();
        let mut handles = Vec::new();
        for (index, records) in windows.into_iter().enumerate() {
            if !records.is_empty() {
                handles.push(sink.put(index, &records).await.unwrap());
            }
        }
        (sink, handles)
    }

    fn cell(df: &DataFrame, column: &str, row: usize) -> Option<f64> {
        df.column(column).unwrap().f64().unwrap().get(row)
    }

    fn time_millis(df: &DataFrame) -> Vec<i64> {
        df.column(TIME_COL)
            .unwrap()
            .datetime()
            .unwrap()
            .into_iter()
            .map(|t| t.unwrap())
            .collect()
    }

    #[tokio::test]
    async fn two_window_scenario_all_mode() {
        let (sink, handles) = staged(vec![
            vec![
                record("A", ts(10, 0, 0), 5.0),
                record("B", ts(10, 0, 0), 7.0),
            ],
            vec![record("A", ts(11, 0, 0), 6.0)],
        ])
        .await;

        let df = merge_staged(&sink, &handles, NaMode::All).await.unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        assert_eq!(cell(&df, "A", 0), Some(5.0));
        assert_eq!(cell(&df, "B", 0), Some(7.0));
        assert_eq!(cell(&df, "A", 1), Some(6.0));
        assert_eq!(cell(&df, "B", 1), None);
    }

    #[tokio::test]
    async fn two_window_scenario_any_mode_drops_sparse_row() {
        let (sink, handles) = staged(vec![
            vec![
                record("A", ts(10, 0, 0), 5.0),
                record("B", ts(10, 0, 0), 7.0),
            ],
            vec![record("A", ts(11, 0, 0), 6.0)],
        ])
        .await;

        let df = merge_staged(&sink, &handles, NaMode::Any).await.unwrap();

        assert_eq!(df.height(), 1);
        assert_eq!(cell(&df, "A", 0), Some(5.0));
        assert_eq!(cell(&df, "B", 0), Some(7.0));
    }

    #[tokio::test]
    async fn sub_minute_jitter_collapses_first_wins() {
        let (sink, handles) = staged(vec![
            vec![record("A", ts(10, 0, 12), 5.0)],
            vec![record("A", ts(10, 0, 48), 99.0)],
        ])
        .await;

        let df = merge_staged(&sink, &handles, NaMode::All).await.unwrap();

        assert_eq!(df.height(), 1);
        assert_eq!(cell(&df, "A", 0), Some(5.0));
        let expected_millis = ts(10, 0, 0).and_utc().timestamp_millis();
        assert_eq!(time_millis(&df), vec![expected_millis]);
    }

    #[tokio::test]
    async fn rows_are_sorted_even_when_windows_complete_out_of_order() {
        // Stage windows under reversed indices to mimic out-of-order
        // completion; handles() still replays ascending.
        let sink = StageSink::memory();
        let h2 = sink
            .put(2, &[record("A", ts(12, 0, 0), 3.0)])
            .await
            .unwrap();
        let h0 = sink
            .put(0, &[record("A", ts(10, 0, 0), 1.0)])
            .await
            .unwrap();
        let h1 = sink
            .put(1, &[record("A", ts(11, 0, 0), 2.0)])
            .await
            .unwrap();
        let mut handles = vec![h2, h0, h1];
        handles.sort();

        let df = merge_staged(&sink, &handles, NaMode::All).await.unwrap();

        let times = time_millis(&df);
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(
            df.column("A").unwrap().f64().unwrap().into_iter().flatten().collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[tokio::test]
    async fn merge_is_idempotent() {
        let (sink, handles) = staged(vec![
            vec![
                record("A", ts(10, 0, 0), 5.0),
                record("B", ts(10, 0, 30), 7.0),
            ],
            vec![
                record("A", ts(11, 0, 0), 6.0),
                record("C", ts(9, 30, 0), 1.5),
            ],
        ])
        .await;

        let first = merge_staged(&sink, &handles, NaMode::All).await.unwrap();
        let second = merge_staged(&sink, &handles, NaMode::All).await.unwrap();

        assert!(first.equals_missing(&second));
    }

    #[tokio::test]
    async fn column_order_is_first_seen_across_windows() {
        let (sink, handles) = staged(vec![
            vec![record("B", ts(10, 0, 0), 1.0)],
            vec![record("A", ts(10, 0, 0), 2.0)],
        ])
        .await;

        let df = merge_staged(&sink, &handles, NaMode::All).await.unwrap();

        let columns: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(columns, vec![TIME_COL, "B", "A"]);
    }

    #[tokio::test]
    async fn no_handles_yield_an_empty_frame() {
        let sink = StageSink::memory();
        let df = merge_staged(&sink, &[], NaMode::All).await.unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 0);
    }

    #[tokio::test]
    async fn failed_window_is_excluded_but_siblings_survive() {
        use crate::extraction::coordinator::run_windows;
        use crate::extraction::planner::plan_windows;
        use chrono::Duration;

        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let windows: Vec<_> =
            plan_windows(start, start + Duration::hours(5), Duration::hours(1)).collect();

        let sink = StageSink::memory();
        let report = run_windows(&sink, windows, 4, |window| async move {
            if window.index == 2 {
                Err(crate::extraction::error::ExtractError::StageLayout {
                    index: window.index,
                    message: "simulated failure".to_string(),
                })
            } else {
                Ok(vec![record("A", window.start, window.index as f64)])
            }
        })
        .await;

        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.failed(), 1);

        let df = merge_staged(&sink, &report.staged_handles(), NaMode::All)
            .await
            .unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(
            df.column("A")
                .unwrap()
                .f64()
                .unwrap()
                .into_iter()
                .flatten()
                .collect::<Vec<_>>(),
            vec![0.0, 1.0, 3.0, 4.0]
        );
    }

    #[tokio::test]
    async fn disk_staging_produces_the_same_merge() {
        let records = vec![
            vec![
                record("A", ts(10, 0, 0), 5.0),
                record("B", ts(10, 0, 0), 7.0),
            ],
            vec![record("A", ts(11, 0, 0), 6.0)],
        ];

        let (memory, memory_handles) = staged(records.clone()).await;
        let disk = StageSink::disk().unwrap();
        let mut disk_handles = Vec::new();
        for (index, window) in records.into_iter().enumerate() {
            disk_handles.push(disk.put(index, &window).await.unwrap());
        }

        let from_memory = merge_staged(&memory, &memory_handles, NaMode::All)
            .await
            .unwrap();
        let from_disk = merge_staged(&disk, &disk_handles, NaMode::All).await.unwrap();

        assert!(from_memory.equals_missing(&from_disk));
    }
}
