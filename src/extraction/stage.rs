//! Per-window staging between fetch and merge.
//!
//! Each fetched window publishes its records exactly once under its window
//! index and the merge reads them back by handle, so no two workers ever
//! touch the same key and the merge never needs every window resident at
//! once. The disk form writes one Parquet file per window into a scratch
//! directory that is removed when the sink is dropped, on success and
//! failure alike.

use crate::extraction::error::ExtractError;
use crate::types::record::LongRecord;
use chrono::DateTime;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task;

const ID_COL: &str = "externallogid";
const SOURCE_COL: &str = "source";
const TS_COL: &str = "timestamp";
const TZ_COL: &str = "timestamp_tzinfo";
const VALUE_COL: &str = "value";

/// Addresses one staged window. Ordering follows the window index, so a
/// sorted handle list replays windows in plan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageHandle(usize);

impl StageHandle {
    pub fn window_index(&self) -> usize {
        self.0
    }
}

/// Holding area for fetched windows; in-memory and disk-backed forms are
/// interchangeable at the merge's call site.
#[derive(Debug)]
pub enum StageSink {
    Memory(MemorySink),
    Disk(DiskSink),
}

impl StageSink {
    pub fn memory() -> Self {
        StageSink::Memory(MemorySink {
            windows: Mutex::new(BTreeMap::new()),
        })
    }

    /// Creates the scratch directory up front so a failure surfaces before
    /// any fetch is dispatched.
    pub fn disk() -> Result<Self, ExtractError> {
        let scratch = tempfile::Builder::new()
            .prefix("trendpull-stage-")
            .tempdir()
            .map_err(ExtractError::ScratchDirCreation)?;
        log::info!("Created scratch directory {:?}", scratch.path());
        Ok(StageSink::Disk(DiskSink {
            scratch,
            published: Mutex::new(BTreeMap::new()),
        }))
    }

    /// Publishes one window's records. Write-once: staging the same window
    /// index twice is an error.
    pub async fn put(
        &self,
        window_index: usize,
        records: &[LongRecord],
    ) -> Result<StageHandle, ExtractError> {
        match self {
            StageSink::Memory(sink) => {
                let mut windows = sink.windows.lock().await;
                if windows.contains_key(&window_index) {
                    return Err(ExtractError::DuplicateStage(window_index));
                }
                windows.insert(window_index, records.to_vec());
                Ok(StageHandle(window_index))
            }
            StageSink::Disk(sink) => {
                let path = sink.window_path(window_index);
                {
                    let published = sink.published.lock().await;
                    if published.contains_key(&window_index) {
                        return Err(ExtractError::DuplicateStage(window_index));
                    }
                }
                // Write fully before publishing; a handle never points at a
                // half-written file.
                write_window_parquet(window_index, records.to_vec(), &path).await?;
                let mut published = sink.published.lock().await;
                if published.insert(window_index, path).is_some() {
                    return Err(ExtractError::DuplicateStage(window_index));
                }
                Ok(StageHandle(window_index))
            }
        }
    }

    /// Reads one staged window back.
    pub async fn get(&self, handle: StageHandle) -> Result<Vec<LongRecord>, ExtractError> {
        match self {
            StageSink::Memory(sink) => {
                let windows = sink.windows.lock().await;
                windows
                    .get(&handle.0)
                    .cloned()
                    .ok_or(ExtractError::UnknownHandle(handle.0))
            }
            StageSink::Disk(sink) => {
                let path = {
                    let published = sink.published.lock().await;
                    published
                        .get(&handle.0)
                        .cloned()
                        .ok_or(ExtractError::UnknownHandle(handle.0))?
                };
                read_window_parquet(handle.0, path).await
            }
        }
    }

    /// Every published handle, ascending by window index.
    pub async fn handles(&self) -> Vec<StageHandle> {
        match self {
            StageSink::Memory(sink) => {
                sink.windows.lock().await.keys().map(|&i| StageHandle(i)).collect()
            }
            StageSink::Disk(sink) => {
                sink.published.lock().await.keys().map(|&i| StageHandle(i)).collect()
            }
        }
    }
}

#[derive(Debug)]
pub struct MemorySink {
    windows: Mutex<BTreeMap<usize, Vec<LongRecord>>>,
}

#[derive(Debug)]
pub struct DiskSink {
    scratch: TempDir,
    published: Mutex<BTreeMap<usize, PathBuf>>,
}

impl DiskSink {
    fn window_path(&self, window_index: usize) -> PathBuf {
        self.scratch.path().join(format!("window_{window_index}.parquet"))
    }
}

async fn write_window_parquet(
    window_index: usize,
    records: Vec<LongRecord>,
    path: &Path,
) -> Result<(), ExtractError> {
    let path_buf = path.to_path_buf();
    task::spawn_blocking(move || {
        let mut df = records_to_frame(&records).map_err(|e| ExtractError::StageWritePolars {
            index: window_index,
            path: path_buf.clone(),
            source: e,
        })?;
        let file = std::fs::File::create(&path_buf).map_err(|e| ExtractError::StageWriteIo {
            index: window_index,
            path: path_buf.clone(),
            source: e,
        })?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map_err(|e| ExtractError::StageWritePolars {
                index: window_index,
                path: path_buf,
                source: e,
            })?;
        Ok::<(), ExtractError>(())
    })
    .await??;
    Ok(())
}

async fn read_window_parquet(
    window_index: usize,
    path: PathBuf,
) -> Result<Vec<LongRecord>, ExtractError> {
    task::spawn_blocking(move || {
        let file = std::fs::File::open(&path).map_err(|e| ExtractError::StageReadIo {
            index: window_index,
            path: path.clone(),
            source: e,
        })?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| ExtractError::StageReadPolars {
                index: window_index,
                path: path.clone(),
                source: e,
            })?;
        frame_to_records(window_index, &path, &df)
    })
    .await?
}

/// Long-format frame layout shared by the disk sink's files: one row per
/// record, columns `externallogid, source, timestamp, timestamp_tzinfo,
/// value`.
fn records_to_frame(records: &[LongRecord]) -> PolarsResult<DataFrame> {
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    let sources: Vec<&str> = records.iter().map(|r| r.source_name.as_str()).collect();
    let timestamps: Vec<i64> = records
        .iter()
        .map(|r| r.timestamp.and_utc().timestamp_millis())
        .collect();
    let tz_infos: Vec<&str> = records.iter().map(|r| r.timestamp_tz_info.as_str()).collect();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();

    DataFrame::new(vec![
        Column::new(ID_COL.into(), ids),
        Column::new(SOURCE_COL.into(), sources),
        Int64Chunked::from_vec(TS_COL.into(), timestamps)
            .into_datetime(TimeUnit::Milliseconds, None)
            .into_column(),
        Column::new(TZ_COL.into(), tz_infos),
        Column::new(VALUE_COL.into(), values),
    ])
}

fn frame_to_records(
    window_index: usize,
    path: &Path,
    df: &DataFrame,
) -> Result<Vec<LongRecord>, ExtractError> {
    let read_err = |e: PolarsError| ExtractError::StageReadPolars {
        index: window_index,
        path: path.to_path_buf(),
        source: e,
    };
    let layout_err = |message: &str| ExtractError::StageLayout {
        index: window_index,
        message: message.to_string(),
    };

    let ids = df.column(ID_COL).map_err(read_err)?.i64().map_err(read_err)?;
    let sources = df.column(SOURCE_COL).map_err(read_err)?.str().map_err(read_err)?;
    let timestamps = df.column(TS_COL).map_err(read_err)?.datetime().map_err(read_err)?;
    let tz_infos = df.column(TZ_COL).map_err(read_err)?.str().map_err(read_err)?;
    let values = df.column(VALUE_COL).map_err(read_err)?.f64().map_err(read_err)?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let id = ids.get(row).ok_or_else(|| layout_err("null externallogid"))?;
        let source_name = sources.get(row).ok_or_else(|| layout_err("null source"))?;
        let millis = timestamps.get(row).ok_or_else(|| layout_err("null timestamp"))?;
        let timestamp = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| layout_err("timestamp out of range"))?
            .naive_utc();
        let timestamp_tz_info = tz_infos.get(row).unwrap_or_default().to_string();
        let value = values.get(row).ok_or_else(|| layout_err("null value"))?;
        records.push(LongRecord {
            id,
            source_name: source_name.to_string(),
            timestamp,
            timestamp_tz_info,
            value,
        });
    }
    Ok(records)
}
