//! Fetches one window's worth of trend data and reshapes it into staged
//! long-format records.

use crate::catalog::resolver::SensorCatalog;
use crate::config::Credentials;
use crate::extraction::error::ExtractError;
use crate::types::record::{LongRecord, RawSample};
use crate::types::window::TimeWindow;
use log::{debug, info, warn};
use reqwest::Client;
use std::sync::Arc;

/// Wire format for window bounds; the endpoint accepts space-separated
/// naive timestamps.
const QUERY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Issues trend-data requests scoped to a single window and the full
/// resolved identifier set. One instance is shared by all workers; the
/// catalog is read-only across the fetch phase.
pub struct WindowFetcher {
    http: Client,
    trenddata_url: String,
    credentials: Credentials,
    catalog: Arc<SensorCatalog>,
}

impl WindowFetcher {
    pub fn new(
        http: Client,
        base_url: &str,
        credentials: Credentials,
        catalog: Arc<SensorCatalog>,
    ) -> Self {
        Self {
            http,
            trenddata_url: format!("{}/trenddata", base_url.trim_end_matches('/')),
            credentials,
            catalog,
        }
    }

    /// Fetches and reshapes one window. An empty response is a valid result
    /// with zero records; any request or parse failure is returned as an
    /// error attributed to this window alone.
    pub async fn fetch_window(&self, window: TimeWindow) -> Result<Vec<LongRecord>, ExtractError> {
        debug!("Fetching trend data for window {}", window);

        let mut query: Vec<(&str, String)> = vec![
            ("starttime", window.start.format(QUERY_TIME_FORMAT).to_string()),
            ("endtime", window.end.format(QUERY_TIME_FORMAT).to_string()),
        ];
        for id in self.catalog.ids() {
            query.push(("externallogid", id.to_string()));
        }

        let response = self
            .http
            .get(&self.trenddata_url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .query(&query)
            .send()
            .await
            .map_err(|e| ExtractError::NetworkRequest(self.trenddata_url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for window {}: {:?}", window, e);
                return Err(if let Some(status) = e.status() {
                    ExtractError::HttpStatus {
                        url: self.trenddata_url.clone(),
                        status,
                        source: e,
                    }
                } else {
                    ExtractError::NetworkRequest(self.trenddata_url.clone(), e)
                });
            }
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| ExtractError::NetworkRequest(self.trenddata_url.clone(), e))?;
        let samples: Vec<RawSample> =
            serde_json::from_slice(&body).map_err(|e| ExtractError::ResponseParse {
                window: window.index,
                source: e,
            })?;

        if samples.is_empty() {
            info!("No data found for window {}", window);
            return Ok(Vec::new());
        }

        let records = join_catalog(samples, &self.catalog);
        debug!("Window {} yielded {} records", window, records.len());
        Ok(records)
    }
}

/// Attaches each sample's resolved `source` name. Samples whose identifier
/// is not in the catalog, or whose value is null, contribute nothing.
pub(crate) fn join_catalog(samples: Vec<RawSample>, catalog: &SensorCatalog) -> Vec<LongRecord> {
    samples
        .into_iter()
        .filter_map(|sample| {
            let source_name = match catalog.source_name(sample.externallogid) {
                Some(name) => name.to_string(),
                None => {
                    debug!(
                        "Dropping sample for unknown externallogid {}",
                        sample.externallogid
                    );
                    return None;
                }
            };
            let value = sample.value?;
            Some(LongRecord {
                id: sample.externallogid,
                source_name,
                timestamp: sample.timestamp,
                timestamp_tz_info: match &sample.timestamp_tzinfo {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                },
                value,
            })
        })
        .collect()
}
