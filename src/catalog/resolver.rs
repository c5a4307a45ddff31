//! Resolves manifest entries against the upstream metadata endpoint.
//!
//! The metadata endpoint returns every logged variable the server knows
//! about as `{source, externallogid}` records; a manifest entry matches when
//! its `location/name` path equals a record's `source` exactly. Entries with
//! no match are logged and excluded — the run proceeds with the reduced set.

use crate::catalog::error::CatalogError;
use crate::config::Credentials;
use crate::types::sensor::{ResolvedSensor, SensorId, SensorSpec};
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

/// One record of the metadata endpoint's response. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataRecord {
    pub source: String,
    pub externallogid: SensorId,
}

/// The resolved mapping from manifest entries to upstream identifiers,
/// shared read-only by every window fetch.
#[derive(Debug, Clone)]
pub struct SensorCatalog {
    sensors: Vec<ResolvedSensor>,
    names: HashMap<SensorId, String>,
}

impl SensorCatalog {
    pub(crate) fn new(sensors: Vec<ResolvedSensor>) -> Self {
        let mut names = HashMap::with_capacity(sensors.len());
        for sensor in &sensors {
            // First spec mapping to an id keeps the name.
            names.entry(sensor.id).or_insert_with(|| sensor.source_name());
        }
        Self { sensors, names }
    }

    /// Resolved sensors in manifest order.
    pub fn sensors(&self) -> &[ResolvedSensor] {
        &self.sensors
    }

    /// Identifiers in manifest order, as the trend-data query wants them.
    pub fn ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.sensors.iter().map(|s| s.id)
    }

    /// The wide-table column name for an identifier, if it resolved.
    pub fn source_name(&self, id: SensorId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// Fetches the metadata record list and matches `specs` against it.
///
/// Fails only if the metadata query itself cannot be completed or parsed;
/// unmatched specs are not an error.
pub async fn resolve_catalog(
    http: &Client,
    base_url: &str,
    credentials: &Credentials,
    specs: &[SensorSpec],
) -> Result<SensorCatalog, CatalogError> {
    let url = format!("{}/metadata", base_url.trim_end_matches('/'));
    info!("Fetching sensor metadata from {}", url);

    let response = http
        .get(&url)
        .basic_auth(&credentials.username, Some(&credentials.password))
        .send()
        .await
        .map_err(|e| CatalogError::NetworkRequest(url.clone(), e))?;

    let response = match response.error_for_status() {
        Ok(resp) => resp,
        Err(e) => {
            warn!("HTTP error for {}: {:?}", url, e);
            return Err(if let Some(status) = e.status() {
                CatalogError::HttpStatus {
                    url,
                    status,
                    source: e,
                }
            } else {
                CatalogError::NetworkRequest(url, e)
            });
        }
    };

    let body = response
        .bytes()
        .await
        .map_err(|e| CatalogError::NetworkRequest(url.clone(), e))?;

    // Metadata for a whole building can run to tens of megabytes.
    let records = tokio::task::spawn_blocking(move || {
        serde_json::from_slice::<Vec<MetadataRecord>>(&body).map_err(CatalogError::from)
    })
    .await??;
    info!("Parsed {} metadata records", records.len());

    let catalog = match_specs(&records, specs);
    info!(
        "Resolved {} of {} manifest sensors",
        catalog.len(),
        specs.len()
    );
    Ok(catalog)
}

/// Pure matching step: exact `source` path equality, manifest order
/// preserved. When the metadata list carries the same path twice, the first
/// record wins.
pub(crate) fn match_specs(records: &[MetadataRecord], specs: &[SensorSpec]) -> SensorCatalog {
    let mut by_source: HashMap<&str, SensorId> = HashMap::with_capacity(records.len());
    for record in records {
        by_source.entry(record.source.as_str()).or_insert(record.externallogid);
    }

    let mut sensors = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        match by_source.get(spec.source_path().as_str()) {
            Some(&id) => sensors.push(ResolvedSensor {
                id,
                spec: spec.clone(),
            }),
            None => warn!(
                "manifest row {} ({}) has no metadata match, excluded from this run",
                index, spec
            ),
        }
    }
    SensorCatalog::new(sensors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, id: SensorId) -> MetadataRecord {
        MetadataRecord {
            source: source.to_string(),
            externallogid: id,
        }
    }

    #[test]
    fn matches_keep_manifest_order_and_pairing() {
        let records = vec![
            record("B/roomA/temp", 11),
            record("B/roomB/temp", 22),
            record("B/roomC/temp", 33),
        ];
        let specs = vec![
            SensorSpec::new("B/roomC", "temp"),
            SensorSpec::new("B/roomA", "temp"),
        ];

        let catalog = match_specs(&records, &specs);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.sensors()[0].id, 33);
        assert_eq!(catalog.sensors()[0].spec, specs[0]);
        assert_eq!(catalog.sensors()[1].id, 11);
        assert_eq!(catalog.sensors()[1].spec, specs[1]);
    }

    #[test]
    fn unmatched_specs_are_excluded_not_fatal() {
        let records = vec![record("B/roomA/temp", 11)];
        let specs = vec![
            SensorSpec::new("B/roomA", "temp"),
            SensorSpec::new("B/missing", "temp"),
            SensorSpec::new("B/also-missing", "co2"),
        ];

        let catalog = match_specs(&records, &specs);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.sensors()[0].id, 11);
    }

    #[test]
    fn duplicate_metadata_paths_first_record_wins() {
        let records = vec![record("B/roomA/temp", 11), record("B/roomA/temp", 99)];
        let specs = vec![SensorSpec::new("B/roomA", "temp")];

        let catalog = match_specs(&records, &specs);

        assert_eq!(catalog.sensors()[0].id, 11);
    }

    #[test]
    fn name_lookup_reconstructs_source_path() {
        let records = vec![record("B/roomA/temp", 11)];
        let specs = vec![SensorSpec::new("B/roomA", "temp")];

        let catalog = match_specs(&records, &specs);

        assert_eq!(catalog.source_name(11), Some("B/roomA/temp"));
        assert_eq!(catalog.source_name(12), None);
    }

    #[test]
    fn empty_manifest_yields_empty_catalog() {
        let catalog = match_specs(&[record("x/y", 1)], &[]);
        assert!(catalog.is_empty());
    }
}
