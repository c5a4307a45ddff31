//! The two record shapes flowing through the pipeline: `RawSample` as the
//! trend-data endpoint returns it, and `LongRecord` once a sample has been
//! joined against the resolved catalog. `LongRecord` is the unit staged per
//! window and consumed by the merge.

use crate::types::sensor::SensorId;
use chrono::{NaiveDateTime, Timelike};
use serde::Deserialize;

/// One observation as returned by the trend-data endpoint. The timezone
/// field is carried opaquely; the API reports naive timestamps and ships
/// zone information separately.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSample {
    pub externallogid: SensorId,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub timestamp_tzinfo: serde_json::Value,
    /// Missing readings come back as JSON null.
    pub value: Option<f64>,
}

/// A sample enriched with the human-readable name of the sensor that
/// produced it. This is the canonical staged form: one window's fetch yields
/// a `Vec<LongRecord>` which a stage sink holds until the merge.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub id: SensorId,
    pub source_name: String,
    pub timestamp: NaiveDateTime,
    pub timestamp_tz_info: String,
    pub value: f64,
}

impl LongRecord {
    /// Timestamp with seconds and sub-second components zeroed. Readings are
    /// logged on minute boundaries with jitter; indexing on the normalized
    /// value keeps one row per minute.
    pub fn normalized_timestamp(&self) -> NaiveDateTime {
        self.timestamp
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record_at(timestamp: NaiveDateTime) -> LongRecord {
        LongRecord {
            id: 7,
            source_name: "TMV23/1-2.602/RT101".to_string(),
            timestamp,
            timestamp_tz_info: String::new(),
            value: 21.5,
        }
    }

    #[test]
    fn normalization_zeroes_seconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(10, 0, 37, 250)
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(record_at(ts).normalized_timestamp(), expected);
    }

    #[test]
    fn parses_trend_data_payload() {
        let body = r#"[
            {"externallogid": 42, "timestamp": "2024-01-01T10:00:12", "timestamp_tzinfo": "Europe/Copenhagen", "value": 21.5},
            {"externallogid": 43, "timestamp": "2024-01-01T10:00:12", "timestamp_tzinfo": null, "value": null}
        ]"#;
        let samples: Vec<RawSample> = serde_json::from_str(body).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].externallogid, 42);
        assert_eq!(samples[0].value, Some(21.5));
        assert_eq!(samples[1].value, None);
    }
}
