//! Defines the data structures describing sensors: the manifest entry
//! (`SensorSpec`), the opaque upstream identifier (`SensorId`), and the
//! resolved pairing of the two produced by the catalog resolver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The opaque numeric identifier (`externallogid`) the upstream API assigns
/// to each logged variable. Issued by the metadata endpoint, consumed by the
/// trend-data endpoint.
pub type SensorId = i64;

/// One row of the sensor manifest: where a variable is logged and what it is
/// called there. Two `SensorSpec`s are the same sensor exactly when both
/// strings are equal.
///
/// # Examples
///
/// ```
/// use trendpull::SensorSpec;
///
/// let spec = SensorSpec::new("TMV23/1-2.602", "RT101");
/// assert_eq!(spec.source_path(), "TMV23/1-2.602/RT101");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Location of the logged variable, e.g. a building/room path.
    pub location: String,
    /// Name of the logged variable at that location.
    pub name: String,
}

impl SensorSpec {
    pub fn new(location: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            name: name.into(),
        }
    }

    /// The composite path the metadata endpoint reports as `source`.
    /// Matching is exact string equality on this value.
    pub fn source_path(&self) -> String {
        format!("{}/{}", self.location, self.name)
    }
}

impl fmt::Display for SensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location, self.name)
    }
}

/// A manifest entry successfully matched against the upstream catalog,
/// carrying the identifier the trend-data endpoint expects alongside the
/// entry itself so the human-readable name can be reconstructed later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSensor {
    pub id: SensorId,
    pub spec: SensorSpec,
}

impl ResolvedSensor {
    /// The column name this sensor gets in the final wide table.
    pub fn source_name(&self) -> String {
        self.spec.source_path()
    }
}
