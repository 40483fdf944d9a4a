use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Result of a single probe lookup: either a real value or the explicit
/// marker that the value could not be determined. Serializes as the value
/// itself, or as the literal string `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detected<T> {
    Known(T),
    Unknown,
}

impl<T> Detected<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Detected::Known(_))
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Detected::Known(value) => Some(value),
            Detected::Unknown => None,
        }
    }
}

impl<T> Default for Detected<T> {
    fn default() -> Self {
        Detected::Unknown
    }
}

impl<T> From<Option<T>> for Detected<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Detected::Known(value),
            None => Detected::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Detected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detected::Known(value) => value.fmt(f),
            Detected::Unknown => f.write_str("unknown"),
        }
    }
}

impl<T: Serialize> Serialize for Detected<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Detected::Known(value) => value.serialize(serializer),
            Detected::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// Operating system identity: the coarse platform family tag support tooling
/// groups hosts by, plus the raw platform identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsInfo {
    pub id: String,
    pub platform: String,
}

/// Toolchain facts for the host. `container` is present only when the
/// process was detected as running inside an isolated runtime environment;
/// absence means "not isolated or undeterminable", not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeInfo {
    pub version: Detected<String>,
    pub cargo: Detected<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// Hardware facts, each independently degradable to `Unknown`. `freq` is in
/// MHz, `ram` in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HardwareInfo {
    pub cores: Detected<usize>,
    pub freq: Detected<u64>,
    pub ram: Detected<u64>,
}

/// One immutable, fully-formed environment record produced by a detection
/// pass. After a completed pass every category is `Some`, even if inner
/// fields fell back to `Unknown`; the all-`None` default is the degraded
/// record stored when a pass fails outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HardwareInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plugins: BTreeMap<String, serde_json::Map<String, Value>>,
}

impl EnvironmentSnapshot {
    /// True for the degraded record produced when a detection pass could not
    /// complete at all.
    pub fn is_empty(&self) -> bool {
        self.os.is_none()
            && self.runtime.is_none()
            && self.hardware.is_none()
            && self.plugins.is_empty()
    }
}
