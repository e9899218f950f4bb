//! Advertisement filtering

use crate::config::BridgeConfig;
use crate::protocol::{DEVICE_EXACT_NAME, DEVICE_NAME_MARKER};

/// A single scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertised local name, if any
    pub name: Option<String>,
    /// Link-layer identifier used to connect
    pub address: String,
}

impl Advertisement {
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        Self {
            name,
            address: address.into(),
        }
    }

    /// Name for log lines
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// Outcome of evaluating one advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanVerdict {
    Matched,
    Ignored,
    /// No advertised name; logged but never selected
    Unnamed,
}

/// Decides whether an advertisement is the target peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    marker: String,
    exact_name: String,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(DEVICE_NAME_MARKER, DEVICE_EXACT_NAME)
    }
}

impl DeviceFilter {
    pub fn new(marker: impl Into<String>, exact_name: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            exact_name: exact_name.into(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.device_name_marker.clone(),
            config.device_exact_name.clone(),
        )
    }

    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        self.evaluate(advertisement) == ScanVerdict::Matched
    }

    pub fn evaluate(&self, advertisement: &Advertisement) -> ScanVerdict {
        match advertisement.name.as_deref() {
            None | Some("") => ScanVerdict::Unnamed,
            Some(name) => {
                let by_marker = !self.marker.is_empty() && name.contains(&self.marker);
                let by_name = !self.exact_name.is_empty() && name == self.exact_name;
                if by_marker || by_name {
                    ScanVerdict::Matched
                } else {
                    ScanVerdict::Ignored
                }
            }
        }
    }
}
