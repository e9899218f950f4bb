//! Adapter selection and scan settings

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the btleplug central
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleCentralConfig {
    /// Index into the host's adapter list
    pub adapter_index: usize,
    /// Ask the OS to report only devices advertising the target service.
    ///
    /// Off by default: the target peripheral is matched by name and does not
    /// always include its service UUID in advertisements.
    pub filter_by_service: bool,
}

impl Default for BleCentralConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            filter_by_service: false,
        }
    }
}

impl BleCentralConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the adapter at `index`
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Enable or disable OS-level service filtering
    pub fn with_service_filter(mut self, enabled: bool) -> Self {
        self.filter_by_service = enabled;
        self
    }
}
