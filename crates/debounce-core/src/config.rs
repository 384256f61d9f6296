use serde::{Deserialize, Serialize};

use crate::key::DEFAULT_KEY_SUFFIX;
use crate::shape::PayloadShape;

/// Configuration for a [`Debouncer`](crate::Debouncer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Where identity and trait fields live inside incoming payloads.
    pub shape: PayloadShape,
    /// Suffix appended to every cache key. Changing it orphans every
    /// snapshot persisted under the previous suffix.
    pub key_suffix: String,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            shape: PayloadShape::Flat,
            key_suffix: DEFAULT_KEY_SUFFIX.to_string(),
        }
    }
}

impl DebounceConfig {
    /// Configuration for payloads from browser source middleware, which nest
    /// their fields under `obj`.
    pub fn browser() -> Self {
        Self {
            shape: PayloadShape::browser(),
            ..Default::default()
        }
    }
}
