//! Field access across payload envelopes.
//!
//! Server-side identify calls are flat (`{"userId": .., "traits": ..}`) while
//! browser middleware hands over the same fields nested under `obj`. The
//! debouncer reaches fields only through a [`FieldAccessor`], so the same key
//! derivation and decision logic serves both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity field holding the known user ID.
pub const USER_ID: &str = "userId";
/// Identity field holding the anonymous device/session ID.
pub const ANONYMOUS_ID: &str = "anonymousId";
/// Field holding the user trait mapping.
pub const TRAITS: &str = "traits";

/// Reads and writes named payload fields regardless of envelope shape.
pub trait FieldAccessor {
    /// Resolve `name` in `payload`. Absent or unreachable fields are `None`.
    fn get_field<'a>(&self, payload: &'a Value, name: &str) -> Option<&'a Value>;

    /// Set `name` in `payload`, creating intermediate mappings as needed.
    fn set_field(&self, payload: &mut Value, name: &str, value: Value);
}

/// Where identity and trait fields live inside a payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadShape {
    /// Fields sit at the top level of the payload.
    #[default]
    Flat,
    /// Fields sit inside the mapping stored under `field`.
    Enveloped { field: String },
}

impl PayloadShape {
    pub fn enveloped(field: impl Into<String>) -> Self {
        Self::Enveloped {
            field: field.into(),
        }
    }

    /// The shape of payloads produced by browser source middleware.
    pub fn browser() -> Self {
        Self::enveloped("obj")
    }
}

impl FieldAccessor for PayloadShape {
    fn get_field<'a>(&self, payload: &'a Value, name: &str) -> Option<&'a Value> {
        match self {
            Self::Flat => payload.get(name),
            Self::Enveloped { field } => payload.get(field)?.get(name),
        }
    }

    fn set_field(&self, payload: &mut Value, name: &str, value: Value) {
        match self {
            Self::Flat => set_top_level(payload, name, value),
            Self::Enveloped { field } => {
                if !payload.is_object() {
                    *payload = Value::Object(Map::new());
                }
                if let Value::Object(outer) = payload {
                    let envelope = outer.entry(field.clone()).or_insert(Value::Null);
                    set_top_level(envelope, name, value);
                }
            }
        }
    }
}

fn set_top_level(target: &mut Value, name: &str, value: Value) {
    if let Value::Object(map) = target {
        map.insert(name.to_string(), value);
    } else {
        let mut map = Map::new();
        map.insert(name.to_string(), value);
        *target = Value::Object(map);
    }
}
