//! Cache key derivation.
//!
//! The key is `"{identity}-previousSegmentPayload"` where identity is the
//! first truthy value of `userId`, then `anonymousId`, else the literal
//! `no-id`. Snapshots already persisted under this format must keep
//! resolving, so the rendering of identity values is fixed.

use serde_json::{Number, Value};

use crate::shape::{FieldAccessor, ANONYMOUS_ID, USER_ID};

/// Suffix appended to every cache key.
pub const DEFAULT_KEY_SUFFIX: &str = "previousSegmentPayload";

/// Identity used when a payload carries neither `userId` nor `anonymousId`.
pub const NO_ID: &str = "no-id";

/// Derive the cache key for `payload` with the default suffix.
pub fn payload_key<A>(payload: &Value, accessor: &A) -> String
where
    A: FieldAccessor + ?Sized,
{
    payload_key_with_suffix(payload, accessor, DEFAULT_KEY_SUFFIX)
}

/// Derive the cache key for `payload` with a custom suffix.
pub fn payload_key_with_suffix<A>(payload: &Value, accessor: &A, suffix: &str) -> String
where
    A: FieldAccessor + ?Sized,
{
    let identity = identity_fragment(accessor.get_field(payload, USER_ID))
        .or_else(|| identity_fragment(accessor.get_field(payload, ANONYMOUS_ID)))
        .unwrap_or_else(|| NO_ID.to_string());
    format!("{identity}-{suffix}")
}

/// Render an identity value, or `None` if it is falsy (absent, `null`,
/// `false`, zero, empty string) or structured.
fn identity_fragment(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => number_fragment(n),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn number_fragment(n: &Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return (i != 0).then(|| i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    let f = n.as_f64()?;
    (f != 0.0 && !f.is_nan()).then(|| float_fragment(f))
}

/// Shortest round-trip form, switching to exponent notation outside
/// `[1e-6, 1e21)` with an explicit exponent sign: `1.0` renders as `1`,
/// `1e21` as `1e+21`, `1e-7` as `1e-7`.
fn float_fragment(f: f64) -> String {
    let magnitude = f.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{f}");
    }
    let scientific = format!("{f:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => scientific,
    }
}
