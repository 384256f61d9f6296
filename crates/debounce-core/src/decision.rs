//! The dedup decision: suppress, trim, or pass a payload through.
//!
//! Pure and synchronous. Given the cumulative snapshot for an identity and the
//! sanitized incoming payload, decide what should be sent downstream. All I/O
//! lives in [`crate::debouncer`].

use serde_json::Value;

use debounce_diff::{diff_values, values_equal, DiffOptions};

use crate::shape::{FieldAccessor, ANONYMOUS_ID, TRAITS, USER_ID};

/// Why a [`Decision`] came out the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionReason {
    /// One side was absent; there was nothing to compare against.
    NothingToCompare,
    /// `userId` or `anonymousId` changed; full traits are resent.
    IdentityChanged,
    /// Some traits are new or changed.
    TraitsChanged,
    /// Every trait matches the snapshot.
    Unchanged,
}

/// Outcome of comparing an incoming payload with the stored snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// The payload to send, or `None` to suppress the call entirely.
    pub next_payload: Option<Value>,
    /// When set, the only traits worth sending. The caller substitutes these
    /// for the payload's `traits` before emitting.
    pub new_or_updated_traits: Option<Value>,
    pub reason: DecisionReason,
}

impl Decision {
    fn pass_through(next: Value, reason: DecisionReason) -> Self {
        Self {
            next_payload: Some(next),
            new_or_updated_traits: None,
            reason,
        }
    }

    /// Returns `true` if nothing should be sent.
    pub fn is_suppressed(&self) -> bool {
        self.next_payload.is_none()
    }

    /// Build the payload to emit: the incoming payload with its traits
    /// replaced by the trimmed traits when there are any.
    pub fn into_emitted<A>(self, accessor: &A) -> Option<Value>
    where
        A: FieldAccessor + ?Sized,
    {
        let mut payload = self.next_payload?;
        if let Some(traits) = self.new_or_updated_traits {
            accessor.set_field(&mut payload, TRAITS, traits);
        }
        Some(payload)
    }
}

/// Decide what to do with `next` given the `previous` snapshot.
///
/// 1. Either side absent (or JSON `null`): pass `next` through untouched. A
///    `null` next is treated as absent, so nothing is sent.
/// 2. `anonymousId` or `userId` differs: pass through with full traits.
/// 3. Otherwise diff the traits, treating sequences as atomic values. No
///    difference suppresses the payload; any difference keeps it and reports
///    the trimmed traits.
pub fn debounce_payloads<A>(previous: Option<&Value>, next: Option<Value>, accessor: &A) -> Decision
where
    A: FieldAccessor + ?Sized,
{
    let next = next.filter(|next| !next.is_null());
    let (previous, next) = match (previous, next) {
        (Some(previous), Some(next)) if !previous.is_null() && !next.is_null() => (previous, next),
        (_, next) => {
            return Decision {
                next_payload: next,
                new_or_updated_traits: None,
                reason: DecisionReason::NothingToCompare,
            }
        }
    };

    let same_identity = [ANONYMOUS_ID, USER_ID].iter().all(|field| {
        same_field(
            accessor.get_field(previous, field),
            accessor.get_field(&next, field),
        )
    });
    if !same_identity {
        return Decision::pass_through(next, DecisionReason::IdentityChanged);
    }

    let absent = Value::Null;
    let next_traits = accessor.get_field(&next, TRAITS).unwrap_or(&absent);
    let previous_traits = accessor.get_field(previous, TRAITS).unwrap_or(&absent);
    match diff_values(next_traits, previous_traits, DiffOptions::atomic_arrays()) {
        None => Decision {
            next_payload: None,
            new_or_updated_traits: None,
            reason: DecisionReason::Unchanged,
        },
        Some(traits) => Decision {
            next_payload: Some(next),
            new_or_updated_traits: Some(traits),
            reason: DecisionReason::TraitsChanged,
        },
    }
}

/// Absent and present fields never match; `null` is a present value.
fn same_field(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => values_equal(a, b),
        _ => false,
    }
}
