//! Deep diff engine for identify payload debouncing.
//!
//! Compares two JSON trees and reports only what is new or changed in the
//! candidate relative to the base. The comparison is one-directional: keys
//! that exist only in the base are never reported.
//!
//! # Key Types
//!
//! - [`diff_values`] / [`DiffOptions`] -- minimal patch between two trees
//! - [`values_equal`] -- structural equality with JSON numeric semantics

pub mod deep_diff;
pub mod equal;

pub use deep_diff::{diff_values, DiffOptions};
pub use equal::values_equal;
