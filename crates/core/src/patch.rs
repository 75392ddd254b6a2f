//! PATCH bodies need to tell "field absent" from "field set to null".
//!
//! Use with `#[serde(default, deserialize_with = "double_option")]` on an
//! `Option<Option<T>>`: absent → `None`, `null` → `Some(None)`,
//! value → `Some(Some(v))`.

use serde::{Deserialize, Deserializer};

pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Apply a tri-state PATCH field onto the current value.
pub fn apply<T>(current: &mut Option<T>, patch: Option<Option<T>>) {
    if let Some(next) = patch {
        *current = next;
    }
}
