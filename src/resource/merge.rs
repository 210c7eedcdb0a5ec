//! Merge reducers for deployment records.
//!
//! Each reducer is pure and never moves a value backwards: applying any
//! sequence of patches in any order yields the same counter and the union of
//! all keys.

use std::collections::HashMap;

use super::state::ResourceState;

/// Counter merge: the larger of the two, ignoring an absent side
pub fn merge_counter(current: Option<i64>, incoming: Option<i64>) -> Option<i64> {
    match (current, incoming) {
        (Some(c), Some(i)) => Some(c.max(i)),
        (c, None) => c,
        (None, i) => i,
    }
}

/// Key-value merge: incoming entries overwrite same-key entries, nothing is
/// removed. Returns whether anything changed.
pub fn merge_key_values(
    current: &mut HashMap<String, String>,
    incoming: &HashMap<String, String>,
) -> bool {
    let mut changed = false;
    for (key, value) in incoming {
        if current.get(key) != Some(value) {
            current.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Apply a merge patch to a stored record. Returns whether anything changed.
///
/// Scalar fields are taken only when the patch carries them. The expiry is
/// the exception: it is always taken from the patch, so a patch without one
/// clears it.
pub fn merge_resource(current: &mut ResourceState, patch: &ResourceState) -> bool {
    fn take_if_some(current: &mut Option<String>, patch: &Option<String>) -> bool {
        match patch {
            Some(value) if current.as_ref() != Some(value) => {
                *current = Some(value.clone());
                true
            }
            _ => false,
        }
    }

    let mut changed = take_if_some(&mut current.name, &patch.name);
    changed |= take_if_some(&mut current.endpoint, &patch.endpoint);
    changed |= take_if_some(&mut current.status, &patch.status);

    let counter = merge_counter(current.counter, patch.counter);
    changed |= counter != current.counter;
    current.counter = counter;

    changed |= merge_key_values(&mut current.key_values, &patch.key_values);

    let expiration = patch.document.expiration_time_micros;
    changed |= expiration != current.document.expiration_time_micros;
    current.document.expiration_time_micros = expiration;

    changed
}
