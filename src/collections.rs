//! Small collection helpers.

use std::collections::HashMap;
use std::hash::BuildHasher;

/// Returns the keys of `map` as a sorted vector.
///
/// Hash maps iterate in an unspecified order; callers that need a stable
/// sequence get an explicitly sorted one here rather than relying on
/// incidental iteration order.
#[must_use]
pub fn sorted_keys<K, V, S>(map: &HashMap<K, V, S>) -> Vec<K>
where
    K: Ord + Clone,
    S: BuildHasher,
{
    let mut keys: Vec<K> = map.keys().cloned().collect();
    keys.sort();
    keys
}
