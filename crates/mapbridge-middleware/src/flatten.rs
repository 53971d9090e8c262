//! Map-to-parallel-sequence flattening for wire transmission.
//!
//! Both helpers walk the map in ascending key order. For multi-valued maps
//! the key is repeated once per value, and values sharing a key keep their
//! stored order, so `keys[i]` always belongs to `values[i]`.

use std::collections::BTreeMap;

/// Split `map` into index-aligned key and value sequences.
pub fn flatten<K: Clone, V: Clone>(map: &BTreeMap<K, V>) -> (Vec<K>, Vec<V>) {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).unzip()
}

/// Split a multi-valued `map`, emitting one key entry per value and
/// converting each value with `convert`.
pub fn flatten_multi<K, V, W, F>(map: &BTreeMap<K, Vec<V>>, mut convert: F) -> (Vec<K>, Vec<W>)
where
    K: Clone,
    V: Clone,
    F: FnMut(V) -> W,
{
    let total = map.values().map(Vec::len).sum();
    let mut keys = Vec::with_capacity(total);
    let mut values = Vec::with_capacity(total);
    for (key, group) in map {
        for value in group {
            keys.push(key.clone());
            values.push(convert(value.clone()));
        }
    }
    (keys, values)
}
