//! Arithmetic over [`ResourceQuantities`] maps: the multi-key extension of
//! the per-value saturating algebra `kueue_api::resource::Quantity` already
//! provides (`spec.md` §2, component 1).

use kueue_api::resource::{FlavorResourceKey, Quantity, ResourceQuantities};

/// Adds `delta` into `map[key]`, creating the entry if absent.
pub fn add(map: &mut ResourceQuantities, key: FlavorResourceKey, delta: Quantity) {
    *map.entry(key).or_insert(Quantity::ZERO) += delta;
}

/// Subtracts `delta` from `map[key]`. Returns `true` if the result would be
/// negative, in which case the entry is clamped to zero — `spec.md` §7
/// treats negative usage as an invariant violation to be logged and
/// self-healed, never as a value the rest of the engine has to tolerate.
pub fn sub_clamped(map: &mut ResourceQuantities, key: FlavorResourceKey, delta: Quantity) -> bool {
    let entry = map.entry(key).or_insert(Quantity::ZERO);
    let result = *entry - delta;
    if result.as_millis() < 0 {
        *entry = Quantity::ZERO;
        true
    } else {
        *entry = result;
        false
    }
}

pub fn get(map: &ResourceQuantities, key: &FlavorResourceKey) -> Quantity {
    map.get(key).copied().unwrap_or(Quantity::ZERO)
}

/// Merges `from` into `into`, summing overlapping keys.
pub fn merge_sum(into: &mut ResourceQuantities, from: &ResourceQuantities) {
    for (key, value) in from {
        add(into, key.clone(), *value);
    }
}

/// `into -= from`, key by key, saturating at zero per key and returning
/// whether any key went negative before clamping.
pub fn merge_sub_clamped(into: &mut ResourceQuantities, from: &ResourceQuantities) -> bool {
    let mut went_negative = false;
    for (key, value) in from {
        if sub_clamped(into, key.clone(), *value) {
            went_negative = true;
        }
    }
    went_negative
}
