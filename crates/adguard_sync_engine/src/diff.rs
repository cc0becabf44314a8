//! Keyed diff of two resource snapshots.

use std::collections::BTreeMap;

/// Classification of the keys of two snapshots.
///
/// Every origin key is in exactly one of `additions`, `updates` or the
/// unchanged count; every replica key is in exactly one of `removals`,
/// `updates` or the unchanged count. Maps are ordered by key, so
/// enumeration does not depend on the order of the input snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult<K: Ord, T> {
    /// Origin-only keys, carrying the origin item.
    pub additions: BTreeMap<K, T>,
    /// Common keys whose payload differs, carrying the origin item.
    pub updates: BTreeMap<K, T>,
    /// Replica-only keys, carrying the replica item.
    pub removals: BTreeMap<K, T>,
    /// Number of common keys with equal payload.
    pub unchanged: usize,
    /// Keys that occurred more than once in the origin snapshot.
    pub origin_duplicates: Vec<K>,
    /// Keys that occurred more than once in the replica snapshot.
    pub replica_duplicates: Vec<K>,
}

impl<K: Ord, T> DiffResult<K, T> {
    /// Returns true if the replica already matches the origin.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }

    /// Number of mutating operations needed to converge.
    pub fn change_count(&self) -> usize {
        self.additions.len() + self.updates.len() + self.removals.len()
    }
}

/// Indexes a snapshot by key. A later item wins over an earlier one with the
/// same key; the duplicated keys are returned in key order.
fn index<'a, T, K, F>(items: &'a [T], key_of: &F) -> (BTreeMap<K, &'a T>, Vec<K>)
where
    K: Ord + Clone,
    F: Fn(&T) -> K,
{
    let mut map = BTreeMap::new();
    let mut duplicates = Vec::new();
    for item in items {
        let key = key_of(item);
        if map.insert(key.clone(), item).is_some() {
            duplicates.push(key);
        }
    }
    duplicates.sort();
    duplicates.dedup();
    (map, duplicates)
}

/// Computes the operations that turn `replica` into `origin`.
///
/// `key_of` extracts the natural key, `equal` decides whether two items with
/// the same key carry the same payload. The function has no side effects.
pub fn diff<T, K, FK, FE>(origin: &[T], replica: &[T], key_of: FK, equal: FE) -> DiffResult<K, T>
where
    T: Clone,
    K: Ord + Clone,
    FK: Fn(&T) -> K,
    FE: Fn(&T, &T) -> bool,
{
    let (origin_map, origin_duplicates) = index(origin, &key_of);
    let (mut replica_map, replica_duplicates) = index(replica, &key_of);

    let mut additions = BTreeMap::new();
    let mut updates = BTreeMap::new();
    let mut unchanged = 0;

    for (key, wanted) in origin_map {
        match replica_map.remove(&key) {
            None => {
                additions.insert(key, wanted.clone());
            }
            Some(current) if !equal(wanted, current) => {
                updates.insert(key, wanted.clone());
            }
            Some(_) => unchanged += 1,
        }
    }

    let removals = replica_map
        .into_iter()
        .map(|(key, item)| (key, item.clone()))
        .collect();

    DiffResult {
        additions,
        updates,
        removals,
        unchanged,
        origin_duplicates,
        replica_duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        key: &'static str,
        value: u32,
    }

    fn item(key: &'static str, value: u32) -> Item {
        Item { key, value }
    }

    fn run(origin: &[Item], replica: &[Item]) -> DiffResult<&'static str, Item> {
        diff(origin, replica, |i| i.key, |a, b| a.value == b.value)
    }

    #[test]
    fn classifies_every_key() {
        let origin = [item("a", 1), item("b", 2), item("c", 3)];
        let replica = [item("b", 2), item("c", 30), item("d", 4)];

        let result = run(&origin, &replica);
        assert_eq!(result.additions.keys().collect::<Vec<_>>(), [&"a"]);
        assert_eq!(result.updates.get("c"), Some(&item("c", 3)));
        assert_eq!(result.removals.get("d"), Some(&item("d", 4)));
        assert_eq!(result.unchanged, 1);
        assert_eq!(result.change_count(), 3);
    }

    #[test]
    fn identical_snapshots_are_empty() {
        let origin = [item("a", 1), item("b", 2)];
        let result = run(&origin, &origin);
        assert!(result.is_empty());
        assert_eq!(result.unchanged, 2);
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = run(&[item("x", 1), item("y", 2)], &[item("z", 3)]);
        let b = run(&[item("y", 2), item("x", 1)], &[item("z", 3)]);
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_keys_last_write_wins() {
        let origin = [item("a", 1), item("a", 2)];
        let replica = [item("a", 2)];
        let result = run(&origin, &replica);
        assert!(result.is_empty());
        assert_eq!(result.origin_duplicates, vec!["a"]);
        assert!(result.replica_duplicates.is_empty());
    }

    #[test]
    fn removals_carry_replica_item() {
        let result = run(&[], &[item("gone", 9)]);
        assert_eq!(result.removals.get("gone"), Some(&item("gone", 9)));
    }
}
