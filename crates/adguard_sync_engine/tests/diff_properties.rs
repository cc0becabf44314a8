//! Property tests for the keyed differ.

use adguard_sync_engine::{diff, DiffResult};
use adguard_sync_model::Filter;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Filters drawn from a small key space so that snapshots overlap.
fn filter_strategy() -> impl Strategy<Value = Filter> {
    (0u8..8, prop::sample::select(vec!["ads", "trackers", "malware"]), any::<bool>()).prop_map(
        |(n, name, enabled)| {
            let mut filter = Filter::new(name, format!("https://lists.example/{n}.txt"));
            filter.enabled = enabled;
            filter.id = i64::from(n) * 7;
            filter
        },
    )
}

fn snapshot_strategy() -> impl Strategy<Value = Vec<Filter>> {
    prop::collection::vec(filter_strategy(), 0..12)
}

fn run(origin: &[Filter], replica: &[Filter]) -> DiffResult<String, Filter> {
    diff(origin, replica, Filter::key, Filter::same_as)
}

/// Applies a diff to a replica snapshot the way the synchronizers do.
fn apply(result: &DiffResult<String, Filter>, replica: &[Filter]) -> Vec<Filter> {
    let mut state: BTreeMap<String, Filter> = replica.iter().map(|f| (f.key(), f.clone())).collect();
    for key in result.removals.keys() {
        state.remove(key);
    }
    for (key, filter) in result.additions.iter().chain(result.updates.iter()) {
        state.insert(key.clone(), filter.clone());
    }
    state.into_values().collect()
}

fn unique_keys(items: &[Filter]) -> BTreeSet<String> {
    items.iter().map(Filter::key).collect()
}

proptest! {
    #[test]
    fn diff_with_itself_is_empty(snapshot in snapshot_strategy()) {
        let result = run(&snapshot, &snapshot);
        prop_assert!(result.is_empty());
        prop_assert_eq!(result.unchanged, unique_keys(&snapshot).len());
    }

    #[test]
    fn applying_a_diff_converges(origin in snapshot_strategy(), replica in snapshot_strategy()) {
        let result = run(&origin, &replica);
        let converged = apply(&result, &replica);
        prop_assert!(run(&origin, &converged).is_empty());
    }

    #[test]
    fn classes_are_disjoint(origin in snapshot_strategy(), replica in snapshot_strategy()) {
        let result = run(&origin, &replica);
        for key in result.additions.keys() {
            prop_assert!(!result.updates.contains_key(key));
            prop_assert!(!result.removals.contains_key(key));
        }
        for key in result.updates.keys() {
            prop_assert!(!result.removals.contains_key(key));
        }
    }

    #[test]
    fn every_key_is_classified_once(origin in snapshot_strategy(), replica in snapshot_strategy()) {
        let result = run(&origin, &replica);
        prop_assert_eq!(
            result.additions.len() + result.updates.len() + result.unchanged,
            unique_keys(&origin).len()
        );
        prop_assert_eq!(
            result.removals.len() + result.updates.len() + result.unchanged,
            unique_keys(&replica).len()
        );
    }

    #[test]
    fn input_order_is_irrelevant_without_duplicates(
        origin in prop::collection::btree_map(0u8..8, any::<bool>(), 0..8),
        replica in prop::collection::btree_map(0u8..8, any::<bool>(), 0..8),
    ) {
        let to_filters = |m: &BTreeMap<u8, bool>| -> Vec<Filter> {
            m.iter()
                .map(|(n, enabled)| Filter::new("list", format!("https://lists.example/{n}.txt")).with_enabled(*enabled))
                .collect()
        };
        let origin = to_filters(&origin);
        let replica = to_filters(&replica);
        let mut origin_rev = origin.clone();
        origin_rev.reverse();
        let mut replica_rev = replica.clone();
        replica_rev.reverse();

        prop_assert_eq!(run(&origin, &replica), run(&origin_rev, &replica_rev));
    }
}

#[test]
fn server_assigned_fields_never_cause_updates() {
    let mut local = Filter::new("ads", "https://lists.example/1.txt");
    local.id = 99;
    local.rules_count = 12_000;
    local.last_updated = Some("2024-01-01T00:00:00Z".into());
    let origin = [Filter::new("ads", "https://lists.example/1.txt")];

    let result = run(&origin, &[local]);
    assert!(result.is_empty());
    assert_eq!(result.unchanged, 1);
}
