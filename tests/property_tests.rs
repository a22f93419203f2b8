use std::collections::BTreeSet;

use proptest::prelude::*;
use tracker_cache::SortedCache;

fn int_cache() -> SortedCache<i64> {
	SortedCache::new(Box::new(|a, b| a.cmp(b)))
}

proptest! {
	#[test]
	fn test_sorted_and_duplicate_free_under_random_ops(
		ops in prop::collection::vec((0u8..4, -50i64..50), 1..150)
	) {
		let cache = int_cache();
		for (kind, value) in ops {
			match kind {
				0 => {
					cache.insert(value);
				}
				1 => {
					cache.remove(&value);
				}
				2 => {
					cache.insert_or_update(value);
				}
				_ => {
					cache.update(&value, |v| *v = v.wrapping_add(17));
				}
			}
			// Strictly increasing: sorted AND no comparator-duplicates.
			let items = cache.sorted_items();
			prop_assert!(items.windows(2).all(|w| w[0] < w[1]));
		}
	}

	#[test]
	fn test_insert_reports_position_at_insertion(
		values in prop::collection::vec(-100i64..100, 1..50)
	) {
		let cache = int_cache();
		for v in values {
			if let Some(pos) = cache.insert(v) {
				prop_assert_eq!(cache.sorted_items()[pos], v);
			} else {
				// Rejected duplicate: the equivalent item must already exist.
				prop_assert!(cache.index_of(&v).is_some());
			}
		}
	}

	#[test]
	fn test_contents_match_distinct_inserts(
		values in prop::collection::vec(-100i64..100, 0..80)
	) {
		let cache = int_cache();
		let mut distinct = BTreeSet::new();
		for v in &values {
			cache.insert(*v);
			distinct.insert(*v);
		}
		prop_assert_eq!(cache.len(), distinct.len());
		prop_assert_eq!(cache.sorted_items(), distinct.into_iter().collect::<Vec<_>>());
	}

	#[test]
	fn test_pagination_agrees_with_full_view(
		values in prop::collection::vec(-100i64..100, 0..80),
		start in 0usize..100,
		count in 0usize..100,
	) {
		let cache = int_cache();
		for v in values {
			cache.insert(v);
		}
		let full = cache.sorted_items();
		let expected: Vec<i64> = full.iter().skip(start).take(count).copied().collect();
		prop_assert_eq!(cache.sorted_range(start, count), expected);
	}

	#[test]
	fn test_filtered_view_agrees_with_full_view(
		values in prop::collection::vec(-100i64..100, 0..80),
	) {
		let cache = int_cache();
		for v in values {
			cache.insert(v);
		}
		let expected: Vec<i64> = cache.sorted_items().into_iter().filter(|v| v % 2 == 0).collect();
		prop_assert_eq!(cache.find_all(|v| v % 2 == 0), expected);
	}

	#[test]
	fn test_update_equivalent_to_remove_insert(
		values in prop::collection::vec(-100i64..100, 1..40),
		pick in 0usize..40,
		delta in 1i64..500,
	) {
		let updated = int_cache();
		let reference = int_cache();
		for v in &values {
			updated.insert(*v);
			reference.insert(*v);
		}

		let items = updated.sorted_items();
		let target = items[pick % items.len()];
		let collides = updated.index_of(&(target + delta)).is_some();

		let pos = updated.update(&target, |v| *v += delta);

		if collides {
			// Update must roll back rather than merge two entries.
			prop_assert_eq!(pos, None);
			prop_assert_eq!(updated.sorted_items(), items);
		} else {
			reference.remove(&target);
			let ref_pos = reference.insert(target + delta);
			prop_assert_eq!(updated.sorted_items(), reference.sorted_items());
			prop_assert_eq!(pos, ref_pos);
		}
	}

	#[test]
	fn test_index_of_agrees_with_linear_scan(
		values in prop::collection::vec(-100i64..100, 1..60),
	) {
		let cache = int_cache();
		for v in &values {
			cache.insert(*v);
		}
		let items = cache.sorted_items();
		for v in values {
			prop_assert_eq!(cache.index_of(&v), items.iter().position(|i| *i == v));
		}
	}

	#[test]
	fn test_insert_or_update_idempotent(value in -100i64..100) {
		let cache = int_cache();
		cache.insert_or_update(value);
		cache.insert_or_update(value);
		prop_assert_eq!(cache.sorted_items(), vec![value]);
	}
}

#[test]
fn test_empty_cache_operations_do_not_panic() {
	let cache = int_cache();

	assert_eq!(cache.sorted_items(), Vec::<i64>::new());
	assert_eq!(cache.sorted_range(5, 5), Vec::<i64>::new());
	assert!(!cache.remove(&1));
	assert_eq!(cache.update(&1, |v| *v += 1), None);
	assert_eq!(cache.index_of(&1), None);
	assert_eq!(cache.find_first(|_| true), None);
	assert_eq!(cache.len(), 0);
	assert!(cache.is_empty());
}
