//! Insertion-order preserving set with O(1) membership and removal.
//!
//! Role membership, whitelist targets, and the pending-transaction index all
//! need enumerable sets with constant-time contains/add/remove. A `Vec` for
//! order plus a `HashMap` from value to position gives exactly that; removal
//! swap-removes and fixes up the displaced element's index.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderedSet<T>
where
    T: Clone + Eq + Hash,
{
    items: Vec<T>,
    positions: HashMap<T, usize>,
}

// A derived `Default` would demand `T: Default`, which element types like
// `RoleId` deliberately lack.
impl<T> Default for OrderedSet<T>
where
    T: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedSet<T>
where
    T: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self { items: Vec::new(), positions: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.positions.contains_key(value)
    }

    /// Insert a value; returns false if it was already present.
    pub fn insert(&mut self, value: T) -> bool {
        if self.positions.contains_key(&value) {
            return false;
        }
        self.positions.insert(value.clone(), self.items.len());
        self.items.push(value);
        true
    }

    /// Remove a value; returns false if it was absent.
    pub fn remove(&mut self, value: &T) -> bool {
        let Some(index) = self.positions.remove(value) else {
            return false;
        };
        self.items.swap_remove(index);
        if index < self.items.len() {
            // The former tail now lives at `index`.
            let moved = self.items[index].clone();
            self.positions.insert(moved, index);
        }
        true
    }

    /// Iterate in insertion order (modulo swap-removals).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}

impl<T> PartialEq for OrderedSet<T>
where
    T: Clone + Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T> Eq for OrderedSet<T> where T: Clone + Eq + Hash {}

impl<T> FromIterator<T> for OrderedSet<T>
where
    T: Clone + Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_contains_remove() {
        let mut set = OrderedSet::new();
        assert!(set.insert(7u64));
        assert!(!set.insert(7));
        assert!(set.contains(&7));
        assert_eq!(set.len(), 1);
        assert!(set.remove(&7));
        assert!(!set.remove(&7));
        assert!(set.is_empty());
    }

    #[test]
    fn swap_remove_keeps_index_consistent() {
        let mut set: OrderedSet<u64> = (0..10).collect();
        assert!(set.remove(&0));
        // 9 took 0's slot; every element must still be findable.
        for v in 1..10u64 {
            assert!(set.contains(&v), "lost {v} after swap-remove");
        }
        assert!(set.remove(&9));
        assert_eq!(set.len(), 8);
    }

    #[test]
    fn default_works_for_non_default_element_types() {
        // RoleId has no Default of its own.
        let set: OrderedSet<crate::ids::RoleId> = OrderedSet::default();
        assert!(set.is_empty());
    }

    #[test]
    fn preserves_insertion_order() {
        let set: OrderedSet<u64> = [3, 1, 2].into_iter().collect();
        assert_eq!(set.to_vec(), vec![3, 1, 2]);
    }

    proptest! {
        #[test]
        fn behaves_like_hashset(ops in prop::collection::vec((any::<bool>(), 0u8..32), 0..200)) {
            let mut set = OrderedSet::new();
            let mut model = std::collections::HashSet::new();
            for (is_insert, value) in ops {
                if is_insert {
                    prop_assert_eq!(set.insert(value), model.insert(value));
                } else {
                    prop_assert_eq!(set.remove(&value), model.remove(&value));
                }
                prop_assert_eq!(set.len(), model.len());
            }
            for value in model.iter() {
                prop_assert!(set.contains(value));
            }
        }
    }
}
