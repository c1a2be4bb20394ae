//! Set difference between what is on disk and what is cataloged.

use std::collections::BTreeSet;

/// Identities present on exactly one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference<T> {
    /// On disk, missing from the catalog
    pub uncataloged: BTreeSet<T>,
    /// In the catalog, missing from disk
    pub stale: BTreeSet<T>,
}

impl<T> Difference<T> {
    pub fn is_empty(&self) -> bool {
        self.uncataloged.is_empty() && self.stale.is_empty()
    }
}

/// Split the symmetric difference of `storage` and `catalog` by origin.
///
/// Identities match only when exactly equal: a file that moved shows up once
/// in each half, never as a single update.
pub fn difference<T: Ord + Clone>(storage: &BTreeSet<T>, catalog: &BTreeSet<T>) -> Difference<T> {
    let symmetric: BTreeSet<T> = storage.symmetric_difference(catalog).cloned().collect();
    Difference {
        uncataloged: symmetric.intersection(storage).cloned().collect(),
        stale: symmetric.intersection(catalog).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    use super::*;

    fn set(items: &[&'static str]) -> BTreeSet<&'static str> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_moved_file_is_stale_and_uncataloged() {
        let storage = set(&["new/a.txt", "same.txt"]);
        let catalog = set(&["old/a.txt", "same.txt"]);

        let diff = difference(&storage, &catalog);
        assert_eq!(diff.uncataloged, set(&["new/a.txt"]));
        assert_eq!(diff.stale, set(&["old/a.txt"]));
    }

    #[test]
    fn test_identical_sets() {
        let both = set(&["a.txt", "b/c.txt"]);
        assert!(difference(&both, &both).is_empty());
    }

    #[test]
    fn test_one_side_empty() {
        let files = set(&["a.txt", "b/c.txt"]);
        let empty = BTreeSet::new();

        let diff = difference(&files, &empty);
        assert_eq!(diff.uncataloged, files);
        assert!(diff.stale.is_empty());

        let diff = difference(&empty, &files);
        assert!(diff.uncataloged.is_empty());
        assert_eq!(diff.stale, files);
    }

    proptest! {
        #[test]
        fn decomposes_symmetric_difference(
            storage in btree_set(0u8..40, 0..30),
            catalog in btree_set(0u8..40, 0..30),
        ) {
            let diff = difference(&storage, &catalog);
            let symmetric: BTreeSet<u8> = storage.symmetric_difference(&catalog).copied().collect();

            let union: BTreeSet<u8> = diff.uncataloged.union(&diff.stale).copied().collect();
            prop_assert_eq!(&union, &symmetric);
            prop_assert!(diff.uncataloged.is_disjoint(&diff.stale));

            let by_subtraction: BTreeSet<u8> = symmetric.difference(&catalog).copied().collect();
            prop_assert_eq!(&diff.uncataloged, &by_subtraction);
            let by_subtraction: BTreeSet<u8> = symmetric.difference(&storage).copied().collect();
            prop_assert_eq!(&diff.stale, &by_subtraction);
        }
    }
}
