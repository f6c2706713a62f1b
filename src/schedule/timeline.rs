//! Ordered, duplicate-rejecting collection of time-like entries.
//!
//! Every event category of a group (one-time meetings, weekly meetings,
//! birthdays) keeps its entries in a [`SortedTimeline`]: a strictly ascending
//! sequence with binary-search insertion and all-or-nothing positional
//! removal. An element that compares equal to an existing one is a duplicate
//! by definition and is rejected without mutating the collection.

/// A strictly ascending sequence of `T` with no duplicate elements.
///
/// The timeline is owned exclusively by one group category; all mutation goes
/// through [`insert`](SortedTimeline::insert) and
/// [`remove_at`](SortedTimeline::remove_at), so the ascending/no-duplicate
/// invariant can never be broken from outside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortedTimeline<T> {
    items: Vec<T>,
}

impl<T: Ord> SortedTimeline<T> {
    /// Creates an empty timeline.
    pub fn new() -> Self {
        SortedTimeline { items: Vec::new() }
    }

    /// Inserts `item` at its sorted position.
    ///
    /// Returns `true` if the item was inserted, `false` if an equal item is
    /// already present (in which case nothing changes). The binary search
    /// handles the empty and single-element cases without special-casing.
    pub fn insert(&mut self, item: T) -> bool {
        self.insert_ranked(item).is_some()
    }

    /// Like [`insert`](SortedTimeline::insert), but reports the 0-based
    /// position the item landed at. Returns `None` on a duplicate.
    ///
    /// The position is what the alert loops care about: an item that lands
    /// at or before the "not yet warned" cursor changes what the loops must
    /// wait on.
    pub fn insert_ranked(&mut self, item: T) -> Option<usize> {
        match self.items.binary_search(&item) {
            Ok(_) => None,
            Err(pos) => {
                self.items.insert(pos, item);
                Some(pos)
            }
        }
    }

    /// Removes the entries at the given 1-based positions, all or nothing.
    ///
    /// If `positions` is empty, or any position is 0 or greater than the
    /// current length, no removal is performed and `false` is returned.
    /// Otherwise every listed position (duplicates collapsed) is removed as
    /// of its pre-removal index and `true` is returned. Removal proceeds from
    /// the highest position down so earlier removals cannot shift the later
    /// ones.
    pub fn remove_at(&mut self, positions: &[usize]) -> bool {
        if positions.is_empty() {
            return false;
        }
        if positions.iter().any(|&p| p == 0 || p > self.items.len()) {
            return false;
        }

        let mut descending: Vec<usize> = positions.to_vec();
        descending.sort_unstable_by(|a, b| b.cmp(a));
        descending.dedup();

        for position in descending {
            self.items.remove(position - 1);
        }

        true
    }

    /// Removes and returns the earliest entry.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Returns the 0-based position of an entry equal to `item`, if any.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.binary_search(item).ok()
    }

    /// Returns the entry at the 0-based `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns the earliest entry.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the entries as an ascending slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Ord> Default for SortedTimeline<T> {
    fn default() -> Self {
        SortedTimeline::new()
    }
}
