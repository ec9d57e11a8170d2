//! Per-loop bookkeeping for scroll-driven harvesting
//!
//! Both scroll loops (post links on a profile, comment items on a post)
//! track the same three things: what has been discovered so far, the
//! count seen at the last check, and how many checks in a row made no
//! progress.

use std::collections::HashSet;
use std::hash::Hash;

/// Discovery state of one harvesting operation
#[derive(Debug, Clone)]
pub struct HarvestState<T> {
    /// Discovered items in first-seen order
    items: Vec<T>,

    /// Membership index over `items`
    seen: HashSet<T>,

    /// Item count at the previous progress check
    last_seen: Option<usize>,

    /// Consecutive progress checks without growth
    no_progress: u32,
}

impl<T> Default for HarvestState<T>
where
    T: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HarvestState<T>
where
    T: Clone + Eq + Hash,
{
    /// Creates an empty state
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            last_seen: None,
            no_progress: 0,
        }
    }

    /// Merges candidates, keeping first-seen order
    ///
    /// # Returns
    ///
    /// The number of items that were new
    pub fn merge<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut added = 0;
        for item in candidates {
            if self.seen.insert(item.clone()) {
                self.items.push(item);
                added += 1;
            }
        }
        added
    }

    /// Number of distinct items discovered
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing has been discovered
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Compares the current count against the watermark
    ///
    /// Growth resets the no-progress counter and moves the watermark; no
    /// growth increments the counter.
    ///
    /// # Returns
    ///
    /// `true` if the count grew since the previous check
    pub fn check_progress(&mut self) -> bool {
        let current = self.items.len();
        if self.last_seen == Some(current) {
            self.no_progress += 1;
            false
        } else {
            self.no_progress = 0;
            self.last_seen = Some(current);
            true
        }
    }

    /// Consecutive checks without growth
    pub fn no_progress(&self) -> u32 {
        self.no_progress
    }

    /// Discovered items in first-seen order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the state, returning the discovered items
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_first_seen_order() {
        let mut state = HarvestState::new();
        assert_eq!(state.merge(vec!["b", "a", "b"]), 2);
        assert_eq!(state.merge(vec!["c", "a"]), 1);
        assert_eq!(state.items(), &["b", "a", "c"]);
    }

    #[test]
    fn test_first_check_counts_as_progress() {
        let mut state: HarvestState<&str> = HarvestState::new();
        assert!(state.check_progress());
        assert_eq!(state.no_progress(), 0);
    }

    #[test]
    fn test_stall_counter() {
        let mut state = HarvestState::new();
        state.merge(vec![1]);
        assert!(state.check_progress());
        assert!(!state.check_progress());
        assert!(!state.check_progress());
        assert_eq!(state.no_progress(), 2);

        state.merge(vec![2]);
        assert!(state.check_progress());
        assert_eq!(state.no_progress(), 0);
    }
}
