//! Ordered collection that stays consistent while it is being walked.
//!
//! Traversal is cursor based: [`SafeList::begin`] registers a cursor,
//! [`SafeList::advance`] yields the next element by value and
//! [`SafeList::end`] releases it. No borrow of the list is held between two
//! advances, so the code running for one element may push, remove or clear
//! elements (including itself) and every live cursor is corrected before it
//! moves again.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to one in-progress traversal of a [`SafeList`].
    pub struct Cursor;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Invalidation {
    Removed(usize),
    Cleared,
}

#[derive(Debug, Default)]
struct CursorState {
    next: usize,
    pending: Vec<Invalidation>,
}

impl CursorState {
    fn settle(&mut self) {
        for invalidation in self.pending.drain(..) {
            match invalidation {
                Invalidation::Removed(index) if index < self.next => self.next -= 1,
                Invalidation::Removed(_) => {}
                Invalidation::Cleared => self.next = 0,
            }
        }
    }
}

#[derive(Debug)]
pub struct SafeList<T> {
    items: Vec<T>,
    cursors: SlotMap<Cursor, CursorState>,
}

impl<T> Default for SafeList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursors: SlotMap::with_key(),
        }
    }
}

impl<T: Clone + PartialEq> SafeList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.items.contains(value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Copy of the current contents, used where a traversal must not observe
    /// later mutation at all.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn push(&mut self, value: T) {
        self.items.push(value);
    }

    /// Removes the first element equal to `value`. Absent values are ignored.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.items.iter().position(|item| item == value) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Removes every element matching `predicate`, returning how many went.
    pub fn remove_all<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut index = 0;
        let mut removed = 0;
        while index < self.items.len() {
            if predicate(&self.items[index]) {
                self.remove_at(index);
                removed += 1;
            } else {
                index += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        for cursor in self.cursors.values_mut() {
            cursor.pending.push(Invalidation::Cleared);
        }
        self.items.clear();
    }

    pub fn begin(&mut self) -> Cursor {
        self.cursors.insert(CursorState::default())
    }

    /// Next element for `cursor`, or `None` once the tail is reached or the
    /// cursor has been released.
    pub fn advance(&mut self, cursor: Cursor) -> Option<T> {
        let state = self.cursors.get_mut(cursor)?;
        state.settle();
        let item = self.items.get(state.next)?.clone();
        state.next += 1;
        Some(item)
    }

    pub fn end(&mut self, cursor: Cursor) {
        self.cursors.remove(cursor);
    }

    pub fn active_cursors(&self) -> usize {
        self.cursors.len()
    }

    fn remove_at(&mut self, index: usize) -> T {
        for cursor in self.cursors.values_mut() {
            cursor.pending.push(Invalidation::Removed(index));
        }
        self.items.remove(index)
    }
}

impl<T: Clone + PartialEq> FromIterator<T> for SafeList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            cursors: SlotMap::with_key(),
        }
    }
}

impl<'a, T> IntoIterator for &'a SafeList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk<F>(list: &mut SafeList<u32>, mut on_item: F) -> Vec<u32>
    where
        F: FnMut(&mut SafeList<u32>, u32),
    {
        let cursor = list.begin();
        let mut visited = Vec::new();
        while let Some(item) = list.advance(cursor) {
            visited.push(item);
            on_item(list, item);
        }
        list.end(cursor);
        visited
    }

    #[test]
    fn test_plain_traversal_visits_in_order() {
        let mut list: SafeList<u32> = (1..=4).collect();
        assert_eq!(walk(&mut list, |_, _| {}), vec![1, 2, 3, 4]);
        assert_eq!(list.active_cursors(), 0);
    }

    #[test]
    fn test_removing_current_element_does_not_skip_next() {
        let mut list: SafeList<u32> = (1..=4).collect();
        let visited = walk(&mut list, |list, item| {
            if item == 2 {
                list.remove(&2);
            }
        });
        assert_eq!(visited, vec![1, 2, 3, 4]);
        assert_eq!(list.snapshot(), vec![1, 3, 4]);
    }

    #[test]
    fn test_removing_later_element_is_never_visited() {
        let mut list: SafeList<u32> = (1..=5).collect();
        let visited = walk(&mut list, |list, item| {
            if item == 1 {
                list.remove(&4);
            }
        });
        assert_eq!(visited, vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_removing_earlier_element_does_not_revisit() {
        let mut list: SafeList<u32> = (1..=5).collect();
        let visited = walk(&mut list, |list, item| {
            if item == 3 {
                list.remove(&1);
                list.remove(&2);
            }
        });
        assert_eq!(visited, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_appended_elements_are_visited() {
        let mut list: SafeList<u32> = (1..=2).collect();
        let visited = walk(&mut list, |list, item| {
            if item < 4 {
                list.push(item + 2);
            }
        });
        assert_eq!(visited, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_clear_stops_traversal() {
        let mut list: SafeList<u32> = (1..=5).collect();
        let visited = walk(&mut list, |list, item| {
            if item == 2 {
                list.clear();
            }
        });
        assert_eq!(visited, vec![1, 2]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_clear_then_push_restarts_from_front() {
        let mut list: SafeList<u32> = (1..=3).collect();
        let visited = walk(&mut list, |list, item| {
            if item == 2 {
                list.clear();
                list.push(10);
            }
        });
        assert_eq!(visited, vec![1, 2, 10]);
    }

    #[test]
    fn test_nested_cursors_are_corrected_independently() {
        let mut list: SafeList<u32> = (1..=4).collect();
        let outer = list.begin();
        let mut outer_seen = Vec::new();
        let mut inner_seen = Vec::new();
        while let Some(item) = list.advance(outer) {
            outer_seen.push(item);
            if item == 1 {
                let inner = list.begin();
                while let Some(inner_item) = list.advance(inner) {
                    inner_seen.push(inner_item);
                    if inner_item == 2 {
                        list.remove(&1);
                        list.remove(&3);
                    }
                }
                list.end(inner);
            }
        }
        list.end(outer);
        assert_eq!(inner_seen, vec![1, 2, 4]);
        assert_eq!(outer_seen, vec![1, 2, 4]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut list: SafeList<u32> = (1..=3).collect();
        assert!(!list.remove(&9));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_all_during_traversal() {
        let mut list: SafeList<u32> = (1..=6).collect();
        let visited = walk(&mut list, |list, item| {
            if item == 2 {
                list.remove_all(|v| v % 2 == 0);
            }
        });
        assert_eq!(visited, vec![1, 2, 3, 5]);
        assert_eq!(list.snapshot(), vec![1, 3, 5]);
    }

    #[test]
    fn test_duplicates_remove_first_occurrence() {
        let mut list: SafeList<u32> = vec![7, 8, 7].into_iter().collect();
        list.remove(&7);
        assert_eq!(list.snapshot(), vec![8, 7]);
    }

    #[test]
    fn test_released_cursor_yields_nothing() {
        let mut list: SafeList<u32> = (1..=2).collect();
        let cursor = list.begin();
        list.end(cursor);
        assert_eq!(list.advance(cursor), None);
    }
}
