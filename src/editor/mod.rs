//! Ordered, selectable source lists and the editors built on them.
//!
//! Selection is an index into the list; every visual marker is derived from
//! it. Moving the selection swaps it with its neighbour and the selection
//! follows the moved item.

use crate::models::MoveDirection;

pub mod danmaku;
pub mod metadata;

pub use danmaku::{ListView, LoadTicket, ProviderListEditor};
pub use metadata::MetadataListEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Error,
}

/// A user-facing outcome report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectableList<T> {
    items: Vec<T>,
    selected: Option<usize>,
}

impl<T> Default for SelectableList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: None,
        }
    }
}

impl<T> SelectableList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            selected: None,
        }
    }

    /// Swaps in a new list wholesale and drops the selection.
    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        self.selected = None;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|idx| self.items.get(idx))
    }

    pub fn selected_item_mut(&mut self) -> Option<&mut T> {
        self.selected.and_then(|idx| self.items.get_mut(idx))
    }

    /// Out-of-range indexes leave the selection untouched.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.selected = Some(index);
        true
    }

    pub fn select_next(&mut self) {
        let next = match self.selected {
            Some(idx) => idx + 1,
            None => 0,
        };
        self.select(next);
    }

    pub fn select_previous(&mut self) {
        match self.selected {
            Some(idx) if idx > 0 => {
                self.select(idx - 1);
            }
            Some(_) => {}
            None => {
                self.select(0);
            }
        }
    }

    pub fn move_selected(&mut self, direction: MoveDirection) -> bool {
        let Some(idx) = self.selected else {
            return false;
        };
        let target = match direction {
            MoveDirection::Up if idx > 0 => idx - 1,
            MoveDirection::Down if idx + 1 < self.items.len() => idx + 1,
            _ => return false,
        };
        self.items.swap(idx, target);
        self.selected = Some(target);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters() -> SelectableList<char> {
        SelectableList::new(vec!['a', 'b', 'c', 'd'])
    }

    #[test]
    fn select_out_of_range_keeps_previous_selection() {
        let mut list = letters();
        assert!(list.select(2));
        assert!(!list.select(4));
        assert_eq!(list.selected(), Some(2));
        assert_eq!(list.selected_item(), Some(&'c'));
    }

    #[test]
    fn boundary_moves_are_noops() {
        let mut list = letters();
        list.select(0);
        assert!(!list.move_selected(MoveDirection::Up));
        assert_eq!(list.items(), &['a', 'b', 'c', 'd']);
        assert_eq!(list.selected(), Some(0));

        list.select(3);
        assert!(!list.move_selected(MoveDirection::Down));
        assert_eq!(list.items(), &['a', 'b', 'c', 'd']);
        assert_eq!(list.selected(), Some(3));
    }

    #[test]
    fn move_without_selection_is_noop() {
        let mut list = letters();
        assert!(!list.move_selected(MoveDirection::Down));
        assert_eq!(list.items(), &['a', 'b', 'c', 'd']);
    }

    #[test]
    fn alternating_moves_round_trip_to_original_order() {
        let mut list = letters();
        list.select(1);
        for _ in 0..3 {
            assert!(list.move_selected(MoveDirection::Down));
            assert!(list.move_selected(MoveDirection::Up));
        }
        assert_eq!(list.items(), &['a', 'b', 'c', 'd']);
        assert_eq!(list.selected(), Some(1));

        list.move_selected(MoveDirection::Down);
        list.move_selected(MoveDirection::Down);
        assert_eq!(list.items(), &['a', 'c', 'd', 'b']);
        assert_eq!(list.selected(), Some(3));
        list.move_selected(MoveDirection::Up);
        list.move_selected(MoveDirection::Up);
        assert_eq!(list.items(), &['a', 'b', 'c', 'd']);
    }

    #[test]
    fn keyboard_cursor_starts_at_top_and_clamps() {
        let mut list = letters();
        list.select_previous();
        assert_eq!(list.selected(), Some(0));
        list.select_previous();
        assert_eq!(list.selected(), Some(0));
        list.select(3);
        list.select_next();
        assert_eq!(list.selected(), Some(3));
    }

    #[test]
    fn replace_clears_selection() {
        let mut list = letters();
        list.select(1);
        list.replace(vec!['z']);
        assert_eq!(list.selected(), None);
        assert_eq!(list.items(), &['z']);
    }
}
