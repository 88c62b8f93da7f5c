//! Item selection, marks and reordering

use std::collections::BTreeSet;

/// Selected and marked item indices
#[derive(Clone, Debug, Default)]
pub struct ItemSelection {
    selected: BTreeSet<usize>,
    marked: BTreeSet<usize>,
    /// Origin of shift-click ranges
    anchor: Option<usize>,
    /// First click of a pending bracket range
    bracket_start: Option<usize>,
}

impl ItemSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    #[must_use]
    pub fn marked(&self) -> &BTreeSet<usize> {
        &self.marked
    }

    /// Selected indices in ascending order
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    #[must_use]
    pub fn bracket_start(&self) -> Option<usize> {
        self.bracket_start
    }

    /// Replace the selection with one item. Returns true if anything changed.
    pub fn select_only(&mut self, index: usize) -> bool {
        self.bracket_start = None;
        self.anchor = Some(index);
        if self.selected.len() == 1 && self.selected.contains(&index) {
            return false;
        }
        self.selected.clear();
        self.selected.insert(index);
        true
    }

    /// Ctrl-click
    pub fn toggle(&mut self, index: usize) {
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
        self.anchor = Some(index);
    }

    /// Shift-click: add the range from the anchor to `index`
    pub fn extend_to(&mut self, index: usize) {
        match self.anchor {
            Some(anchor) => {
                let (lo, hi) = (anchor.min(index), anchor.max(index));
                self.selected.extend(lo..=hi);
            }
            None => {
                self.select_only(index);
            }
        }
    }

    /// Two-click range. The first click selects `index` and remembers it;
    /// the second selects everything in between.
    pub fn bracket_click(&mut self, index: usize) {
        match self.bracket_start.take() {
            None => {
                self.selected.clear();
                self.selected.insert(index);
                self.bracket_start = Some(index);
                self.anchor = Some(index);
            }
            Some(start) => {
                let (lo, hi) = (start.min(index), start.max(index));
                self.selected = (lo..=hi).collect();
                self.anchor = Some(index);
            }
        }
    }

    pub fn set(&mut self, indices: impl IntoIterator<Item = usize>) {
        self.selected = indices.into_iter().collect();
        self.anchor = self.selected.iter().next_back().copied();
        self.bracket_start = None;
    }

    pub fn select_all(&mut self, count: usize) {
        self.set(0..count);
    }

    /// Returns true if the selection was not already empty
    pub fn clear(&mut self) -> bool {
        self.anchor = None;
        self.bracket_start = None;
        let had = !self.selected.is_empty();
        self.selected.clear();
        had
    }

    pub fn toggle_mark(&mut self, index: usize) {
        if !self.marked.remove(&index) {
            self.marked.insert(index);
        }
    }

    #[must_use]
    pub fn is_marked(&self, index: usize) -> bool {
        self.marked.contains(&index)
    }

    pub fn clear_marks(&mut self) {
        self.marked.clear();
    }

    /// Drop indices at or past `count` after the item list shrank
    pub fn truncate(&mut self, count: usize) {
        self.selected.retain(|i| *i < count);
        self.marked.retain(|i| *i < count);
        self.anchor = self.anchor.filter(|i| *i < count);
        self.bracket_start = self.bracket_start.filter(|i| *i < count);
    }

    /// Follow a reorder. `order[new] == old`.
    pub fn remap(&mut self, order: &[usize]) {
        let mut new_of_old = vec![usize::MAX; order.len()];
        for (new, &old) in order.iter().enumerate() {
            if let Some(slot) = new_of_old.get_mut(old) {
                *slot = new;
            }
        }
        let map = |set: &BTreeSet<usize>| -> BTreeSet<usize> {
            set.iter()
                .filter_map(|old| new_of_old.get(*old).copied())
                .filter(|new| *new != usize::MAX)
                .collect()
        };
        self.selected = map(&self.selected);
        self.marked = map(&self.marked);
        self.anchor = self
            .anchor
            .and_then(|old| new_of_old.get(old).copied())
            .filter(|new| *new != usize::MAX);
        self.bracket_start = None;
    }
}

/// New order after moving `moved` as one block to `insertion` (an index in
/// the original list). Relative order inside and outside the block is kept.
/// Returns `order` with `order[new] == old`, and where the block now starts.
#[must_use]
pub fn block_move_order(len: usize, moved: &BTreeSet<usize>, insertion: usize) -> (Vec<usize>, usize) {
    let insertion = insertion.min(len);
    let block: Vec<usize> = moved.iter().copied().filter(|i| *i < len).collect();
    let rest: Vec<usize> = (0..len).filter(|i| !moved.contains(i)).collect();
    let before = rest.partition_point(|i| *i < insertion);

    let mut order = Vec::with_capacity(len);
    order.extend_from_slice(&rest[..before]);
    order.extend_from_slice(&block);
    order.extend_from_slice(&rest[before..]);
    (order, before)
}

/// Reorders `values` so that `result[new] == values[order[new]]`
#[must_use]
pub fn apply_order<T: Clone>(values: &[T], order: &[usize]) -> Vec<T> {
    order.iter().filter_map(|old| values.get(*old).cloned()).collect()
}
