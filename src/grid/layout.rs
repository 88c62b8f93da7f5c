//! Flow layout for variable-size thumbnails
//!
//! Items are packed left to right in index order and wrap when the next item
//! (plus the fixed gap) would overflow the container. Section starts force a
//! row break unless the grid is in continuous mode, where sections flow on
//! the same row and headers are anchored at the first item of each section.

use std::collections::{BTreeMap, HashMap};

use super::types::{LayoutPosition, Section};

/// Separation between items in pixels, independent of zoom
pub const DEFAULT_GAP: i32 = 3;

/// Anchor of a section header: position of the section's first item and the
/// width that section occupies on that row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderAnchor {
    pub x: i32,
    pub y: i32,
    pub row_width: i32,
}

/// Inputs to a layout pass
#[derive(Clone, Copy, Debug)]
pub struct LayoutInput<'a> {
    pub item_sizes: &'a [(i32, i32)],
    pub container_width: i32,
    pub sections: &'a [Section],
    pub continuous: bool,
    pub gap: i32,
}

impl<'a> LayoutInput<'a> {
    #[must_use]
    pub fn new(item_sizes: &'a [(i32, i32)], container_width: i32) -> Self {
        Self {
            item_sizes,
            container_width,
            sections: &[],
            continuous: false,
            gap: DEFAULT_GAP,
        }
    }

    #[must_use]
    pub fn with_sections(mut self, sections: &'a [Section], continuous: bool) -> Self {
        self.sections = sections;
        self.continuous = continuous;
        self
    }

    #[must_use]
    pub fn with_gap(mut self, gap: i32) -> Self {
        self.gap = gap.max(0);
        self
    }
}

/// Result of a layout pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridLayout {
    /// Effective container width (never below 1)
    pub width: i32,
    pub positions: Vec<LayoutPosition>,
    /// Row top -> committed row height (gap included)
    pub row_heights: BTreeMap<i32, i32>,
    pub total_height: i32,
    /// Section index -> (y_start, y_end)
    pub section_bounds: BTreeMap<usize, (i32, i32)>,
    pub section_headers: BTreeMap<usize, HeaderAnchor>,
}

impl GridLayout {
    /// Computes the layout. Pure: identical inputs give identical outputs.
    #[must_use]
    pub fn compute(input: &LayoutInput<'_>) -> Self {
        let width = input.container_width.max(1);
        let gap = input.gap.max(0);
        let mut layout = Self {
            width,
            ..Self::default()
        };

        if input.item_sizes.is_empty() {
            for idx in 0..input.sections.len() {
                layout.section_bounds.insert(idx, (0, 0));
            }
            return layout;
        }

        // Later sections win for a shared start index; the earlier (empty)
        // ones are filled in as skipped.
        let section_starts: HashMap<usize, usize> = input
            .sections
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.start_index, idx))
            .collect();

        let mut x = 0;
        let mut y = 0;
        let mut row_height = 0;
        let mut section_start_y = 0;
        let mut active_section = section_starts.get(&0).copied().unwrap_or(0);
        for skipped in 0..active_section {
            layout.section_bounds.insert(skipped, (0, 0));
        }

        layout.positions.reserve(input.item_sizes.len());

        for (i, &(w, h)) in input.item_sizes.iter().enumerate() {
            let w = w.max(0);
            let h = h.max(0);

            if i > 0 {
                if let Some(&new_section) = section_starts.get(&i) {
                    if new_section != active_section {
                        if !input.continuous && x > 0 {
                            if row_height > 0 {
                                layout.row_heights.insert(y, row_height);
                            }
                            y += row_height;
                            x = 0;
                            row_height = 0;
                        }

                        layout
                            .section_bounds
                            .insert(active_section, (section_start_y, y));
                        for skipped in (active_section + 1)..new_section {
                            layout.section_bounds.insert(skipped, (y, y));
                        }
                        section_start_y = y;
                        active_section = new_section;
                    }
                }
            }

            let cell_w = w + gap;
            let cell_h = h + gap;

            if x > 0 && x + cell_w > width {
                if row_height > 0 {
                    layout.row_heights.insert(y, row_height);
                }
                y += row_height;
                x = 0;
                row_height = 0;
            }

            layout.positions.push(LayoutPosition::new(x, y, w, h));

            if let Some(&sec_idx) = section_starts.get(&i) {
                layout.section_headers.insert(
                    sec_idx,
                    HeaderAnchor {
                        x,
                        y,
                        row_width: 0,
                    },
                );
            }

            x += cell_w;
            row_height = row_height.max(cell_h);
        }

        if row_height > 0 {
            layout.row_heights.insert(y, row_height);
            y += row_height;
        }
        layout.total_height = y;

        if !input.sections.is_empty() {
            layout
                .section_bounds
                .insert(active_section, (section_start_y, y));
            for skipped in (active_section + 1)..input.sections.len() {
                layout.section_bounds.insert(skipped, (y, y));
            }
        }

        layout.fill_header_widths(input.sections);
        layout
    }

    /// Limits each header to the span its own section covers on the header's row
    fn fill_header_widths(&mut self, sections: &[Section]) {
        let count = self.positions.len();
        for (&sec_idx, anchor) in self.section_headers.iter_mut() {
            let Some(section) = sections.get(sec_idx) else {
                continue;
            };
            let end = section.end_index().min(count);
            let mut max_right = anchor.x;
            for pos in self.positions.iter().take(end).skip(section.start_index) {
                if pos.y != anchor.y {
                    break;
                }
                max_right = pos.right();
            }
            anchor.row_width = max_right - anchor.x;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn position(&self, index: usize) -> Option<LayoutPosition> {
        self.positions.get(index).copied()
    }

    /// Height of the row starting at `y`, gap included
    #[must_use]
    pub fn row_height_at(&self, y: i32) -> i32 {
        self.row_heights.get(&y).copied().unwrap_or(0)
    }

    /// Index of the item at content coordinates, inclusive edges
    #[must_use]
    pub fn item_at(&self, x: i32, y: i32) -> Option<usize> {
        self.positions.iter().position(|p| p.contains(x, y))
    }

    /// Half-open range of item indices intersecting `[scroll_y, scroll_y + view_height]`
    #[must_use]
    pub fn visible_range(&self, scroll_y: i32, view_height: i32) -> (usize, usize) {
        if self.positions.is_empty() {
            return (0, 0);
        }
        let top = scroll_y;
        let bottom = scroll_y + view_height.max(0);

        // Rows are ordered by y, so whole rows above the viewport can be skipped.
        let first_row = self
            .positions
            .partition_point(|p| p.y + self.row_height_at(p.y).max(p.height) < top);

        let mut start = None;
        let mut end = 0;
        for (i, pos) in self.positions.iter().enumerate().skip(first_row) {
            if pos.y > bottom {
                break;
            }
            if pos.bottom() >= top {
                if start.is_none() {
                    start = Some(i);
                }
                end = i + 1;
            }
        }
        match start {
            Some(start) => (start, end),
            None => (0, 0),
        }
    }

    /// Last index on the same row as `index`
    #[must_use]
    pub fn last_in_row(&self, index: usize) -> Option<usize> {
        let row_y = self.positions.get(index)?.y;
        let mut last = index;
        while let Some(next) = self.positions.get(last + 1) {
            if next.y != row_y {
                break;
            }
            last += 1;
        }
        Some(last)
    }

    /// First index of the row whose vertical band contains `y`
    #[must_use]
    pub fn row_start_at(&self, y: i32) -> Option<usize> {
        let (&row_y, &height) = self.row_heights.range(..=y).next_back()?;
        if y >= row_y + height {
            return None;
        }
        self.positions.iter().position(|p| p.y == row_y)
    }

    /// Item visually above `index`: nearest row first, then nearest centre
    #[must_use]
    pub fn item_above(&self, index: usize) -> Option<usize> {
        let current = self.positions.get(index)?;
        self.nearest_by(current, |p| {
            (p.bottom() <= current.y).then(|| current.y - p.bottom())
        })
    }

    /// Item visually below `index`: nearest row first, then nearest centre
    #[must_use]
    pub fn item_below(&self, index: usize) -> Option<usize> {
        let current = self.positions.get(index)?;
        self.nearest_by(current, |p| {
            (p.y >= current.bottom()).then(|| p.y - current.bottom())
        })
    }

    fn nearest_by(
        &self,
        current: &LayoutPosition,
        vertical_gap: impl Fn(&LayoutPosition) -> Option<i32>,
    ) -> Option<usize> {
        let center = current.center_x();
        let mut best: Option<(f32, usize)> = None;
        for (i, pos) in self.positions.iter().enumerate() {
            let Some(gap) = vertical_gap(pos) else {
                continue;
            };
            let score = gap as f32 * 1000.0 + (pos.center_x() - center).abs();
            if best.is_none_or(|(s, _)| score < s) {
                best = Some((score, i));
            }
        }
        best.map(|(_, i)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(n: usize, w: i32, h: i32) -> Vec<(i32, i32)> {
        vec![(w, h); n]
    }

    fn assert_no_row_overlap(layout: &GridLayout) {
        for pair in layout.positions.windows(2) {
            if pair[0].y == pair[1].y {
                assert!(pair[0].right() < pair[1].x, "{:?} overlaps {:?}", pair[0], pair[1]);
            } else {
                assert!(pair[0].y < pair[1].y);
            }
        }
        let sum: i32 = layout.row_heights.values().sum();
        assert_eq!(sum, layout.total_height);
    }

    #[test]
    fn seven_items_fit_in_750() {
        let sizes = uniform(10, 100, 150);
        let layout = GridLayout::compute(&LayoutInput::new(&sizes, 750));

        for i in 0..7 {
            assert_eq!(layout.positions[i].y, 0);
            assert_eq!(layout.positions[i].x, i as i32 * 103);
        }
        assert_eq!(layout.positions[7], LayoutPosition::new(0, 153, 100, 150));
        assert_eq!(layout.total_height, 306);
        assert_no_row_overlap(&layout);
    }

    #[test]
    fn empty_input_gives_empty_layout() {
        let layout = GridLayout::compute(&LayoutInput::new(&[], 500));
        assert!(layout.is_empty());
        assert_eq!(layout.total_height, 0);
        assert_eq!(layout.visible_range(0, 100), (0, 0));
    }

    #[test]
    fn non_positive_width_is_treated_as_one() {
        let sizes = uniform(3, 10, 10);
        let layout = GridLayout::compute(&LayoutInput::new(&sizes, -20));
        assert_eq!(layout.width, 1);
        // Every item sits alone on its own row.
        assert_eq!(layout.positions[1].y, 13);
        assert_eq!(layout.positions[2].y, 26);
        assert_no_row_overlap(&layout);
    }

    #[test]
    fn oversized_item_gets_its_own_row() {
        let sizes = vec![(50, 10), (900, 10), (50, 10)];
        let layout = GridLayout::compute(&LayoutInput::new(&sizes, 400));
        assert_eq!(layout.positions[1], LayoutPosition::new(0, 13, 900, 10));
        assert_eq!(layout.positions[2].y, 26);
    }

    #[test]
    fn section_forces_row_break() {
        let sizes = uniform(6, 100, 100);
        let sections = vec![Section::new("A", 0, 2), Section::new("B", 2, 4)];
        let layout =
            GridLayout::compute(&LayoutInput::new(&sizes, 1000).with_sections(&sections, false));

        assert_eq!(layout.positions[1].y, 0);
        assert_eq!(layout.positions[2], LayoutPosition::new(0, 103, 100, 100));
        assert_eq!(layout.section_bounds[&0], (0, 103));
        assert_eq!(layout.section_bounds[&1], (103, 206));
        assert_no_row_overlap(&layout);
    }

    #[test]
    fn continuous_mode_shares_rows_and_limits_header_width() {
        let sizes = uniform(6, 100, 100);
        let sections = vec![Section::new("A", 0, 2), Section::new("B", 2, 4)];
        let layout =
            GridLayout::compute(&LayoutInput::new(&sizes, 1000).with_sections(&sections, true));

        assert_eq!(layout.positions[2], LayoutPosition::new(206, 0, 100, 100));
        assert_eq!(
            layout.section_headers[&0],
            HeaderAnchor {
                x: 0,
                y: 0,
                row_width: 203
            }
        );
        assert_eq!(
            layout.section_headers[&1],
            HeaderAnchor {
                x: 206,
                y: 0,
                row_width: 100 + 3 * 103
            }
        );
    }

    #[test]
    fn header_width_stops_at_row_end() {
        let sizes = uniform(6, 100, 100);
        let sections = vec![Section::new("A", 0, 2), Section::new("B", 2, 4)];
        let layout =
            GridLayout::compute(&LayoutInput::new(&sizes, 420).with_sections(&sections, true));

        // Row one holds items 0..4; section B starts at x=206 and owns 2 and 3 there.
        let anchor = layout.section_headers[&1];
        assert_eq!((anchor.x, anchor.y), (206, 0));
        assert_eq!(anchor.row_width, 309 + 100 - 206);
    }

    #[test]
    fn empty_sections_get_zero_height_bounds() {
        let sizes = uniform(4, 100, 100);
        let sections = vec![
            Section::new("A", 0, 2),
            Section::new("empty", 2, 0),
            Section::new("B", 2, 2),
            Section::new("unassigned", 4, 0),
        ];
        let layout =
            GridLayout::compute(&LayoutInput::new(&sizes, 1000).with_sections(&sections, false));

        assert_eq!(layout.section_bounds[&0], (0, 103));
        assert_eq!(layout.section_bounds[&1], (103, 103));
        assert_eq!(layout.section_bounds[&2], (103, 206));
        assert_eq!(layout.section_bounds[&3], (206, 206));
    }

    #[test]
    fn identical_inputs_identical_layouts() {
        let sizes: Vec<(i32, i32)> = (0..200).map(|i| (60 + (i * 37) % 90, 100)).collect();
        let sections = vec![Section::new("A", 0, 77), Section::new("B", 77, 123)];
        let input = LayoutInput::new(&sizes, 733).with_sections(&sections, true);
        assert_eq!(GridLayout::compute(&input), GridLayout::compute(&input));
    }

    #[test]
    fn mixed_widths_never_overlap() {
        let sizes: Vec<(i32, i32)> = (0..300)
            .map(|i| (20 + (i * 53) % 260, 80 + (i * 17) % 70))
            .collect();
        for width in [1, 99, 300, 641, 1280] {
            let layout = GridLayout::compute(&LayoutInput::new(&sizes, width));
            assert_no_row_overlap(&layout);
        }
    }

    #[test]
    fn visible_range_and_hit_testing() {
        let sizes = uniform(30, 100, 100);
        let layout = GridLayout::compute(&LayoutInput::new(&sizes, 515));
        // Five per row, rows every 103px.
        assert_eq!(layout.visible_range(0, 150), (0, 10));
        assert_eq!(layout.visible_range(210, 50), (10, 15));
        assert_eq!(layout.item_at(104, 50), Some(1));
        assert_eq!(layout.item_at(101, 50), None);
        assert_eq!(layout.last_in_row(6), Some(9));
        assert_eq!(layout.row_start_at(150), Some(5));
        assert_eq!(layout.row_start_at(10_000), None);
    }

    #[test]
    fn vertical_navigation_follows_geometry() {
        // Row 0: 200, 50, 50, 50. Row 1: 50, 300.
        let sizes = vec![(200, 100), (50, 100), (50, 100), (50, 100), (50, 100), (300, 100)];
        let layout = GridLayout::compute(&LayoutInput::new(&sizes, 400));
        assert_eq!(layout.position(4).map(|p| (p.x, p.y)), Some((0, 103)));

        assert_eq!(layout.item_above(5), Some(1));
        assert_eq!(layout.item_below(1), Some(5));
        assert_eq!(layout.item_below(0), Some(4));
        assert_eq!(layout.item_above(0), None);
        assert_eq!(layout.item_below(5), None);
        assert_eq!(layout.item_above(99), None);
    }
}
