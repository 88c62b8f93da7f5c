//! Pointer gestures, hover and drag-reorder over the laid-out grid
//!
//! A press goes `Idle -> Pressed`; moving past the drag threshold over a
//! selected item turns it into `Dragging`; release returns to `Idle`. A press
//! on an already selected item is held back as a pending click so that a
//! multi-selection can be dragged, and only resolves to a plain select on a
//! release without drag.

use std::sync::Arc;

use log::debug;

use super::draw::HeaderHitZone;
use super::fan::{self, FanPreview};
use super::layout::GridLayout;
use super::raster::Raster;
use super::redraw::Decorations;
use super::selection::ItemSelection;
use super::surface::Primitive;
use super::types::{BracketSide, DropTarget, Section};

pub const DEFAULT_DRAG_THRESHOLD: i32 = 5;
pub const DEFAULT_BRACKET_EDGE: i32 = 20;
pub const DEFAULT_HOVER_TOLERANCE: i32 = 20;
/// Height of the name band at the bottom of a document box
pub const BOX_NAME_BAND: i32 = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Pointer travel in pixels before a press becomes a drag
    pub drag_threshold: i32,
    /// Distance from an item edge that arms a bracket click
    pub bracket_edge: i32,
    /// Slack around items for hover and cut-gap detection
    pub hover_tolerance: i32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
            bracket_edge: DEFAULT_BRACKET_EDGE,
            hover_tolerance: DEFAULT_HOVER_TOLERANCE,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
    };
    pub const SHIFT: Self = Self {
        ctrl: false,
        shift: true,
    };
}

/// Pointer position in content coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    #[must_use]
    pub const fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Notifications from the grid to its embedding application. All are optional.
pub trait GridHost {
    fn on_selection_changed(&mut self, _selected: &[usize]) {}
    fn on_click(&mut self, _index: usize, _event: &PointerEvent) {}
    fn on_double_click(&mut self, _index: usize, _event: &PointerEvent) {}
    /// `None` when the click landed on empty space
    fn on_right_click(&mut self, _index: Option<usize>, _event: &PointerEvent) {}
    fn on_drag_start(&mut self, _index: usize, _event: &PointerEvent) {}
    fn on_drag_motion(&mut self, _target: DropTarget, _event: &PointerEvent) {}
    fn on_drag_end(&mut self, _target: DropTarget, _event: &PointerEvent) {}
    /// Cut mode click on the gap before item `gap`
    fn on_split_request(&mut self, _gap: usize) {}
    fn on_section_header_click(&mut self, _section: usize, _event: &PointerEvent) {}
    fn on_section_header_right_click(&mut self, _section: usize, _event: &PointerEvent) {}
    /// Plain click on the name band of box `index`
    fn on_box_rename_request(&mut self, _index: usize) {}
}

impl GridHost for () {}

/// What the controller reads from the rest of the grid for one event
pub struct HitContext<'a> {
    pub layout: &'a GridLayout,
    pub sections: &'a [Section],
    /// Visible range of the last redraw
    pub visible: (usize, usize),
    pub headers: &'a [HeaderHitZone],
    /// Items are document boxes
    pub box_mode: bool,
    /// Thumbnail for the drag fan, if one is ready
    pub thumbnail: &'a dyn Fn(usize) -> Option<Arc<Raster>>,
}

impl HitContext<'_> {
    fn header_at(&self, x: i32, y: i32) -> Option<usize> {
        self.headers
            .iter()
            .find(|zone| zone.rect.contains(x, y))
            .map(|zone| zone.section)
    }

    fn on_box_name(&self, index: usize, y: i32) -> bool {
        self.box_mode
            && self
                .layout
                .position(index)
                .is_some_and(|pos| y > pos.y + pos.height - BOX_NAME_BAND)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    PendingClick,
    Pressed,
    Dragging,
}

#[derive(Clone, Copy, Debug)]
enum Gesture {
    Idle,
    Pressed {
        origin: (i32, i32),
        pending_click: Option<usize>,
    },
    Dragging,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

pub struct GridController {
    config: ControllerConfig,
    gesture: Gesture,
    selection: ItemSelection,
    hovered: Option<usize>,
    bracket_hover: Option<(usize, BracketSide)>,
    cut_mode: bool,
    cut_gap: Option<usize>,
    drop_target: Option<DropTarget>,
    fan: FanPreview,
}

impl Default for GridController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl GridController {
    #[must_use]
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            gesture: Gesture::Idle,
            selection: ItemSelection::new(),
            hovered: None,
            bracket_hover: None,
            cut_mode: false,
            cut_gap: None,
            drop_target: None,
            fan: FanPreview::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn selection(&self) -> &ItemSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut ItemSelection {
        &mut self.selection
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        match self.gesture {
            Gesture::Idle => GesturePhase::Idle,
            Gesture::Pressed {
                pending_click: Some(_),
                ..
            } => GesturePhase::PendingClick,
            Gesture::Pressed { .. } => GesturePhase::Pressed,
            Gesture::Dragging => GesturePhase::Dragging,
        }
    }

    #[must_use]
    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    #[must_use]
    pub fn bracket_hover(&self) -> Option<(usize, BracketSide)> {
        self.bracket_hover
    }

    #[must_use]
    pub fn cut_mode(&self) -> bool {
        self.cut_mode
    }

    #[must_use]
    pub fn cut_gap(&self) -> Option<usize> {
        self.cut_gap
    }

    #[must_use]
    pub fn drop_target(&self) -> Option<DropTarget> {
        self.drop_target
    }

    #[must_use]
    pub fn fan(&self) -> &FanPreview {
        &self.fan
    }

    /// Returns true if the hover state changed
    pub fn set_cut_mode(&mut self, enabled: bool) -> bool {
        if self.cut_mode == enabled {
            return false;
        }
        self.cut_mode = enabled;
        self.cut_gap = None;
        self.bracket_hover = None;
        true
    }

    /// Overlay inputs for the next redraw
    #[must_use]
    pub fn decorations(&self) -> Decorations<'_> {
        Decorations {
            selected: self.selection.selected(),
            marked: self.selection.marked(),
            hovered: self.hovered,
            bracket: self.bracket_hover,
            cut_gap: self.cut_gap.filter(|_| self.cut_mode),
            drop_target: self.drop_target,
        }
    }

    #[must_use]
    pub fn fan_primitive(&self) -> Option<Primitive> {
        self.fan.primitive()
    }

    /// Forget pointer state; used when the item list is replaced
    pub fn reset(&mut self, count: usize) {
        self.gesture = Gesture::Idle;
        self.hovered = None;
        self.bracket_hover = None;
        self.cut_gap = None;
        self.drop_target = None;
        self.fan.stop();
        self.selection.truncate(count);
    }

    /// Button press. Returns true if a redraw is needed.
    pub fn press(&mut self, ctx: &HitContext<'_>, event: PointerEvent, host: &mut dyn GridHost) -> bool {
        self.gesture = Gesture::Idle;
        self.fan.stop();
        self.drop_target = None;

        if let Some(section) = ctx.header_at(event.x, event.y) {
            host.on_section_header_click(section, &event);
            return false;
        }

        if self.cut_mode {
            if let Some(gap) = self.cut_gap {
                debug!("Split requested at gap {gap}");
                host.on_split_request(gap);
                return false;
            }
        }

        let index = ctx.layout.item_at(event.x, event.y);
        let mut pressed = Gesture::Pressed {
            origin: (event.x, event.y),
            pending_click: None,
        };
        let Some(index) = index else {
            self.gesture = pressed;
            return false;
        };

        let redraw = if event.modifiers.ctrl {
            self.selection.toggle(index);
            true
        } else if event.modifiers.shift {
            self.selection.extend_to(index);
            true
        } else if !self.cut_mode
            && self.bracket_hover.is_some_and(|(i, _)| i == index)
        {
            self.selection.bracket_click(index);
            true
        } else if ctx.on_box_name(index, event.y) {
            debug!("Rename requested for box {index}");
            host.on_box_rename_request(index);
            return false;
        } else if self.selection.contains(index) {
            pressed = Gesture::Pressed {
                origin: (event.x, event.y),
                pending_click: Some(index),
            };
            false
        } else {
            self.selection.select_only(index);
            self.notify_selection(host);
            host.on_click(index, &event);
            self.gesture = pressed;
            return true;
        };

        if redraw {
            self.notify_selection(host);
        }
        self.gesture = pressed;
        redraw
    }

    /// Pointer motion, with or without a button held. Returns true if a redraw is needed.
    pub fn motion(&mut self, ctx: &HitContext<'_>, event: PointerEvent, host: &mut dyn GridHost) -> bool {
        match self.gesture {
            Gesture::Idle => self.update_hover(ctx, event),
            Gesture::Pressed { origin, .. } => {
                let dx = (event.x - origin.0).abs();
                let dy = (event.y - origin.1).abs();
                if dx <= self.config.drag_threshold && dy <= self.config.drag_threshold {
                    return false;
                }
                self.gesture = Gesture::Pressed {
                    origin,
                    pending_click: None,
                };
                match ctx.layout.item_at(event.x, event.y) {
                    Some(index) if self.selection.contains(index) => {
                        self.start_drag(ctx, index, event, host);
                        self.drag_motion(ctx, event, host);
                        true
                    }
                    _ => false,
                }
            }
            Gesture::Dragging => {
                self.drag_motion(ctx, event, host);
                true
            }
        }
    }

    /// Button release. Returns true if a redraw is needed.
    pub fn release(&mut self, ctx: &HitContext<'_>, event: PointerEvent, host: &mut dyn GridHost) -> bool {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Dragging => {
                if let Some(target) = resolve_drop(ctx.layout, ctx.sections, event.x, event.y) {
                    debug!("Drag ended on {target:?}");
                    host.on_drag_end(target, &event);
                }
                self.drop_target = None;
                self.fan.stop();
                true
            }
            Gesture::Pressed {
                pending_click: Some(index),
                ..
            } => {
                let changed = self.selection.select_only(index);
                if changed {
                    self.notify_selection(host);
                }
                host.on_click(index, &event);
                changed
            }
            Gesture::Pressed { .. } | Gesture::Idle => false,
        }
    }

    pub fn double_click(&mut self, ctx: &HitContext<'_>, event: PointerEvent, host: &mut dyn GridHost) {
        if let Some(index) = ctx.layout.item_at(event.x, event.y) {
            host.on_double_click(index, &event);
        }
    }

    pub fn right_click(&mut self, ctx: &HitContext<'_>, event: PointerEvent, host: &mut dyn GridHost) {
        if let Some(section) = ctx.header_at(event.x, event.y) {
            host.on_section_header_right_click(section, &event);
            return;
        }
        host.on_right_click(ctx.layout.item_at(event.x, event.y), &event);
    }

    /// Pointer left the grid. Returns true if a redraw is needed.
    pub fn leave(&mut self) -> bool {
        let had = self.hovered.is_some() || self.bracket_hover.is_some() || self.cut_gap.is_some();
        self.hovered = None;
        self.bracket_hover = None;
        self.cut_gap = None;
        had
    }

    /// Keyboard move of a single selection. Returns the newly selected index.
    pub fn navigate(
        &mut self,
        layout: &GridLayout,
        direction: Direction,
        host: &mut dyn GridHost,
    ) -> Option<usize> {
        let count = layout.len();
        if count == 0 {
            return None;
        }
        let Some(current) = self
            .selection
            .anchor()
            .or_else(|| self.selection.selected().first().copied())
        else {
            self.selection.select_only(0);
            self.notify_selection(host);
            return Some(0);
        };
        let target = match direction {
            Direction::Up => layout.item_above(current),
            Direction::Down => layout.item_below(current),
            Direction::Left => current.checked_sub(1),
            Direction::Right => Some(current + 1).filter(|i| *i < count),
        }?;
        if self.selection.select_only(target) {
            self.notify_selection(host);
        }
        Some(target)
    }

    fn notify_selection(&self, host: &mut dyn GridHost) {
        host.on_selection_changed(&self.selection.indices());
    }

    fn start_drag(&mut self, ctx: &HitContext<'_>, index: usize, event: PointerEvent, host: &mut dyn GridHost) {
        self.gesture = Gesture::Dragging;
        let picked = fan::sample_for_fan(&self.selection.indices());
        let thumbnails: Vec<Arc<Raster>> = picked.into_iter().filter_map(|i| (ctx.thumbnail)(i)).collect();
        self.fan.start(&thumbnails, (event.x, event.y));
        debug!(
            "Drag started at item {index} with {} selected",
            self.selection.len()
        );
        host.on_drag_start(index, &event);
    }

    fn drag_motion(&mut self, ctx: &HitContext<'_>, event: PointerEvent, host: &mut dyn GridHost) {
        self.fan.update_position((event.x, event.y));
        self.drop_target = resolve_drop(ctx.layout, ctx.sections, event.x, event.y);
        if let Some(target) = self.drop_target {
            host.on_drag_motion(target, &event);
        }
    }

    fn update_hover(&mut self, ctx: &HitContext<'_>, event: PointerEvent) -> bool {
        let (x, y) = (event.x, event.y);
        let index = ctx.layout.item_at(x, y).or_else(|| {
            let (start, end) = ctx.visible;
            (start..end.min(ctx.layout.len())).find(|i| {
                ctx.layout
                    .position(*i)
                    .is_some_and(|p| p.contains_with_margin(x, y, self.config.hover_tolerance))
            })
        });

        let mut changed = self.hovered != index;
        self.hovered = index;

        if self.cut_mode {
            let count = ctx.layout.len();
            let gap = index
                .and_then(|i| ctx.layout.position(i).map(|p| (i, p)))
                .map(|(i, p)| if (x as f32) < p.center_x() { i } else { i + 1 })
                .filter(|gap| *gap > 0 && *gap < count);
            if gap != self.cut_gap {
                self.cut_gap = gap;
                self.bracket_hover = None;
                changed = true;
            }
            return changed;
        }

        if self.cut_gap.take().is_some() {
            changed = true;
        }
        let bracket = index.and_then(|i| {
            let p = ctx.layout.position(i)?;
            if x - p.x < self.config.bracket_edge {
                Some((i, BracketSide::Left))
            } else if p.right() - x < self.config.bracket_edge {
                Some((i, BracketSide::Right))
            } else {
                None
            }
        });
        if bracket != self.bracket_hover {
            self.bracket_hover = bracket;
            changed = true;
        }
        changed
    }
}

/// Where a drop at content point `(x, y)` would land.
///
/// Checked in order: a hit on an item, the space past the last item of a
/// row (end of list, end of section, end of row), a gap between two items of
/// a row, and finally anywhere below the last row.
#[must_use]
pub fn resolve_drop(layout: &GridLayout, sections: &[Section], x: i32, y: i32) -> Option<DropTarget> {
    let count = layout.len();
    if count == 0 {
        return Some(DropTarget::EndOfList);
    }
    if let Some(index) = layout.item_at(x, y) {
        return Some(DropTarget::Before(index));
    }

    let last = layout.position(count - 1)?;
    if y > last.bottom() && layout.row_start_at(y).is_none() {
        return Some(DropTarget::EndOfList);
    }

    let row_start = layout.row_start_at(y)?;
    let row_last = layout.last_in_row(row_start)?;
    let row_end = layout.position(row_last)?;
    if x > row_end.right() {
        return Some(end_of(row_last, count, sections));
    }

    for i in row_start..=row_last {
        let pos = layout.position(i)?;
        if x < pos.x {
            if i > row_start {
                if let Some(section) = section_ending_at(sections, i - 1) {
                    return Some(DropTarget::EndOfSection {
                        section,
                        last: i - 1,
                    });
                }
            }
            return Some(DropTarget::Before(i));
        }
        if x <= pos.right() {
            // Under a short item on a taller row.
            return Some(DropTarget::Before(i));
        }
    }

    if row_last == count - 1 && (x as f32) > last.center_x() {
        return Some(DropTarget::EndOfList);
    }
    None
}

fn end_of(last: usize, count: usize, sections: &[Section]) -> DropTarget {
    if last + 1 == count {
        return DropTarget::EndOfList;
    }
    match section_ending_at(sections, last) {
        Some(section) => DropTarget::EndOfSection { section, last },
        None => DropTarget::EndOfRow(last),
    }
}

fn section_ending_at(sections: &[Section], last: usize) -> Option<usize> {
    sections
        .iter()
        .position(|s| s.count > 0 && s.end_index() == last + 1)
}
