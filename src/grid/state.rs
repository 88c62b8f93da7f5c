//! View state of the grid and the work each change implies

use super::types::{ItemId, ResolutionClass, Viewport};

/// Width changes up to this many pixels reflow without dropping drawn objects
pub const REFLOW_TOLERANCE: i32 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub class: ResolutionClass,
    pub viewport: Viewport,
    pub continuous: bool,
    pub item_count: usize,
    pub section_count: usize,
}

impl ViewState {
    #[must_use]
    pub fn new(class: ResolutionClass, continuous: bool) -> Self {
        Self {
            class,
            viewport: Viewport::default(),
            continuous,
            item_count: 0,
            section_count: 0,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::LoadItems(count) => {
                self.item_count = count;
                self.viewport.scroll_y = 0;
                vec![
                    Effect::ResetDocument,
                    Effect::ClearCache,
                    Effect::ClearSurface,
                    Effect::Relayout,
                    Effect::Redraw,
                ]
            }

            Command::SetSections(count) => {
                self.section_count = count;
                vec![
                    Effect::BumpGeneration,
                    Effect::Relayout,
                    Effect::ClearSurface,
                    Effect::Redraw,
                ]
            }

            Command::SetZoom(class) => {
                if self.class != class && class.height() > 0 {
                    self.class = class;
                    vec![
                        Effect::BumpGeneration,
                        Effect::Relayout,
                        Effect::ClearSurface,
                        Effect::Redraw,
                        Effect::ArmWarmup,
                    ]
                } else {
                    vec![]
                }
            }

            Command::SetContainer { width, height } => {
                let old = self.viewport;
                self.viewport.width = width;
                self.viewport.height = height;
                let width_delta = (old.width - width).abs();
                if width_delta > REFLOW_TOLERANCE {
                    vec![
                        Effect::BumpGeneration,
                        Effect::Relayout,
                        Effect::ClearSurface,
                        Effect::Redraw,
                        Effect::ArmWarmup,
                    ]
                } else if width_delta > 0 {
                    vec![Effect::Relayout, Effect::Redraw, Effect::ArmWarmup]
                } else if old.height != height {
                    vec![Effect::Redraw, Effect::ArmWarmup]
                } else {
                    vec![]
                }
            }

            Command::Scroll(scroll_y) => {
                let clamped = scroll_y.max(0);
                if self.viewport.scroll_y != clamped {
                    self.viewport.scroll_y = clamped;
                    vec![Effect::Redraw, Effect::ArmWarmup]
                } else {
                    vec![]
                }
            }

            Command::SetContinuous(continuous) => {
                if self.continuous != continuous {
                    self.continuous = continuous;
                    vec![
                        Effect::BumpGeneration,
                        Effect::Relayout,
                        Effect::ClearSurface,
                        Effect::Redraw,
                    ]
                } else {
                    vec![]
                }
            }

            Command::ItemChanged(item) => {
                vec![Effect::InvalidateItem(item), Effect::Redraw]
            }

            Command::Reorder => {
                vec![
                    Effect::BumpGeneration,
                    Effect::Relayout,
                    Effect::ClearSurface,
                    Effect::Redraw,
                ]
            }

            Command::Close => {
                self.item_count = 0;
                self.section_count = 0;
                self.viewport.scroll_y = 0;
                vec![
                    Effect::ResetDocument,
                    Effect::ClearCache,
                    Effect::ClearSurface,
                ]
            }
        }
    }
}

/// Commands that modify view state
#[derive(Clone, Debug)]
pub enum Command {
    /// A new item list replaced the old one
    LoadItems(usize),
    SetSections(usize),
    SetZoom(ResolutionClass),
    SetContainer { width: i32, height: i32 },
    Scroll(i32),
    SetContinuous(bool),
    /// An item's content changed, e.g. rotated
    ItemChanged(ItemId),
    /// Items were moved within the list
    Reorder,
    /// The document was closed
    Close,
}

/// Effects produced by state changes, in execution order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// New document epoch: in-flight results are discarded
    ResetDocument,
    ClearCache,
    InvalidateItem(ItemId),
    BumpGeneration,
    /// Drop every drawn object
    ClearSurface,
    Relayout,
    /// Visibility pass: recompute the visible range and retry failures
    Redraw,
    /// Restart the warmup quiescence timer
    ArmWarmup,
}
