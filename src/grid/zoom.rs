//! Discrete zoom levels
//!
//! Every level is a resolution class. Stepping moves along the ladder and
//! warmup pre-renders the rungs adjacent to the current one.

use super::types::ResolutionClass;

pub const DEFAULT_ZOOM_LEVELS: [u32; 9] = [75, 100, 120, 150, 180, 225, 300, 375, 450];
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 150;

/// Sorted, deduplicated zoom levels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoomLadder {
    levels: Vec<ResolutionClass>,
}

impl Default for ZoomLadder {
    fn default() -> Self {
        Self::new(&DEFAULT_ZOOM_LEVELS)
    }
}

impl ZoomLadder {
    /// Zero heights are dropped; an empty list falls back to the default ladder
    #[must_use]
    pub fn new(levels: &[u32]) -> Self {
        let mut levels: Vec<ResolutionClass> = levels
            .iter()
            .copied()
            .filter(|h| *h > 0)
            .map(ResolutionClass)
            .collect();
        levels.sort_unstable();
        levels.dedup();
        if levels.is_empty() {
            return Self::default();
        }
        Self { levels }
    }

    #[must_use]
    pub fn levels(&self) -> &[ResolutionClass] {
        &self.levels
    }

    #[must_use]
    pub fn contains(&self, class: ResolutionClass) -> bool {
        self.levels.binary_search(&class).is_ok()
    }

    /// Next larger level. Unknown classes step to the nearest larger one.
    #[must_use]
    pub fn step_in(&self, class: ResolutionClass) -> ResolutionClass {
        self.levels
            .iter()
            .copied()
            .find(|level| *level > class)
            .unwrap_or_else(|| self.largest())
    }

    /// Next smaller level. Unknown classes step to the nearest smaller one.
    #[must_use]
    pub fn step_out(&self, class: ResolutionClass) -> ResolutionClass {
        self.levels
            .iter()
            .rev()
            .copied()
            .find(|level| *level < class)
            .unwrap_or_else(|| self.smallest())
    }

    /// Rungs immediately below and above `class`; empty for classes off the ladder
    #[must_use]
    pub fn neighbours(&self, class: ResolutionClass) -> Vec<ResolutionClass> {
        let Ok(idx) = self.levels.binary_search(&class) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(2);
        if idx > 0 {
            out.push(self.levels[idx - 1]);
        }
        if let Some(above) = self.levels.get(idx + 1) {
            out.push(*above);
        }
        out
    }

    fn smallest(&self) -> ResolutionClass {
        self.levels.first().copied().unwrap_or(ResolutionClass(DEFAULT_THUMBNAIL_SIZE))
    }

    fn largest(&self) -> ResolutionClass {
        self.levels.last().copied().unwrap_or(ResolutionClass(DEFAULT_THUMBNAIL_SIZE))
    }
}
