//! Painters for item bases, overlays and ephemeral markers

use std::sync::Arc;

use log::debug;

use super::cache::CachedRaster;
use super::layout::{GridLayout, HeaderAnchor};
use super::surface::{Color, Layer, Primitive, Shape};
use super::types::{BoxInfo, BoxState, BracketSide, DropTarget, LayoutPosition, Section, Viewport};

/// Colours used by the painters
#[derive(Clone, Debug)]
pub struct Palette {
    pub canvas: Color,
    pub placeholder: Color,
    pub box_bg: Color,
    pub box_bg_failed: Color,
    pub box_bg_marked: Color,
    pub box_outline: Color,
    pub text: Color,
    pub text_secondary: Color,
    pub text_hint: Color,
    pub progress_bg: Color,
    pub accent: Color,
    pub danger: Color,
    pub queued: Color,
    pub selection: Color,
    pub box_selection: Color,
    pub hover: Color,
    pub box_hover: Color,
    pub drop_marker: Color,
    pub header_bg: Color,
    pub header_text: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            canvas: Color::hex(0x1A1A1A),
            placeholder: Color::hex(0x404040),
            box_bg: Color::hex(0x2D2D2D),
            box_bg_failed: Color::hex(0x3A2525),
            box_bg_marked: Color::hex(0x352525),
            box_outline: Color::hex(0x404040),
            text: Color::hex(0xFFFFFF),
            text_secondary: Color::hex(0xA0A0A0),
            text_hint: Color::hex(0x6E6E6E),
            progress_bg: Color::hex(0x353535),
            accent: Color::hex(0x1F6AA5),
            danger: Color::hex(0xE04F5F),
            queued: Color::hex(0xE0A04F),
            selection: Color::rgba(31, 106, 165, 80),
            box_selection: Color::rgba(31, 106, 165, 60),
            hover: Color::rgba(128, 128, 128, 60),
            box_hover: Color::rgba(128, 128, 128, 40),
            drop_marker: Color::rgba(234, 234, 250, 180),
            header_bg: Color::hex(0x404040),
            header_text: Color::hex(0xE0E0E0),
        }
    }
}

/// Per-frame decorations of one item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayState {
    pub selected: bool,
    pub hovered: bool,
    pub marked: bool,
    pub bracket: Option<BracketSide>,
}

/// Kind-specific drawing strategy
pub trait ItemPainter {
    /// Expensive content, reused across frames and moved with the layout
    fn base(&self, pos: LayoutPosition, palette: &Palette) -> Primitive;

    /// Cheap decorations, rebuilt every frame
    fn overlays(&self, pos: LayoutPosition, state: OverlayState, palette: &Palette) -> Vec<Primitive>;
}

/// What a page base shows
#[derive(Clone, Debug)]
pub enum PageContent {
    Raster(CachedRaster),
    Placeholder { failed: bool },
}

pub struct PagePainter<'a> {
    pub content: &'a PageContent,
}

impl ItemPainter for PagePainter<'_> {
    fn base(&self, pos: LayoutPosition, palette: &Palette) -> Primitive {
        match self.content {
            PageContent::Raster(entry) => {
                Primitive::image((pos.x, pos.y), Layer::Base, Arc::clone(&entry.raster))
            }
            PageContent::Placeholder { failed } => {
                let fill = if *failed {
                    palette.box_bg_failed
                } else {
                    palette.placeholder
                };
                Primitive::filled_rect((pos.x, pos.y), Layer::Base, (pos.width, pos.height), fill)
            }
        }
    }

    fn overlays(&self, pos: LayoutPosition, state: OverlayState, palette: &Palette) -> Vec<Primitive> {
        let mut out = Vec::new();
        let size = (pos.width, pos.height);
        if state.selected {
            out.push(Primitive::filled_rect((pos.x, pos.y), Layer::Overlay, size, palette.selection));
        }
        if state.marked {
            out.push(cross(pos, 0, 4, palette.danger));
        }
        if state.hovered {
            out.push(Primitive::filled_rect((pos.x, pos.y), Layer::Overlay, size, palette.hover));
        }
        if let Some(side) = state.bracket {
            out.push(bracket(pos, side, palette.accent));
        }
        out
    }
}

pub struct BoxPainter<'a> {
    pub info: &'a BoxInfo,
}

/// Longest box name shown before truncation
const BOX_NAME_MAX_CHARS: usize = 20;

impl BoxPainter<'_> {
    fn background(&self, palette: &Palette) -> Color {
        match self.info.state {
            BoxState::Failed => palette.box_bg_failed,
            BoxState::Marked => palette.box_bg_marked,
            _ => palette.box_bg,
        }
    }

    fn thumbnail(&self, w: i32, h: i32) -> Option<Primitive> {
        if self.info.state != BoxState::Loaded {
            return None;
        }
        let thumb = self.info.thumbnail.as_ref()?.raster();
        let (fit_w, fit_h) = fit_within(thumb.size(), ((w - 20).max(1) as u32, (h - 60).max(1) as u32));
        let scaled = match thumb.resized_quality(fit_w, fit_h) {
            Ok(scaled) => Arc::new(scaled),
            Err(e) => {
                debug!("Box thumbnail for {} not scaled: {e}", self.info.name);
                return None;
            }
        };
        let x = (w - fit_w as i32) / 2;
        Some(Primitive::image((x, 10), Layer::Base, scaled))
    }
}

impl ItemPainter for BoxPainter<'_> {
    fn base(&self, pos: LayoutPosition, palette: &Palette) -> Primitive {
        let (w, h) = (pos.width, pos.height);
        let mut parts = vec![Primitive::new(
            (0, 0),
            Layer::Base,
            Shape::Rect {
                width: w,
                height: h,
                fill: Some(self.background(palette)),
                outline: Some((palette.box_outline, 1)),
            },
        )];

        if let Some(thumb) = self.thumbnail(w, h) {
            parts.push(thumb);
        }

        match self.info.state {
            BoxState::Loading => {
                parts.push(centered_text(w / 2, h / 2 + 35, "Loading...", palette.text_hint, 9));
                let (bar_x, bar_y, bar_w, bar_h) = (10, h - 40, w - 20, 8);
                parts.push(Primitive::filled_rect(
                    (bar_x, bar_y),
                    Layer::Base,
                    (bar_w, bar_h),
                    palette.progress_bg,
                ));
                let filled = (bar_w as f32 * self.info.progress.clamp(0.0, 1.0)) as i32;
                if filled > 0 {
                    parts.push(Primitive::filled_rect(
                        (bar_x, bar_y),
                        Layer::Base,
                        (filled, bar_h),
                        palette.accent,
                    ));
                }
                let pct = format!("{}%", self.info.progress_percent());
                parts.push(centered_text(w / 2, bar_y + bar_h + 4, &pct, palette.text_secondary, 8));
            }
            BoxState::Failed => {
                parts.push(centered_text(w / 2, h / 2 - 34, "\u{21bb}", palette.danger, 48));
                parts.push(centered_text(w / 2, h / 2 + 30, "Click to retry", palette.danger, 9));
            }
            BoxState::Queued => {
                parts.push(centered_text(w / 2, h / 2 - 18, "\u{23f3}", palette.queued, 36));
                parts.push(centered_text(w / 2, h / 2 + 23, "Queued...", palette.queued, 9));
            }
            BoxState::Marked => {
                let mut x = cross(LayoutPosition::new(0, 0, w, h), 10, 4, palette.danger);
                x.layer = Layer::Base;
                parts.push(x);
            }
            BoxState::Loaded => {}
        }

        let name_y = h - 31;
        parts.push(centered_text(w / 2, name_y, &truncate_name(&self.info.name), palette.text, 10));
        if self.info.state == BoxState::Loaded && self.info.page_count > 0 {
            let count = format!("{}p", self.info.page_count);
            parts.push(centered_text(w / 2, name_y + 15, &count, palette.text_secondary, 9));
        }

        Primitive::group((pos.x, pos.y), Layer::Base, parts)
    }

    fn overlays(&self, pos: LayoutPosition, state: OverlayState, palette: &Palette) -> Vec<Primitive> {
        let mut out = Vec::new();
        let size = (pos.width, pos.height);
        if state.selected {
            out.push(Primitive::filled_rect((pos.x, pos.y), Layer::Overlay, size, palette.box_selection));
        }
        if state.hovered {
            out.push(Primitive::filled_rect((pos.x, pos.y), Layer::Overlay, size, palette.box_hover));
        }
        if let Some(side) = state.bracket {
            out.push(bracket(pos, side, palette.accent));
        }
        out
    }
}

/// Largest size with the source aspect that fits in `bounds`
#[must_use]
pub fn fit_within(src: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (src.0.max(1) as f32, src.1.max(1) as f32);
    let scale = (bounds.0 as f32 / sw).min(bounds.1 as f32 / sh).min(1.0);
    (
        ((sw * scale).round() as u32).max(1),
        ((sh * scale).round() as u32).max(1),
    )
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > BOX_NAME_MAX_CHARS {
        let head: String = name.chars().take(BOX_NAME_MAX_CHARS - 3).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

/// Rough advance width for the proportional UI font
fn text_width(text: &str, size: u32) -> i32 {
    (text.chars().count() as f32 * size as f32 * 0.6).round() as i32
}

fn centered_text(cx: i32, top: i32, text: &str, color: Color, size: u32) -> Primitive {
    let x = cx - text_width(text, size) / 2;
    Primitive::text((x, top), Layer::Base, text, color, size)
}

fn line(from: (i32, i32), to: (i32, i32), color: Color, width: u32, dashed: bool, layer: Layer) -> Primitive {
    Primitive::new(
        from,
        layer,
        Shape::Line {
            dx: to.0 - from.0,
            dy: to.1 - from.1,
            color,
            width,
            dashed,
        },
    )
}

/// Red X across `pos`, inset by `margin`
fn cross(pos: LayoutPosition, margin: i32, width: u32, color: Color) -> Primitive {
    let (w, h) = (pos.width, pos.height);
    Primitive::group(
        (pos.x, pos.y),
        Layer::Overlay,
        vec![
            line((margin, margin), (w - margin, h - margin), color, width, false, Layer::Overlay),
            line((w - margin, margin), (margin, h - margin), color, width, false, Layer::Overlay),
        ],
    )
}

fn bracket(pos: LayoutPosition, side: BracketSide, color: Color) -> Primitive {
    let (w, h) = (pos.width, pos.height);
    let (edge, tip) = match side {
        BracketSide::Left => (0, 10),
        BracketSide::Right => (w, w - 10),
    };
    Primitive::group(
        (pos.x, pos.y),
        Layer::Overlay,
        vec![
            line((tip, 0), (edge, 0), color, 3, false, Layer::Overlay),
            line((edge, 0), (edge, h), color, 3, false, Layer::Overlay),
            line((edge, h), (tip, h), color, 3, false, Layer::Overlay),
        ],
    )
}

/// Dashed split line in gap `gap` (between items `gap - 1` and `gap`)
#[must_use]
pub fn cut_marker(layout: &GridLayout, gap: usize, palette: &Palette) -> Option<Primitive> {
    let first = layout.positions.first()?;
    let last = layout.positions.last()?;

    let (cx, top, height) = if gap == 0 {
        (first.x, first.y, first.height)
    } else if gap >= layout.len() {
        (last.right(), last.y, last.height)
    } else {
        let left = layout.position(gap - 1)?;
        let right = layout.position(gap)?;
        if (left.y - right.y).abs() < 10 {
            ((left.right() + right.x) / 2, left.y, left.height)
        } else {
            // Wrapped: mark the start of the new row.
            (right.x, right.y, right.height)
        }
    };

    let cy = top + height / 2;
    Some(Primitive::group(
        (cx, top),
        Layer::Ephemeral,
        vec![
            line((0, 0), (0, height), palette.danger, 2, true, Layer::Ephemeral),
            Primitive::new(
                (-8, cy - top - 8),
                Layer::Ephemeral,
                Shape::Rect {
                    width: 16,
                    height: 16,
                    fill: None,
                    outline: Some((palette.danger, 2)),
                },
            ),
        ],
    ))
}

/// Width of the insertion bar
const DROP_MARKER_WIDTH: i32 = 26;

/// Translucent insertion bar for a drop target
#[must_use]
pub fn drop_marker(layout: &GridLayout, target: DropTarget, palette: &Palette) -> Option<Primitive> {
    let (x, pos) = match target {
        DropTarget::Before(index) => {
            let pos = layout.position(index)?;
            (pos.x - 14, pos)
        }
        DropTarget::EndOfRow(last) | DropTarget::EndOfSection { last, .. } => {
            let pos = layout.position(last)?;
            (pos.right() - 11, pos)
        }
        DropTarget::EndOfList => {
            let pos = *layout.positions.last()?;
            (pos.right() - 11, pos)
        }
    };
    Some(Primitive::filled_rect(
        (x, pos.y),
        Layer::Ephemeral,
        (DROP_MARKER_WIDTH, pos.height),
        palette.drop_marker,
    ))
}

/// Clickable area of a drawn section header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderHitZone {
    pub section: usize,
    pub rect: LayoutPosition,
}

const HEADER_HEIGHT: i32 = 24;
const HEADER_CHAR_WIDTH: i32 = 7;
const HEADER_PADDING: i32 = 20;

/// Label block for a section header, width limited to its row span
#[must_use]
pub fn section_header(
    section_index: usize,
    section: &Section,
    anchor: HeaderAnchor,
    palette: &Palette,
) -> Option<(Primitive, HeaderHitZone)> {
    if section.title.is_empty() {
        return None;
    }
    let limit = anchor.row_width.max(50);
    let chars = section.title.chars().count() as i32;
    let desired = chars * HEADER_CHAR_WIDTH + HEADER_PADDING;
    let (label, width) = if desired > limit {
        let fit = ((limit - HEADER_PADDING) / HEADER_CHAR_WIDTH).max(3) as usize;
        let head: String = section.title.chars().take(fit - 2).collect();
        (format!("{head}..."), limit)
    } else {
        (section.title.clone(), desired)
    };

    let primitive = Primitive::group(
        (anchor.x, anchor.y),
        Layer::Ephemeral,
        vec![
            Primitive::filled_rect((0, 0), Layer::Ephemeral, (width, HEADER_HEIGHT), palette.header_bg),
            Primitive::text((5, 6), Layer::Ephemeral, label, palette.header_text, 10),
        ],
    );
    let zone = HeaderHitZone {
        section: section_index,
        rect: LayoutPosition::new(anchor.x, anchor.y, width, HEADER_HEIGHT),
    };
    Some((primitive, zone))
}

/// Hints shown when there is nothing to display. None for tiny viewports.
#[must_use]
pub fn empty_state(viewport: Viewport, palette: &Palette) -> Option<Primitive> {
    if viewport.width < 100 || viewport.height < 100 {
        return None;
    }
    const HINTS: [(&str, &str); 5] = [
        ("Open document", "Ctrl + A / Drag"),
        ("Select all / none", "Space"),
        ("Expand / collapse", "Enter / Backspace"),
        ("Edit selected pages", "E"),
        ("Undo / redo", "Ctrl + Z / Ctrl + Y"),
    ];
    let line_height = 35;
    let cx = viewport.width / 2;
    let top = viewport.scroll_y + viewport.height / 2 - (HINTS.len() as i32 * line_height) / 2;
    let mut parts = Vec::with_capacity(HINTS.len() * 2);
    for (i, (command, keys)) in HINTS.iter().enumerate() {
        let y = i as i32 * line_height;
        parts.push(Primitive::text(
            (-20 - text_width(command, 16), y),
            Layer::Base,
            *command,
            palette.text_hint,
            16,
        ));
        parts.push(Primitive::text((20, y), Layer::Base, *keys, palette.text_hint, 14));
    }
    Some(Primitive::group((cx, top), Layer::Base, parts))
}

#[cfg(test)]
mod tests {
    use super::super::cache::RasterId;
    use super::super::layout::LayoutInput;
    use super::super::raster::Raster;
    use super::*;

    fn grid(n: usize) -> GridLayout {
        let sizes = vec![(100, 100); n];
        GridLayout::compute(&LayoutInput::new(&sizes, 515))
    }

    #[test]
    fn page_base_is_image_or_placeholder() {
        let pos = LayoutPosition::new(5, 6, 70, 100);
        let palette = Palette::default();
        let placeholder = PageContent::Placeholder { failed: false };
        let base = PagePainter { content: &placeholder }.base(pos, &palette);
        assert!(matches!(base.shape, Shape::Rect { fill: Some(c), .. } if c == palette.placeholder));

        let entry = CachedRaster {
            id: RasterId(4),
            raster: Arc::new(Raster::solid(70, 100, [1, 2, 3, 255])),
            derived: false,
        };
        let content = PageContent::Raster(entry);
        let base = PagePainter { content: &content }.base(pos, &palette);
        assert_eq!(base.origin, (5, 6));
        assert!(matches!(base.shape, Shape::Image(_)));
    }

    #[test]
    fn page_overlays_follow_state() {
        let pos = LayoutPosition::new(0, 0, 70, 100);
        let palette = Palette::default();
        let content = PageContent::Placeholder { failed: false };
        let painter = PagePainter { content: &content };
        assert!(painter.overlays(pos, OverlayState::default(), &palette).is_empty());

        let state = OverlayState {
            selected: true,
            hovered: true,
            marked: true,
            bracket: Some(BracketSide::Left),
        };
        let overlays = painter.overlays(pos, state, &palette);
        assert_eq!(overlays.len(), 4);
        assert!(overlays.iter().all(|p| p.layer == Layer::Overlay));
    }

    #[test]
    fn long_box_names_are_truncated() {
        assert_eq!(truncate_name("short.pdf"), "short.pdf");
        assert_eq!(
            truncate_name("a_really_long_document_name.pdf"),
            "a_really_long_doc..."
        );
    }

    #[test]
    fn loaded_box_shows_page_count() {
        let mut info = BoxInfo::new("doc.pdf", BoxState::Loaded);
        info.page_count = 12;
        let base = BoxPainter { info: &info }.base(LayoutPosition::new(0, 0, 150, 200), &Palette::default());
        let Shape::Group(parts) = base.shape else {
            panic!("box base is a group");
        };
        assert!(parts.iter().any(|p| matches!(&p.shape, Shape::Text { text, .. } if text == "12p")));
    }

    #[test]
    fn drop_marker_positions() {
        let layout = grid(7);
        let palette = Palette::default();

        let before = drop_marker(&layout, DropTarget::Before(1), &palette).unwrap();
        assert_eq!(before.origin, (103 - 14, 0));

        let end = drop_marker(&layout, DropTarget::EndOfList, &palette).unwrap();
        assert_eq!(end.origin, (103 + 100 - 11, 103));
        assert!(drop_marker(&layout, DropTarget::Before(9), &palette).is_none());
    }

    #[test]
    fn cut_marker_wraps_to_row_start() {
        let layout = grid(7);
        let palette = Palette::default();
        let mid = cut_marker(&layout, 2, &palette).unwrap();
        assert_eq!(mid.origin, ((203 + 206) / 2, 0));
        let wrapped = cut_marker(&layout, 5, &palette).unwrap();
        assert_eq!(wrapped.origin, (0, 103));
    }

    #[test]
    fn header_is_limited_to_row_width() {
        let section = Section::new("A very long chapter title indeed", 0, 3);
        let anchor = HeaderAnchor {
            x: 10,
            y: 0,
            row_width: 100,
        };
        let (primitive, zone) = section_header(0, &section, anchor, &Palette::default()).unwrap();
        assert_eq!(zone.rect.width, 100);
        let Shape::Group(parts) = primitive.shape else {
            panic!("header is a group");
        };
        assert!(matches!(&parts[1].shape, Shape::Text { text, .. } if text.ends_with("...")));
    }

    #[test]
    fn fit_keeps_aspect() {
        assert_eq!(fit_within((200, 400), (130, 140)), (70, 140));
        assert_eq!(fit_within((50, 50), (130, 140)), (50, 50));
    }
}
