//! The thumbnail grid: layout, rendering, redraw and input wired together
//!
//! The grid runs on the UI thread. The raster cache and the drawing surface
//! belong to the host and are lent to the calls that need them. State changes
//! go through [`ViewState::apply`]; the effects touching the cache run at
//! once, surface work is deferred to the next [`ThumbnailGrid::tick`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use super::cache::{CacheKey, ThumbnailCache};
use super::controller::{
    ControllerConfig, Direction, GridController, GridHost, HitContext, PointerEvent,
};
use super::draw::Palette;
use super::layout::{DEFAULT_GAP, GridLayout, LayoutInput};
use super::raster::Raster;
use super::redraw::{CacheSource, DEFAULT_VISIBLE_BUFFER, Frame, RedrawController, RedrawStats};
use super::renderer::ThumbnailRenderer;
use super::scheduler::{CompletionEvent, RenderScheduler, SchedulerConfig};
use super::selection::{apply_order, block_move_order};
use super::state::{Command, Effect, ViewState};
use super::surface::DrawableSurface;
use super::types::{
    BoxInfo, DEFAULT_ASPECT_RATIO, DropTarget, Item, ItemId, ItemKind, ResolutionClass, Section,
    Viewport, sections_are_contiguous,
};
use super::zoom::{DEFAULT_THUMBNAIL_SIZE, ZoomLadder};

/// Fixed cell size of document boxes
pub const DEFAULT_BOX_SIZE: (u32, u32) = (150, 200);

/// Aspect changes smaller than this do not reflow the grid
const ASPECT_EPSILON: f32 = 0.01;

#[derive(Clone, Debug)]
pub struct GridOptions {
    pub zoom: ZoomLadder,
    pub initial_class: ResolutionClass,
    pub box_size: (u32, u32),
    pub gap: i32,
    pub visible_buffer: usize,
    pub continuous: bool,
    pub controller: ControllerConfig,
    pub scheduler: SchedulerConfig,
    pub palette: Palette,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            zoom: ZoomLadder::default(),
            initial_class: ResolutionClass(DEFAULT_THUMBNAIL_SIZE),
            box_size: DEFAULT_BOX_SIZE,
            gap: DEFAULT_GAP,
            visible_buffer: DEFAULT_VISIBLE_BUFFER,
            continuous: false,
            controller: ControllerConfig::default(),
            scheduler: SchedulerConfig::default(),
            palette: Palette::default(),
        }
    }
}

/// What one [`ThumbnailGrid::tick`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub completions: usize,
    pub redraw: Option<RedrawStats>,
    pub warmup_submitted: usize,
}

pub struct ThumbnailGrid {
    state: ViewState,
    options: GridOptions,
    items: Vec<Item>,
    sections: Vec<Section>,
    index_of: HashMap<ItemId, usize>,
    /// Pages still showing the default aspect ratio
    provisional_aspect: HashSet<ItemId>,
    layout: GridLayout,
    scheduler: RenderScheduler,
    redraw: RedrawController,
    controller: GridController,
    dirty: bool,
    visibility_pass: bool,
    clear_surface: bool,
    rearm_warmup: bool,
    box_mode: bool,
}

impl ThumbnailGrid {
    #[must_use]
    pub fn new(renderer: Arc<dyn ThumbnailRenderer>, options: GridOptions) -> Self {
        let scheduler = RenderScheduler::with_config(renderer, options.scheduler.clone());
        let redraw =
            RedrawController::new(options.visible_buffer).with_palette(options.palette.clone());
        let controller = GridController::new(options.controller);
        let state = ViewState::new(options.initial_class, options.continuous);
        Self {
            state,
            options,
            items: Vec::new(),
            sections: Vec::new(),
            index_of: HashMap::new(),
            provisional_aspect: HashSet::new(),
            layout: GridLayout::default(),
            scheduler,
            redraw,
            controller,
            dirty: true,
            visibility_pass: true,
            clear_surface: false,
            rearm_warmup: false,
            box_mode: false,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn class(&self) -> ResolutionClass {
        self.state.class
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.state.viewport
    }

    #[must_use]
    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    #[must_use]
    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn redraw_controller(&self) -> &RedrawController {
        &self.redraw
    }

    #[must_use]
    pub fn controller(&self) -> &GridController {
        &self.controller
    }

    /// Selected indices in ascending order
    #[must_use]
    pub fn selected(&self) -> Vec<usize> {
        self.controller.selection().indices()
    }

    /// Nothing in flight, no warmup pending and nothing left to draw
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle() && !self.dirty && !self.clear_surface
    }

    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.dirty || self.clear_surface
    }

    fn apply_command(&mut self, cache: &mut ThumbnailCache, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(cache, effects);
    }

    fn execute_effects(&mut self, cache: &mut ThumbnailCache, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ResetDocument => {
                    self.scheduler.reset_document();
                    self.controller.reset(self.items.len());
                }
                Effect::ClearCache => {
                    cache.clear();
                    cache.set_current_class(self.state.class);
                }
                Effect::InvalidateItem(item) => {
                    let removed = cache.invalidate_item(item);
                    self.scheduler.forget_item(item);
                    debug!("Invalidated {removed} rasters of item {item}");
                }
                Effect::BumpGeneration => {
                    self.scheduler.bump_generation();
                }
                Effect::ClearSurface => {
                    self.clear_surface = true;
                }
                Effect::Relayout => self.relayout(),
                Effect::Redraw => {
                    self.dirty = true;
                    self.visibility_pass = true;
                }
                Effect::ArmWarmup => {
                    self.rearm_warmup = true;
                }
            }
        }
    }

    fn relayout(&mut self) {
        let class = self.state.class;
        let box_size = self.options.box_size;
        let sizes: Vec<(i32, i32)> = self
            .items
            .iter()
            .map(|item| item.target_size(class, box_size))
            .collect();
        let input = LayoutInput::new(&sizes, self.state.viewport.width)
            .with_sections(&self.sections, self.state.continuous)
            .with_gap(self.options.gap);
        self.layout = GridLayout::compute(&input);

        let max_scroll = self.max_scroll();
        if self.state.viewport.scroll_y > max_scroll {
            self.state.viewport.scroll_y = max_scroll;
        }
    }

    fn max_scroll(&self) -> i32 {
        (self.layout.total_height - self.state.viewport.height).max(0)
    }

    fn rebuild_index(&mut self) {
        self.index_of = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id, i))
            .collect();
    }

    /// Replace the whole item list. Clears the cache and starts a new document epoch.
    pub fn set_items(&mut self, cache: &mut ThumbnailCache, mut items: Vec<Item>) {
        self.provisional_aspect.clear();
        let renderer = Arc::clone(self.scheduler.renderer());
        for item in &mut items {
            if !item.is_page() {
                continue;
            }
            let known = item.aspect_ratio.is_finite() && item.aspect_ratio > 0.0;
            if known && (item.aspect_ratio - DEFAULT_ASPECT_RATIO).abs() > f32::EPSILON {
                continue;
            }
            match renderer.intrinsic_size(item.id) {
                Some((w, h)) if w > 0.0 && h > 0.0 => item.aspect_ratio = w / h,
                _ => {
                    item.aspect_ratio = DEFAULT_ASPECT_RATIO;
                    self.provisional_aspect.insert(item.id);
                }
            }
        }

        self.box_mode = items.first().is_some_and(|item| !item.is_page());
        info!(
            "Loaded {} items ({} with provisional aspect)",
            items.len(),
            self.provisional_aspect.len()
        );
        let count = items.len();
        self.items = items;
        self.rebuild_index();
        self.sections.retain(|s| s.end_index() <= count);
        self.apply_command(cache, Command::LoadItems(count));
    }

    pub fn set_sections(&mut self, cache: &mut ThumbnailCache, sections: Vec<Section>) {
        if !sections_are_contiguous(&sections) {
            warn!("Section list is not contiguous; header placement may be off");
        }
        let count = sections.len();
        self.sections = sections;
        self.apply_command(cache, Command::SetSections(count));
    }

    /// Switch resolution class. The cache is kept so switching back is instant.
    pub fn set_zoom(&mut self, cache: &mut ThumbnailCache, class: ResolutionClass) {
        let before = self.state.class;
        self.apply_command(cache, Command::SetZoom(class));
        if before != self.state.class {
            cache.set_current_class(self.state.class);
            debug!("Zoom {before} -> {}", self.state.class);
        }
    }

    pub fn zoom_in(&mut self, cache: &mut ThumbnailCache) -> ResolutionClass {
        let next = self.options.zoom.step_in(self.state.class);
        self.set_zoom(cache, next);
        self.state.class
    }

    pub fn zoom_out(&mut self, cache: &mut ThumbnailCache) -> ResolutionClass {
        let next = self.options.zoom.step_out(self.state.class);
        self.set_zoom(cache, next);
        self.state.class
    }

    pub fn set_container(&mut self, cache: &mut ThumbnailCache, width: i32, height: i32) {
        self.apply_command(cache, Command::SetContainer { width, height });
    }

    /// Scroll to an absolute content offset, clamped to the content
    pub fn scroll_to(&mut self, cache: &mut ThumbnailCache, scroll_y: i32) {
        let clamped = scroll_y.clamp(0, self.max_scroll());
        self.apply_command(cache, Command::Scroll(clamped));
    }

    pub fn scroll_by(&mut self, cache: &mut ThumbnailCache, delta: i32) {
        self.scroll_to(cache, self.state.viewport.scroll_y.saturating_add(delta));
    }

    pub fn set_continuous(&mut self, cache: &mut ThumbnailCache, continuous: bool) {
        self.apply_command(cache, Command::SetContinuous(continuous));
    }

    /// The item's content changed (rotated, edited); drops its rasters everywhere
    pub fn invalidate_item(&mut self, cache: &mut ThumbnailCache, item: ItemId) {
        self.apply_command(cache, Command::ItemChanged(item));
    }

    /// New state or progress for a document box
    pub fn update_box(&mut self, index: usize, info: BoxInfo) -> bool {
        let Some(item) = self.items.get_mut(index) else {
            return false;
        };
        match &mut item.kind {
            ItemKind::Box(current) => {
                *current = info;
                self.dirty = true;
                true
            }
            ItemKind::Page => false,
        }
    }

    pub fn close(&mut self, cache: &mut ThumbnailCache) {
        info!("Closing grid with {} items", self.items.len());
        self.items.clear();
        self.sections.clear();
        self.index_of.clear();
        self.provisional_aspect.clear();
        self.apply_command(cache, Command::Close);
        self.layout = GridLayout::default();
        self.dirty = true;
    }

    /// Explicit redraw; failed renders are retried
    pub fn refresh(&mut self) {
        self.dirty = true;
        self.visibility_pass = true;
    }

    pub fn set_cut_mode(&mut self, enabled: bool) {
        if self.controller.set_cut_mode(enabled) {
            self.dirty = true;
        }
    }

    pub fn toggle_mark(&mut self, index: usize) {
        if index < self.items.len() {
            self.controller.selection_mut().toggle_mark(index);
            self.dirty = true;
        }
    }

    pub fn select_all(&mut self, host: &mut dyn GridHost) {
        self.controller.selection_mut().select_all(self.items.len());
        host.on_selection_changed(&self.controller.selection().indices());
        self.dirty = true;
    }

    pub fn clear_selection(&mut self, host: &mut dyn GridHost) {
        if self.controller.selection_mut().clear() {
            host.on_selection_changed(&[]);
            self.dirty = true;
        }
    }

    /// Move the selection as one block to `target`, keeping its order, and
    /// keep it selected. Returns false if nothing moved.
    pub fn reorder_selected(
        &mut self,
        cache: &mut ThumbnailCache,
        target: DropTarget,
        host: &mut dyn GridHost,
    ) -> bool {
        let moved = self.controller.selection().selected().clone();
        if moved.is_empty() {
            return false;
        }
        let insertion = target.insertion_index(self.items.len());
        let (order, start) = block_move_order(self.items.len(), &moved, insertion);
        if order.iter().enumerate().all(|(new, old)| new == *old) {
            return false;
        }
        debug!("Moving {} items to {start}", moved.len());
        self.items = apply_order(&self.items, &order);
        self.rebuild_index();
        self.controller.selection_mut().remap(&order);
        host.on_selection_changed(&self.controller.selection().indices());
        self.apply_command(cache, Command::Reorder);
        true
    }

    /// Move one item so that it ends up at index `to`
    pub fn reorder(&mut self, cache: &mut ThumbnailCache, from: usize, to: usize) -> bool {
        let len = self.items.len();
        if from >= len || from == to {
            return false;
        }
        let moved = std::iter::once(from).collect();
        // Insertion points are in original indices, so skip past `from` when moving down.
        let insertion = if to > from { to + 1 } else { to };
        let (order, _) = block_move_order(len, &moved, insertion);
        self.items = apply_order(&self.items, &order);
        self.rebuild_index();
        self.controller.selection_mut().remap(&order);
        self.apply_command(cache, Command::Reorder);
        true
    }

    /// Scroll so the item is fully visible, centring it when it is not
    pub fn scroll_to_item(&mut self, cache: &mut ThumbnailCache, index: usize) {
        let Some(pos) = self.layout.position(index) else {
            return;
        };
        let view = self.state.viewport;
        if pos.y >= view.scroll_y && pos.bottom() <= view.scroll_y + view.height {
            return;
        }
        let centred = pos.y + pos.height / 2 - view.height / 2;
        self.scroll_to(cache, centred);
    }

    /// Keyboard navigation; scrolls the new selection into view
    pub fn navigate(
        &mut self,
        cache: &mut ThumbnailCache,
        direction: Direction,
        host: &mut dyn GridHost,
    ) -> Option<usize> {
        let target = self.controller.navigate(&self.layout, direction, host)?;
        self.dirty = true;
        self.scroll_to_item(cache, target);
        Some(target)
    }

    /// Pointer events take viewport coordinates
    fn to_content(&self, event: PointerEvent) -> PointerEvent {
        PointerEvent {
            y: event.y + self.state.viewport.scroll_y,
            ..event
        }
    }

    fn with_hit_context<R>(
        &mut self,
        cache: &ThumbnailCache,
        f: impl FnOnce(&mut GridController, &HitContext<'_>) -> R,
    ) -> R {
        let class = self.state.class;
        let items = &self.items;
        let thumbnail = |index: usize| -> Option<Arc<Raster>> {
            match &items.get(index)?.kind {
                ItemKind::Page => cache
                    .peek(CacheKey::new(class, items[index].id))
                    .map(|entry| Arc::clone(&entry.raster)),
                ItemKind::Box(info) => info.thumbnail.as_ref().map(|t| Arc::clone(t.raster())),
            }
        };
        let ctx = HitContext {
            layout: &self.layout,
            sections: &self.sections,
            visible: self.redraw.visible_range(),
            headers: self.redraw.header_zones(),
            box_mode: self.box_mode,
            thumbnail: &thumbnail,
        };
        f(&mut self.controller, &ctx)
    }

    pub fn pointer_press(&mut self, cache: &ThumbnailCache, event: PointerEvent, host: &mut dyn GridHost) {
        let event = self.to_content(event);
        if self.with_hit_context(cache, |c, ctx| c.press(ctx, event, host)) {
            self.dirty = true;
        }
    }

    pub fn pointer_move(&mut self, cache: &ThumbnailCache, event: PointerEvent, host: &mut dyn GridHost) {
        let event = self.to_content(event);
        if self.with_hit_context(cache, |c, ctx| c.motion(ctx, event, host)) {
            self.dirty = true;
        }
    }

    pub fn pointer_release(&mut self, cache: &ThumbnailCache, event: PointerEvent, host: &mut dyn GridHost) {
        let event = self.to_content(event);
        if self.with_hit_context(cache, |c, ctx| c.release(ctx, event, host)) {
            self.dirty = true;
        }
    }

    pub fn double_click(&mut self, cache: &ThumbnailCache, event: PointerEvent, host: &mut dyn GridHost) {
        let event = self.to_content(event);
        self.with_hit_context(cache, |c, ctx| c.double_click(ctx, event, host));
    }

    pub fn right_click(&mut self, cache: &ThumbnailCache, event: PointerEvent, host: &mut dyn GridHost) {
        let event = self.to_content(event);
        self.with_hit_context(cache, |c, ctx| c.right_click(ctx, event, host));
    }

    pub fn pointer_leave(&mut self) {
        if self.controller.leave() {
            self.dirty = true;
        }
    }

    /// One UI-thread step: drain completions, redraw if needed, drive warmup
    pub fn tick(
        &mut self,
        now: Instant,
        cache: &mut ThumbnailCache,
        surface: &mut dyn DrawableSurface,
    ) -> TickReport {
        let mut report = TickReport::default();
        if cache.current_class() != Some(self.state.class) {
            cache.set_current_class(self.state.class);
        }
        if std::mem::take(&mut self.rearm_warmup) {
            self.scheduler.arm_warmup(now);
        }

        let events = self.scheduler.drain(cache);
        report.completions = events.len();
        self.apply_completions(&events);

        if self.clear_surface || self.dirty {
            if std::mem::take(&mut self.clear_surface) {
                self.redraw.clear_all(surface);
            }
            if std::mem::take(&mut self.visibility_pass) {
                self.scheduler.begin_visibility_pass();
            }
            self.dirty = false;
            report.redraw = Some(self.draw(cache, surface));
        }

        if self.scheduler.warmup_due(now) {
            let keys = self.warmup_keys();
            self.scheduler.start_warmup(now, keys);
        }
        report.warmup_submitted = self.scheduler.pump_warmup(now, cache);
        report
    }

    fn apply_completions(&mut self, events: &[CompletionEvent]) {
        let mut reflow = false;
        for event in events {
            let key = event.key();
            let Some(&index) = self.index_of.get(&key.item) else {
                continue;
            };
            match event {
                CompletionEvent::Rendered { raster, .. } => {
                    if self.provisional_aspect.remove(&key.item) {
                        let (w, h) = raster.size();
                        let aspect = w as f32 / h.max(1) as f32;
                        if let Some(item) = self.items.get_mut(index) {
                            if (item.aspect_ratio - aspect).abs() > ASPECT_EPSILON {
                                item.aspect_ratio = aspect;
                                reflow = true;
                            }
                        }
                    }
                    if key.class == self.state.class && self.redraw.is_drawn(index) {
                        self.dirty = true;
                    }
                }
                CompletionEvent::Failed { .. } => {
                    if key.class == self.state.class && self.redraw.is_drawn(index) {
                        self.dirty = true;
                    }
                }
                CompletionEvent::NotReady { .. } | CompletionEvent::Stale { .. } => {}
            }
        }
        if reflow {
            debug!("Aspect ratios discovered, reflowing");
            self.relayout();
            self.dirty = true;
        }
    }

    fn draw(&mut self, cache: &mut ThumbnailCache, surface: &mut dyn DrawableSurface) -> RedrawStats {
        let fan = self.controller.fan_primitive();
        let frame = Frame {
            items: &self.items,
            layout: &self.layout,
            viewport: self.state.viewport,
            class: self.state.class,
            sections: &self.sections,
            show_headers: self.state.continuous && !self.box_mode,
            decorations: self.controller.decorations(),
            fan,
        };
        let mut source = CacheSource {
            cache,
            scheduler: &mut self.scheduler,
        };
        self.redraw.redraw(surface, &mut source, &frame)
    }

    /// Pages around the visible range at the zoom levels next to the current one
    fn warmup_keys(&self) -> Vec<CacheKey> {
        let neighbours = self.options.zoom.neighbours(self.state.class);
        if neighbours.is_empty() || self.items.is_empty() {
            return Vec::new();
        }
        let buffer = self.scheduler.config().warmup_buffer;
        let (start, end) = self
            .layout
            .visible_range(self.state.viewport.scroll_y, self.state.viewport.height);
        let start = start.saturating_sub(buffer);
        let end = (end + buffer).min(self.items.len());

        let mut keys = Vec::with_capacity((end - start) * neighbours.len());
        for class in neighbours {
            keys.extend(
                self.items[start..end]
                    .iter()
                    .filter(|item| item.is_page())
                    .map(|item| CacheKey::new(class, item.id)),
            );
        }
        keys
    }

    /// Stop the worker pool
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::grid::request::RenderError;
    use crate::grid::scene::RetainedScene;

    struct Solid;

    impl ThumbnailRenderer for Solid {
        fn render(&self, _item: ItemId, class: ResolutionClass) -> Result<Raster, RenderError> {
            let h = class.height();
            Ok(Raster::solid(h / 2, h, [90, 90, 90, 255]))
        }
    }

    fn pump(grid: &mut ThumbnailGrid, cache: &mut ThumbnailCache, scene: &mut RetainedScene) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let now = Instant::now();
            grid.tick(now, cache, scene);
            if grid.scheduler().in_flight() == 0 && !grid.needs_redraw() {
                break;
            }
            assert!(now < deadline, "grid never settled");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn pages(n: u64) -> Vec<Item> {
        (0..n).map(|id| Item::page(id, 0.5)).collect()
    }

    #[test]
    fn first_tick_lays_out_and_requests_visible_pages() {
        let mut grid = ThumbnailGrid::new(Arc::new(Solid), GridOptions::default());
        let mut cache = ThumbnailCache::default();
        let mut scene = RetainedScene::new();
        grid.set_container(&mut cache, 800, 400);
        grid.set_items(&mut cache, pages(100));
        grid.tick(Instant::now(), &mut cache, &mut scene);

        let (start, end) = grid.redraw_controller().visible_range();
        assert_eq!(start, 0);
        assert!(end > 0 && end < 100);
        assert!(grid.scheduler().in_flight() > 0);

        pump(&mut grid, &mut cache, &mut scene);
        assert!(cache.contains_exact(CacheKey::new(ResolutionClass(150), 0)));
    }

    #[test]
    fn only_drawn_completions_at_the_current_class_mark_dirty() {
        let mut grid = ThumbnailGrid::new(Arc::new(Solid), GridOptions::default());
        let mut cache = ThumbnailCache::default();
        let mut scene = RetainedScene::new();
        grid.set_container(&mut cache, 800, 400);
        grid.set_items(&mut cache, pages(100));
        pump(&mut grid, &mut cache, &mut scene);
        assert!(!grid.needs_redraw());
        assert!(grid.redraw.is_drawn(0));
        assert!(!grid.redraw.is_drawn(90));

        let class = ResolutionClass(150);
        let rendered = |cache: &mut ThumbnailCache, key: CacheKey| CompletionEvent::Rendered {
            key,
            raster: cache.put(key, Raster::solid(75, 150, [1, 2, 3, 255])),
        };

        let off_screen = rendered(&mut cache, CacheKey::new(class, 90));
        let failed = CompletionEvent::Failed {
            key: CacheKey::new(class, 95),
            detail: "gone".into(),
        };
        let other_class = rendered(&mut cache, CacheKey::new(ResolutionClass(300), 0));
        grid.apply_completions(&[off_screen, failed, other_class]);
        assert!(!grid.needs_redraw());

        let in_view = rendered(&mut cache, CacheKey::new(class, 0));
        grid.apply_completions(&[in_view]);
        assert!(grid.needs_redraw());
    }

    #[test]
    fn provisional_aspect_is_discovered_from_the_render() {
        let mut grid = ThumbnailGrid::new(Arc::new(Solid), GridOptions::default());
        let mut cache = ThumbnailCache::default();
        let mut scene = RetainedScene::new();
        grid.set_container(&mut cache, 800, 400);
        grid.set_items(&mut cache, vec![Item::page(1, f32::NAN)]);
        assert!((grid.items()[0].aspect_ratio - DEFAULT_ASPECT_RATIO).abs() < 1e-6);

        pump(&mut grid, &mut cache, &mut scene);
        assert!((grid.items()[0].aspect_ratio - 0.5).abs() < 1e-6);
        assert_eq!(grid.layout().position(0).map(|p| p.width), Some(75));
    }

    #[test]
    fn reorder_selected_moves_the_block() {
        let mut grid = ThumbnailGrid::new(Arc::new(Solid), GridOptions::default());
        let mut cache = ThumbnailCache::default();
        grid.set_container(&mut cache, 800, 400);
        grid.set_items(&mut cache, pages(6));
        grid.controller.selection_mut().set([1, 2]);

        assert!(grid.reorder_selected(&mut cache, DropTarget::EndOfList, &mut ()));
        let ids: Vec<ItemId> = grid.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 3, 4, 5, 1, 2]);
        assert_eq!(grid.selected(), vec![4, 5]);

        assert!(grid.reorder(&mut cache, 0, 2));
        let ids: Vec<ItemId> = grid.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 4, 0, 5, 1, 2]);
    }

    #[test]
    fn scroll_to_item_centres_offscreen_targets() {
        let mut grid = ThumbnailGrid::new(Arc::new(Solid), GridOptions::default());
        let mut cache = ThumbnailCache::default();
        grid.set_container(&mut cache, 400, 300);
        grid.set_items(&mut cache, pages(100));

        grid.scroll_to_item(&mut cache, 1);
        assert_eq!(grid.viewport().scroll_y, 0);

        grid.scroll_to_item(&mut cache, 50);
        let pos = grid.layout().position(50).unwrap();
        assert_eq!(grid.viewport().scroll_y, pos.y + pos.height / 2 - 150);

        grid.scroll_to(&mut cache, 1_000_000);
        assert_eq!(
            grid.viewport().scroll_y,
            grid.layout().total_height - 300
        );
    }
}
