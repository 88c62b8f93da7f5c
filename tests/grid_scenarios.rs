use std::sync::Arc;
use std::time::{Duration, Instant};

use serial_test::serial;
use thumbgrid::grid::{
    BoxInfo, BoxState, CacheKey, ContentToken, DropTarget, GridOptions, Item, ItemId, PageToken, ResolutionClass,
    RetainedScene, SchedulerConfig, Section, ThumbnailCache, ThumbnailGrid,
};
use thumbgrid::test_utils::test_helpers::*;

const SETTLE: Duration = Duration::from_secs(5);
const CLASS: ResolutionClass = ResolutionClass(150);

struct Fixture {
    renderer: Arc<ScriptedRenderer>,
    grid: ThumbnailGrid,
    cache: ThumbnailCache,
    scene: RetainedScene,
}

impl Fixture {
    fn new(options: GridOptions) -> Self {
        Self::with_renderer(Arc::new(ScriptedRenderer::new()), options)
    }

    fn with_renderer(renderer: Arc<ScriptedRenderer>, options: GridOptions) -> Self {
        let grid = ThumbnailGrid::new(renderer.clone(), options);
        Self {
            renderer,
            grid,
            cache: ThumbnailCache::default(),
            scene: RetainedScene::new(),
        }
    }

    /// 800x400 viewport, 75x150 cells, ten per row
    fn with_pages(count: u64) -> Self {
        let mut fx = Self::new(quiet_options());
        fx.grid.set_container(&mut fx.cache, 800, 400);
        fx.grid.set_items(&mut fx.cache, pages(count));
        fx
    }

    fn settle(&mut self) -> usize {
        pump_until_idle(&mut self.grid, &mut self.cache, &mut self.scene, SETTLE)
    }

    fn centre(&self, index: usize) -> (i32, i32) {
        let pos = self.grid.layout().position(index).unwrap();
        let scroll = self.grid.viewport().scroll_y;
        (pos.x + pos.width / 2, pos.y + pos.height / 2 - scroll)
    }

    fn run(&mut self, script: GestureScript, host: &mut RecordingHost) {
        script.run(&mut self.grid, &self.cache, host);
    }

    fn page_token(&self, index: usize) -> Option<PageToken> {
        match self.grid.redraw_controller().record(index)?.content_token {
            ContentToken::Page { content, .. } => Some(content),
            ContentToken::Box { .. } => None,
        }
    }

    fn ids(&self) -> Vec<ItemId> {
        self.grid.items().iter().map(|item| item.id).collect()
    }
}

/// Warmup pushed far enough out to never start during a test
fn quiet_options() -> GridOptions {
    GridOptions {
        scheduler: SchedulerConfig {
            workers: 2,
            warmup_delay: Duration::from_secs(3600),
            ..SchedulerConfig::default()
        },
        ..GridOptions::default()
    }
}

fn pages(count: u64) -> Vec<Item> {
    (0..count).map(|id| Item::page(id, 0.5)).collect()
}

#[test]
fn seven_boxes_per_row_at_750() {
    let mut fx = Fixture::new(GridOptions {
        box_size: (100, 100),
        gap: 3,
        ..quiet_options()
    });
    let boxes = (0..10)
        .map(|id| Item::document_box(id, BoxInfo::new("doc", BoxState::Queued), (100, 100)))
        .collect();
    fx.grid.set_container(&mut fx.cache, 750, 400);
    fx.grid.set_items(&mut fx.cache, boxes);

    let layout = fx.grid.layout();
    assert_eq!(layout.position(6).unwrap().y, 0);
    let row_two = layout.position(7).unwrap();
    assert_eq!(row_two.x, 0);
    assert!(row_two.y > 0);
}

#[test]
fn zooming_back_reuses_cached_class() {
    let mut fx = Fixture::with_pages(60);
    fx.settle();
    assert!(fx.cache.contains_exact(CacheKey::new(CLASS, 0)));

    fx.grid.set_zoom(&mut fx.cache, ResolutionClass(300));
    fx.settle();
    assert!(fx.cache.contains_exact(CacheKey::new(ResolutionClass(300), 0)));

    fx.renderer.clear_calls();
    let submitted = fx.grid.scheduler().stats().submitted;
    fx.grid.set_zoom(&mut fx.cache, CLASS);
    fx.settle();

    assert!(fx.renderer.calls().iter().all(|key| key.class != CLASS));
    assert_eq!(fx.grid.scheduler().stats().submitted, submitted);
    assert!(matches!(fx.page_token(0), Some(PageToken::Raster(_))));
}

#[test]
fn ctrl_click_toggles_membership() {
    let mut fx = Fixture::with_pages(20);
    fx.settle();
    let mut host = RecordingHost::new();
    let a = fx.centre(0);
    let b = fx.centre(1);

    fx.run(GestureScript::new().click(a.0, a.1), &mut host);
    assert_eq!(fx.grid.selected(), vec![0]);

    fx.run(GestureScript::new().ctrl_click(b.0, b.1), &mut host);
    assert_eq!(fx.grid.selected(), vec![0, 1]);

    fx.run(GestureScript::new().ctrl_click(a.0, a.1), &mut host);
    assert_eq!(fx.grid.selected(), vec![1]);
    assert_eq!(host.last_selection(), Some(&[1][..]));
}

#[test]
fn failed_render_shows_placeholder_until_next_pass() {
    let mut fx = Fixture::with_pages(20);
    let key = CacheKey::new(CLASS, 5);
    fx.renderer.fail_once(key);
    fx.settle();

    assert_eq!(fx.page_token(5), Some(PageToken::Placeholder { failed: true }));
    assert!(fx.grid.scheduler().has_failed(key));
    assert!(!fx.cache.contains(key));

    fx.grid.refresh();
    fx.settle();

    assert!(matches!(fx.page_token(5), Some(PageToken::Raster(_))));
    assert_eq!(fx.renderer.calls_for(key), 2);
}

#[test]
fn hover_and_selection_leave_base_primitives_alone() {
    let mut fx = Fixture::with_pages(40);
    fx.settle();
    let handle = fx.grid.redraw_controller().record(2).and_then(|r| r.base_handle);
    assert!(handle.is_some());

    let (x, y) = fx.centre(2);
    let mut host = RecordingHost::new();
    fx.run(GestureScript::new().hover(x, y).click(x, y), &mut host);
    let report = fx.grid.tick(Instant::now(), &mut fx.cache, &mut fx.scene);

    let stats = report.redraw.expect("decoration change redraws");
    assert_eq!(stats.base_churn(), 0);
    assert_eq!(
        fx.grid.redraw_controller().record(2).and_then(|r| r.base_handle),
        handle
    );
}

#[test]
fn scrolling_keeps_handles_of_items_still_drawn() {
    let mut fx = Fixture::with_pages(200);
    fx.settle();
    let before: Vec<_> = fx
        .grid
        .redraw_controller()
        .records()
        .map(|(i, r)| (i, r.base_handle))
        .collect();

    fx.grid.scroll_by(&mut fx.cache, 40);
    fx.settle();

    let redraw = fx.grid.redraw_controller();
    let mut kept = 0;
    for (index, handle) in before {
        if let Some(record) = redraw.record(index) {
            assert_eq!(record.base_handle, handle, "index {index} was recreated");
            kept += 1;
        }
    }
    assert!(kept > 0);
}

#[test]
fn drag_reorders_the_selection() {
    let mut fx = Fixture::with_pages(20);
    fx.settle();
    let mut host = RecordingHost::new();
    let from = fx.centre(0);
    let to = fx.centre(3);

    fx.run(
        GestureScript::new().click(from.0, from.1).drag(from, to, 20),
        &mut host,
    );
    assert!(host.events.contains(&HostEvent::DragStart(0)));
    let drops = host.drops();
    assert_eq!(drops, vec![DropTarget::Before(3)]);

    assert!(fx.grid.reorder_selected(&mut fx.cache, drops[0], &mut host));
    assert_eq!(&fx.ids()[..4], &[1, 2, 0, 3]);
    assert_eq!(fx.grid.selected(), vec![2]);
}

#[test]
fn right_click_on_empty_space_reports_nothing() {
    let mut fx = Fixture::with_pages(3);
    fx.settle();
    let mut host = RecordingHost::new();
    fx.run(GestureScript::new().right_click(700, 350), &mut host);
    assert_eq!(host.events, vec![HostEvent::RightClick(None)]);
}

#[test]
fn header_click_reports_section() {
    let mut options = quiet_options();
    options.continuous = true;
    let mut fx = Fixture::new(options);
    fx.grid.set_container(&mut fx.cache, 800, 600);
    fx.grid.set_items(&mut fx.cache, pages(12));
    fx.grid.set_sections(
        &mut fx.cache,
        vec![Section::new("first", 0, 6), Section::new("second", 6, 6)],
    );
    fx.settle();

    let zones = fx.grid.redraw_controller().header_zones().to_vec();
    assert_eq!(zones.len(), 2);
    let zone = zones[1];
    let (x, y) = (zone.rect.x + 5, zone.rect.y + zone.rect.height / 2);

    let mut host = RecordingHost::new();
    fx.run(GestureScript::new().click(x, y), &mut host);
    assert_eq!(host.events.first(), Some(&HostEvent::HeaderClick(zone.section)));
}

#[test]
fn changed_item_is_rendered_again() {
    let mut fx = Fixture::with_pages(10);
    fx.settle();
    let key = CacheKey::new(CLASS, 4);
    assert_eq!(fx.renderer.calls_for(key), 1);

    fx.grid.invalidate_item(&mut fx.cache, 4);
    assert!(!fx.cache.contains(key));
    fx.settle();
    assert_eq!(fx.renderer.calls_for(key), 2);
}

#[test]
fn close_drops_items_and_rasters() {
    let mut fx = Fixture::with_pages(10);
    fx.settle();
    assert!(!fx.cache.is_empty());

    fx.grid.close(&mut fx.cache);
    fx.settle();
    assert!(fx.grid.items().is_empty());
    assert!(fx.cache.is_empty());
    assert_eq!(fx.grid.redraw_controller().records().count(), 0);
}

#[test]
fn landscape_pages_reflow_after_first_render() {
    let mut fx = Fixture::new(quiet_options());
    fx.renderer.set_aspect(1, 2.0);
    fx.grid.set_container(&mut fx.cache, 800, 400);
    fx.grid.set_items(&mut fx.cache, vec![Item::page(0, f32::NAN), Item::page(1, f32::NAN)]);
    // Item 1 reports its size up front; item 0 waits for the render.
    assert_eq!(fx.grid.layout().position(1).unwrap().width, 300);
    fx.settle();
    assert_eq!(fx.grid.layout().position(0).unwrap().width, 75);
    assert_eq!(fx.grid.layout().position(1).unwrap().x, 78);
}

#[test]
#[serial]
fn warmup_fills_neighbouring_classes() {
    let mut fx = Fixture::new(GridOptions {
        scheduler: SchedulerConfig {
            workers: 2,
            warmup_buffer: 2,
            warmup_delay: Duration::from_millis(20),
            warmup_throttle: Duration::ZERO,
        },
        ..GridOptions::default()
    });
    fx.grid.set_container(&mut fx.cache, 800, 400);
    fx.grid.set_items(&mut fx.cache, pages(30));

    let deadline = Instant::now() + SETTLE;
    loop {
        let now = Instant::now();
        fx.grid.tick(now, &mut fx.cache, &mut fx.scene);
        if fx.grid.is_idle() {
            break;
        }
        assert!(now < deadline, "warmup never finished");
        std::thread::sleep(Duration::from_millis(2));
    }

    for class in [ResolutionClass(120), ResolutionClass(180)] {
        assert!(fx.cache.contains_exact(CacheKey::new(class, 0)), "{class} missing");
    }
    assert!(fx.grid.scheduler().stats().warmup_submitted > 0);
    assert_eq!(fx.cache.current_class(), Some(CLASS));
}

#[test]
fn renderer_panic_is_a_failed_item() {
    let mut fx = Fixture::with_pages(10);
    fx.renderer.panic_on(3);
    fx.settle();

    assert_eq!(fx.page_token(3), Some(PageToken::Placeholder { failed: true }));
    assert!(matches!(fx.page_token(4), Some(PageToken::Raster(_))));
    assert_eq!(fx.grid.scheduler().stats().failed, 1);
}

#[test]
fn not_ready_source_is_not_marked_failed() {
    let mut fx = Fixture::with_pages(10);
    let key = CacheKey::new(CLASS, 2);
    fx.renderer.not_ready(key);
    fx.settle();

    assert_eq!(fx.page_token(2), Some(PageToken::Placeholder { failed: false }));
    assert!(!fx.grid.scheduler().has_failed(key));
}

#[test]
fn reloading_during_slow_renders_fills_every_tile() {
    let renderer = Arc::new(ScriptedRenderer::new().with_delay(Duration::from_millis(150)));
    let mut fx = Fixture::with_renderer(renderer, quiet_options());
    fx.grid.set_container(&mut fx.cache, 800, 400);
    fx.grid.set_items(&mut fx.cache, pages(4));
    fx.grid.tick(Instant::now(), &mut fx.cache, &mut fx.scene);
    assert!(fx.grid.scheduler().in_flight() > 0);

    // Same ids again while the first document is still rendering.
    fx.grid.set_items(&mut fx.cache, pages(4));
    fx.settle();

    for index in 0..4 {
        assert!(
            matches!(fx.page_token(index), Some(PageToken::Raster(_))),
            "item {index} left as {:?}",
            fx.page_token(index)
        );
    }
    assert!(fx.grid.scheduler().stats().stale <= 2);
}

#[test]
fn click_on_box_name_asks_host_to_rename() {
    let mut fx = Fixture::new(GridOptions {
        box_size: (100, 100),
        ..quiet_options()
    });
    let boxes = (0..4)
        .map(|id| Item::document_box(id, BoxInfo::new(format!("doc-{id}"), BoxState::Loaded), (100, 100)))
        .collect();
    fx.grid.set_container(&mut fx.cache, 800, 400);
    fx.grid.set_items(&mut fx.cache, boxes);
    fx.settle();

    let pos = fx.grid.layout().position(2).unwrap();
    let mut host = RecordingHost::new();
    let (x, _) = fx.centre(2);
    fx.run(GestureScript::new().click(x, pos.y + pos.height - 10), &mut host);
    assert_eq!(host.events, vec![HostEvent::BoxRenameRequest(2)]);
    assert!(fx.grid.selected().is_empty());

    fx.run(GestureScript::new().click(x, pos.y + 10), &mut host);
    assert_eq!(host.last_selection(), Some(&[2][..]));
}
