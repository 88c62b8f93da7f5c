use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use image::{Rgba, RgbaImage};
use log::{debug, error, info, warn};
use simplelog::{Config, LevelFilter, WriteLogger};

use thumbgrid::grid::{
    BoxInfo, BoxState, DEFAULT_ASPECT_RATIO, DropTarget, GridHost, Item, ItemId, PointerEvent, Raster, RenderError,
    ResolutionClass, RetainedScene, Section, ThumbnailCache, ThumbnailGrid, ThumbnailRenderer,
};
use thumbgrid::panic_handler::initialize_panic_handler;
use thumbgrid::settings::GridConfig;

/// Drive the thumbnail grid engine through a scripted browsing session
#[derive(Parser, Debug)]
#[command(name = "thumbgrid")]
#[command(version)]
#[command(about = "Virtualized thumbnail grid engine demo")]
struct Args {
    /// Number of pages
    #[arg(long, default_value_t = 120)]
    items: usize,

    /// Show this many staged document boxes instead of pages
    #[arg(long)]
    boxes: Option<usize>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 900)]
    width: i32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 700)]
    height: i32,

    /// Initial thumbnail height, overrides the config
    #[arg(long)]
    zoom: Option<u32>,

    /// Continuous (sectioned) mode
    #[arg(long)]
    continuous: bool,

    /// Split the items into this many sections
    #[arg(long, default_value_t = 0)]
    sections: usize,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final viewport as PNG
    #[arg(long)]
    snapshot: Option<PathBuf>,

    #[arg(long, default_value = "thumbgrid.log")]
    log_file: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

/// Synthetic pages: a vertical gradient per item, every seventh page landscape
struct PatternRenderer {
    latency: Duration,
}

impl PatternRenderer {
    fn aspect_of(item: ItemId) -> f32 {
        if item % 7 == 6 { 1.414 } else { 0.707 }
    }
}

impl ThumbnailRenderer for PatternRenderer {
    fn render(&self, item: ItemId, class: ResolutionClass) -> Result<Raster, RenderError> {
        std::thread::sleep(self.latency);
        let height = class.height().max(1);
        let width = ((height as f32 * Self::aspect_of(item)).round() as u32).max(1);
        let hue = (item.wrapping_mul(47) % 255) as u8;
        let img = RgbaImage::from_fn(width, height, |x, y| {
            let shade = (y * 200 / height) as u8;
            if x < 4 || y < 4 || x + 4 >= width || y + 4 >= height {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([hue, shade, 255 - shade, 255])
            }
        });
        Ok(Raster::from_rgba_image(img))
    }

    fn intrinsic_size(&self, item: ItemId) -> Option<(f32, f32)> {
        // Landscape pages are discovered on first render.
        (item % 7 != 6).then_some((595.0, 842.0))
    }
}

#[derive(Default)]
struct LoggingHost {
    last_drop: Option<DropTarget>,
}

impl GridHost for LoggingHost {
    fn on_selection_changed(&mut self, selected: &[usize]) {
        info!("Selection: {selected:?}");
    }

    fn on_click(&mut self, index: usize, _event: &PointerEvent) {
        info!("Clicked item {index}");
    }

    fn on_drag_start(&mut self, index: usize, _event: &PointerEvent) {
        info!("Drag started on item {index}");
    }

    fn on_drag_end(&mut self, target: DropTarget, _event: &PointerEvent) {
        info!("Dropped at {target:?}");
        self.last_drop = Some(target);
    }

    fn on_split_request(&mut self, gap: usize) {
        info!("Split requested before item {gap}");
    }

    fn on_box_rename_request(&mut self, index: usize) {
        info!("Rename requested for box {index}");
    }
}

struct Session {
    grid: ThumbnailGrid,
    cache: ThumbnailCache,
    scene: RetainedScene,
}

impl Session {
    /// Tick until renders and redraws have settled
    fn settle(&mut self, label: &str) -> Result<()> {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(10);
        let mut ticks = 0;
        let mut completions = 0;
        let mut churn = 0;
        loop {
            let now = Instant::now();
            let report = self.grid.tick(now, &mut self.cache, &mut self.scene);
            ticks += 1;
            completions += report.completions;
            if let Some(stats) = report.redraw {
                churn += stats.base_churn();
            }
            if self.grid.scheduler().in_flight() == 0 && !self.grid.needs_redraw() {
                break;
            }
            if now >= deadline {
                bail!("{label}: renders did not settle");
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        let counters = self.scene.take_counters();
        println!(
            "{label:<14} {:>5}ms ticks={ticks:<4} renders={completions:<4} base_churn={churn:<4} \
             created={} moved={} deleted={} cached={}",
            started.elapsed().as_millis(),
            counters.created,
            counters.moved,
            counters.deleted,
            self.cache.len()
        );
        Ok(())
    }

    fn centre_of(&self, index: usize) -> Option<(i32, i32)> {
        let pos = self.grid.layout().position(index)?;
        let scroll = self.grid.viewport().scroll_y;
        Some((pos.x + pos.width / 2, pos.y + pos.height / 2 - scroll))
    }
}

fn build_items(args: &Args, config: &GridConfig) -> Vec<Item> {
    let box_size = (config.box_size.width, config.box_size.height);
    let count = args.boxes.unwrap_or(args.items);
    (0..count as ItemId)
        .map(|id| {
            if args.boxes.is_some() {
                let state = match id % 4 {
                    0 => BoxState::Loaded,
                    1 => BoxState::Loading,
                    2 => BoxState::Queued,
                    _ => BoxState::Failed,
                };
                let mut info = BoxInfo::new(format!("document-{id}.pdf"), state);
                info.progress = 0.4;
                info.page_count = (id as usize % 30) + 1;
                Item::document_box(id, info, box_size)
            } else {
                Item::page(id, DEFAULT_ASPECT_RATIO)
            }
        })
        .collect()
}

fn build_sections(count: usize, sections: usize) -> Vec<Section> {
    if sections == 0 || count == 0 {
        return Vec::new();
    }
    let per = count.div_ceil(sections);
    (0..count)
        .step_by(per)
        .enumerate()
        .map(|(i, start)| Section::new(format!("Document {}", i + 1), start, per.min(count - start)))
        .collect()
}

fn run(args: Args) -> Result<()> {
    let path = args.config.clone().or_else(GridConfig::default_path);
    let mut config = match path.as_deref().map(GridConfig::load) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            warn!("{e}, using defaults");
            GridConfig::default()
        }
        None => GridConfig::default(),
    };
    if let Some(zoom) = args.zoom {
        config.thumbnail_size = zoom;
    }
    config.continuous |= args.continuous;
    debug!("Effective config: {config:?}");

    let renderer = Arc::new(PatternRenderer {
        latency: Duration::from_millis(3),
    });
    let mut session = Session {
        grid: ThumbnailGrid::new(renderer, config.grid_options()),
        cache: config.cache(),
        scene: RetainedScene::new(),
    };
    let mut host = LoggingHost::default();

    let items = build_items(&args, &config);
    let count = items.len();
    session
        .grid
        .set_container(&mut session.cache, args.width, args.height);
    session.grid.set_items(&mut session.cache, items);
    let sections = build_sections(count, args.sections);
    if !sections.is_empty() {
        session.grid.set_sections(&mut session.cache, sections);
    }
    session.settle("initial")?;

    let step = args.height / 2;
    for i in 0..4 {
        session.grid.scroll_by(&mut session.cache, step);
        session.settle(&format!("scroll #{}", i + 1))?;
    }
    session.grid.scroll_to(&mut session.cache, 0);
    session.settle("scroll top")?;

    session.grid.zoom_in(&mut session.cache);
    session.settle("zoom in")?;
    session.grid.zoom_out(&mut session.cache);
    session.settle("zoom out")?;

    if let (Some(from), Some(to)) = (session.centre_of(0), session.centre_of(3)) {
        let cache = &session.cache;
        session
            .grid
            .pointer_press(cache, PointerEvent::at(from.0, from.1), &mut host);
        for i in 1..=8 {
            let x = from.0 + (to.0 - from.0) * i / 8;
            let y = from.1 + (to.1 - from.1) * i / 8;
            session.grid.pointer_move(cache, PointerEvent::at(x, y), &mut host);
        }
        session
            .grid
            .pointer_release(cache, PointerEvent::at(to.0, to.1), &mut host);
        if let Some(target) = host.last_drop.take() {
            session
                .grid
                .reorder_selected(&mut session.cache, target, &mut host);
        }
        session.settle("drag")?;
    }

    let stats = session.grid.scheduler().stats();
    println!(
        "scheduler: submitted={} warmup={} rendered={} failed={} stale={}",
        stats.submitted, stats.warmup_submitted, stats.rendered, stats.failed, stats.stale
    );

    if let Some(path) = &args.snapshot {
        let canvas = session.grid.options().palette.canvas;
        let img = session.scene.rasterize(session.grid.viewport(), canvas);
        img.save(path)
            .with_context(|| format!("failed to write snapshot {path:?}"))?;
        println!("snapshot written to {}", path.display());
    }

    session.grid.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        args.log_level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("failed to create log file {:?}", args.log_file))?,
    )?;
    initialize_panic_handler();

    info!("Starting thumbgrid demo");

    let res = run(args);
    if let Err(err) = &res {
        error!("Application error: {err:?}");
    }
    info!("Shutting down thumbgrid demo");
    res
}
