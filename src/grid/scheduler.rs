//! Render scheduler - owns the worker pool, the in-flight set and warmup

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::cache::{CacheKey, CachedRaster, ThumbnailCache};
use super::renderer::ThumbnailRenderer;
use super::request::{
    Priority, RenderCompletion, RenderError, RenderTask, RequestId, WorkerMessage,
};
use super::worker::render_worker;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_WARMUP_BUFFER: usize = 30;
pub const DEFAULT_WARMUP_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_WARMUP_THROTTLE: Duration = Duration::from_millis(10);

/// Pool and warmup tuning
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub workers: usize,
    /// Items on each side of the visible range covered by warmup
    pub warmup_buffer: usize,
    /// Quiescence required after a zoom or scroll before warmup starts
    pub warmup_delay: Duration,
    /// Minimum spacing between warmup submissions
    pub warmup_throttle: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            warmup_buffer: DEFAULT_WARMUP_BUFFER,
            warmup_delay: DEFAULT_WARMUP_DELAY,
            warmup_throttle: DEFAULT_WARMUP_THROTTLE,
        }
    }
}

/// What a drained completion did
#[derive(Clone, Debug)]
pub enum CompletionEvent {
    /// Cached under its key
    Rendered { key: CacheKey, raster: CachedRaster },
    Failed { key: CacheKey, detail: String },
    NotReady { key: CacheKey },
    /// Belonged to a previous document; dropped
    Stale { key: CacheKey },
}

impl CompletionEvent {
    #[must_use]
    pub fn key(&self) -> CacheKey {
        match self {
            Self::Rendered { key, .. }
            | Self::Failed { key, .. }
            | Self::NotReady { key }
            | Self::Stale { key } => *key,
        }
    }
}

/// Running counters, logged on drain
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub warmup_submitted: u64,
    pub rendered: u64,
    pub failed: u64,
    pub stale: u64,
}

struct WarmupJob {
    generation: u64,
    queue: VecDeque<CacheKey>,
    next_at: Instant,
}

/// Bounded worker pool plus the bookkeeping that keeps it deduplicated
pub struct RenderScheduler {
    renderer: Arc<dyn ThumbnailRenderer>,
    task_tx: Sender<WorkerMessage>,
    /// Kept to pull back queued tasks when the document changes
    task_rx: Receiver<WorkerMessage>,
    completion_rx: Receiver<RenderCompletion>,
    pool_size: usize,
    config: SchedulerConfig,
    pending: HashMap<CacheKey, Priority>,
    failed: HashSet<CacheKey>,
    epoch: u64,
    generation: u64,
    next_request_id: u64,
    warmup_due_at: Option<Instant>,
    warmup: Option<WarmupJob>,
    stats: SchedulerStats,
    running: bool,
}

impl RenderScheduler {
    #[must_use]
    pub fn new(renderer: Arc<dyn ThumbnailRenderer>) -> Self {
        Self::with_config(renderer, SchedulerConfig::default())
    }

    #[must_use]
    pub fn with_config(renderer: Arc<dyn ThumbnailRenderer>, config: SchedulerConfig) -> Self {
        let pool_size = config.workers.max(1);

        // The task queue is shared by every worker, so it has to be MPMC.
        let (task_tx, task_rx) = flume::unbounded();
        let (completion_tx, completion_rx) = flume::unbounded();

        for index in 0..pool_size {
            let renderer = Arc::clone(&renderer);
            let rx = task_rx.clone();
            let tx = completion_tx.clone();
            std::thread::spawn(move || render_worker(index, renderer, rx, tx));
        }

        Self {
            renderer,
            task_tx,
            task_rx,
            completion_rx,
            pool_size,
            config,
            pending: HashMap::new(),
            failed: HashSet::new(),
            epoch: 0,
            generation: 0,
            next_request_id: 1,
            warmup_due_at: None,
            warmup: None,
            stats: SchedulerStats::default(),
            running: true,
        }
    }

    #[must_use]
    pub fn renderer(&self) -> &Arc<dyn ThumbnailRenderer> {
        &self.renderer
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Request a render unless the key is cached, in flight or failed this pass.
    /// Returns true if a task was submitted.
    pub fn request(&mut self, cache: &ThumbnailCache, key: CacheKey) -> bool {
        if self.pending.contains_key(&key)
            || cache.contains_exact(key)
            || self.failed.contains(&key)
        {
            return false;
        }
        self.submit(key, Priority::Interactive)
    }

    fn submit(&mut self, key: CacheKey, priority: Priority) -> bool {
        if !self.running {
            return false;
        }
        let task = RenderTask {
            id: self.next_id(),
            key,
            priority,
            epoch: self.epoch,
            generation: self.generation,
        };
        if self.task_tx.send(WorkerMessage::Render(task)).is_err() {
            warn!("Render queue closed, dropping request for item {}", key.item);
            return false;
        }
        self.pending.insert(key, priority);
        self.stats.submitted += 1;
        if priority == Priority::Warmup {
            self.stats.warmup_submitted += 1;
        }
        true
    }

    #[must_use]
    pub fn is_pending(&self, key: CacheKey) -> bool {
        self.pending.contains_key(&key)
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// In-flight tasks that were submitted by warmup
    #[must_use]
    pub fn warmup_in_flight(&self) -> usize {
        self.pending
            .values()
            .filter(|priority| **priority == Priority::Warmup)
            .count()
    }

    #[must_use]
    pub fn has_failed(&self, key: CacheKey) -> bool {
        self.failed.contains(&key)
    }

    /// Start of a scroll/resize/zoom/explicit redraw: failed keys may be retried
    pub fn begin_visibility_pass(&mut self) {
        self.failed.clear();
    }

    /// Invalidate logically after a zoom, scroll or structural change
    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// New document: queued tasks are withdrawn and results still being
    /// rendered for the old one are discarded on arrival
    pub fn reset_document(&mut self) {
        self.epoch += 1;
        self.generation += 1;
        let mut withdrawn = 0;
        let mut shutdowns = 0;
        while let Ok(message) = self.task_rx.try_recv() {
            match message {
                WorkerMessage::Render(_) => withdrawn += 1,
                WorkerMessage::Shutdown => shutdowns += 1,
            }
        }
        for _ in 0..shutdowns {
            let _ = self.task_tx.send(WorkerMessage::Shutdown);
        }
        if withdrawn > 0 || !self.pending.is_empty() {
            debug!(
                "Document reset: withdrew {withdrawn} queued tasks, {} were in flight",
                self.pending.len()
            );
        }
        self.pending.clear();
        self.failed.clear();
        self.warmup = None;
        self.warmup_due_at = None;
    }

    /// Forget failure marks and queued work for one item
    pub fn forget_item(&mut self, item: super::types::ItemId) {
        self.failed.retain(|key| key.item != item);
        if let Some(job) = self.warmup.as_mut() {
            job.queue.retain(|key| key.item != item);
        }
    }

    /// Apply every completion that has arrived. Never blocks.
    pub fn drain(&mut self, cache: &mut ThumbnailCache) -> Vec<CompletionEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            events.push(self.apply_completion(cache, completion));
        }
        if !events.is_empty() {
            debug!(
                "Drained {} completions, {} in flight, stats {:?}",
                events.len(),
                self.pending.len(),
                self.stats
            );
        }
        events
    }

    /// Like [`drain`](Self::drain) but waits up to `timeout` for the first completion
    pub fn drain_blocking(
        &mut self,
        cache: &mut ThumbnailCache,
        timeout: Duration,
    ) -> Vec<CompletionEvent> {
        let mut events = Vec::new();
        if self.pending.is_empty() {
            return events;
        }
        match self.completion_rx.recv_timeout(timeout) {
            Ok(completion) => events.push(self.apply_completion(cache, completion)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return events,
        }
        events.extend(self.drain(cache));
        events
    }

    fn apply_completion(
        &mut self,
        cache: &mut ThumbnailCache,
        completion: RenderCompletion,
    ) -> CompletionEvent {
        let RenderCompletion { task, result } = completion;
        let key = task.key;

        // The pending entry for this key may already belong to the new document.
        if task.epoch != self.epoch {
            self.stats.stale += 1;
            return CompletionEvent::Stale { key };
        }
        self.pending.remove(&key);

        // Generation mismatches are still cached; they surface if relevant.
        match result {
            Ok(raster) => {
                self.stats.rendered += 1;
                self.failed.remove(&key);
                let raster = cache.put(key, raster);
                CompletionEvent::Rendered { key, raster }
            }
            Err(RenderError::NotReady) => CompletionEvent::NotReady { key },
            Err(RenderError::Failed { detail }) => {
                self.stats.failed += 1;
                warn!("Render of item {} at {} failed: {detail}", key.item, key.class);
                self.failed.insert(key);
                CompletionEvent::Failed { key, detail }
            }
        }
    }

    /// Schedule warmup to start after the quiescence delay; drops any running scan
    pub fn arm_warmup(&mut self, now: Instant) {
        if self.warmup.take().is_some() {
            debug!("Warmup superseded");
        }
        self.warmup_due_at = Some(now + self.config.warmup_delay);
    }

    pub fn cancel_warmup(&mut self) {
        self.warmup = None;
        self.warmup_due_at = None;
    }

    /// True once the armed delay has elapsed and no scan is running
    #[must_use]
    pub fn warmup_due(&self, now: Instant) -> bool {
        self.warmup.is_none() && self.warmup_due_at.is_some_and(|due| now >= due)
    }

    #[must_use]
    pub fn warmup_active(&self) -> bool {
        self.warmup.is_some()
    }

    #[must_use]
    pub fn warmup_armed(&self) -> bool {
        self.warmup_due_at.is_some() || self.warmup.is_some()
    }

    /// Begin a scan over `keys` bound to the current generation
    pub fn start_warmup(&mut self, now: Instant, keys: Vec<CacheKey>) {
        self.warmup_due_at = None;
        if keys.is_empty() {
            return;
        }
        debug!(
            "Warmup started: {} candidates, generation {}",
            keys.len(),
            self.generation
        );
        self.warmup = Some(WarmupJob {
            generation: self.generation,
            queue: keys.into(),
            next_at: now,
        });
    }

    /// Submit throttled warmup work while the pool has spare capacity.
    /// Returns how many tasks were submitted.
    pub fn pump_warmup(&mut self, now: Instant, cache: &ThumbnailCache) -> usize {
        let Some(mut job) = self.warmup.take() else {
            return 0;
        };
        if job.generation != self.generation {
            debug!(
                "Warmup aborted: generation {} is now {}",
                job.generation, self.generation
            );
            return 0;
        }

        let mut submitted = 0;
        while now >= job.next_at && self.pending.len() < self.pool_size {
            let Some(key) = job.queue.pop_front() else {
                break;
            };
            if cache.contains_exact(key) || self.pending.contains_key(&key) || self.failed.contains(&key) {
                continue;
            }
            if self.submit(key, Priority::Warmup) {
                submitted += 1;
                job.next_at += self.config.warmup_throttle;
            }
        }

        if job.queue.is_empty() {
            debug!("Warmup finished");
        } else {
            self.warmup = Some(job);
        }
        submitted
    }

    /// Nothing in flight and no warmup running or armed
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && !self.warmup_armed()
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Stop all workers. Pending results are dropped.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        for _ in 0..self.pool_size {
            let _ = self.task_tx.send(WorkerMessage::Shutdown);
        }
        self.cancel_warmup();
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::raster::Raster;
    use super::super::types::{ItemId, ResolutionClass};
    use super::*;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: Mutex<HashSet<ItemId>>,
    }

    impl ThumbnailRenderer for Counting {
        fn render(&self, item: ItemId, class: ResolutionClass) -> Result<Raster, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .fail
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .contains(&item)
            {
                return Err(RenderError::failed("scripted"));
            }
            Ok(Raster::solid(class.height() * 7 / 10, class.height(), [0, 0, 0, 255]))
        }
    }

    fn key(class: u32, item: ItemId) -> CacheKey {
        CacheKey::new(ResolutionClass(class), item)
    }

    fn settle(scheduler: &mut RenderScheduler, cache: &mut ThumbnailCache) -> Vec<CompletionEvent> {
        let mut events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.in_flight() > 0 && Instant::now() < deadline {
            events.extend(scheduler.drain_blocking(cache, Duration::from_millis(50)));
        }
        events
    }

    #[test]
    fn duplicate_requests_are_coalesced() {
        let renderer = Arc::new(Counting::default());
        let mut scheduler = RenderScheduler::new(renderer.clone());
        let mut cache = ThumbnailCache::default();

        assert!(scheduler.request(&cache, key(150, 1)));
        assert!(!scheduler.request(&cache, key(150, 1)));
        assert_eq!(scheduler.in_flight(), 1);

        let events = settle(&mut scheduler, &mut cache);
        assert_eq!(events.len(), 1);
        assert!(cache.contains_exact(key(150, 1)));
        assert!(!scheduler.request(&cache, key(150, 1)));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_wait_for_next_visibility_pass() {
        let renderer = Arc::new(Counting::default());
        renderer.fail.lock().unwrap().insert(5);
        let mut scheduler = RenderScheduler::new(renderer.clone());
        let mut cache = ThumbnailCache::default();

        scheduler.request(&cache, key(150, 5));
        let events = settle(&mut scheduler, &mut cache);
        assert!(matches!(events[0], CompletionEvent::Failed { .. }));
        assert_eq!(scheduler.in_flight(), 0);
        assert!(!scheduler.request(&cache, key(150, 5)));

        scheduler.begin_visibility_pass();
        assert!(scheduler.request(&cache, key(150, 5)));
    }

    /// Blocks every render until released, reporting each item it starts
    struct Gated {
        started: Sender<ItemId>,
        release: Receiver<()>,
    }

    impl ThumbnailRenderer for Gated {
        fn render(&self, item: ItemId, class: ResolutionClass) -> Result<Raster, RenderError> {
            let _ = self.started.send(item);
            let _ = self.release.recv_timeout(Duration::from_secs(5));
            Ok(Raster::solid(class.height() / 2, class.height(), [0, 0, 0, 255]))
        }
    }

    #[test]
    fn old_document_results_are_discarded() {
        let (started_tx, started_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        let renderer = Arc::new(Gated {
            started: started_tx,
            release: release_rx,
        });
        let config = SchedulerConfig {
            workers: 1,
            ..SchedulerConfig::default()
        };
        let mut scheduler = RenderScheduler::with_config(renderer, config);
        let mut cache = ThumbnailCache::default();

        assert!(scheduler.request(&cache, key(150, 1)));
        assert!(scheduler.request(&cache, key(150, 2)));
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(1));

        // Item 1 is on the worker, item 2 is still queued.
        scheduler.reset_document();
        assert_eq!(scheduler.in_flight(), 0);
        assert!(scheduler.request(&cache, key(150, 1)));

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        let events = settle(&mut scheduler, &mut cache);
        assert!(matches!(events[0], CompletionEvent::Stale { .. }));
        assert!(matches!(events.last(), Some(CompletionEvent::Rendered { .. })));
        assert_eq!(scheduler.stats().stale, 1);
        assert!(cache.contains_exact(key(150, 1)));
        assert!(!cache.contains_exact(key(150, 2)));

        let rendered: Vec<ItemId> = started_rx.try_iter().collect();
        assert_eq!(rendered, vec![1]);
    }

    #[test]
    fn warmup_respects_delay_capacity_and_generation() {
        let renderer = Arc::new(Counting::default());
        let config = SchedulerConfig {
            workers: 2,
            ..SchedulerConfig::default()
        };
        let mut scheduler = RenderScheduler::with_config(renderer, config);
        let cache = ThumbnailCache::default();
        let t0 = Instant::now();

        scheduler.arm_warmup(t0);
        assert!(!scheduler.warmup_due(t0 + Duration::from_millis(100)));
        let due = t0 + Duration::from_millis(600);
        assert!(scheduler.warmup_due(due));

        scheduler.start_warmup(due, (0..10).map(|i| key(180, i)).collect());
        // Far in the future so throttling never limits; the pool does.
        let submitted = scheduler.pump_warmup(due + Duration::from_secs(10), &cache);
        assert_eq!(submitted, 2);
        assert!(scheduler.warmup_active());
        assert_eq!(scheduler.warmup_in_flight(), 2);

        // A visible request for a key warmup already submitted is not resent.
        assert!(!scheduler.request(&cache, key(180, 0)));
        assert_eq!(scheduler.in_flight(), 2);

        scheduler.bump_generation();
        assert_eq!(scheduler.pump_warmup(due + Duration::from_secs(20), &cache), 0);
        assert!(!scheduler.warmup_active());
    }
}
