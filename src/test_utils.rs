pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Mutex, PoisonError};
    use std::time::{Duration, Instant};

    use crate::grid::{
        CacheKey, DrawableSurface, DropTarget, GridHost, ItemId, Modifiers, PointerEvent, Raster,
        RenderError, ResolutionClass, ThumbnailCache, ThumbnailGrid, ThumbnailRenderer,
    };

    #[derive(Default)]
    struct Script {
        fail_once: HashSet<CacheKey>,
        fail_always: HashSet<CacheKey>,
        not_ready: HashSet<CacheKey>,
        panic_on: HashSet<ItemId>,
        aspects: HashMap<ItemId, f32>,
        calls: Vec<CacheKey>,
    }

    /// Renderer with deterministic output and injectable failures
    pub struct ScriptedRenderer {
        script: Mutex<Script>,
        delay: Duration,
        default_aspect: f32,
    }

    impl Default for ScriptedRenderer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ScriptedRenderer {
        pub fn new() -> Self {
            Self {
                script: Mutex::new(Script::default()),
                delay: Duration::ZERO,
                default_aspect: 0.5,
            }
        }

        /// Sleep this long in every render
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Width / height of every rendered page without an explicit aspect
        pub fn with_default_aspect(mut self, aspect: f32) -> Self {
            self.default_aspect = aspect;
            self
        }

        fn script(&self) -> std::sync::MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub fn fail_once(&self, key: CacheKey) {
            self.script().fail_once.insert(key);
        }

        pub fn fail_always(&self, key: CacheKey) {
            self.script().fail_always.insert(key);
        }

        pub fn not_ready(&self, key: CacheKey) {
            self.script().not_ready.insert(key);
        }

        pub fn panic_on(&self, item: ItemId) {
            self.script().panic_on.insert(item);
        }

        /// Reported through `intrinsic_size` and used for the rendered raster
        pub fn set_aspect(&self, item: ItemId, aspect: f32) {
            self.script().aspects.insert(item, aspect);
        }

        /// Every render call so far, in call order
        pub fn calls(&self) -> Vec<CacheKey> {
            self.script().calls.clone()
        }

        pub fn calls_for(&self, key: CacheKey) -> usize {
            self.script().calls.iter().filter(|k| **k == key).count()
        }

        pub fn clear_calls(&self) {
            self.script().calls.clear();
        }

        /// Colour derived from the item id
        pub fn colour_of(item: ItemId) -> [u8; 4] {
            let v = item.wrapping_mul(2_654_435_761);
            [(v >> 16) as u8, (v >> 8) as u8, v as u8, 255]
        }
    }

    impl ThumbnailRenderer for ScriptedRenderer {
        fn render(&self, item: ItemId, class: ResolutionClass) -> Result<Raster, RenderError> {
            let key = CacheKey::new(class, item);
            let aspect = {
                let mut script = self.script();
                script.calls.push(key);
                if script.panic_on.contains(&item) {
                    drop(script);
                    panic!("scripted panic for item {item}");
                }
                if script.not_ready.contains(&key) {
                    return Err(RenderError::NotReady);
                }
                if script.fail_always.contains(&key) || script.fail_once.remove(&key) {
                    return Err(RenderError::failed(format!("scripted failure for {item}")));
                }
                script.aspects.get(&item).copied().unwrap_or(self.default_aspect)
            };
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            let height = class.height().max(1);
            let width = ((height as f32 * aspect).round() as u32).max(1);
            Ok(Raster::solid(width, height, Self::colour_of(item)))
        }

        fn intrinsic_size(&self, item: ItemId) -> Option<(f32, f32)> {
            self.script().aspects.get(&item).map(|aspect| (*aspect, 1.0))
        }
    }

    /// Host callback, as recorded by [`RecordingHost`]
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum HostEvent {
        SelectionChanged(Vec<usize>),
        Click(usize),
        DoubleClick(usize),
        RightClick(Option<usize>),
        DragStart(usize),
        DragMotion(DropTarget),
        DragEnd(DropTarget),
        SplitRequest(usize),
        HeaderClick(usize),
        HeaderRightClick(usize),
        BoxRenameRequest(usize),
    }

    #[derive(Debug, Default)]
    pub struct RecordingHost {
        pub events: Vec<HostEvent>,
    }

    impl RecordingHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn last_selection(&self) -> Option<&[usize]> {
            self.events.iter().rev().find_map(|e| match e {
                HostEvent::SelectionChanged(sel) => Some(sel.as_slice()),
                _ => None,
            })
        }

        pub fn drops(&self) -> Vec<DropTarget> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    HostEvent::DragEnd(t) => Some(*t),
                    _ => None,
                })
                .collect()
        }
    }

    impl GridHost for RecordingHost {
        fn on_selection_changed(&mut self, selected: &[usize]) {
            self.events.push(HostEvent::SelectionChanged(selected.to_vec()));
        }
        fn on_click(&mut self, index: usize, _event: &PointerEvent) {
            self.events.push(HostEvent::Click(index));
        }
        fn on_double_click(&mut self, index: usize, _event: &PointerEvent) {
            self.events.push(HostEvent::DoubleClick(index));
        }
        fn on_right_click(&mut self, index: Option<usize>, _event: &PointerEvent) {
            self.events.push(HostEvent::RightClick(index));
        }
        fn on_drag_start(&mut self, index: usize, _event: &PointerEvent) {
            self.events.push(HostEvent::DragStart(index));
        }
        fn on_drag_motion(&mut self, target: DropTarget, _event: &PointerEvent) {
            self.events.push(HostEvent::DragMotion(target));
        }
        fn on_drag_end(&mut self, target: DropTarget, _event: &PointerEvent) {
            self.events.push(HostEvent::DragEnd(target));
        }
        fn on_split_request(&mut self, gap: usize) {
            self.events.push(HostEvent::SplitRequest(gap));
        }
        fn on_section_header_click(&mut self, section: usize, _event: &PointerEvent) {
            self.events.push(HostEvent::HeaderClick(section));
        }
        fn on_section_header_right_click(&mut self, section: usize, _event: &PointerEvent) {
            self.events.push(HostEvent::HeaderRightClick(section));
        }
        fn on_box_rename_request(&mut self, index: usize) {
            self.events.push(HostEvent::BoxRenameRequest(index));
        }
    }

    #[derive(Clone, Copy, Debug)]
    enum Step {
        Press(PointerEvent),
        Move(PointerEvent),
        Release(PointerEvent),
        DoubleClick(PointerEvent),
        RightClick(PointerEvent),
    }

    /// Builder for pointer sequences in viewport coordinates
    #[derive(Clone, Debug, Default)]
    pub struct GestureScript {
        steps: Vec<Step>,
    }

    impl GestureScript {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn hover(mut self, x: i32, y: i32) -> Self {
            self.steps.push(Step::Move(PointerEvent::at(x, y)));
            self
        }

        pub fn press(mut self, x: i32, y: i32) -> Self {
            self.steps.push(Step::Press(PointerEvent::at(x, y)));
            self
        }

        pub fn press_with(mut self, x: i32, y: i32, modifiers: Modifiers) -> Self {
            self.steps
                .push(Step::Press(PointerEvent::at(x, y).with_modifiers(modifiers)));
            self
        }

        pub fn move_to(self, x: i32, y: i32) -> Self {
            self.hover(x, y)
        }

        pub fn release(mut self, x: i32, y: i32) -> Self {
            self.steps.push(Step::Release(PointerEvent::at(x, y)));
            self
        }

        /// Press and release in place
        pub fn click(self, x: i32, y: i32) -> Self {
            self.press(x, y).release(x, y)
        }

        pub fn ctrl_click(self, x: i32, y: i32) -> Self {
            self.press_with(x, y, Modifiers::CTRL).release(x, y)
        }

        pub fn shift_click(self, x: i32, y: i32) -> Self {
            self.press_with(x, y, Modifiers::SHIFT).release(x, y)
        }

        pub fn double_click(mut self, x: i32, y: i32) -> Self {
            self.steps.push(Step::DoubleClick(PointerEvent::at(x, y)));
            self
        }

        pub fn right_click(mut self, x: i32, y: i32) -> Self {
            self.steps.push(Step::RightClick(PointerEvent::at(x, y)));
            self
        }

        /// Press at `from`, move in `steps` increments to `to`, release
        pub fn drag(mut self, from: (i32, i32), to: (i32, i32), steps: i32) -> Self {
            self = self.press(from.0, from.1);
            let steps = steps.max(1);
            for i in 1..=steps {
                let x = from.0 + (to.0 - from.0) * i / steps;
                let y = from.1 + (to.1 - from.1) * i / steps;
                self = self.move_to(x, y);
            }
            self.release(to.0, to.1)
        }

        pub fn len(&self) -> usize {
            self.steps.len()
        }

        pub fn is_empty(&self) -> bool {
            self.steps.is_empty()
        }

        pub fn run(&self, grid: &mut ThumbnailGrid, cache: &ThumbnailCache, host: &mut dyn GridHost) {
            for step in &self.steps {
                match *step {
                    Step::Press(e) => grid.pointer_press(cache, e, host),
                    Step::Move(e) => grid.pointer_move(cache, e, host),
                    Step::Release(e) => grid.pointer_release(cache, e, host),
                    Step::DoubleClick(e) => grid.double_click(cache, e, host),
                    Step::RightClick(e) => grid.right_click(cache, e, host),
                }
            }
        }
    }

    /// Tick until nothing is in flight and nothing is left to draw.
    /// Warmup is not waited for. Returns the number of ticks.
    pub fn pump_until_idle(
        grid: &mut ThumbnailGrid,
        cache: &mut ThumbnailCache,
        surface: &mut dyn DrawableSurface,
        timeout: Duration,
    ) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ticks = 0;
        loop {
            let now = Instant::now();
            grid.tick(now, cache, surface);
            ticks += 1;
            if grid.scheduler().in_flight() == 0 && !grid.needs_redraw() {
                return ticks;
            }
            assert!(now < deadline, "grid did not settle within {timeout:?}");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use crate::grid::{CacheKey, ResolutionClass, ThumbnailRenderer};

    #[test]
    fn scripted_failures_fire_once() {
        let renderer = ScriptedRenderer::new();
        let key = CacheKey::new(ResolutionClass(100), 3);
        renderer.fail_once(key);
        assert!(renderer.render(3, ResolutionClass(100)).is_err());
        let raster = renderer.render(3, ResolutionClass(100)).unwrap();
        assert_eq!(raster.size(), (50, 100));
        assert_eq!(renderer.calls_for(key), 2);
    }

    #[test]
    fn gesture_script_builder() {
        let script = GestureScript::new().click(10, 10).drag((0, 0), (30, 0), 3).ctrl_click(5, 5);
        assert_eq!(script.len(), 2 + 5 + 2);
    }
}
