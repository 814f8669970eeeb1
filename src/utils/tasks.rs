use std::future::Future;
use std::time::Duration;
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use crate::utils::page::{ElementId, Page, TARGET_ATTR};
use crate::utils::ui::ACTIVE;

pub const SLIDE_INTERVAL: Duration = Duration::from_secs(5);
pub const COUNTER_TICK: Duration = Duration::from_millis(20);
// A counter reaches its target in about this many ticks.
pub const COUNTER_STEPS: u64 = 50;

/// Changes produced by scheduled tasks, applied to the page by the application loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    ShowSlide { index: usize },
    CounterText { element: ElementId, text: String },
}

/// A spawned timer task. Stopping or dropping it aborts the task.
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Starting {} task", name);
        ScheduledTask { name, handle: tokio::spawn(future) }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!("Stopping {} task", self.name);
        }
        self.handle.abort();
    }
}

pub fn next_slide(current: usize, count: usize) -> usize {
    (current + 1) % count
}

/// Hero slider rotation.
#[derive(Debug, Default)]
pub struct SliderController {
    slides: Vec<ElementId>,
    current: usize,
    task: Option<ScheduledTask>,
}

impl SliderController {
    pub fn attach(page: &mut Page) -> Self {
        let slides = page.with_class("hero-slide");
        let current = slides
            .iter()
            .position(|&id| page.get(id).is_some_and(|e| e.has_class(ACTIVE)))
            .unwrap_or(0);
        let mut slider = SliderController { slides, current, task: None };
        if slider.slides.len() > 1 {
            slider.show(page, current);
        }
        slider
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(ScheduledTask::is_running)
    }

    // Rotation only runs with two or more slides.
    pub fn start(&mut self, updates: &UnboundedSender<UiUpdate>) {
        if self.slides.len() <= 1 || self.is_running() {
            return;
        }
        let count = self.slides.len();
        let mut index = self.current;
        let updates = updates.clone();

        self.task = Some(ScheduledTask::spawn("slider", async move {
            let mut ticker = interval(SLIDE_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                index = next_slide(index, count);
                if updates.send(UiUpdate::ShowSlide { index }).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop();
        }
    }

    pub fn show(&mut self, page: &mut Page, index: usize) {
        let Some(&target) = self.slides.get(index) else {
            warn!("No slide at index {}", index);
            return;
        };
        for &id in &self.slides {
            if let Some(slide) = page.get_mut(id) {
                slide.remove_class(ACTIVE);
            }
        }
        if let Some(slide) = page.get_mut(target) {
            slide.add_class(ACTIVE);
        }
        self.current = index;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterSuffix {
    None,
    Percent,
    Plus,
}

/// A statistic counting up to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    target: u64,
    count: u64,
    suffix: CounterSuffix,
}

impl Counter {
    pub fn new(target: u64, suffix: CounterSuffix) -> Self {
        Counter { target, count: 0, suffix }
    }

    pub fn from_text(target: Option<&str>, text: &str) -> Self {
        let target = match target.map(str::trim) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Counter target {:?} is not a whole number, using 0", raw);
                0
            }),
            None => 0,
        };
        let suffix = if text.contains('%') {
            CounterSuffix::Percent
        } else if text.contains('+') {
            CounterSuffix::Plus
        } else {
            CounterSuffix::None
        };
        Counter::new(target, suffix)
    }

    pub fn increment(&self) -> u64 {
        self.target.div_ceil(COUNTER_STEPS)
    }

    pub fn format(&self, value: u64) -> String {
        match self.suffix {
            CounterSuffix::None => value.to_string(),
            CounterSuffix::Percent => format!("{}%", value),
            CounterSuffix::Plus => format!("{}+", value),
        }
    }

    /// Advances one tick. Returns the text to show and whether the counter is done.
    /// The last increment may overshoot; the following tick settles on the target.
    pub fn step(&mut self) -> (String, bool) {
        if self.count < self.target {
            self.count = self.count.saturating_add(self.increment());
            (self.format(self.count), false)
        } else {
            (self.format(self.target), true)
        }
    }
}

/// Statistic counters, all advanced by one task.
#[derive(Debug, Default)]
pub struct CounterController {
    counters: Vec<(ElementId, Counter)>,
    task: Option<ScheduledTask>,
}

impl CounterController {
    pub fn attach(page: &Page) -> Self {
        let counters = page
            .with_class("stat-value")
            .into_iter()
            .filter_map(|id| page.get(id).map(|e| (id, Counter::from_text(e.attr(TARGET_ATTR), &e.text))))
            .collect();
        CounterController { counters, task: None }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(ScheduledTask::is_running)
    }

    pub fn start(&mut self, updates: &UnboundedSender<UiUpdate>) {
        if self.counters.is_empty() || self.is_running() {
            return;
        }
        let mut counters = self.counters.clone();
        let updates = updates.clone();

        self.task = Some(ScheduledTask::spawn("counters", async move {
            let mut ticker = interval(COUNTER_TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut running: Vec<bool> = vec![true; counters.len()];
            while running.iter().any(|&r| r) {
                ticker.tick().await;
                for ((element, counter), still_running) in counters.iter_mut().zip(running.iter_mut()) {
                    if !*still_running {
                        continue;
                    }
                    let (text, done) = counter.step();
                    *still_running = !done;
                    if updates.send(UiUpdate::CounterText { element: *element, text }).is_err() {
                        return;
                    }
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::unbounded_channel;
    use super::*;

    const SLIDES: &str = r##"
        <div class="hero-slide"></div><div class="hero-slide active"></div><div class="hero-slide"></div>
    "##;

    fn active_slide(page: &Page) -> Vec<bool> {
        page.with_class("hero-slide").into_iter().map(|id| page.get(id).unwrap().has_class(ACTIVE)).collect()
    }

    #[test]
    fn slide_index_wraps() {
        assert_eq!(next_slide(0, 3), 1);
        assert_eq!(next_slide(2, 3), 0);
    }

    #[test]
    fn slider_keeps_exactly_one_active_slide() {
        let mut page = Page::parse(SLIDES);
        let mut slider = SliderController::attach(&mut page);
        assert_eq!(slider.current(), 1);
        assert_eq!(active_slide(&page), vec![false, true, false]);

        slider.show(&mut page, 2);
        assert_eq!(active_slide(&page), vec![false, false, true]);
        slider.show(&mut page, 9);
        assert_eq!(active_slide(&page), vec![false, false, true]);
    }

    #[test]
    fn slider_without_active_markup_starts_on_first() {
        let mut page = Page::parse(r#"<div class="hero-slide"></div><div class="hero-slide"></div>"#);
        SliderController::attach(&mut page);
        assert_eq!(active_slide(&page), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn slider_rotates_every_interval() {
        let mut page = Page::parse(SLIDES);
        let mut slider = SliderController::attach(&mut page);
        let (tx, mut rx) = unbounded_channel();
        slider.start(&tx);
        assert!(slider.is_running());

        let mut seen = Vec::new();
        for _ in 0..3 {
            match rx.recv().await {
                Some(UiUpdate::ShowSlide { index }) => seen.push(index),
                other => panic!("unexpected update {:?}", other),
            }
        }
        assert_eq!(seen, vec![2, 0, 1]);

        slider.stop();
        assert!(!slider.is_running());
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn single_slide_never_schedules() {
        let mut page = Page::parse(r#"<div class="hero-slide active"></div>"#);
        let mut slider = SliderController::attach(&mut page);
        let (tx, _rx) = unbounded_channel();
        slider.start(&tx);
        assert!(!slider.is_running());
    }

    #[test]
    fn counter_settles_on_target_after_overshoot() {
        let mut counter = Counter::new(101, CounterSuffix::None);
        assert_eq!(counter.increment(), 3);
        let mut last = (String::new(), false);
        let mut ticks = 0;
        while !last.1 {
            last = counter.step();
            ticks += 1;
        }
        assert_eq!(last.0, "101");
        assert_eq!(ticks, 35);
    }

    #[test]
    fn huge_target_saturates_instead_of_wrapping() {
        let mut counter = Counter::from_text(Some("18446744073709551615"), "0");
        let mut last = (String::new(), false);
        let mut ticks = 0;
        while !last.1 {
            last = counter.step();
            ticks += 1;
            assert!(ticks <= COUNTER_STEPS + 1);
        }
        assert_eq!(last.0, u64::MAX.to_string());
    }

    #[test]
    fn counter_suffix_comes_from_initial_text() {
        assert_eq!(Counter::from_text(Some("95"), "0%").format(95), "95%");
        assert_eq!(Counter::from_text(Some("1200"), "0+").format(1200), "1200+");
        assert_eq!(Counter::from_text(Some("25"), "0").format(25), "25");

        let mut broken = Counter::from_text(Some("lots"), "0");
        assert_eq!(broken.step(), ("0".to_string(), true));
        let mut missing = Counter::from_text(None, "0+");
        assert_eq!(missing.step(), ("0+".to_string(), true));
    }

    #[tokio::test(start_paused = true)]
    async fn counters_run_to_completion_then_finish() {
        let page = Page::parse(
            r#"<span class="stat-value" data-target="3">0%</span><span class="stat-value" data-target="100">0+</span>"#,
        );
        let mut counters = CounterController::attach(&page);
        assert_eq!(counters.len(), 2);
        let (tx, mut rx) = unbounded_channel();
        counters.start(&tx);
        drop(tx);

        let mut last_text = vec![String::new(); page.len()];
        let mut updates = 0;
        while let Some(update) = rx.recv().await {
            if let UiUpdate::CounterText { element, text } = update {
                last_text[element] = text;
                updates += 1;
            }
        }
        assert_eq!(last_text, vec!["3%".to_string(), "100+".to_string()]);
        // 3 ticks + settle for the first, 50 ticks + settle for the second
        assert_eq!(updates, 4 + 51);
        assert!(!counters.is_running());
    }
}
