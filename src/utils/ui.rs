use log::debug;
use crate::utils::page::{ElementId, Page, LANG_ATTR};

pub const ACTIVE: &str = "active";
pub const VISIBLE: &str = "visible";
pub const MOBILE_BREAKPOINT: u32 = 768;

pub const INTERSECTION_THRESHOLD: f64 = 0.3;
// A `.fade-in` element shows once its top is this far inside the viewport.
pub const FADE_IN_OFFSET: i64 = 150;
// Titles and cards show once their top passes 80% of the viewport height.
pub const ENTRANCE_LINE_PERCENT: i64 = 80;
pub const CARD_STAGGER_MS: u64 = 100;
pub const DELAY_ATTR: &str = "data-delay-ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub touch: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 1280, height: 800, touch: false }
    }
}

impl Viewport {
    pub fn is_mobile_or_touch(&self) -> bool {
        self.width <= MOBILE_BREAKPOINT || self.touch
    }
}

/// Mobile navigation toggle and the dropdown menus inside it.
#[derive(Debug, Default)]
pub struct MenuController {
    toggle: Option<ElementId>,
    nav: Option<ElementId>,
    dropdowns: Vec<ElementId>,
}

impl MenuController {
    pub fn attach(page: &Page) -> Self {
        MenuController {
            toggle: page.find_by_id("navToggle"),
            nav: page.find_by_id("mainNav"),
            dropdowns: page.with_class("dropdown"),
        }
    }

    fn menu_parts(&self) -> Option<(ElementId, ElementId)> {
        self.toggle.zip(self.nav)
    }

    pub fn toggle(&self, page: &mut Page, viewport: &Viewport) {
        if let Some((toggle, nav)) = self.menu_parts() {
            for id in [nav, toggle] {
                if let Some(element) = page.get_mut(id) {
                    element.toggle_class(ACTIVE);
                }
            }
        }
        // the click still reaches the document, which closes open dropdowns
        if viewport.is_mobile_or_touch() {
            self.close_dropdowns(page);
        }
    }

    pub fn click_outside(&self, page: &mut Page, viewport: &Viewport) {
        self.close_menu(page);
        if viewport.is_mobile_or_touch() {
            self.close_dropdowns(page);
        }
    }

    // Returns false when the click is ignored (desktop hover menus, unknown dropdown).
    pub fn click_dropdown(&self, page: &mut Page, viewport: &Viewport, index: usize) -> bool {
        if !viewport.is_mobile_or_touch() {
            return false;
        }
        let Some(&target) = self.dropdowns.get(index) else {
            return false;
        };

        for &other in self.dropdowns.iter().filter(|&&id| id != target) {
            if let Some(element) = page.get_mut(other) {
                element.remove_class(ACTIVE);
            }
        }
        if let Some(element) = page.get_mut(target) {
            element.toggle_class(ACTIVE);
        }
        true
    }

    pub fn resize(&self, page: &mut Page, viewport: &Viewport) {
        if viewport.width > MOBILE_BREAKPOINT {
            self.close_menu(page);
            self.close_dropdowns(page);
        }
    }

    fn close_menu(&self, page: &mut Page) {
        for id in self.toggle.into_iter().chain(self.nav) {
            if let Some(element) = page.get_mut(id) {
                element.remove_class(ACTIVE);
            }
        }
    }

    fn close_dropdowns(&self, page: &mut Page) {
        for &id in &self.dropdowns {
            if let Some(element) = page.get_mut(id) {
                element.remove_class(ACTIVE);
            }
        }
    }
}

// Marks the language button matching `language` as active.
pub fn update_active_language_button(page: &mut Page, language: &str) {
    for id in page.language_buttons() {
        if let Some(button) = page.get_mut(id) {
            if button.attr(LANG_ATTR) == Some(language) {
                button.add_class(ACTIVE);
            } else {
                button.remove_class(ACTIVE);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    FadeIn,
    Entrance,
}

/// One-shot reveal of elements entering the viewport.
#[derive(Debug, Default)]
pub struct RevealController {
    // observed by intersection ratio, `None` once revealed
    sections: Vec<Option<ElementId>>,
    // observed by scroll position, in document order
    scrolled: Vec<(ElementId, Trigger, bool)>,
}

impl RevealController {
    pub fn attach(page: &mut Page) -> Self {
        let sections = page.with_class("fade-in-section").into_iter().map(Some).collect();

        let mut scrolled = Vec::new();
        let mut card_index = 0u64;
        for id in 0..page.len() {
            let Some(element) = page.get_mut(id) else { continue };
            if element.has_class("fade-in") {
                scrolled.push((id, Trigger::FadeIn, false));
            } else if element.has_class("section-title") || element.has_class("card") {
                if element.has_class("card") {
                    element.set_attr(DELAY_ATTR, &(card_index * CARD_STAGGER_MS).to_string());
                    card_index += 1;
                }
                scrolled.push((id, Trigger::Entrance, false));
            }
        }

        RevealController { sections, scrolled }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn scroll_target_count(&self) -> usize {
        self.scrolled.len()
    }

    pub fn pending(&self) -> usize {
        self.sections.iter().flatten().count() + self.scrolled.iter().filter(|(_, _, done)| !done).count()
    }

    /// Reports an intersection ratio for the n-th `.fade-in-section`.
    pub fn intersect(&mut self, page: &mut Page, section: usize, ratio: f64) -> bool {
        let Some(slot) = self.sections.get_mut(section) else {
            return false;
        };
        let Some(id) = *slot else {
            return false;
        };
        if ratio < INTERSECTION_THRESHOLD {
            return false;
        }
        if let Some(element) = page.get_mut(id) {
            element.add_class(VISIBLE);
        }
        *slot = None;
        debug!("Revealed section {}", section);
        true
    }

    /// Reports the viewport height and the current top offset of each scroll target.
    /// Missing offsets leave their targets untouched.
    pub fn scroll(&mut self, page: &mut Page, viewport_height: u32, tops: &[i64]) -> usize {
        let height = i64::from(viewport_height);
        let mut revealed = 0;
        for ((id, trigger, done), &top) in self.scrolled.iter_mut().zip(tops) {
            if *done {
                continue;
            }
            let line = match trigger {
                Trigger::FadeIn => height - FADE_IN_OFFSET,
                Trigger::Entrance => height * ENTRANCE_LINE_PERCENT / 100,
            };
            if top < line {
                if let Some(element) = page.get_mut(*id) {
                    element.add_class(VISIBLE);
                }
                *done = true;
                revealed += 1;
            }
        }
        revealed
    }
}
