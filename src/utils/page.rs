use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::sync::LazyLock;
use scraper::{ElementRef, Html, Selector};

pub type ElementId = usize;

pub const I18N_ATTR: &str = "data-i18n";
pub const LANG_ATTR: &str = "data-lang";
pub const TARGET_ATTR: &str = "data-target";
pub const PLACEHOLDER_ATTR: &str = "data-i18n-placeholder";

// Everything the scripts touch; other markup is presentational and never loaded.
static TRACKED: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "[data-i18n], .language-toggle .lang-btn, #navToggle, #mainNav, .dropdown, .hero-slide, \
         .stat-value, .fade-in-section, .fade-in, .section-title, .card, \
         #examType, #studentName, #searchButton, #searchResults",
    )
    .unwrap()
});
static SELECTED_OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option[selected]").unwrap());
static FIRST_OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

const KEPT_ATTRS: [&str; 7] = [I18N_ATTR, LANG_ATTR, TARGET_ATTR, PLACEHOLDER_ATTR, "type", "value", "placeholder"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: BTreeSet<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub inner_html: Option<String>,
}

impl Element {
    fn from_ref(element: ElementRef<'_>) -> Self {
        let value = element.value();
        let mut attrs: BTreeMap<String, String> = KEPT_ATTRS
            .iter()
            .filter_map(|name| value.attr(name).map(|v| (name.to_string(), v.to_string())))
            .collect();

        if value.name() == "select" {
            let option = element.select(&SELECTED_OPTION).next().or_else(|| element.select(&FIRST_OPTION).next());
            if let Some(selected) = option.and_then(|o| o.value().attr("value")) {
                attrs.insert("value".to_string(), selected.to_string());
            }
        }

        Element {
            tag: value.name().to_string(),
            id: value.id().map(str::to_string),
            classes: value.classes().map(str::to_string).collect(),
            attrs,
            text: element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "),
            inner_html: None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attrs.insert(name.to_string(), value.to_string());
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn add_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.remove(class);
    }

    // Returns whether the class is present afterwards.
    pub fn toggle_class(&mut self, class: &str) -> bool {
        if self.classes.remove(class) {
            false
        } else {
            self.classes.insert(class.to_string());
            true
        }
    }

    /// Fields marked with `data-i18n-placeholder` (or `type="placeholder"`) show their
    /// translation as a placeholder instead of text.
    pub fn takes_placeholder(&self) -> bool {
        self.attrs.contains_key(PLACEHOLDER_ATTR) || self.attr("type") == Some("placeholder")
    }
}

/// The page's scriptable elements in document order.
#[derive(Debug, Clone, Default)]
pub struct Page {
    elements: Vec<Element>,
}

impl Page {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let elements = document.select(&TRACKED).map(Element::from_ref).collect();
        Page { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    pub fn find_by_id(&self, html_id: &str) -> Option<ElementId> {
        self.elements.iter().position(|e| e.id.as_deref() == Some(html_id))
    }

    pub fn with_class(&self, class: &str) -> Vec<ElementId> {
        self.ids_where(|e| e.has_class(class))
    }

    pub fn with_attr(&self, name: &str) -> Vec<ElementId> {
        self.ids_where(|e| e.attrs.contains_key(name))
    }

    pub fn language_buttons(&self) -> Vec<ElementId> {
        self.ids_where(|e| e.has_class("lang-btn") && e.attrs.contains_key(LANG_ATTR))
    }

    pub fn translation_keys(&self) -> Vec<&str> {
        self.elements.iter().filter_map(|e| e.attr(I18N_ATTR)).collect()
    }

    fn ids_where(&self, predicate: impl Fn(&Element) -> bool) -> Vec<ElementId> {
        self.elements.iter().enumerate().filter(|(_, e)| predicate(e)).map(|(id, _)| id).collect()
    }

    // One line per element, for the `show` console command.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for (id, element) in self.elements.iter().enumerate() {
            let _ = write!(out, "#{:<3} <{}", id, element.tag);
            if let Some(html_id) = &element.id {
                let _ = write!(out, " id={}", html_id);
            }
            if !element.classes.is_empty() {
                let classes: Vec<&str> = element.classes.iter().map(String::as_str).collect();
                let _ = write!(out, " class=\"{}\"", classes.join(" "));
            }
            for (name, value) in &element.attrs {
                let _ = write!(out, " {}=\"{}\"", name, value);
            }
            let _ = write!(out, ">");
            match &element.inner_html {
                Some(html) => {
                    let _ = write!(out, " {}", html);
                }
                None if !element.text.is_empty() => {
                    let _ = write!(out, " {:?}", element.text);
                }
                None => {}
            }
            out.push('\n');
        }
        out
    }
}
