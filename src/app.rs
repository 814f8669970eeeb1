use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use crate::models::{DatasetState, ExamType, SearchOutcome};
use crate::utils::i18n::{apply_translations, stored_language, Catalog, LANGUAGE_STORAGE_KEY};
use crate::utils::page::{ElementId, Page};
use crate::utils::render::{render_load_error, render_outcome};
use crate::utils::results::parse_results;
use crate::utils::search::{run_search, ResultsIndex};
use crate::utils::storage::ClientStorage;
use crate::utils::tasks::{CounterController, SliderController, UiUpdate};
use crate::utils::ui::{update_active_language_button, MenuController, RevealController, Viewport};

/// User and browser events, one per console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Language(String),
    NavToggle,
    ClickOutside,
    Dropdown(usize),
    Resize { width: u32, touch: bool },
    Type(String),
    Exam(String),
    Search,
    Enter,
    Intersect { section: usize, ratio: f64 },
    Scroll { height: u32, tops: Vec<i64> },
    Show,
    Quit,
}

impl Event {
    // Blank lines parse to None.
    pub fn parse(line: &str) -> Result<Option<Event>> {
        let line = line.trim();
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();

        let event = match command {
            "" => return Ok(None),
            "lang" => Event::Language(args.next().context("usage: lang <code>")?.to_string()),
            "nav" => Event::NavToggle,
            "outside" => Event::ClickOutside,
            "dropdown" => Event::Dropdown(args.next().context("usage: dropdown <n>")?.parse().context("dropdown index")?),
            "resize" => {
                let width = args.next().context("usage: resize <width> [touch]")?.parse().context("viewport width")?;
                Event::Resize { width, touch: args.next() == Some("touch") }
            }
            // typed text keeps inner spaces
            "type" => Event::Type(rest.to_string()),
            "exam" => Event::Exam(args.next().context("usage: exam <code>")?.to_string()),
            "search" => Event::Search,
            "enter" => Event::Enter,
            "intersect" => {
                let section = args.next().context("usage: intersect <n> <ratio>")?.parse().context("section index")?;
                let ratio = args.next().context("usage: intersect <n> <ratio>")?.parse().context("intersection ratio")?;
                Event::Intersect { section, ratio }
            }
            "scroll" => {
                let height = args.next().context("usage: scroll <height> <top>...")?.parse().context("viewport height")?;
                let tops = args.map(|top| top.parse::<i64>().context("element top")).collect::<Result<Vec<i64>>>()?;
                Event::Scroll { height, tops }
            }
            "show" => Event::Show,
            "quit" | "exit" => Event::Quit,
            other => bail!("Unknown command: {}", other),
        };
        Ok(Some(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Default)]
struct SearchWidgets {
    exam_type: Option<ElementId>,
    name_input: Option<ElementId>,
    results: Option<ElementId>,
}

/// Everything the page scripts share, owned in one place.
pub struct App {
    catalog: Catalog,
    storage: ClientStorage,
    language: String,
    page: Page,
    viewport: Viewport,
    index: ResultsIndex,
    dataset: DatasetState,
    last_outcome: Option<SearchOutcome>,
    widgets: SearchWidgets,
    menu: MenuController,
    reveal: RevealController,
    slider: SliderController,
    counters: CounterController,
}

impl App {
    /// Page load: restores the stored language and wires the controllers.
    pub fn new(catalog: Catalog, storage: ClientStorage, mut page: Page) -> Self {
        for problem in catalog.audit(page.translation_keys()) {
            warn!("{}", problem);
        }

        let language = stored_language(&storage, &catalog);
        let applied = apply_translations(&mut page, &catalog, &language);
        update_active_language_button(&mut page, &language);
        info!("Page loaded in {} ({} elements translated)", language, applied);

        let widgets = SearchWidgets {
            exam_type: page.find_by_id("examType"),
            name_input: page.find_by_id("studentName"),
            results: page.find_by_id("searchResults"),
        };
        let menu = MenuController::attach(&page);
        let reveal = RevealController::attach(&mut page);
        let slider = SliderController::attach(&mut page);
        let counters = CounterController::attach(&page);

        App {
            catalog,
            storage,
            language,
            page,
            viewport: Viewport::default(),
            index: ResultsIndex::default(),
            dataset: DatasetState::Pending,
            last_outcome: None,
            widgets,
            menu,
            reveal,
            slider,
            counters,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn dataset(&self) -> &DatasetState {
        &self.dataset
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn start_tasks(&mut self, updates: &UnboundedSender<UiUpdate>) {
        self.slider.start(updates);
        self.counters.start(updates);
    }

    pub fn stop_tasks(&mut self) {
        self.slider.stop();
        self.counters.stop();
    }

    pub fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Language(language) => {
                self.change_language(&language);
            }
            Event::NavToggle => self.menu.toggle(&mut self.page, &self.viewport),
            Event::ClickOutside => self.menu.click_outside(&mut self.page, &self.viewport),
            Event::Dropdown(index) => {
                self.menu.click_dropdown(&mut self.page, &self.viewport, index);
            }
            Event::Resize { width, touch } => {
                self.viewport = Viewport { width, touch, ..self.viewport };
                self.menu.resize(&mut self.page, &self.viewport);
            }
            Event::Type(text) => self.set_field(self.widgets.name_input, &text),
            Event::Exam(code) => match code.parse::<ExamType>() {
                Ok(exam_type) => self.set_field(self.widgets.exam_type, exam_type.code()),
                Err(e) => warn!("{}", e),
            },
            Event::Search | Event::Enter => {
                self.search();
                if let Some(html) = self.results_html() {
                    debug!("Results container: {}", html);
                }
            }
            Event::Intersect { section, ratio } => {
                self.reveal.intersect(&mut self.page, section, ratio);
            }
            Event::Scroll { height, tops } => {
                self.viewport.height = height;
                self.reveal.scroll(&mut self.page, height, &tops);
            }
            Event::Show => print!("{}\n{}", self.status(), self.page.snapshot()),
            Event::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Switches language, persists it, and re-translates the page. Unsupported codes are refused.
    pub fn change_language(&mut self, language: &str) -> bool {
        if !self.catalog.supports(language) {
            warn!("Unsupported language: {}", language);
            return false;
        }

        if let Err(e) = self.storage.set(LANGUAGE_STORAGE_KEY, language) {
            warn!("Language preference not saved: {:#}", e);
        }
        self.language = language.to_string();
        apply_translations(&mut self.page, &self.catalog, &self.language);
        update_active_language_button(&mut self.page, &self.language);
        self.refresh_results();
        info!("Language changed to {}", language);
        true
    }

    pub fn apply_update(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::ShowSlide { index } => self.slider.show(&mut self.page, index),
            UiUpdate::CounterText { element, text } => {
                if let Some(counter) = self.page.get_mut(element) {
                    counter.text = text;
                }
            }
        }
    }

    // Called once with the outcome of the dataset fetch.
    pub fn dataset_loaded(&mut self, fetched: Result<String>) {
        match fetched {
            Ok(text) => {
                let records = parse_results(&text);
                info!("Results data loaded successfully ({} records)", records.len());
                self.dataset = DatasetState::Ready(records.len());
                self.index = ResultsIndex::new(records);
                if self.index.is_empty() {
                    warn!("Results data contains no student records");
                }
            }
            Err(e) => {
                error!("Error loading results data: {:#}", e);
                self.dataset = DatasetState::Failed(format!("{:#}", e));
                self.last_outcome = None;
                self.refresh_results();
            }
        }
    }

    /// Runs a search from the current field values. Before the data arrives the index is empty.
    /// Blank input is reported as such even after a failed fetch; any other search then
    /// leaves the load error in place and returns `None`.
    pub fn search(&mut self) -> Option<&SearchOutcome> {
        let exam_type = self
            .field(self.widgets.exam_type)
            .and_then(|code| code.parse().ok())
            .unwrap_or_default();
        let fragment = self.field(self.widgets.name_input).unwrap_or_default().to_string();

        let outcome = run_search(&self.index, exam_type, &fragment);
        if matches!(self.dataset, DatasetState::Failed(_)) && outcome != SearchOutcome::EmptyQuery {
            self.last_outcome = None;
            self.refresh_results();
            return None;
        }
        match &outcome {
            SearchOutcome::EmptyQuery => info!("Empty search"),
            SearchOutcome::NoMatch { term } => info!("No results for {:?}", term),
            SearchOutcome::Matches { term, records } => info!("{} results for {:?}", records.len(), term),
        }
        self.last_outcome = Some(outcome);
        self.refresh_results();
        self.last_outcome.as_ref()
    }

    pub fn status(&self) -> String {
        let viewport = self.viewport();
        let dataset = match self.dataset() {
            DatasetState::Pending => "loading".to_string(),
            DatasetState::Ready(count) => format!("{} records", count),
            DatasetState::Failed(reason) => format!("failed ({})", reason),
        };
        format!(
            "language={} viewport={}x{}{} dataset={} index={} slide={}{} counters={}{} reveal={} pending of {} sections + {} targets",
            self.language,
            viewport.width,
            viewport.height,
            if viewport.touch { " touch" } else { "" },
            dataset,
            self.index.len(),
            self.slider.current(),
            if self.slider.is_running() { " (rotating)" } else { "" },
            self.counters.len(),
            if self.counters.is_running() { " (counting)" } else { "" },
            self.reveal.pending(),
            self.reveal.section_count(),
            self.reveal.scroll_target_count(),
        )
    }

    pub fn results_html(&self) -> Option<&str> {
        self.widgets
            .results
            .and_then(|id| self.page.get(id))
            .and_then(|e| e.inner_html.as_deref())
    }

    // Re-renders the results container for the current state and language.
    fn refresh_results(&mut self) {
        let html = match (&self.dataset, &self.last_outcome) {
            (DatasetState::Failed(_), outcome) if outcome != &Some(SearchOutcome::EmptyQuery) => {
                Some(render_load_error(&self.catalog, &self.language))
            }
            (_, outcome) => outcome.as_ref().map(|outcome| render_outcome(outcome, &self.catalog, &self.language)),
        };

        if let (Some(html), Some(container)) = (html, self.widgets.results.and_then(|id| self.page.get_mut(id))) {
            container.inner_html = Some(html);
        }
    }

    fn field(&self, id: Option<ElementId>) -> Option<&str> {
        id.and_then(|id| self.page.get(id)).and_then(|e| e.attr("value"))
    }

    fn set_field(&mut self, id: Option<ElementId>, value: &str) {
        match id.and_then(|id| self.page.get_mut(id)) {
            Some(element) => element.set_attr("value", value),
            None => warn!("Field is not on this page"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use anyhow::anyhow;
    use tokio::sync::mpsc::unbounded_channel;
    use super::*;
    use crate::utils::page::I18N_ATTR;
    use crate::utils::ui::{ACTIVE, VISIBLE};

    const PAGE: &str = r##"
        <header>
          <div class="language-toggle">
            <button class="lang-btn active" data-lang="en">EN</button>
            <button class="lang-btn" data-lang="fr">FR</button>
          </div>
          <button id="navToggle">Menu</button>
          <nav id="mainNav"><a data-i18n="nav.home">Home</a><a data-i18n="nav.bogus">Bogus</a></nav>
        </header>
        <div class="hero-slide active"></div><div class="hero-slide"></div>
        <section class="fade-in-section"><span class="stat-value" data-target="10">0+</span></section>
        <select id="examType"><option value="gce-o">O</option><option value="gce-a" selected>A</option></select>
        <input id="studentName" type="text" data-i18n="students.namePlaceholder" data-i18n-placeholder>
        <button id="searchButton" data-i18n="students.searchButton">Search</button>
        <div id="searchResults"></div>
    "##;

    const DATA: &str = "(1) JOHN DOE\nMATH 85\nENG 90\nPassed in 2 subjects\n(2) JANE ROE\n(3) DIANA ONANA\nFREN 4\n";

    fn app(storage: &Path) -> App {
        let catalog = Catalog::bundled().unwrap();
        let storage = ClientStorage::open(storage).unwrap();
        App::new(catalog, storage, Page::parse(PAGE))
    }

    fn tagged_texts(app: &App) -> Vec<(String, String)> {
        app.page()
            .with_attr(I18N_ATTR)
            .into_iter()
            .map(|id| {
                let e = app.page().get(id).unwrap();
                (e.text.clone(), e.attr("placeholder").unwrap_or_default().to_string())
            })
            .collect()
    }

    #[test]
    fn parses_console_lines() {
        assert_eq!(Event::parse("  ").unwrap(), None);
        assert_eq!(Event::parse("lang fr").unwrap(), Some(Event::Language("fr".to_string())));
        assert_eq!(Event::parse("type  Ana  Smith ").unwrap(), Some(Event::Type("Ana  Smith".to_string())));
        assert_eq!(Event::parse("resize 375 touch").unwrap(), Some(Event::Resize { width: 375, touch: true }));
        assert_eq!(Event::parse("resize 1024").unwrap(), Some(Event::Resize { width: 1024, touch: false }));
        assert_eq!(
            Event::parse("scroll 800 120 -40").unwrap(),
            Some(Event::Scroll { height: 800, tops: vec![120, -40] })
        );
        assert_eq!(Event::parse("intersect 0 0.5").unwrap(), Some(Event::Intersect { section: 0, ratio: 0.5 }));
        assert!(Event::parse("dropdown x").is_err());
        assert!(Event::parse("lang").is_err());
        assert!(Event::parse("dance").is_err());
    }

    #[test]
    fn language_toggle_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage.json");

        let mut first = app(&storage);
        assert_eq!(first.language(), "en");
        let english = tagged_texts(&first);

        assert!(first.change_language("fr"));
        let french = tagged_texts(&first);
        assert_ne!(english[0], french[0]);
        // the key missing from the catalog stays as authored
        assert_eq!(french[1].0, "Bogus");
        let buttons = first.page().language_buttons();
        assert!(first.page().get(buttons[1]).unwrap().has_class(ACTIVE));
        assert!(!first.page().get(buttons[0]).unwrap().has_class(ACTIVE));

        let reloaded = app(&storage);
        assert_eq!(reloaded.language(), "fr");
        assert_eq!(tagged_texts(&reloaded), french);
    }

    #[test]
    fn unsupported_language_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage.json");
        let mut app = app(&storage);
        let before = tagged_texts(&app);

        assert!(!app.change_language("xx"));
        assert_eq!(app.language(), "en");
        assert_eq!(tagged_texts(&app), before);
        assert!(ClientStorage::open(&storage).unwrap().get(LANGUAGE_STORAGE_KEY).is_none());
    }

    #[test]
    fn search_states() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir.path().join("storage.json"));

        // before the data arrives the index is empty
        app.handle(Event::Type("john".to_string()));
        assert_eq!(app.search(), Some(&SearchOutcome::NoMatch { term: "john".to_string() }));

        app.dataset_loaded(Ok(DATA.to_string()));
        assert_eq!(app.dataset(), &DatasetState::Ready(3));

        app.handle(Event::Type("   ".to_string()));
        app.handle(Event::Enter);
        assert!(app.results_html().unwrap().contains("students.emptySearch"));

        app.handle(Event::Type("xyz-no-such-name".to_string()));
        app.handle(Event::Search);
        assert!(app.results_html().unwrap().contains("xyz-no-such-name"));

        app.handle(Event::Type("ANA".to_string()));
        let Some(SearchOutcome::Matches { records, .. }) = app.search() else {
            panic!("expected matches");
        };
        assert_eq!(records.len(), 1);
        assert!(app.results_html().unwrap().contains("DIANA ONANA"));

        app.handle(Event::Exam("gce-o".to_string()));
        assert!(matches!(app.search(), Some(SearchOutcome::NoMatch { .. })));
    }

    #[test]
    fn results_follow_language_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir.path().join("storage.json"));
        app.dataset_loaded(Ok(DATA.to_string()));
        app.handle(Event::Type("jane".to_string()));
        app.handle(Event::Search);
        let english = app.results_html().unwrap().to_string();

        app.handle(Event::Language("fr".to_string()));
        let french = app.results_html().unwrap().to_string();
        assert_ne!(english, french);
        assert!(french.contains("JANE ROE"));
    }

    #[test]
    fn failed_fetch_shows_a_persistent_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir.path().join("storage.json"));
        app.dataset_loaded(Err(anyhow!("Results request failed with status 404 Not Found")));
        assert!(matches!(app.dataset(), DatasetState::Failed(_)));
        let error_html = app.results_html().unwrap().to_string();
        assert!(error_html.contains("students.loadError"));

        app.handle(Event::Type("john".to_string()));
        assert_eq!(app.search(), None);
        assert_eq!(app.results_html().unwrap(), error_html);

        app.handle(Event::Type("  ".to_string()));
        assert_eq!(app.search(), Some(&SearchOutcome::EmptyQuery));
        assert!(app.results_html().unwrap().contains("students.emptySearch"));

        app.handle(Event::Type("john".to_string()));
        assert_eq!(app.search(), None);
        assert_eq!(app.results_html().unwrap(), error_html);
    }

    #[test]
    fn menu_reveal_and_resize_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir.path().join("storage.json"));
        let nav = app.page().find_by_id("mainNav").unwrap();

        app.handle(Event::Resize { width: 375, touch: false });
        assert!(app.viewport().is_mobile_or_touch());
        app.handle(Event::NavToggle);
        assert!(app.page().get(nav).unwrap().has_class(ACTIVE));
        app.handle(Event::Resize { width: 1280, touch: false });
        assert!(!app.page().get(nav).unwrap().has_class(ACTIVE));

        app.handle(Event::Intersect { section: 0, ratio: 0.9 });
        let section = app.page().with_class("fade-in-section")[0];
        assert!(app.page().get(section).unwrap().has_class(VISIBLE));

        assert!(app.status().starts_with("language=en viewport=1280x800 dataset=loading"));
        assert_eq!(app.handle(Event::Quit), Flow::Quit);
    }

    #[tokio::test(start_paused = true)]
    async fn task_updates_land_on_the_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir.path().join("storage.json"));
        let (tx, mut rx) = unbounded_channel();
        app.start_tasks(&tx);

        let counter = app.page().with_class("stat-value")[0];
        let slides = app.page().with_class("hero-slide");
        let mut slide_seen = false;
        while !slide_seen {
            let update = rx.recv().await.unwrap();
            slide_seen = matches!(update, UiUpdate::ShowSlide { .. });
            app.apply_update(update);
        }

        assert_eq!(app.page().get(counter).unwrap().text, "10+");
        assert!(app.page().get(slides[1]).unwrap().has_class(ACTIVE));
        assert!(!app.page().get(slides[0]).unwrap().has_class(ACTIVE));
        app.stop_tasks();
    }
}
