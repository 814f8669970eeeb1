use log::warn;
use crate::models::{SearchOutcome, StudentRecord};
use crate::utils::i18n::{interpolate, Catalog};

// Markup text used when a key is missing from the catalog, as authored in the page.
const EMPTY_SEARCH: (&str, &str) = ("students.emptySearch", "Please enter a student name or ID to search.");
const NO_RESULTS: (&str, &str) = ("students.noResults", "No results found for \"{term}\". Please check the spelling and try again.");
const SEARCH_RESULTS: (&str, &str) = ("students.searchResults", "Search Results");
const NO_SUBJECTS: (&str, &str) = ("students.noSubjects", "No subject details available.");
const LOAD_ERROR: (&str, &str) = ("students.loadError", "Error loading results data. Please try again later.");

// Builds the localized markup for the results container.
pub fn render_outcome(outcome: &SearchOutcome, catalog: &Catalog, language: &str) -> String {
    match outcome {
        SearchOutcome::EmptyQuery => notice(EMPTY_SEARCH, &localize(catalog, language, EMPTY_SEARCH)),
        SearchOutcome::NoMatch { term } => {
            let text = interpolate(&localize(catalog, language, NO_RESULTS), &[("term", term)]);
            notice(NO_RESULTS, &text)
        }
        SearchOutcome::Matches { records, .. } => {
            let mut html = format!(
                "<h3 data-i18n=\"{}\">{}</h3>",
                SEARCH_RESULTS.0,
                escape_html(&localize(catalog, language, SEARCH_RESULTS))
            );
            for record in records {
                html.push_str(&render_record(record, catalog, language));
            }
            html
        }
    }
}

pub fn render_load_error(catalog: &Catalog, language: &str) -> String {
    notice(LOAD_ERROR, &localize(catalog, language, LOAD_ERROR))
}

fn render_record(record: &StudentRecord, catalog: &Catalog, language: &str) -> String {
    let mut html = format!(
        "<div class=\"result-item\"><div class=\"result-name\">{}</div>",
        escape_html(&record.name)
    );

    if record.subjects.is_empty() {
        html.push_str(&format!(
            "<p data-i18n=\"{}\">{}</p>",
            NO_SUBJECTS.0,
            escape_html(&localize(catalog, language, NO_SUBJECTS))
        ));
    } else {
        html.push_str("<div class=\"result-details\">");
        for subject in &record.subjects {
            html.push_str(&format!(
                "<div class=\"result-subject\"><span class=\"result-subject-name\">{}</span><span class=\"result-grade\">{}</span></div>",
                escape_html(&subject.code),
                escape_html(&subject.grade)
            ));
        }
        html.push_str("</div>");
    }

    html.push_str("</div>");
    html
}

fn notice((key, _): (&str, &str), text: &str) -> String {
    format!("<div class=\"no-result\"><p data-i18n=\"{}\">{}</p></div>", key, escape_html(text))
}

fn localize(catalog: &Catalog, language: &str, (key, fallback): (&str, &str)) -> String {
    match catalog.resolve(language, key) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!("{}", e);
            fallback.to_string()
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
