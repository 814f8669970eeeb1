use std::collections::{BTreeMap, HashMap};
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;
use crate::utils::page::{Page, I18N_ATTR};
use crate::utils::storage::ClientStorage;

pub const DEFAULT_LANGUAGE: &str = "en";
// Storage key the language preference is persisted under.
pub const LANGUAGE_STORAGE_KEY: &str = "userLanguage";

const BUNDLED_CATALOG: &str = include_str!("../../assets/translations.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog root must be an object keyed by language code")]
    NotAnObject,

    #[error("Language `{0}` must map to an object of translations")]
    LanguageNotObject(String),

    #[error("Catalog does not define the default language `{0}`")]
    MissingDefault(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("Unsupported language: {0}")]
    UnknownLanguage(String),

    #[error("Translation key not found: {key} for language {language}")]
    MissingKey { key: String, language: String },

    #[error("Malformed translation key: `{0}`")]
    MalformedKey(String),
}

/// Translations flattened to `dotted.key -> text`, one table per language.
#[derive(Debug, Clone)]
pub struct Catalog {
    languages: BTreeMap<String, HashMap<String, String>>,
}

impl Catalog {
    pub fn bundled() -> Result<Self, CatalogError> {
        Catalog::from_json(BUNDLED_CATALOG)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(root) = root else {
            return Err(CatalogError::NotAnObject);
        };

        let mut languages = BTreeMap::new();
        for (language, tree) in root {
            if !tree.is_object() {
                return Err(CatalogError::LanguageNotObject(language));
            }
            let mut table = HashMap::new();
            flatten(&language, "", &tree, &mut table);
            debug!("Loaded {} translations for {}", table.len(), language);
            languages.insert(language, table);
        }

        if !languages.contains_key(DEFAULT_LANGUAGE) {
            return Err(CatalogError::MissingDefault(DEFAULT_LANGUAGE.to_string()));
        }

        Ok(Catalog { languages })
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    pub fn supports(&self, language: &str) -> bool {
        self.languages.contains_key(language)
    }

    pub fn resolve(&self, language: &str, key: &str) -> Result<&str, TranslationError> {
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(TranslationError::MalformedKey(key.to_string()));
        }
        let table = self
            .languages
            .get(language)
            .ok_or_else(|| TranslationError::UnknownLanguage(language.to_string()))?;
        table.get(key).map(String::as_str).ok_or_else(|| TranslationError::MissingKey {
            key: key.to_string(),
            language: language.to_string(),
        })
    }

    /// Checks every key against every language and returns the misses.
    pub fn audit<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<TranslationError> {
        let keys: Vec<&str> = keys.into_iter().collect();
        let mut problems = Vec::new();
        for language in self.languages() {
            for key in &keys {
                if let Err(e) = self.resolve(language, key) {
                    if !problems.contains(&e) {
                        problems.push(e);
                    }
                }
            }
        }
        problems
    }
}

// Non-string and empty leaves are left out, so their keys resolve as misses.
fn flatten(language: &str, prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (segment, child) in map {
                let key = if prefix.is_empty() { segment.clone() } else { format!("{}.{}", prefix, segment) };
                flatten(language, &key, child, out);
            }
        }
        Value::String(text) if text.is_empty() => {
            warn!("Translation `{}` for language {} is empty, skipping", prefix, language);
        }
        Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        _ => warn!("Translation `{}` for language {} is not a string, skipping", prefix, language),
    }
}

// Replaces `{name}` placeholders with the given values.
pub fn interpolate(template: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(template.to_string(), |text, (name, value)| text.replace(&format!("{{{}}}", name), value))
}

// Applies the language to every tagged element. A miss leaves that element alone.
pub fn apply_translations(page: &mut Page, catalog: &Catalog, language: &str) -> usize {
    let mut applied = 0;
    for id in page.with_attr(I18N_ATTR) {
        let Some(element) = page.get_mut(id) else { continue };
        let Some(key) = element.attr(I18N_ATTR).map(str::to_owned) else { continue };

        match catalog.resolve(language, &key) {
            Ok(text) => {
                if element.takes_placeholder() {
                    element.set_attr("placeholder", text);
                } else {
                    element.text = text.to_string();
                }
                applied += 1;
            }
            Err(e) => warn!("{}", e),
        }
    }
    applied
}

// Reads the persisted language, falling back to the default when absent or unsupported.
pub fn stored_language(storage: &ClientStorage, catalog: &Catalog) -> String {
    match storage.get(LANGUAGE_STORAGE_KEY) {
        Some(language) if catalog.supports(language) => language.to_string(),
        Some(language) => {
            warn!("Ignoring stored language {}, not in the catalog", language);
            DEFAULT_LANGUAGE.to_string()
        }
        None => DEFAULT_LANGUAGE.to_string(),
    }
}
