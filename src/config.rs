use std::path::PathBuf;
use std::str::FromStr;
use std::{env, fs};
use anyhow::{anyhow, Context, Result};
use simplelog::LevelFilter;
use url::Url;
use crate::utils::i18n::Catalog;

const BUNDLED_PAGE: &str = include_str!("../assets/page.html");
pub const DEFAULT_DATASET: &str = "../upload/clean-GCE-result-2024.csv";
pub const DEFAULT_STORAGE: &str = "storage.json";

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub page: Option<PathBuf>,
    pub base_url: Url,
    pub dataset: String,
    pub storage: PathBuf,
    pub catalog: Option<PathBuf>,
}

// Log level from PORTAL_LOG, read before anything else so startup errors get logged.
pub fn log_level() -> LevelFilter {
    env::var("PORTAL_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(level.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_url = match env::var("PORTAL_BASE_URL") {
            Ok(raw) => Url::parse(&raw).with_context(|| format!("PORTAL_BASE_URL is not a valid URL: {}", raw))?,
            Err(_) => {
                let cwd = env::current_dir().context("Failed to read the current directory")?;
                Url::from_directory_path(&cwd).map_err(|_| anyhow!("Cannot use {} as a base URL", cwd.display()))?
            }
        };

        Ok(Config {
            page: env::var_os("PORTAL_PAGE").map(PathBuf::from),
            base_url,
            dataset: env::var("PORTAL_DATASET").unwrap_or_else(|_| DEFAULT_DATASET.to_string()),
            storage: env::var_os("PORTAL_STORAGE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE)),
            catalog: env::var_os("PORTAL_CATALOG").map(PathBuf::from),
        })
    }

    // The dataset path is relative to the page, like a fetch from the page script.
    pub fn dataset_url(&self) -> Result<Url> {
        self.base_url
            .join(&self.dataset)
            .with_context(|| format!("Cannot resolve {} against {}", self.dataset, self.base_url))
    }

    pub fn load_page(&self) -> Result<String> {
        match &self.page {
            Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read page {}", path.display())),
            None => Ok(BUNDLED_PAGE.to_string()),
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("Failed to read catalog {}", path.display()))?;
                Catalog::from_json(&text).with_context(|| format!("Invalid catalog {}", path.display()))
            }
            None => Catalog::bundled().context("Invalid bundled catalog"),
        }
    }
}
