mod app;
mod config;
mod models;
mod utils;
use anyhow::anyhow;
use dotenv::dotenv;
use log::{error, info, warn};
use simplelog::{ColorChoice, Config as LogConfig, TermLogger, TerminalMode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use crate::app::{App, Event, Flow};
use crate::config::{log_level, Config};
use crate::utils::page::Page;
use crate::utils::results::retrieve_results;
use crate::utils::storage::ClientStorage;

// Runs the page: setup, then one event loop until `quit` or end of input.
#[tokio::main]
async fn main() {
    // PORTAL_* settings may come from a local `.env`.
    dotenv().ok();

    // Level from PORTAL_LOG; errors go to stderr.
    if let Err(e) = TermLogger::init(log_level(), LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Logging unavailable: {}", e);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return;
        }
    };

    let page = match config.load_page() {
        Ok(html) => Page::parse(&html),
        Err(e) => {
            error!("{:#}", e);
            return;
        }
    };

    let catalog = match config.load_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("{:#}", e);
            return;
        }
    };

    let storage = match ClientStorage::open(&config.storage) {
        Ok(storage) => storage,
        Err(e) => {
            error!("{:#}", e);
            return;
        }
    };

    let mut app = App::new(catalog, storage, page);

    let (updates_tx, mut updates) = mpsc::unbounded_channel();
    app.start_tasks(&updates_tx);

    // The fetch runs alongside the event loop; searches before it lands see an empty index.
    let (dataset_tx, mut dataset) = oneshot::channel();
    match config.dataset_url() {
        Ok(url) => {
            info!("Loading results from {}", url);
            tokio::spawn(async move {
                let _ = dataset_tx.send(retrieve_results(&url).await);
            });
        }
        Err(e) => {
            let _ = dataset_tx.send(Err(e));
        }
    }
    let mut dataset_pending = true;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match Event::parse(&line) {
                    Ok(Some(event)) => {
                        if app.handle(event) == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{:#}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read events: {}", e);
                    break;
                }
            },
            Some(update) = updates.recv() => app.apply_update(update),
            fetched = &mut dataset, if dataset_pending => {
                dataset_pending = false;
                app.dataset_loaded(fetched.unwrap_or_else(|_| Err(anyhow!("Results loader stopped"))));
            }
        }
    }

    app.stop_tasks();
    info!("Page closed");
}
