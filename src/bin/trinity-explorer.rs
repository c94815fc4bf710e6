#![forbid(unsafe_code)]
//! Headless block list for a TrinityChain explorer
//!
//! Boots the block list page from a snapshot (or the node's `/blocks` page),
//! follows the live feed, scrolls `--pages` times and prints the list on
//! Ctrl-C.

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use trinity_explorer::blocks::elements::{BLOCKS_LIST, BLOCK_NUMBER_ATTR};
use trinity_explorer::blocks::{BlockListPage, PageEvent, PLACEHOLDER_SELECTOR};
use trinity_explorer::config::{load_config, Config};
use trinity_explorer::dom::Document;
use trinity_explorer::feed::{spawn_block_feed, FeedEvent, PhoenixSocket};
use trinity_explorer::pagination::{HttpPageFetcher, PageFetcher};

const SCROLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Boot from a saved block list page instead of fetching one
    #[arg(long)]
    page: Option<PathBuf>,
    /// Number of times to scroll to the bottom of the list
    #[arg(long, default_value_t = 0)]
    pages: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let markup = match &cli.page {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read page {}: {}", path.display(), e))?,
        None => fetch_block_list_page(&config).await?,
    };

    let page = BlockListPage::mount(Document::parse(&markup)?)?;
    println!(
        "{}",
        format!("🔺 Block list mounted with {} blocks", page.state().items.len()).bright_cyan()
    );

    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::from_config(&config)?);
    let (tx, rx) = mpsc::unbounded_channel::<PageEvent>();

    match PhoenixSocket::connect(&config.explorer.socket_url, config.explorer.heartbeat()).await {
        Ok(socket) => {
            spawn_block_feed(socket, config.explorer.blocks_topic.clone(), tx.clone());
        }
        Err(e) => {
            warn!(error = %e, "explorer.socket_unavailable");
            let _ = tx.send(FeedEvent::Disconnected.into());
        }
    }

    let scroll_tx = tx.clone();
    let pages = cli.pages;
    tokio::spawn(async move {
        for _ in 0..pages {
            tokio::time::sleep(SCROLL_INTERVAL).await;
            if scroll_tx.send(PageEvent::ScrollBottom).is_err() {
                return;
            }
        }
    });

    let shutdown_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("explorer.ctrl_c");
            let _ = shutdown_tx.send(PageEvent::Shutdown);
        }
    });

    let page = page.run(fetcher, tx, rx).await;
    print_block_list(&page);

    Ok(())
}

async fn fetch_block_list_page(config: &Config) -> Result<String, Box<dyn std::error::Error>> {
    let url = format!("{}/blocks", config.explorer.base_url.trim_end_matches('/'));
    info!(url = %url, "explorer.fetch_page");
    let client = reqwest::Client::builder()
        .timeout(config.pagination.request_timeout())
        .build()?;
    let body = client.get(&url).send().await?.error_for_status()?.text().await?;
    Ok(body)
}

fn print_block_list(page: &BlockListPage) {
    let state = page.state();
    let doc = page.document();

    println!();
    if state.channel_disconnected {
        println!("{}", "⚠️  Connection lost, list is not live".red().bold());
    }
    if state.paging_error {
        println!("{}", "⚠️  Failed to load older blocks".yellow());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Block")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Status")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Tile")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
        ]);

    let tiles = doc
        .select(BLOCKS_LIST)
        .ok()
        .and_then(|lists| lists.first().copied())
        .map(|list| doc.element_children(list))
        .unwrap_or_default();

    for tile in tiles {
        let number = doc.attr(tile, BLOCK_NUMBER_ATTR).unwrap_or("?");
        let (status, color) = if doc.attr(tile, "data-selector") == Some(PLACEHOLDER_SELECTOR) {
            ("Processing", TableColor::Yellow)
        } else {
            ("Mined", TableColor::Green)
        };

        let mut text = doc.text_content(tile);
        if text.chars().count() > 60 {
            text = format!("{}...", text.chars().take(57).collect::<String>());
        }

        table.add_row(vec![
            Cell::new(format!("#{}", number)).fg(TableColor::White),
            Cell::new(status).fg(color),
            Cell::new(text).fg(TableColor::Grey),
        ]);
    }

    println!("{}", table);
    println!(
        "{}",
        format!(
            "📦 {} blocks, {} still processing",
            state.items.len(),
            state.placeholder_count()
        )
        .bright_blue()
    );
}
