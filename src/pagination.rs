//! Scroll-driven pagination of the block list
//!
//! At most one page request is in flight: the page checks
//! [`next_page_request`] before dispatching `LoadingNextPage`, and the flag
//! stays set until the fetch reports back. A failed fetch sets the terminal
//! paging error and no further requests are issued.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::blocks::{BlockListState, BlockMessage};
use crate::config::Config;
use crate::error::{ExplorerError, Result};

/// Body of a JSON page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    #[serde(default)]
    pub next_page_url: Option<String>,
    #[serde(default, alias = "blocks")]
    pub items: Vec<BlockMessage>,
}

/// Result of one page fetch, as delivered back to the page.
#[derive(Debug)]
pub enum PageOutcome {
    Loaded(PageResponse),
    Failed(ExplorerError),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageResponse>;
}

/// URL to fetch next, if a request may be issued now.
pub fn next_page_request(state: &BlockListState) -> Option<String> {
    if state.loading_next_page || state.paging_error {
        return None;
    }
    state.next_page_url.clone()
}

/// Fetch `url` in the background and report the outcome on `events`.
///
/// There is no cancellation; if the page is gone by the time the response
/// arrives the outcome is dropped.
pub fn spawn_fetch<E>(
    fetcher: Arc<dyn PageFetcher>,
    url: String,
    events: UnboundedSender<E>,
) -> JoinHandle<()>
where
    E: From<PageOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = match fetcher.fetch(&url).await {
            Ok(page) => {
                info!(url = %url, items = page.items.len(), "pagination.loaded");
                PageOutcome::Loaded(page)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "pagination.failed");
                PageOutcome::Failed(e)
            }
        };
        let _ = events.send(outcome.into());
    })
}

/// Fetches pages over HTTP. Relative page URLs resolve against `base_url`.
pub struct HttpPageFetcher {
    client: Client,
    base_url: Url,
}

impl HttpPageFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.explorer.base_url,
            config.pagination.request_timeout(),
        )
    }

    pub fn resolve(&self, url: &str) -> Result<Url> {
        Ok(self.base_url.join(url)?)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<PageResponse> {
        let url = self.resolve(url)?;
        debug!(url = %url, "pagination.fetch");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<PageResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_gating() {
        let mut state = BlockListState {
            next_page_url: Some("/blocks?block_number=9&type=JSON".to_string()),
            ..Default::default()
        };
        assert_eq!(
            next_page_request(&state).as_deref(),
            Some("/blocks?block_number=9&type=JSON")
        );

        state.loading_next_page = true;
        assert_eq!(next_page_request(&state), None);

        state.loading_next_page = false;
        state.paging_error = true;
        assert_eq!(next_page_request(&state), None);

        state.paging_error = false;
        state.next_page_url = None;
        assert_eq!(next_page_request(&state), None);
    }

    #[test]
    fn test_page_response_accepts_blocks_alias() {
        let page: PageResponse = serde_json::from_str(
            r#"{"next_page_url": null, "blocks": [{"block_number": 4, "block_html": "<div></div>"}]}"#,
        )
        .unwrap();
        assert_eq!(page.next_page_url, None);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].block_number, 4);
    }

    #[test]
    fn test_relative_urls_resolve_against_base() {
        let fetcher = HttpPageFetcher::new("http://explorer.local:4000", Duration::from_secs(1)).unwrap();
        assert_eq!(
            fetcher
                .resolve("/blocks?block_number=9&type=JSON")
                .unwrap()
                .as_str(),
            "http://explorer.local:4000/blocks?block_number=9&type=JSON"
        );
        assert_eq!(
            fetcher.resolve("https://other.host/x").unwrap().as_str(),
            "https://other.host/x"
        );
    }

    struct Failing;

    #[async_trait]
    impl PageFetcher for Failing {
        async fn fetch(&self, _url: &str) -> Result<PageResponse> {
            Err(ExplorerError::NetworkError("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_spawn_fetch_reports_failure() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PageOutcome>();
        spawn_fetch(Arc::new(Failing), "/blocks".to_string(), tx);

        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("fetch timed out");
        assert!(matches!(
            outcome,
            Some(PageOutcome::Failed(ExplorerError::NetworkError(_)))
        ));
    }
}
