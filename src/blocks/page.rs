//! Block list event loop
//!
//! One task owns the document and the store. Feed pushes, page responses and
//! scroll notifications all arrive on a single channel, so actions are
//! applied strictly in arrival order and renders never interleave.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use super::elements::{block_list_binder, BLOCK_LIST_PAGE};
use super::reducer::{reduce, Action};
use super::state::{BlockListPatch, BlockListState, Item};
use crate::binder::ElementBinder;
use crate::dom::Document;
use crate::error::{ExplorerError, Result};
use crate::feed::FeedEvent;
use crate::pagination::{next_page_request, spawn_fetch, PageFetcher, PageOutcome};
use crate::store::Store;

#[derive(Debug)]
pub enum PageEvent {
    Feed(FeedEvent),
    Paging(PageOutcome),
    /// The reader reached the bottom of the list.
    ScrollBottom,
    Shutdown,
}

impl From<FeedEvent> for PageEvent {
    fn from(event: FeedEvent) -> Self {
        PageEvent::Feed(event)
    }
}

impl From<PageOutcome> for PageEvent {
    fn from(outcome: PageOutcome) -> Self {
        PageEvent::Paging(outcome)
    }
}

pub struct BlockListPage {
    store: Store<BlockListState, Action>,
    binder: ElementBinder<BlockListState, BlockListPatch>,
    doc: Document,
}

impl BlockListPage {
    /// Bind to `doc` and boot from the server-rendered tiles.
    ///
    /// Fails with [`ExplorerError::PageNotFound`] when `doc` is some other
    /// page; nothing is bound in that case.
    pub fn mount(mut doc: Document) -> Result<Self> {
        if doc.select(BLOCK_LIST_PAGE)?.is_empty() {
            return Err(ExplorerError::PageNotFound);
        }

        let mut store = Store::new(reduce, BlockListState::default());
        let mut binder = block_list_binder()?;
        binder.connect(&mut store, &mut doc, Action::Init);

        let state = store.state();
        info!(
            items = state.items.len(),
            newest = state.newest().map(|i| i.sequence_number),
            has_next_page = state.next_page_url.is_some(),
            "page.mounted"
        );

        Ok(Self { store, binder, doc })
    }

    pub fn state(&self) -> &BlockListState {
        self.store.state()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Apply `action` and render the difference.
    pub fn dispatch(&mut self, action: Action) {
        let previous = self.store.dispatch(action);
        self.binder
            .render(&mut self.doc, self.store.state(), &previous);
    }

    /// Handle one event. Returns `false` once the loop should stop.
    pub fn handle(
        &mut self,
        event: PageEvent,
        fetcher: &Arc<dyn PageFetcher>,
        events: &UnboundedSender<PageEvent>,
    ) -> bool {
        self.handle_event(event, fetcher, Some(events))
    }

    /// Without `events` nothing can report a fetch back, so scrolling is
    /// ignored.
    fn handle_event(
        &mut self,
        event: PageEvent,
        fetcher: &Arc<dyn PageFetcher>,
        events: Option<&UnboundedSender<PageEvent>>,
    ) -> bool {
        match event {
            PageEvent::Feed(FeedEvent::NewBlock(item)) => self.dispatch(Action::NewItem(item)),
            PageEvent::Feed(FeedEvent::Disconnected) => self.dispatch(Action::Disconnected),
            PageEvent::ScrollBottom => match (next_page_request(self.state()), events) {
                (Some(url), Some(events)) => {
                    self.dispatch(Action::LoadingNextPage);
                    spawn_fetch(fetcher.clone(), url, events.clone());
                }
                (Some(_), None) => debug!("page.scroll_after_close"),
                (None, _) => debug!(
                    loading = self.state().loading_next_page,
                    paging_error = self.state().paging_error,
                    "page.scroll_ignored"
                ),
            },
            PageEvent::Paging(PageOutcome::Loaded(page)) => self.dispatch(Action::ReceivedNextPage {
                next_page_url: page.next_page_url,
                items: page.items.into_iter().map(Item::from).collect(),
            }),
            PageEvent::Paging(PageOutcome::Failed(_)) => self.dispatch(Action::PagingError),
            PageEvent::Shutdown => {
                info!(dispatched = self.store.dispatched(), "page.shutdown");
                return false;
            }
        }
        true
    }

    /// Drain `rx` until [`PageEvent::Shutdown`] or every sender is gone.
    /// `events` is the sender fetch tasks report back on. The loop only
    /// keeps a weak handle to it, so it does not hold `rx` open by itself;
    /// a fetch in flight owns a clone until it reports.
    pub async fn run(
        mut self,
        fetcher: Arc<dyn PageFetcher>,
        events: UnboundedSender<PageEvent>,
        mut rx: UnboundedReceiver<PageEvent>,
    ) -> Self {
        let weak = events.downgrade();
        drop(events);

        while let Some(event) = rx.recv().await {
            let events = weak.upgrade();
            if !self.handle_event(event, &fetcher, events.as_ref()) {
                break;
            }
        }
        self
    }
}
