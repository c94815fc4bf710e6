//! Block list transitions
//!
//! [`reduce`] is the base reducer wrapped by [`with_missing_blocks`]. Both are
//! pure: they never touch the document, never fail and never mutate the
//! input state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::state::{BlockListPatch, BlockListState, Item};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Partial state scraped from the page at boot.
    Init(BlockListPatch),
    /// The realtime channel failed. Live updates stop for good.
    Disconnected,
    NewItem(Item),
    LoadingNextPage,
    PagingError,
    ReceivedNextPage {
        next_page_url: Option<String>,
        items: Vec<Item>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Init(_) => "init",
            Action::Disconnected => "disconnected",
            Action::NewItem(_) => "new_item",
            Action::LoadingNextPage => "loading_next_page",
            Action::PagingError => "paging_error",
            Action::ReceivedNextPage { .. } => "received_next_page",
        }
    }
}

/// Full block list reducer: [`base_reduce`] with gap filling.
pub fn reduce(state: &BlockListState, action: &Action) -> BlockListState {
    fill_missing_blocks(base_reduce(state, action))
}

/// Wrap `reducer` so every result goes through [`fill_missing_blocks`].
pub fn with_missing_blocks<F>(reducer: F) -> impl Fn(&BlockListState, &Action) -> BlockListState
where
    F: Fn(&BlockListState, &Action) -> BlockListState,
{
    move |state, action| fill_missing_blocks(reducer(state, action))
}

pub fn base_reduce(state: &BlockListState, action: &Action) -> BlockListState {
    match action {
        Action::Init(patch) => patch.apply_to(state),
        Action::Disconnected => BlockListState {
            channel_disconnected: true,
            ..state.clone()
        },
        Action::NewItem(item) => receive_new_item(state, item),
        Action::LoadingNextPage => BlockListState {
            loading_next_page: true,
            ..state.clone()
        },
        Action::PagingError => BlockListState {
            loading_next_page: false,
            paging_error: true,
            ..state.clone()
        },
        Action::ReceivedNextPage {
            next_page_url,
            items,
        } => BlockListState {
            loading_next_page: false,
            next_page_url: next_page_url.clone(),
            items: state.items.iter().chain(items.iter()).cloned().collect(),
            ..state.clone()
        },
    }
}

/// Prepend a new newest block or replace the tile with the same number.
/// Anything else (older than the newest and not already listed) is dropped.
fn receive_new_item(state: &BlockListState, item: &Item) -> BlockListState {
    if state.channel_disconnected {
        return state.clone();
    }

    let is_newest = state
        .newest()
        .map_or(true, |newest| newest.sequence_number < item.sequence_number);
    if is_newest {
        return BlockListState {
            items: std::iter::once(item)
                .chain(state.items.iter())
                .cloned()
                .collect(),
            ..state.clone()
        };
    }

    match state
        .items
        .iter()
        .position(|existing| existing.sequence_number == item.sequence_number)
    {
        Some(index) => {
            let mut items = state.items.to_vec();
            items[index] = item.clone();
            BlockListState {
                items: Arc::from(items),
                ..state.clone()
            }
        }
        None => state.clone(),
    }
}

/// Widest hole [`fill_missing_blocks`] will fill. A wider one means a garbled
/// block number, and the list is left as it is.
pub const MAX_FILL_SPAN: u64 = 10_000;

/// Rebuild the list as the dense descending range between its highest and
/// lowest block number, filling holes with placeholder tiles.
///
/// Lists that are already dense are returned untouched, so the `items`
/// pointer only changes when the list does.
pub fn fill_missing_blocks(state: BlockListState) -> BlockListState {
    if state.items.len() < 2 || is_dense(&state.items) {
        return state;
    }

    let mut by_number: HashMap<u64, &Item> = HashMap::with_capacity(state.items.len());
    for item in state.items.iter() {
        by_number.entry(item.sequence_number).or_insert(item);
    }
    let (min, max) = match (by_number.keys().min(), by_number.keys().max()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => return state,
    };
    if max - min > MAX_FILL_SPAN {
        warn!(min, max, "blocks.gap_too_large");
        return state;
    }

    let items: Arc<[Item]> = (min..=max)
        .rev()
        .map(|number| match by_number.get(&number) {
            Some(item) => (*item).clone(),
            None => Item::placeholder(number),
        })
        .collect();

    BlockListState { items, ..state }
}

fn is_dense(items: &[Item]) -> bool {
    items
        .windows(2)
        .all(|pair| pair[1].sequence_number.checked_add(1) == Some(pair[0].sequence_number))
}
