use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::binder::Merge;

pub const PLACEHOLDER_SELECTOR: &str = "place-holder";

/// One tile of the block list, keyed by block number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub sequence_number: u64,
    /// Server-rendered tile markup, opaque to the view.
    pub rendered_markup: String,
}

impl Item {
    pub fn new(sequence_number: u64, rendered_markup: impl Into<String>) -> Self {
        Self {
            sequence_number,
            rendered_markup: rendered_markup.into(),
        }
    }

    /// Stand-in tile for a block whose data has not arrived yet. Depends on
    /// the block number only.
    pub fn placeholder(sequence_number: u64) -> Self {
        Self::new(sequence_number, placeholder_markup(sequence_number))
    }

    pub fn is_placeholder(&self) -> bool {
        self.rendered_markup == placeholder_markup(self.sequence_number)
    }
}

fn placeholder_markup(block_number: u64) -> String {
    format!(
        r#"<div class="my-3" style="height: 98px;" data-selector="{PLACEHOLDER_SELECTOR}" data-block-number="{block_number}">
  <div class="tile tile-type-block d-flex align-items-center fade-up" style="height: 98px;">
    <span class="loading-spinner-small ml-1 mr-4">
      <span class="loading-spinner-block-1"></span>
      <span class="loading-spinner-block-2"></span>
    </span>
    <div>
      <div class="tile-title">{block_number}</div>
      <div>Block Processing</div>
    </div>
  </div>
</div>"#
    )
}

/// Wire shape of a block, on the channel and in page responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub block_number: u64,
    pub block_html: String,
}

impl From<BlockMessage> for Item {
    fn from(msg: BlockMessage) -> Self {
        Item::new(msg.block_number, msg.block_html)
    }
}

/// Snapshot rendered by the block list page.
///
/// `items` sits behind an `Arc` so renderers can skip work with a pointer
/// comparison when a transition left the list alone.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockListState {
    pub channel_disconnected: bool,
    /// Newest first.
    pub items: Arc<[Item]>,
    pub loading_next_page: bool,
    pub paging_error: bool,
    pub next_page_url: Option<String>,
}

impl Default for BlockListState {
    fn default() -> Self {
        Self {
            channel_disconnected: false,
            items: Arc::from(Vec::new()),
            loading_next_page: false,
            paging_error: false,
            next_page_url: None,
        }
    }
}

impl BlockListState {
    pub fn newest(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn oldest(&self) -> Option<&Item> {
        self.items.last()
    }

    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.sequence_number).collect()
    }

    pub fn placeholder_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_placeholder()).count()
    }
}

/// Partial state scraped from the page at boot. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockListPatch {
    pub channel_disconnected: Option<bool>,
    pub items: Option<Vec<Item>>,
    pub loading_next_page: Option<bool>,
    pub paging_error: Option<bool>,
    pub next_page_url: Option<Option<String>>,
}

impl BlockListPatch {
    pub fn apply_to(&self, state: &BlockListState) -> BlockListState {
        BlockListState {
            channel_disconnected: self
                .channel_disconnected
                .unwrap_or(state.channel_disconnected),
            items: match &self.items {
                Some(items) => Arc::from(items.clone()),
                None => state.items.clone(),
            },
            loading_next_page: self.loading_next_page.unwrap_or(state.loading_next_page),
            paging_error: self.paging_error.unwrap_or(state.paging_error),
            next_page_url: match &self.next_page_url {
                Some(url) => url.clone(),
                None => state.next_page_url.clone(),
            },
        }
    }
}

impl Merge for BlockListPatch {
    fn merge(&mut self, other: Self) {
        if other.channel_disconnected.is_some() {
            self.channel_disconnected = other.channel_disconnected;
        }
        if other.items.is_some() {
            self.items = other.items;
        }
        if other.loading_next_page.is_some() {
            self.loading_next_page = other.loading_next_page;
        }
        if other.paging_error.is_some() {
            self.paging_error = other.paging_error;
        }
        if other.next_page_url.is_some() {
            self.next_page_url = other.next_page_url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_deterministic() {
        assert_eq!(Item::placeholder(42), Item::placeholder(42));
        assert_ne!(Item::placeholder(42), Item::placeholder(43));
        assert!(Item::placeholder(42).is_placeholder());
        assert!(!Item::new(42, "<div data-block-number=\"42\"></div>").is_placeholder());
    }

    #[test]
    fn test_block_message_decodes_snake_case() {
        let msg: BlockMessage =
            serde_json::from_str(r#"{"block_number": 7, "block_html": "<div></div>"}"#).unwrap();
        let item = Item::from(msg);
        assert_eq!(item.sequence_number, 7);
        assert_eq!(item.rendered_markup, "<div></div>");

        assert!(serde_json::from_str::<BlockMessage>(r#"{"blockNumber": 7}"#).is_err());
    }

    #[test]
    fn test_patch_merge_later_wins() {
        let mut patch = BlockListPatch {
            items: Some(vec![Item::new(1, "a")]),
            next_page_url: Some(Some("/one".to_string())),
            ..Default::default()
        };
        patch.merge(BlockListPatch {
            next_page_url: Some(Some("/two".to_string())),
            ..Default::default()
        });

        let state = patch.apply_to(&BlockListState::default());
        assert_eq!(state.sequence_numbers(), vec![1]);
        assert_eq!(state.next_page_url.as_deref(), Some("/two"));
        assert!(!state.loading_next_page);
    }

    #[test]
    fn test_empty_patch_keeps_items_pointer() {
        let state = BlockListState {
            items: Arc::from(vec![Item::new(3, "x")]),
            ..Default::default()
        };
        let next = BlockListPatch::default().apply_to(&state);
        assert!(Arc::ptr_eq(&state.items, &next.items));
    }
}
