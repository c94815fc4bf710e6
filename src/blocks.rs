//! Block list page
//!
//! State, transitions and element bindings for the live list of recent
//! blocks, plus the event loop that drives it from the realtime feed and
//! scroll-triggered pagination.

pub mod elements;
pub mod page;
pub mod reducer;
pub mod state;

pub use elements::block_list_binder;
pub use page::{BlockListPage, PageEvent};
pub use reducer::{base_reduce, fill_missing_blocks, reduce, with_missing_blocks, Action};
pub use state::{BlockListPatch, BlockListState, BlockMessage, Item, PLACEHOLDER_SELECTOR};
