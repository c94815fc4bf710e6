//! Element bindings of the block list page

use std::sync::Arc;

use tracing::{debug, warn};

use super::state::{BlockListPatch, BlockListState, Item};
use crate::binder::{Element, ElementBinder};
use crate::dom::{reconcile, Document, NodeId};
use crate::error::Result;

pub const BLOCK_LIST_PAGE: &str = r#"[data-page="block-list"]"#;
pub const CHANNEL_DISCONNECTED_MESSAGE: &str = r#"[data-selector="channel-disconnected-message"]"#;
pub const BLOCKS_LIST: &str = r#"[data-selector="blocks-list"]"#;
pub const NEXT_PAGE_BUTTON: &str = r#"[data-selector="next-page-button"]"#;
pub const LOADING_NEXT_PAGE: &str = r#"[data-selector="loading-next-page"]"#;
pub const PAGING_ERROR_MESSAGE: &str = r#"[data-selector="paging-error-message"]"#;

pub const BLOCK_NUMBER_ATTR: &str = "data-block-number";

pub fn block_list_binder() -> Result<ElementBinder<BlockListState, BlockListPatch>> {
    ElementBinder::new()
        .bind(
            CHANNEL_DISCONNECTED_MESSAGE,
            Element::new().with_render(render_channel_disconnected),
        )?
        .bind(
            BLOCKS_LIST,
            Element::new()
                .with_load(load_blocks)
                .with_render(render_blocks),
        )?
        .bind(NEXT_PAGE_BUTTON, Element::new().with_load(load_next_page_button))?
        .bind(LOADING_NEXT_PAGE, Element::new().with_render(render_loading))?
        .bind(
            PAGING_ERROR_MESSAGE,
            Element::new().with_render(render_paging_error),
        )
}

fn block_key(doc: &Document, node: NodeId) -> Option<String> {
    doc.attr(node, BLOCK_NUMBER_ATTR).map(str::to_string)
}

fn load_blocks(doc: &mut Document, list: NodeId) -> BlockListPatch {
    let mut items = Vec::new();
    for tile in doc.element_children(list) {
        match doc
            .attr(tile, BLOCK_NUMBER_ATTR)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            Some(number) => items.push(Item::new(number, doc.outer_html(tile))),
            None => warn!(tile = %doc.outer_html(tile), "blocks.unnumbered_tile"),
        }
    }
    debug!(count = items.len(), "blocks.load");

    BlockListPatch {
        items: Some(items),
        ..Default::default()
    }
}

fn render_blocks(
    doc: &mut Document,
    list: NodeId,
    state: &BlockListState,
    previous: &BlockListState,
) {
    if Arc::ptr_eq(&state.items, &previous.items) {
        return;
    }

    let mut tiles = Vec::with_capacity(state.items.len());
    for item in state.items.iter() {
        match doc.create_element(&item.rendered_markup) {
            Ok(tile) => tiles.push(tile),
            Err(e) => warn!(block = item.sequence_number, error = %e, "blocks.bad_markup"),
        }
    }

    let stats = reconcile(doc, list, &tiles, block_key);
    debug!(
        inserted = stats.inserted,
        moved = stats.moved,
        removed = stats.removed,
        updated = stats.updated,
        "blocks.render"
    );
}

/// Hides the button and points pagination at the JSON flavour of its link.
fn load_next_page_button(doc: &mut Document, button: NodeId) -> BlockListPatch {
    doc.hide(button);
    let next_page_url = doc.attr(button, "href").map(|href| {
        let separator = if href.contains('?') { '&' } else { '?' };
        Some(format!("{}{}type=JSON", href, separator))
    });

    BlockListPatch {
        next_page_url,
        ..Default::default()
    }
}

fn render_channel_disconnected(
    doc: &mut Document,
    banner: NodeId,
    state: &BlockListState,
    previous: &BlockListState,
) {
    if state.channel_disconnected && !previous.channel_disconnected {
        doc.show(banner);
    }
}

/// Runs on every render so a spinner left visible in the server markup is
/// hidden at boot. Showing and hiding are no-ops when nothing changes.
fn render_loading(
    doc: &mut Document,
    spinner: NodeId,
    state: &BlockListState,
    _previous: &BlockListState,
) {
    if state.loading_next_page {
        doc.show(spinner);
    } else {
        doc.hide(spinner);
    }
}

fn render_paging_error(
    doc: &mut Document,
    message: NodeId,
    state: &BlockListState,
    previous: &BlockListState,
) {
    if state.paging_error && !previous.paging_error {
        doc.show(message);
    }
}
