//! In-memory document model the explorer views render into
//!
//! Pages are booted from server-rendered markup. The document is an arena of
//! nodes addressed by [`NodeId`]; a node keeps its id for as long as it lives,
//! which is what lets the list reconciler move tiles without recreating them.

mod markup;
pub mod morph;
mod selector;

pub use morph::{reconcile, MorphStats};
pub use selector::Selector;

use crate::error::{ExplorerError, Result};

const HIDDEN: &str = "hidden";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Node {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            })],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Parse a full page. Top-level nodes become children of the root.
    pub fn parse(markup: &str) -> Result<Self> {
        let mut doc = Self::new();
        let root = doc.root;
        for node in doc.parse_fragment(markup)? {
            doc.append_child(root, node);
        }
        Ok(doc)
    }

    /// Parse markup into detached nodes owned by this document.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        markup::parse_fragment(self, markup)
    }

    /// Parse markup and return its first element, detached.
    /// Anything else in the fragment is dropped.
    pub fn create_element(&mut self, markup: &str) -> Result<NodeId> {
        let nodes = self.parse_fragment(markup)?;
        let element = nodes.iter().copied().find(|&id| self.is_element(id));
        for &node in &nodes {
            if Some(node) != element {
                self.discard(node);
            }
        }
        element.ok_or_else(|| ExplorerError::MarkupError("fragment has no element".to_string()))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Whether `id` still refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.node(id).map(|n| &n.data)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Element { .. }))
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            Some(NodeData::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match self.data(id) {
            Some(NodeData::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute. Returns `true` when the stored value changed.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let Some(NodeData::Element { attrs, .. }) = self.node_mut(id).map(|n| &mut n.data) else {
            return false;
        };
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) if v == value => false,
            Some((_, v)) => {
                *v = value.to_string();
                true
            }
            None => {
                attrs.push((name.to_string(), value.to_string()));
                true
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        let Some(NodeData::Element { attrs, .. }) = self.node_mut(id).map(|n| &mut n.data) else {
            return false;
        };
        let before = attrs.len();
        attrs.retain(|(n, _)| n != name);
        attrs.len() != before
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// True when the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Unlink a node from its parent. The node stays alive.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` under `parent` before `reference`, or last when the
    /// reference is `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.detach(child);
        let Some(p) = self.node_mut(parent) else {
            return;
        };
        let index = reference
            .and_then(|r| p.children.iter().position(|&c| c == r))
            .unwrap_or(p.children.len());
        p.children.insert(index, child);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Drop the current children of `id` and adopt `children` in order.
    pub fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        for old in self.children(id).to_vec() {
            self.discard(old);
        }
        for child in children {
            self.append_child(id, child);
        }
    }

    /// Detach a node and free its whole subtree.
    pub fn discard(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        self.detach(id);
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.slots.get_mut(next.0).and_then(Option::take) {
                pending.extend(node.children);
                self.free.push(next.0);
            }
        }
    }

    pub fn hide(&mut self, id: NodeId) {
        self.set_attr(id, HIDDEN, "");
    }

    pub fn show(&mut self, id: NodeId) {
        self.remove_attr(id, HIDDEN);
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.attr(id, HIDDEN).is_some()
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    /// Concatenated text of the subtree with whitespace runs collapsed.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut raw = String::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(NodeData::Text(text)) = self.data(next) {
                raw.push_str(text);
                raw.push(' ');
            }
            pending.extend(self.children(next).iter().rev());
        }
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            Some(NodeData::Root) => {
                for &child in self.children(id) {
                    self.write_html(child, out);
                }
            }
            Some(NodeData::Element { tag, attrs }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&markup::escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if markup::is_void(tag) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Comment(text)) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            None => {}
        }
    }

    /// All attached elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending: Vec<NodeId> = self.children(self.root).iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            if selector.matches(self, next) {
                found.push(next);
            }
            pending.extend(self.children(next).iter().rev());
        }
        found
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    /// Parse `selector` and run [`Document::query_selector_all`].
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>> {
        Ok(self.query_selector_all(&selector.parse()?))
    }
}
