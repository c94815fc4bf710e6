//! Declarative element bindings
//!
//! A binder maps selectors to a pair of optional handlers:
//! - `load` scrapes an element once at boot and returns a partial state;
//! - `render` runs after every dispatch with the new and previous state.
//!
//! Render handlers are the only code that writes to their element's subtree.

use std::fmt::Debug;

use tracing::{debug, warn};

use crate::dom::{Document, NodeId, Selector};
use crate::error::Result;
use crate::store::Store;

pub type LoadFn<P> = Box<dyn Fn(&mut Document, NodeId) -> P + Send>;
pub type RenderFn<S> = Box<dyn Fn(&mut Document, NodeId, &S, &S) + Send>;

/// Partial states produced by `load` handlers are folded with `merge`;
/// later values win.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

/// Handlers for one selector.
pub struct Element<S, P> {
    load: Option<LoadFn<P>>,
    render: Option<RenderFn<S>>,
}

impl<S, P> Default for Element<S, P> {
    fn default() -> Self {
        Self {
            load: None,
            render: None,
        }
    }
}

impl<S, P> Element<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load(mut self, load: impl Fn(&mut Document, NodeId) -> P + Send + 'static) -> Self {
        self.load = Some(Box::new(load));
        self
    }

    pub fn with_render(
        mut self,
        render: impl Fn(&mut Document, NodeId, &S, &S) + Send + 'static,
    ) -> Self {
        self.render = Some(Box::new(render));
        self
    }
}

struct Binding<S, P> {
    selector: Selector,
    element: Element<S, P>,
    matched: Vec<NodeId>,
}

pub struct ElementBinder<S, P> {
    bindings: Vec<Binding<S, P>>,
}

impl<S, P> Default for ElementBinder<S, P> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl<S, P: Default + Merge> ElementBinder<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, selector: &str, element: Element<S, P>) -> Result<Self> {
        self.bindings.push(Binding {
            selector: selector.parse()?,
            element,
            matched: Vec::new(),
        });
        Ok(self)
    }

    /// Resolve every selector against `doc`. Matches are cached: bound
    /// elements are expected to live as long as the page.
    pub fn attach(&mut self, doc: &Document) {
        for binding in &mut self.bindings {
            binding.matched = doc.query_selector_all(&binding.selector);
            if binding.matched.is_empty() {
                warn!(selector = %binding.selector, "binder.no_match");
            } else {
                debug!(selector = %binding.selector, count = binding.matched.len(), "binder.attach");
            }
        }
    }

    /// Run all `load` handlers, merging partials in registration order.
    pub fn load(&self, doc: &mut Document) -> P {
        let mut payload = P::default();
        for binding in &self.bindings {
            let Some(load) = &binding.element.load else {
                continue;
            };
            for &node in &binding.matched {
                payload.merge(load(doc, node));
            }
        }
        payload
    }

    pub fn render(&self, doc: &mut Document, state: &S, previous: &S) {
        for binding in &self.bindings {
            let Some(render) = &binding.element.render else {
                continue;
            };
            for &node in &binding.matched {
                render(doc, node, state, previous);
            }
        }
    }

    /// Attach, load, dispatch the merged payload through `init` and render
    /// the resulting state once.
    pub fn connect<A: Debug>(
        &mut self,
        store: &mut Store<S, A>,
        doc: &mut Document,
        init: impl FnOnce(P) -> A,
    ) {
        self.attach(doc);
        let payload = self.load(doc);
        let previous = store.dispatch(init(payload));
        self.render(doc, store.state(), &previous);
    }
}
