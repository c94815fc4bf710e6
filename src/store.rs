//! Single-writer state container
//!
//! The store owns the current state snapshot and replaces it on every
//! dispatch with whatever the reducer returns. Subscribers see the new and
//! the previous snapshot after each dispatch.

use std::fmt::Debug;

use tracing::debug;

pub type Reducer<S, A> = Box<dyn Fn(&S, &A) -> S + Send>;
pub type Subscriber<S> = Box<dyn FnMut(&S, &S) + Send>;

pub struct Store<S, A> {
    state: S,
    reducer: Reducer<S, A>,
    subscribers: Vec<Subscriber<S>>,
    dispatched: u64,
}

impl<S, A: Debug> Store<S, A> {
    pub fn new(reducer: impl Fn(&S, &A) -> S + Send + 'static, initial: S) -> Self {
        Self {
            state: initial,
            reducer: Box::new(reducer),
            subscribers: Vec::new(),
            dispatched: 0,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Number of actions applied so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&S, &S) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Apply `action`, notify subscribers and hand back the previous state.
    pub fn dispatch(&mut self, action: A) -> S {
        debug!(action = ?action, seq = self.dispatched, "store.dispatch");
        let next = (self.reducer)(&self.state, &action);
        let previous = std::mem::replace(&mut self.state, next);
        self.dispatched += 1;
        for subscriber in &mut self.subscribers {
            subscriber(&self.state, &previous);
        }
        previous
    }
}
