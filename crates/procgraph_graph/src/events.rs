// SPDX-License-Identifier: MIT OR Apache-2.0
//! Synchronous observer lists.
//!
//! Listeners run on the calling thread, in subscription order, during
//! [`Subscribers::emit`]. A listener may not subscribe or unsubscribe on the
//! list that is currently dispatching.

use std::fmt;

/// Handle returned by [`Subscribers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Events raised by a graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// Structure, parameters or node settings changed
    Updated,
}

/// Ordered list of event listeners
pub struct Subscribers<E> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
}

impl<E> Subscribers<E> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Add a listener; it runs after every listener added before it
    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener, returning whether it was present
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Deliver an event to every listener
    pub fn emit(&mut self, event: &E) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    /// Number of listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is attached
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_dispatch_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut subs = Subscribers::new();
        for tag in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            subs.subscribe(move |e: &u32| log.borrow_mut().push(format!("{tag}{e}")));
        }
        subs.emit(&1);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_unsubscribe() {
        let hits = Rc::new(RefCell::new(0));
        let mut subs = Subscribers::new();
        let counter = Rc::clone(&hits);
        let id = subs.subscribe(move |_: &GraphEvent| *counter.borrow_mut() += 1);
        subs.emit(&GraphEvent::Updated);
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        subs.emit(&GraphEvent::Updated);
        assert_eq!(*hits.borrow(), 1);
        assert!(subs.is_empty());
    }
}
