//! Ordered observer lists.
//!
//! An [`Event`] keeps its handlers in registration order. Broadcasting
//! iterates a snapshot of the list taken when the broadcast starts, so a
//! handler list can be shared and modified elsewhere without affecting a
//! dispatch that is already in flight.

use std::fmt;
use std::sync::Arc;

/// Token returned by [`Event::add`], used to remove the handler again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<A, R> = Arc<dyn Fn(&A) -> R + Send + Sync>;

pub struct Event<A: ?Sized, R = ()> {
    handlers: Vec<(HandlerId, Handler<A, R>)>,
    next_id: u64,
}

impl<A: ?Sized, R> Event<A, R> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    /// Append a handler; it will run after every handler added before it
    pub fn add<F>(&mut self, handler: F) -> HandlerId
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        let handler: Handler<A, R> = Arc::new(handler);
        self.handlers.push((id, handler));
        id
    }

    /// Returns `false` if the handler was not registered
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn snapshot(&self) -> Vec<Handler<A, R>> {
        self.handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }
}

impl<A: ?Sized> Event<A> {
    pub fn broadcast(&self, arg: &A) {
        for handler in self.snapshot() {
            handler(arg);
        }
    }
}

impl<A: ?Sized, E> Event<A, Result<(), E>> {
    /// Broadcast until the first handler fails and return that failure
    pub fn try_broadcast(&self, arg: &A) -> Result<(), E> {
        for handler in self.snapshot() {
            handler(arg)?;
        }
        Ok(())
    }
}

impl<A: ?Sized, R> Default for Event<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized, R> Clone for Event<A, R> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            next_id: self.next_id,
        }
    }
}

impl<A: ?Sized, R> fmt::Debug for Event<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_broadcast_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut event: Event<u32> = Event::new();

        for tag in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            event.add(move |value: &u32| calls.lock().unwrap().push((tag, *value)));
        }

        event.broadcast(&7);

        assert_eq!(
            *calls.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn test_remove_handler() {
        let calls = Arc::new(Mutex::new(0));
        let mut event: Event<()> = Event::new();

        let counter = Arc::clone(&calls);
        let id = event.add(move |_| *counter.lock().unwrap() += 1);

        assert!(event.remove(id));
        assert!(!event.remove(id));
        event.broadcast(&());

        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(event.is_empty());
    }

    #[test]
    fn test_try_broadcast_stops_at_first_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut event: Event<str, Result<(), String>> = Event::new();

        let first = Arc::clone(&calls);
        event.add(move |name: &str| {
            first.lock().unwrap().push(format!("ok {name}"));
            Ok(())
        });
        event.add(|name: &str| Err(format!("failed {name}")));
        let third = Arc::clone(&calls);
        event.add(move |name: &str| {
            third.lock().unwrap().push(format!("late {name}"));
            Ok(())
        });

        let result = event.try_broadcast("ex1");

        assert_eq!(result, Err("failed ex1".to_string()));
        assert_eq!(*calls.lock().unwrap(), vec!["ok ex1".to_string()]);
    }

    #[test]
    fn test_clone_keeps_handlers_independent() {
        let mut event: Event<()> = Event::new();
        event.add(|_| {});
        let mut copy = event.clone();
        copy.clear();

        assert_eq!(event.len(), 1);
        assert!(copy.is_empty());
    }
}
