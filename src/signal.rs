//! Observable value with explicit subscriber registration.
//!
//! Used for the garment selection: the host sets the selected garment's
//! locator and the widget refreshes its overlay in response.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Subscriber<T> = Rc<dyn Fn(&T)>;

/// Handle returned by [`Signal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_id: Cell<u64>,
}

/// Shared observable value. Clones refer to the same value.
pub struct Signal<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: PartialEq + Clone + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Store `value` and notify subscribers if it differs from the current
    /// one. Returns whether it changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }

        // Snapshot so subscribers may (un)subscribe or read the signal
        let subscribers: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, subscriber)| Rc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(&value);
        }
        true
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

impl<T: PartialEq + Clone + Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(signal: &Signal<String>) -> (Rc<RefCell<Vec<String>>>, SubscriptionId) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = signal.subscribe(move |value: &String| sink.borrow_mut().push(value.clone()));
        (seen, id)
    }

    #[test]
    fn test_set_notifies_only_on_change() {
        let signal = Signal::new(String::new());
        let (seen, _) = recorder(&signal);

        assert!(signal.set("red.png".to_string()));
        assert!(!signal.set("red.png".to_string()));
        assert!(signal.set("blue.png".to_string()));

        assert_eq!(*seen.borrow(), vec!["red.png", "blue.png"]);
        assert_eq!(signal.get(), "blue.png");
    }

    #[test]
    fn test_unsubscribe() {
        let signal = Signal::new(0u32);
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let id = signal.subscribe(move |_| counter.set(counter.get() + 1));

        signal.set(1);
        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        signal.set(2);

        assert_eq!(count.get(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_can_read_and_unsubscribe_during_notify() {
        let signal: Signal<u32> = Signal::default();
        let seen = Rc::new(Cell::new(0));
        let id_slot: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));

        let handle = signal.clone();
        let sink = Rc::clone(&seen);
        let slot = Rc::clone(&id_slot);
        let id = signal.subscribe(move |_| {
            sink.set(handle.get());
            if let Some(id) = slot.get() {
                handle.unsubscribe(id);
            }
        });
        id_slot.set(Some(id));

        signal.set(7);
        signal.set(8);
        assert_eq!(seen.get(), 7);
    }
}
