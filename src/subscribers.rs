use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;
type Entries<T> = Rc<RefCell<Vec<(u64, Callback<T>)>>>;

/// Callback list with synchronous, registration-order fan-out.
///
/// A panicking callback is logged and skipped; the rest still run.
/// Emission iterates over a snapshot, so a callback may unsubscribe
/// itself (or anyone else) while being called.
pub struct Subscribers<T> {
    next_id: RefCell<u64>,
    entries: Entries<T>,
    label: &'static str,
}

impl<T: 'static> Subscribers<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            next_id: RefCell::new(0),
            entries: Rc::new(RefCell::new(vec![])),
            label,
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            *next
        };
        self.entries.borrow_mut().push((id, Rc::new(callback)));

        let weak: Weak<RefCell<Vec<(u64, Callback<T>)>>> = Rc::downgrade(&self.entries);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(entries) = weak.upgrade() {
                    entries.borrow_mut().retain(|(i, _)| *i != id);
                }
            })),
        }
    }

    /// Call every subscriber; returns how many panicked.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        let mut failures = 0;
        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                failures += 1;
                tracing::warn!(subscribers = self.label, "subscriber panicked; isolated");
            }
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Handle returned by every `on_*` registration. Dropping it keeps the
/// subscription alive; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Safe to call after the owner is gone, or from inside a callback.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("label", &self.label)
            .field("count", &self.entries.borrow().len())
            .finish()
    }
}
