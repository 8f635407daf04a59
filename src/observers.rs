//! Observer lists
//!
//! Ordered subscriber lists used for the ability's broadcast notifications
//! (activation begin, confirm, cooldown polling, input, ...).

use smallvec::SmallVec;
use std::fmt;

/// A subscriber callback.
pub type Observer = Box<dyn FnMut() + Send + Sync>;

/// Ordered list of subscribers notified in subscription order.
#[derive(Default)]
pub struct Observers {
    subscribers: SmallVec<[Observer; 2]>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl FnMut() + Send + Sync + 'static) {
        self.subscribers.push(Box::new(observer));
    }

    /// Notify every subscriber once, in order.
    pub fn notify(&mut self) {
        for subscriber in self.subscribers.iter_mut() {
            subscriber();
        }
    }

    /// Notify every subscriber once, then drop them all.
    ///
    /// Used where a registration is single-use (confirm).
    pub fn notify_and_clear(&mut self) {
        self.notify();
        self.clear();
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn is_bound(&self) -> bool {
        !self.subscribers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_notify_in_subscription_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();

        for i in 0..3 {
            let order = order.clone();
            observers.subscribe(move || order.lock().unwrap().push(i));
        }
        observers.notify();

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(observers.len(), 3, "notify keeps subscribers");
    }

    #[test]
    fn test_notify_and_clear_is_single_fire() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::new();
        let counter = calls.clone();
        observers.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(observers.is_bound());
        observers.notify_and_clear();
        observers.notify_and_clear();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!observers.is_bound());
    }
}
