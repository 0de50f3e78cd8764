//! Observable state containers.
//!
//! Each controller owns one [`StateContainer`] and is its only writer.
//! Observers hold a [`Subscription`] and re-read the snapshot whenever they
//! are notified. A transition and its notification happen under the same
//! channel lock, so an observer never sees half of a transition.

use tokio::sync::watch;

/// Single-writer, many-reader container for a controller snapshot.
#[derive(Debug)]
pub struct StateContainer<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateContainer<T> {
    /// Create a container holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    /// Clone of the current snapshot. No side effects.
    pub fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Read a projection of the current snapshot without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Apply a transition and notify every observer.
    pub(crate) fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Apply a transition only if `f` reports a change; notify only then.
    pub(crate) fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

/// Observer handle returned by [`StateContainer::subscribe`].
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next state change.
    ///
    /// Returns `false` once the owning controller has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Current snapshot, marking it as seen.
    pub fn current(&mut self) -> T {
        self.rx.borrow_and_update().clone()
    }

    /// Whether a change arrived that [`current`](Self::current) has not seen.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Stop observing.
    pub fn unsubscribe(self) {}
}
