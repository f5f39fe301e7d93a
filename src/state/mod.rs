//! The App State Store: the single source of truth for UI-visible state.
//!
//! State lives in an `Arc<AppState>` that is replaced, never mutated, on each
//! [`StateStore::dispatch`]. Listeners run synchronously after the swap, in
//! subscription order, outside every internal lock (so a listener may read
//! state or dispatch again).

pub mod actions;
pub mod types;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub use actions::{reduce, Action};
pub use types::{AppState, Progress, SyncStatus, UiError};

type Listener = Arc<dyn Fn(&Arc<AppState>) + Send + Sync>;

struct Slot {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener,
}

struct Inner {
    state: Mutex<Arc<AppState>>,
    listeners: Mutex<Vec<Slot>>,
    next_id: AtomicU64,
}

pub struct StateStore {
    inner: Arc<Inner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(initial: AppState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Arc::new(initial)),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Current snapshot. Cheap; never blocks on listeners.
    pub fn get_state(&self) -> Arc<AppState> {
        Arc::clone(&self.inner.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Register `listener` to run after every transition.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<AppState>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Slot {
                id,
                active: Arc::clone(&active),
                listener: Arc::new(listener),
            });
        Subscription {
            id,
            active,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Apply `action` and notify listeners. Returns the new snapshot.
    pub fn dispatch(&self, action: Action) -> Arc<AppState> {
        let next = {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            let next = Arc::new(reduce(&state, &action));
            *state = Arc::clone(&next);
            next
        };
        tracing::trace!(action = ?action, "state transition");

        let listeners: Vec<(Arc<AtomicBool>, Listener)> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|slot| (Arc::clone(&slot.active), Arc::clone(&slot.listener)))
            .collect();
        for (active, listener) in listeners {
            // Unsubscribing mid-round takes effect for the rest of the round.
            if active.load(Ordering::Acquire) {
                listener(&next);
            }
        }
        next
    }

    /// Derived selector. Returns the current projection and calls `on_change`
    /// only when a later transition changes the projected value.
    pub fn select<T, P, F>(&self, projection: P, on_change: F) -> (T, Subscription)
    where
        T: PartialEq + Clone + Send + 'static,
        P: Fn(&AppState) -> T + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let initial = projection(&self.get_state());
        let last = Mutex::new(initial.clone());
        let subscription = self.subscribe(move |state| {
            let projected = projection(state);
            let changed = {
                let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
                if *last == projected {
                    false
                } else {
                    *last = projected.clone();
                    true
                }
            };
            if changed {
                on_change(&projected);
            }
        });
        (initial, subscription)
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`StateStore::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    store: Weak<Inner>,
}

impl Subscription {
    /// Stop notifications. Takes effect immediately, including for a
    /// notification round already in progress.
    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn detach(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(inner) = self.store.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|slot| slot.id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
