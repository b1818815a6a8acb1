// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-device notification channel.
//!
//! A [`NotificationChannel`] multiplexes one backend subscription across any
//! number of listeners. The subscription is created when the first listener
//! is added and released when the last one is removed, so the backend never
//! sees more than one live subscription per device.
//!
//! # Locking
//!
//! - `inner` guards the listener list, the subscription handle and the cached
//!   state. Subscribe/unsubscribe calls happen while it is held.
//! - `delivery` serializes dispatches for the device. Listener callbacks run
//!   with `delivery` held and `inner` released, so callbacks may add or remove
//!   listeners but must not dispatch to the same device.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::storage::backend::{ChangeHandler, StorageBackend, SubscriptionHandle};
use crate::storage::info::{StorageId, StorageState};

/// Result returned by listener callbacks. Errors are logged, never propagated.
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A registered state-change callback.
pub type StateListener = Arc<dyn Fn(&StateChange) -> ListenerResult + Send + Sync>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Token identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Event delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub id: StorageId,
    /// Cached state before this notification.
    pub previous: StorageState,
    pub state: StorageState,
}

struct ListenerEntry {
    id: ListenerId,
    callback: StateListener,
    active: Arc<AtomicBool>,
}

struct ChannelInner {
    listeners: Vec<ListenerEntry>,
    subscription: Option<SubscriptionHandle>,
    /// Bumped on every subscribe attempt and every release, so handlers of
    /// an old subscription can be told apart from the live one.
    generation: u64,
    cached_state: StorageState,
}

pub struct NotificationChannel {
    device_id: StorageId,
    inner: Mutex<ChannelInner>,
    delivery: Mutex<()>,
}

impl NotificationChannel {
    pub(crate) fn new(device_id: StorageId, initial_state: StorageState) -> Self {
        Self {
            device_id,
            inner: Mutex::new(ChannelInner {
                listeners: Vec::new(),
                subscription: None,
                generation: 0,
                cached_state: initial_state,
            }),
            delivery: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn device_id(&self) -> StorageId {
        self.device_id
    }

    /// True iff a backend subscription is live.
    pub fn is_subscribed(&self) -> bool {
        self.lock().subscription.is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// The cached state, available only while subscribed.
    pub fn cached_state(&self) -> Option<StorageState> {
        let inner = self.lock();
        inner.subscription.map(|_| inner.cached_state)
    }

    /// Register a listener, subscribing to the backend if it is the first one.
    ///
    /// On the first-listener path the cache is synchronized with a live fetch
    /// right after the subscription is created. If either step fails nothing
    /// is registered and the subscription, if any, is released.
    pub(crate) fn add_listener(
        self: &Arc<Self>,
        backend: &dyn StorageBackend,
        callback: StateListener,
    ) -> Result<ListenerId> {
        let id = self.device_id;
        let mut inner = self.lock();

        if inner.subscription.is_none() {
            inner.generation += 1;
            let generation = inner.generation;
            let channel = Arc::downgrade(self);
            let handler: ChangeHandler = Box::new(move |storage_id, state| {
                if let Some(channel) = channel.upgrade() {
                    channel.deliver(Some(generation), storage_id, state);
                }
            });

            let handle = backend
                .subscribe(id, handler)
                .map_err(|source| Error::Subscribe { id, source })?;

            match backend.fetch_state(id) {
                Ok(state) => inner.cached_state = state,
                Err(source) => {
                    if let Err(e) = backend.unsubscribe(handle) {
                        warn!("Failed to release subscription for storage {id} after sync failure: {e}");
                    }
                    return Err(Error::fetch(id, "state", source));
                }
            }

            inner.subscription = Some(handle);
            debug!(
                "Subscribed to storage {id} state changes (state: {})",
                inner.cached_state
            );
        }

        let listener_id = ListenerId::next();
        inner.listeners.push(ListenerEntry {
            id: listener_id,
            callback,
            active: Arc::new(AtomicBool::new(true)),
        });
        Ok(listener_id)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    ///
    /// Removing the last listener releases the backend subscription. Release
    /// failures are logged; the listener is removed regardless.
    pub(crate) fn remove_listener(
        &self,
        backend: &dyn StorageBackend,
        listener_id: ListenerId,
    ) -> bool {
        let id = self.device_id;
        let mut inner = self.lock();

        let Some(position) = inner.listeners.iter().position(|l| l.id == listener_id) else {
            return false;
        };
        let entry = inner.listeners.remove(position);
        entry.active.store(false, Ordering::Release);

        if inner.listeners.is_empty() {
            if let Some(handle) = inner.subscription.take() {
                inner.generation += 1;
                match backend.unsubscribe(handle) {
                    Ok(()) => debug!("Unsubscribed from storage {id} state changes"),
                    Err(source) => {
                        let err = Error::Unsubscribe { id, source };
                        warn!("{err}");
                    }
                }
            }
        }
        true
    }

    /// Deliver a state change to the current subscription's listeners.
    ///
    /// Dropped when no subscription is live.
    pub fn dispatch(&self, state: StorageState) {
        self.deliver(None, self.device_id, state);
    }

    fn deliver(&self, generation: Option<u64>, storage_id: StorageId, state: StorageState) {
        if storage_id != self.device_id {
            return;
        }

        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);

        let (previous, targets) = {
            let mut inner = self.lock();
            let current = inner.subscription.is_some()
                && generation.is_none_or(|g| g == inner.generation);
            if !current {
                debug!("Dropping stale state notification for storage {storage_id}");
                return;
            }
            let previous = mem::replace(&mut inner.cached_state, state);
            let targets: Vec<_> = inner
                .listeners
                .iter()
                .map(|l| (l.id, Arc::clone(&l.callback), Arc::clone(&l.active)))
                .collect();
            (previous, targets)
        };

        let change = StateChange {
            id: storage_id,
            previous,
            state,
        };

        for (listener_id, callback, active) in targets {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| callback(&change))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Listener {listener_id:?} for storage {storage_id} failed: {e}");
                }
                Err(_) => {
                    warn!("Listener {listener_id:?} for storage {storage_id} panicked");
                }
            }
        }
    }
}
