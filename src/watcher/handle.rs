use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::context::OwnerId;
use crate::error::{BindError, BindResult, ExecutionError};
use crate::refresh::RefreshRule;
use crate::value::Value;

use super::worker::ControlMsg;

fn timeout_err(timeout: Duration) -> BindError {
    BindError::Execution(ExecutionError::Timeout {
        duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
    })
}

fn disconnected_err() -> BindError {
    BindError::Execution(ExecutionError::Disconnected {
        path: "watcher_control".to_string(),
    })
}

/// Unique identifier for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatcherId(Uuid);

impl WatcherId {
    /// Create a new random watcher id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a watcher thread stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherExit {
    /// The owner went away. This is the normal way a watcher ends.
    OwnerTerminated,
    /// `subscribe` returned an error. Not retried.
    SubscribeFailed(String),
    /// The thread panicked, e.g. inside a filter predicate.
    Panicked(String),
}

/// Address external event sources deliver to.
///
/// Cloneable; delivery never blocks.
#[derive(Debug, Clone)]
pub struct EventSink {
    watcher: WatcherId,
    tx: Sender<Value>,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    pub(crate) fn new(watcher: WatcherId, tx: Sender<Value>, capacity: usize) -> Self {
        Self {
            watcher,
            tx,
            capacity,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The watcher this sink feeds.
    #[must_use]
    pub const fn watcher_id(&self) -> WatcherId {
        self.watcher
    }

    /// Non-blocking delivery of one event.
    ///
    /// # Errors
    ///
    /// `QueueFull` when the watcher is backed up, `Disconnected` when the
    /// watcher has stopped. Either way the event is counted as dropped.
    pub fn deliver(&self, event: impl Into<Value>) -> BindResult<()> {
        match self.tx.try_send(event.into()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(watcher = %self.watcher, capacity = self.capacity, "watcher event queue full, dropping event");
                Err(BindError::Execution(ExecutionError::QueueFull {
                    path: "watcher_events".to_string(),
                    capacity: self.capacity,
                }))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(BindError::Execution(ExecutionError::Disconnected {
                    path: "watcher_events".to_string(),
                }))
            }
        }
    }

    /// Events this sink (and its clones) failed to deliver.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle to a running watcher.
///
/// Clones share the same thread; the registry stores clones of this handle.
pub struct WatcherHandle<C> {
    id: WatcherId,
    owner: OwnerId,
    attribute: Arc<str>,
    sink: EventSink,
    control: Sender<ControlMsg<C>>,
    join: Arc<Mutex<Option<JoinHandle<WatcherExit>>>>,
}

impl<C> WatcherHandle<C> {
    pub(crate) fn new(
        id: WatcherId,
        owner: OwnerId,
        attribute: &str,
        sink: EventSink,
        control: Sender<ControlMsg<C>>,
    ) -> Self {
        Self {
            id,
            owner,
            attribute: Arc::from(attribute),
            sink,
            control,
            join: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn set_join_handle(&self, handle: JoinHandle<WatcherExit>) {
        if let Ok(mut guard) = self.join.lock() {
            *guard = Some(handle);
        }
    }

    #[must_use]
    pub const fn id(&self) -> WatcherId {
        self.id
    }

    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// A fresh sink feeding this watcher.
    #[must_use]
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Delivers an event directly, bypassing the external source.
    ///
    /// # Errors
    ///
    /// See [`EventSink::deliver`].
    pub fn send_event(&self, event: impl Into<Value>) -> BindResult<()> {
        self.sink.deliver(event)
    }

    /// Asks the watcher for its stored refresh rule.
    ///
    /// # Errors
    ///
    /// `Disconnected` if the watcher has stopped, `Timeout` if it does not
    /// answer in time.
    pub fn get_refresher(&self, timeout: Duration) -> BindResult<RefreshRule<C>> {
        let (reply_tx, reply_rx) = bounded::<RefreshRule<C>>(1);
        self.control
            .send_timeout(ControlMsg::GetRefresher { reply: reply_tx }, timeout)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => timeout_err(timeout),
                SendTimeoutError::Disconnected(_) => disconnected_err(),
            })?;

        reply_rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => timeout_err(timeout),
            RecvTimeoutError::Disconnected => disconnected_err(),
        })
    }

    /// Whether the watcher thread has exited (normally or not).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match self.join.lock() {
            Ok(guard) => guard.as_ref().map_or(true, JoinHandle::is_finished),
            Err(_) => true,
        }
    }

    /// Waits for the watcher thread to exit and reports why.
    ///
    /// Only the first caller across all clones gets the exit reason.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the thread was already joined.
    pub fn join(&self) -> BindResult<WatcherExit> {
        let handle = self
            .join
            .lock()
            .map_err(|_| BindError::internal("watcher join lock poisoned"))?
            .take()
            .ok_or_else(|| BindError::internal("watcher already joined"))?;

        Ok(handle.join().unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            WatcherExit::Panicked(reason)
        }))
    }
}

impl<C> Clone for WatcherHandle<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            owner: self.owner,
            attribute: Arc::clone(&self.attribute),
            sink: self.sink.clone(),
            control: self.control.clone(),
            join: Arc::clone(&self.join),
        }
    }
}

impl<C> fmt::Debug for WatcherHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}
