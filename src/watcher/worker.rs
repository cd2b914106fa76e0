//! Watcher thread.
//!
//! Each binding on a connected owner gets one thread. It subscribes once,
//! then serially filters events and forwards refresh requests to the owner
//! inbox until the owner's lifeline closes.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::binding::{AttributeBinding, SubscribeFn};
use crate::config::WatcherConfig;
use crate::context::{AttributeContext, OwnerId};
use crate::error::{BindError, BindResult};
use crate::filter::Filter;
use crate::owner::{OwnerRef, RefreshRequest};
use crate::refresh::RefreshRule;
use crate::registry::NameRegistry;
use crate::value::Value;

use super::handle::{EventSink, WatcherExit, WatcherHandle, WatcherId};

pub(crate) enum ControlMsg<C> {
    GetRefresher { reply: Sender<RefreshRule<C>> },
}

/// Removes a watcher's registry entries when its thread ends, including
/// when it unwinds from a panic.
struct RegistrationGuard<C> {
    registry: Arc<NameRegistry<C>>,
    owner: OwnerId,
    keys: Vec<String>,
    watcher: WatcherId,
}

impl<C> Drop for RegistrationGuard<C> {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        if let Err(e) = self
            .registry
            .deregister_watcher(self.owner, &self.keys, self.watcher)
        {
            warn!(watcher = %self.watcher, owner = %self.owner, error = %e, "failed to release registry entries");
        }
    }
}

/// One attribute binding's background unit.
pub struct Watcher<C> {
    id: WatcherId,
    owner: OwnerRef<C>,
    attribute: String,
    filter: Filter,
    rule: RefreshRule<C>,
    sink: EventSink,
    events: Receiver<Value>,
    // Held so the control queue stays open while the thread runs.
    _control_tx: Sender<ControlMsg<C>>,
    control: Receiver<ControlMsg<C>>,
}

impl<C: AttributeContext> Watcher<C> {
    /// Starts a watcher for `binding` on behalf of `owner`.
    ///
    /// Keyed rules register one entry per key in `registry` before the thread
    /// starts, so a duplicate is reported here and nothing is spawned. The
    /// subscribe function then runs once on the new thread.
    ///
    /// # Errors
    ///
    /// `ValidationError::DuplicateBinding` if a key is already bound for this
    /// owner; an internal error if the OS refuses to spawn the thread.
    pub fn spawn(
        binding: AttributeBinding<C>,
        owner: OwnerRef<C>,
        registry: Arc<NameRegistry<C>>,
        cfg: &WatcherConfig,
    ) -> BindResult<WatcherHandle<C>> {
        let (attribute, subscribe, filter, rule) = binding.into_parts();
        let id = WatcherId::new();

        let event_capacity = cfg.event_queue_capacity.max(1);
        let (events_tx, events_rx) = bounded::<Value>(event_capacity);
        let (control_tx, control_rx) = bounded::<ControlMsg<C>>(cfg.control_queue_capacity.max(1));

        let sink = EventSink::new(id, events_tx, event_capacity);
        let handle = WatcherHandle::new(id, owner.id(), &attribute, sink.clone(), control_tx.clone());

        let keys: Vec<String> = rule.keys().map(str::to_string).collect();
        if !keys.is_empty() {
            registry.register_all(owner.id(), &keys, handle.clone())?;
        }
        let guard = RegistrationGuard {
            registry,
            owner: owner.id(),
            keys,
            watcher: id,
        };

        let thread_name = format!("{}-{}", cfg.thread_name_prefix, attribute);
        let watcher = Self {
            id,
            owner,
            attribute,
            filter,
            rule,
            sink,
            events: events_rx,
            _control_tx: control_tx,
            control: control_rx,
        };

        let join = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let _guard = guard;
                watcher.run(subscribe)
            })
            .map_err(|e| BindError::internal(format!("failed to spawn watcher thread: {e}")))?;

        handle.set_join_handle(join);
        Ok(handle)
    }

    fn run(self, subscribe: SubscribeFn) -> WatcherExit {
        let owner_id = self.owner.id();
        debug!(watcher = %self.id, owner = %owner_id, attribute = %self.attribute, "watcher started");

        if let Err(e) = subscribe(self.sink.clone()) {
            warn!(watcher = %self.id, owner = %owner_id, attribute = %self.attribute, error = %e, "subscribe failed, attribute will not refresh");
            return WatcherExit::SubscribeFailed(e.reason);
        }

        loop {
            select! {
                recv(self.owner.lifeline) -> _ => {
                    debug!(watcher = %self.id, owner = %owner_id, attribute = %self.attribute, "owner terminated, watcher stopping");
                    return WatcherExit::OwnerTerminated;
                }
                recv(self.control) -> msg => {
                    if let Ok(ControlMsg::GetRefresher { reply }) = msg {
                        let _ = reply.send(self.rule.clone());
                    }
                }
                recv(self.events) -> msg => {
                    let Ok(event) = msg else {
                        continue;
                    };

                    if !self.filter.matches(&event) {
                        trace!(watcher = %self.id, attribute = %self.attribute, event = %event, "event ignored");
                        continue;
                    }

                    trace!(watcher = %self.id, attribute = %self.attribute, event = %event, "event matched, requesting refresh");
                    let request = RefreshRequest::new(self.id, &self.attribute, self.rule.clone());
                    if self.owner.inbox.send(request).is_err() {
                        debug!(watcher = %self.id, owner = %owner_id, attribute = %self.attribute, "owner inbox closed, watcher stopping");
                        return WatcherExit::OwnerTerminated;
                    }
                }
            }
        }
    }
}
