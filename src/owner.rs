//! Session owner.
//!
//! An `Owner` wraps a host context and drives its bindings from a single
//! thread: it attaches bindings, applies refresh requests in inbox order, and
//! runs forced refreshes. Dropping or terminating the owner closes its
//! lifeline, which is the only signal that stops its watchers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::binding::AttributeBinding;
use crate::config::OwnerConfig;
use crate::context::{AttributeContext, OwnerId};
use crate::error::{BindError, BindResult, ExecutionError};
use crate::refresh::RefreshRule;
use crate::registry::NameRegistry;
use crate::watcher::{Watcher, WatcherHandle, WatcherId};

/// A watcher asking its owner to re-run a refresh rule.
pub struct RefreshRequest<C> {
    pub watcher: WatcherId,
    pub attribute: String,
    pub rule: RefreshRule<C>,
    pub issued_at: DateTime<Utc>,
}

impl<C> RefreshRequest<C> {
    pub(crate) fn new(watcher: WatcherId, attribute: &str, rule: RefreshRule<C>) -> Self {
        Self {
            watcher,
            attribute: attribute.to_string(),
            rule,
            issued_at: Utc::now(),
        }
    }
}

impl<C> fmt::Debug for RefreshRequest<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("watcher", &self.watcher)
            .field("attribute", &self.attribute)
            .field("rule", &self.rule)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// What a watcher holds on to its owner: the inbox to send refresh requests
/// to, and the lifeline whose closure means the owner is gone.
pub struct OwnerRef<C> {
    id: OwnerId,
    pub(crate) inbox: Sender<RefreshRequest<C>>,
    pub(crate) lifeline: Receiver<()>,
}

impl<C> OwnerRef<C> {
    #[must_use]
    pub const fn id(&self) -> OwnerId {
        self.id
    }
}

impl<C> Clone for OwnerRef<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inbox: self.inbox.clone(),
            lifeline: self.lifeline.clone(),
        }
    }
}

impl<C> fmt::Debug for OwnerRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerRef").field("id", &self.id).finish_non_exhaustive()
    }
}

/// A session that owns attribute bindings.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use livebind::{Assigns, AttributeBinding, NameRegistry, Owner, RefreshRule, Value};
///
/// let registry = Arc::new(NameRegistry::new());
/// let mut owner = Owner::new(Assigns::new(), registry);
///
/// let binding = AttributeBinding::builder()
///     .subscribe(|_sink| Ok(()))
///     .refresh(RefreshRule::constant("count", || Value::Int(5))?)
///     .build()?;
///
/// // Not connected: the rule runs once and no watcher is started.
/// assert!(owner.attach(binding)?.is_none());
/// assert_eq!(owner.context().get("count"), Some(&Value::Int(5)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Owner<C: AttributeContext> {
    id: OwnerId,
    context: C,
    cfg: OwnerConfig,
    registry: Arc<NameRegistry<C>>,
    inbox_tx: Sender<RefreshRequest<C>>,
    inbox_rx: Receiver<RefreshRequest<C>>,
    // Never sent on; dropping it is the termination signal.
    _lifeline: Sender<()>,
    lifeline_rx: Receiver<()>,
    watchers: Vec<WatcherHandle<C>>,
}

impl<C: AttributeContext> Owner<C> {
    pub fn new(context: C, registry: Arc<NameRegistry<C>>) -> Self {
        Self::with_config(context, registry, OwnerConfig::default())
    }

    pub fn with_config(context: C, registry: Arc<NameRegistry<C>>, cfg: OwnerConfig) -> Self {
        let (inbox_tx, inbox_rx) = bounded(cfg.inbox_capacity.max(1));
        let (lifeline, lifeline_rx) = bounded(1);
        Self {
            id: OwnerId::new(),
            context,
            cfg,
            registry,
            inbox_tx,
            inbox_rx,
            _lifeline: lifeline,
            lifeline_rx,
            watchers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> OwnerId {
        self.id
    }

    #[must_use]
    pub const fn context(&self) -> &C {
        &self.context
    }

    #[must_use]
    pub const fn config(&self) -> &OwnerConfig {
        &self.cfg
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<NameRegistry<C>> {
        &self.registry
    }

    /// Watchers started by [`Owner::attach`], in attach order.
    #[must_use]
    pub fn watchers(&self) -> &[WatcherHandle<C>] {
        &self.watchers
    }

    /// A reference watchers can observe, e.g. to re-spawn one under host
    /// supervision.
    #[must_use]
    pub fn owner_ref(&self) -> OwnerRef<C> {
        OwnerRef {
            id: self.id,
            inbox: self.inbox_tx.clone(),
            lifeline: self.lifeline_rx.clone(),
        }
    }

    /// Attaches a binding.
    ///
    /// The refresh rule is applied once immediately. If the context reports
    /// itself connected, a watcher is also started and returned; otherwise no
    /// subscription is made.
    ///
    /// # Errors
    ///
    /// `ValidationError::DuplicateBinding` if one of the rule's keys is
    /// already bound for this owner. The context is left untouched.
    pub fn attach(&mut self, binding: AttributeBinding<C>) -> BindResult<Option<WatcherHandle<C>>> {
        let rule = binding.rule().clone();

        let handle = if self.context.is_connected() {
            let handle = Watcher::spawn(
                binding,
                self.owner_ref(),
                Arc::clone(&self.registry),
                &self.cfg.watcher,
            )?;
            self.watchers.push(handle.clone());
            Some(handle)
        } else {
            debug!(owner = %self.id, attribute = %binding.name(), "owner not connected, applying once without watcher");
            None
        };

        self.apply(&rule);
        Ok(handle)
    }

    /// Applies one refresh request to the context.
    pub fn handle_refresh(&mut self, request: RefreshRequest<C>) {
        trace!(owner = %self.id, watcher = %request.watcher, attribute = %request.attribute, "applying refresh request");
        self.apply(&request.rule);
    }

    /// Applies every refresh request already queued, in arrival order.
    /// Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(request) = self.inbox_rx.try_recv() {
            self.handle_refresh(request);
            applied += 1;
        }
        applied
    }

    /// Waits for the next refresh request and applies it. Returns the name of
    /// the refreshed attribute.
    ///
    /// # Errors
    ///
    /// `ExecutionError::Timeout` if nothing arrives in time.
    pub fn process_next(&mut self, timeout: Duration) -> BindResult<String> {
        let request = self.inbox_rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => BindError::Execution(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => BindError::Execution(ExecutionError::Disconnected {
                path: "owner_inbox".to_string(),
            }),
        })?;
        let attribute = request.attribute.clone();
        self.handle_refresh(request);
        Ok(attribute)
    }

    /// Re-runs the refresh rule bound to `name` right now, without waiting
    /// for an event.
    ///
    /// The rule is fetched from the watcher but applied here, on the owner's
    /// own thread.
    ///
    /// # Errors
    ///
    /// `ExecutionError::BindingNotFound` if `name` is not bound for this
    /// owner; `Disconnected` or `Timeout` if the watcher cannot answer.
    pub fn refresh(&mut self, name: &str) -> BindResult<()> {
        let handle = self.registry.lookup(self.id, name)?;
        let rule = handle.get_refresher(self.cfg.watcher.refresher_timeout())?;
        debug!(owner = %self.id, watcher = %handle.id(), attribute = %name, "forced refresh");
        self.apply(&rule);
        Ok(())
    }

    /// Ends the session and returns its final context. Watchers observe the
    /// closed lifeline and stop on their own.
    pub fn terminate(self) -> C {
        debug!(owner = %self.id, watchers = self.watchers.len(), "owner terminated");
        self.context
    }

    fn apply(&mut self, rule: &RefreshRule<C>) {
        let current = self.context.clone();
        self.context = rule.apply(current);
    }
}

impl<C: AttributeContext + fmt::Debug> fmt::Debug for Owner<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("watchers", &self.watchers.len())
            .finish_non_exhaustive()
    }
}
