//! Name registry for forced refresh.
//!
//! Maps `(owner, attribute name)` to the watcher responsible for it. Only
//! keyed refresh rules have names, so only their watchers appear here. Every
//! operation takes the lock once, which makes each one atomic.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::context::OwnerId;
use crate::error::{BindError, BindResult, ExecutionError, ValidationError};
use crate::watcher::{WatcherHandle, WatcherId};

fn lock_err(op: &str) -> BindError {
    BindError::internal(format!("name registry lock poisoned during {op}"))
}

/// Concurrent `(OwnerId, name)` → watcher map, shared by all owners.
pub struct NameRegistry<C> {
    entries: RwLock<HashMap<(OwnerId, String), WatcherHandle<C>>>,
}

impl<C> NameRegistry<C> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Binds `name` to `handle` for `owner`.
    ///
    /// # Errors
    ///
    /// `ValidationError::DuplicateBinding` if the name is already bound.
    pub fn register(&self, owner: OwnerId, name: &str, handle: WatcherHandle<C>) -> BindResult<()> {
        self.register_all(owner, &[name], handle)
    }

    /// Binds every name to `handle`, or none of them.
    ///
    /// # Errors
    ///
    /// `ValidationError::DuplicateBinding` naming the first key already bound.
    pub fn register_all<S: AsRef<str>>(
        &self,
        owner: OwnerId,
        names: &[S],
        handle: WatcherHandle<C>,
    ) -> BindResult<()> {
        let mut entries = self.entries.write().map_err(|_| lock_err("register"))?;

        for name in names {
            let name = name.as_ref();
            if entries.contains_key(&(owner, name.to_string())) {
                return Err(ValidationError::DuplicateBinding {
                    owner,
                    name: name.to_string(),
                }
                .into());
            }
        }

        for name in names {
            entries.insert((owner, name.as_ref().to_string()), handle.clone());
        }
        Ok(())
    }

    /// Resolves the watcher bound to `name` for `owner`.
    ///
    /// # Errors
    ///
    /// `ExecutionError::BindingNotFound` if nothing is bound.
    pub fn lookup(&self, owner: OwnerId, name: &str) -> BindResult<WatcherHandle<C>> {
        let entries = self.entries.read().map_err(|_| lock_err("lookup"))?;
        entries
            .get(&(owner, name.to_string()))
            .cloned()
            .ok_or_else(|| {
                ExecutionError::BindingNotFound {
                    owner,
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Removes the entry for `name`, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn deregister(&self, owner: OwnerId, name: &str) -> BindResult<Option<WatcherHandle<C>>> {
        let mut entries = self.entries.write().map_err(|_| lock_err("deregister"))?;
        Ok(entries.remove(&(owner, name.to_string())))
    }

    /// Removes the entries for `names` that still point at `watcher`.
    ///
    /// Entries rebound to another watcher in the meantime are left alone.
    /// Returns how many entries were removed.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn deregister_watcher<S: AsRef<str>>(
        &self,
        owner: OwnerId,
        names: &[S],
        watcher: WatcherId,
    ) -> BindResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| lock_err("deregister_watcher"))?;

        let mut removed = 0;
        for name in names {
            let key = (owner, name.as_ref().to_string());
            if entries.get(&key).is_some_and(|h| h.id() == watcher) {
                entries.remove(&key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Names currently bound for `owner`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn names_for(&self, owner: OwnerId) -> BindResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| lock_err("names_for"))?;
        let mut names: Vec<String> = entries
            .keys()
            .filter(|(o, _)| *o == owner)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C> Default for NameRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for NameRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Assigns;
    use crate::watcher::handle::EventSink;
    use crate::watcher::worker::ControlMsg;

    use crossbeam_channel::bounded;

    fn detached_handle(owner: OwnerId, attribute: &str) -> WatcherHandle<Assigns> {
        let id = WatcherId::new();
        let (events_tx, _events_rx) = bounded(1);
        let (control_tx, _control_rx) = bounded::<ControlMsg<Assigns>>(1);
        WatcherHandle::new(id, owner, attribute, EventSink::new(id, events_tx, 1), control_tx)
    }

    #[test]
    fn register_then_lookup() {
        let registry = NameRegistry::new();
        let owner = OwnerId::new();
        let handle = detached_handle(owner, "count");

        registry.register(owner, "count", handle.clone()).unwrap();
        assert_eq!(registry.lookup(owner, "count").unwrap().id(), handle.id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_miss_is_not_found() {
        let registry = NameRegistry::<Assigns>::new();
        let err = registry.lookup(OwnerId::new(), "missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn duplicate_is_rejected_without_overwrite() {
        let registry = NameRegistry::new();
        let owner = OwnerId::new();
        let first = detached_handle(owner, "count");
        let second = detached_handle(owner, "count");

        registry.register(owner, "count", first.clone()).unwrap();
        let err = registry.register(owner, "count", second).unwrap_err();
        assert!(matches!(
            err,
            BindError::Validation(ValidationError::DuplicateBinding { ref name, .. }) if name == "count"
        ));
        assert_eq!(registry.lookup(owner, "count").unwrap().id(), first.id());
    }

    #[test]
    fn same_name_under_different_owners() {
        let registry = NameRegistry::new();
        let a = OwnerId::new();
        let b = OwnerId::new();
        registry.register(a, "count", detached_handle(a, "count")).unwrap();
        registry.register(b, "count", detached_handle(b, "count")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn register_all_is_all_or_nothing() {
        let registry = NameRegistry::new();
        let owner = OwnerId::new();
        registry.register(owner, "b", detached_handle(owner, "b")).unwrap();

        let err = registry
            .register_all(owner, &["a", "b", "c"], detached_handle(owner, "a+b+c"))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(registry.names_for(owner).unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn deregister_watcher_skips_rebound_entries() {
        let registry = NameRegistry::new();
        let owner = OwnerId::new();
        let old = detached_handle(owner, "x+y");
        registry.register_all(owner, &["x", "y"], old.clone()).unwrap();

        // "y" is released and rebound to a newer watcher.
        registry.deregister(owner, "y").unwrap();
        let newer = detached_handle(owner, "y");
        registry.register(owner, "y", newer.clone()).unwrap();

        let removed = registry.deregister_watcher(owner, &["x", "y"], old.id()).unwrap();
        assert_eq!(removed, 1);
        assert!(registry.lookup(owner, "x").is_err());
        assert_eq!(registry.lookup(owner, "y").unwrap().id(), newer.id());
    }
}
