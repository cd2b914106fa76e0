//! Attribute watchers.
//!
//! A watcher is the independent unit behind one binding: it owns the
//! subscription, filter and refresh rule, and asks its owner to refresh when a
//! relevant event arrives. The owner is never notified when a watcher dies;
//! hosts that want supervision poll [`WatcherHandle::is_finished`] or
//! [`WatcherHandle::join`].

/// Handles, sinks and identifiers.
pub mod handle;
/// Watcher thread.
pub mod worker;

pub use handle::{EventSink, WatcherExit, WatcherHandle, WatcherId};
pub use worker::Watcher;
