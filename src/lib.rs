//! # livebind - event-driven attribute bindings
//!
//! livebind keeps derived values on a long-lived session ("owner") fresh in
//! response to asynchronous events. Each attribute binding gets its own
//! watcher thread that subscribes to an event source, filters what arrives,
//! and asks the owner to re-run the binding's refresh rule.
//!
//! ## Core Concepts
//!
//! - **Owner**: the session state plus an ordered inbox of refresh requests
//! - **AttributeBinding**: subscribe function, filter and refresh rule
//! - **Filter**: structural predicate over event values
//! - **RefreshRule**: ordered `(key, producer)` pairs or a whole-context transform
//! - **NameRegistry**: `(owner, name)` lookup used by forced refresh
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use livebind::{Assigns, AttributeBinding, Filter, NameRegistry, Owner, RefreshRule, Value};
//!
//! let registry = Arc::new(NameRegistry::new());
//! let mut owner = Owner::new(Assigns::connected(), registry);
//!
//! let binding = AttributeBinding::builder()
//!     .subscribe(move |sink| bus.subscribe("orders", sink))
//!     .filter(Filter::sequence([Filter::literal("order_created"), Filter::Wildcard]))
//!     .refresh(RefreshRule::keyed().from_context("orders", load_orders).build()?)
//!     .build()?;
//!
//! owner.attach(binding)?;
//! owner.process_next(Duration::from_secs(1))?;
//! owner.refresh("orders")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod binding;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod owner;
pub mod refresh;
pub mod registry;
pub mod value;
pub mod watcher;

// Re-export primary types at crate root for convenience
pub use binding::{AttributeBinding, AttributeBindingBuilder, SubscribeFn};
pub use config::{OwnerConfig, WatcherConfig};
pub use context::{Assigns, AttributeContext, OwnerId};
pub use error::{BindError, BindResult, ExecutionError, SubscribeError, ValidationError};
pub use filter::{matches, Filter, PredicateFn};
pub use owner::{Owner, OwnerRef, RefreshRequest};
pub use refresh::{KeyedRuleBuilder, Producer, RefreshRule};
pub use registry::NameRegistry;
pub use value::Value;
pub use watcher::{EventSink, Watcher, WatcherExit, WatcherHandle, WatcherId};
