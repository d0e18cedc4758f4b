//! # Event Observer
//!
//! A thin, type-safe observer layer over a named-event broadcast bus.
//!
//! ## Overview
//!
//! Provides an in-process [`EventBus`] delivering named events with
//! arbitrarily-typed payloads, and a [`SubscriptionRegistry`] that caches the
//! resulting subscription handles keyed by (event name, subscriber identity,
//! sender identity) so objects can register typed callbacks and tear them
//! down by name instead of managing raw handles.
//!
//! ## Features
//!
//! * **Type-Safe**: handlers declare a payload type; mismatched payloads are
//!   skipped silently, never delivered mis-typed.
//! * **Identity-keyed**: subscriptions are keyed by stable [`ObserverId`]
//!   tokens, never by memory addresses.
//! * **Replace-on-register**: re-registering under the same key unsubscribes
//!   the displaced handle, so nothing leaks.
//! * **Thread-safe**: `FxHashMap` + `parking_lot` locks around all shared
//!   state; publish and register/unregister may race freely.
//! * **Injectable**: the registry is an owned value you pass around, not a
//!   hidden global.
//!
//! # Example
//!
//! ```rust
//! use event_observer::{EventBus, Observer, ObserverId, SubscriptionRegistry};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct LoginScreen {
//!     id: ObserverId,
//!     last_user: Arc<AtomicU64>,
//! }
//!
//! impl Observer for LoginScreen {
//!     fn observer_id(&self) -> ObserverId {
//!         self.id
//!     }
//! }
//!
//! fn main() -> Result<(), event_observer::EventBusError> {
//!     let registry = SubscriptionRegistry::new(EventBus::new());
//!     let screen = LoginScreen { id: ObserverId::next(), last_user: Arc::default() };
//!
//!     let sink = screen.last_user.clone();
//!     screen.register(&registry, "user.login", None, move |user: Arc<u64>| {
//!         sink.store(*user, Ordering::Relaxed);
//!     })?;
//!
//!     registry.bus().publish("user.login", 42u64);
//!     assert_eq!(screen.last_user.load(Ordering::Relaxed), 42);
//!
//!     // Wrong payload type: the handler is skipped, not an error.
//!     registry.bus().publish("user.login", "oops");
//!     assert_eq!(screen.last_user.load(Ordering::Relaxed), 42);
//!
//!     screen.unregister(&registry, "user.login", None);
//!     assert_eq!(registry.bus().publish("user.login", 7u64), 0);
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod identity;
mod observer;

pub use bus::{Event, EventBus, NamedEvent, SubscriptionHandle};
pub use error::EventBusError;
pub use identity::ObserverId;
pub use observer::{Observer, SubscriptionRegistry};
