use crate::bus::{Event, EventBus, NamedEvent, SubscriptionHandle};
use crate::error::EventBusError;
use crate::identity::ObserverId;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Derives the cache key for one subscription.
///
/// Concatenation order is `name`, subscriber token, sender token (when
/// present), separated by `:`. Tokens are fixed-width, so the key for
/// (name, subscriber) is a prefix of every key for (name, subscriber, sender)
/// and of nothing else.
fn subscription_key(name: &str, subscriber: ObserverId, sender: Option<ObserverId>) -> String {
    match sender {
        Some(sender) => format!("{name}:{subscriber}:{sender}"),
        None => format!("{name}:{subscriber}"),
    }
}

/// An explicitly-owned cache of live subscriptions, keyed by
/// (event name, subscriber identity, sender identity).
///
/// The registry wraps an [`EventBus`] and remembers every handle it creates,
/// so callers can tear registrations down by name instead of juggling raw
/// handles. It guarantees at most one live handle per key: re-registering
/// under an identical key unsubscribes the displaced handle first.
///
/// Clones share the same cache and bus; hand a clone to whatever component
/// needs subscription management instead of reaching for a hidden global.
/// All cache access is serialized internally, so the registry may be used
/// from any thread, including from inside delivery callbacks.
///
/// ### Example
/// ```rust
/// use event_observer::{EventBus, ObserverId, SubscriptionRegistry};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), event_observer::EventBusError> {
/// let registry = SubscriptionRegistry::new(EventBus::new());
/// let me = ObserverId::next();
///
/// registry.register(me, "user.login", None, |user: Arc<u64>| {
///     println!("user {user} logged in");
/// })?;
///
/// registry.bus().publish("user.login", 42u64);
/// registry.unregister(me, "user.login", None);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SubscriptionRegistry {
    bus: EventBus,
    cache: Arc<Mutex<FxHashMap<String, SubscriptionHandle>>>,
}

impl SubscriptionRegistry {
    /// Creates a registry managing subscriptions on `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { bus, cache: Arc::new(Mutex::new(FxHashMap::default())) }
    }

    /// The bus this registry manages subscriptions on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribes `handler` to `name` on behalf of `subscriber` and caches
    /// the resulting handle.
    ///
    /// If a subscription already exists for the same (name, subscriber,
    /// sender) key, it is unsubscribed from the bus and replaced. The new
    /// handle is returned for callers that also want to manage it directly.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidName`] if `name` is empty.
    pub fn register<T, F>(
        &self,
        subscriber: ObserverId,
        name: &str,
        sender: Option<ObserverId>,
        handler: F,
    ) -> Result<SubscriptionHandle, EventBusError>
    where
        T: Event,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe(name, sender, handler)?;
        let key = subscription_key(name, subscriber, sender);
        debug!("Register for notifications - {key}");

        let displaced = self.cache.lock().insert(key, handle);
        if let Some(old) = displaced {
            self.bus.unsubscribe(old);
        }
        Ok(handle)
    }

    /// Registers for the name declared by the event type itself.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidName`] if `T::NAME` is empty.
    pub fn register_named<T, F>(
        &self,
        subscriber: ObserverId,
        sender: Option<ObserverId>,
        handler: F,
    ) -> Result<SubscriptionHandle, EventBusError>
    where
        T: NamedEvent,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.register(subscriber, T::NAME, sender, handler)
    }

    /// Removes cached subscriptions of `subscriber` for `name`.
    ///
    /// With a sender, removes exactly the subscription under that key. With
    /// no sender, removes every subscription of `subscriber` for `name`
    /// regardless of sender (prefix match). Each removed handle is
    /// unsubscribed from the bus. Matching nothing is not an error.
    pub fn unregister(&self, subscriber: ObserverId, name: &str, sender: Option<ObserverId>) {
        if name.is_empty() {
            // An empty name would produce a prefix matching unrelated keys.
            trace!("Unregister with empty event name ignored");
            return;
        }

        let key = subscription_key(name, subscriber, sender);
        debug!("Unregister from notifications - {key}");

        let removed: Vec<SubscriptionHandle> = if sender.is_some() {
            self.cache.lock().remove(&key).into_iter().collect()
        } else {
            let mut cache = self.cache.lock();
            let matching: Vec<String> =
                cache.keys().filter(|k| k.starts_with(&key)).cloned().collect();
            matching.iter().filter_map(|k| cache.remove(k)).collect()
        };

        for handle in removed {
            self.bus.unsubscribe(handle);
        }
    }

    /// Removes subscriptions for the name declared by the event type itself.
    pub fn unregister_named<T: NamedEvent>(
        &self,
        subscriber: ObserverId,
        sender: Option<ObserverId>,
    ) {
        self.unregister(subscriber, T::NAME, sender);
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("bus", &self.bus)
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

/// The observer capability, attachable to any object with an identity.
///
/// Implementors supply [`observer_id`](Observer::observer_id); the provided
/// methods forward to a [`SubscriptionRegistry`] using that identity, so call
/// sites read like the object subscribing itself.
///
/// ### Example
/// ```rust
/// use event_observer::{EventBus, Observer, ObserverId, SubscriptionRegistry};
/// use std::sync::Arc;
///
/// struct SessionPanel {
///     id: ObserverId,
/// }
///
/// impl Observer for SessionPanel {
///     fn observer_id(&self) -> ObserverId {
///         self.id
///     }
/// }
///
/// # fn main() -> Result<(), event_observer::EventBusError> {
/// let registry = SubscriptionRegistry::new(EventBus::new());
/// let panel = SessionPanel { id: ObserverId::next() };
///
/// panel.register(&registry, "user.login", None, |user: Arc<u64>| {
///     let _ = user;
/// })?;
/// registry.bus().publish("user.login", 42u64);
/// panel.unregister(&registry, "user.login", None);
/// # Ok(())
/// # }
/// ```
pub trait Observer {
    /// The stable identity of this object, used in subscription keys.
    fn observer_id(&self) -> ObserverId;

    /// Registers a typed handler for `name`; see
    /// [`SubscriptionRegistry::register`].
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidName`] if `name` is empty.
    fn register<T, F>(
        &self,
        registry: &SubscriptionRegistry,
        name: &str,
        sender: Option<ObserverId>,
        handler: F,
    ) -> Result<SubscriptionHandle, EventBusError>
    where
        T: Event,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        registry.register(self.observer_id(), name, sender, handler)
    }

    /// Registers for the name declared by the event type itself.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidName`] if `T::NAME` is empty.
    fn register_named<T, F>(
        &self,
        registry: &SubscriptionRegistry,
        sender: Option<ObserverId>,
        handler: F,
    ) -> Result<SubscriptionHandle, EventBusError>
    where
        T: NamedEvent,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        registry.register_named(self.observer_id(), sender, handler)
    }

    /// Removes this object's subscriptions for `name`; see
    /// [`SubscriptionRegistry::unregister`].
    fn unregister(
        &self,
        registry: &SubscriptionRegistry,
        name: &str,
        sender: Option<ObserverId>,
    ) {
        registry.unregister(self.observer_id(), name, sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_concatenation_order() {
        let subscriber = ObserverId::from_raw(0x2a);
        let sender = ObserverId::from_raw(0x3b);

        assert_eq!(
            subscription_key("user.login", subscriber, None),
            "user.login:000000000000002a"
        );
        assert_eq!(
            subscription_key("user.login", subscriber, Some(sender)),
            "user.login:000000000000002a:000000000000003b"
        );
    }

    proptest! {
        #[test]
        fn sender_key_extends_senderless_prefix(name in "[a-z.]{1,20}", sub: u64, sender: u64) {
            let prefix = subscription_key(&name, ObserverId::from_raw(sub), None);
            let full = subscription_key(
                &name,
                ObserverId::from_raw(sub),
                Some(ObserverId::from_raw(sender)),
            );
            prop_assert!(full.starts_with(&prefix));
        }

        #[test]
        fn distinct_subscribers_never_collide(name in "[a-z.]{1,20}", a: u64, b: u64) {
            prop_assume!(a != b);
            let key_a = subscription_key(&name, ObserverId::from_raw(a), None);
            let key_b = subscription_key(&name, ObserverId::from_raw(b), None);
            prop_assert_ne!(&key_a, &key_b);
            // Fixed-width tokens: one subscriber's prefix never captures
            // another subscriber's sender-qualified keys.
            let qualified_b = subscription_key(
                &name,
                ObserverId::from_raw(b),
                Some(ObserverId::from_raw(a)),
            );
            prop_assert!(!qualified_b.starts_with(&key_a));
        }
    }
}
