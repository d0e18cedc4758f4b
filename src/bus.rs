use crate::error::EventBusError;
use crate::identity::ObserverId;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Marker trait for values that can travel through the [`EventBus`] as
/// payloads.
///
/// Any type that is `Send + Sync + 'static` automatically implements this
/// trait.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

/// An event type that declares its own canonical event name.
///
/// Types implementing this trait can be published by value alone via
/// [`EventBus::publish_named`], without repeating the name at every call
/// site.
///
/// ### Example
/// ```rust
/// use event_observer::NamedEvent;
///
/// #[derive(Clone, Debug)]
/// struct UserLoggedIn { user: u64 }
///
/// impl NamedEvent for UserLoggedIn {
///     const NAME: &'static str = "user.login";
/// }
/// ```
pub trait NamedEvent: Event {
    /// The event name this type is published under.
    const NAME: &'static str;
}

/// Opaque token representing one active bus subscription.
///
/// Returned by [`EventBus::subscribe`]; pass it back to
/// [`EventBus::unsubscribe`] to remove the registration. Handles are `Copy`
/// and remain valid (as inert tokens) after removal; unsubscribing twice is a
/// no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type Payload = Arc<dyn Any + Send + Sync>;

struct BusSubscription {
    handle: SubscriptionHandle,
    sender: Option<ObserverId>,
    deliver: Arc<dyn Fn(&Payload) + Send + Sync>,
}

impl BusSubscription {
    fn matches(&self, sender: Option<ObserverId>) -> bool {
        self.sender.is_none() || self.sender == sender
    }
}

#[derive(Default)]
struct BusInner {
    subscriptions: RwLock<FxHashMap<String, Vec<BusSubscription>>>,
    next_handle: AtomicU64,
}

/// A process-wide, thread-safe broadcast bus for named events.
///
/// Subscriptions are indexed by event name; each one carries a typed callback
/// and an optional sender filter. Publishing delivers the payload
/// synchronously, on the publishing thread, to every matching subscription.
/// A payload whose type does not match a callback's expected type is silently
/// skipped for that callback.
///
/// The bus is cheaply clonable (internally `Arc`-backed); clones share the
/// same subscription table.
///
/// ### Example
/// ```rust
/// use event_observer::EventBus;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// # fn main() -> Result<(), event_observer::EventBusError> {
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicU64::new(0));
///
/// let sink = seen.clone();
/// bus.subscribe("user.login", None, move |user: Arc<u64>| {
///     sink.store(*user, Ordering::Relaxed);
/// })?;
///
/// assert_eq!(bus.publish("user.login", 42u64), 1);
/// assert_eq!(seen.load(Ordering::Relaxed), 42);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a new, empty `EventBus`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` to fire whenever `name` is published with a
    /// payload of type `T`.
    ///
    /// If `sender` is provided, only publishes tagged with that exact sender
    /// reach this subscription; untagged publishes never do. A delivery whose
    /// payload is not a `T` skips the callback silently.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidName`] if `name` is empty.
    pub fn subscribe<T, F>(
        &self,
        name: &str,
        sender: Option<ObserverId>,
        callback: F,
    ) -> Result<SubscriptionHandle, EventBusError>
    where
        T: Event,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(EventBusError::invalid_name("subscribe"));
        }

        let handle = SubscriptionHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        let deliver = Arc::new(move |payload: &Payload| match payload.clone().downcast::<T>() {
            Ok(event) => callback(event),
            Err(_) => {
                trace!(
                    expected = std::any::type_name::<T>(),
                    "Payload type mismatch; handler skipped"
                );
            },
        });

        self.inner
            .subscriptions
            .write()
            .entry(name.to_owned())
            .or_default()
            .push(BusSubscription { handle, sender, deliver });

        Ok(handle)
    }

    /// Publishes an untagged event to all subscriptions for `name` that carry
    /// no sender filter.
    ///
    /// Returns the number of callbacks invoked. Zero matching subscriptions
    /// is not an error.
    pub fn publish<T: Event>(&self, name: &str, payload: T) -> usize {
        self.dispatch(name, None, Arc::new(payload))
    }

    /// Publishes an event tagged with `sender`, reaching subscriptions that
    /// either filter on that sender or carry no filter at all.
    ///
    /// Returns the number of callbacks invoked.
    pub fn publish_from<T: Event>(&self, name: &str, sender: ObserverId, payload: T) -> usize {
        self.dispatch(name, Some(sender), Arc::new(payload))
    }

    /// Publishes an event under the name its type declares.
    ///
    /// ### Example
    /// ```rust
    /// use event_observer::{EventBus, NamedEvent};
    ///
    /// #[derive(Clone, Debug)]
    /// struct Heartbeat;
    ///
    /// impl NamedEvent for Heartbeat {
    ///     const NAME: &'static str = "system.heartbeat";
    /// }
    ///
    /// let bus = EventBus::new();
    /// assert_eq!(bus.publish_named(Heartbeat), 0);
    /// ```
    pub fn publish_named<T: NamedEvent>(&self, event: T) -> usize {
        self.publish(T::NAME, event)
    }

    /// Removes the subscription identified by `handle`.
    ///
    /// Idempotent: unsubscribing a handle that was already removed (or never
    /// existed) is a no-op.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut subscriptions = self.inner.subscriptions.write();
        for subs in subscriptions.values_mut() {
            subs.retain(|sub| sub.handle != handle);
        }
        subscriptions.retain(|_, subs| !subs.is_empty());
    }

    fn dispatch(&self, name: &str, sender: Option<ObserverId>, payload: Payload) -> usize {
        // Collect matches under the read lock, invoke after releasing it, so
        // handlers may re-enter the bus without deadlocking.
        let matched: Vec<Arc<dyn Fn(&Payload) + Send + Sync>> = {
            let subscriptions = self.inner.subscriptions.read();
            subscriptions.get(name).map_or_else(Vec::new, |subs| {
                subs.iter().filter(|sub| sub.matches(sender)).map(|sub| sub.deliver.clone()).collect()
            })
        };

        if matched.is_empty() {
            trace!(event = name, "Event dropped: no matching subscribers");
            return 0;
        }

        for deliver in &matched {
            deliver(&payload);
        }
        trace!(event = name, count = matched.len(), "Event dispatched");
        matched.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions = self.inner.subscriptions.read();
        let subscribers: usize = subscriptions.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("events", &subscriptions.len())
            .field("subscriptions", &subscribers)
            .finish()
    }
}
