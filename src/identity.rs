use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// A stable identity token for a subscribing or sending object.
///
/// Ids are minted from a process-wide monotonic counter, never from a memory
/// address, so a dropped object's id is never reissued to a new one and stale
/// cache keys cannot collide with live registrations.
///
/// The [`Display`](fmt::Display) form is a fixed-width (16 hex digit) token;
/// subscription keys concatenate these tokens, and the fixed width keeps the
/// boundary between adjacent tokens unambiguous.
///
/// ### Example
/// ```rust
/// use event_observer::ObserverId;
///
/// let a = ObserverId::next();
/// let b = ObserverId::next();
/// assert_ne!(a, b);
/// assert_eq!(a.to_string().len(), 16);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Mints a fresh id, distinct from every id issued before it.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
