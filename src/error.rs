use std::borrow::Cow;

/// Errors that can occur during event bus operations.
///
/// The taxonomy is deliberately minimal: payload type mismatches and
/// unregister misses are silent no-ops, not errors.
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// The event name is empty. Subscription keys are derived from the name,
    /// so an empty name is rejected up front.
    #[error("Invalid event name{}: {message}", format_context(.context))]
    InvalidName { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl EventBusError {
    pub(crate) fn invalid_name(context: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidName {
            message: "event name must not be empty".into(),
            context: Some(context.into()),
        }
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
