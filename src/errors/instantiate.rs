use std::borrow::Cow;

/// Failure raised by a user-supplied factory.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("{0}")]
    Message(Cow<'static, str>),
    #[error(transparent)]
    Custom(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl InstantiateErrorKind {
    #[inline]
    #[must_use]
    pub fn msg(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Message(message.into())
    }
}
