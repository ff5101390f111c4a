use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

/// One diagnostic collected during configuration or sealing.
#[derive(Debug, Clone)]
pub struct Message {
    pub source: Cow<'static, str>,
    pub text: String,
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.text, self.source)
    }
}

/// Aggregate sealing failure: every diagnostic recorded during
/// configuration, in the order it was recorded.
#[derive(thiserror::Error, Debug)]
pub struct SealErrorKind {
    pub messages: Vec<Message>,
}

impl Display for SealErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Container configuration failed with {} error(s):", self.messages.len())?;
        for (ix, message) in self.messages.iter().enumerate() {
            writeln!(f, "{}) {message}", ix + 1)?;
        }
        Ok(())
    }
}
