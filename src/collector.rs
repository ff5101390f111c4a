use std::borrow::Cow;

use tracing::error;

use crate::errors::{Message, SealErrorKind};

/// Ordered diagnostic accumulation for the configuration/sealing phase.
///
/// After sealing the collector is gone and further diagnostics are raised
/// synchronously on the calling thread as typed provision errors.
pub(crate) struct ErrorCollector {
    messages: Vec<Message>,
}

impl ErrorCollector {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self { messages: Vec::new() }
    }

    pub(crate) fn report(&mut self, source: impl Into<Cow<'static, str>>, text: impl Into<String>) {
        self.messages.push(Message {
            source: source.into(),
            text: text.into(),
        });
    }

    /// Raises the aggregate failure if anything was recorded.
    pub(crate) fn seal(self) -> Result<(), SealErrorKind> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let err = SealErrorKind { messages: self.messages };
        error!("{err}");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCollector;

    #[test]
    fn test_empty_collector_seals() {
        assert!(ErrorCollector::new().seal().is_ok());
    }

    #[test]
    fn test_messages_kept_in_order() {
        let mut collector = ErrorCollector::new();
        collector.report("module a", "first problem");
        collector.report("module b", "second problem");

        let err = collector.seal().unwrap_err();
        assert_eq!(err.messages.len(), 2);
        assert_eq!(err.messages[0].text, "first problem");
        assert_eq!(err.messages[1].source, "module b");

        let rendered = err.to_string();
        assert!(rendered.contains("2 error(s)"));
        assert!(rendered.find("first problem").unwrap() < rendered.find("second problem").unwrap());
    }
}
