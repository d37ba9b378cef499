//! Outbound notifications.
//!
//! The monitor only needs "deliver this text". [`TelegramNotifier`] talks to
//! the Bot API; [`LogNotifier`] writes to the log and is used in dry runs or
//! when Telegram is not configured.

pub mod telegram;

use thiserror::Error;

pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier not configured: {0}")]
    NotConfigured(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("delivered to {delivered} of {total} chats; last error: {last}")]
    Partial {
        delivered: usize,
        total: usize,
        last: Box<NotifyError>,
    },
}

pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// Writes every message to the log at info level. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "signalwatch::notify", "\n{text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify("hello").is_ok());
        assert_eq!(LogNotifier.name(), "log");
    }

    #[test]
    fn partial_error_names_counts() {
        let e = NotifyError::Partial {
            delivered: 1,
            total: 2,
            last: Box::new(NotifyError::Rejected {
                status: 400,
                body: "chat not found".into(),
            }),
        };
        assert_eq!(
            e.to_string(),
            "delivered to 1 of 2 chats; last error: rejected with HTTP 400: chat not found"
        );
    }
}
