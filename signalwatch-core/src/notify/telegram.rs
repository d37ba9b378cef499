//! Telegram Bot API `sendMessage` adapter.

use std::time::Duration;

use super::{Notifier, NotifyError};

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Longest response body kept in an error.
const MAX_ERROR_BODY: usize = 500;

pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    api_base: String,
    token: String,
    chat_ids: Vec<String>,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_ids: Vec<String>) -> Result<Self, NotifyError> {
        Self::with_api_base(TELEGRAM_API, token, chat_ids)
    }

    pub fn with_api_base(
        api_base: &str,
        token: &str,
        chat_ids: Vec<String>,
    ) -> Result<Self, NotifyError> {
        if token.trim().is_empty() {
            return Err(NotifyError::NotConfigured("empty bot token".into()));
        }
        if chat_ids.is_empty() {
            return Err(NotifyError::NotConfigured("no chat ids".into()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            chat_ids,
        })
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    fn send_one(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let form = [
            ("chat_id", chat_id),
            ("text", text),
            ("parse_mode", "Markdown"),
            ("disable_web_page_preview", "true"),
        ];
        let resp = self
            .client
            .post(self.send_url())
            .form(&form)
            .send()
            // The error text embeds the URL, which carries the token.
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let mut body = resp.text().unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Sends to every chat. Fails if any chat rejects the message.
    fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let mut delivered = 0;
        let mut last_error = None;
        for chat_id in &self.chat_ids {
            match self.send_one(chat_id, text) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "telegram delivery failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            None => Ok(()),
            Some(e) if delivered == 0 => Err(e),
            Some(e) => Err(NotifyError::Partial {
                delivered,
                total: self.chat_ids.len(),
                last: Box::new(e),
            }),
        }
    }
}
