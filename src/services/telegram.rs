//! Telegram Bot API notifier

use async_trait::async_trait;
use serde_json::json;

use crate::config::TelegramConfig;
use crate::services::reminder::{Button, Notifier};

#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
        }
    }
}

/// `sendMessage` payload; buttons go on a single inline keyboard row
pub fn message_payload(chat_id: &str, text: &str, buttons: &[Button]) -> serde_json::Value {
    let mut payload = json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "HTML",
        "disable_web_page_preview": true,
    });
    if !buttons.is_empty() {
        let row: Vec<_> = buttons
            .iter()
            .map(|b| json!({ "text": b.text, "url": b.url }))
            .collect();
        payload["reply_markup"] = json!({ "inline_keyboard": [row] });
    }
    payload
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: &str, text: &str, buttons: &[Button]) -> bool {
        let payload = message_payload(chat_id, text, buttons);
        match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!("Telegram sendMessage failed ({}): {}", status, body);
                false
            }
            Err(e) => {
                tracing::warn!("Telegram sendMessage error: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_without_buttons() {
        let payload = message_payload("-100", "hi", &[]);
        assert_eq!(payload["chat_id"], "-100");
        assert_eq!(payload["parse_mode"], "HTML");
        assert!(payload.get("reply_markup").is_none());
    }

    #[test]
    fn test_payload_buttons_on_one_row() {
        let buttons = vec![
            Button::new("Mulai Maintenance", "http://app/form"),
            Button::new("Lihat Jadwal", "http://app/user/jadwal"),
        ];
        let payload = message_payload("-100", "hi", &buttons);
        let rows = payload["reply_markup"]["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1]["url"], "http://app/user/jadwal");
    }
}
