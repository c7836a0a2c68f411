//! Telegram Bot API client used for both sending and long polling.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::info;
use reqwest::Client;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::dispatch::Messenger;
use crate::dispatch::error::SendError;

/// Messages per second allowed before the client throttles itself.
const SEND_RATE: u32 = 25;

/// Must comfortably outlive a held long poll.
const HTTP_TIMEOUT: Duration = Duration::from_secs(50);

pub struct TelegramApi {
    client: Client,
    api_url: String,
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct GetUpdatesPayload {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramApi {
    pub fn new(token: &str) -> Self {
        Self::with_api_url(format!("https://api.telegram.org/bot{token}"))
    }

    /// Points the client at a custom API base. Used to talk to test servers.
    pub fn with_api_url(api_url: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("cita-bot/0.3"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create client");

        let limiter = RateLimiter::direct(Quota::per_second(NonZeroU32::new(SEND_RATE).unwrap()));

        Self {
            client,
            api_url,
            limiter,
        }
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        let payload = SendMessagePayload {
            chat_id,
            text,
            disable_web_page_preview: true,
        };
        self.call("sendMessage", &payload).await?;
        Ok(())
    }

    /// Long-polls for incoming updates, holding for up to `timeout_secs`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, SendError> {
        let payload = GetUpdatesPayload {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message"],
        };
        let result = self.call("getUpdates", &payload).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn call<P>(&self, method: &str, payload: &P) -> Result<Value, SendError>
    where
        P: Serialize + ?Sized,
    {
        if self.limiter.check().is_err() {
            info!("Ratelimited! Waiting until ready...");
        }
        self.limiter.until_ready().await;

        // The URL embeds the bot token, so never log it.
        debug!("Calling Telegram method {method}");
        let response = self
            .client
            .post(format!("{}/{method}", self.api_url))
            .json(payload)
            .send()
            .await?;
        let body = response.text().await?;
        let mut parsed: Value = serde_json::from_str(&body)?;

        if parsed["ok"].as_bool().unwrap_or(false) {
            return Ok(parsed["result"].take());
        }

        let code = parsed["error_code"].as_i64().unwrap_or_default();
        if code == 429 {
            let retry_after = parsed["parameters"]["retry_after"].as_u64().unwrap_or(1);
            return Err(SendError::RateLimited { retry_after });
        }
        Err(SendError::Api {
            code,
            description: parsed["description"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        })
    }
}

#[async_trait]
impl Messenger for TelegramApi {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        self.send_message(chat_id, text).await
    }
}
