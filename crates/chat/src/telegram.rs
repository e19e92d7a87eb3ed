use std::time::Duration;

use async_trait::async_trait;
use marketer_core::config::TelegramConfig;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::Update;
use crate::keyboards::ReplyMarkup;
use crate::polling::{ChatTransport, Delivery, TransportError};

/// Headroom over the long-poll timeout before the HTTP client gives up on `getUpdates`.
const REQUEST_HEADROOM_SECS: u64 = 15;

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct BotIdentity {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Deserialize)]
struct RemoteFile {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a ReplyMarkup>,
}

/// Bot API client over HTTPS long polling.
pub struct TelegramTransport {
    http: reqwest::Client,
    api_base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
}

impl TelegramTransport {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + REQUEST_HEADROOM_SECS))
            .build()
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.token.expose_secret())
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base_url, self.token.expose_secret())
    }

    async fn call<T, B>(&self, method: &str, body: &B) -> Result<T, String>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| redact(&error.without_url().to_string()))?;
        unwrap_response(method, response).await
    }
}

async fn unwrap_response<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T, String> {
    let status = response.status();
    let parsed: ApiResponse<T> = response
        .json()
        .await
        .map_err(|error| format!("{method}: unreadable response ({status}): {}", error.without_url()))?;
    if !parsed.ok {
        return Err(format!(
            "{method}: {}",
            parsed.description.unwrap_or_else(|| status.to_string())
        ));
    }
    parsed.result.ok_or_else(|| format!("{method}: response without result"))
}

/// Drops anything after `/bot` so tokens never reach logs.
fn redact(message: &str) -> String {
    match message.find("/bot") {
        Some(index) => format!("{}/bot<redacted>", &message[..index]),
        None => message.to_owned(),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let identity: BotIdentity =
            self.call("getMe", &serde_json::json!({})).await.map_err(TransportError::Connect)?;
        info!(
            event_name = "ingress.chat.connected",
            bot_id = identity.id,
            bot_username = identity.username.as_deref().unwrap_or_default(),
            "telegram bot identity confirmed"
        );
        Ok(())
    }

    async fn poll(&self, offset: i64) -> Result<Option<Vec<Update>>, TransportError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let updates: Vec<Update> =
            self.call("getUpdates", &body).await.map_err(TransportError::Receive)?;
        debug!(offset, count = updates.len(), "polled telegram updates");
        Ok(Some(updates))
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        let _: bool =
            self.call("answerCallbackQuery", &body).await.map_err(TransportError::Send)?;
        Ok(())
    }

    async fn send(&self, chat_id: i64, delivery: Delivery) -> Result<(), TransportError> {
        match delivery {
            Delivery::Text { text, markup } => {
                let body = SendMessage {
                    chat_id,
                    text: &text,
                    disable_web_page_preview: true,
                    reply_markup: markup.as_ref(),
                };
                let _: serde_json::Value =
                    self.call("sendMessage", &body).await.map_err(TransportError::Send)?;
            }
            Delivery::Document { file_name, content, caption } => {
                let part = Part::bytes(content.into_bytes())
                    .file_name(file_name)
                    .mime_str("text/plain; charset=utf-8")
                    .map_err(|error| TransportError::Send(error.to_string()))?;
                let form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .text("caption", caption)
                    .part("document", part);
                let response = self
                    .http
                    .post(self.method_url("sendDocument"))
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|error| TransportError::Send(redact(&error.without_url().to_string())))?;
                let _: serde_json::Value = unwrap_response("sendDocument", response)
                    .await
                    .map_err(TransportError::Send)?;
            }
        }
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let body = serde_json::json!({ "file_id": file_id });
        let remote: RemoteFile =
            self.call("getFile", &body).await.map_err(TransportError::Download)?;
        let file_path = remote
            .file_path
            .ok_or_else(|| TransportError::Download(format!("file {file_id} has no path")))?;

        let response = self
            .http
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|error| TransportError::Download(redact(&error.without_url().to_string())))?;
        if !response.status().is_success() {
            return Err(TransportError::Download(format!(
                "file download returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|error| TransportError::Download(error.without_url().to_string()))?;
        Ok(bytes.to_vec())
    }
}
