use std::collections::BTreeMap;
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use marketer_core::dialogue::{DialogueService, OutgoingMessage};
use marketer_core::domain::tariff::TariffCatalog;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::attachments::{is_sales_file, summarize_sales_file};
use crate::events::{into_incoming, ChatEvent, Update};
use crate::format::{format_generated, split_message, MESSAGE_CHUNK_CHARS};
use crate::keyboards::{render, ReplyMarkup};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport poll failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport download failed: {0}")]
    Download(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// One outbound Bot API call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Text { text: String, markup: Option<ReplyMarkup> },
    Document { file_name: String, content: String, caption: String },
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Next batch of updates after `offset`. `None` means the stream is closed.
    async fn poll(&self, offset: i64) -> Result<Option<Vec<Update>>, TransportError>;
    async fn acknowledge(&self, callback_id: &str) -> Result<(), TransportError>;
    async fn send(&self, chat_id: i64, delivery: Delivery) -> Result<(), TransportError>;
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// Turns one dialogue reply into Bot API calls.
///
/// Long text is chunked and the keyboard rides on the last chunk. Generated text is
/// reformatted first.
pub fn deliveries_for(message: &OutgoingMessage, catalog: &TariffCatalog) -> Vec<Delivery> {
    let (text, keyboard) = match message {
        OutgoingMessage::Text { text, keyboard } => (text.clone(), keyboard),
        OutgoingMessage::Generated { text, keyboard } => (format_generated(text), keyboard),
        OutgoingMessage::Document { document, caption } => {
            return vec![Delivery::Document {
                file_name: format!("{}.txt", document.file_name),
                content: document.render_text(),
                caption: caption.clone(),
            }];
        }
    };

    let chunks = split_message(&text, MESSAGE_CHUNK_CHARS);
    let last = chunks.len().saturating_sub(1);
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| Delivery::Text {
            text: chunk,
            markup: if index == last {
                keyboard.as_ref().map(|keyboard| render(keyboard, catalog))
            } else {
                None
            },
        })
        .collect()
}

/// Long-polling loop in front of the dialogue service.
///
/// Updates in a batch are grouped per chat: chats run concurrently, each chat in order.
pub struct PollingRunner {
    transport: Arc<dyn ChatTransport>,
    service: Arc<dyn DialogueService>,
    catalog: Arc<TariffCatalog>,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        service: Arc<dyn DialogueService>,
        catalog: TariffCatalog,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, service, catalog: Arc::new(catalog), reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let mut offset = 0_i64;
        let mut attempt = 0_u32;
        loop {
            match self.connect_and_pump(attempt, &mut offset).await {
                Ok(()) => return Ok(()),
                Err((transport_error, made_progress)) => {
                    if made_progress {
                        attempt = 0;
                    }
                    warn!(
                        event_name = "ingress.chat.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Returns the error plus whether any batch was handled since connecting.
    async fn connect_and_pump(
        &self,
        attempt: u32,
        offset: &mut i64,
    ) -> Result<(), (TransportError, bool)> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await.map_err(|error| (error, false))?;
        info!(attempt, "chat transport connected");

        let mut made_progress = false;
        loop {
            let Some(updates) =
                self.transport.poll(*offset).await.map_err(|error| (error, made_progress))?
            else {
                info!(attempt, "chat transport stream closed");
                return Ok(());
            };
            if let Some(last) = updates.iter().map(|update| update.update_id).max() {
                *offset = last + 1;
            }
            self.handle_batch(updates).await;
            made_progress = true;
        }
    }

    async fn handle_batch(&self, updates: Vec<Update>) {
        let mut per_chat: BTreeMap<i64, Vec<(i64, ChatEvent)>> = BTreeMap::new();
        for update in updates {
            let event = update.event();
            match event.chat_id() {
                Some(chat_id) => per_chat.entry(chat_id).or_default().push((update.update_id, event)),
                None => debug!(
                    event_name = "ingress.chat.update_ignored",
                    update_id = update.update_id,
                    event_type = event.event_type(),
                    "ignoring unsupported update"
                ),
            }
        }

        let mut tasks = JoinSet::new();
        for (chat_id, events) in per_chat {
            let worker = ChatWorker {
                transport: self.transport.clone(),
                service: self.service.clone(),
                catalog: self.catalog.clone(),
            };
            tasks.spawn(async move {
                for (update_id, event) in events {
                    worker.handle(chat_id, update_id, event).await;
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "chat worker panicked; continuing polling loop");
            }
        }
    }
}

struct ChatWorker {
    transport: Arc<dyn ChatTransport>,
    service: Arc<dyn DialogueService>,
    catalog: Arc<TariffCatalog>,
}

impl ChatWorker {
    async fn handle(&self, chat_id: i64, update_id: i64, event: ChatEvent) {
        let correlation_id = format!("upd-{update_id}");
        info!(
            event_name = "ingress.chat.update_received",
            correlation_id = %correlation_id,
            chat_id,
            user_id = event.user().map(|user| user.id).unwrap_or_default(),
            event_type = event.event_type(),
            "received chat update"
        );

        if let ChatEvent::Callback { callback_id, .. } = &event {
            if let Err(error) = self.transport.acknowledge(callback_id).await {
                warn!(
                    event_name = "ingress.chat.ack_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "failed to acknowledge callback"
                );
            }
        }

        let summary = self.attachment_summary(&event, &correlation_id).await;
        let Some(message) = into_incoming(&event, &correlation_id, summary) else {
            debug!(correlation_id = %correlation_id, "update has no dialogue meaning");
            return;
        };

        for reply in self.service.handle(message).await {
            for delivery in deliveries_for(&reply, &self.catalog) {
                if let Err(error) = self.transport.send(chat_id, delivery).await {
                    warn!(
                        event_name = "egress.chat.send_failed",
                        correlation_id = %correlation_id,
                        chat_id,
                        error = %error,
                        "failed to deliver reply"
                    );
                }
            }
        }
    }

    async fn attachment_summary(&self, event: &ChatEvent, correlation_id: &str) -> Option<String> {
        let ChatEvent::Document { file_id, file_name, .. } = event else {
            return None;
        };
        if !is_sales_file(file_name) {
            return None;
        }
        match self.transport.download(file_id).await {
            Ok(content) => summarize_sales_file(file_name, &content),
            Err(error) => {
                warn!(
                    event_name = "ingress.chat.download_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "failed to download attachment"
                );
                None
            }
        }
    }
}
