//! Chat transport boundary for the AI marketer bot.
//!
//! Everything Telegram-shaped lives here so the dialogue core only ever sees
//! `IncomingMessage` / `OutgoingMessage`:
//! - **Events** (`events`) - Bot API update payloads and their conversion to inbound messages
//! - **Commands** (`commands`) - slash commands, menu labels and callback data to `Command`
//! - **Keyboards** (`keyboards`) - abstract keyboards to reply / inline markup
//! - **Format** (`format`) - generated text cleanup and message chunking
//! - **Attachments** (`attachments`) - sales file summaries
//! - **Polling** (`polling`) - long-polling runner with reconnect backoff
//! - **Telegram** (`telegram`) - Bot API client implementing `ChatTransport`
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → ChatEvent → IncomingMessage → DialogueService
//!                   ↓
//!     sendMessage / sendDocument ← Delivery ← OutgoingMessage
//! ```
//!
//! Menu labels are resolved once, here. A label typed inside a strict flow still reaches
//! the dispatcher tagged with its command; the dispatcher decides it is an answer.

pub mod attachments;
pub mod commands;
pub mod events;
pub mod format;
pub mod keyboards;
pub mod polling;
pub mod telegram;

pub use polling::{ChatTransport, PollingRunner, ReconnectPolicy, TransportError};
pub use telegram::TelegramTransport;
