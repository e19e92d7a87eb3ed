pub mod command;
pub mod message;
pub mod tasks;

use async_trait::async_trait;

pub use command::{Command, CompetitorFocus};
pub use message::{IncomingMessage, Inbound, Keyboard, OutgoingMessage};
pub use tasks::{GenerationTask, AUTOMATION_ROADMAP_PROMPT};

/// Entry point the transport calls for every inbound message.
///
/// Implementations never fail: handler errors become user-facing replies.
#[async_trait]
pub trait DialogueService: Send + Sync {
    async fn handle(&self, message: IncomingMessage) -> Vec<OutgoingMessage>;
}
