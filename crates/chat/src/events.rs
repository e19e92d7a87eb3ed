use marketer_core::dialogue::{Inbound, IncomingMessage};
use marketer_core::domain::entitlement::UserId;
use serde::Deserialize;

use crate::commands::{parse_callback, resolve_text};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// The parts of an update the bot acts on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Text { chat_id: i64, user: User, text: String },
    Callback { chat_id: i64, user: User, callback_id: String, data: String },
    Document { chat_id: i64, user: User, file_id: String, file_name: String },
    Unsupported { event_type: &'static str },
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Callback { .. } => "callback",
            Self::Document { .. } => "document",
            Self::Unsupported { event_type } => *event_type,
        }
    }

    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Text { chat_id, .. }
            | Self::Callback { chat_id, .. }
            | Self::Document { chat_id, .. } => Some(*chat_id),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Text { user, .. } | Self::Callback { user, .. } | Self::Document { user, .. } => {
                Some(user)
            }
            Self::Unsupported { .. } => None,
        }
    }
}

impl Update {
    pub fn event(&self) -> ChatEvent {
        if let Some(query) = &self.callback_query {
            let chat_id = query.message.as_ref().map(|message| message.chat.id).unwrap_or(query.from.id);
            return match &query.data {
                Some(data) => ChatEvent::Callback {
                    chat_id,
                    user: query.from.clone(),
                    callback_id: query.id.clone(),
                    data: data.clone(),
                },
                None => ChatEvent::Unsupported { event_type: "callback_without_data" },
            };
        }

        let Some(message) = &self.message else {
            return ChatEvent::Unsupported { event_type: "other_update" };
        };
        let Some(user) = message.from.clone() else {
            return ChatEvent::Unsupported { event_type: "anonymous_message" };
        };
        if let Some(document) = &message.document {
            return ChatEvent::Document {
                chat_id: message.chat.id,
                user,
                file_id: document.file_id.clone(),
                file_name: document.file_name.clone().unwrap_or_default(),
            };
        }
        match &message.text {
            Some(text) => ChatEvent::Text { chat_id: message.chat.id, user, text: text.clone() },
            None => ChatEvent::Unsupported { event_type: "non_text_message" },
        }
    }
}

/// Converts an event into the dialogue's inbound message.
///
/// Callbacks with unknown payloads yield `None`; documents carry the summary the runner
/// produced (or `None` when the file could not be read).
pub fn into_incoming(
    event: &ChatEvent,
    correlation_id: &str,
    attachment_summary: Option<String>,
) -> Option<IncomingMessage> {
    let (user, content) = match event {
        ChatEvent::Text { user, text, .. } => {
            (user, Inbound::Text { text: text.clone(), command: resolve_text(text) })
        }
        ChatEvent::Callback { user, data, .. } => (user, Inbound::Action(parse_callback(data)?)),
        ChatEvent::Document { user, file_name, .. } => (
            user,
            Inbound::Attachment { file_name: file_name.clone(), summary: attachment_summary },
        ),
        ChatEvent::Unsupported { .. } => return None,
    };

    Some(IncomingMessage {
        user_id: UserId(user.id.to_string()),
        username: user.username.clone(),
        correlation_id: correlation_id.to_owned(),
        content,
    })
}
