use serde::{Deserialize, Serialize};

use crate::dialogue::command::Command;
use crate::domain::entitlement::UserId;
use crate::domain::report::ReportDocument;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inbound {
    /// Free text. `command` is set when the text matched a menu label or slash command.
    Text { text: String, command: Option<Command> },
    /// Button press. Never treated as flow input.
    Action(Command),
    /// Uploaded file. `summary` is absent when the transport could not read it.
    Attachment { file_name: String, summary: Option<String> },
}

impl Inbound {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { command: Some(_), .. } => "command",
            Self::Text { .. } => "text",
            Self::Action(_) => "action",
            Self::Attachment { .. } => "attachment",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub user_id: UserId,
    pub username: Option<String>,
    pub correlation_id: String,
    pub content: Inbound,
}

impl IncomingMessage {
    pub fn text(
        user_id: impl Into<String>,
        correlation_id: impl Into<String>,
        text: impl Into<String>,
        command: Option<Command>,
    ) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            username: None,
            correlation_id: correlation_id.into(),
            content: Inbound::Text { text: text.into(), command },
        }
    }

    pub fn action(
        user_id: impl Into<String>,
        correlation_id: impl Into<String>,
        command: Command,
    ) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            username: None,
            correlation_id: correlation_id.into(),
            content: Inbound::Action(command),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Abstract reply keyboards. Rendering is the transport's concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyboard {
    MainMenu,
    AuxMenu,
    BackToMain,
    AiMarketerMenu,
    ContentMenu,
    CopywritingMenu,
    ReportMenu,
    CasesMenu,
    StrategyTeaser,
    UploadSales,
    PostPayment,
    StartDiagnostic,
    GrowthFollowUps,
    CompetitorFocus,
    Contact,
    Support,
    Tariffs,
    TariffDetails { code: String },
    Payment { url: String, confirm_code: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutgoingMessage {
    /// Fixed copy, sent as written.
    Text { text: String, keyboard: Option<Keyboard> },
    /// Model output; the transport normalises formatting before sending.
    Generated { text: String, keyboard: Option<Keyboard> },
    Document { document: ReportDocument, caption: String },
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), keyboard: None }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Text { text: text.into(), keyboard: Some(keyboard) }
    }

    pub fn generated(text: impl Into<String>) -> Self {
        Self::Generated { text: text.into(), keyboard: None }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Text { text, .. } | Self::Generated { text, .. } => text,
            Self::Document { caption, .. } => caption,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Self::Text { keyboard, .. } | Self::Generated { keyboard, .. } => keyboard.as_ref(),
            Self::Document { .. } => None,
        }
    }
}
