use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::report::ReportTopic;

/// Free-chat context never grows past this many entries.
pub const CHAT_HISTORY_LIMIT: usize = 12;

/// Maximum competitor links kept from one diagnostic run.
pub const COMPETITOR_LINK_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Demo,
    DiagRunning,
    /// Reserved persisted value. Finalization returns to `Idle`, so nothing enters this stage;
    /// a stored session carrying it is handled like `Idle`.
    DiagComplete,
    QuickAnalyze,
    QuickStrategy,
    QuickContentPlan,
    QuickChannels,
    GenImage,
    GenReels,
    GenVideo,
    GenPresentation,
    CopyReelsIdeas,
    CopyHeadlines,
    CopyPosts,
    CopyContentPlan,
    CopyBanners,
    AwaitSalesFile,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Demo => "demo",
            Self::DiagRunning => "diag_running",
            Self::DiagComplete => "diag_complete",
            Self::QuickAnalyze => "quick_analyze",
            Self::QuickStrategy => "quick_strategy",
            Self::QuickContentPlan => "quick_content_plan",
            Self::QuickChannels => "quick_channels",
            Self::GenImage => "gen_image",
            Self::GenReels => "gen_reels",
            Self::GenVideo => "gen_video",
            Self::GenPresentation => "gen_presentation",
            Self::CopyReelsIdeas => "copy_reels_ideas",
            Self::CopyHeadlines => "copy_headlines",
            Self::CopyPosts => "copy_posts",
            Self::CopyContentPlan => "copy_content_plan",
            Self::CopyBanners => "copy_banners",
            Self::AwaitSalesFile => "await_sales_file",
        }
    }

    /// Ordered sub-flows consume raw text, including menu labels, as flow input.
    pub fn is_strict_flow(self) -> bool {
        matches!(self, Self::Demo | Self::DiagRunning)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into() }
    }
}

/// Volatile per-user conversational state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub stage: Stage,
    pub step_index: usize,
    pub answers: BTreeMap<String, String>,
    pub demo_answers: BTreeMap<String, String>,
    pub competitor_links: Vec<String>,
    pub sales_summary: Option<String>,
    pub report_text: Option<String>,
    pub report_sections: BTreeMap<ReportTopic, String>,
    pub chat_history: Vec<ChatEntry>,
    pub free_chat_active: bool,
    pub pending_payment_service: Option<String>,
    pub promo_code: Option<String>,
}

impl UserSession {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn leave_flow(&mut self) {
        self.stage = Stage::Idle;
        self.step_index = 0;
    }

    pub fn has_report(&self) -> bool {
        self.report_text.is_some()
    }

    pub fn push_chat(&mut self, entry: ChatEntry) {
        self.chat_history.push(entry);
        if self.chat_history.len() > CHAT_HISTORY_LIMIT {
            let overflow = self.chat_history.len() - CHAT_HISTORY_LIMIT;
            self.chat_history.drain(..overflow);
        }
    }

    /// Restarts the free-chat context around the latest delivered answer.
    pub fn restart_chat(&mut self, user_text: Option<&str>, answer: &str) {
        self.free_chat_active = true;
        self.chat_history.clear();
        if let Some(text) = user_text.filter(|text| !text.is_empty()) {
            self.chat_history.push(ChatEntry::user(text));
        }
        if !answer.is_empty() {
            self.chat_history.push(ChatEntry::assistant(answer));
        }
    }

    pub fn answers_json(&self) -> String {
        serde_json::to_string(&self.answers).unwrap_or_else(|_| "{}".to_owned())
    }
}
