use serde::{Deserialize, Serialize};

pub const MISSING_SECTION_TEXT: &str =
    "This section isn't separated out. See the full report.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTopic {
    Product,
    TargetAudience,
    Sales,
    Marketing,
    Team,
    Competitors,
    NumbersAnalytics,
    Priorities,
}

impl ReportTopic {
    pub const ALL: [ReportTopic; 8] = [
        Self::Product,
        Self::TargetAudience,
        Self::Sales,
        Self::Marketing,
        Self::Team,
        Self::Competitors,
        Self::NumbersAnalytics,
        Self::Priorities,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Product => "Product",
            Self::TargetAudience => "Target audience",
            Self::Sales => "Sales",
            Self::Marketing => "Marketing",
            Self::Team => "Team",
            Self::Competitors => "Competitors",
            Self::NumbersAnalytics => "Numbers & analytics",
            Self::Priorities => "Priorities",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::TargetAudience => "target_audience",
            Self::Sales => "sales",
            Self::Marketing => "marketing",
            Self::Team => "team",
            Self::Competitors => "competitors",
            Self::NumbersAnalytics => "numbers_analytics",
            Self::Priorities => "priorities",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.as_str() == value)
    }
}

/// Export request handed to the transport, which owns document rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub file_name: String,
    pub title: String,
    pub recipient: String,
    pub summary: String,
    pub sections: Vec<(String, String)>,
}

impl ReportDocument {
    /// Plain-text rendering used by transports without a richer document format.
    pub fn render_text(&self) -> String {
        let mut text = format!("{}\nFor: {}\n\nSummary\n{}", self.title, self.recipient, self.summary);
        for (title, body) in &self.sections {
            text.push_str(&format!("\n\n{title}\n{body}"));
        }
        text
    }
}
