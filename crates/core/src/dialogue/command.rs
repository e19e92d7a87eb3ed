use serde::{Deserialize, Serialize};

use crate::dialogue::tasks::GenerationTask;
use crate::domain::report::ReportTopic;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitorFocus {
    Prices,
    Content,
    Product,
    All,
}

impl CompetitorFocus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Prices => "Prices and positioning",
            Self::Content => "Content and promotion",
            Self::Product => "Product and offers",
            Self::All => "All sections together",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prices => "prices",
            Self::Content => "content",
            Self::Product => "product",
            Self::All => "all",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prices" => Some(Self::Prices),
            "content" => Some(Self::Content),
            "product" => Some(Self::Product),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Everything a user can ask for, resolved once at the transport boundary from menu
/// labels, slash commands and button callbacks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Help,
    Cancel,
    MainMenu,

    StartDiagnostic,
    StartDemo,
    AiMarketerMenu,
    ContentMenu,
    CopywritingMenu,
    Services,
    Tariffs,
    Capabilities,
    Cases,
    Contact,
    Support,
    HowICanHelp,
    GrowthStrategy,
    AiTools,
    UploadSales,
    SkipUpload,
    BeginTask(GenerationTask),
    AutomationRoadmap,
    ReportSection(ReportTopic),
    ExportReport,

    TariffDetails(String),
    TariffMore,
    TariffBack,
    Pay(String),
    ConfirmPayment(String),
    ApplyPromo(String),
    GetReport,
    Plan30Days,
    CompetitorReview(CompetitorFocus),
    CompetitorBack,
    RequestPresentation,
}

impl Command {
    /// Global commands are honoured in every stage and reset the session.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Start | Self::Help | Self::Cancel | Self::MainMenu)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Cancel => "cancel",
            Self::MainMenu => "main_menu",
            Self::StartDiagnostic => "start_diagnostic",
            Self::StartDemo => "start_demo",
            Self::AiMarketerMenu => "ai_marketer_menu",
            Self::ContentMenu => "content_menu",
            Self::CopywritingMenu => "copywriting_menu",
            Self::Services => "services",
            Self::Tariffs => "tariffs",
            Self::Capabilities => "capabilities",
            Self::Cases => "cases",
            Self::Contact => "contact",
            Self::Support => "support",
            Self::HowICanHelp => "how_i_can_help",
            Self::GrowthStrategy => "growth_strategy",
            Self::AiTools => "ai_tools",
            Self::UploadSales => "upload_sales",
            Self::SkipUpload => "skip_upload",
            Self::BeginTask(_) => "begin_task",
            Self::AutomationRoadmap => "automation_roadmap",
            Self::ReportSection(_) => "report_section",
            Self::ExportReport => "export_report",
            Self::TariffDetails(_) => "tariff_details",
            Self::TariffMore => "tariff_more",
            Self::TariffBack => "tariff_back",
            Self::Pay(_) => "pay",
            Self::ConfirmPayment(_) => "confirm_payment",
            Self::ApplyPromo(_) => "apply_promo",
            Self::GetReport => "get_report",
            Self::Plan30Days => "plan_30d",
            Self::CompetitorReview(_) => "competitor_review",
            Self::CompetitorBack => "competitor_back",
            Self::RequestPresentation => "request_presentation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, CompetitorFocus};
    use crate::dialogue::tasks::GenerationTask;

    #[test]
    fn only_navigation_resets_are_global() {
        for command in [Command::Start, Command::Help, Command::Cancel, Command::MainMenu] {
            assert!(command.is_global(), "{} should be global", command.name());
        }
        assert!(!Command::StartDiagnostic.is_global());
        assert!(!Command::BeginTask(GenerationTask::GenImage).is_global());
        assert!(!Command::Pay("start".to_owned()).is_global());
    }

    #[test]
    fn competitor_focus_parses_identifiers() {
        for focus in [
            CompetitorFocus::Prices,
            CompetitorFocus::Content,
            CompetitorFocus::Product,
            CompetitorFocus::All,
        ] {
            assert_eq!(CompetitorFocus::parse(focus.as_str()), Some(focus));
        }
        assert_eq!(CompetitorFocus::parse("weather"), None);
    }
}
