use marketer_core::dialogue::{Command, CompetitorFocus, GenerationTask};
use marketer_core::domain::report::ReportTopic;

pub const MAIN_MENU_LABEL: &str = "⬅️ Main menu";

pub const DIAGNOSTIC_LABEL: &str = "🧭 Business diagnostic";
pub const AI_MARKETER_LABEL: &str = "🧬 AI Marketer";
pub const CONTENT_LABEL: &str = "☄️ Content generation";
pub const SERVICES_LABEL: &str = "🛠 Services";
pub const CONTACT_LABEL: &str = "📞 Contact the team";
pub const SUPPORT_LABEL: &str = "💬 Support";

pub const HOW_I_CAN_HELP_LABEL: &str = "💡 How I can help your business";
pub const GROWTH_STRATEGY_LABEL: &str = "📊 Show a growth strategy";
pub const AI_TOOLS_LABEL: &str = "🧠 AI tools for the company";
pub const MY_NUMBERS_LABEL: &str = "🧾 My numbers and analysis";
pub const SKIP_UPLOAD_LABEL: &str = "⏭ Continue without a file";

pub const AUTOMATION_LABEL: &str = "⚙️ Adopt AI for automation";
pub const COPYWRITING_LABEL: &str = "✍️ Copywriting";
pub const EXPORT_REPORT_LABEL: &str = "Save report 📁";

pub const CAPABILITIES_LABEL: &str = "🎯 What I can do";
pub const CASES_LABEL: &str = "📂 Cases";
pub const TARIFFS_LABEL: &str = "💳 Payment and tariffs";
pub const DEMO_LABEL: &str = "🧪 Demo mode";

pub fn task_label(task: GenerationTask) -> &'static str {
    match task {
        GenerationTask::QuickAnalyze => "📊 Analyse the company",
        GenerationTask::QuickStrategy => "💡 Build a strategy",
        GenerationTask::QuickContentPlan => "🧩 Create a content plan",
        GenerationTask::QuickChannels => "📈 Pick traffic channels",
        GenerationTask::GenImage => "Create an image 🖼️",
        GenerationTask::GenReels => "Create Reels/Shorts 🎬",
        GenerationTask::GenVideo => "Create a video up to 3 minutes 🎥",
        GenerationTask::GenPresentation => "Create a presentation 📑",
        GenerationTask::ReelsIdeas => "Reels ideas 🎞",
        GenerationTask::Headlines => "Headlines 📰",
        GenerationTask::Posts => "Posts 📝",
        GenerationTask::ContentPlan14 => "14-day content plan 🗓",
        GenerationTask::Banners => "Banner copy 🪧",
    }
}

pub fn topic_label(topic: ReportTopic) -> String {
    let icon = match topic {
        ReportTopic::Product => "📦",
        ReportTopic::TargetAudience => "🎯",
        ReportTopic::Sales => "💰",
        ReportTopic::Marketing => "📣",
        ReportTopic::Team => "👥",
        ReportTopic::Competitors => "⚔️",
        ReportTopic::NumbersAnalytics => "📊",
        ReportTopic::Priorities => "⚡️",
    };
    format!("{} {icon}", topic.label())
}

/// Resolves typed text to a command: slash commands first, then exact menu labels.
///
/// Anything else is plain input for the current stage.
pub fn resolve_text(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if trimmed.starts_with('/') {
        return parse_slash_command(trimmed);
    }

    let command = match trimmed {
        MAIN_MENU_LABEL | "Main menu" => Command::MainMenu,
        DIAGNOSTIC_LABEL | "Take the diagnostic 🚀" => Command::StartDiagnostic,
        AI_MARKETER_LABEL => Command::AiMarketerMenu,
        CONTENT_LABEL => Command::ContentMenu,
        COPYWRITING_LABEL => Command::CopywritingMenu,
        SERVICES_LABEL => Command::Services,
        TARIFFS_LABEL => Command::Tariffs,
        CONTACT_LABEL => Command::Contact,
        SUPPORT_LABEL => Command::Support,
        HOW_I_CAN_HELP_LABEL => Command::HowICanHelp,
        GROWTH_STRATEGY_LABEL => Command::GrowthStrategy,
        AI_TOOLS_LABEL => Command::AiTools,
        MY_NUMBERS_LABEL => Command::UploadSales,
        SKIP_UPLOAD_LABEL => Command::SkipUpload,
        AUTOMATION_LABEL => Command::AutomationRoadmap,
        EXPORT_REPORT_LABEL => Command::ExportReport,
        CAPABILITIES_LABEL => Command::Capabilities,
        CASES_LABEL => Command::Cases,
        DEMO_LABEL => Command::StartDemo,
        other => {
            if let Some(task) = GenerationTask::ALL.into_iter().find(|task| task_label(*task) == other)
            {
                Command::BeginTask(task)
            } else {
                let topic =
                    ReportTopic::ALL.into_iter().find(|topic| topic_label(*topic) == other)?;
                Command::ReportSection(topic)
            }
        }
    };
    Some(command)
}

fn parse_slash_command(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?.trim_start_matches('/');
    // Group chats address commands as `/start@botname`.
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let argument = parts.next();

    match name.as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "cancel" => Some(Command::Cancel),
        "menu" => Some(Command::MainMenu),
        "tariffs" => Some(Command::Tariffs),
        "demo" => Some(Command::StartDemo),
        "report" => Some(Command::GetReport),
        "promo" => argument.map(|code| Command::ApplyPromo(code.to_owned())),
        _ => None,
    }
}

/// Callback payload for an inline button. `None` for commands that are never inline.
pub fn callback_data(command: &Command) -> Option<String> {
    let data = match command {
        Command::MainMenu => "main_menu".to_owned(),
        Command::StartDiagnostic => "start_diag".to_owned(),
        Command::StartDemo => "demo".to_owned(),
        Command::Tariffs => "tariffs".to_owned(),
        Command::TariffMore => "tariff_more".to_owned(),
        Command::TariffBack => "tariff_main_menu".to_owned(),
        Command::TariffDetails(code) => format!("tariff_{code}"),
        Command::Pay(code) => format!("tariff_pay_{code}"),
        Command::ConfirmPayment(code) => format!("tariff_success_{code}"),
        Command::GetReport => "get_report".to_owned(),
        Command::Plan30Days => "plan_30d".to_owned(),
        Command::CompetitorReview(focus) => format!("comp_{}", focus.as_str()),
        Command::CompetitorBack => "comp_back".to_owned(),
        Command::RequestPresentation => "get_presentation".to_owned(),
        Command::BeginTask(task) => format!("task_{}", task.as_str()),
        _ => return None,
    };
    Some(data)
}

/// Inverse of [`callback_data`]; also accepts `buy_service_<code>` from one-off service buttons.
pub fn parse_callback(data: &str) -> Option<Command> {
    let command = match data {
        "main_menu" => Command::MainMenu,
        "start_diag" => Command::StartDiagnostic,
        "demo" => Command::StartDemo,
        "tariffs" => Command::Tariffs,
        "tariff_more" => Command::TariffMore,
        "tariff_main_menu" => Command::TariffBack,
        "get_report" => Command::GetReport,
        "plan_30d" => Command::Plan30Days,
        "comp_back" => Command::CompetitorBack,
        "get_presentation" => Command::RequestPresentation,
        other => return parse_prefixed_callback(other),
    };
    Some(command)
}

fn parse_prefixed_callback(data: &str) -> Option<Command> {
    if let Some(code) = data.strip_prefix("tariff_pay_") {
        return non_empty(code).map(Command::Pay);
    }
    if let Some(code) = data.strip_prefix("tariff_success_") {
        return non_empty(code).map(Command::ConfirmPayment);
    }
    if let Some(code) = data.strip_prefix("buy_service_") {
        return non_empty(code).map(Command::Pay);
    }
    if let Some(code) = data.strip_prefix("tariff_") {
        return non_empty(code).map(Command::TariffDetails);
    }
    if let Some(focus) = data.strip_prefix("comp_") {
        return CompetitorFocus::parse(focus).map(Command::CompetitorReview);
    }
    if let Some(task) = data.strip_prefix("task_") {
        return GenerationTask::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == task)
            .map(Command::BeginTask);
    }
    None
}

fn non_empty(code: &str) -> Option<String> {
    (!code.is_empty()).then(|| code.to_owned())
}

#[cfg(test)]
mod tests {
    use marketer_core::dialogue::{Command, CompetitorFocus, GenerationTask};
    use marketer_core::domain::report::ReportTopic;

    use super::{
        callback_data, parse_callback, resolve_text, task_label, topic_label, DIAGNOSTIC_LABEL,
        MAIN_MENU_LABEL,
    };

    #[test]
    fn slash_commands_ignore_bot_suffix_and_case() {
        assert_eq!(resolve_text("/start"), Some(Command::Start));
        assert_eq!(resolve_text("/Help@marketer_bot"), Some(Command::Help));
        assert_eq!(resolve_text("/promo STEBLEV"), Some(Command::ApplyPromo("STEBLEV".to_owned())));
        assert_eq!(resolve_text("/promo"), None);
        assert_eq!(resolve_text("/unknown"), None);
    }

    #[test]
    fn menu_labels_resolve_to_commands() {
        assert_eq!(resolve_text(MAIN_MENU_LABEL), Some(Command::MainMenu));
        assert_eq!(resolve_text(&format!("  {DIAGNOSTIC_LABEL} ")), Some(Command::StartDiagnostic));
        assert_eq!(
            resolve_text(task_label(GenerationTask::GenVideo)),
            Some(Command::BeginTask(GenerationTask::GenVideo))
        );
        assert_eq!(
            resolve_text(&topic_label(ReportTopic::NumbersAnalytics)),
            Some(Command::ReportSection(ReportTopic::NumbersAnalytics))
        );
        assert_eq!(resolve_text("we sell handmade candles"), None);
    }

    #[test]
    fn inline_callbacks_parse_back_to_their_command() {
        let commands = [
            Command::StartDiagnostic,
            Command::TariffDetails("agency".to_owned()),
            Command::Pay("content_studio".to_owned()),
            Command::ConfirmPayment("start".to_owned()),
            Command::CompetitorReview(CompetitorFocus::Content),
            Command::BeginTask(GenerationTask::Headlines),
            Command::TariffBack,
        ];
        for command in commands {
            let data = callback_data(&command).expect("inline command");
            assert!(data.len() <= 64, "{data} exceeds callback limit");
            assert_eq!(parse_callback(&data), Some(command));
        }
    }

    #[test]
    fn service_purchase_callbacks_become_payments() {
        assert_eq!(parse_callback("buy_service_img_25"), Some(Command::Pay("img_25".to_owned())));
        assert_eq!(parse_callback("tariff_pay_"), None);
        assert_eq!(parse_callback("comp_weather"), None);
    }
}
