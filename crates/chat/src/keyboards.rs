use marketer_core::dialogue::{Command, CompetitorFocus, GenerationTask, Keyboard};
use marketer_core::domain::report::ReportTopic;
use marketer_core::domain::tariff::TariffCatalog;
use serde::Serialize;

use crate::commands::{
    callback_data, task_label, topic_label, AI_MARKETER_LABEL, AI_TOOLS_LABEL, AUTOMATION_LABEL,
    CONTACT_LABEL, CONTENT_LABEL, COPYWRITING_LABEL, DIAGNOSTIC_LABEL, EXPORT_REPORT_LABEL,
    GROWTH_STRATEGY_LABEL, HOW_I_CAN_HELP_LABEL, MAIN_MENU_LABEL, MY_NUMBERS_LABEL,
    SERVICES_LABEL, SKIP_UPLOAD_LABEL, SUPPORT_LABEL,
};

pub const MANAGER_URL: &str = "https://t.me/maglena_a";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyButton {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, command: &Command) -> Self {
        Self { text: label.into(), callback_data: callback_data(command), url: None }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self { text: label.into(), callback_data: None, url: Some(url.into()) }
    }
}

/// Bot API `reply_markup` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Reply { keyboard: Vec<Vec<ReplyButton>>, resize_keyboard: bool },
    Inline { inline_keyboard: Vec<Vec<InlineButton>> },
}

fn reply(rows: &[&[&str]]) -> ReplyMarkup {
    ReplyMarkup::Reply {
        keyboard: rows
            .iter()
            .map(|row| row.iter().map(|label| ReplyButton { text: (*label).to_owned() }).collect())
            .collect(),
        resize_keyboard: true,
    }
}

fn reply_owned(rows: Vec<Vec<String>>) -> ReplyMarkup {
    ReplyMarkup::Reply {
        keyboard: rows
            .into_iter()
            .map(|row| row.into_iter().map(|text| ReplyButton { text }).collect())
            .collect(),
        resize_keyboard: true,
    }
}

fn inline(rows: Vec<Vec<InlineButton>>) -> ReplyMarkup {
    ReplyMarkup::Inline { inline_keyboard: rows }
}

fn tasks(rows: &[&[GenerationTask]], extra: &[&str]) -> ReplyMarkup {
    let mut keyboard: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|task| task_label(*task).to_owned()).collect())
        .collect();
    keyboard.extend(extra.iter().map(|label| vec![(*label).to_owned()]));
    reply_owned(keyboard)
}

/// Renders an abstract keyboard. Tariff keyboards are built from the live catalog.
pub fn render(keyboard: &Keyboard, catalog: &TariffCatalog) -> ReplyMarkup {
    match keyboard {
        Keyboard::MainMenu => reply(&[
            &[DIAGNOSTIC_LABEL],
            &[AI_MARKETER_LABEL, CONTENT_LABEL],
            &[SERVICES_LABEL],
            &[CONTACT_LABEL, SUPPORT_LABEL],
        ]),
        Keyboard::AuxMenu => reply(&[
            &[HOW_I_CAN_HELP_LABEL],
            &[GROWTH_STRATEGY_LABEL, AI_TOOLS_LABEL],
            &[MY_NUMBERS_LABEL],
            &[MAIN_MENU_LABEL],
        ]),
        Keyboard::BackToMain => reply(&[&[MAIN_MENU_LABEL]]),
        Keyboard::UploadSales => reply(&[&[SKIP_UPLOAD_LABEL], &[MAIN_MENU_LABEL]]),
        Keyboard::AiMarketerMenu => tasks(
            &[
                &[GenerationTask::QuickAnalyze, GenerationTask::QuickStrategy],
                &[GenerationTask::QuickContentPlan, GenerationTask::QuickChannels],
            ],
            &[AUTOMATION_LABEL, MAIN_MENU_LABEL],
        ),
        Keyboard::ContentMenu => tasks(
            &[
                &[GenerationTask::GenImage],
                &[GenerationTask::GenReels, GenerationTask::GenVideo],
                &[GenerationTask::GenPresentation],
            ],
            &[COPYWRITING_LABEL, MAIN_MENU_LABEL],
        ),
        Keyboard::CopywritingMenu => tasks(
            &[
                &[GenerationTask::ReelsIdeas, GenerationTask::Headlines],
                &[GenerationTask::Posts, GenerationTask::ContentPlan14],
                &[GenerationTask::Banners],
            ],
            &[MAIN_MENU_LABEL],
        ),
        Keyboard::ReportMenu => {
            let mut rows: Vec<Vec<String>> = ReportTopic::ALL
                .chunks(2)
                .map(|pair| pair.iter().map(|topic| topic_label(*topic)).collect())
                .collect();
            rows.push(vec![EXPORT_REPORT_LABEL.to_owned(), MAIN_MENU_LABEL.to_owned()]);
            reply_owned(rows)
        }
        Keyboard::CasesMenu => inline(vec![
            vec![InlineButton::callback("Take the diagnostic 🚀", &Command::StartDiagnostic)],
            vec![InlineButton::callback("Get the presentation 📑", &Command::RequestPresentation)],
        ]),
        Keyboard::StrategyTeaser => inline(vec![
            vec![InlineButton::callback("Take the diagnostic 🚀", &Command::StartDiagnostic)],
            vec![InlineButton::callback("Try the demo 🧪", &Command::StartDemo)],
        ]),
        Keyboard::StartDiagnostic => inline(vec![vec![InlineButton::callback(
            "START THE DIAGNOSTIC 🚀",
            &Command::StartDiagnostic,
        )]]),
        Keyboard::PostPayment => inline(vec![
            vec![InlineButton::callback("Take the diagnostic 🚀", &Command::StartDiagnostic)],
            vec![InlineButton::callback(MAIN_MENU_LABEL, &Command::MainMenu)],
        ]),
        Keyboard::GrowthFollowUps => inline(vec![
            vec![InlineButton::callback("Get the report 📊", &Command::GetReport)],
            vec![InlineButton::callback("Yes, step by step 🚀", &Command::Plan30Days)],
            vec![InlineButton::callback(
                "Get a competitor audit 🕵️",
                &Command::CompetitorReview(CompetitorFocus::All),
            )],
        ]),
        Keyboard::CompetitorFocus => {
            let focus = |value: CompetitorFocus| {
                InlineButton::callback(value.label(), &Command::CompetitorReview(value))
            };
            inline(vec![
                vec![focus(CompetitorFocus::Prices), focus(CompetitorFocus::Content)],
                vec![focus(CompetitorFocus::Product), focus(CompetitorFocus::All)],
                vec![InlineButton::callback("⏪ Back", &Command::CompetitorBack)],
            ])
        }
        Keyboard::Contact => {
            inline(vec![vec![InlineButton::url("Message the manager on Telegram", MANAGER_URL)]])
        }
        Keyboard::Support => inline(vec![vec![InlineButton::url("Message support", MANAGER_URL)]]),
        Keyboard::Tariffs => {
            let mut rows: Vec<Vec<InlineButton>> = catalog
                .all()
                .iter()
                .map(|tariff| {
                    vec![InlineButton::callback(
                        format!("{} - {}", tariff.name, tariff.display_price()),
                        &Command::TariffDetails(tariff.code.clone()),
                    )]
                })
                .collect();
            rows.push(vec![InlineButton::callback("How tariffs work ℹ️", &Command::TariffMore)]);
            rows.push(vec![InlineButton::callback(MAIN_MENU_LABEL, &Command::MainMenu)]);
            inline(rows)
        }
        Keyboard::TariffDetails { code } => inline(vec![
            vec![InlineButton::callback("Pay 💳", &Command::Pay(code.clone()))],
            vec![InlineButton::callback("⏪ Back to tariffs", &Command::TariffBack)],
        ]),
        Keyboard::Payment { url, confirm_code } => {
            let mut rows = vec![vec![InlineButton::url("Pay with YooKassa 💳", url.clone())]];
            if let Some(code) = confirm_code {
                rows.push(vec![InlineButton::callback(
                    "✅ I paid",
                    &Command::ConfirmPayment(code.clone()),
                )]);
            }
            rows.push(vec![InlineButton::url("Message the manager", MANAGER_URL)]);
            inline(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use marketer_core::dialogue::Keyboard;
    use marketer_core::domain::tariff::TariffCatalog;
    use serde_json::json;

    use super::{render, ReplyMarkup};
    use crate::commands::resolve_text;

    #[test]
    fn reply_keyboard_labels_resolve_back_to_commands() {
        let catalog = TariffCatalog::standard();
        for keyboard in [
            Keyboard::MainMenu,
            Keyboard::AuxMenu,
            Keyboard::AiMarketerMenu,
            Keyboard::ContentMenu,
            Keyboard::CopywritingMenu,
            Keyboard::ReportMenu,
            Keyboard::UploadSales,
        ] {
            let ReplyMarkup::Reply { keyboard: rows, .. } = render(&keyboard, &catalog) else {
                panic!("{keyboard:?} should be a reply keyboard");
            };
            for button in rows.iter().flatten() {
                assert!(resolve_text(&button.text).is_some(), "unresolved label {}", button.text);
            }
        }
    }

    #[test]
    fn tariff_keyboard_lists_catalog_entries() {
        let markup = render(&Keyboard::Tariffs, &TariffCatalog::standard());
        let value = serde_json::to_value(&markup).expect("serialize");

        let rows = value["inline_keyboard"].as_array().expect("inline rows");
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0][0]["callback_data"], json!("tariff_start"));
        assert!(rows[0][0].get("url").is_none());
    }

    #[test]
    fn payment_keyboard_offers_confirmation_only_for_tariffs() {
        let catalog = TariffCatalog::standard();
        let with_confirm = Keyboard::Payment {
            url: "https://pay.example/1".to_owned(),
            confirm_code: Some("start".to_owned()),
        };
        let without = Keyboard::Payment { url: "https://pay.example/2".to_owned(), confirm_code: None };

        let ReplyMarkup::Inline { inline_keyboard } = render(&with_confirm, &catalog) else {
            panic!("payment keyboard is inline");
        };
        assert_eq!(inline_keyboard[0][0].url.as_deref(), Some("https://pay.example/1"));
        assert_eq!(inline_keyboard[1][0].callback_data.as_deref(), Some("tariff_success_start"));

        let ReplyMarkup::Inline { inline_keyboard } = render(&without, &catalog) else {
            panic!("payment keyboard is inline");
        };
        assert_eq!(inline_keyboard.len(), 2);
    }
}
