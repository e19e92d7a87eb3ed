//! Fixed reply copy for navigation, menus and flow prompts.

use chrono::{DateTime, Utc};
use marketer_core::domain::entitlement::{EntitlementRecord, UsageCategory};
use marketer_core::domain::tariff::{QuotaLimit, Tariff};

pub const WELCOME: &str = "👋 Hi! I'm AI Marketer 360°\n\
Your personal intelligence for business growth.\n\
I analyse, calculate, create and plan strategy.\n\
I help you grow faster, cheaper and smarter, based on data, technology and systems thinking.";

pub const DIAGNOSTIC_PITCH: &str = "I suggest running a business diagnostic.\n\
Format: a 10-15 minute strategic briefing. After your answers you'll get:\n\
- a real picture of the current state\n\
- growth potential\n\
- development priorities";

pub const HELP: &str = "Commands:\n/start - start\n/help - help\n/cancel - reset the dialogue";
pub const CANCELLED: &str = "OK, reset everything. What's next?";
pub const MAIN_MENU: &str = "Main menu:";
pub const CHOOSE_ACTION: &str = "Choose an action:";
pub const CONTENT_MENU: &str = "What should I generate?";
pub const COPYWRITING_MENU: &str = "Pick a copywriting task:";

pub const CAPABILITIES: &str = "I'm not just a bot. I'm a marketer who sees the business at 360°:\n\n\
📊 Business analysis\n🎯 Promotion strategy\n📣 Content\n🚀 Traffic and funnels\n🤖 AI adoption\n📈 Growth forecast\n\n\
Pick what to show:";

pub const CASES: &str = "Real results:\n\n\
👕 Clothing brand: +220% in 3 months\n\
💪 Sports nutrition: 180% growth\n\
🎓 Online course: -40% CPL\n\n\
Want the same? Take the diagnostic.";

pub const CONTACT: &str = "Want an individual strategy or a turnkey AI rollout?\n\
Press the button below to message the manager:";

pub const SUPPORT: &str = "Press the button below to message support:";

pub const HOW_I_CAN_HELP: &str = "I analyse current metrics, find where you lose money and give a \
step-by-step plan: strategy, content, traffic, automation. Visible improvements usually show up \
within the first 30 days.";

pub const GROWTH_STRATEGY: &str =
    "To show a real strategy, let's do the diagnostic; it takes 3-5 minutes.";

pub const AI_TOOLS: &str = "🧠 Where to adopt AI:\n\
• Auto-generated content (posts, Reels, banners)\n\
• Lead management scenarios and triggers\n\
• Sales scripts and Q&A over a knowledge base\n\
• Demand and budget forecasts, metric alerts\n\
• Funnel and cohort analytics";

pub const UPLOAD_SALES: &str =
    "Send the sales file (CSV or XLSX). I'll find patterns and weak spots.";
pub const UPLOAD_SKIPPED: &str = "OK, we'll do without the file. What's next?";
pub const FILE_NOT_EXPECTED: &str = "File received, but it isn't needed now. Press 'My numbers and \
analysis' to upload a sales report.";
pub const FILE_UNSUPPORTED: &str = "I support CSV and XLSX. Please send one of these formats.";
pub const FILE_FAILED: &str = "Couldn't process the file. Check the format/encoding and try again.";
pub const FILE_ACCEPTED: &str = "Got the file ✅\nPreliminary breakdown:";
pub const SUPPORTED_SALES_EXTENSIONS: [&str; 3] = [".csv", ".xlsx", ".xls"];

pub const FALLBACK: &str =
    "I hear you. To get the most value, pick an action in the menu below:";
pub const SERVICE_ERROR: &str = "Oops! Service error. Already cleaning up, try again 🙌";

pub const DIAGNOSTIC_BEGIN: &str = "Let's begin.\n\n";
pub const DIAGNOSTIC_LATER: &str = "OK, let's come back later. How else can I help?";
pub const DIAGNOSTIC_NOT_STARTED: &str =
    "To start the diagnostic, press 'Business diagnostic' in the main menu.";
pub const COMPETITOR_LINKS_PROMPT: &str = "🕵️ Now send 2-5 competitor links (sites, socials, \
marketplaces, Telegram channels).\nIf you don't know, write 'No' and I'll pick comparable ones myself.";
pub const COMPETITOR_LINKS_RECEIVED: &str = "Got the competitor links 🔍";
pub const COMPETITOR_LINKS_MISSING: &str = "OK, I'll pick comparable ones myself.";
pub const REPORT_IN_PROGRESS: &str = "Building the final report and plan…";
pub const REPORT_FOLLOW_UP: &str =
    "Need to dig into a specific block? Pick a report section or just keep chatting.";
pub const REPORT_MISSING: &str = "Complete the diagnostic first to build the report.";
pub const REPORT_READY: &str = "Done ✅\nBelow is a short report and recommendations.";
pub const REPORT_EXPORT_CAPTION: &str = "Report ready 📁";
pub const COMPETITOR_FOCUS_PROMPT: &str = "Which side of the competitors should I review?";
pub const COMPETITOR_BACK: &str = "OK, let's continue.";

pub const DEMO_CONSENT: &str = "Demo mode 🧠\nI'll show how I find growth points and form \
hypotheses.\n\nReady for a mini test (3 questions) to get ideas? Write 'yes' when ready or say 'later'.";
pub const DEMO_IDEAS_PREFIX: &str = "Done! Here are ideas to start with:\n\n";

pub const PRESENTATION_REQUESTED: &str =
    "Sent the presentation request. A manager will contact you shortly ✅";

pub const PAYMENT_FAILED: &str =
    "Couldn't create a YooKassa invoice. Message the manager, we'll help you pay.";
pub const PAYMENT_DISABLED: &str = "Payments are not enabled yet. Message the manager to get an \
invoice or order manually.";
pub const PAYMENT_LINK_READY: &str = "Done! Below is the YooKassa payment link. Limits update \
automatically after payment.";
pub const PAYMENT_NOT_CONFIRMED: &str = "The payment hasn't been confirmed yet. Limits update \
automatically once YooKassa confirms it; if it takes too long, message the manager.";
pub const PROMO_UNKNOWN: &str = "This promo code isn't valid. Prices stay as listed.";

pub const TARIFFS_MORE: &str = "How tariffs and limits work\n\
• Each tariff is valid for 30 days from payment.\n\
• A tariff has limits on generations (images, video scripts, presentations). Text requests are unlimited.\n\
• If you use up the limits before 30 days, buy the same tariff again to get new limits; the term extends 30 days from the payment date.\n\
• Limits left unused after 30 days expire. A new month is paid at the full tariff price.";

pub fn diagnostic_start(first_question: &str) -> String {
    format!("{DIAGNOSTIC_BEGIN}{first_question}")
}

pub fn report_section(label: &str, body: &str) -> String {
    format!("{label}\n\n{body}")
}

pub fn promo_applied(code: &str) -> String {
    format!("Promo code {code} applied. The discount is counted at checkout.")
}

pub fn sales_file_received(summary: &str) -> String {
    format!("{FILE_ACCEPTED}\n\n{summary}")
}

pub fn is_supported_sales_file(file_name: &str) -> bool {
    let lowered = file_name.to_lowercase();
    SUPPORTED_SALES_EXTENSIONS.iter().any(|extension| lowered.ends_with(extension))
}

/// Confirmation shown once a paid tariff is active.
pub fn payment_success(tariff: &Tariff, record: &EntitlementRecord, now: DateTime<Utc>) -> String {
    let valid_until = record
        .subscription_expires_at
        .filter(|expires_at| *expires_at > now)
        .map(|expires_at| expires_at.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| "pending activation".to_owned());

    format!(
        "Payment successful ✅\nTariff: {}\nValid until: {valid_until}\n\nAvailable:\n\
         • Text requests: {}\n• Image generations: {}\n• Video scripts: {}\n• Presentations: {}\n\n\
         You can start working. Pick a section in the menu and give the AI marketer its first task.",
        tariff.name,
        limit_label(tariff.limit(UsageCategory::Text)),
        limit_label(tariff.limit(UsageCategory::Images)),
        limit_label(tariff.limit(UsageCategory::Video)),
        limit_label(tariff.limit(UsageCategory::Presentations)),
    )
}

fn limit_label(limit: QuotaLimit) -> String {
    match limit {
        QuotaLimit::Unlimited => "unlimited".to_owned(),
        QuotaLimit::Finite(value) => value.to_string(),
    }
}
