use std::collections::BTreeMap;
use std::sync::OnceLock;

use marketer_core::dialogue::CompetitorFocus;
use marketer_core::domain::report::{ReportDocument, ReportTopic, MISSING_SECTION_TEXT};
use marketer_core::domain::session::UserSession;
use regex::Regex;
use tera::{Context, Tera};
use thiserror::Error;

const REPORT_TEMPLATE: &str = "Build the final AI marketer 360° report across 7 directions (short, to the point):
Directions: Product, Clients (TA), Sales, Marketing, Team, Competitors, Numbers.
At the end, priorities for 30 days (5 items).

User answers (JSON): {{ answers }}
Sales file analytics (if any): {{ sales }}
Competitor links: {{ links }}
Style: clear, no Markdown, don't use * and #.";

const COMPETITOR_TEMPLATE: &str = "Give a short review of competitors in the user's niche.
Links/hints:
{{ links }}

Focus: {{ focus }}
Format: 1) Observations 2) Differences 3) Risks 4) Opportunities 5) 3 steps to outrun competitors.";

const PLAN_TEMPLATE: &str = "Build a step-by-step 30-day plan for implementing the priorities: week by week, tasks, responsible roles, success metrics, expected effect, checklist.
Inputs (short): {{ answers }}";

const PLAN_ANSWERS_LIMIT: usize = 1200;
pub const REPORT_FILE_NAME: &str = "ai_marketer_360_report";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report template error: {0}")]
    Template(String),
}

/// Builds generation prompts from collected answers and splits generated reports into topics.
#[derive(Debug)]
pub struct ReportAssembler {
    tera: Tera,
}

impl ReportAssembler {
    pub fn new() -> Result<Self, ReportError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("report_prompt.txt", REPORT_TEMPLATE),
            ("competitor_prompt.txt", COMPETITOR_TEMPLATE),
            ("plan_prompt.txt", PLAN_TEMPLATE),
        ])
        .map_err(|error| ReportError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    pub fn report_prompt(&self, session: &UserSession) -> Result<String, ReportError> {
        let mut context = Context::new();
        context.insert("answers", &session.answers_json());
        context.insert(
            "sales",
            session
                .sales_summary
                .as_deref()
                .unwrap_or("No sales file. I recommend an export to find losses."),
        );
        let links = if session.competitor_links.is_empty() {
            "none".to_owned()
        } else {
            session.competitor_links.join(", ")
        };
        context.insert("links", &links);
        self.render("report_prompt.txt", &context)
    }

    pub fn competitor_prompt(
        &self,
        focus: CompetitorFocus,
        links: &[String],
    ) -> Result<String, ReportError> {
        let mut context = Context::new();
        let links = if links.is_empty() {
            "No links; pick analogues by niche.".to_owned()
        } else {
            links.join("\n")
        };
        context.insert("links", &links);
        context.insert("focus", focus.label());
        self.render("competitor_prompt.txt", &context)
    }

    pub fn plan_prompt(&self, session: &UserSession) -> Result<String, ReportError> {
        let answers: String = session.answers_json().chars().take(PLAN_ANSWERS_LIMIT).collect();
        let mut context = Context::new();
        context.insert("answers", &answers);
        self.render("plan_prompt.txt", &context)
    }

    /// Export request for the stored report, one section per topic in display order.
    pub fn document(&self, session: &UserSession, recipient: &str) -> Option<ReportDocument> {
        let report = session.report_text.as_ref()?;
        let sections = ReportTopic::ALL
            .into_iter()
            .map(|topic| {
                let body = session
                    .report_sections
                    .get(&topic)
                    .cloned()
                    .unwrap_or_else(|| MISSING_SECTION_TEXT.to_owned());
                (topic.label().to_owned(), body)
            })
            .collect();

        Some(ReportDocument {
            file_name: REPORT_FILE_NAME.to_owned(),
            title: "AI Marketer 360° report".to_owned(),
            recipient: recipient.to_owned(),
            summary: summary_of(report),
            sections,
        })
    }

    fn render(&self, template: &str, context: &Context) -> Result<String, ReportError> {
        self.tera.render(template, context).map_err(|error| ReportError::Template(error.to_string()))
    }
}

fn topic_patterns() -> &'static [(ReportTopic, Regex)] {
    static PATTERNS: OnceLock<Vec<(ReportTopic, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ReportTopic::ALL
            .into_iter()
            .map(|topic| {
                let pattern = format!(r"(?is)({}.*?)(?:\n#|\z)", topic_keywords(topic));
                (topic, Regex::new(&pattern).expect("valid report section regex"))
            })
            .collect()
    })
}

fn topic_keywords(topic: ReportTopic) -> &'static str {
    match topic {
        ReportTopic::Product => "product",
        ReportTopic::TargetAudience => "(?:target|client)",
        ReportTopic::Sales => "sales",
        ReportTopic::Marketing => "marketing",
        ReportTopic::Team => "team",
        ReportTopic::Competitors => "competitor",
        ReportTopic::NumbersAnalytics => "(?:numbers|analytic)",
        ReportTopic::Priorities => "(?:priorit|30 days|steps)",
    }
}

/// First match per topic wins. Topics the report never mentions are absent.
pub fn extract_sections(report: &str) -> BTreeMap<ReportTopic, String> {
    topic_patterns()
        .iter()
        .filter_map(|(topic, pattern)| {
            pattern
                .captures(report)
                .and_then(|captures| captures.get(1))
                .map(|found| found.as_str().trim().to_owned())
                .filter(|body| !body.is_empty())
                .map(|body| (*topic, body))
        })
        .collect()
}

fn summary_of(report: &str) -> String {
    report
        .split("\n\n")
        .map(str::trim)
        .find(|paragraph| !paragraph.is_empty())
        .unwrap_or_default()
        .to_owned()
}
