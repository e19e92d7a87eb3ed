use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marketer_agent::llm::{
    GenerationClient, GenerationError, GenerationRequest, ScriptedGenerationClient,
};
use marketer_agent::replies;
use marketer_agent::{DialogueRuntime, Dispatcher, EntitlementService};
use marketer_core::audit::{AuditContext, InMemoryAuditSink};
use marketer_core::dialogue::{
    Command, DialogueService, GenerationTask, IncomingMessage, Keyboard, OutgoingMessage,
};
use marketer_core::domain::entitlement::{UsageCategory, UserId};
use marketer_core::domain::session::{Stage, UserSession, CHAT_HISTORY_LIMIT};
use marketer_core::entitlement::EntitlementEngine;
use marketer_core::flows::DIAGNOSTIC_QUESTIONS;
use marketer_core::payments::DisabledPaymentGateway;
use marketer_db::{InMemoryEntitlementRepository, InMemorySessionRepository, SessionRepository};
use tokio::sync::Notify;

const USER: &str = "4242";

struct Harness {
    runtime: DialogueRuntime,
    generator: Arc<ScriptedGenerationClient>,
    entitlements: Arc<EntitlementService>,
    sessions: Arc<InMemorySessionRepository>,
    audit: InMemoryAuditSink,
}

impl Harness {
    fn new(generator: ScriptedGenerationClient) -> Self {
        let audit = InMemoryAuditSink::default();
        let generator = Arc::new(generator);
        let sessions = Arc::new(InMemorySessionRepository::default());
        let entitlements = Arc::new(EntitlementService::new(
            EntitlementEngine::default(),
            Arc::new(InMemoryEntitlementRepository::default()),
            Arc::new(audit.clone()),
        ));
        let dispatcher = Dispatcher::new(
            entitlements.clone(),
            generator.clone(),
            Arc::new(DisabledPaymentGateway),
            Arc::new(audit.clone()),
            0.7,
        )
        .expect("dispatcher builds");
        let runtime = DialogueRuntime::new(dispatcher, sessions.clone(), Arc::new(audit.clone()));
        Self { runtime, generator, entitlements, sessions, audit }
    }

    async fn activate(&self, tariff: &str) {
        let audit = AuditContext::new(Some(UserId::from(USER)), "setup", "test");
        self.entitlements
            .activate_tariff(&UserId::from(USER), None, tariff, &audit)
            .await
            .expect("tariff activates");
    }

    async fn text(&self, text: &str) -> Vec<OutgoingMessage> {
        self.runtime.handle(IncomingMessage::text(USER, "upd", text, None)).await
    }

    async fn action(&self, command: Command) -> Vec<OutgoingMessage> {
        self.runtime.handle(IncomingMessage::action(USER, "cb", command)).await
    }

    async fn session(&self) -> UserSession {
        self.sessions.load(&UserId::from(USER)).await.expect("session loads")
    }

    async fn usage(&self, category: UsageCategory) -> u32 {
        self.entitlements.record(&UserId::from(USER), None).await.usage(category)
    }
}

/// Holds the first generation open until the test releases it; later calls answer at once.
#[derive(Default)]
struct HeldGenerationClient {
    started: Notify,
    release: Notify,
    requests: std::sync::Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationClient for HeldGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().expect("requests lock").push(request);
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok("Slide 1: the hook".to_owned())
    }
}

fn bodies(replies: &[OutgoingMessage]) -> Vec<&str> {
    replies.iter().map(OutgoingMessage::body).collect()
}

#[tokio::test]
async fn presentation_quota_allows_exactly_the_tariff_limit() {
    let harness = Harness::new(ScriptedGenerationClient::always("Slide 1: the hook"));
    harness.activate("content_studio").await;

    for _ in 0..3 {
        harness.action(Command::BeginTask(GenerationTask::GenPresentation)).await;
        let replies = harness.text("pitch deck for a bakery").await;
        assert_eq!(replies[0], OutgoingMessage::generated("Slide 1: the hook"));
    }

    let denied = harness.action(Command::BeginTask(GenerationTask::GenPresentation)).await;

    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].keyboard(), Some(&Keyboard::Tariffs));
    assert!(denied[0].body().contains("Current status: Content Studio"));
    assert_eq!(harness.generator.call_count(), 3);
    assert_eq!(harness.usage(UsageCategory::Presentations).await, 3);
    assert_eq!(harness.session().await.stage, Stage::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_messages_cannot_overspend_the_last_presentation() {
    let user = UserId::from(USER);
    let audit = InMemoryAuditSink::default();
    let generator = Arc::new(HeldGenerationClient::default());
    let sessions = Arc::new(InMemorySessionRepository::default());
    let entitlements = Arc::new(EntitlementService::new(
        EntitlementEngine::default(),
        Arc::new(InMemoryEntitlementRepository::default()),
        Arc::new(audit.clone()),
    ));
    let dispatcher = Dispatcher::new(
        entitlements.clone(),
        generator.clone(),
        Arc::new(DisabledPaymentGateway),
        Arc::new(audit.clone()),
        0.7,
    )
    .expect("dispatcher builds");
    let runtime =
        Arc::new(DialogueRuntime::new(dispatcher, sessions.clone(), Arc::new(audit.clone())));

    let setup = AuditContext::new(Some(user.clone()), "setup", "test");
    entitlements
        .activate_tariff(&user, None, "content_studio", &setup)
        .await
        .expect("tariff activates");
    for _ in 0..2 {
        entitlements.register_usage(&user, None, UsageCategory::Presentations, &setup).await;
    }
    let parked =
        UserSession { stage: GenerationTask::GenPresentation.stage(), ..UserSession::default() };
    sessions.save(&user, parked).await.expect("session saves");

    let send = |correlation_id: &'static str| {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            runtime.handle(IncomingMessage::text(USER, correlation_id, "deck", None)).await
        })
    };
    let first = send("upd-1");
    generator.started.notified().await;
    let second = send("upd-2");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1, "second turn must wait for the first");

    generator.release.notify_one();
    first.await.expect("first turn completes");
    second.await.expect("second turn completes");

    let presentation_prompt = GenerationTask::GenPresentation.prompt("deck");
    let gated_runs = generator
        .requests
        .lock()
        .expect("requests lock")
        .iter()
        .filter(|request| request.last_user_text() == Some(presentation_prompt.as_str()))
        .count();
    assert_eq!(gated_runs, 1);
    assert_eq!(
        entitlements.record(&user, None).await.usage(UsageCategory::Presentations),
        3
    );
}

#[tokio::test]
async fn diagnostic_walks_every_step_and_assembles_one_report() {
    let report = "Short summary\n\nProduct: a strong core offer\n# Sales\nSales rely on referrals";
    let harness = Harness::new(ScriptedGenerationClient::always(report));
    let total = DIAGNOSTIC_QUESTIONS.len();

    let replies = harness.action(Command::StartDiagnostic).await;
    assert!(replies[0].body().starts_with(replies::DIAGNOSTIC_BEGIN));
    assert!(replies[0].body().ends_with(DIAGNOSTIC_QUESTIONS[0].prompt));

    let mut steps = vec![harness.session().await.step_index];
    for index in 0..total {
        harness.text(&format!("answer {index}")).await;
        steps.push(harness.session().await.step_index);
    }
    assert_eq!(steps, (1..=total + 1).collect::<Vec<_>>());

    let replies = harness.text("see https://rival.example and https://other.example").await;
    let texts = bodies(&replies);

    assert_eq!(texts[0], replies::COMPETITOR_LINKS_RECEIVED);
    assert_eq!(texts[1], replies::REPORT_IN_PROGRESS);
    assert_eq!(texts[2], report);
    assert_eq!(texts.last().copied(), Some(replies::REPORT_FOLLOW_UP));
    assert_eq!(harness.generator.call_count(), 1);

    let session = harness.session().await;
    assert_eq!(session.stage, Stage::Idle);
    assert_eq!(session.step_index, 0);
    assert_eq!(session.answers.len(), total);
    assert_eq!(session.competitor_links, vec!["https://rival.example", "https://other.example"]);
    assert!(session.has_report());
    assert!(session.free_chat_active);
}

#[tokio::test]
async fn deferring_the_diagnostic_discards_answers_without_generating() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));

    harness.action(Command::StartDiagnostic).await;
    harness.text("Acme Bakery").await;
    harness.text("Bakeries").await;
    let replies = harness.text("later").await;

    assert_eq!(bodies(&replies), vec![replies::DIAGNOSTIC_LATER]);
    let session = harness.session().await;
    assert_eq!(session.stage, Stage::Idle);
    assert!(session.answers.is_empty());
    assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn answers_starting_with_a_defer_word_advance_the_diagnostic() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));
    harness.action(Command::StartDiagnostic).await;

    harness.text("Laterna Coffee").await;
    let replies = harness.text("Later this year we want to open a second shop").await;

    assert_eq!(bodies(&replies), vec![DIAGNOSTIC_QUESTIONS[2].prompt]);
    let session = harness.session().await;
    assert_eq!(session.stage, Stage::DiagRunning);
    assert_eq!(session.step_index, 3);
    assert_eq!(session.answers.get("company_name").map(String::as_str), Some("Laterna Coffee"));
    assert_eq!(
        session.answers.get("company_niche").map(String::as_str),
        Some("Later this year we want to open a second shop")
    );
}

#[tokio::test]
async fn stored_diag_complete_session_behaves_like_idle() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));
    let parked = UserSession { stage: Stage::DiagComplete, ..UserSession::default() };
    harness.sessions.save(&UserId::from(USER), parked).await.expect("session saves");

    let replies = harness.text("hello").await;

    assert_eq!(bodies(&replies), vec![replies::FALLBACK]);
    assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn menu_labels_typed_inside_the_diagnostic_are_answers() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));
    harness.action(Command::StartDiagnostic).await;

    harness
        .runtime
        .handle(IncomingMessage::text(USER, "upd", "Tariffs", Some(Command::Tariffs)))
        .await;

    let session = harness.session().await;
    assert_eq!(session.stage, Stage::DiagRunning);
    assert_eq!(session.answers.get(DIAGNOSTIC_QUESTIONS[0].key).map(String::as_str), Some("Tariffs"));
}

#[tokio::test]
async fn start_command_abandons_any_flow() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));
    harness.action(Command::StartDiagnostic).await;
    harness.text("Acme Bakery").await;

    let replies = harness
        .runtime
        .handle(IncomingMessage::text(USER, "upd", "/start", Some(Command::Start)))
        .await;

    assert_eq!(bodies(&replies), vec![replies::WELCOME, replies::DIAGNOSTIC_PITCH]);
    assert_eq!(harness.session().await, UserSession::default());
}

#[tokio::test]
async fn free_chat_keeps_the_latest_history_window() {
    let harness = Harness::new(ScriptedGenerationClient::always("keep testing offers"));
    let session = UserSession { free_chat_active: true, ..UserSession::default() };
    harness.sessions.save(&UserId::from(USER), session).await.expect("seed session");

    for turn in 0..20 {
        harness.text(&format!("question {turn}")).await;
    }

    let session = harness.session().await;
    assert_eq!(session.chat_history.len(), CHAT_HISTORY_LIMIT);
    assert_eq!(session.chat_history[0].text, "question 14");
    assert_eq!(harness.generator.call_count(), 20);
}

#[tokio::test]
async fn failed_generation_consumes_no_quota() {
    let harness = Harness::new(ScriptedGenerationClient::new([Err(GenerationError::EmptyReply)]));
    harness.activate("marketing_pro").await;

    harness.action(Command::BeginTask(GenerationTask::GenImage)).await;
    let replies = harness.text("banner for a spring sale").await;

    assert_eq!(bodies(&replies), vec![replies::SERVICE_ERROR]);
    assert_eq!(harness.usage(UsageCategory::Images).await, 0);
    assert_eq!(harness.session().await.stage, Stage::Idle);
    assert_eq!(harness.audit.events_of_type("generation.failed").len(), 1);
    assert_eq!(harness.audit.events_of_type("dialogue.turn_failed").len(), 1);
}

#[tokio::test]
async fn denied_access_is_never_registered_as_usage() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));

    let replies = harness.action(Command::BeginTask(GenerationTask::GenImage)).await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].body().contains("Current status: Free mode"));
    assert_eq!(harness.session().await.stage, Stage::Idle);
    assert_eq!(harness.usage(UsageCategory::Images).await, 0);
    assert_eq!(harness.generator.call_count(), 0);
    assert_eq!(harness.audit.events_of_type("entitlement.access_denied").len(), 1);
    assert!(harness.audit.events_of_type("entitlement.usage_registered").is_empty());
}

#[tokio::test]
async fn disabled_payments_point_to_the_manager() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));

    let replies = harness.action(Command::Pay("start".to_owned())).await;

    assert_eq!(bodies(&replies), vec![replies::PAYMENT_DISABLED]);
    assert_eq!(replies[0].keyboard(), Some(&Keyboard::Contact));
    assert_eq!(harness.session().await.pending_payment_service, None);
}

#[tokio::test]
async fn report_sections_need_a_finished_diagnostic() {
    let harness = Harness::new(ScriptedGenerationClient::always("unused"));

    let replies = harness
        .action(Command::ReportSection(marketer_core::domain::report::ReportTopic::Sales))
        .await;

    assert_eq!(bodies(&replies), vec![replies::REPORT_MISSING]);
}
