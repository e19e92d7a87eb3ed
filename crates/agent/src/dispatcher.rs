use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use marketer_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use marketer_core::dialogue::{
    Command, CompetitorFocus, GenerationTask, Inbound, IncomingMessage, Keyboard,
    OutgoingMessage, AUTOMATION_ROADMAP_PROMPT,
};
use marketer_core::domain::entitlement::UsageCategory;
use marketer_core::domain::report::{ReportTopic, MISSING_SECTION_TEXT};
use marketer_core::domain::session::{Stage, UserSession};
use marketer_core::errors::{ApplicationError, DomainError};
use marketer_core::flows::{
    DemoFlow, DiagnosticFlow, FlowAction, FlowEngine, FlowEvent, FlowState, DEMO_QUESTIONS,
};
use marketer_core::payments::{PaymentGateway, PaymentRequest};
use tracing::{info, warn};

use crate::conversation::{FreeChat, FREE_CHAT_HINT};
use crate::entitlements::EntitlementService;
use crate::guardrails::GateDecision;
use crate::llm::{GenerationClient, GenerationRequest};
use crate::replies;
use crate::report::{extract_sections, ReportAssembler};

/// Per-message context: who is talking, the audit scope and the replies so far.
struct Turn<'a> {
    message: &'a IncomingMessage,
    audit: AuditContext,
    replies: &'a mut Vec<OutgoingMessage>,
}

impl Turn<'_> {
    fn username(&self) -> Option<&str> {
        self.message.username.as_deref()
    }

    fn say(&mut self, reply: OutgoingMessage) {
        self.replies.push(reply);
    }

    fn say_with(&mut self, text: impl Into<String>, keyboard: Keyboard) {
        self.replies.push(OutgoingMessage::with_keyboard(text, keyboard));
    }
}

/// Resolves (stage, message) to a handler and runs it against the caller's session.
///
/// Replies produced before an error stay in `replies`; the caller decides what to do with
/// the session after a failure.
pub struct Dispatcher {
    entitlements: Arc<EntitlementService>,
    generator: Arc<dyn GenerationClient>,
    payments: Arc<dyn PaymentGateway>,
    audit: Arc<dyn AuditSink>,
    reports: ReportAssembler,
    diagnostic: FlowEngine<DiagnosticFlow>,
    demo: FlowEngine<DemoFlow>,
    free_chat: FreeChat,
    temperature: f32,
}

impl Dispatcher {
    pub fn new(
        entitlements: Arc<EntitlementService>,
        generator: Arc<dyn GenerationClient>,
        payments: Arc<dyn PaymentGateway>,
        audit: Arc<dyn AuditSink>,
        temperature: f32,
    ) -> Result<Self, ApplicationError> {
        let reports =
            ReportAssembler::new().map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self {
            entitlements,
            generator,
            payments,
            audit,
            reports,
            diagnostic: FlowEngine::new(DiagnosticFlow::standard()),
            demo: FlowEngine::new(DemoFlow),
            free_chat: FreeChat::new(temperature),
            temperature,
        })
    }

    pub fn entitlements(&self) -> &EntitlementService {
        &self.entitlements
    }

    pub async fn dispatch(
        &self,
        session: &mut UserSession,
        message: &IncomingMessage,
        replies: &mut Vec<OutgoingMessage>,
    ) -> Result<(), ApplicationError> {
        let audit = AuditContext::new(
            Some(message.user_id.clone()),
            message.correlation_id.clone(),
            "dialogue",
        );
        let mut turn = Turn { message, audit, replies };

        match &message.content {
            Inbound::Text { command: Some(command), .. } | Inbound::Action(command)
                if command.is_global() =>
            {
                self.handle_global(session, command, &mut turn);
                Ok(())
            }
            // Inside a strict flow a typed menu label is an answer, not navigation.
            Inbound::Text { text, command: Some(_) } if session.stage.is_strict_flow() => {
                self.handle_stage_text(session, text, &mut turn).await
            }
            Inbound::Text { command: Some(command), .. } | Inbound::Action(command) => {
                self.handle_command(session, command, &mut turn).await
            }
            Inbound::Text { text, command: None } => {
                self.handle_stage_text(session, text, &mut turn).await
            }
            Inbound::Attachment { file_name, summary } => {
                self.handle_attachment(session, file_name, summary.as_deref(), &mut turn);
                Ok(())
            }
        }
    }

    fn handle_global(&self, session: &mut UserSession, command: &Command, turn: &mut Turn<'_>) {
        session.reset();
        match command {
            Command::Start => {
                turn.say_with(replies::WELCOME, Keyboard::MainMenu);
                turn.say_with(replies::DIAGNOSTIC_PITCH, Keyboard::StartDiagnostic);
            }
            Command::Help => turn.say_with(replies::HELP, Keyboard::MainMenu),
            Command::Cancel => turn.say_with(replies::CANCELLED, Keyboard::MainMenu),
            _ => turn.say_with(replies::MAIN_MENU, Keyboard::MainMenu),
        }
    }

    async fn handle_command(
        &self,
        session: &mut UserSession,
        command: &Command,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        info!(
            event_name = "dialogue.command",
            correlation_id = %turn.audit.correlation_id,
            command = command.name(),
            stage = session.stage.as_str(),
            "dialogue command resolved"
        );

        match command {
            Command::Start | Command::Help | Command::Cancel | Command::MainMenu => {
                self.handle_global(session, command, turn);
            }
            Command::StartDiagnostic => {
                self.advance_diagnostic(session, FlowState::Idle, FlowEvent::Started, turn).await?;
            }
            Command::StartDemo => {
                if self.gate(UsageCategory::Text, turn).await {
                    self.advance_demo(session, FlowState::Idle, FlowEvent::Started, turn).await?;
                }
            }
            Command::AiMarketerMenu => turn.say_with(replies::CHOOSE_ACTION, Keyboard::AiMarketerMenu),
            Command::ContentMenu => turn.say_with(replies::CONTENT_MENU, Keyboard::ContentMenu),
            Command::CopywritingMenu => {
                turn.say_with(replies::COPYWRITING_MENU, Keyboard::CopywritingMenu)
            }
            Command::Services | Command::Tariffs | Command::TariffBack => {
                turn.say_with(self.entitlements.engine().catalog().overview(), Keyboard::Tariffs);
            }
            Command::TariffMore => turn.say_with(replies::TARIFFS_MORE, Keyboard::Tariffs),
            Command::TariffDetails(code) => match self.entitlements.engine().catalog().get(code) {
                Some(tariff) => turn.say_with(
                    tariff.description(),
                    Keyboard::TariffDetails { code: tariff.code.clone() },
                ),
                None => turn
                    .say_with(self.entitlements.engine().catalog().overview(), Keyboard::Tariffs),
            },
            Command::Capabilities => turn.say_with(replies::CAPABILITIES, Keyboard::AuxMenu),
            Command::Cases => turn.say_with(replies::CASES, Keyboard::CasesMenu),
            Command::Contact => turn.say_with(replies::CONTACT, Keyboard::Contact),
            Command::Support => turn.say_with(replies::SUPPORT, Keyboard::Support),
            Command::HowICanHelp => turn.say_with(replies::HOW_I_CAN_HELP, Keyboard::AuxMenu),
            Command::GrowthStrategy => {
                turn.say_with(replies::GROWTH_STRATEGY, Keyboard::StrategyTeaser)
            }
            Command::AiTools => turn.say_with(replies::AI_TOOLS, Keyboard::AuxMenu),
            Command::UploadSales => {
                session.stage = Stage::AwaitSalesFile;
                session.step_index = 0;
                turn.say_with(replies::UPLOAD_SALES, Keyboard::UploadSales);
            }
            Command::SkipUpload => {
                session.leave_flow();
                turn.say_with(replies::UPLOAD_SKIPPED, Keyboard::MainMenu);
            }
            Command::BeginTask(task) => {
                if self.gate(task.category(), turn).await {
                    session.stage = task.stage();
                    session.step_index = 0;
                    turn.say_with(task.intro(), Keyboard::BackToMain);
                }
            }
            Command::AutomationRoadmap => {
                self.gated_one_shot(
                    session,
                    AUTOMATION_ROADMAP_PROMPT.to_owned(),
                    "automation_roadmap",
                    turn,
                )
                .await?;
            }
            Command::ReportSection(topic) => self.show_report_section(session, *topic, turn),
            Command::ExportReport => self.export_report(session, turn),
            Command::GetReport => self.regenerate_report(session, turn).await?,
            Command::Plan30Days => {
                let prompt = self.reports.plan_prompt(session).map_err(template_failure)?;
                self.gated_one_shot(session, prompt, "plan_30d", turn).await?;
            }
            Command::CompetitorReview(focus) => self.competitor_review(session, *focus, turn).await?,
            Command::CompetitorBack => turn.say(OutgoingMessage::text(replies::COMPETITOR_BACK)),
            Command::Pay(code) => self.start_payment(session, code, turn).await,
            Command::ConfirmPayment(code) => self.confirm_payment(session, code, turn).await,
            Command::ApplyPromo(code) => self.apply_promo(session, code, turn),
            Command::RequestPresentation => {
                info!(
                    event_name = "lead.presentation_requested",
                    correlation_id = %turn.audit.correlation_id,
                    user_id = %turn.message.user_id,
                    "presentation requested"
                );
                self.audit.emit(turn.audit.event(
                    "lead.presentation_requested",
                    AuditCategory::Ingress,
                    AuditOutcome::Success,
                ));
                turn.say(OutgoingMessage::text(replies::PRESENTATION_REQUESTED));
            }
        }
        Ok(())
    }

    async fn handle_stage_text(
        &self,
        session: &mut UserSession,
        text: &str,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        match session.stage {
            Stage::DiagRunning => self.diagnostic_input(session, text, turn).await,
            Stage::Demo => self.demo_input(session, text, turn).await,
            stage => match GenerationTask::for_stage(stage) {
                Some(task) => self.run_task(session, task, text, turn).await,
                None if session.free_chat_active => self.chat_turn(session, text, turn).await,
                None => {
                    turn.say_with(replies::FALLBACK, Keyboard::MainMenu);
                    Ok(())
                }
            },
        }
    }

    fn handle_attachment(
        &self,
        session: &mut UserSession,
        file_name: &str,
        summary: Option<&str>,
        turn: &mut Turn<'_>,
    ) {
        if session.stage != Stage::AwaitSalesFile {
            turn.say_with(replies::FILE_NOT_EXPECTED, Keyboard::AuxMenu);
            return;
        }
        if !replies::is_supported_sales_file(file_name) {
            turn.say(OutgoingMessage::text(replies::FILE_UNSUPPORTED));
            return;
        }
        match summary {
            Some(summary) => {
                session.sales_summary = Some(summary.to_owned());
                session.leave_flow();
                turn.say_with(replies::sales_file_received(summary), Keyboard::AuxMenu);
            }
            None => {
                warn!(
                    event_name = "dialogue.attachment_unreadable",
                    correlation_id = %turn.audit.correlation_id,
                    file_name,
                    "sales file could not be summarised"
                );
                turn.say(OutgoingMessage::text(replies::FILE_FAILED));
            }
        }
    }

    async fn gate(&self, category: UsageCategory, turn: &mut Turn<'_>) -> bool {
        let (decision, record) = self
            .entitlements
            .check_access(&turn.message.user_id, turn.username(), category, &turn.audit)
            .await;
        let status = self.entitlements.engine().status_label(&record, Utc::now());
        let gate = GateDecision::evaluate(&decision, &status);

        if let GateDecision::Deny { reason_code, fallback_path, .. } = &gate {
            info!(
                event_name = "dialogue.gate_denied",
                correlation_id = %turn.audit.correlation_id,
                category = category.as_str(),
                reason_code = *reason_code,
                fallback_path = *fallback_path,
                "gated capability denied"
            );
        }
        if let Some(reply) = gate.reply() {
            turn.say(reply);
        }
        gate.is_allowed()
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        purpose: &'static str,
        turn: &Turn<'_>,
    ) -> Result<String, ApplicationError> {
        match self.generator.generate(request).await {
            Ok(answer) => Ok(answer),
            Err(error) => {
                warn!(
                    event_name = "generation.failed",
                    correlation_id = %turn.audit.correlation_id,
                    purpose,
                    error = %error,
                    "generation failed"
                );
                self.audit.emit(
                    turn.audit
                        .event("generation.failed", AuditCategory::System, AuditOutcome::Failed)
                        .with_metadata("purpose", purpose),
                );
                Err(ApplicationError::Generation(error.to_string()))
            }
        }
    }

    /// Sends a generated answer and makes it the start of a fresh free-chat context.
    async fn deliver(
        &self,
        session: &mut UserSession,
        input: Option<&str>,
        answer: String,
        turn: &mut Turn<'_>,
    ) {
        self.entitlements
            .append_history(&turn.message.user_id, turn.username(), input.unwrap_or_default(), &answer)
            .await;
        session.restart_chat(input, &answer);
        turn.say(OutgoingMessage::generated(answer));
        turn.say_with(FREE_CHAT_HINT, Keyboard::BackToMain);
    }

    async fn gated_one_shot(
        &self,
        session: &mut UserSession,
        prompt: String,
        purpose: &'static str,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        if !self.gate(UsageCategory::Text, turn).await {
            return Ok(());
        }
        let answer =
            self.generate(GenerationRequest::prompt(prompt, self.temperature), purpose, turn).await?;
        let input = match &turn.message.content {
            Inbound::Text { text, .. } => Some(text.trim().to_owned()),
            _ => None,
        };
        session.leave_flow();
        self.deliver(session, input.as_deref(), answer, turn).await;
        Ok(())
    }

    async fn run_task(
        &self,
        session: &mut UserSession,
        task: GenerationTask,
        text: &str,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let category = task.category();
        if !self.gate(category, turn).await {
            session.leave_flow();
            return Ok(());
        }

        let request = GenerationRequest::prompt(task.prompt(text), self.temperature);
        let answer = self.generate(request, task.as_str(), turn).await?;
        self.entitlements
            .register_usage(&turn.message.user_id, turn.username(), category, &turn.audit)
            .await;

        session.leave_flow();
        self.deliver(session, Some(text.trim()), answer, turn).await;
        Ok(())
    }

    async fn chat_turn(
        &self,
        session: &mut UserSession,
        text: &str,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let request = self.free_chat.begin_turn(session, text);
        let answer = self.generate(request, "free_chat", turn).await?;
        self.free_chat.finish_turn(session, &answer);
        self.entitlements
            .append_history(&turn.message.user_id, turn.username(), text.trim(), &answer)
            .await;

        turn.say(OutgoingMessage::generated(answer));
        turn.say_with(FREE_CHAT_HINT, Keyboard::BackToMain);
        Ok(())
    }

    async fn diagnostic_input(
        &self,
        session: &mut UserSession,
        text: &str,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let state = self.diagnostic.state_at(session.step_index);
        let event = FlowEvent::from_input(text);

        if state == FlowState::Idle {
            session.leave_flow();
            let reply = if event == FlowEvent::Deferred {
                replies::DIAGNOSTIC_LATER
            } else {
                replies::DIAGNOSTIC_NOT_STARTED
            };
            turn.say_with(reply, Keyboard::MainMenu);
            return Ok(());
        }
        self.advance_diagnostic(session, state, event, turn).await
    }

    async fn advance_diagnostic(
        &self,
        session: &mut UserSession,
        from: FlowState,
        event: FlowEvent,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let outcome = self
            .diagnostic
            .apply_with_audit(&from, &event, self.audit.as_ref(), &turn.audit)
            .map_err(DomainError::from)?;
        session.stage = Stage::DiagRunning;
        session.step_index = self.diagnostic.step_index(&outcome.to);

        for action in outcome.actions {
            match action {
                FlowAction::ResetAnswers => {
                    session.answers.clear();
                    session.competitor_links.clear();
                    session.report_text = None;
                    session.report_sections.clear();
                    session.free_chat_active = false;
                    session.chat_history.clear();
                }
                FlowAction::AskQuestion { index } => {
                    let prompt =
                        self.diagnostic.flow().question(index).map(|question| question.prompt);
                    let prompt = prompt.unwrap_or_default();
                    let text = if index == 0 {
                        replies::diagnostic_start(prompt)
                    } else {
                        prompt.to_owned()
                    };
                    turn.say_with(text, Keyboard::BackToMain);
                }
                FlowAction::RecordAnswer { key, value } => {
                    session.answers.insert(key, value);
                }
                FlowAction::PromptCompetitorLinks => {
                    turn.say(OutgoingMessage::text(replies::COMPETITOR_LINKS_PROMPT));
                }
                FlowAction::RecordCompetitors { links } => {
                    session.competitor_links = links;
                    turn.say(OutgoingMessage::text(replies::COMPETITOR_LINKS_RECEIVED));
                }
                FlowAction::NoCompetitorsFound => {
                    session.competitor_links.clear();
                    turn.say(OutgoingMessage::text(replies::COMPETITOR_LINKS_MISSING));
                }
                FlowAction::AssembleReport => {
                    self.finalize_diagnostic(session, &outcome.to, turn).await?;
                }
                FlowAction::DiscardAnswers => {
                    session.answers.clear();
                    session.competitor_links.clear();
                }
                FlowAction::ReturnToIdle => {
                    session.leave_flow();
                    turn.say_with(replies::DIAGNOSTIC_LATER, Keyboard::MainMenu);
                }
                FlowAction::PromptConsent | FlowAction::GenerateIdeas => {}
            }
        }
        Ok(())
    }

    async fn finalize_diagnostic(
        &self,
        session: &mut UserSession,
        state: &FlowState,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        turn.say(OutgoingMessage::text(replies::REPORT_IN_PROGRESS));
        let prompt = self.reports.report_prompt(session).map_err(template_failure)?;
        let report = self
            .generate(GenerationRequest::prompt(prompt, self.temperature), "diagnostic_report", turn)
            .await?;
        self.store_report(session, &report);

        self.diagnostic
            .apply_with_audit(state, &FlowEvent::Completed, self.audit.as_ref(), &turn.audit)
            .map_err(DomainError::from)?;
        session.leave_flow();

        info!(
            event_name = "diagnostic.completed",
            correlation_id = %turn.audit.correlation_id,
            answers = session.answers.len(),
            competitor_links = session.competitor_links.len(),
            sections = session.report_sections.len(),
            "diagnostic report assembled"
        );
        self.deliver(session, None, report, turn).await;
        turn.say_with(replies::REPORT_FOLLOW_UP, Keyboard::ReportMenu);
        Ok(())
    }

    fn store_report(&self, session: &mut UserSession, report: &str) {
        session.report_text = Some(report.to_owned());
        session.report_sections = extract_sections(report);
    }

    async fn regenerate_report(
        &self,
        session: &mut UserSession,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let prompt = self.reports.report_prompt(session).map_err(template_failure)?;
        let report =
            self.generate(GenerationRequest::prompt(prompt, self.temperature), "report", turn).await?;
        self.store_report(session, &report);

        session.leave_flow();
        turn.say(OutgoingMessage::text(replies::REPORT_READY));
        self.deliver(session, None, report, turn).await;
        Ok(())
    }

    fn show_report_section(&self, session: &UserSession, topic: ReportTopic, turn: &mut Turn<'_>) {
        if !session.has_report() {
            turn.say_with(replies::REPORT_MISSING, Keyboard::MainMenu);
            return;
        }
        let body =
            session.report_sections.get(&topic).map(String::as_str).unwrap_or(MISSING_SECTION_TEXT);
        turn.say(OutgoingMessage::Generated {
            text: replies::report_section(topic.label(), body),
            keyboard: Some(Keyboard::ReportMenu),
        });
        if topic == ReportTopic::Competitors {
            turn.say_with(replies::COMPETITOR_FOCUS_PROMPT, Keyboard::CompetitorFocus);
        }
    }

    fn export_report(&self, session: &UserSession, turn: &mut Turn<'_>) {
        let message = turn.message;
        let recipient = message
            .username
            .as_deref()
            .map(|username| format!("@{username}"))
            .unwrap_or_else(|| format!("id:{}", message.user_id));

        match self.reports.document(session, &recipient) {
            Some(document) => turn.say(OutgoingMessage::Document {
                document,
                caption: replies::REPORT_EXPORT_CAPTION.to_owned(),
            }),
            None => turn.say_with(replies::REPORT_MISSING, Keyboard::MainMenu),
        }
    }

    async fn competitor_review(
        &self,
        session: &mut UserSession,
        focus: CompetitorFocus,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let prompt = self
            .reports
            .competitor_prompt(focus, &session.competitor_links)
            .map_err(template_failure)?;
        self.gated_one_shot(session, prompt, "competitor_review", turn).await
    }

    async fn demo_input(
        &self,
        session: &mut UserSession,
        text: &str,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let state = self.demo.state_at(session.step_index);
        self.advance_demo(session, state, FlowEvent::from_input(text), turn).await
    }

    async fn advance_demo(
        &self,
        session: &mut UserSession,
        from: FlowState,
        event: FlowEvent,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        let outcome = self
            .demo
            .apply_with_audit(&from, &event, self.audit.as_ref(), &turn.audit)
            .map_err(DomainError::from)?;
        session.stage = Stage::Demo;
        session.step_index = self.demo.step_index(&outcome.to);

        for action in outcome.actions {
            match action {
                FlowAction::ResetAnswers | FlowAction::DiscardAnswers => {
                    session.demo_answers.clear();
                }
                FlowAction::PromptConsent => {
                    turn.say_with(replies::DEMO_CONSENT, Keyboard::BackToMain);
                }
                FlowAction::AskQuestion { index } => {
                    if let Some(question) = DEMO_QUESTIONS.get(index) {
                        turn.say_with(question.prompt, Keyboard::BackToMain);
                    }
                }
                FlowAction::RecordAnswer { key, value } => {
                    session.demo_answers.insert(key, value);
                }
                FlowAction::GenerateIdeas => {
                    self.generate_demo_ideas(session, &outcome.to, turn).await?;
                }
                FlowAction::ReturnToIdle => {
                    session.leave_flow();
                    turn.say_with(replies::DIAGNOSTIC_LATER, Keyboard::MainMenu);
                }
                FlowAction::PromptCompetitorLinks
                | FlowAction::RecordCompetitors { .. }
                | FlowAction::NoCompetitorsFound
                | FlowAction::AssembleReport => {}
            }
        }
        Ok(())
    }

    async fn generate_demo_ideas(
        &self,
        session: &mut UserSession,
        state: &FlowState,
        turn: &mut Turn<'_>,
    ) -> Result<(), ApplicationError> {
        if !self.gate(UsageCategory::Text, turn).await {
            session.leave_flow();
            return Ok(());
        }
        let prompt = demo_prompt(&session.demo_answers);
        let ideas = self
            .generate(GenerationRequest::prompt(prompt, self.temperature), "demo_ideas", turn)
            .await?;

        self.demo
            .apply_with_audit(state, &FlowEvent::Completed, self.audit.as_ref(), &turn.audit)
            .map_err(DomainError::from)?;
        session.leave_flow();

        let goal = session.demo_answers.get("demo_goal").cloned();
        self.deliver(session, goal.as_deref(), format!("{}{ideas}", replies::DEMO_IDEAS_PREFIX), turn)
            .await;
        Ok(())
    }

    async fn start_payment(&self, session: &mut UserSession, code: &str, turn: &mut Turn<'_>) {
        let request = PaymentRequest {
            service_code: code.to_owned(),
            user_id: turn.message.user_id.clone(),
            promo_code: session.promo_code.clone(),
        };

        match self.payments.build_payment(request).await {
            Ok(Some(link)) => {
                info!(
                    event_name = "payment.link_created",
                    correlation_id = %turn.audit.correlation_id,
                    service_code = code,
                    amount = %link.amount,
                    "payment link created"
                );
                self.audit.emit(
                    turn.audit
                        .event("payment.link_created", AuditCategory::Payment, AuditOutcome::Success)
                        .with_metadata("service_code", code)
                        .with_metadata("amount", link.amount.to_string()),
                );
                session.pending_payment_service = Some(code.to_owned());
                let confirm_code =
                    self.entitlements.engine().catalog().contains(code).then(|| code.to_owned());
                turn.say_with(
                    replies::PAYMENT_LINK_READY,
                    Keyboard::Payment { url: link.redirect_url, confirm_code },
                );
            }
            Ok(None) => turn.say_with(replies::PAYMENT_DISABLED, Keyboard::Contact),
            Err(error) => {
                warn!(
                    event_name = "payment.link_failed",
                    correlation_id = %turn.audit.correlation_id,
                    service_code = code,
                    error = %error,
                    "payment link creation failed"
                );
                self.audit.emit(
                    turn.audit
                        .event("payment.link_failed", AuditCategory::Payment, AuditOutcome::Failed)
                        .with_metadata("service_code", code),
                );
                turn.say_with(replies::PAYMENT_FAILED, Keyboard::Contact);
            }
        }
    }

    /// Reports what the entitlement store says. The button press alone never activates.
    async fn confirm_payment(&self, session: &mut UserSession, code: &str, turn: &mut Turn<'_>) {
        let record = self.entitlements.record(&turn.message.user_id, turn.username()).await;
        let now = Utc::now();

        match self.entitlements.engine().catalog().get(code) {
            Some(tariff) if record.tariff_code() == code && record.has_active_subscription(now) => {
                session.pending_payment_service = None;
                turn.say_with(replies::payment_success(tariff, &record, now), Keyboard::PostPayment);
            }
            _ => turn.say_with(replies::PAYMENT_NOT_CONFIRMED, Keyboard::Contact),
        }
    }

    fn apply_promo(&self, session: &mut UserSession, code: &str, turn: &mut Turn<'_>) {
        match self.entitlements.engine().resolve_promo(code) {
            Some(promo) => {
                turn.say_with(replies::promo_applied(&promo.code), Keyboard::Tariffs);
                session.promo_code = Some(promo.code);
            }
            None => {
                session.promo_code = None;
                turn.say_with(replies::PROMO_UNKNOWN, Keyboard::Tariffs);
            }
        }
    }
}

fn template_failure(error: crate::report::ReportError) -> ApplicationError {
    ApplicationError::Integration(error.to_string())
}

fn demo_prompt(answers: &BTreeMap<String, String>) -> String {
    let answer = |key: &str| answers.get(key).map(String::as_str).unwrap_or_default();
    format!(
        "Generate 6 quick growth hypotheses for 30-60 days, with priorities and expected effect.\n\
         Business: {}\nChannels now: {}\nGoal: {}\n\
         Format: numbered list, each with idea, why, metric, first step.",
        answer("demo_prod"),
        answer("demo_channels"),
        answer("demo_goal"),
    )
}
