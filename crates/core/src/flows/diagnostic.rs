use std::sync::OnceLock;

use regex::Regex;

use crate::domain::session::COMPETITOR_LINK_LIMIT;
use crate::flows::engine::{FlowDefinition, FlowTransitionError};
use crate::flows::states::{FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Question {
    pub key: &'static str,
    pub prompt: &'static str,
}

pub const DIAGNOSTIC_QUESTIONS: [Question; 17] = [
    Question { key: "company_name", prompt: "What is your company or brand called?" },
    Question { key: "company_niche", prompt: "Which niche does the company work in?" },
    Question { key: "company_age", prompt: "How many years has the business been running?" },
    Question {
        key: "main_product",
        prompt: "What is your main product or service?\nDescribe in simple words what you sell and which problem it solves.",
    },
    Question {
        key: "product_value",
        prompt: "What is the key value of the product? What is the main benefit or result for the customer?",
    },
    Question { key: "product_strengths", prompt: "What are the three strongest sides of the product?" },
    Question {
        key: "product_weaknesses",
        prompt: "What are the weak sides or limitations of the product?",
    },
    Question {
        key: "product_diff",
        prompt: "How does your product differ from competitors?\n(1-2 objective differences)",
    },
    Question {
        key: "product_improve",
        prompt: "What do you want to improve or change in the product over the next 3 months?",
    },
    Question { key: "target_main", prompt: "Who is your main customer?\n(who buys and why)" },
    Question {
        key: "target_need",
        prompt: "Which task or need does the customer cover with your product?",
    },
    Question {
        key: "target_why_you",
        prompt: "Why do customers choose you?\n(1-2 key reasons)",
    },
    Question {
        key: "target_factors",
        prompt: "Which three factors influence the buying decision the most?",
    },
    Question {
        key: "traffic_channels",
        prompt: "Which customer acquisition channels do you use?",
    },
    Question { key: "traffic_analytics", prompt: "Do you track analytics?" },
    Question { key: "traffic_budget", prompt: "What is your monthly advertising budget?" },
    Question { key: "traffic_team", prompt: "Do you have a team for promotion?" },
];

/// Guided questionnaire: K questions, a competitor-links step, then finalization.
///
/// Step indices: `0` idle, `1..=K` waiting for answer `step - 1`, `K + 1` waiting for
/// competitor links, `K + 2` finalizing.
#[derive(Clone, Debug)]
pub struct DiagnosticFlow {
    questions: Vec<Question>,
}

impl Default for DiagnosticFlow {
    fn default() -> Self {
        Self::standard()
    }
}

impl DiagnosticFlow {
    pub fn standard() -> Self {
        Self::new(DIAGNOSTIC_QUESTIONS.to_vec())
    }

    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

impl FlowDefinition for DiagnosticFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::Diagnostic
    }

    fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        use FlowAction::{
            AskQuestion, AssembleReport, DiscardAnswers, NoCompetitorsFound,
            PromptCompetitorLinks, RecordAnswer, RecordCompetitors, ResetAnswers, ReturnToIdle,
        };
        use FlowState::{AwaitingAnswer, AwaitingCompetitors, Finalizing, Idle};

        let total = self.question_count();
        let (to, actions) = match (current, event) {
            (Idle, FlowEvent::Started) if total > 0 => {
                (AwaitingAnswer { step: 1 }, vec![ResetAnswers, AskQuestion { index: 0 }])
            }
            (AwaitingAnswer { .. } | AwaitingCompetitors, FlowEvent::Deferred) => {
                (Idle, vec![DiscardAnswers, ReturnToIdle])
            }
            (AwaitingAnswer { step }, FlowEvent::Input(value)) if (1..=total).contains(step) => {
                let key = self.questions[step - 1].key.to_owned();
                let record = RecordAnswer { key, value: value.clone() };
                if *step < total {
                    (AwaitingAnswer { step: step + 1 }, vec![record, AskQuestion { index: *step }])
                } else {
                    (AwaitingCompetitors, vec![record, PromptCompetitorLinks])
                }
            }
            (AwaitingCompetitors, FlowEvent::Input(value)) => {
                let links = extract_links(value);
                let recorded =
                    if links.is_empty() { NoCompetitorsFound } else { RecordCompetitors { links } };
                (Finalizing, vec![recorded, AssembleReport])
            }
            (Finalizing, FlowEvent::Completed) => (Idle, vec![ReturnToIdle]),
            _ => return Err(FlowTransitionError::invalid(current, event)),
        };

        Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
    }

    fn step_index(&self, state: &FlowState) -> usize {
        let total = self.question_count();
        match state {
            FlowState::Idle | FlowState::Consent => 0,
            FlowState::AwaitingAnswer { step } => *step,
            FlowState::AwaitingCompetitors => total + 1,
            FlowState::Finalizing => total + 2,
        }
    }

    fn state_at(&self, step_index: usize) -> FlowState {
        let total = self.question_count();
        match step_index {
            0 => FlowState::Idle,
            step if step <= total => FlowState::AwaitingAnswer { step },
            step if step == total + 1 => FlowState::AwaitingCompetitors,
            _ => FlowState::Finalizing,
        }
    }
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://\S+").expect("valid link regex"))
}

/// URL tokens in order of appearance, capped at the competitor link limit.
pub fn extract_links(text: &str) -> Vec<String> {
    link_pattern()
        .find_iter(text)
        .take(COMPETITOR_LINK_LIMIT)
        .map(|found| found.as_str().to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{extract_links, DiagnosticFlow, DIAGNOSTIC_QUESTIONS};
    use crate::flows::engine::{FlowDefinition, FlowEngine};
    use crate::flows::states::{FlowAction, FlowEvent, FlowState};

    #[test]
    fn full_run_visits_every_step_value_and_ends_idle() {
        let engine = FlowEngine::new(DiagnosticFlow::standard());
        let total = DIAGNOSTIC_QUESTIONS.len();
        let mut state = engine.initial_state();
        let mut visited = vec![engine.step_index(&state)];
        let mut recorded = 0;

        let outcome = engine.apply(&state, &FlowEvent::Started).expect("start");
        state = outcome.to;
        visited.push(engine.step_index(&state));

        for index in 0..total {
            let outcome = engine
                .apply(&state, &FlowEvent::Input(format!("answer {index}")))
                .expect("answer accepted");
            recorded += outcome
                .actions
                .iter()
                .filter(|action| matches!(action, FlowAction::RecordAnswer { .. }))
                .count();
            state = outcome.to;
            visited.push(engine.step_index(&state));
        }
        assert_eq!(state, FlowState::AwaitingCompetitors);

        let outcome = engine
            .apply(&state, &FlowEvent::Input("https://rival.example".to_owned()))
            .expect("links accepted");
        assert!(outcome.actions.contains(&FlowAction::AssembleReport));
        state = outcome.to;
        visited.push(engine.step_index(&state));

        state = engine.apply(&state, &FlowEvent::Completed).expect("completed").to;

        let distinct: BTreeSet<usize> = visited.iter().copied().collect();
        assert_eq!(distinct.len(), total + 3);
        assert_eq!(recorded, total);
        assert_eq!(state, FlowState::Idle);
        assert_eq!(engine.step_index(&state), 0);
    }

    #[test]
    fn step_indices_are_non_decreasing_within_a_run() {
        let flow = DiagnosticFlow::standard();
        let mut state = flow.transition(&FlowState::Idle, &FlowEvent::Started).expect("start").to;
        let mut last = flow.step_index(&state);
        while state != FlowState::Finalizing {
            state = flow.transition(&state, &FlowEvent::Input("ok".to_owned())).expect("step").to;
            let step = flow.step_index(&state);
            assert!(step > last);
            last = step;
        }
    }

    #[test]
    fn deferring_discards_answers_at_any_question() {
        let flow = DiagnosticFlow::standard();
        for step in 1..=DIAGNOSTIC_QUESTIONS.len() {
            let outcome = flow
                .transition(&FlowState::AwaitingAnswer { step }, &FlowEvent::Deferred)
                .expect("defer accepted");
            assert_eq!(outcome.to, FlowState::Idle);
            assert_eq!(outcome.actions, vec![FlowAction::DiscardAnswers, FlowAction::ReturnToIdle]);
            assert!(!outcome.actions.contains(&FlowAction::AssembleReport));
        }
    }

    #[test]
    fn last_answer_prompts_for_competitors() {
        let flow = DiagnosticFlow::standard();
        let total = DIAGNOSTIC_QUESTIONS.len();
        let outcome = flow
            .transition(
                &FlowState::AwaitingAnswer { step: total },
                &FlowEvent::Input("two people".to_owned()),
            )
            .expect("last answer");

        assert_eq!(outcome.to, FlowState::AwaitingCompetitors);
        assert_eq!(
            outcome.actions,
            vec![
                FlowAction::RecordAnswer {
                    key: "traffic_team".to_owned(),
                    value: "two people".to_owned()
                },
                FlowAction::PromptCompetitorLinks,
            ]
        );
    }

    #[test]
    fn missing_links_fall_back_gracefully() {
        let flow = DiagnosticFlow::standard();
        let outcome = flow
            .transition(&FlowState::AwaitingCompetitors, &FlowEvent::Input("no idea".to_owned()))
            .expect("links step");

        assert_eq!(outcome.actions, vec![FlowAction::NoCompetitorsFound, FlowAction::AssembleReport]);
    }

    #[test]
    fn link_extraction_keeps_first_five() {
        let text = "see https://a.example http://b.example, https://c.example/x?y=1 \
                    https://d.example https://e.example https://f.example";
        let links = extract_links(text);

        assert_eq!(links.len(), 5);
        assert_eq!(links[0], "https://a.example");
        assert_eq!(links[1], "http://b.example,");
        assert!(!links.iter().any(|link| link.contains("f.example")));
    }

    #[test]
    fn state_and_step_index_are_inverse() {
        let flow = DiagnosticFlow::standard();
        for step in 0..=DIAGNOSTIC_QUESTIONS.len() + 2 {
            assert_eq!(flow.step_index(&flow.state_at(step)), step);
        }
    }

    #[test]
    fn idle_input_is_rejected() {
        let flow = DiagnosticFlow::standard();
        assert!(flow.transition(&FlowState::Idle, &FlowEvent::Input("hi".to_owned())).is_err());
    }
}
