use crate::flows::diagnostic::Question;
use crate::flows::engine::{FlowDefinition, FlowTransitionError};
use crate::flows::states::{FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome};

pub const DEMO_QUESTIONS: [Question; 3] = [
    Question { key: "demo_prod", prompt: "1/3: In two sentences, what do you sell and to whom?" },
    Question {
        key: "demo_channels",
        prompt: "2/3: Where does your traffic come from right now? (channels)",
    },
    Question {
        key: "demo_goal",
        prompt: "3/3: What is your goal for the next 30-60 days? (revenue, leads, launch)",
    },
];

/// Demo funnel: a consent step, three short questions, then a hypotheses generation.
///
/// Any reply at the consent step other than a defer token counts as consent.
#[derive(Clone, Debug, Default)]
pub struct DemoFlow;

impl DemoFlow {
    pub fn questions(&self) -> &'static [Question] {
        &DEMO_QUESTIONS
    }
}

impl FlowDefinition for DemoFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::Demo
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
            AskQuestion, DiscardAnswers, GenerateIdeas, PromptConsent, RecordAnswer, ResetAnswers,
            ReturnToIdle,
        };
        use FlowState::{AwaitingAnswer, Consent, Finalizing, Idle};

        let total = DEMO_QUESTIONS.len();
        let (to, actions) = match (current, event) {
            (Idle, FlowEvent::Started) => (Consent, vec![ResetAnswers, PromptConsent]),
            (Consent, FlowEvent::Deferred) => (Idle, vec![ReturnToIdle]),
            (AwaitingAnswer { .. }, FlowEvent::Deferred) => {
                (Idle, vec![DiscardAnswers, ReturnToIdle])
            }
            (Consent, FlowEvent::Input(_)) => {
                (AwaitingAnswer { step: 1 }, vec![AskQuestion { index: 0 }])
            }
            (AwaitingAnswer { step }, FlowEvent::Input(value)) if (1..=total).contains(step) => {
                let key = DEMO_QUESTIONS[step - 1].key.to_owned();
                let record = RecordAnswer { key, value: value.clone() };
                if *step < total {
                    (AwaitingAnswer { step: step + 1 }, vec![record, AskQuestion { index: *step }])
                } else {
                    (Finalizing, vec![record, GenerateIdeas])
                }
            }
            (Finalizing, FlowEvent::Completed) => (Idle, vec![ReturnToIdle]),
            _ => return Err(FlowTransitionError::invalid(current, event)),
        };

        Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
    }

    fn step_index(&self, state: &FlowState) -> usize {
        match state {
            FlowState::Idle | FlowState::Consent => 0,
            FlowState::AwaitingAnswer { step } => *step,
            FlowState::AwaitingCompetitors | FlowState::Finalizing => DEMO_QUESTIONS.len() + 1,
        }
    }

    /// Sessions inside the demo at step 0 are waiting for consent.
    fn state_at(&self, step_index: usize) -> FlowState {
        match step_index {
            0 => FlowState::Consent,
            step if step <= DEMO_QUESTIONS.len() => FlowState::AwaitingAnswer { step },
            _ => FlowState::Finalizing,
        }
    }
}
