use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    Diagnostic,
    Demo,
}

impl FlowType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diagnostic => "diagnostic",
            Self::Demo => "demo",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Idle,
    Consent,
    /// Waiting for the answer to question `step - 1`.
    AwaitingAnswer { step: usize },
    AwaitingCompetitors,
    Finalizing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    Started,
    Input(String),
    Deferred,
    Completed,
}

const DEFER_TOKENS: [&str; 5] = ["later", "not now", "cancel", "позже", "отмена"];

impl FlowEvent {
    /// Classifies raw text: a bare "later" style token defers the flow, anything else is input.
    ///
    /// Only the whole message counts; "Later this year ..." is an answer.
    pub fn from_input(text: &str) -> Self {
        let normalized = text.trim().to_lowercase();
        let bare = normalized.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        if DEFER_TOKENS.contains(&bare) {
            Self::Deferred
        } else {
            Self::Input(text.trim().to_owned())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    ResetAnswers,
    PromptConsent,
    AskQuestion { index: usize },
    RecordAnswer { key: String, value: String },
    PromptCompetitorLinks,
    RecordCompetitors { links: Vec<String> },
    NoCompetitorsFound,
    AssembleReport,
    GenerateIdeas,
    DiscardAnswers,
    ReturnToIdle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}

#[cfg(test)]
mod tests {
    use super::FlowEvent;

    #[test]
    fn defer_tokens_match_the_whole_message() {
        assert_eq!(FlowEvent::from_input("Later"), FlowEvent::Deferred);
        assert_eq!(FlowEvent::from_input("later!"), FlowEvent::Deferred);
        assert_eq!(FlowEvent::from_input("  ПОЗЖЕ"), FlowEvent::Deferred);
        assert_eq!(FlowEvent::from_input("Not now..."), FlowEvent::Deferred);
        assert_eq!(FlowEvent::from_input("cancel "), FlowEvent::Deferred);
        assert_eq!(FlowEvent::from_input("Acme Coffee"), FlowEvent::Input("Acme Coffee".to_owned()));
    }

    #[test]
    fn answers_that_begin_with_a_token_are_input() {
        for answer in [
            "Later this year we want to open a second shop",
            "Cancellation rate is our main weakness",
            "Laterna Coffee",
            "Позже всех открылись в районе",
        ] {
            assert_eq!(FlowEvent::from_input(answer), FlowEvent::Input(answer.to_owned()), "{answer}");
        }
    }
}
