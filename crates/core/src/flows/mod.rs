pub mod demo;
pub mod diagnostic;
pub mod engine;
pub mod states;

pub use demo::{DemoFlow, DEMO_QUESTIONS};
pub use diagnostic::{extract_links, DiagnosticFlow, Question, DIAGNOSTIC_QUESTIONS};
pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome};
