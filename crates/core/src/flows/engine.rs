use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{FlowEvent, FlowState, FlowType, TransitionOutcome};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;

    /// Numeric position persisted in the session for `state`.
    fn step_index(&self, state: &FlowState) -> usize;

    /// Inverse of `step_index` for a session already inside this flow.
    fn state_at(&self, step_index: usize) -> FlowState;
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn step_index(&self, state: &FlowState) -> usize {
        self.flow.step_index(state)
    }

    pub fn state_at(&self, step_index: usize) -> FlowState {
        self.flow.state_at(step_index)
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    audit
                        .event("flow.transition_applied", AuditCategory::Flow, AuditOutcome::Success)
                        .with_metadata("flow", self.flow_type().as_str())
                        .with_metadata("from", format!("{:?}", outcome.from))
                        .with_metadata("to", format!("{:?}", outcome.to))
                        .with_metadata("event", event_label(&outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event("flow.transition_rejected", AuditCategory::Flow, AuditOutcome::Rejected)
                        .with_metadata("flow", self.flow_type().as_str())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

/// Answer text stays out of audit metadata.
fn event_label(event: &FlowEvent) -> &'static str {
    match event {
        FlowEvent::Started => "Started",
        FlowEvent::Input(_) => "Input",
        FlowEvent::Deferred => "Deferred",
        FlowEvent::Completed => "Completed",
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

impl FlowTransitionError {
    pub(crate) fn invalid(state: &FlowState, event: &FlowEvent) -> Self {
        Self::InvalidTransition { state: state.clone(), event: event.clone() }
    }
}
