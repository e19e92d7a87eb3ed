use marketer_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use tracing::{info, warn};

/// Writes audit events to the structured log, one line per event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let user_id = event.user_id.as_ref().map(|user| user.as_str()).unwrap_or("unknown");
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        match event.outcome {
            AuditOutcome::Failed => warn!(
                event_name = "audit.event",
                audit_event = %event.event_type,
                audit_category = event.category.as_str(),
                correlation_id = %event.correlation_id,
                user_id,
                actor = %event.actor,
                outcome = "failed",
                metadata = %metadata,
                "audit"
            ),
            outcome => info!(
                event_name = "audit.event",
                audit_event = %event.event_type,
                audit_category = event.category.as_str(),
                correlation_id = %event.correlation_id,
                user_id,
                actor = %event.actor,
                outcome = if outcome == AuditOutcome::Success { "success" } else { "rejected" },
                metadata = %metadata,
                "audit"
            ),
        }
    }
}
