pub mod audit;
pub mod config;
pub mod dialogue;
pub mod domain;
pub mod entitlement;
pub mod errors;
pub mod flows;
pub mod payments;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use dialogue::{Command, DialogueService, IncomingMessage, Keyboard, OutgoingMessage};
pub use domain::entitlement::{EntitlementRecord, UsageCategory, UserId};
pub use domain::session::{Stage, UserSession};
pub use domain::tariff::{QuotaLimit, Tariff, TariffCatalog};
pub use entitlement::{AccessDecision, DenialReason, EntitlementEngine};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{DemoFlow, DiagnosticFlow, FlowEngine};
pub use payments::{PaymentGateway, PaymentLink, PaymentRequest};
