//! Dialogue runtime for the AI marketer bot.
//!
//! Every inbound message goes through one loop:
//! 1. **Routing** (`dispatcher`) - resolve (stage, message) to a handler
//! 2. **Gating** (`guardrails`, `entitlements`) - check tariff quotas before paid work
//! 3. **Generation** (`llm`, `report`, `conversation`) - build prompts and call the model
//! 4. **Replies** (`replies`) - transport-neutral messages with abstract keyboards
//!
//! `runtime::DialogueRuntime` wraps the dispatcher with per-user serialization and
//! session persistence, and is what transports talk to through `DialogueService`.
//!
//! The model only writes prose. Quotas, tariffs and flow transitions are decided by
//! `marketer-core`.

pub mod conversation;
pub mod dispatcher;
pub mod entitlements;
pub mod guardrails;
pub mod llm;
pub mod replies;
pub mod report;
pub mod runtime;

pub use dispatcher::Dispatcher;
pub use entitlements::EntitlementService;
pub use llm::{GenerationClient, GenerationError, GenerationRequest, OpenAiCompatibleClient};
pub use runtime::DialogueRuntime;
