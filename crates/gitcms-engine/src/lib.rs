//! gitcms Engine - orchestration layer
//!
//! Coordinates the pure content kernel (`gitcms-core`) with a snapshot
//! repository (`gitcms-store`):
//! - `orchestrator`: the optimistic-concurrency commit loop
//! - `handler`: inbound batch validation, authorization and the rebuild hook
//! - `config`: environment-driven configuration

pub mod config;
pub mod handler;
pub mod orchestrator;

pub use config::{AppConfig, CommitConfig, RebuildConfig, ServerConfig};
pub use handler::{
    validate_batch, AllowAll, Authorizer, BatchHandler, CommitRequest, CommitResponse,
    EditRequest, ErrorResponse, NoopRebuildTrigger, Principal, RebuildMode, RebuildNotice,
    RebuildTrigger, Role, RolePolicy, WebhookRebuildTrigger,
};
pub use orchestrator::{CommitOrchestrator, CommitOutcome};
