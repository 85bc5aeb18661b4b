//! `mova-core` — execution core for the MOVA workflow engine.
//!
//! Interprets declarative JSON "envelopes" of ordered side-effectful actions
//! under configurable retry, budget, policy, and security constraints. This
//! crate is the engine, not the service: an HTTP gateway, CLI, or SDK is
//! expected to sit on top of [`Executor`] and the other public types here.

pub mod actions;
pub mod budget;
pub mod cancellation;
pub mod context;
pub mod dlq;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod observability;
pub mod policy;
pub mod retry;
pub mod rules;
pub mod run_registry;
pub mod security;

pub use cancellation::CancellationToken;
pub use context::{ActionResult, ActionStatus, ExecutionContext, ExecutionLog, LogLevel, RunStatus};
pub use dlq::{DlqEntry, DlqFilter, DlqStatus, DlqStore, FilesystemDlqStore};
pub use envelope::{Action, ActionKind, ActionRetryOverride, Envelope, Intent};
pub use error::{MovaError, Result};
pub use executor::Executor;
pub use policy::{Policy, PolicyEngine};
pub use retry::profile::RetryProfile;
pub use rules::{Rule, RuleAction, RuleCondition};
pub use run_registry::RunRegistry;
pub use security::SecurityConfig;
