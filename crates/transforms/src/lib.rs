//! Invert-aware transforms, rewrite rules and the hook lifecycle built on them.

pub mod document;
pub mod engine;
pub mod hooks;
pub mod interpreter;
pub mod library;
pub mod rule;
pub mod values;

use gravflip_core::{InstrId, TransformId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use document::{PredicateSpec, RuleDocument, RuleSetDocument};
pub use engine::{RewriteReport, RuleEngine, RuleOutcome};
pub use hooks::{
    HookHost, HookManager, HookRegistration, InstallError, LoadState, MethodCatalog,
    MethodDecoder, MethodId, MethodLoader, RegistrationState, SessionContext, SessionPolicy,
};
pub use interpreter::{HostCalls, Interpreter, NoHostCalls};
pub use rule::{OccurrenceSpec, Replacement, RewriteRule, RuleSet};

/// Transform error type encompassing rewrite, lifecycle and evaluation failures.
#[derive(Debug, Error)]
pub enum Error {
    /// Core operation failed.
    #[error("core operation failed: {0}")]
    Core(#[from] gravflip_core::Error),

    /// A rule that requires a match found none.
    #[error("rule `{rule}` found no match in {target}")]
    PatternNotFound { rule: String, target: String },

    /// Match count violates an `exactly`/`at_most` requirement.
    #[error("rule `{rule}` expected {expected} match(es) in {target}, found {found}")]
    OccurrenceCountMismatch {
        rule: String,
        target: String,
        expected: String,
        found: usize,
    },

    /// Same target registered twice before disposal.
    #[error("{0} is already registered")]
    DuplicateRegistration(String),

    /// The host loader rejected a patched body.
    #[error("installing patched body for {target} failed: {cause}")]
    Install {
        target: String,
        #[source]
        cause: InstallError,
    },

    /// Activation failed and restoring the targets patched before the failure failed too.
    #[error("{cause}; rollback failed: {rollback}")]
    RollbackFailed {
        #[source]
        cause: Box<Error>,
        rollback: Box<Error>,
    },

    /// Registration lifecycle violated.
    #[error("{target}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        target: String,
        from: RegistrationState,
        to: RegistrationState,
    },

    /// Method catalog has no such method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Host decoder could not produce a body.
    #[error("decoding {target} failed: {msg}")]
    Decode { target: String, msg: String },

    /// Wrong number of operands for a transform.
    #[error("transform {transform} expects {expected} operand(s), got {found}")]
    TransformArity {
        transform: TransformId,
        expected: usize,
        found: usize,
    },

    /// Operand of the wrong type for a transform.
    #[error("transform {transform} cannot take {found} operands")]
    TransformType {
        transform: TransformId,
        found: &'static str,
    },

    /// Reference interpreter failed.
    #[error("evaluation failed at {at}: {msg}")]
    Evaluation { at: InstrId, msg: String },

    /// Reference interpreter ran out of budget.
    #[error("evaluation exceeded {0} steps")]
    StepLimitExceeded(usize),

    /// Rule document is malformed.
    #[error("rule document error: {0}")]
    Document(String),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transform result type
pub type Result<T> = std::result::Result<T, Error>;

/// What `HookManager::activate` does with earlier installs when a later target fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// All targets are patched or none are.
    #[default]
    Transactional,
    /// Targets patched before the failure stay patched.
    Partial,
}

/// Configuration for rewriting and hook activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Failure handling across targets during activation
    pub load_policy: LoadPolicy,
    /// Check branch targets of every rewritten body before promoting it
    pub validate_branches: bool,
    /// Step budget for the reference interpreter
    pub max_eval_steps: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            load_policy: LoadPolicy::Transactional,
            validate_branches: true,
            max_eval_steps: 10_000,
        }
    }
}

impl HookConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
