//! Registration and batch activation of rule sets against host methods.
//!
//! The manager owns no opinion on *when* hooks should be active; that is the job of a
//! [`SessionPolicy`]. It only knows how to patch every registered target and how to put the
//! original bodies back.

use crate::engine::{RewriteReport, RuleEngine};
use crate::rule::RuleSet;
use crate::{Error, HookConfig, LoadPolicy, Result};
use gravflip_core::InstructionStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Identity of a method in the host program.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId {
    pub owner: String,
    pub signature: String,
}

impl MethodId {
    pub fn new(owner: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            signature: signature.into(),
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.signature)
    }
}

/// Rejection reported by the host loader, e.g. a verification failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct InstallError {
    pub reason: String,
}

impl InstallError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Resolves method identities.
pub trait MethodCatalog {
    fn resolve_method(&self, owner: &str, signature: &str) -> Option<MethodId>;
}

/// Produces the current body of a method.
pub trait MethodDecoder {
    fn decode(&self, method: &MethodId) -> Result<InstructionStream>;
}

/// Swaps a method body.
pub trait MethodLoader {
    fn install_patched(
        &mut self,
        method: &MethodId,
        body: InstructionStream,
    ) -> std::result::Result<(), InstallError>;
}

/// Everything the manager needs from the host.
pub trait HookHost: MethodCatalog + MethodDecoder + MethodLoader {}

impl<T: MethodCatalog + MethodDecoder + MethodLoader> HookHost for T {}

/// Description of the session the host is entering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl SessionContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Decides whether a session needs the hooks.
pub trait SessionPolicy {
    fn session_requires_hooks(&self, session: &SessionContext) -> bool;
}

impl<F> SessionPolicy for F
where
    F: Fn(&SessionContext) -> bool,
{
    fn session_requires_hooks(&self, session: &SessionContext) -> bool {
        self(session)
    }
}

/// Lifecycle of one registration within one load cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    Unregistered,
    Registered,
    Applied,
    Disposed,
}

impl RegistrationState {
    pub fn can_transition_to(self, next: RegistrationState) -> bool {
        use RegistrationState::*;
        matches!(
            (self, next),
            (Unregistered, Registered)
                | (Registered, Applied)
                | (Registered, Disposed)
                | (Applied, Disposed)
        )
    }
}

/// A rule set bound to one target for one load cycle.
///
/// A disposed registration is never reused; the manager creates a new one per activation.
#[derive(Debug)]
pub struct HookRegistration {
    target: MethodId,
    rule_set: Arc<RuleSet>,
    state: RegistrationState,
    original: Option<InstructionStream>,
    report: Option<RewriteReport>,
}

impl HookRegistration {
    pub fn new(target: MethodId, rule_set: Arc<RuleSet>) -> Self {
        Self {
            target,
            rule_set,
            state: RegistrationState::Unregistered,
            original: None,
            report: None,
        }
    }

    pub fn target(&self) -> &MethodId {
        &self.target
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn report(&self) -> Option<&RewriteReport> {
        self.report.as_ref()
    }

    fn transition(&mut self, next: RegistrationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                target: self.target.to_string(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn register(&mut self) -> Result<()> {
        self.transition(RegistrationState::Registered)
    }

    /// Decodes, rewrites and installs the target. The host keeps the original body if any
    /// step fails.
    pub fn apply(&mut self, engine: &RuleEngine, host: &mut dyn HookHost) -> Result<&RewriteReport> {
        if !self.state.can_transition_to(RegistrationState::Applied) {
            return Err(Error::InvalidTransition {
                target: self.target.to_string(),
                from: self.state,
                to: RegistrationState::Applied,
            });
        }

        let original = host.decode(&self.target)?;
        let (patched, report) = engine.rewrite(&self.target, &self.rule_set, &original)?;
        host.install_patched(&self.target, patched)
            .map_err(|cause| Error::Install {
                target: self.target.to_string(),
                cause,
            })?;

        self.transition(RegistrationState::Applied)?;
        self.original = Some(original);
        Ok(self.report.insert(report))
    }

    /// Reinstalls the original body of an applied registration and disposes it.
    ///
    /// When the host rejects the original body the registration stays applied, so the
    /// revert can be retried.
    pub fn revert(&mut self, host: &mut dyn HookHost) -> Result<()> {
        if !self.state.can_transition_to(RegistrationState::Disposed) {
            return Err(Error::InvalidTransition {
                target: self.target.to_string(),
                from: self.state,
                to: RegistrationState::Disposed,
            });
        }
        if let Some(original) = &self.original {
            host.install_patched(&self.target, original.clone())
                .map_err(|cause| Error::Install {
                    target: self.target.to_string(),
                    cause,
                })?;
        }
        self.original = None;
        self.transition(RegistrationState::Disposed)
    }

    pub fn dispose(&mut self) -> Result<()> {
        if self.state == RegistrationState::Applied {
            // applied bodies must go back through revert
            return Err(Error::InvalidTransition {
                target: self.target.to_string(),
                from: self.state,
                to: RegistrationState::Disposed,
            });
        }
        self.transition(RegistrationState::Disposed)
    }
}

/// Whether the registered hooks are currently installed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loaded,
}

#[derive(Debug, Default)]
pub struct HookManager {
    config: HookConfig,
    engine: RuleEngine,
    targets: Vec<(MethodId, Arc<RuleSet>)>,
    applied: Vec<HookRegistration>,
    state: LoadState,
}

impl HookManager {
    pub fn new(config: HookConfig) -> Self {
        Self {
            engine: RuleEngine::from_config(&config),
            config,
            targets: Vec::new(),
            applied: Vec::new(),
            state: LoadState::Unloaded,
        }
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// Binds `rule_set` to `target`. Takes effect at the next activation.
    pub fn register_rule_set(&mut self, target: MethodId, rule_set: RuleSet) -> Result<()> {
        if self.targets.iter().any(|(known, _)| *known == target) {
            return Err(Error::DuplicateRegistration(target.to_string()));
        }
        debug!("registered `{}` for {}", rule_set.name(), target);
        self.targets.push((target, Arc::new(rule_set)));
        Ok(())
    }

    /// Resolves `owner::signature` through the catalog, then registers.
    pub fn register_target(
        &mut self,
        catalog: &dyn MethodCatalog,
        owner: &str,
        signature: &str,
        rule_set: RuleSet,
    ) -> Result<MethodId> {
        let target = catalog
            .resolve_method(owner, signature)
            .ok_or_else(|| Error::MethodNotFound(format!("{owner}::{signature}")))?;
        self.register_rule_set(target.clone(), rule_set)?;
        Ok(target)
    }

    /// Removes a registration that is not currently applied. Returns false for unknown targets.
    pub fn unregister_rule_set(&mut self, target: &MethodId) -> Result<bool> {
        if self.applied.iter().any(|reg| reg.target() == target) {
            return Err(Error::InvalidTransition {
                target: target.to_string(),
                from: RegistrationState::Applied,
                to: RegistrationState::Unregistered,
            });
        }
        let before = self.targets.len();
        self.targets.retain(|(known, _)| known != target);
        Ok(self.targets.len() != before)
    }

    pub fn registered_targets(&self) -> impl Iterator<Item = &MethodId> {
        self.targets.iter().map(|(target, _)| target)
    }

    pub fn applied_targets(&self) -> impl Iterator<Item = &MethodId> {
        self.applied.iter().map(HookRegistration::target)
    }

    pub fn reports(&self) -> impl Iterator<Item = &RewriteReport> {
        self.applied.iter().filter_map(HookRegistration::report)
    }

    /// Patches every registered target in registration order. No-op when already loaded.
    pub fn activate(&mut self, host: &mut dyn HookHost) -> Result<()> {
        if self.is_loaded() {
            debug!("hooks already loaded");
            return Ok(());
        }

        let targets = self.targets.clone();
        for (target, rule_set) in targets {
            let mut registration = HookRegistration::new(target, rule_set);
            registration.register()?;
            let outcome = registration
                .apply(&self.engine, host)
                .map(RewriteReport::total_replaced);
            match outcome {
                Ok(sites) => {
                    info!("hooked {} ({} site(s))", registration.target(), sites);
                    self.applied.push(registration);
                }
                Err(err) => {
                    error!("failed to hook {}: {}", registration.target(), err);
                    // nothing was installed for this target
                    let _ = registration.dispose();
                    return Err(self.abort_activation(host, err));
                }
            }
        }

        self.state = LoadState::Loaded;
        info!("loaded {} hook(s)", self.applied.len());
        Ok(())
    }

    fn abort_activation(&mut self, host: &mut dyn HookHost, err: Error) -> Error {
        match self.config.load_policy {
            LoadPolicy::Transactional => {
                if !self.applied.is_empty() {
                    warn!("rolling back {} hook(s)", self.applied.len());
                }
                if let Some(rollback) = self.revert_all(host) {
                    // whatever could not be restored stays tracked for a later deactivate
                    self.state = LoadState::Loaded;
                    return Error::RollbackFailed {
                        cause: Box::new(err),
                        rollback: Box::new(rollback),
                    };
                }
            }
            LoadPolicy::Partial => {
                if !self.applied.is_empty() {
                    warn!(
                        "partial load: {} hook(s) remain applied",
                        self.applied.len()
                    );
                    self.state = LoadState::Loaded;
                }
            }
        }
        err
    }

    /// Restores every patched method, most recent first. No-op when unloaded.
    ///
    /// Methods the host refuses to restore stay applied and the manager stays loaded, so
    /// calling `deactivate` again retries them.
    pub fn deactivate(&mut self, host: &mut dyn HookHost) -> Result<()> {
        if !self.is_loaded() {
            debug!("hooks already unloaded");
            return Ok(());
        }
        let count = self.applied.len();
        if let Some(err) = self.revert_all(host) {
            warn!(
                "unloaded {} of {} hook(s); {} still applied",
                count - self.applied.len(),
                count,
                self.applied.len()
            );
            return Err(err);
        }
        self.state = LoadState::Unloaded;
        info!("unloaded {} hook(s)", count);
        Ok(())
    }

    /// Activates or deactivates according to `policy`. Returns whether hooks are required.
    pub fn sync_with_session(
        &mut self,
        policy: &dyn SessionPolicy,
        session: &SessionContext,
        host: &mut dyn HookHost,
    ) -> Result<bool> {
        let required = policy.session_requires_hooks(session);
        debug!("session `{}` requires hooks: {}", session.name, required);
        if required {
            self.activate(host)?;
        } else {
            self.deactivate(host)?;
        }
        Ok(required)
    }

    /// Reverts in LIFO order, continuing past failures. Registrations that could not be
    /// reverted are kept in `applied`. Returns the first failure.
    fn revert_all(&mut self, host: &mut dyn HookHost) -> Option<Error> {
        let mut first_error = None;
        let mut stuck = Vec::new();
        while let Some(mut registration) = self.applied.pop() {
            if let Err(err) = registration.revert(host) {
                error!("failed to restore {}: {}", registration.target(), err);
                first_error.get_or_insert(err);
                stuck.push(registration);
            }
        }
        stuck.reverse();
        self.applied = stuck;
        first_error
    }
}
