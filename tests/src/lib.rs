//! Shared fixtures for the workspace tests.

use gravflip_core::decoder::parse_assembly;
use gravflip_core::InstructionStream;
use gravflip_gravity::{GravityChangeEvent, GravityCoordinator, GravityListener, ListenerResult};
use gravflip_transform::hooks::{
    InstallError, MethodCatalog, MethodDecoder, MethodId, MethodLoader,
};
use gravflip_transform::Error;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Installs a debug-level subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .with_test_writer()
        .try_init();
}

/// Parses assembly that is known to be valid.
pub fn body(asm: &str) -> InstructionStream {
    parse_assembly(asm).unwrap_or_else(|err| panic!("fixture assembly is invalid: {err}"))
}

/// In-memory host program: method bodies keyed by identity plus an install log.
#[derive(Default)]
pub struct MockHost {
    pub bodies: BTreeMap<MethodId, InstructionStream>,
    pub installs: Vec<MethodId>,
    pub reject: Option<MethodId>,
}

impl MockHost {
    pub fn with_method(mut self, owner: &str, signature: &str, asm: &str) -> Self {
        self.bodies.insert(MethodId::new(owner, signature), body(asm));
        self
    }

    pub fn body_of(&self, owner: &str, signature: &str) -> &InstructionStream {
        &self.bodies[&MethodId::new(owner, signature)]
    }
}

impl MethodCatalog for MockHost {
    fn resolve_method(&self, owner: &str, signature: &str) -> Option<MethodId> {
        let id = MethodId::new(owner, signature);
        self.bodies.contains_key(&id).then_some(id)
    }
}

impl MethodDecoder for MockHost {
    fn decode(&self, method: &MethodId) -> gravflip_transform::Result<InstructionStream> {
        self.bodies.get(method).cloned().ok_or_else(|| Error::Decode {
            target: method.to_string(),
            msg: "unknown method".into(),
        })
    }
}

impl MethodLoader for MockHost {
    fn install_patched(
        &mut self,
        method: &MethodId,
        body: InstructionStream,
    ) -> Result<(), InstallError> {
        if self.reject.as_ref() == Some(method) {
            return Err(InstallError::new("verifier rejected body"));
        }
        self.installs.push(method.clone());
        self.bodies.insert(method.clone(), body);
        Ok(())
    }
}

/// Listener that records every event it receives.
pub struct RecordingListener {
    pub name: String,
    pub events: RefCell<Vec<GravityChangeEvent>>,
}

impl RecordingListener {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<GravityChangeEvent> {
        self.events.borrow().clone()
    }
}

impl GravityListener for RecordingListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_gravity_changed(
        &self,
        event: GravityChangeEvent,
        _: &GravityCoordinator,
    ) -> ListenerResult {
        self.events.borrow_mut().push(event);
        Ok(())
    }
}
