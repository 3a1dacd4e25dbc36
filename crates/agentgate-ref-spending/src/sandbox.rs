//! An in-process stand-in for the sandboxed code host.
//!
//! `LocalSandbox` maps code CIDs to `LocalProgram`s and implements the
//! `PhaseRunner` trait from agentgate-core. It encodes each program's
//! `PhaseResponse` to bytes exactly as a remote host would, so the pipeline
//! decodes and validates it the same way. Every call is logged for
//! inspection by scenarios and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use agentgate_contracts::{
    context::PhaseContext,
    descriptor::Phase,
    error::SandboxError,
    identity::Cid,
    outcome::PhaseResponse,
};
use agentgate_core::traits::PhaseRunner;

/// Ability or policy code that runs inside the local sandbox.
pub trait LocalProgram: Send + Sync {
    fn run(&self, phase: Phase, context: &PhaseContext) -> Result<PhaseResponse, SandboxError>;
}

#[derive(Default)]
pub struct LocalSandbox {
    programs: HashMap<Cid, Arc<dyn LocalProgram>>,
    calls: Mutex<Vec<(String, Phase)>>,
}

impl LocalSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `program` under `cid`, replacing any earlier one.
    pub fn install(&mut self, cid: Cid, program: Arc<dyn LocalProgram>) {
        self.programs.insert(cid, program);
    }

    /// (package name, phase) of every call so far, in call order.
    pub fn calls(&self) -> Vec<(String, Phase)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// True when `package` ran `phase` at least once.
    pub fn ran(&self, package: &str, phase: Phase) -> bool {
        self.calls()
            .iter()
            .any(|(name, p)| name == package && *p == phase)
    }
}

#[async_trait]
impl PhaseRunner for LocalSandbox {
    async fn run_phase(
        &self,
        code_cid: &Cid,
        phase: Phase,
        context: &PhaseContext,
    ) -> Result<Vec<u8>, SandboxError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((context.entity.package_name.clone(), phase));
        }

        let program = self
            .programs
            .get(code_cid)
            .ok_or_else(|| SandboxError::new(format!("no code installed for CID '{code_cid}'")))?;

        debug!(
            invocation_id = %context.invocation_id,
            cid = %code_cid,
            phase = %phase,
            "running local program"
        );

        program.run(phase, context).map(|response| response.to_bytes())
    }
}
