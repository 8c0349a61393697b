//! Lazy instruction materialization for body methods.
//!
//! The cache is filled once. Threads racing on first use may each lower
//! the scope, but only the first to take the write lock installs its
//! sequence; the others drop theirs and use the installed one, so every
//! caller observes the same sequence. Lowering runs outside the lock.
//! Failures are not cached.

use std::sync::Arc;

use super::BodyMethod;
use crate::config::{DebugFlags, RuntimeConfig};
use crate::engine::InstructionSequence;
use crate::errors::EvalError;

impl BodyMethod {
    /// The method's instruction sequence, materializing it on first use.
    pub fn ensure_instrs_ready(
        &self,
        config: &RuntimeConfig,
    ) -> Result<Arc<InstructionSequence>, EvalError> {
        if let Some(instrs) = self.instrs.read().as_ref() {
            return Ok(Arc::clone(instrs));
        }

        let prepared = Arc::new(InstructionSequence::prepare(
            &self.scope,
            self.engine.clone(),
        )?);

        {
            let mut slot = self.instrs.write();
            if let Some(installed) = slot.as_ref() {
                tracing::trace!(scope = %self.scope, "lost materialization race");
                return Ok(Arc::clone(installed));
            }
            *slot = Some(Arc::clone(&prepared));
        }

        tracing::debug!(
            scope = %self.scope,
            instrs = prepared.instrs().len(),
            explicit_call_protocol = prepared.has_explicit_call_protocol(),
            "materialized body"
        );
        if config.debug.contains(DebugFlags::IR) {
            tracing::info!(target: "garnet::ir", scope = %self.scope, "\n{}", prepared.listing());
        }
        Ok(prepared)
    }

    /// Whether the instruction sequence has been materialized.
    pub fn is_materialized(&self) -> bool {
        self.instrs.read().is_some()
    }
}
