//! RAII backtrace frames.
//!
//! [`BacktraceGuard`] pushes a `(label, file, line)` entry when created and
//! pops it when dropped, including during unwinding. The guard holds
//! `&mut CallContext` and implements `Deref`/`DerefMut`, so the guarded work
//! runs through it.
//!
//! ```text
//! ctx.with_backtrace("Widget", &file, ctx.line(), |ctx| {
//!     engine.interpret(ctx, &invocation, &instrs)
//! })
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::context::CallContext;
use crate::errors::EvalError;

/// Guard that pops one backtrace entry on drop.
pub struct BacktraceGuard<'ctx> {
    ctx: &'ctx mut CallContext,
}

impl Drop for BacktraceGuard<'_> {
    fn drop(&mut self) {
        self.ctx.pop_backtrace();
    }
}

impl Deref for BacktraceGuard<'_> {
    type Target = CallContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for BacktraceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl CallContext {
    /// Push a backtrace entry, popped when the returned guard drops.
    pub fn backtraced(&mut self, label: &str, file: &Arc<str>, line: u32) -> BacktraceGuard<'_> {
        self.push_backtrace(label, file, line);
        BacktraceGuard { ctx: self }
    }

    /// Run `body` under a backtrace entry.
    ///
    /// `body` runs with stack growth enabled, since it usually interprets a
    /// body that may open further bodies. A failure leaving `body` gets the
    /// current backtrace (this entry included) attached if it has none yet.
    /// The entry is popped on every exit path.
    pub fn with_backtrace<T, F>(
        &mut self,
        label: &str,
        file: &Arc<str>,
        line: u32,
        body: F,
    ) -> Result<T, EvalError>
    where
        F: FnOnce(&mut CallContext) -> Result<T, EvalError>,
    {
        let mut guard = self.backtraced(label, file, line);
        let result = garnet_stack::ensure_sufficient_stack(|| body(&mut *guard));
        result.map_err(|err| guard.attach_backtrace(err))
    }
}
