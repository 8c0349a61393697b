//! Call-protocol guard.
//!
//! Sequences lowered with an explicit call protocol push and pop their own
//! method frame; for every other sequence the caller runs the generic
//! pre step before dispatch and the post step after it. [`ProtocolGuard`]
//! makes the post step unconditional: it runs on drop, so it follows a
//! normal return, an error return and a panic alike, and it only runs if
//! the pre step did.

use std::ops::{Deref, DerefMut};

use crate::context::{CallContext, CallFrame};
use crate::errors::EvalError;

/// Guard that runs the post step on drop if the pre step ran.
pub struct ProtocolGuard<'ctx> {
    ctx: &'ctx mut CallContext,
    pushed: bool,
}

impl ProtocolGuard<'_> {
    /// Whether this guard pushed a frame.
    #[inline]
    pub fn pushed_frame(&self) -> bool {
        self.pushed
    }
}

impl Drop for ProtocolGuard<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.ctx.post_method_frame();
        }
    }
}

impl Deref for ProtocolGuard<'_> {
    type Target = CallContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ProtocolGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl CallContext {
    /// Enter the call protocol for one invocation.
    ///
    /// With `explicit_call_protocol` false, pushes the frame built by
    /// `frame` now and pops it when the guard drops. With it true, does
    /// nothing either way and `frame` is never called.
    ///
    /// A failing pre step leaves nothing pushed.
    pub fn protocol_frame<F>(
        &mut self,
        explicit_call_protocol: bool,
        frame: F,
    ) -> Result<ProtocolGuard<'_>, EvalError>
    where
        F: FnOnce() -> CallFrame,
    {
        let pushed = !explicit_call_protocol;
        if pushed {
            self.pre_method_frame(frame())?;
        }
        Ok(ProtocolGuard { ctx: self, pushed })
    }
}
