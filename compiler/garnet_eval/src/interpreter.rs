//! Reference engine for lowered body instructions.
//!
//! Executes the `garnet_ir::Instr` set directly. Nested `module`/`class`
//! definitions are run through their own [`BodyMethod`], created the first
//! time the definition is reached and reused afterwards, so repeated runs
//! of the same code reopen the same module and reuse its instructions.
//!
//! Frames pushed by `PushFrame` belong to the running sequence: if the
//! sequence fails or panics before its `PopFrame`, `OwnFrames` pops them on
//! the way out.
//!
//! Cached bodies hold a downgraded engine handle, so dropping the last
//! owning handle frees the interpreter and every body it defined.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use garnet_ir::{Instr, IrScope, ModuleKind, ModuleRef, ScopeId, ScopeKind, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::body_method::BodyMethod;
use crate::context::{CallContext, CallFrame};
use crate::engine::{Engine, InstructionSequence, Invocation, SharedEngine};
use crate::errors::{frame_underflow, raised, EvalResult};
use crate::method::{CallInfo, DynamicMethod};

/// Tree-free interpreter over `Instr` sequences.
#[derive(Default)]
pub struct Interpreter {
    bodies: Mutex<FxHashMap<ScopeId, Arc<BodyMethod>>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh interpreter behind a shared engine handle.
    pub fn shared() -> SharedEngine {
        SharedEngine::new(Self::new())
    }

    /// Number of distinct bodies defined so far.
    pub fn defined_bodies(&self) -> usize {
        self.bodies.lock().len()
    }

    /// The body method for `scope`, created on first use.
    fn body_for(
        &self,
        scope: &Arc<IrScope>,
        lexical_parent: Option<&ModuleRef>,
        engine: &SharedEngine,
    ) -> Arc<BodyMethod> {
        let mut bodies = self.bodies.lock();
        let body = bodies.entry(scope.id()).or_insert_with(|| {
            let kind = match scope.kind() {
                ScopeKind::ClassBody => ModuleKind::Class,
                ScopeKind::MetaclassBody => ModuleKind::Singleton,
                _ => ModuleKind::Module,
            };
            let module = match lexical_parent {
                Some(parent) => ModuleRef::nested(parent, scope.name(), kind),
                None => ModuleRef::new(scope.name(), kind),
            };
            tracing::debug!(module = %module, "defined body");
            Arc::new(BodyMethod::new(Arc::clone(scope), module, engine.downgrade()))
        });
        Arc::clone(body)
    }

    fn define_body(
        &self,
        ctx: &mut CallContext,
        invocation: &Invocation<'_>,
        instrs: &InstructionSequence,
        scope: &Arc<IrScope>,
    ) -> EvalResult {
        let parent = match invocation.call.recv {
            Value::Module(module) => Some(module),
            _ => None,
        };
        let body = self.body_for(scope, parent, instrs.engine());
        let module = body.implementation_class().clone();
        let recv = Value::Module(module.clone());
        body.call0(ctx, CallInfo::new(&recv, &module, scope.name()))
    }

    fn run(
        &self,
        frames: &mut OwnFrames<'_>,
        invocation: &Invocation<'_>,
        instrs: &InstructionSequence,
    ) -> EvalResult {
        let mut last = Value::Nil;
        for instr in instrs.instrs() {
            match instr {
                Instr::Line(line) => frames.set_line(*line),
                Instr::PutObject(value) => last = value.clone(),
                Instr::PutSelf => last = invocation.call.recv.clone(),
                Instr::PushFrame => {
                    frames.pre_method_frame(CallFrame {
                        implementation_class: invocation.token.class().clone(),
                        name: invocation.call.name.to_owned(),
                        receiver: invocation.call.recv.clone(),
                        block: invocation.block.clone(),
                    })?;
                    frames.pushed += 1;
                }
                Instr::PopFrame => {
                    if frames.pushed == 0 {
                        return Err(frames.attach_backtrace(frame_underflow()));
                    }
                    frames.post_method_frame();
                    frames.pushed -= 1;
                }
                Instr::DefineBody(scope) => {
                    last = self.define_body(frames, invocation, instrs, scope)?;
                }
                Instr::Raise(message) => {
                    return Err(frames.attach_backtrace(raised(message.as_str())));
                }
            }
        }
        Ok(last)
    }
}

impl Engine for Interpreter {
    fn interpret(
        &self,
        ctx: &mut CallContext,
        invocation: &Invocation<'_>,
        instrs: &InstructionSequence,
    ) -> EvalResult {
        let mut frames = OwnFrames { ctx, pushed: 0 };
        self.run(&mut frames, invocation, instrs).inspect_err(|err| {
            tracing::debug!(error = %err, "body failed");
        })
    }
}

/// Frames a sequence pushed for itself and has not popped yet.
///
/// Pops them on drop, so they are released on error returns and panics.
struct OwnFrames<'ctx> {
    ctx: &'ctx mut CallContext,
    pushed: usize,
}

impl Drop for OwnFrames<'_> {
    fn drop(&mut self) {
        for _ in 0..self.pushed {
            self.ctx.post_method_frame();
        }
    }
}

impl Deref for OwnFrames<'_> {
    type Target = CallContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for OwnFrames<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

#[cfg(test)]
mod tests;
