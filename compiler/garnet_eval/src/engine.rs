//! Engines and the instruction sequences they execute.
//!
//! An [`InstructionSequence`] is the executable form of a scope: the
//! lowered instructions, where they came from, whether they embed their own
//! call protocol, and the engine that runs them. Sequences are built once
//! per body method and shared behind `Arc`.

use std::fmt;
use std::sync::{Arc, Weak};

use garnet_ir::{Block, Instr, IrScope, ModuleRef, Value};

use crate::context::CallContext;
use crate::errors::{engine_dropped, materialization_failed, EvalError, EvalResult};
use crate::method::CallInfo;

/// How the tiering machinery may treat an invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationToken {
    /// Interpreted only; carries the class the call was made through.
    Uncompilable(ModuleRef),
}

impl InvocationToken {
    pub fn class(&self) -> &ModuleRef {
        match self {
            InvocationToken::Uncompilable(class) => class,
        }
    }
}

/// Everything an engine needs to know about the call it is running.
#[derive(Copy, Clone, Debug)]
pub struct Invocation<'a> {
    /// Call site, receiver, class, and the name the sequence runs under.
    pub call: CallInfo<'a>,
    pub token: &'a InvocationToken,
    /// Implicit receiver for closures; `None` for method bodies.
    pub implicit_self: Option<&'a Value>,
    pub block: &'a Block,
}

/// Executes instruction sequences.
pub trait Engine: Send + Sync {
    fn interpret(
        &self,
        ctx: &mut CallContext,
        invocation: &Invocation<'_>,
        instrs: &InstructionSequence,
    ) -> EvalResult;
}

/// Shared handle to an engine.
///
/// A handle either owns its engine or, when made by [`SharedEngine::downgrade`],
/// only refers to it. Engines that cache body methods bound to themselves
/// hand those bodies a downgraded handle, so the cache does not keep the
/// engine alive.
#[derive(Clone)]
pub struct SharedEngine(Handle);

#[derive(Clone)]
enum Handle {
    Owned(Arc<dyn Engine>),
    Detached(Weak<dyn Engine>),
}

impl SharedEngine {
    pub fn new(engine: impl Engine + 'static) -> Self {
        SharedEngine(Handle::Owned(Arc::new(engine)))
    }

    /// A handle to the same engine that does not keep it alive.
    #[must_use]
    pub fn downgrade(&self) -> Self {
        match &self.0 {
            Handle::Owned(engine) => SharedEngine(Handle::Detached(Arc::downgrade(engine))),
            Handle::Detached(_) => self.clone(),
        }
    }

    /// Run `instrs` on the engine.
    ///
    /// Fails with `EngineDropped` if this is a downgraded handle and every
    /// owning handle is gone.
    pub fn interpret(
        &self,
        ctx: &mut CallContext,
        invocation: &Invocation<'_>,
        instrs: &InstructionSequence,
    ) -> EvalResult {
        match &self.0 {
            Handle::Owned(engine) => engine.interpret(ctx, invocation, instrs),
            Handle::Detached(engine) => match engine.upgrade() {
                Some(engine) => engine.interpret(ctx, invocation, instrs),
                None => Err(ctx.attach_backtrace(engine_dropped())),
            },
        }
    }
}

impl<E: Engine + 'static> From<Arc<E>> for SharedEngine {
    fn from(engine: Arc<E>) -> Self {
        SharedEngine(Handle::Owned(engine))
    }
}

impl fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Handle::Owned(engine) => write!(f, "SharedEngine({:p})", Arc::as_ptr(engine)),
            Handle::Detached(engine) => write!(f, "SharedEngine(detached {:p})", engine.as_ptr()),
        }
    }
}

/// Executable form of a scope.
#[derive(Debug)]
pub struct InstructionSequence {
    file: Arc<str>,
    line: u32,
    explicit_call_protocol: bool,
    instrs: Arc<[Instr]>,
    engine: SharedEngine,
}

impl InstructionSequence {
    /// Lower `scope` and bind the result to `engine`.
    pub fn prepare(scope: &IrScope, engine: SharedEngine) -> Result<Self, EvalError> {
        let lowered = scope
            .lower()
            .map_err(|err| materialization_failed(scope, &err))?;
        Ok(InstructionSequence {
            file: Arc::from(scope.file()),
            line: scope.line(),
            explicit_call_protocol: lowered.explicit_call_protocol,
            instrs: lowered.instrs,
            engine,
        })
    }

    #[inline]
    pub fn file_name(&self) -> &Arc<str> {
        &self.file
    }

    /// Line the scope starts on.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Whether the instructions push and pop their own frame.
    #[inline]
    pub fn has_explicit_call_protocol(&self) -> bool {
        self.explicit_call_protocol
    }

    #[inline]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    #[inline]
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Numbered instruction listing for debug output.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (index, instr) in self.instrs.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&format!("{index:>4}  {instr}"));
        }
        out
    }
}
