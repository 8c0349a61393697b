//! Body methods.
//!
//! A body method runs the top-level code of a `module`, `class` or
//! `class << obj` definition. It is created once, when the definition is
//! first reached, and invoked every time the definition runs.
//!
//! Body methods take no arguments: every arity entry of [`DynamicMethod`]
//! collapses to [`BodyMethod::invoke`], dropping the arguments. A block, if
//! the call site passed one, is forwarded to the engine untouched.
//!
//! # Invocation
//!
//! 1. Debug hook (logging only).
//! 2. Instructions are materialized, or taken from the cache.
//! 3. Call protocol: unless the instructions push their own frame, the
//!    generic frame is pushed here and popped when the call ends.
//! 4. The scope kind picks the backtrace label.
//! 5. The engine interprets the instructions under that backtrace entry.
//!
//! Steps 3 and 5 are guard-scoped, so their cleanup runs on error returns
//! and panics too.

use std::sync::Arc;

use garnet_ir::{Block, IrScope, ModuleRef, ScopeKind, Value};
use parking_lot::RwLock;

use crate::context::{CallContext, CallFrame};
use crate::debug::maybe_debug;
use crate::engine::{InstructionSequence, Invocation, InvocationToken, SharedEngine};
use crate::errors::EvalResult;
use crate::method::{
    ArgumentDescriptor, CallCount, CallInfo, DynamicMethod, Signature, Visibility,
};

mod readiness;

/// Backtrace label for metaclass bodies.
pub const SINGLETON_CLASS_LABEL: &str = "singleton class";

/// Synthetic method running a module, class or metaclass body.
pub struct BodyMethod {
    scope: Arc<IrScope>,
    implementation_class: ModuleRef,
    visibility: Visibility,
    call_count: CallCount,
    engine: SharedEngine,
    instrs: RwLock<Option<Arc<InstructionSequence>>>,
}

impl BodyMethod {
    /// Create the body method for `scope`, owned by `implementation_class`.
    ///
    /// Instructions are not materialized until the first call.
    pub fn new(scope: Arc<IrScope>, implementation_class: ModuleRef, engine: SharedEngine) -> Self {
        BodyMethod {
            scope,
            implementation_class,
            visibility: Visibility::Public,
            call_count: CallCount::NeverProfile,
            engine,
            instrs: RwLock::new(None),
        }
    }

    #[inline]
    pub fn scope(&self) -> &Arc<IrScope> {
        &self.scope
    }

    #[inline]
    pub fn scope_kind(&self) -> ScopeKind {
        self.scope.kind()
    }

    /// Name of the defined module or class.
    #[inline]
    pub fn name(&self) -> &str {
        self.scope.name()
    }

    #[inline]
    pub fn file(&self) -> &str {
        self.scope.file()
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.scope.line()
    }

    /// Always `CallCount::NeverProfile`.
    #[inline]
    pub fn call_count(&self) -> CallCount {
        self.call_count
    }

    /// Run the body.
    ///
    /// This is where every `DynamicMethod` entry of a body method ends up.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(body = %self.scope.name(), kind = %self.scope.kind())
    )]
    pub fn invoke(&self, ctx: &mut CallContext, call: CallInfo<'_>, block: &Block) -> EvalResult {
        maybe_debug(ctx.config(), &self.scope, call.name);
        self.call_internal(ctx, call, block)
    }

    fn call_internal(&self, ctx: &mut CallContext, call: CallInfo<'_>, block: &Block) -> EvalResult {
        let instrs = self.ensure_instrs_ready(ctx.config())?;

        let mut framed = ctx.protocol_frame(instrs.has_explicit_call_protocol(), || CallFrame {
            implementation_class: self.implementation_class.clone(),
            name: call.name.to_owned(),
            receiver: call.recv.clone(),
            block: block.clone(),
        })?;

        let token = InvocationToken::Uncompilable(call.class.clone());
        self.dispatch(&mut framed, call, &token, &instrs, block)
    }

    /// Pick the backtrace label for the scope kind and interpret.
    ///
    /// # Panics
    ///
    /// Panics if the scope is not a module, class or metaclass body. Such a
    /// body method can only come from a broken scope classifier upstream.
    fn dispatch(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        token: &InvocationToken,
        instrs: &InstructionSequence,
        block: &Block,
    ) -> EvalResult {
        let label = match self.scope_kind() {
            ScopeKind::ModuleBody | ScopeKind::ClassBody => self.scope.name(),
            ScopeKind::MetaclassBody => SINGLETON_CLASS_LABEL,
            ScopeKind::Method | ScopeKind::Closure | ScopeKind::ScriptBody | ScopeKind::Eval => {
                panic!("invalid body method type: {}", self.scope)
            }
        };
        Self::interpret_with_backtrace(ctx, label, call, token, instrs, block)
    }

    fn interpret_with_backtrace(
        ctx: &mut CallContext,
        label: &str,
        call: CallInfo<'_>,
        token: &InvocationToken,
        instrs: &InstructionSequence,
        block: &Block,
    ) -> EvalResult {
        let line = ctx.line();
        ctx.with_backtrace(label, instrs.file_name(), line, |ctx| {
            let invocation = Invocation {
                call: CallInfo { name: label, ..call },
                token,
                implicit_self: None,
                block,
            };
            instrs.engine().interpret(ctx, &invocation, instrs)
        })
    }
}

impl DynamicMethod for BodyMethod {
    fn call(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        _args: &[Value],
        block: &Block,
    ) -> EvalResult {
        self.invoke(ctx, call, block)
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn implementation_class(&self) -> &ModuleRef {
        &self.implementation_class
    }

    fn signature(&self) -> Signature {
        Signature::NO_ARGUMENTS
    }

    fn argument_descriptors(&self) -> &[ArgumentDescriptor] {
        &[]
    }

    fn call_n(&self, ctx: &mut CallContext, call: CallInfo<'_>, _args: &[Value]) -> EvalResult {
        self.invoke(ctx, call, &Block::Null)
    }

    fn call0(&self, ctx: &mut CallContext, call: CallInfo<'_>) -> EvalResult {
        self.invoke(ctx, call, &Block::Null)
    }

    fn call1(&self, ctx: &mut CallContext, call: CallInfo<'_>, _arg0: &Value) -> EvalResult {
        self.invoke(ctx, call, &Block::Null)
    }

    fn call2(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        _arg0: &Value,
        _arg1: &Value,
    ) -> EvalResult {
        self.invoke(ctx, call, &Block::Null)
    }

    fn call3(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        _arg0: &Value,
        _arg1: &Value,
        _arg2: &Value,
    ) -> EvalResult {
        self.invoke(ctx, call, &Block::Null)
    }

    fn call0_with_block(&self, ctx: &mut CallContext, call: CallInfo<'_>, block: &Block) -> EvalResult {
        self.invoke(ctx, call, block)
    }

    fn call1_with_block(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        _arg0: &Value,
        block: &Block,
    ) -> EvalResult {
        self.invoke(ctx, call, block)
    }

    fn call2_with_block(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        _arg0: &Value,
        _arg1: &Value,
        block: &Block,
    ) -> EvalResult {
        self.invoke(ctx, call, block)
    }

    fn call3_with_block(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        _arg0: &Value,
        _arg1: &Value,
        _arg2: &Value,
        block: &Block,
    ) -> EvalResult {
        self.invoke(ctx, call, block)
    }
}

impl std::fmt::Debug for BodyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyMethod")
            .field("scope", &self.scope)
            .field("implementation_class", &self.implementation_class)
            .field("materialized", &self.is_materialized())
            .finish_non_exhaustive()
    }
}
