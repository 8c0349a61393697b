//! The method-table call surface.
//!
//! Call sites are generated per arity (`call0` .. `call3`, with and without
//! a block) plus a canonical `call` taking a slice. Every method in a method
//! table implements [`DynamicMethod`]; the default arity entries forward to
//! `call`, which is what ordinary methods with argument binding rely on.
//! Methods that take no arguments by construction override them.

use garnet_ir::{Block, CallSite, ModuleRef, Value};

use crate::context::CallContext;
use crate::errors::EvalResult;

/// Method visibility.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
    ModuleFunction,
}

/// Call counter used to pick methods for tiered compilation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallCount {
    /// Never counted and never recompiled.
    NeverProfile,
    Counted(u32),
}

impl CallCount {
    #[inline]
    pub fn is_profiled(self) -> bool {
        matches!(self, CallCount::Counted(_))
    }
}

/// Kind of a declared parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgumentKind {
    Required,
    Optional,
    Rest,
    Keyword,
    Block,
}

/// A declared parameter, as reported by reflection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentDescriptor {
    pub kind: ArgumentKind,
    pub name: String,
}

/// Parameter shape of a method.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub required: u16,
    pub optional: u16,
    pub rest: bool,
}

impl Signature {
    pub const NO_ARGUMENTS: Signature = Signature {
        required: 0,
        optional: 0,
        rest: false,
    };

    /// Reflection arity: `n` for fixed arity, `-(required + 1)` otherwise.
    pub fn arity(self) -> i32 {
        let required = i32::from(self.required);
        if self.optional > 0 || self.rest {
            -(required + 1)
        } else {
            required
        }
    }
}

/// Who is being called, from where, and under which name.
#[derive(Copy, Clone, Debug)]
pub struct CallInfo<'a> {
    /// The site the call came from, when the caller has one.
    pub site: Option<&'a CallSite>,
    /// The receiver (`self` inside the callee).
    pub recv: &'a Value,
    /// The class the method was found in.
    pub class: &'a ModuleRef,
    /// The name the method was called by.
    pub name: &'a str,
}

impl<'a> CallInfo<'a> {
    pub fn new(recv: &'a Value, class: &'a ModuleRef, name: &'a str) -> Self {
        CallInfo {
            site: None,
            recv,
            class,
            name,
        }
    }

    #[must_use]
    pub fn at(mut self, site: &'a CallSite) -> Self {
        self.site = Some(site);
        self
    }
}

/// A callable entry in a method table.
pub trait DynamicMethod: Send + Sync {
    /// Canonical entry point for any arity.
    fn call(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        args: &[Value],
        block: &Block,
    ) -> EvalResult;

    fn visibility(&self) -> Visibility;

    fn implementation_class(&self) -> &ModuleRef;

    fn signature(&self) -> Signature;

    fn argument_descriptors(&self) -> &[ArgumentDescriptor];

    /// Array-arity call without a block.
    fn call_n(&self, ctx: &mut CallContext, call: CallInfo<'_>, args: &[Value]) -> EvalResult {
        self.call(ctx, call, args, &Block::Null)
    }

    fn call0(&self, ctx: &mut CallContext, call: CallInfo<'_>) -> EvalResult {
        self.call(ctx, call, &[], &Block::Null)
    }

    fn call1(&self, ctx: &mut CallContext, call: CallInfo<'_>, arg0: &Value) -> EvalResult {
        self.call(ctx, call, std::slice::from_ref(arg0), &Block::Null)
    }

    fn call2(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        arg0: &Value,
        arg1: &Value,
    ) -> EvalResult {
        self.call(ctx, call, &[arg0.clone(), arg1.clone()], &Block::Null)
    }

    fn call3(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        arg0: &Value,
        arg1: &Value,
        arg2: &Value,
    ) -> EvalResult {
        self.call(
            ctx,
            call,
            &[arg0.clone(), arg1.clone(), arg2.clone()],
            &Block::Null,
        )
    }

    fn call0_with_block(&self, ctx: &mut CallContext, call: CallInfo<'_>, block: &Block) -> EvalResult {
        self.call(ctx, call, &[], block)
    }

    fn call1_with_block(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        arg0: &Value,
        block: &Block,
    ) -> EvalResult {
        self.call(ctx, call, std::slice::from_ref(arg0), block)
    }

    fn call2_with_block(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        arg0: &Value,
        arg1: &Value,
        block: &Block,
    ) -> EvalResult {
        self.call(ctx, call, &[arg0.clone(), arg1.clone()], block)
    }

    fn call3_with_block(
        &self,
        ctx: &mut CallContext,
        call: CallInfo<'_>,
        arg0: &Value,
        arg1: &Value,
        arg2: &Value,
        block: &Block,
    ) -> EvalResult {
        self.call(ctx, call, &[arg0.clone(), arg1.clone(), arg2.clone()], block)
    }
}
