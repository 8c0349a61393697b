//! Garnet IR - scope descriptors, instructions and runtime values.
//!
//! This crate holds the data the body-method call path consumes:
//! - `IrScope` / `ScopeKind`: what the front end knows about a scope
//! - `InstructionSource` / `LoweredBody`: on-demand lowering of a scope
//! - `Instr`: the lowered instruction set
//! - `Value`, `ModuleRef`, `Block`, `CallSite`: the call surface's values

mod instr;
mod scope;
mod value;

pub use instr::Instr;
pub use scope::{
    InstructionSource, IrScope, LoweredBody, LoweringError, PreparedBody, ScopeId, ScopeKind,
};
pub use value::{Block, CallSite, ModuleKind, ModuleRef, Value};
