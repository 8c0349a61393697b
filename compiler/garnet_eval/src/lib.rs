//! Garnet Eval - body-method invocation for the Garnet interpreter.
//!
//! Body methods run the top-level code of `module`, `class` and
//! `class << obj` definitions. This crate provides:
//! - `BodyMethod`: lazy instructions, call protocol, scope-kind dispatch
//! - `DynamicMethod`: the per-arity method-table call surface
//! - `CallContext`: per-thread backtrace and frame stacks
//! - `BacktraceGuard` / `ProtocolGuard`: drop-scoped push/pop
//! - `Engine` / `InstructionSequence`: what executes, and what it executes
//! - `Interpreter`: a reference engine for `garnet_ir::Instr`
//! - `RuntimeConfig`: injected debug flags and frame limit

mod backtrace;
mod body_method;
pub mod config;
mod context;
mod debug;
mod engine;
pub mod errors;
mod interpreter;
mod method;
mod protocol;

pub use backtrace::BacktraceGuard;
pub use body_method::{BodyMethod, SINGLETON_CLASS_LABEL};
pub use config::{DebugFlags, RuntimeConfig};
pub use context::{BacktraceEntry, CallContext, CallFrame};
pub use engine::{Engine, InstructionSequence, Invocation, InvocationToken, SharedEngine};
pub use errors::{EvalBacktrace, EvalError, EvalErrorKind, EvalResult};
pub use interpreter::Interpreter;
pub use method::{
    ArgumentDescriptor, ArgumentKind, CallCount, CallInfo, DynamicMethod, Signature, Visibility,
};
pub use protocol::ProtocolGuard;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber driven by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set, and only installs once per
/// process. Example: `RUST_LOG=garnet_eval=debug,garnet::exec=info`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
