//! Lowered instructions executed by an engine.

use std::fmt;
use std::sync::Arc;

use crate::{IrScope, Value};

/// A single lowered instruction.
///
/// `PushFrame`/`PopFrame` only appear in sequences lowered with an
/// explicit call protocol; everywhere else the caller manages frames.
#[derive(Clone, Debug)]
pub enum Instr {
    /// Update the current source line.
    Line(u32),
    /// Produce a constant.
    PutObject(Value),
    /// Produce the receiver.
    PutSelf,
    /// Push the method frame for the running body.
    PushFrame,
    /// Pop the method frame pushed by `PushFrame`.
    PopFrame,
    /// Open a nested module, class or singleton-class body and run it.
    DefineBody(Arc<IrScope>),
    /// Raise a failure with the given message.
    Raise(String),
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Line(line) => write!(f, "line {line}"),
            Instr::PutObject(value) => write!(f, "put_object {value}"),
            Instr::PutSelf => write!(f, "put_self"),
            Instr::PushFrame => write!(f, "push_frame"),
            Instr::PopFrame => write!(f, "pop_frame"),
            Instr::DefineBody(scope) => write!(f, "define_body {scope}"),
            Instr::Raise(message) => write!(f, "raise {message:?}"),
        }
    }
}
