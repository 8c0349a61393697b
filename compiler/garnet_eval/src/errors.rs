//! Error types for body-method invocation.
//!
//! `EvalErrorKind` is the typed category; `EvalError` pairs it with the
//! backtrace captured at the innermost frame the failure crossed. Factory
//! functions below are the canonical way to build errors.
//!
//! Invalid scope kinds are not represented here: they are invariant
//! breaches and panic.

use std::fmt;

use garnet_ir::{IrScope, LoweringError, Value};

/// Result of an invocation.
pub type EvalResult = Result<Value, EvalError>;

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalErrorKind {
    /// The scope's instructions could not be prepared.
    #[error("cannot prepare {scope}: {reason}")]
    Materialization { scope: String, reason: String },

    /// Raised by the executed body code.
    #[error("{message}")]
    Raised { message: String },

    /// The method frame limit was hit.
    #[error("stack level too deep (depth {depth})")]
    StackOverflow { depth: usize },

    /// A sequence popped a frame it never pushed.
    #[error("pop_frame with no frame pushed by this sequence")]
    FrameUnderflow,

    /// A body ran through a detached engine handle after its engine was dropped.
    #[error("engine dropped while its bodies were still running")]
    EngineDropped,
}

/// One line of a captured backtrace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceLine {
    pub label: String,
    pub file: String,
    pub line: u32,
}

impl fmt::Display for BacktraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:in `{}'", self.file, self.line, self.label)
    }
}

/// Snapshot of the backtrace stack, innermost entry first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalBacktrace {
    lines: Vec<BacktraceLine>,
}

impl EvalBacktrace {
    pub fn new(lines: Vec<BacktraceLine>) -> Self {
        EvalBacktrace { lines }
    }

    #[inline]
    pub fn lines(&self) -> &[BacktraceLine] {
        &self.lines
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// An invocation failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub backtrace: Option<EvalBacktrace>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        EvalError {
            kind,
            backtrace: None,
        }
    }

    /// Attach a backtrace, replacing any existing one.
    #[must_use]
    pub fn with_backtrace(mut self, backtrace: EvalBacktrace) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    #[inline]
    pub fn has_backtrace(&self) -> bool {
        self.backtrace.is_some()
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        EvalError::new(kind)
    }
}

pub fn raised(message: impl Into<String>) -> EvalError {
    EvalErrorKind::Raised {
        message: message.into(),
    }
    .into()
}

pub fn materialization_failed(scope: &IrScope, err: &LoweringError) -> EvalError {
    EvalErrorKind::Materialization {
        scope: scope.to_string(),
        reason: err.reason.clone(),
    }
    .into()
}

pub fn stack_overflow(depth: usize) -> EvalError {
    EvalErrorKind::StackOverflow { depth }.into()
}

pub fn frame_underflow() -> EvalError {
    EvalErrorKind::FrameUnderflow.into()
}

pub fn engine_dropped() -> EvalError {
    EvalErrorKind::EngineDropped.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_is_kind_only() {
        let err = raised("boom").with_backtrace(EvalBacktrace::new(vec![BacktraceLine {
            label: "Widget".into(),
            file: "widget.rb".into(),
            line: 4,
        }]));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn backtrace_renders_innermost_first() {
        let bt = EvalBacktrace::new(vec![
            BacktraceLine {
                label: "singleton class".into(),
                file: "a.rb".into(),
                line: 7,
            },
            BacktraceLine {
                label: "Outer".into(),
                file: "a.rb".into(),
                line: 2,
            },
        ]);
        assert_eq!(
            bt.to_string(),
            "a.rb:7:in `singleton class'\na.rb:2:in `Outer'"
        );
    }

    #[test]
    fn kinds_render_messages() {
        assert_eq!(
            stack_overflow(12).to_string(),
            "stack level too deep (depth 12)"
        );
        assert_eq!(
            frame_underflow().to_string(),
            "pop_frame with no frame pushed by this sequence"
        );
    }
}
