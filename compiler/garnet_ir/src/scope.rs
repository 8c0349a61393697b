//! Scope descriptors.
//!
//! An [`IrScope`] describes one lexical unit of code (a module body, a
//! method, a block, ...) as produced by the front end. It does not hold
//! executable instructions directly; those are produced on demand by its
//! [`InstructionSource`], so that scopes which never run are never lowered.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::Instr;

/// Unique identity of a scope within a process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Allocate a fresh id.
    pub fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        ScopeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Classification of a scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// `module Foo ... end`
    ModuleBody,
    /// `class Foo ... end`
    ClassBody,
    /// `class << obj ... end`
    MetaclassBody,
    /// `def foo ... end`
    Method,
    /// A block or lambda.
    Closure,
    /// Top level of a file.
    ScriptBody,
    /// Code passed to `eval`.
    Eval,
}

impl ScopeKind {
    /// Whether scopes of this kind run through a body method.
    #[inline]
    pub fn is_body(self) -> bool {
        matches!(
            self,
            ScopeKind::ModuleBody | ScopeKind::ClassBody | ScopeKind::MetaclassBody
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::ModuleBody => "module body",
            ScopeKind::ClassBody => "class body",
            ScopeKind::MetaclassBody => "metaclass body",
            ScopeKind::Method => "method",
            ScopeKind::Closure => "closure",
            ScopeKind::ScriptBody => "script body",
            ScopeKind::Eval => "eval",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of lowering a scope.
#[derive(Clone, Debug)]
pub struct LoweredBody {
    pub instrs: Arc<[Instr]>,
    /// Frame push/pop is embedded in `instrs` as `PushFrame`/`PopFrame`.
    pub explicit_call_protocol: bool,
}

/// Lowering failed; the scope cannot be executed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct LoweringError {
    pub reason: String,
}

impl LoweringError {
    pub fn new(reason: impl Into<String>) -> Self {
        LoweringError {
            reason: reason.into(),
        }
    }
}

/// Produces the lowered instructions of a scope.
///
/// Implemented by the front end. Called at most once per successful
/// materialization of a body method, but may be called again after a
/// failure.
pub trait InstructionSource: Send + Sync {
    fn lower(&self, scope: &IrScope) -> Result<LoweredBody, LoweringError>;
}

/// Descriptor of a single scope.
pub struct IrScope {
    id: ScopeId,
    kind: ScopeKind,
    name: Arc<str>,
    file: Arc<str>,
    line: u32,
    source: Arc<dyn InstructionSource>,
}

impl IrScope {
    pub fn new(
        kind: ScopeKind,
        name: &str,
        file: &str,
        line: u32,
        source: Arc<dyn InstructionSource>,
    ) -> Self {
        IrScope {
            id: ScopeId::fresh(),
            kind,
            name: Arc::from(name),
            file: Arc::from(file),
            line,
            source,
        }
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Line the scope starts on.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Lower this scope through its instruction source.
    pub fn lower(&self) -> Result<LoweredBody, LoweringError> {
        self.source.lower(self)
    }
}

impl fmt::Debug for IrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrScope")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("file", &self.file)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for IrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}` ({}:{})", self.kind, self.name, self.file, self.line)
    }
}

/// An [`InstructionSource`] over an already-built instruction list.
///
/// Validates frame instructions when lowered: a sequence with an explicit
/// call protocol must push and pop its frame in balanced pairs, and a
/// sequence without one must not touch frames at all.
#[derive(Clone, Debug)]
pub struct PreparedBody {
    instrs: Arc<[Instr]>,
    explicit_call_protocol: bool,
}

impl PreparedBody {
    /// Instructions that rely on the caller for frame management.
    pub fn new(instrs: Vec<Instr>) -> Self {
        PreparedBody {
            instrs: instrs.into(),
            explicit_call_protocol: false,
        }
    }

    /// Instructions that push and pop their own frame.
    pub fn with_explicit_call_protocol(instrs: Vec<Instr>) -> Self {
        PreparedBody {
            instrs: instrs.into(),
            explicit_call_protocol: true,
        }
    }

    fn check_frames(&self) -> Result<(), LoweringError> {
        let mut depth: u32 = 0;
        for (index, instr) in self.instrs.iter().enumerate() {
            match instr {
                Instr::PushFrame | Instr::PopFrame if !self.explicit_call_protocol => {
                    return Err(LoweringError::new(format!(
                        "frame instruction `{instr}` at {index} without explicit call protocol"
                    )));
                }
                Instr::PushFrame => depth += 1,
                Instr::PopFrame => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        LoweringError::new(format!("unmatched `pop_frame` at {index}"))
                    })?;
                }
                _ => {}
            }
        }
        if depth == 0 {
            Ok(())
        } else {
            Err(LoweringError::new(format!("{depth} frame(s) never popped")))
        }
    }
}

impl InstructionSource for PreparedBody {
    fn lower(&self, _scope: &IrScope) -> Result<LoweredBody, LoweringError> {
        self.check_frames()?;
        Ok(LoweredBody {
            instrs: Arc::clone(&self.instrs),
            explicit_call_protocol: self.explicit_call_protocol,
        })
    }
}
