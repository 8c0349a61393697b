//! Per-thread call context.
//!
//! A `CallContext` holds two independent stacks:
//! - the **backtrace stack** of `(label, file, line)` entries, pushed around
//!   every engine interpretation and captured into errors;
//! - the **frame stack** of method frames, pushed by the generic call
//!   protocol (`pre_method_frame`/`post_method_frame`) or by instructions
//!   that manage their own frames.
//!
//! Neither stack is shared: every thread running code owns its own context.
//! Pushes and pops are normally done through the guards in `backtrace` and
//! `protocol`, which pop on drop.

use std::sync::Arc;

use garnet_ir::{Block, ModuleRef, Value};

use crate::config::RuntimeConfig;
use crate::errors::{stack_overflow, BacktraceLine, EvalBacktrace, EvalError};

/// An entry on the backtrace stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceEntry {
    pub label: String,
    pub file: Arc<str>,
    pub line: u32,
}

/// A method frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CallFrame {
    /// Class the running method is defined in.
    pub implementation_class: ModuleRef,
    /// Name the method was called by.
    pub name: String,
    pub receiver: Value,
    pub block: Block,
}

/// Call state of one executing thread.
#[derive(Debug)]
pub struct CallContext {
    config: RuntimeConfig,
    line: u32,
    backtrace: Vec<BacktraceEntry>,
    frames: Vec<CallFrame>,
}

impl CallContext {
    pub fn new(config: RuntimeConfig) -> Self {
        CallContext {
            config,
            line: 0,
            backtrace: Vec::new(),
            frames: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current source line.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    // Backtrace stack

    pub fn push_backtrace(&mut self, label: &str, file: &Arc<str>, line: u32) {
        self.backtrace.push(BacktraceEntry {
            label: label.to_owned(),
            file: Arc::clone(file),
            line,
        });
    }

    /// Pop the innermost backtrace entry.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the stack is empty.
    pub fn pop_backtrace(&mut self) -> Option<BacktraceEntry> {
        debug_assert!(
            !self.backtrace.is_empty(),
            "CallContext::pop_backtrace() on empty backtrace stack"
        );
        self.backtrace.pop()
    }

    /// Live backtrace entries, outermost first.
    #[inline]
    pub fn backtrace(&self) -> &[BacktraceEntry] {
        &self.backtrace
    }

    #[inline]
    pub fn backtrace_depth(&self) -> usize {
        self.backtrace.len()
    }

    /// Snapshot of the backtrace stack, innermost entry first.
    pub fn capture_backtrace(&self) -> EvalBacktrace {
        EvalBacktrace::new(
            self.backtrace
                .iter()
                .rev()
                .map(|e| BacktraceLine {
                    label: e.label.clone(),
                    file: e.file.to_string(),
                    line: e.line,
                })
                .collect(),
        )
    }

    /// Attach the current backtrace to `err` unless an inner frame already did.
    pub fn attach_backtrace(&self, err: EvalError) -> EvalError {
        if err.has_backtrace() || self.backtrace.is_empty() {
            return err;
        }
        err.with_backtrace(self.capture_backtrace())
    }

    // Frame stack

    /// Generic pre-call step: push a method frame.
    ///
    /// Fails with `StackOverflow` when the configured depth limit is
    /// reached; the frame is not pushed in that case.
    pub fn pre_method_frame(&mut self, frame: CallFrame) -> Result<(), EvalError> {
        if let Some(max) = self.config.max_depth {
            if self.frames.len() >= max {
                return Err(self.attach_backtrace(stack_overflow(max)));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Generic post-call step: pop the innermost method frame.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if no frame is pushed.
    pub fn post_method_frame(&mut self) {
        debug_assert!(
            !self.frames.is_empty(),
            "CallContext::post_method_frame() with no frame"
        );
        self.frames.pop();
    }

    #[inline]
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    #[inline]
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
