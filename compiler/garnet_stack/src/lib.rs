//! Stack safety for nested body evaluation.
//!
//! Module and class bodies nest arbitrarily: a class body may define a
//! nested module whose body defines another class, and each level goes
//! through a full engine interpretation. Every such level is entered through
//! [`ensure_sufficient_stack`], which grows the native stack on demand.
//!
//! - **Native targets**: `stacker::maybe_grow`.
//! - **WASM targets**: direct call (the host manages the stack).

#[cfg(not(target_arch = "wasm32"))]
/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

#[cfg(not(target_arch = "wasm32"))]
/// Size of each newly allocated stack segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if less than the red zone remains.
///
/// ```text
/// let value = ensure_sufficient_stack(|| engine.interpret(ctx, ...))?;
/// ```
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// WASM version: call through.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
