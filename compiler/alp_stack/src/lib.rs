//! Stack safety utilities for deep recursion.
//!
//! Rule methods written by hand (or generated) recurse natively once per
//! rule invocation, and the LL(1) and completion walks over the ATN recurse
//! once per rule call they follow. Both go through this crate.
//!
//! # Platform Support
//!
//! - **Native targets**: Uses the `stacker` crate to grow the stack on demand.
//! - **WASM targets**: No-op passthrough (WASM has its own stack management).
//!
//! # Depth limits
//!
//! Growing the stack keeps native recursion from overflowing, but a
//! pathological input can still nest rules without bound. [`DepthLimit`]
//! counts live invocations and refuses to go past a configured ceiling, so
//! the caller can fail with a diagnostic instead of exhausting memory.

use thiserror::Error;

/// Minimum stack space to keep available (100KB red zone).
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
///
/// If the remaining stack is below the red zone threshold, this allocates
/// additional stack space before calling `f`.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM version - just call directly (WASM has its own stack management).
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Raised by [`DepthLimit::enter`] when the ceiling is reached.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("recursion depth limit of {limit} exceeded")]
pub struct DepthExceeded {
    pub limit: usize,
}

/// Counter of live nested invocations with a fixed ceiling.
///
/// Every successful [`enter`](Self::enter) must be paired with one
/// [`exit`](Self::exit).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DepthLimit {
    depth: usize,
    limit: usize,
}

impl DepthLimit {
    /// Default ceiling for rule nesting.
    pub const DEFAULT_LIMIT: usize = 10_000;

    pub const fn new(limit: usize) -> Self {
        DepthLimit { depth: 0, limit }
    }

    /// Record one more nesting level.
    #[inline]
    pub fn enter(&mut self) -> Result<usize, DepthExceeded> {
        if self.depth >= self.limit {
            return Err(DepthExceeded { limit: self.limit });
        }
        self.depth += 1;
        Ok(self.depth)
    }

    /// Leave one nesting level. Saturates at zero.
    #[inline]
    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    #[inline]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub fn reset(&mut self) {
        self.depth = 0;
    }
}

impl Default for DepthLimit {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests;
