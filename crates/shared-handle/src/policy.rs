//! Counting policy abstraction.
//!
//! A policy picks the counter a handle uses, so the same handle code serves
//! single-threaded (`Cell`) and cross-thread (`AtomicUsize`) sharing.

use crate::counter::RefCount;
use std::cell::Cell;
use std::sync::atomic::AtomicUsize;

/// Selects the counter type backing a binding.
pub trait CountPolicy: 'static {
    /// Counter type for reference counting (`Cell<usize>` or `AtomicUsize`).
    type Counter: RefCount;

    /// Name handles under this policy report in `Debug` output.
    const HANDLE_NAME: &'static str;
}

// ============================================================================
// SingleThreaded Policy
// ============================================================================

/// Single-threaded policy using a plain `Cell` counter.
///
/// Handles using it are neither `Send` nor `Sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThreaded;

impl CountPolicy for SingleThreaded {
    type Counter = Cell<usize>;

    const HANDLE_NAME: &'static str = "SharedHandle";
}

// ============================================================================
// ThreadSafe Policy
// ============================================================================

/// Thread-safe policy using an atomic counter.
///
/// Only the count is synchronized. Concurrent mutation of the pointee is
/// still the caller's business.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSafe;

impl CountPolicy for ThreadSafe {
    type Counter = AtomicUsize;

    const HANDLE_NAME: &'static str = "SyncHandle";
}

/// Policy used when a handle names none, chosen by the `thread-safe` feature.
#[cfg(not(feature = "thread-safe"))]
pub type DefaultPolicy = SingleThreaded;

/// Policy used when a handle names none, chosen by the `thread-safe` feature.
#[cfg(feature = "thread-safe")]
pub type DefaultPolicy = ThreadSafe;
