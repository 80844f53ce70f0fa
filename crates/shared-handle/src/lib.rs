//! # Shared-Handle
//!
//! Shared ownership of a heap value with deterministic release.
//!
//! Every handle of a binding holds one count on a shared counter. Creating,
//! duplicating and rebinding a handle raise the count; dropping or rebinding
//! away lowers it, and the handle that brings it to zero frees the value and
//! the counter together.
//!
//! ## Features
//!
//! - **Generic payload**: any `T`, no trait bounds for the core protocol
//! - **Empty handles**: a counter without a value, rebindable later
//! - **Checked access**: `try_get` reports `NullAccess` instead of faulting
//! - **FBIP-style mutation**: `try_get_mut` / `make_mut` when uniquely owned
//! - **Counting policies**: `SingleThreaded` (`Cell`) or `ThreadSafe` (atomic)
//!
//! ## Quick Start
//!
//! ```rust
//! use shared_handle::SharedHandle;
//!
//! let p = SharedHandle::new(vec![1, 2, 3]);
//! let mut r: SharedHandle<Vec<i32>> = SharedHandle::empty();
//! r.assign(&p);
//!
//! assert_eq!(p.ref_count(), 2);
//! assert_eq!(*r, vec![1, 2, 3]);
//! // Freed when the last handle goes out of scope
//! ```

mod counter;
mod error;
mod handle;
mod policy;

pub use counter::RefCount;
pub use error::HandleError;
pub use handle::{GenericHandle, SharedHandle, SyncHandle};
pub use policy::{CountPolicy, DefaultPolicy, SingleThreaded, ThreadSafe};
