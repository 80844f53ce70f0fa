//! Reference counters shared by every handle of one binding.
//!
//! A counter knows nothing about the value it guards. It only moves up and
//! down and reports where it landed; the handle decides what to free.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Past this many owners something is leaking handles.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Counter operations, abstracting `Cell` vs atomic storage.
pub trait RefCount {
    /// A counter with no owner registered yet.
    fn new() -> Self;

    /// Current number of owners.
    fn get(&self) -> usize;

    /// Register one more owner, returning the new count.
    fn increment(&self) -> usize;

    /// Drop one owner, returning the count left behind.
    ///
    /// Calling this on a zero counter means a handle was released twice.
    /// Memory is already suspect at that point, so the process aborts.
    fn decrement(&self) -> usize;
}

impl RefCount for Cell<usize> {
    #[inline]
    fn new() -> Self {
        Cell::new(0)
    }

    #[inline]
    fn get(&self) -> usize {
        Cell::get(self)
    }

    #[inline]
    fn increment(&self) -> usize {
        let val = self.get();
        if val >= MAX_REFCOUNT {
            overflow();
        }
        self.set(val + 1);
        val + 1
    }

    #[inline]
    fn decrement(&self) -> usize {
        let val = self.get();
        if val == 0 {
            underflow();
        }
        self.set(val - 1);
        val - 1
    }
}

impl RefCount for AtomicUsize {
    #[inline]
    fn new() -> Self {
        AtomicUsize::new(0)
    }

    #[inline]
    fn get(&self) -> usize {
        self.load(Ordering::Acquire)
    }

    #[inline]
    fn increment(&self) -> usize {
        let prev = self.fetch_add(1, Ordering::AcqRel);
        if prev >= MAX_REFCOUNT {
            overflow();
        }
        prev + 1
    }

    #[inline]
    fn decrement(&self) -> usize {
        // The value returned by fetch_sub is the only one we may trust;
        // re-reading the counter would race with other owners.
        let prev = self.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            underflow();
        }
        prev - 1
    }
}

#[cold]
fn overflow() -> ! {
    log::error!("reference count overflow, aborting");
    std::process::abort();
}

#[cold]
fn underflow() -> ! {
    log::error!("reference count decremented below zero, aborting");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_counter() {
        let counter: Cell<usize> = RefCount::new();
        assert_eq!(RefCount::get(&counter), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.decrement(), 1);
        assert_eq!(RefCount::get(&counter), 1);
        assert_eq!(counter.decrement(), 0);
    }

    #[test]
    fn test_atomic_counter() {
        let counter: AtomicUsize = RefCount::new();
        assert_eq!(RefCount::get(&counter), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.decrement(), 1);
        assert_eq!(RefCount::get(&counter), 1);
        assert_eq!(counter.decrement(), 0);
    }

    const FATAL_CASE: &str = "SHARED_HANDLE_FATAL_CASE";

    /// Runs `test` again in a child process with `case` selected.
    fn run_fatal_case(test: &str, case: &str) -> std::io::Result<std::process::ExitStatus> {
        std::process::Command::new(std::env::current_exe()?)
            .args(["--exact", test, "--test-threads=1"])
            .env(FATAL_CASE, case)
            .status()
    }

    fn assert_aborted(status: std::process::ExitStatus) {
        assert!(!status.success());
        // Killed by SIGABRT, not a test failure exit code.
        #[cfg(unix)]
        assert_eq!(status.code(), None);
    }

    #[test]
    fn test_fatal_counter_misuse_aborts() -> std::io::Result<()> {
        match std::env::var(FATAL_CASE).as_deref() {
            Ok("cell-underflow") => {
                let counter: Cell<usize> = RefCount::new();
                counter.decrement();
                return Ok(());
            }
            Ok("atomic-underflow") => {
                let counter: AtomicUsize = RefCount::new();
                counter.increment();
                counter.decrement();
                counter.decrement();
                return Ok(());
            }
            Ok("cell-overflow") => {
                let counter = Cell::new(MAX_REFCOUNT);
                counter.increment();
                return Ok(());
            }
            _ => {}
        }

        let test = "counter::tests::test_fatal_counter_misuse_aborts";
        for case in ["cell-underflow", "atomic-underflow", "cell-overflow"] {
            assert_aborted(run_fatal_case(test, case)?);
        }
        Ok(())
    }

    #[test]
    fn test_atomic_counter_across_threads() {
        let counter: AtomicUsize = RefCount::new();
        counter.increment();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        counter.increment();
                        counter.decrement();
                    }
                });
            }
        });

        assert_eq!(RefCount::get(&counter), 1);
    }
}
