//! Reference-counted owning handle.

use crate::counter::RefCount;
use crate::error::HandleError;
use crate::policy::{CountPolicy, DefaultPolicy, ThreadSafe};
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// An owning handle to a heap value shared with every handle of its binding.
///
/// A binding is a heap value plus one counter. Every handle bound to it
/// contributes exactly one to the counter, and the handle that brings the
/// counter to zero frees both. Handles may also be empty: they own a counter
/// but no value, and can later be rebound with [`assign`](Self::assign).
///
/// # Type Parameters
///
/// - `T`: The owned value type
/// - `P`: The counting policy (`SingleThreaded` or `ThreadSafe`)
///
/// # Example
///
/// ```
/// use shared_handle::SharedHandle;
///
/// let p = SharedHandle::new(String::from("Scott"));
/// let q = p.share();
///
/// assert_eq!(p.ref_count(), 2);
/// assert_eq!(*q, "Scott");
///
/// drop(q);
/// assert_eq!(p.ref_count(), 1);
/// ```
pub struct GenericHandle<T, P: CountPolicy = DefaultPolicy> {
    value: Option<NonNull<T>>,
    counter: NonNull<P::Counter>,
    _marker: PhantomData<(Box<T>, P)>,
}

/// Handle using the default counting policy (see the `thread-safe` feature).
pub type SharedHandle<T> = GenericHandle<T, DefaultPolicy>;

/// Handle with an atomic counter, shareable across threads.
pub type SyncHandle<T> = GenericHandle<T, ThreadSafe>;

// Only the atomic policy may cross threads, and only for payloads that
// tolerate shared access from several threads.
unsafe impl<T: Send + Sync> Send for GenericHandle<T, ThreadSafe> {}
unsafe impl<T: Send + Sync> Sync for GenericHandle<T, ThreadSafe> {}

impl<T, P: CountPolicy> GenericHandle<T, P> {
    /// Wrap `value` in a fresh binding with a count of one.
    #[inline]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Take ownership of an already boxed value.
    pub fn from_box(value: Box<T>) -> Self {
        Self::bind(Some(NonNull::from(Box::leak(value))))
    }

    /// A handle with its own counter but no value.
    ///
    /// Dereferencing it fails with [`HandleError::NullAccess`] until it is
    /// rebound to a non-empty binding.
    pub fn empty() -> Self {
        Self::bind(None)
    }

    fn bind(value: Option<NonNull<T>>) -> Self {
        let counter = NonNull::from(Box::leak(Box::new(<P::Counter as RefCount>::new())));
        let handle = Self {
            value,
            counter,
            _marker: PhantomData,
        };
        handle.count().increment();
        log::trace!(
            "allocated binding {:p} ({})",
            counter,
            if value.is_some() { "bound" } else { "empty" }
        );
        handle
    }

    #[inline]
    fn count(&self) -> &P::Counter {
        // SAFETY: the counter lives as long as any handle bound to it.
        unsafe { self.counter.as_ref() }
    }

    /// Duplicate the handle, incrementing the shared count.
    #[inline]
    pub fn share(&self) -> Self {
        self.count().increment();
        Self {
            value: self.value,
            counter: self.counter,
            _marker: PhantomData,
        }
    }

    /// Rebind this handle to `source`'s binding.
    ///
    /// The previous binding is released if this handle was its last owner.
    /// Assigning between handles of the same binding is a no-op.
    pub fn assign(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) {
            return;
        }

        let remaining = self.count().decrement();
        let old_value = self.value;
        let old_counter = self.counter;

        self.value = source.value;
        self.counter = source.counter;
        self.count().increment();

        // Old binding goes only after `self` is rebound.
        if remaining == 0 {
            // SAFETY: the count reached zero, no other handle can see these.
            unsafe { Self::free(old_value, old_counter) };
        }
    }

    /// Number of handles currently bound to this binding.
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.count().get()
    }

    /// Returns true if this is the only handle of its binding.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.ref_count() == 1
    }

    /// Returns true if the binding holds no value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Returns true if both handles belong to the same binding.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.counter == other.counter
    }

    /// Raw pointer to the value, null for an empty handle.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.value.map_or(ptr::null(), |value| value.as_ptr() as *const T)
    }

    /// Shared reference to the value, if any.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a bound value outlives every handle of its binding.
        self.value.as_ref().map(|value| unsafe { value.as_ref() })
    }

    /// Shared reference to the value, or `NullAccess` for an empty handle.
    #[inline]
    pub fn try_get(&self) -> Result<&T, HandleError> {
        self.get().ok_or(HandleError::NullAccess)
    }

    /// Mutable access if this is the only handle of its binding.
    pub fn try_get_mut(&mut self) -> Result<&mut T, HandleError> {
        let count = self.ref_count();
        match self.value {
            None => Err(HandleError::NullAccess),
            Some(_) if count != 1 => Err(HandleError::NotUnique { count }),
            // SAFETY: no other handle can reach the value while count == 1.
            Some(mut value) => Ok(unsafe { value.as_mut() }),
        }
    }

    /// Move the value out if this is the only handle of its binding.
    ///
    /// Returns the handle unchanged when shared or empty.
    pub fn try_unwrap(self) -> Result<T, Self> {
        let Some(value) = self.value else {
            return Err(self);
        };
        if !self.is_unique() {
            return Err(self);
        }

        let this = ManuallyDrop::new(self);
        this.count().decrement();
        log::trace!("unwrapped binding {:p}", this.counter);
        // SAFETY: sole owner; both allocations came from `Box::leak`.
        unsafe {
            drop(Box::from_raw(this.counter.as_ptr()));
            Ok(*Box::from_raw(value.as_ptr()))
        }
    }

    unsafe fn free(value: Option<NonNull<T>>, counter: NonNull<P::Counter>) {
        log::trace!("released binding {:p}", counter);
        drop(Box::from_raw(counter.as_ptr()));
        if let Some(value) = value {
            drop(Box::from_raw(value.as_ptr()));
        }
    }
}

impl<T: Clone, P: CountPolicy> GenericHandle<T, P> {
    /// Mutable access, detaching into a private copy when shared.
    ///
    /// Other handles of the old binding keep seeing the old value.
    pub fn make_mut(&mut self) -> Result<&mut T, HandleError> {
        if !self.is_unique() {
            let copy = self.try_get()?.clone();
            *self = Self::new(copy);
        }
        self.try_get_mut()
    }

    /// Consume the handle, returning the value.
    ///
    /// Unwraps without cloning when this is the only handle, clones
    /// otherwise. Returns `None` for an empty handle.
    pub fn into_inner(self) -> Option<T> {
        match self.try_unwrap() {
            Ok(value) => Some(value),
            Err(handle) => handle.get().cloned(),
        }
    }
}

impl<T, P: CountPolicy> Drop for GenericHandle<T, P> {
    fn drop(&mut self) {
        if self.count().decrement() == 0 {
            // SAFETY: the count reached zero, this was the last handle.
            unsafe { Self::free(self.value, self.counter) };
        }
    }
}

impl<T, P: CountPolicy> Clone for GenericHandle<T, P> {
    #[inline]
    fn clone(&self) -> Self {
        self.share()
    }

    #[inline]
    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T, P: CountPolicy> Default for GenericHandle<T, P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, P: CountPolicy> From<Box<T>> for GenericHandle<T, P> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T, P: CountPolicy> Deref for GenericHandle<T, P> {
    type Target = T;

    /// # Panics
    ///
    /// Panics with [`HandleError::NullAccess`] if the handle is empty.
    #[inline]
    fn deref(&self) -> &T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => null_access(err),
        }
    }
}

#[cold]
#[allow(clippy::panic)]
fn null_access(err: HandleError) -> ! {
    log::error!("dereferenced an empty handle");
    panic!("{err}")
}

impl<T: fmt::Debug, P: CountPolicy> fmt::Debug for GenericHandle<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(P::HANDLE_NAME)
            .field("value", &self.get())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

impl<T: PartialEq, P: CountPolicy> PartialEq for GenericHandle<T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<T: Eq, P: CountPolicy> Eq for GenericHandle<T, P> {}
