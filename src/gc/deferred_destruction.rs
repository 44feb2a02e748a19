//! Handles released without their isolate's lock.
//!
//! A host may drop its last reference to a value on any thread, holding the
//! owning context's lock or not. Resetting a `v8::Global` needs the lock, so
//! an unlocked drop parks the handle here and the context destroys it the
//! next time it locks the isolate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Type-erased `v8::Global` waiting to be reset.
trait Parked {}

impl<T: 'static> Parked for v8::Global<T> {}

struct Grave(Box<dyn Parked>);

// SAFETY: a parked Global is never dereferenced, only dropped, and the queue
// drops it on the thread holding the isolate lock
unsafe impl Send for Grave {}

/// Per-context queue of parked handles.
#[derive(Default)]
pub struct DeferredDestructionQueue {
    graves: Mutex<Vec<Grave>>,
    /// Mirrors `graves.len()` so the lock fast path can skip the mutex
    pending: AtomicUsize,
}

impl DeferredDestructionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `handle`. Callable from any thread, with or without the lock.
    pub fn defer<T: 'static>(&self, handle: v8::Global<T>) {
        let mut graves = self.graves.lock().unwrap_or_else(PoisonError::into_inner);
        graves.push(Grave(Box::new(handle)));
        self.pending.store(graves.len(), Ordering::Release);

        log::trace!("Parked handle without lock ({} pending)", graves.len());
    }

    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset every parked handle.
    ///
    /// The caller must hold the `v8::Locker` of the isolate the handles
    /// belong to.
    pub fn destroy_pending(&self) {
        if self.is_empty() {
            return;
        }

        let graves = {
            let mut graves = self.graves.lock().unwrap_or_else(PoisonError::into_inner);
            self.pending.store(0, Ordering::Release);
            std::mem::take(&mut *graves)
        };

        log::trace!("Resetting {} parked handles", graves.len());
        drop(graves);
    }
}

impl std::fmt::Debug for DeferredDestructionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredDestructionQueue")
            .field("pending", &self.len())
            .finish()
    }
}
