//! Persistent engine handle owned by a bridge value.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use super::{DeferredDestructionQueue, JsLock};

/// A `v8::Global` that knows how to die without its isolate's lock.
///
/// Dropped on a thread holding the lock of the owning isolate, the handle is
/// reset immediately. Dropped anywhere else, it is handed to the owning
/// context's [`DeferredDestructionQueue`].
pub struct Persistent<T: 'static> {
    handle: ManuallyDrop<v8::Global<T>>,
    isolate: *mut v8::Isolate,
    queue: Arc<DeferredDestructionQueue>,
}

// SAFETY: the Global is only dereferenced under the isolate lock (every
// accessor takes a scope) and is destroyed either under the lock or through
// the deferred queue.
unsafe impl<T: 'static> Send for Persistent<T> {}
unsafe impl<T: 'static> Sync for Persistent<T> {}

impl<T: 'static> Persistent<T> {
    pub(crate) fn new(
        handle: v8::Global<T>,
        isolate: *mut v8::Isolate,
        queue: Arc<DeferredDestructionQueue>,
    ) -> Self {
        Self {
            handle: ManuallyDrop::new(handle),
            isolate,
            queue,
        }
    }

    /// Materialize the handle in the current handle scope.
    #[inline]
    pub(crate) fn local<'s>(&self, scope: &v8::PinScope<'s, '_>) -> v8::Local<'s, T> {
        v8::Local::new(scope, &*self.handle)
    }

    /// Isolate the handle belongs to.
    #[inline]
    pub fn isolate_ptr(&self) -> *mut v8::Isolate {
        self.isolate
    }
}

impl<T: 'static> Drop for Persistent<T> {
    fn drop(&mut self) {
        // SAFETY: handle is never touched again after this point
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };

        if JsLock::is_held(self.isolate) {
            drop(handle);
        } else {
            self.queue.defer(handle);
        }
    }
}

impl<T: 'static> std::fmt::Debug for Persistent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistent")
            .field("isolate", &self.isolate)
            .finish_non_exhaustive()
    }
}
