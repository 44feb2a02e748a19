//! Thread-local record of the isolate this thread has locked.
//!
//! Persistent handles consult it on drop to decide between destroying their
//! `v8::Global` immediately and deferring it, and contexts consult it to make
//! lock acquisition re-entrant for host calls made from native callbacks.

use std::cell::Cell;

thread_local! {
    /// Isolate locked by this thread (if any).
    static CURRENT_ISOLATE: Cell<Option<*mut v8::Isolate>> = const { Cell::new(None) };
}

/// Marks the isolate locked by the current thread for as long as it lives.
///
/// Must be created after the `v8::Locker` it describes and dropped before
/// it. Guards nest: dropping one restores whatever the thread had locked
/// before.
pub struct JsLock {
    isolate: *mut v8::Isolate,
    previous: Option<*mut v8::Isolate>,
}

impl JsLock {
    /// The isolate must already be locked via v8::Locker.
    pub fn new(isolate: &mut v8::Isolate) -> Self {
        let isolate_ptr = isolate as *mut _;

        // A callback of one context may drive another one
        let previous = CURRENT_ISOLATE.with(|c| c.replace(Some(isolate_ptr)));

        Self {
            isolate: isolate_ptr,
            previous,
        }
    }

    /// Whether this thread currently holds the lock for `isolate`.
    ///
    /// Only the innermost lock counts: an isolate shadowed by a nested lock
    /// of another isolate is not usable until the nested lock is dropped.
    #[inline]
    pub fn is_held(isolate: *mut v8::Isolate) -> bool {
        CURRENT_ISOLATE.with(|c| c.get() == Some(isolate))
    }

    pub fn isolate_ptr(&self) -> *mut v8::Isolate {
        self.isolate
    }
}

impl Drop for JsLock {
    fn drop(&mut self) {
        CURRENT_ISOLATE.with(|c| c.set(self.previous));
    }
}
