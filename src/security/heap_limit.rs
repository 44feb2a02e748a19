//! Heap limit protection for contexts with a configured maximum heap.
//!
//! V8 calls `FatalProcessOutOfMemory` when a heap outgrows its limit, taking
//! the host process down with it. With a near-heap-limit callback installed
//! the context instead:
//! 1. First call: raises the limit by 10% so a collection can make progress
//! 2. Later calls: terminates execution and grants room for the stack to
//!    unwind
//!
//! The terminated operation surfaces as a script exception and the context
//! cancels the termination before it returns.

use std::ffi::{c_char, c_void};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use v8::IsolateHandle;

/// State handed to V8 as the near-heap-limit callback's data pointer.
///
/// Boxed and owned by the context; it must outlive the isolate.
pub struct HeapLimitState {
    isolate_handle: IsolateHandle,
    limit_hit: AtomicBool,
    invocation_count: AtomicU32,
    /// Configured maximum heap size in bytes
    max_heap_bytes: usize,
}

impl HeapLimitState {
    pub fn new(isolate_handle: IsolateHandle, max_heap_bytes: usize) -> Self {
        Self {
            isolate_handle,
            limit_hit: AtomicBool::new(false),
            invocation_count: AtomicU32::new(0),
            max_heap_bytes,
        }
    }

    /// Whether execution was ever terminated for exceeding the heap limit.
    pub fn limit_hit(&self) -> bool {
        self.limit_hit.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn invocation_count(&self) -> u32 {
        self.invocation_count.load(Ordering::SeqCst)
    }

    /// Decide the next heap limit. Shared by the V8 callback and tests.
    fn next_limit(&self, current_heap_limit: usize) -> usize {
        let count = self.invocation_count.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            let head_room = self.max_heap_bytes / 10;
            let new_limit = (current_heap_limit + current_heap_limit / 10)
                .min(self.max_heap_bytes + head_room);

            if new_limit > current_heap_limit {
                tracing::warn!(
                    "Near heap limit, raising limit to {} MB to allow GC",
                    new_limit / (1024 * 1024)
                );
                return new_limit;
            }
        }

        tracing::error!(
            "Heap limit exhausted after {} callbacks, terminating execution",
            count + 1
        );

        self.limit_hit.store(true, Ordering::SeqCst);
        self.isolate_handle.terminate_execution();

        // Room to unwind; the terminated script never gets to use it
        current_heap_limit * 2
    }
}

/// # Safety
///
/// `data` must point to the `HeapLimitState` registered with
/// [`install_heap_limit_callback`], which outlives the isolate.
unsafe extern "C" fn near_heap_limit_callback(
    data: *mut c_void,
    current_heap_limit: usize,
    initial_heap_limit: usize,
) -> usize {
    // SAFETY: see function contract
    let state = unsafe { &*(data as *const HeapLimitState) };

    tracing::warn!(
        "Near heap limit callback (current: {} MB, initial: {} MB, max: {} MB)",
        current_heap_limit / (1024 * 1024),
        initial_heap_limit / (1024 * 1024),
        state.max_heap_bytes / (1024 * 1024)
    );

    state.next_limit(current_heap_limit)
}

/// Logs out-of-memory conditions the heap limit cannot intercept before V8
/// aborts the process.
unsafe extern "C" fn oom_error_handler(location: *const c_char, details: &v8::OomDetails) {
    let location = if location.is_null() {
        "unknown".into()
    } else {
        // SAFETY: V8 passes a valid C string
        unsafe { std::ffi::CStr::from_ptr(location) }.to_string_lossy()
    };

    let kind = if details.is_heap_oom {
        "JavaScript heap"
    } else {
        "process"
    };

    tracing::error!("V8 out of memory ({}) at {}", kind, location);
}

/// Install heap limit protection on an isolate.
///
/// Must be called before any script runs. The returned box must be kept alive
/// for the lifetime of the isolate.
pub fn install_heap_limit_callback(
    isolate: &mut v8::Isolate,
    max_heap_bytes: usize,
) -> Box<HeapLimitState> {
    let state = Box::new(HeapLimitState::new(
        isolate.thread_safe_handle(),
        max_heap_bytes,
    ));

    let state_ptr = &*state as *const HeapLimitState as *mut c_void;

    isolate.add_near_heap_limit_callback(near_heap_limit_callback, state_ptr);
    isolate.set_oom_error_handler(oom_error_handler);

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    fn state(max_heap_bytes: usize) -> (v8::OwnedIsolate, HeapLimitState) {
        crate::platform::get_platform(&crate::BridgeConfig::default());
        let isolate = v8::Isolate::new(Default::default());
        let state = HeapLimitState::new(isolate.thread_safe_handle(), max_heap_bytes);
        (isolate, state)
    }

    #[test]
    fn test_first_call_grants_head_room() {
        let (_isolate, state) = state(100 * MB);

        assert_eq!(state.next_limit(100 * MB), 110 * MB);
        assert!(!state.limit_hit());
        assert_eq!(state.invocation_count(), 1);
    }

    #[test]
    fn test_second_call_terminates() {
        let (isolate, state) = state(100 * MB);

        state.next_limit(100 * MB);
        let limit = state.next_limit(110 * MB);

        assert!(limit > 110 * MB);
        assert!(state.limit_hit());
        assert!(isolate.is_execution_terminating());
        isolate.cancel_terminate_execution();
    }

    #[test]
    fn test_head_room_is_capped() {
        let (isolate, state) = state(10 * MB);

        // Already past max + 10%: no more head room, straight to termination
        state.next_limit(20 * MB);
        assert!(state.limit_hit());
        isolate.cancel_terminate_execution();
    }
}
