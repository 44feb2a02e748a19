//! Host finalizer hooks.
//!
//! Finalizers run inside collection pauses. They receive the host pointer
//! and nothing else: no context, no isolate, no scope. Anything that would
//! need the engine cannot be expressed from inside one.

use std::ffi::c_void;
use std::sync::{Mutex, PoisonError};

/// A non-reentrant hook invoked when the collector releases a host payload.
pub trait Finalize: Send + Sync {
    fn finalize(&self, data: *mut c_void);
}

impl<F> Finalize for F
where
    F: Fn(*mut c_void) + Send + Sync,
{
    fn finalize(&self, data: *mut c_void) {
        self(data)
    }
}

/// Foreign finalizer registered through the flat surface.
pub type ExternFinalizer = unsafe extern "C" fn(data: *mut c_void);

/// Adapter from an `extern "C"` finalizer to [`Finalize`].
#[derive(Clone, Copy)]
pub struct ForeignFinalizer(ExternFinalizer);

impl ForeignFinalizer {
    pub fn new(f: ExternFinalizer) -> Self {
        Self(f)
    }
}

impl Finalize for ForeignFinalizer {
    fn finalize(&self, data: *mut c_void) {
        // SAFETY: the host registered this function for exactly this use
        unsafe { (self.0)(data) }
    }
}

type Hook = Mutex<Option<Box<dyn Finalize>>>;

/// The two finalizer hooks of a context.
///
/// Set at construction, cleared before the isolate is torn down. After
/// [`clear`](Self::clear) no hook is ever invoked again.
#[derive(Default)]
pub struct FinalizerHooks {
    callback: Hook,
    external: Hook,
}

impl FinalizerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked with the `data` of a native callback once its function is collected.
    pub fn on_callback(self, hook: impl Finalize + 'static) -> Self {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
        self
    }

    /// Invoked with the pointer of an external once it is collected.
    pub fn on_external(self, hook: impl Finalize + 'static) -> Self {
        *self.external.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
        self
    }

    pub(crate) fn finalize_callback(&self, data: *mut c_void) {
        Self::invoke(&self.callback, "callback", data);
    }

    pub(crate) fn finalize_external(&self, data: *mut c_void) {
        Self::invoke(&self.external, "external", data);
    }

    fn invoke(hook: &Hook, kind: &str, data: *mut c_void) {
        let hook = hook.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(hook) = hook.as_ref() {
            log::debug!("Finalizing {} {:?}", kind, data);

            // A panicking host hook must not unwind through the collector
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hook.finalize(data)))
                .is_err()
            {
                log::error!("{} finalizer panicked for {:?}", kind, data);
            }
        }
    }

    pub(crate) fn clear(&self) {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.external
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl std::fmt::Debug for FinalizerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |hook: &Hook| hook.lock().map(|h| h.is_some()).unwrap_or(false);

        f.debug_struct("FinalizerHooks")
            .field("callback", &set(&self.callback))
            .field("external", &set(&self.external))
            .finish()
    }
}
