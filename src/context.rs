//! Execution contexts.
//!
//! A [`Context`] exclusively owns one unentered isolate and one persistent
//! top-level `v8::Context`. Every engine operation goes through the scope
//! guard in [`Context::enter`]:
//!
//! ```text
//! mutex → v8::Locker → JsLock → HandleScope → ContextScope → (TryCatch)
//! ```
//!
//! and unwinds in reverse order on every exit path. Host calls made from
//! inside a native callback find the isolate already locked by their own
//! thread and reuse the outer lock instead of taking it again.

use std::cell::UnsafeCell;
use std::mem::ManuallyDrop;
use std::pin::pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{self, BridgeConfig};
use crate::error::{Error, Result};
use crate::exception::{self, CatchResult, from_just};
use crate::finalizer::FinalizerHooks;
use crate::gc::{AnchorRegistry, DeferredDestructionQueue, JsLock, Persistent};
use crate::marshal;
use crate::platform;
use crate::security::{HeapLimitState, install_heap_limit_callback};
use crate::value::{Value, ValueRef};

pub struct Context {
    global: ManuallyDrop<v8::Global<v8::Context>>,
    anchors: AnchorRegistry,
    hooks: Arc<FinalizerHooks>,
    deferred: Arc<DeferredDestructionQueue>,
    handle: v8::IsolateHandle,
    isolate_ptr: *mut v8::Isolate,
    lock: Mutex<()>,
    /// Nesting depth of try/catch regions on the locking thread
    depth: AtomicU32,
    isolate: UnsafeCell<v8::UnenteredIsolate>,
    /// Must outlive the isolate; declared after it so it drops after it
    heap_limit: Option<Box<HeapLimitState>>,
}

// SAFETY: the isolate and every handle owned by the context are only touched
// while `lock` and the v8::Locker are held, or through the re-entrant path
// taken by the thread that already holds them.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

struct DepthGuard<'a>(&'a AtomicU32);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a AtomicU32) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Context {
    /// Create a context configured from the process environment.
    pub fn new(hooks: FinalizerHooks) -> Arc<Self> {
        Self::with_config(config::process_config(), hooks)
    }

    pub fn with_config(config: &BridgeConfig, hooks: FinalizerHooks) -> Arc<Self> {
        platform::get_platform(config);

        let mut params = v8::CreateParams::default();

        if let Some((initial, max)) = config.heap_limits() {
            params = params.heap_limits(initial, max);
        }

        let mut isolate = v8::Isolate::new_unentered(params);

        let (isolate_ptr, handle, heap_limit, global) = {
            let mut locker = v8::Locker::new(&mut isolate);
            let isolate_ptr = &mut *locker as *mut v8::Isolate;
            let handle = locker.thread_safe_handle();

            let heap_limit = config
                .heap_limits()
                .map(|(_, max)| install_heap_limit_callback(&mut locker, max));

            let global = {
                let scope = pin!(v8::HandleScope::new(&mut *locker));
                let scope = scope.init();
                let context = v8::Context::new(&scope, Default::default());
                v8::Global::new(&scope, context)
            };

            (isolate_ptr, handle, heap_limit, global)
        };

        log::debug!(
            "Created context (isolate {:?}, heap limit {:?})",
            isolate_ptr,
            config.heap_limits().map(|(_, max)| max)
        );

        Arc::new(Self {
            global: ManuallyDrop::new(global),
            anchors: AnchorRegistry::new(),
            hooks: Arc::new(hooks),
            deferred: Arc::new(DeferredDestructionQueue::new()),
            handle,
            isolate_ptr,
            lock: Mutex::new(()),
            depth: AtomicU32::new(0),
            isolate: UnsafeCell::new(isolate),
            heap_limit,
        })
    }

    /// Run `f` with the isolate locked by this thread.
    ///
    /// Pending deferred destructions are processed right after the lock is
    /// acquired. Engine tasks left by collections are run, and finalized
    /// anchors swept, both after acquiring and before releasing the lock.
    pub(crate) fn with_isolate<R>(&self, f: impl FnOnce(&mut v8::Isolate) -> R) -> R {
        if JsLock::is_held(self.isolate_ptr) {
            // SAFETY: this thread holds the lock further up the stack
            return f(unsafe { &mut *self.isolate_ptr });
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        // SAFETY: the mutex serializes access to the unentered isolate
        let mut locker = v8::Locker::new(unsafe { &mut *self.isolate.get() });

        self.deferred.destroy_pending();
        let _js_lock = JsLock::new(&mut *locker);
        self.run_finalizers(&locker);

        let result = f(&mut *locker);

        self.run_finalizers(&locker);
        result
    }

    /// Must be called under the lock, outside of any handle scope.
    fn run_finalizers(&self, isolate: &v8::Isolate) {
        platform::pump_tasks(isolate);
        self.anchors.sweep();
    }

    /// Scope guard: lock, isolate, handle scope and context scope.
    pub(crate) fn enter<R>(&self, f: impl FnOnce(&mut v8::PinScope<'_, '_>) -> R) -> R {
        self.with_isolate(|isolate| {
            let scope = pin!(v8::HandleScope::new(isolate));
            let mut scope = scope.init();
            let context = v8::Local::new(&scope, &*self.global);
            let scope = &mut v8::ContextScope::new(&mut scope, context);
            f(scope)
        })
    }

    /// [`enter`](Self::enter) plus a try/catch. A caught exception becomes
    /// [`Error::Script`], even if `f` claims success.
    pub(crate) fn try_catch<R>(
        &self,
        f: impl FnOnce(&mut v8::PinnedRef<v8::TryCatch<v8::HandleScope>>) -> CatchResult<R>,
    ) -> Result<R> {
        self.enter(|scope| {
            let _depth = DepthGuard::enter(&self.depth);
            let tc = pin!(v8::TryCatch::new(scope));
            let mut tc = tc.init();

            match f(&mut tc) {
                Ok(value) if !tc.has_caught() && !tc.has_terminated() => Ok(value),
                _ => Err(Error::Script(exception::capture(self, &mut tc))),
            }
        })
    }

    /// Persist a local handle owned by this context.
    pub(crate) fn persistent<T: 'static>(
        &self,
        scope: &v8::PinScope<'_, '_>,
        local: v8::Local<'_, T>,
    ) -> Persistent<T> {
        Persistent::new(
            v8::Global::new(scope, local),
            self.isolate_ptr,
            Arc::clone(&self.deferred),
        )
    }

    /// Reject handles that belong to another context's isolate.
    pub(crate) fn owned<'v, T: 'static>(
        &self,
        handle: &'v Persistent<T>,
    ) -> Result<&'v Persistent<T>> {
        if handle.isolate_ptr() == self.isolate_ptr {
            Ok(handle)
        } else {
            Err(Error::InvalidCast)
        }
    }

    pub(crate) fn isolate_ptr(&self) -> *mut v8::Isolate {
        self.isolate_ptr
    }

    pub(crate) fn anchors(&self) -> &AnchorRegistry {
        &self.anchors
    }

    pub(crate) fn hooks(&self) -> &Arc<FinalizerHooks> {
        &self.hooks
    }

    pub(crate) fn is_outermost_call(&self) -> bool {
        self.depth.load(Ordering::SeqCst) <= 1
    }

    pub(crate) fn cancel_termination(&self) {
        self.handle.cancel_terminate_execution();
    }

    /// Whether a script was ever terminated for exceeding the heap limit.
    pub fn memory_limit_hit(&self) -> bool {
        self.heap_limit
            .as_ref()
            .is_some_and(|state| state.limit_hit())
    }

    /// Number of weak anchors (callbacks and externals) not yet finalized.
    pub fn live_anchors(&self) -> usize {
        self.with_isolate(|_| self.anchors.len())
    }

    /// Number of handle destructions waiting for the lock.
    pub fn pending_destructions(&self) -> usize {
        self.deferred.len()
    }

    /// Force a full collection. Finalizers of unreachable callbacks and
    /// externals run before this returns.
    pub fn collect_garbage(&self) {
        self.with_isolate(|isolate| {
            isolate.low_memory_notification();
        });
    }

    /// Compile and run `code`, reporting `file_name` in diagnostics.
    pub fn evaluate(&self, file_name: &str, code: &str) -> Result<Option<ValueRef>> {
        // Held across the call so the temporary strings are reset under the lock
        self.with_isolate(|_| {
            let file_name = self.create_string_from_str(file_name)?;
            let code = self.create_string_from_str(code)?;
            self.evaluate_strings(&file_name, &code)
        })
    }

    /// [`evaluate`](Self::evaluate) with engine strings.
    pub fn evaluate_strings(&self, file_name: &Value, code: &Value) -> Result<Option<ValueRef>> {
        let file_name = self.owned(file_name.string_handle()?)?;
        let code = self.owned(code.string_handle()?)?;

        self.try_catch(|tc| {
            let name = file_name.local(tc);
            let source = code.local(tc);
            let origin = v8::ScriptOrigin::new(
                tc,
                name.into(),
                0,
                0,
                false,
                0,
                None,
                false,
                false,
                false,
                None,
            );

            let script = from_just(tc, v8::Script::compile(tc, source, Some(&origin)))?;
            let result = from_just(tc, script.run(tc))?;
            marshal::wrap(self, tc, result)
        })
    }

    /// The context's global object.
    pub fn global_object(&self) -> ValueRef {
        self.enter(|scope| {
            let global = scope.get_current_context().global(scope);
            Arc::new(Value::Object(self.persistent(scope, global)))
        })
    }

    /// Script `===` between two values.
    pub fn strict_equals(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        self.enter(|scope| {
            let a = marshal::unwrap(self, scope, a);
            let b = marshal::unwrap(self, scope, b);
            a.strict_equals(b)
        })
    }

    /// Drop `value` under this context's lock so its handle is reset now
    /// rather than deferred.
    pub fn release<T>(&self, value: T) {
        self.with_isolate(|_| drop(value));
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // No finalizer may reach the host once teardown starts
        self.hooks.clear();

        let mut locker = v8::Locker::new(self.isolate.get_mut());
        self.deferred.destroy_pending();
        let _js_lock = JsLock::new(&mut *locker);

        self.anchors.clear();

        // SAFETY: the context global is never used again
        unsafe { ManuallyDrop::drop(&mut self.global) };

        if Arc::strong_count(&self.deferred) > 1 {
            log::warn!("Bridge values outlived their context; their handles are leaked");
        }

        log::debug!("Disposed context (isolate {:?})", self.isolate_ptr);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("isolate", &self.isolate_ptr)
            .field("hooks", &self.hooks)
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}
