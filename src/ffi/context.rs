use std::ffi::{CString, c_char};
use std::ptr;
use std::sync::{Arc, OnceLock};

use super::{
    JSContext, JSObject, JSScriptException, JSString, JSValue, borrow, borrow_context,
    clear_script_error, guard, into_raw, set_script_error,
};
use crate::context::Context;
use crate::finalizer::{ExternFinalizer, FinalizerHooks, ForeignFinalizer};

/// # Safety
///
/// `context` must be null or a live pointer from [`CreateJSContext`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn RetainJSContext(context: *mut JSContext) {
    if !context.is_null() {
        unsafe { Arc::increment_strong_count(context) };
    }
}

/// Drop one reference; the last one tears the context down.
///
/// # Safety
///
/// `context` must be null or an owned pointer from [`CreateJSContext`]. Every
/// value derived from the context must be released first.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ReleaseJSContext(context: *mut JSContext) {
    if context.is_null() {
        return;
    }
    guard("ReleaseJSContext", (), || drop(unsafe { Arc::from_raw(context) }));
}

/// Create a context with its own isolate. Either finalizer may be null.
#[unsafe(no_mangle)]
pub extern "C" fn CreateJSContext(
    callback_finalizer: Option<ExternFinalizer>,
    external_finalizer: Option<ExternFinalizer>,
) -> *mut JSContext {
    guard("CreateJSContext", ptr::null_mut(), || {
        let mut hooks = FinalizerHooks::new();
        if let Some(f) = callback_finalizer {
            hooks = hooks.on_callback(ForeignFinalizer::new(f));
        }
        if let Some(f) = external_finalizer {
            hooks = hooks.on_external(ForeignFinalizer::new(f));
        }
        Arc::into_raw(Context::new(hooks)) as *mut JSContext
    })
}

/// # Safety
///
/// `context` must be a live context; `file_name` and `code` must be strings
/// created by it; `out_error` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSContextEvaluateCreate(
    context: *mut JSContext,
    file_name: *mut JSString,
    code: *mut JSString,
    out_error: *mut *mut JSScriptException,
) -> *mut JSValue {
    unsafe { clear_script_error(out_error) };

    guard("JSContextEvaluateCreate", ptr::null_mut(), || {
        let (Some(context), Some(file_name), Some(code)) =
            (unsafe { (borrow_context(context), borrow(file_name), borrow(code)) })
        else {
            log::warn!("JSContextEvaluateCreate: null argument");
            return ptr::null_mut();
        };

        match context.evaluate_strings(file_name, code) {
            Ok(result) => into_raw(result),
            Err(error) => {
                unsafe { set_script_error("JSContextEvaluateCreate", out_error, error) };
                ptr::null_mut()
            }
        }
    })
}

/// # Safety
///
/// `context` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSContextCopyGlobalObject(context: *mut JSContext) -> *mut JSObject {
    guard("JSContextCopyGlobalObject", ptr::null_mut(), || {
        match unsafe { borrow_context(context) } {
            Some(context) => into_raw(Some(context.global_object())),
            None => ptr::null_mut(),
        }
    })
}

/// Force a full collection, running the finalizers of everything that has
/// become unreachable.
///
/// # Safety
///
/// `context` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSContextCollectGarbage(context: *mut JSContext) {
    guard("JSContextCollectGarbage", (), || {
        if let Some(context) = unsafe { borrow_context(context) } {
            context.collect_garbage();
        }
    })
}

/// The engine version as a static NUL-terminated string.
#[unsafe(no_mangle)]
pub extern "C" fn GetV8Version() -> *const c_char {
    static VERSION: OnceLock<CString> = OnceLock::new();

    VERSION
        .get_or_init(|| CString::new(v8::V8::get_version()).unwrap_or_default())
        .as_ptr()
}
