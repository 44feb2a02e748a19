//! Flat C ABI.
//!
//! Every entity crosses the boundary as an opaque pointer obtained from
//! `Arc::into_raw`: `JSContext*` is an `Arc<Context>`, every typed value
//! handle (`JSString*`, `JSObject*`, ...) is the same `Arc<Value>` as its
//! `JSValue*`, and `JSScriptException*` is an `Arc<ScriptException>`. Null is
//! the null pointer. Factory functions (`Create*`, `Copy*`, `*Create`) return
//! one owned reference; everything else borrows.
//!
//! No panic crosses the boundary. A panicking export logs the failure and
//! returns its default result.

mod context;
mod exception;
mod object;
mod value;

pub use context::*;
pub use exception::*;
pub use object::*;
pub use value::*;

use std::panic::AssertUnwindSafe;
use std::ptr;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, RuntimeError};
use crate::exception::ScriptException;
use crate::value::{Value, ValueRef};

pub type JSContext = Context;
pub type JSValue = Value;
pub type JSString = Value;
pub type JSObject = Value;
pub type JSArray = Value;
pub type JSFunction = Value;
pub type JSExternal = Value;
pub type JSScriptException = ScriptException;
pub type JSType = crate::value::ValueKind;
pub type JSRuntimeError = RuntimeError;

fn guard<R>(name: &str, default: R, f: impl FnOnce() -> R) -> R {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            log::error!("{name} panicked; returning its default result");
            default
        }
    }
}

fn into_raw(value: Option<ValueRef>) -> *mut JSValue {
    value.map_or(ptr::null_mut(), |value| Arc::into_raw(value) as *mut JSValue)
}

fn as_raw(value: Option<&ValueRef>) -> *mut JSValue {
    value.map_or(ptr::null_mut(), |value| Arc::as_ptr(value) as *mut JSValue)
}

/// # Safety
///
/// `value` must be null or a live pointer handed out by this module.
unsafe fn borrow<'a>(value: *const JSValue) -> Option<&'a Value> {
    unsafe { value.as_ref() }
}

/// A new owned reference to a borrowed value pointer.
///
/// # Safety
///
/// `value` must be null or a live pointer handed out by this module.
unsafe fn retained(value: *const JSValue) -> Option<ValueRef> {
    if value.is_null() {
        return None;
    }
    unsafe {
        Arc::increment_strong_count(value);
        Some(Arc::from_raw(value))
    }
}

/// Take over an owned reference.
///
/// # Safety
///
/// `value` must be null or an owned pointer handed out by this module.
unsafe fn take(value: *mut JSValue) -> Option<ValueRef> {
    if value.is_null() {
        None
    } else {
        Some(unsafe { Arc::from_raw(value) })
    }
}

/// # Safety
///
/// `context` must be null or a live pointer from `CreateJSContext`.
unsafe fn borrow_context<'a>(context: *const JSContext) -> Option<&'a Context> {
    unsafe { context.as_ref() }
}

/// # Safety
///
/// `args` must point to `num_args` readable value pointers, or be null.
unsafe fn retained_args(args: *const *mut JSValue, num_args: i32) -> Vec<Option<ValueRef>> {
    if args.is_null() || num_args <= 0 {
        return Vec::new();
    }
    let args = unsafe { std::slice::from_raw_parts(args, num_args as usize) };
    args.iter().map(|&arg| unsafe { retained(arg) }).collect()
}

/// Reset a runtime error out parameter.
///
/// # Safety
///
/// `out` must be null or writable.
unsafe fn clear_runtime_error(out: *mut JSRuntimeError) {
    if !out.is_null() {
        unsafe { *out = RuntimeError::NoError };
    }
}

/// # Safety
///
/// `out` must be null or writable.
unsafe fn set_runtime_error(out: *mut JSRuntimeError, error: &Error) {
    let Some(code) = RuntimeError::from_error(error) else {
        log::error!("Script exception has no runtime error code: {error}");
        return;
    };

    if !out.is_null() {
        unsafe { *out = code };
    }
}

/// # Safety
///
/// `out` must be null or writable.
unsafe fn clear_script_error(out: *mut *mut JSScriptException) {
    if !out.is_null() {
        unsafe { *out = ptr::null_mut() };
    }
}

/// Hand a script exception to the caller. Other errors have no slot in a
/// script-level operation and are only logged.
///
/// # Safety
///
/// `out` must be null or writable.
unsafe fn set_script_error(name: &str, out: *mut *mut JSScriptException, error: Error) {
    match error {
        Error::Script(exception) if !out.is_null() => unsafe {
            *out = Arc::into_raw(exception) as *mut JSScriptException;
        },
        Error::Script(exception) => {
            log::warn!("{name}: dropping uncaught exception: {exception}");
        }
        other => log::warn!("{name}: {other}"),
    }
}

/// Run a script-level operation, reporting failures through `out_error`.
///
/// # Safety
///
/// `out_error` must be null or writable.
unsafe fn script_call<T: Copy>(
    name: &str,
    out_error: *mut *mut JSScriptException,
    default: T,
    f: impl FnOnce() -> crate::error::Result<T>,
) -> T {
    unsafe { clear_script_error(out_error) };

    guard(name, default, || match f() {
        Ok(result) => result,
        Err(error) => {
            unsafe { set_script_error(name, out_error, error) };
            default
        }
    })
}

/// # Safety
///
/// `context` must be null or a live context, `value` null or a live value.
unsafe fn require<'a>(
    context: *const JSContext,
    value: *const JSValue,
) -> crate::error::Result<(&'a Context, &'a Value)> {
    match unsafe { (borrow_context(context), borrow(value)) } {
        (Some(context), Some(value)) => Ok((context, value)),
        _ => Err(Error::InvalidCast),
    }
}
