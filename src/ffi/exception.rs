//! Accessors for script exceptions. Getters return references borrowed
//! from the exception.

use std::ptr;
use std::sync::Arc;

use super::{JSContext, JSScriptException, JSString, JSValue, as_raw, borrow_context, guard};
use crate::exception::ScriptException;
use crate::value::ValueRef;

/// # Safety
///
/// `e` must be null or a live exception pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn RetainJSScriptException(
    _context: *mut JSContext,
    e: *mut JSScriptException,
) {
    if !e.is_null() {
        unsafe { Arc::increment_strong_count(e) };
    }
}

/// # Safety
///
/// `e` must be null or an owned exception pointer; `context` null or the
/// live context it came from.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ReleaseJSScriptException(
    context: *mut JSContext,
    e: *mut JSScriptException,
) {
    if e.is_null() {
        return;
    }
    guard("ReleaseJSScriptException", (), || {
        let e = unsafe { Arc::from_raw(e) };
        match unsafe { borrow_context(context) } {
            Some(context) => context.release(e),
            None => drop(e),
        }
    })
}

/// # Safety
///
/// `e` must be null or a live exception pointer.
unsafe fn field(
    e: *mut JSScriptException,
    f: impl FnOnce(&ScriptException) -> &ValueRef,
) -> *mut JSString {
    match unsafe { e.as_ref() } {
        Some(e) => as_raw(Some(f(e))),
        None => ptr::null_mut(),
    }
}

/// The thrown value, or null when nothing could be wrapped.
///
/// # Safety
///
/// `e` must be null or a live exception pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSScriptException(e: *mut JSScriptException) -> *mut JSValue {
    match unsafe { e.as_ref() } {
        Some(e) => as_raw(e.exception()),
        None => ptr::null_mut(),
    }
}

/// # Safety
///
/// `e` must be null or a live exception pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSScriptExceptionMessage(
    e: *mut JSScriptException,
) -> *mut JSString {
    unsafe { field(e, ScriptException::message_value) }
}

/// # Safety
///
/// `e` must be null or a live exception pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSScriptExceptionFileName(
    e: *mut JSScriptException,
) -> *mut JSString {
    unsafe { field(e, ScriptException::file_name_value) }
}

/// `-1` when the engine reported no message.
///
/// # Safety
///
/// `e` must be null or a live exception pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSScriptExceptionLineNumber(e: *mut JSScriptException) -> i32 {
    unsafe { e.as_ref() }.map_or(-1, ScriptException::line_number)
}

/// # Safety
///
/// `e` must be null or a live exception pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSScriptExceptionStackTrace(
    e: *mut JSScriptException,
) -> *mut JSString {
    unsafe { field(e, ScriptException::stack_trace_value) }
}

/// # Safety
///
/// `e` must be null or a live exception pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSScriptExceptionSourceLine(
    e: *mut JSScriptException,
) -> *mut JSString {
    unsafe { field(e, ScriptException::source_line_value) }
}
