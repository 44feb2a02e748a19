use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use super::{
    JSArray, JSContext, JSExternal, JSFunction, JSObject, JSRuntimeError, JSString, JSType,
    JSValue, borrow, borrow_context, clear_runtime_error, guard, into_raw, set_runtime_error,
};
use crate::error::{Error, Result};
use crate::value::{Value, ValueKind, kind_of};

// Value

/// # Safety
///
/// `value` must be null or a live value pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSValueType(value: *mut JSValue) -> JSType {
    kind_of(unsafe { borrow(value) })
}

/// # Safety
///
/// `value` must be null or a live value pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn RetainJSValue(_context: *mut JSContext, value: *mut JSValue) {
    if !value.is_null() {
        unsafe { Arc::increment_strong_count(value) };
    }
}

/// Drop one reference. With a live `context` the last reference resets its
/// engine handle immediately; without one the reset is deferred until the
/// owning context next takes its lock.
///
/// # Safety
///
/// `value` must be null or an owned value pointer; `context` must be null or
/// the live context the value came from.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ReleaseJSValue(context: *mut JSContext, value: *mut JSValue) {
    if value.is_null() {
        return;
    }
    guard("ReleaseJSValue", (), || {
        let value = unsafe { Arc::from_raw(value) };
        match unsafe { borrow_context(context) } {
            Some(context) => context.release(value),
            None => drop(value),
        }
    })
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
unsafe fn cast<T: Default>(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
    f: impl FnOnce(&Value) -> Result<T>,
) -> T {
    unsafe { clear_runtime_error(out_error) };

    let result = match unsafe { borrow(value) } {
        Some(value) => f(value),
        None => Err(Error::InvalidCast),
    };

    result.unwrap_or_else(|error| {
        unsafe { set_runtime_error(out_error, &error) };
        T::default()
    })
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
unsafe fn cast_handle(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
    kind: ValueKind,
) -> *mut JSValue {
    unsafe { clear_runtime_error(out_error) };

    if kind_of(unsafe { borrow(value) }) == kind {
        value
    } else {
        unsafe { set_runtime_error(out_error, &Error::InvalidCast) };
        ptr::null_mut()
    }
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsInt(value: *mut JSValue, out_error: *mut JSRuntimeError) -> i32 {
    unsafe { cast(value, out_error, Value::as_int) }
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsDouble(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
) -> f64 {
    unsafe { cast(value, out_error, Value::as_double) }
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsBool(value: *mut JSValue, out_error: *mut JSRuntimeError) -> bool {
    unsafe { cast(value, out_error, Value::as_bool) }
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsString(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
) -> *mut JSString {
    unsafe { cast_handle(value, out_error, ValueKind::String) }
}

/// Null converts to a null object without error.
///
/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsObject(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
) -> *mut JSObject {
    if value.is_null() {
        unsafe { clear_runtime_error(out_error) };
        return ptr::null_mut();
    }
    unsafe { cast_handle(value, out_error, ValueKind::Object) }
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsArray(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
) -> *mut JSArray {
    unsafe { cast_handle(value, out_error, ValueKind::Array) }
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsFunction(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
) -> *mut JSFunction {
    unsafe { cast_handle(value, out_error, ValueKind::Function) }
}

/// # Safety
///
/// `value` must be null or a live value pointer; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueAsExternal(
    value: *mut JSValue,
    out_error: *mut JSRuntimeError,
) -> *mut JSExternal {
    unsafe { cast_handle(value, out_error, ValueKind::External) }
}

/// # Safety
///
/// `context` must be a live context; `a` and `b` null or live values.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSValueStrictEquals(
    context: *mut JSContext,
    a: *mut JSValue,
    b: *mut JSValue,
) -> bool {
    guard("JSValueStrictEquals", false, || {
        match unsafe { borrow_context(context) } {
            Some(context) => context.strict_equals(unsafe { borrow(a) }, unsafe { borrow(b) }),
            None => false,
        }
    })
}

// Primitives

#[unsafe(no_mangle)]
pub extern "C" fn JSNull() -> *mut JSValue {
    ptr::null_mut()
}

#[unsafe(no_mangle)]
pub extern "C" fn CreateJSInt(value: i32) -> *mut JSValue {
    into_raw(Some(Value::int(value)))
}

#[unsafe(no_mangle)]
pub extern "C" fn CreateJSDouble(value: f64) -> *mut JSValue {
    into_raw(Some(Value::double(value)))
}

#[unsafe(no_mangle)]
pub extern "C" fn CreateJSBool(value: bool) -> *mut JSValue {
    into_raw(Some(Value::bool(value)))
}

/// ArrayBuffer over host memory. The engine never frees `data`.
///
/// # Safety
///
/// `context` must be a live context; `data` must stay valid for
/// `byte_length` bytes while script can reach the buffer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CreateExternalJSArrayBuffer(
    context: *mut JSContext,
    data: *mut c_void,
    byte_length: i32,
) -> *mut JSObject {
    guard("CreateExternalJSArrayBuffer", ptr::null_mut(), || {
        let Some(context) = (unsafe { borrow_context(context) }) else {
            return ptr::null_mut();
        };
        let byte_length = usize::try_from(byte_length).unwrap_or(0);
        into_raw(Some(unsafe { context.create_array_buffer(data, byte_length) }))
    })
}

// String

/// # Safety
///
/// `context` must be a live context; `buffer` must hold `length` code units;
/// `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CreateJSString(
    context: *mut JSContext,
    buffer: *const u16,
    length: i32,
    out_error: *mut JSRuntimeError,
) -> *mut JSString {
    unsafe { clear_runtime_error(out_error) };

    guard("CreateJSString", ptr::null_mut(), || {
        let Some(context) = (unsafe { borrow_context(context) }) else {
            return ptr::null_mut();
        };

        let utf16 = match usize::try_from(length) {
            Ok(length) if length > 0 && !buffer.is_null() => unsafe {
                std::slice::from_raw_parts(buffer, length)
            },
            _ => &[],
        };

        match context.create_string(utf16) {
            Ok(string) => into_raw(Some(string)),
            Err(error) => {
                unsafe { set_runtime_error(out_error, &error) };
                ptr::null_mut()
            }
        }
    })
}

/// Length in UTF-16 code units; 0 for anything that is not a string.
///
/// # Safety
///
/// `context` must be a live context; `string` null or a live value.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSStringLength(context: *mut JSContext, string: *mut JSString) -> i32 {
    guard("JSStringLength", 0, || {
        let (Some(context), Some(string)) = (unsafe { (borrow_context(context), borrow(string)) })
        else {
            return 0;
        };
        context
            .string_length(string)
            .map_or(0, |length| i32::try_from(length).unwrap_or(i32::MAX))
    })
}

/// Copy the whole string into `out_buffer`, plus a NUL unit when
/// `null_terminate` is set.
///
/// # Safety
///
/// `out_buffer` must have room for `JSStringLength` code units, plus one when
/// `null_terminate` is set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn WriteJSStringBuffer(
    context: *mut JSContext,
    string: *mut JSString,
    out_buffer: *mut u16,
    null_terminate: bool,
) {
    if out_buffer.is_null() {
        return;
    }

    guard("WriteJSStringBuffer", (), || {
        let (Some(context), Some(string)) = (unsafe { (borrow_context(context), borrow(string)) })
        else {
            return;
        };
        let Ok(length) = context.string_length(string) else {
            log::warn!("WriteJSStringBuffer: not a string");
            return;
        };

        let room = length + usize::from(null_terminate);
        let out = unsafe { std::slice::from_raw_parts_mut(out_buffer, room) };
        if let Err(error) = context.write_string(string, out, null_terminate) {
            log::warn!("WriteJSStringBuffer: {error}");
        }
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn JSStringAsValue(string: *mut JSString) -> *mut JSValue {
    string
}
