use std::ffi::c_void;
use std::ptr;

use super::{
    JSArray, JSContext, JSExternal, JSFunction, JSObject, JSRuntimeError, JSScriptException,
    JSString, JSValue, as_raw, borrow, borrow_context, clear_runtime_error, guard, into_raw,
    require, retained_args, script_call, set_runtime_error, take,
};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::ValueRef;

/// Host side of a native callback.
///
/// `args` holds `num_args` borrowed values. The returned value and anything
/// stored in `out_error` are owned references that the bridge releases.
pub type JSCallback = unsafe extern "C" fn(
    context: *mut JSContext,
    data: *mut c_void,
    args: *const *mut JSValue,
    num_args: i32,
    out_error: *mut *mut JSValue,
) -> *mut JSValue;

fn index(index: i32) -> Result<u32> {
    u32::try_from(index).map_err(|_| Error::InvalidCast)
}

// Object

/// # Safety
///
/// Pointers must be null or live handles from this context; `out_error` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CopyJSObjectProperty(
    context: *mut JSContext,
    obj: *mut JSObject,
    key: *mut JSString,
    out_error: *mut *mut JSScriptException,
) -> *mut JSValue {
    unsafe {
        script_call("CopyJSObjectProperty", out_error, ptr::null_mut(), || {
            let (context, obj) = require(context, obj)?;
            let key = borrow(key).ok_or(Error::InvalidCast)?;
            Ok(into_raw(context.get_property(obj, key)?))
        })
    }
}

/// # Safety
///
/// Pointers must be null or live handles from this context; `out_error` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn SetJSObjectProperty(
    context: *mut JSContext,
    obj: *mut JSObject,
    key: *mut JSString,
    value: *mut JSValue,
    out_error: *mut *mut JSScriptException,
) {
    unsafe {
        script_call("SetJSObjectProperty", out_error, (), || {
            let (context, obj) = require(context, obj)?;
            let key = borrow(key).ok_or(Error::InvalidCast)?;
            context.set_property(obj, key, borrow(value))
        })
    }
}

/// # Safety
///
/// Pointers must be null or live handles from this context; `out_error` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CopyJSObjectOwnPropertyNames(
    context: *mut JSContext,
    obj: *mut JSObject,
    out_error: *mut *mut JSScriptException,
) -> *mut JSArray {
    unsafe {
        script_call("CopyJSObjectOwnPropertyNames", out_error, ptr::null_mut(), || {
            let (context, obj) = require(context, obj)?;
            Ok(into_raw(Some(context.own_property_names(obj)?)))
        })
    }
}

/// # Safety
///
/// Pointers must be null or live handles from this context; `out_error` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSObjectHasProperty(
    context: *mut JSContext,
    obj: *mut JSObject,
    key: *mut JSString,
    out_error: *mut *mut JSScriptException,
) -> bool {
    unsafe {
        script_call("JSObjectHasProperty", out_error, false, || {
            let (context, obj) = require(context, obj)?;
            let key = borrow(key).ok_or(Error::InvalidCast)?;
            context.has_property(obj, key)
        })
    }
}

/// Backing memory of an ArrayBuffer, valid while `obj` is retained.
///
/// # Safety
///
/// Pointers must be null or live handles from this context; `out_error` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSObjectArrayBufferData(
    context: *mut JSContext,
    obj: *mut JSObject,
    out_error: *mut JSRuntimeError,
) -> *mut c_void {
    unsafe { clear_runtime_error(out_error) };

    guard("GetJSObjectArrayBufferData", ptr::null_mut(), || {
        let result = unsafe { require(context, obj) }
            .and_then(|(context, obj)| context.array_buffer_data(obj));

        result.unwrap_or_else(|error| {
            unsafe { set_runtime_error(out_error, &error) };
            ptr::null_mut()
        })
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn JSObjectAsValue(obj: *mut JSObject) -> *mut JSValue {
    obj
}

// Array

/// # Safety
///
/// Pointers must be null or live handles from this context; `out_error` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CopyJSArrayPropertyAtIndex(
    context: *mut JSContext,
    arr: *mut JSArray,
    index: i32,
    out_error: *mut *mut JSScriptException,
) -> *mut JSValue {
    unsafe {
        script_call("CopyJSArrayPropertyAtIndex", out_error, ptr::null_mut(), || {
            let (context, arr) = require(context, arr)?;
            Ok(into_raw(context.get_index(arr, self::index(index)?)?))
        })
    }
}

/// # Safety
///
/// Pointers must be null or live handles from this context; `out_error` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn SetJSArrayPropertyAtIndex(
    context: *mut JSContext,
    arr: *mut JSArray,
    index: i32,
    value: *mut JSValue,
    out_error: *mut *mut JSScriptException,
) {
    unsafe {
        script_call("SetJSArrayPropertyAtIndex", out_error, (), || {
            let (context, arr) = require(context, arr)?;
            context.set_index(arr, self::index(index)?, borrow(value))
        })
    }
}

/// # Safety
///
/// `context` must be a live context; `arr` null or a live value.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn JSArrayLength(context: *mut JSContext, arr: *mut JSArray) -> i32 {
    guard("JSArrayLength", 0, || {
        unsafe { require(context, arr) }
            .and_then(|(context, arr)| context.array_length(arr))
            .map_or(0, |length| i32::try_from(length).unwrap_or(i32::MAX))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn JSArrayAsValue(arr: *mut JSArray) -> *mut JSValue {
    arr
}

// Function

/// # Safety
///
/// Pointers must be null or live handles from this context; `args` must hold
/// `num_args` value pointers; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CallJSFunctionCreate(
    context: *mut JSContext,
    function: *mut JSFunction,
    this_object: *mut JSObject,
    args: *const *mut JSValue,
    num_args: i32,
    out_error: *mut *mut JSScriptException,
) -> *mut JSValue {
    unsafe {
        script_call("CallJSFunctionCreate", out_error, ptr::null_mut(), || {
            let (context, function) = require(context, function)?;
            let args = retained_args(args, num_args);
            let result = context.call(function, borrow(this_object), &args);
            context.release(args);
            Ok(into_raw(result?))
        })
    }
}

/// # Safety
///
/// Pointers must be null or live handles from this context; `args` must hold
/// `num_args` value pointers; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ConstructJSFunctionCreate(
    context: *mut JSContext,
    function: *mut JSFunction,
    args: *const *mut JSValue,
    num_args: i32,
    out_error: *mut *mut JSScriptException,
) -> *mut JSObject {
    unsafe {
        script_call("ConstructJSFunctionCreate", out_error, ptr::null_mut(), || {
            let (context, function) = require(context, function)?;
            let args = retained_args(args, num_args);
            let result = context.construct(function, &args);
            context.release(args);
            Ok(into_raw(Some(result?)))
        })
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn JSFunctionAsValue(function: *mut JSFunction) -> *mut JSValue {
    function
}

/// Expose `callback` to script. `data` is passed to every call and, once
/// the function is collected, to the context's callback finalizer.
///
/// # Safety
///
/// `context` must be a live context; `callback` must stay callable for the
/// context's lifetime; `out_error` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CreateJSCallback(
    context: *mut JSContext,
    data: *mut c_void,
    callback: Option<JSCallback>,
    out_error: *mut *mut JSScriptException,
) -> *mut JSFunction {
    unsafe {
        script_call("CreateJSCallback", out_error, ptr::null_mut(), || {
            let context = borrow_context(context).ok_or(Error::InvalidCast)?;
            let callback = callback.ok_or(Error::InvalidCast)?;
            let function = context.create_callback(data, move |context, data, args| {
                foreign_callback(callback, context, data, args)
            })?;
            Ok(into_raw(Some(function)))
        })
    }
}

fn foreign_callback(
    callback: JSCallback,
    context: &Context,
    data: *mut c_void,
    args: &[Option<ValueRef>],
) -> crate::callback::CallbackResult {
    let raw_args: Vec<*mut JSValue> = args.iter().map(|arg| as_raw(arg.as_ref())).collect();
    let num_args = i32::try_from(raw_args.len()).unwrap_or(i32::MAX);
    let mut error = ptr::null_mut();

    // SAFETY: the host registered `callback` with this signature; argument
    // pointers stay borrowed for the duration of the call
    let result = unsafe {
        callback(
            context as *const Context as *mut JSContext,
            data,
            raw_args.as_ptr(),
            num_args,
            &mut error,
        )
    };

    // SAFETY: both are owned references handed back by the host
    let (result, error) = unsafe { (take(result), take(error)) };

    match error {
        Some(error) => Err(error),
        None => Ok(result),
    }
}

// External

/// # Safety
///
/// `context` must be a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CreateJSExternal(
    context: *mut JSContext,
    value: *mut c_void,
) -> *mut JSExternal {
    guard("CreateJSExternal", ptr::null_mut(), || {
        match unsafe { borrow_context(context) } {
            Some(context) => into_raw(Some(context.create_external(value))),
            None => ptr::null_mut(),
        }
    })
}

/// # Safety
///
/// `context` must be a live context; `external` null or a live value.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetJSExternalValue(
    context: *mut JSContext,
    external: *mut JSExternal,
) -> *mut c_void {
    guard("GetJSExternalValue", ptr::null_mut(), || {
        unsafe { require(context, external) }
            .and_then(|(context, external)| context.external_value(external))
            .unwrap_or_else(|error| {
                log::warn!("GetJSExternalValue: {error}");
                ptr::null_mut()
            })
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn JSExternalAsValue(external: *mut JSExternal) -> *mut JSValue {
    external
}
