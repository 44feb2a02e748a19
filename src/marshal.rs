//! Conversion between engine values and tagged values.

use std::sync::Arc;

use crate::context::Context;
use crate::exception::{CatchResult, Caught, from_just};
use crate::value::{Value, ValueRef};

/// Classify an engine value.
///
/// The order of the checks matters: int32 before other numbers, arrays and
/// functions before plain objects. Undefined, null and anything unrecognized
/// become `None`.
pub(crate) fn wrap(
    context: &Context,
    tc: &mut v8::PinnedRef<v8::TryCatch<v8::HandleScope>>,
    value: v8::Local<'_, v8::Value>,
) -> CatchResult<Option<ValueRef>> {
    if value.is_null_or_undefined() {
        return Ok(None);
    }

    let wrapped = if value.is_int32() {
        Value::Int(from_just(tc, value.int32_value(tc))?)
    } else if value.is_number() {
        Value::Double(from_just(tc, value.number_value(tc))?)
    } else if value.is_boolean() {
        Value::Bool(value.boolean_value(tc))
    } else if value.is_string() {
        let string = from_just(tc, value.to_string(tc))?;
        Value::String(context.persistent(tc, string))
    } else if value.is_array() {
        let array: v8::Local<v8::Array> = value.try_into().map_err(|_| Caught)?;
        Value::Array(context.persistent(tc, array))
    } else if value.is_function() {
        let function: v8::Local<v8::Function> = value.try_into().map_err(|_| Caught)?;
        Value::Function(context.persistent(tc, function))
    } else if value.is_external() {
        let external: v8::Local<v8::External> = value.try_into().map_err(|_| Caught)?;
        Value::External(context.persistent(tc, external))
    } else if value.is_object() {
        let object = from_just(tc, value.to_object(tc))?;
        Value::Object(context.persistent(tc, object))
    } else {
        // Symbols, BigInts and friends have no tag
        log::trace!("Unrecognized engine value wrapped as null");
        return Ok(None);
    };

    Ok(Some(Arc::new(wrapped)))
}

/// Engine value for a tagged value. `None` becomes `null`.
///
/// Values that belong to another context's isolate cannot be materialized
/// here and also become `null`.
pub(crate) fn unwrap<'s>(
    context: &Context,
    scope: &v8::PinScope<'s, '_>,
    value: Option<&Value>,
) -> v8::Local<'s, v8::Value> {
    let Some(value) = value else {
        return v8::null(scope).into();
    };

    if let Some(isolate) = value.isolate_ptr()
        && isolate != context.isolate_ptr()
    {
        log::warn!("Value from a foreign context used as null");
        return v8::null(scope).into();
    }

    match value {
        Value::Int(int) => v8::Integer::new(scope, *int).into(),
        Value::Double(double) => v8::Number::new(scope, *double).into(),
        Value::Bool(bool) => v8::Boolean::new(scope, *bool).into(),
        Value::String(handle) => handle.local(scope).into(),
        Value::Object(handle) => handle.local(scope).into(),
        Value::Array(handle) => handle.local(scope).into(),
        Value::Function(handle) => handle.local(scope).into(),
        Value::External(handle) => handle.local(scope).into(),
    }
}

/// Unwrap a slice of arguments in order.
pub(crate) fn unwrap_all<'s>(
    context: &Context,
    scope: &v8::PinScope<'s, '_>,
    values: &[Option<ValueRef>],
) -> Vec<v8::Local<'s, v8::Value>> {
    values
        .iter()
        .map(|value| unwrap(context, scope, value.as_deref()))
        .collect()
}
