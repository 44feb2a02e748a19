//! Tagged values.
//!
//! A [`Value`] is a closed variant over everything script can hand to the
//! host. Null is not a variant: it is the absence of a value, `None` on the
//! Rust side and the null pointer on the flat surface.

use std::ffi::c_void;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gc::Persistent;

/// Shared, reference-counted value. Cloning retains, dropping releases.
pub type ValueRef = Arc<Value>;

/// Type tag of a value, in flat-surface order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Int,
    Double,
    String,
    Bool,
    Object,
    Array,
    Function,
    External,
}

pub enum Value {
    Int(i32),
    Double(f64),
    Bool(bool),
    String(Persistent<v8::String>),
    Object(Persistent<v8::Object>),
    Array(Persistent<v8::Array>),
    Function(Persistent<v8::Function>),
    External(Persistent<v8::External>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::Bool(_) => ValueKind::Bool,
            Value::String(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
            Value::Array(_) => ValueKind::Array,
            Value::Function(_) => ValueKind::Function,
            Value::External(_) => ValueKind::External,
        }
    }

    pub fn int(value: i32) -> ValueRef {
        Arc::new(Value::Int(value))
    }

    pub fn double(value: f64) -> ValueRef {
        Arc::new(Value::Double(value))
    }

    pub fn bool(value: bool) -> ValueRef {
        Arc::new(Value::Bool(value))
    }

    pub fn as_int(&self) -> Result<i32> {
        match self {
            Value::Int(value) => Ok(*value),
            _ => Err(Error::InvalidCast),
        }
    }

    pub fn as_double(&self) -> Result<f64> {
        match self {
            Value::Double(value) => Ok(*value),
            _ => Err(Error::InvalidCast),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(value) => Ok(*value),
            _ => Err(Error::InvalidCast),
        }
    }

    /// Numeric value of an Int or Double.
    pub fn as_number(&self) -> Result<f64> {
        match self {
            Value::Int(value) => Ok(f64::from(*value)),
            Value::Double(value) => Ok(*value),
            _ => Err(Error::InvalidCast),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Object, Array and Function all carry an engine object.
    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_) | Value::Function(_))
    }

    pub(crate) fn string_handle(&self) -> Result<&Persistent<v8::String>> {
        match self {
            Value::String(handle) => Ok(handle),
            _ => Err(Error::InvalidCast),
        }
    }

    pub(crate) fn array_handle(&self) -> Result<&Persistent<v8::Array>> {
        match self {
            Value::Array(handle) => Ok(handle),
            _ => Err(Error::InvalidCast),
        }
    }

    pub(crate) fn function_handle(&self) -> Result<&Persistent<v8::Function>> {
        match self {
            Value::Function(handle) => Ok(handle),
            _ => Err(Error::InvalidCast),
        }
    }

    pub(crate) fn external_handle(&self) -> Result<&Persistent<v8::External>> {
        match self {
            Value::External(handle) => Ok(handle),
            _ => Err(Error::InvalidCast),
        }
    }

    /// The engine object behind an Object, Array or Function.
    pub(crate) fn object_local<'s>(
        &self,
        scope: &v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Object>> {
        match self {
            Value::Object(handle) => Ok(handle.local(scope)),
            Value::Array(handle) => Ok(handle.local(scope).into()),
            Value::Function(handle) => Ok(handle.local(scope).into()),
            _ => Err(Error::InvalidCast),
        }
    }

    /// Isolate owning the engine handle, `None` for immediate payloads.
    pub(crate) fn isolate_ptr(&self) -> Option<*mut v8::Isolate> {
        match self {
            Value::Int(_) | Value::Double(_) | Value::Bool(_) => None,
            Value::String(handle) => Some(handle.isolate_ptr()),
            Value::Object(handle) => Some(handle.isolate_ptr()),
            Value::Array(handle) => Some(handle.isolate_ptr()),
            Value::Function(handle) => Some(handle.isolate_ptr()),
            Value::External(handle) => Some(handle.isolate_ptr()),
        }
    }
}

/// Kind of an optional value, mapping `None` to [`ValueKind::Null`].
pub fn kind_of(value: Option<&Value>) -> ValueKind {
    value.map_or(ValueKind::Null, Value::kind)
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl PartialEq for Value {
    /// Immediate payloads compare by value. Handle-bearing values are only
    /// equal to themselves; use `Context::strict_equals` for engine identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => std::ptr::eq(self, other),
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(value) => write!(f, "Int({})", value),
            Value::Double(value) => write!(f, "Double({})", value),
            Value::Bool(value) => write!(f, "Bool({})", value),
            other => write!(f, "{:?}@{:p}", other.kind(), other as *const Value as *const c_void),
        }
    }
}
