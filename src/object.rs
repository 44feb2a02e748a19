//! Object operations.
//!
//! Arrays and functions are objects too; every operation here accepts them.

use std::ffi::c_void;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::exception::{Caught, from_just};
use crate::marshal;
use crate::value::{Value, ValueRef};

impl Context {
    /// `object[key]`. Getters run and may throw.
    pub fn get_property(&self, object: &Value, key: &Value) -> Result<Option<ValueRef>> {
        self.check_object(object)?;
        let key = self.owned(key.string_handle()?)?;

        self.try_catch(|tc| {
            let target = object.object_local(tc).map_err(|_| Caught)?;
            let key = key.local(tc);
            let value = from_just(tc, target.get(tc, key.into()))?;
            marshal::wrap(self, tc, value)
        })
    }

    /// `object[key] = value`. Setters run and may throw.
    pub fn set_property(&self, object: &Value, key: &Value, value: Option<&Value>) -> Result<()> {
        self.check_object(object)?;
        let key = self.owned(key.string_handle()?)?;

        self.try_catch(|tc| {
            let target = object.object_local(tc).map_err(|_| Caught)?;
            let key = key.local(tc);
            let value = marshal::unwrap(self, tc, value);
            from_just(tc, target.set(tc, key.into(), value))?;
            Ok(())
        })
    }

    /// Array of the object's own enumerable property names.
    pub fn own_property_names(&self, object: &Value) -> Result<ValueRef> {
        self.check_object(object)?;

        self.try_catch(|tc| {
            let target = object.object_local(tc).map_err(|_| Caught)?;
            let names = from_just(
                tc,
                target.get_own_property_names(tc, v8::GetPropertyNamesArgs::default()),
            )?;
            Ok(Arc::new(Value::Array(self.persistent(tc, names))))
        })
    }

    /// `key in object`. Proxy traps run and may throw.
    pub fn has_property(&self, object: &Value, key: &Value) -> Result<bool> {
        self.check_object(object)?;
        let key = self.owned(key.string_handle()?)?;

        self.try_catch(|tc| {
            let target = object.object_local(tc).map_err(|_| Caught)?;
            let key = key.local(tc);
            from_just(tc, target.has(tc, key.into()))
        })
    }

    /// Start of an ArrayBuffer's bytes.
    ///
    /// The pointer stays valid while the buffer is alive; it may be null for
    /// an empty buffer. Non-buffers are a [`Error::TypeError`].
    pub fn array_buffer_data(&self, object: &Value) -> Result<*mut c_void> {
        self.check_object(object)?;

        self.enter(|scope| {
            let target: v8::Local<v8::Value> = object.object_local(scope)?.into();
            let buffer: v8::Local<v8::ArrayBuffer> =
                target.try_into().map_err(|_| Error::TypeError)?;

            Ok(buffer
                .get_backing_store()
                .data()
                .map_or(std::ptr::null_mut(), |data| data.as_ptr()))
        })
    }

    /// Byte length of an ArrayBuffer.
    pub fn array_buffer_len(&self, object: &Value) -> Result<usize> {
        self.check_object(object)?;

        self.enter(|scope| {
            let target: v8::Local<v8::Value> = object.object_local(scope)?.into();
            let buffer: v8::Local<v8::ArrayBuffer> =
                target.try_into().map_err(|_| Error::TypeError)?;
            Ok(buffer.byte_length())
        })
    }

    /// Object-like values of this context pass, everything else is an
    /// invalid cast.
    fn check_object(&self, object: &Value) -> Result<()> {
        match object.isolate_ptr() {
            Some(isolate) if object.is_object_like() && isolate == self.isolate_ptr() => Ok(()),
            _ => Err(Error::InvalidCast),
        }
    }
}
