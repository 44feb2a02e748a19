//! Calling script functions.

use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::exception::from_just;
use crate::marshal;
use crate::value::{Value, ValueRef};

impl Context {
    /// `function.apply(this, args)`. A `None` receiver is `null`.
    pub fn call(
        &self,
        function: &Value,
        this: Option<&Value>,
        args: &[Option<ValueRef>],
    ) -> Result<Option<ValueRef>> {
        let function = self.owned(function.function_handle()?)?;

        if this.is_some_and(|this| !this.is_object_like()) {
            return Err(Error::InvalidCast);
        }

        self.try_catch(|tc| {
            let target = function.local(tc);
            let receiver = marshal::unwrap(self, tc, this);
            let args = marshal::unwrap_all(self, tc, args);
            let result = from_just(tc, target.call(tc, receiver, &args))?;
            marshal::wrap(self, tc, result)
        })
    }

    /// `new function(...args)`.
    pub fn construct(&self, function: &Value, args: &[Option<ValueRef>]) -> Result<ValueRef> {
        let function = self.owned(function.function_handle()?)?;

        self.try_catch(|tc| {
            let target = function.local(tc);
            let args = marshal::unwrap_all(self, tc, args);
            let object = from_just(tc, target.new_instance(tc, &args))?;
            Ok(Arc::new(Value::Object(self.persistent(tc, object))))
        })
    }
}
