//! String operations.
//!
//! Strings cross the boundary as UTF-16 code units with an explicit length.
//! Nothing here assumes NUL termination on input; output is terminated only
//! on request.

use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::{Value, ValueRef};

impl Context {
    /// Engine string from UTF-16 code units (lone surrogates are kept).
    pub fn create_string(&self, utf16: &[u16]) -> Result<ValueRef> {
        self.enter(|scope| {
            let string = v8::String::new_from_two_byte(scope, utf16, v8::NewStringType::Normal)
                .ok_or(Error::StringTooLong)?;
            Ok(Arc::new(Value::String(self.persistent(scope, string))))
        })
    }

    pub fn create_string_from_str(&self, text: &str) -> Result<ValueRef> {
        self.enter(|scope| {
            let string = v8::String::new(scope, text).ok_or(Error::StringTooLong)?;
            Ok(Arc::new(Value::String(self.persistent(scope, string))))
        })
    }

    /// Length in UTF-16 code units.
    pub fn string_length(&self, string: &Value) -> Result<usize> {
        let string = self.owned(string.string_handle()?)?;
        Ok(self.enter(|scope| string.local(scope).length()))
    }

    /// Copy the string's code units into `out`, followed by a NUL unit if
    /// `null_terminate` is set. Copies as much as fits and returns the number
    /// of code units written, not counting the terminator.
    pub fn write_string(
        &self,
        string: &Value,
        out: &mut [u16],
        null_terminate: bool,
    ) -> Result<usize> {
        let string = self.owned(string.string_handle()?)?;

        Ok(self.enter(|scope| {
            let local = string.local(scope);
            let room = if null_terminate {
                out.len().saturating_sub(1)
            } else {
                out.len()
            };
            let count = local.length().min(room);

            local.write_v2(scope, 0, &mut out[..count], v8::WriteFlags::empty());

            if null_terminate && count < out.len() {
                out[count] = 0;
            }

            count
        }))
    }

    pub fn string_to_utf16(&self, string: &Value) -> Result<Vec<u16>> {
        let mut units = vec![0; self.string_length(string)?];
        self.write_string(string, &mut units, false)?;
        Ok(units)
    }

    /// Lossy conversion to a Rust string.
    pub fn to_rust_string(&self, string: &Value) -> Result<String> {
        let string = self.owned(string.string_handle()?)?;
        Ok(self.enter(|scope| string.local(scope).to_rust_string_lossy(scope)))
    }
}
