//! External pointers and host-memory ArrayBuffers.

use std::ffi::c_void;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;
use crate::value::{Value, ValueRef};

impl Context {
    /// Expose a raw host pointer to script.
    ///
    /// The context's external finalizer receives `data` exactly once, after
    /// the host has released the value and the collector has found the
    /// external unreachable. It never runs if the context is dropped first.
    pub fn create_external(&self, data: *mut c_void) -> ValueRef {
        self.enter(|scope| {
            let external = v8::External::new(scope, data);

            let hooks = Arc::clone(self.hooks());
            self.anchors()
                .anchor(scope, external, move || hooks.finalize_external(data));

            Arc::new(Value::External(self.persistent(scope, external)))
        })
    }

    pub fn external_value(&self, external: &Value) -> Result<*mut c_void> {
        let external = self.owned(external.external_handle()?)?;
        Ok(self.enter(|scope| external.local(scope).value()))
    }

    /// ArrayBuffer over `byte_length` bytes of host memory.
    ///
    /// The engine never frees the memory. With the `sandbox` feature the
    /// bytes are copied into engine memory instead, so later host writes are
    /// not visible to script.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads and writes of `byte_length` bytes for
    /// as long as script can reach the buffer.
    pub unsafe fn create_array_buffer(&self, data: *mut c_void, byte_length: usize) -> ValueRef {
        self.enter(|scope| {
            let buffer = if data.is_null() || byte_length == 0 {
                v8::ArrayBuffer::new(scope, 0)
            } else {
                // SAFETY: forwarded from this function's contract
                unsafe { host_array_buffer(scope, data, byte_length) }
            };

            let object: v8::Local<v8::Object> = buffer.into();
            Arc::new(Value::Object(self.persistent(scope, object)))
        })
    }
}

#[cfg(not(feature = "sandbox"))]
unsafe fn host_array_buffer<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    data: *mut c_void,
    byte_length: usize,
) -> v8::Local<'s, v8::ArrayBuffer> {
    unsafe extern "C" fn keep_host_memory(_data: *mut c_void, _len: usize, _deleter_data: *mut c_void) {}

    // SAFETY: caller guarantees `data` outlives the buffer; the deleter never frees it
    let backing_store = unsafe {
        v8::ArrayBuffer::new_backing_store_from_ptr(
            data,
            byte_length,
            keep_host_memory,
            std::ptr::null_mut(),
        )
    }
    .make_shared();

    v8::ArrayBuffer::with_backing_store(scope, &backing_store)
}

#[cfg(feature = "sandbox")]
unsafe fn host_array_buffer<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    data: *mut c_void,
    byte_length: usize,
) -> v8::Local<'s, v8::ArrayBuffer> {
    // In sandbox mode V8 must own the memory, so the bytes are copied
    let buffer = v8::ArrayBuffer::new(scope, byte_length);
    let backing_store = buffer.get_backing_store();

    if let Some(dest) = backing_store.data() {
        // SAFETY: freshly allocated buffer of byte_length bytes; caller
        // guarantees `data` is readable for byte_length bytes
        unsafe {
            std::ptr::copy_nonoverlapping(data as *const u8, dest.as_ptr() as *mut u8, byte_length);
        }
    }

    buffer
}
