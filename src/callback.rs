//! Native callbacks callable from script.
//!
//! A callback's closure is boxed, exposed to the engine as a `v8::External`
//! stored in the function's data slot, and weakly anchored. Once the
//! function (and with it the external) becomes unreachable the anchor's
//! finalizer reports the callback's `data` to the host's callback finalizer
//! and frees the closure.

use std::ffi::c_void;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;
use crate::exception::{CatchResult, from_just};
use crate::marshal;
use crate::value::{Value, ValueRef};

/// What a native callback hands back: a return value, or a value to throw.
pub type CallbackResult = std::result::Result<Option<ValueRef>, ValueRef>;

type BoxedCallback = Box<dyn Fn(&Context, *mut c_void, &[Option<ValueRef>]) -> CallbackResult>;

struct CallbackClosure {
    context: *const Context,
    data: *mut c_void,
    callback: BoxedCallback,
}

impl Context {
    /// Expose `callback` to script as a function.
    ///
    /// `data` is passed to every invocation and, once the function has been
    /// collected, to the context's callback finalizer.
    pub fn create_callback<F>(&self, data: *mut c_void, callback: F) -> Result<ValueRef>
    where
        F: Fn(&Context, *mut c_void, &[Option<ValueRef>]) -> CallbackResult + 'static,
    {
        let closure = Box::new(CallbackClosure {
            context: self as *const Context,
            data,
            callback: Box::new(callback),
        });

        self.try_catch(move |tc| {
            let closure_ptr = &*closure as *const CallbackClosure as *mut c_void;
            let external = v8::External::new(tc, closure_ptr);

            let function = from_just(
                tc,
                v8::Function::builder(callback_trampoline)
                    .data(external.into())
                    .build(tc),
            )?;

            let hooks = Arc::clone(self.hooks());
            self.anchors().anchor(tc, external, move || {
                hooks.finalize_callback(closure.data);
                drop(closure);
            });

            Ok(Arc::new(Value::Function(self.persistent(tc, function))))
        })
    }
}

fn throw_error(scope: &mut v8::PinScope, text: &str) {
    if let Some(message) = v8::String::new(scope, text) {
        let error = v8::Exception::error(scope, message);
        scope.throw_exception(error);
    }
}

fn callback_trampoline(
    scope: &mut v8::PinScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Ok(external) = v8::Local::<v8::External>::try_from(args.data()) else {
        log::error!("Native callback invoked without its closure");
        return;
    };

    // SAFETY: the closure is freed only by the anchor finalizer, which cannot
    // run while the function is still being called
    let closure = unsafe { &*(external.value() as *const CallbackClosure) };
    // SAFETY: callbacks only run inside an engine call made through the context
    let context = unsafe { &*closure.context };

    let values = {
        let tc = pin!(v8::TryCatch::new(scope));
        let mut tc = tc.init();

        let wrapped: CatchResult<Vec<Option<ValueRef>>> = (0..args.length())
            .map(|index| marshal::wrap(context, &mut tc, args.get(index)))
            .collect();

        match wrapped {
            Ok(values) if !tc.has_caught() => Some(values),
            _ => {
                if tc.has_caught() {
                    tc.rethrow();
                    return;
                }
                None
            }
        }
    };

    let Some(values) = values else {
        throw_error(scope, "failed to convert callback arguments");
        return;
    };

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        (closure.callback)(context, closure.data, &values)
    }));

    match outcome {
        Ok(Ok(result)) => {
            rv.set(marshal::unwrap(context, scope, result.as_deref()));
        }
        Ok(Err(error)) => {
            let error = marshal::unwrap(context, scope, Some(&error));
            scope.throw_exception(error);
        }
        Err(_) => {
            log::error!("Native callback panicked");
            throw_error(scope, "native callback panicked");
        }
    }

    // Arguments, result and error are released here, under the lock
}
