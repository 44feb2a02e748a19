#![allow(dead_code)]

use std::ffi::c_void;
use std::sync::{Arc, Mutex};

use v8_bridge::{BridgeConfig, Context, FinalizerHooks, ScriptException, Value, ValueRef};

pub fn context() -> Arc<Context> {
    Context::new(FinalizerHooks::new())
}

pub fn eval(context: &Context, code: &str) -> Option<ValueRef> {
    match context.evaluate("test.js", code) {
        Ok(value) => value,
        Err(e) => panic!("evaluating {code:?} failed: {e}"),
    }
}

pub fn eval_error(context: &Context, file_name: &str, code: &str) -> Arc<ScriptException> {
    match context.evaluate(file_name, code) {
        Ok(value) => panic!("evaluating {code:?} succeeded with {value:?}"),
        Err(v8_bridge::Error::Script(exception)) => exception,
        Err(e) => panic!("evaluating {code:?} failed without an exception: {e}"),
    }
}

pub fn text(context: &Context, value: &Value) -> String {
    context.to_rust_string(value).expect("not a string")
}

/// Records every pointer a finalizer hook receives.
#[derive(Clone, Default)]
pub struct FinalizerLog(Arc<Mutex<Vec<usize>>>);

impl FinalizerLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(&self) -> impl Fn(*mut c_void) + Send + Sync + 'static {
        let log = Arc::clone(&self.0);
        move |data: *mut c_void| log.lock().unwrap().push(data as usize)
    }

    pub fn calls(&self) -> Vec<usize> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, data: *mut c_void) -> usize {
        self.calls().iter().filter(|&&p| p == data as usize).count()
    }
}

/// A context whose two finalizer hooks feed the returned logs.
pub fn logged_context() -> (Arc<Context>, FinalizerLog, FinalizerLog) {
    logged_context_with(&BridgeConfig::default())
}

pub fn logged_context_with(config: &BridgeConfig) -> (Arc<Context>, FinalizerLog, FinalizerLog) {
    let callbacks = FinalizerLog::new();
    let externals = FinalizerLog::new();
    let hooks = FinalizerHooks::new()
        .on_callback(callbacks.hook())
        .on_external(externals.hook());
    (Context::with_config(config, hooks), callbacks, externals)
}

/// Distinct fake host pointer; never dereferenced.
pub fn fake_ptr(n: usize) -> *mut c_void {
    (0x1000 + n * 16) as *mut c_void
}

pub fn utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}
