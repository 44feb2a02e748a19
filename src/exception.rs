//! Structured script exceptions and their capture.
//!
//! Every fallible engine operation runs inside a `v8::TryCatch`. When it
//! fails, [`capture`] turns whatever the try/catch holds into one
//! [`ScriptException`] and resets the try/catch, so no operation ever
//! returns with a pending exception left on the isolate.
//!
//! Extracting the diagnostic may itself run script (a throwing `stack`
//! getter, a revoked proxy, an error whose `message` throws). All of that
//! happens inside one nested try/catch; anything that fails in there is cut
//! off and replaced by an empty field. Capture never calls itself, so a
//! hostile payload costs at most one extra level.

use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use crate::context::Context;
use crate::marshal;
use crate::value::{Value, ValueRef};

/// Marker for "the enclosing try/catch caught something (or an engine
/// result came back empty)". The diagnostic itself is built by [`capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Caught;

pub(crate) type CatchResult<T> = std::result::Result<T, Caught>;

/// Unwrap an engine "maybe", refusing to return a value while the try/catch
/// holds an exception.
#[inline]
pub(crate) fn from_just<T>(
    tc: &v8::PinnedRef<v8::TryCatch<v8::HandleScope>>,
    maybe: Option<T>,
) -> CatchResult<T> {
    match maybe {
        Some(value) if !tc.has_caught() => Ok(value),
        _ => Err(Caught),
    }
}

pub(crate) const TERMINATED: &str = "execution terminated";
pub(crate) const TERMINATED_HEAP_LIMIT: &str = "execution terminated: heap limit reached";

/// Uncaught script exception with its diagnostic fields.
///
/// String fields exist twice: as engine strings, which the flat surface
/// hands out as borrowed `JSString*`, and as Rust strings for display.
pub struct ScriptException {
    exception: Option<ValueRef>,
    message: Field,
    file_name: Field,
    stack_trace: Field,
    source_line: Field,
    line_number: i32,
}

struct Field {
    value: ValueRef,
    text: String,
}

impl ScriptException {
    /// The thrown value, if it could be wrapped.
    pub fn exception(&self) -> Option<&ValueRef> {
        self.exception.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message.text
    }

    pub fn file_name(&self) -> &str {
        &self.file_name.text
    }

    /// Line of the throw site, `-1` when the engine reported no location.
    pub fn line_number(&self) -> i32 {
        self.line_number
    }

    pub fn stack_trace(&self) -> &str {
        &self.stack_trace.text
    }

    pub fn source_line(&self) -> &str {
        &self.source_line.text
    }

    pub fn message_value(&self) -> &ValueRef {
        &self.message.value
    }

    pub fn file_name_value(&self) -> &ValueRef {
        &self.file_name.value
    }

    pub fn stack_trace_value(&self) -> &ValueRef {
        &self.stack_trace.value
    }

    pub fn source_line_value(&self) -> &ValueRef {
        &self.source_line.value
    }

    /// Whether the operation was terminated rather than thrown out of.
    pub fn is_termination(&self) -> bool {
        self.exception.is_none() && self.message.text.starts_with(TERMINATED)
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file_name.text.is_empty() {
            write!(f, "{}", self.message.text)
        } else {
            write!(
                f,
                "{}:{}: {}",
                self.file_name.text, self.line_number, self.message.text
            )
        }
    }
}

impl fmt::Debug for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptException")
            .field("message", &self.message.text)
            .field("file_name", &self.file_name.text)
            .field("line_number", &self.line_number)
            .field("source_line", &self.source_line.text)
            .field("exception", &self.exception)
            .finish()
    }
}

fn field(
    context: &Context,
    scope: &v8::PinScope<'_, '_>,
    string: v8::Local<'_, v8::String>,
) -> Field {
    Field {
        text: string.to_rust_string_lossy(scope),
        value: Arc::new(Value::String(context.persistent(scope, string))),
    }
}

fn empty_field(context: &Context, scope: &v8::PinScope<'_, '_>) -> Field {
    field(context, scope, v8::String::empty(scope))
}

/// Build the diagnostic for whatever `tc` caught and consume it.
pub(crate) fn capture(
    context: &Context,
    tc: &mut v8::PinnedRef<v8::TryCatch<v8::HandleScope>>,
) -> Arc<ScriptException> {
    if tc.has_terminated() {
        return terminated(context, tc);
    }

    let message = tc.message();
    let mut line_number = -1;
    let mut source_line = None;
    let mut engine_text = None;
    let mut resource_name = None;

    if let Some(message) = message {
        let text = message.get(tc).to_rust_string_lossy(tc);
        engine_text = Some(text.strip_prefix("Uncaught ").map(str::to_string).unwrap_or(text));
        source_line = message.get_source_line(tc).map(|line| field(context, tc, line));
        line_number = message.get_line_number(tc).map_or(-1, |line| line as i32);
        resource_name = message
            .get_script_resource_name(tc)
            .map(|name| v8::Global::new(tc, name));
    }

    let thrown = tc.exception().map(|exception| v8::Global::new(tc, exception));

    let (exception, error_message, file_name, stack_trace) = {
        let inner = pin!(v8::TryCatch::new(&mut **tc));
        let mut inner = inner.init();

        let thrown = thrown.map(|global| v8::Local::new(&inner, &global));

        let exception = match thrown {
            Some(thrown) => match marshal::wrap(context, &mut inner, thrown) {
                Ok(value) => value,
                Err(Caught) => {
                    cut_off(&mut inner, "exception value");
                    None
                }
            },
            None => None,
        };

        let error_message = thrown
            .filter(|value| value.is_native_error())
            .and_then(|error| own_string(context, &mut inner, error, "message"));

        let file_name = resource_name.and_then(|name| {
            let name = v8::Local::new(&inner, &name);
            guarded_string(context, &mut inner, name, "file name")
        });

        let stack_trace = thrown.and_then(|value| own_string(context, &mut inner, value, "stack"));

        (exception, error_message, file_name, stack_trace)
    };

    tc.reset();

    let message = match (error_message, engine_text) {
        (Some(message), _) => message,
        (None, Some(text)) => match v8::String::new(tc, &text) {
            Some(string) => field(context, tc, string),
            None => empty_field(context, tc),
        },
        (None, None) => empty_field(context, tc),
    };

    let exception = ScriptException {
        exception,
        message,
        file_name: file_name.unwrap_or_else(|| empty_field(context, tc)),
        stack_trace: stack_trace.unwrap_or_else(|| empty_field(context, tc)),
        source_line: source_line.unwrap_or_else(|| empty_field(context, tc)),
        line_number,
    };

    tracing::debug!("Captured script exception: {}", exception);
    Arc::new(exception)
}

fn terminated(
    context: &Context,
    tc: &mut v8::PinnedRef<v8::TryCatch<v8::HandleScope>>,
) -> Arc<ScriptException> {
    let text = if context.memory_limit_hit() {
        TERMINATED_HEAP_LIMIT
    } else {
        TERMINATED
    };

    tracing::warn!("Script {}", text);

    // Nested calls leave the termination in place so the outer frames unwind too
    if context.is_outermost_call() {
        context.cancel_termination();
    }

    tc.reset();

    let message = match v8::String::new(tc, text) {
        Some(string) => field(context, tc, string),
        None => empty_field(context, tc),
    };

    Arc::new(ScriptException {
        exception: None,
        message,
        file_name: empty_field(context, tc),
        stack_trace: empty_field(context, tc),
        source_line: empty_field(context, tc),
        line_number: -1,
    })
}

fn cut_off(inner: &mut v8::PinnedRef<v8::TryCatch<v8::HandleScope>>, what: &str) {
    tracing::warn!("Exception thrown while extracting {}; field cut off", what);
    inner.reset();
}

fn guarded_string(
    context: &Context,
    inner: &mut v8::PinnedRef<v8::TryCatch<v8::HandleScope>>,
    value: v8::Local<'_, v8::Value>,
    what: &str,
) -> Option<Field> {
    match from_just(inner, value.to_string(inner)) {
        Ok(string) => Some(field(context, inner, string)),
        Err(Caught) => {
            cut_off(inner, what);
            None
        }
    }
}

/// String value of `value[key]`, if `value` is an object that has `key`.
fn own_string(
    context: &Context,
    inner: &mut v8::PinnedRef<v8::TryCatch<v8::HandleScope>>,
    value: v8::Local<'_, v8::Value>,
    key: &str,
) -> Option<Field> {
    if !value.is_object() {
        return None;
    }

    let object = value.to_object(inner)?;
    let key_string = v8::String::new(inner, key)?;

    match from_just(inner, object.has(inner, key_string.into())) {
        Ok(true) => {}
        Ok(false) => return None,
        Err(Caught) => {
            cut_off(inner, key);
            return None;
        }
    }

    match from_just(inner, object.get(inner, key_string.into())) {
        Ok(property) => guarded_string(context, inner, property, key),
        Err(Caught) => {
            cut_off(inner, key);
            None
        }
    }
}
