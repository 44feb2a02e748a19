mod common;

use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{context, eval, eval_error, fake_ptr, logged_context, text};
use v8_bridge::{Context, Value, ValueKind};

fn install(ctx: &Context, name: &str, function: &Value) {
    let global = ctx.global_object();
    let key = ctx.create_string_from_str(name).unwrap();
    ctx.set_property(&global, &key, Some(function)).unwrap();
}

#[test]
fn test_callback_echoes_arg_count() {
    let ctx = context();
    let echo = ctx
        .create_callback(std::ptr::null_mut(), |_, _, args| {
            Ok(Some(Value::int(args.len() as i32)))
        })
        .unwrap();
    assert_eq!(echo.kind(), ValueKind::Function);

    install(&ctx, "argCount", &echo);
    let result = eval(&ctx, "argCount(1, 'two', {})").unwrap();
    assert_eq!(result.as_int().unwrap(), 3);

    let none = eval(&ctx, "argCount()").unwrap();
    assert_eq!(none.as_int().unwrap(), 0);
}

#[test]
fn test_callback_receives_wrapped_arguments_in_order() {
    let ctx = context();
    let describe = ctx
        .create_callback(std::ptr::null_mut(), |ctx, _, args| {
            let kinds: Vec<String> = args
                .iter()
                .map(|arg| format!("{:?}", v8_bridge::kind_of(arg.as_deref())))
                .collect();
            Ok(Some(ctx.create_string_from_str(&kinds.join(",")).unwrap()))
        })
        .unwrap();

    install(&ctx, "describe", &describe);
    let result = eval(&ctx, "describe(1, 1.5, 'x', true, null, undefined, [], {}, describe)").unwrap();
    assert_eq!(
        text(&ctx, &result),
        "Int,Double,String,Bool,Null,Null,Array,Object,Function"
    );
}

#[test]
fn test_callback_data_is_passed_through() {
    let ctx = context();
    let data = fake_ptr(7);
    let callback = ctx
        .create_callback(data, |_, data, _| Ok(Some(Value::double(data as usize as f64))))
        .unwrap();

    let result = ctx.call(&callback, None, &[]).unwrap().unwrap();
    assert_eq!(result.as_number().unwrap(), data as usize as f64);
}

#[test]
fn test_callback_error_is_thrown_into_script() {
    let ctx = context();
    let fail = ctx
        .create_callback(std::ptr::null_mut(), |ctx, _, _| {
            Err(ctx.create_string_from_str("native failure").unwrap())
        })
        .unwrap();

    install(&ctx, "fail", &fail);

    let caught = eval(&ctx, "try { fail(); 'no' } catch (e) { 'caught ' + e }").unwrap();
    assert_eq!(text(&ctx, &caught), "caught native failure");

    let uncaught = eval_error(&ctx, "fail.js", "fail()");
    assert_eq!(uncaught.message(), "native failure");
    assert_eq!(text(&ctx, uncaught.exception().unwrap()), "native failure");
}

#[test]
fn test_callback_error_object_keeps_identity() {
    let ctx = context();
    eval(&ctx, "globalThis.sentinel = new RangeError('sentinel')");

    let fail = ctx
        .create_callback(std::ptr::null_mut(), |ctx, _, _| {
            let global = ctx.global_object();
            let key = ctx.create_string_from_str("sentinel").unwrap();
            Err(ctx.get_property(&global, &key).unwrap().unwrap())
        })
        .unwrap();

    install(&ctx, "fail", &fail);
    let same = eval(&ctx, "try { fail() } catch (e) { e === sentinel }").unwrap();
    assert!(same.as_bool().unwrap());
}

#[test]
fn test_callback_panic_becomes_script_error() {
    let ctx = context();
    let explode = ctx
        .create_callback(std::ptr::null_mut(), |_, _, _| panic!("host bug"))
        .unwrap();

    install(&ctx, "explode", &explode);
    let result = eval(&ctx, "try { explode() } catch (e) { e instanceof Error && e.message }").unwrap();
    assert_eq!(text(&ctx, &result), "native callback panicked");

    // The context survives the panic
    assert_eq!(eval(&ctx, "1+1").unwrap().as_int().unwrap(), 2);
}

#[test]
fn test_callback_reenters_context() {
    let ctx = context();
    let nested = ctx
        .create_callback(std::ptr::null_mut(), |ctx, _, args| {
            let base = args[0].as_ref().unwrap().as_int().unwrap();
            let inner = ctx.evaluate("inner.js", "20 + 1").unwrap().unwrap();
            Ok(Some(Value::int(base * inner.as_int().unwrap())))
        })
        .unwrap();

    install(&ctx, "nested", &nested);
    let result = eval(&ctx, "nested(2)").unwrap();
    assert_eq!(result.as_int().unwrap(), 42);
}

#[test]
fn test_nested_exception_does_not_escape_callback() {
    let ctx = context();
    let swallow = ctx
        .create_callback(std::ptr::null_mut(), |ctx, _, _| {
            let error = ctx.evaluate("inner.js", "throw new Error('inner')").unwrap_err();
            Ok(Some(ctx.create_string_from_str(&error.to_string()).unwrap()))
        })
        .unwrap();

    install(&ctx, "swallow", &swallow);
    let result = eval(&ctx, "swallow()").unwrap();
    assert_eq!(text(&ctx, &result), "script exception: inner.js:1: inner");
}

#[test]
fn test_callback_as_constructor_and_method() {
    let ctx = context();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let tick = ctx
        .create_callback(std::ptr::null_mut(), move |_, _, _| {
            Ok(Some(Value::int(counter.fetch_add(1, Ordering::SeqCst) as i32 + 1)))
        })
        .unwrap();

    install(&ctx, "tick", &tick);
    eval(&ctx, "const o = { tick }; o.tick(); [1, 2, 3].forEach(tick);");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_callback_finalizer_after_collection() {
    let (ctx, callbacks, _externals) = logged_context();
    let data = fake_ptr(3);

    let function = ctx
        .create_callback(data, |_, _, _| Ok(None))
        .unwrap();
    assert_eq!(ctx.live_anchors(), 1);

    ctx.collect_garbage();
    assert_eq!(callbacks.count(data), 0);

    ctx.release(function);
    ctx.collect_garbage();
    assert_eq!(callbacks.count(data), 1);
    assert_eq!(ctx.live_anchors(), 0);
}

#[test]
fn test_callback_closure_dropped_with_anchor() {
    struct Flag(Arc<AtomicUsize>);
    impl Drop for Flag {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let dropped = Arc::new(AtomicUsize::new(0));
    let ctx = context();
    let flag = Flag(Arc::clone(&dropped));

    let function = ctx
        .create_callback(std::ptr::null_mut::<c_void>(), move |_, _, _| {
            flag.0.load(Ordering::SeqCst);
            Ok(None)
        })
        .unwrap();

    ctx.release(function);
    ctx.collect_garbage();
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}
