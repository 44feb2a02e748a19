mod common;

use std::sync::Arc;
use std::thread;

use common::{context, eval, text};
use v8_bridge::{Value, ValueKind, kind_of};

#[test]
fn test_evaluate_arithmetic() {
    let ctx = context();
    let result = eval(&ctx, "1+1").unwrap();
    assert_eq!(result.as_int().unwrap(), 2);
}

#[test]
fn test_evaluate_string_concat() {
    let ctx = context();
    let result = eval(&ctx, "'a'+'b'").unwrap();
    assert_eq!(result.kind(), ValueKind::String);
    assert_eq!(text(&ctx, &result), "ab");
}

#[test]
fn test_evaluate_object_literal_property() {
    let ctx = context();
    let result = eval(&ctx, "({x:1}).x").unwrap();
    assert_eq!(result.as_int().unwrap(), 1);
}

#[test]
fn test_evaluate_array_length() {
    let ctx = context();
    let result = eval(&ctx, "[1,2,3].length").unwrap();
    assert_eq!(result.as_int().unwrap(), 3);
}

#[test]
fn test_evaluate_undefined_and_null_are_absent() {
    let ctx = context();
    assert!(eval(&ctx, "undefined").is_none());
    assert!(eval(&ctx, "null").is_none());
    assert!(eval(&ctx, "var declared = 1").is_none());
}

#[test]
fn test_state_persists_between_evaluations() {
    let ctx = context();
    eval(&ctx, "globalThis.counter = 40");
    eval(&ctx, "counter += 2");
    let result = eval(&ctx, "counter").unwrap();
    assert_eq!(result.as_int().unwrap(), 42);
}

#[test]
fn test_global_object_sees_script_globals() {
    let ctx = context();
    eval(&ctx, "globalThis.answer = 'yes'");

    let global = ctx.global_object();
    assert_eq!(global.kind(), ValueKind::Object);

    let key = ctx.create_string_from_str("answer").unwrap();
    let answer = ctx.get_property(&global, &key).unwrap().unwrap();
    assert_eq!(text(&ctx, &answer), "yes");
}

#[test]
fn test_strict_equals() {
    let ctx = context();
    let object = eval(&ctx, "globalThis.shared = {}; shared").unwrap();
    let same = eval(&ctx, "shared").unwrap();
    let other = eval(&ctx, "({})").unwrap();

    assert!(ctx.strict_equals(Some(&object), Some(&same)));
    assert!(!ctx.strict_equals(Some(&object), Some(&other)));
    assert!(ctx.strict_equals(None, None));
    assert!(ctx.strict_equals(Some(&Value::Int(3)), Some(&Value::Double(3.0))));
    assert!(!ctx.strict_equals(Some(&Value::Int(0)), Some(&Value::Bool(false))));
}

#[test]
fn test_contexts_are_isolated() {
    let a = context();
    let b = context();

    eval(&a, "globalThis.marker = 1");
    let result = eval(&b, "typeof marker").unwrap();
    assert_eq!(text(&b, &result), "undefined");
}

#[test]
fn test_context_used_from_another_thread() {
    let ctx = context();
    eval(&ctx, "globalThis.hits = 0");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                for _ in 0..25 {
                    eval(&ctx, "hits++");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let hits = eval(&ctx, "hits").unwrap();
    assert_eq!(hits.as_int().unwrap(), 100);
}

#[test]
fn test_values_released_on_other_threads_are_deferred() {
    let ctx = context();
    let value = eval(&ctx, "({ big: new Array(100).fill(1) })").unwrap();

    thread::spawn(move || drop(value)).join().unwrap();
    assert_eq!(ctx.pending_destructions(), 1);

    // The next engine call drains the queue
    eval(&ctx, "0");
    assert_eq!(ctx.pending_destructions(), 0);
}

#[test]
fn test_kind_of_absent_is_null() {
    assert_eq!(kind_of(None), ValueKind::Null);
}
