mod common;

use std::sync::Arc;
use std::thread;

use common::{eval, fake_ptr, logged_context, logged_context_with};
use v8_bridge::{BridgeConfig, ValueKind};

#[test]
fn test_external_finalizer_exactly_once() {
    let (ctx, _callbacks, externals) = logged_context();
    let data = fake_ptr(1);

    let external = ctx.create_external(data);
    assert_eq!(external.kind(), ValueKind::External);
    assert_eq!(ctx.external_value(&external).unwrap(), data);

    // Never before collection
    assert_eq!(externals.count(data), 0);
    ctx.collect_garbage();
    assert_eq!(externals.count(data), 0);

    ctx.release(external);
    assert_eq!(externals.count(data), 0);

    ctx.collect_garbage();
    assert_eq!(externals.calls(), vec![data as usize]);

    // And never twice
    ctx.collect_garbage();
    ctx.collect_garbage();
    assert_eq!(externals.count(data), 1);
}

#[test]
fn test_each_external_finalized_with_its_own_pointer() {
    let (ctx, _callbacks, externals) = logged_context();

    let values: Vec<_> = (0..16).map(|n| ctx.create_external(fake_ptr(n))).collect();
    assert_eq!(ctx.live_anchors(), 16);

    ctx.release(values);
    ctx.collect_garbage();

    let mut calls = externals.calls();
    calls.sort_unstable();
    let expected: Vec<usize> = (0..16).map(|n| fake_ptr(n) as usize).collect();
    assert_eq!(calls, expected);
    assert_eq!(ctx.live_anchors(), 0);
}

#[test]
fn test_concurrent_releases_finalize_once() {
    let (ctx, _callbacks, externals) = logged_context();
    let data = fake_ptr(9);
    let external = ctx.create_external(data);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let external = Arc::clone(&external);
            thread::spawn(move || ctx.release(external))
        })
        .collect();
    drop(external);

    for handle in handles {
        handle.join().unwrap();
    }

    ctx.collect_garbage();
    ctx.collect_garbage();
    assert_eq!(externals.count(data), 1);
}

#[test]
fn test_external_reachable_from_script_survives() {
    let (ctx, _callbacks, externals) = logged_context();
    let data = fake_ptr(4);

    let external = ctx.create_external(data);
    let global = ctx.global_object();
    let key = ctx.create_string_from_str("held").unwrap();
    ctx.set_property(&global, &key, Some(&external)).unwrap();
    ctx.release(external);

    ctx.collect_garbage();
    assert_eq!(externals.count(data), 0);

    // Script sees it as an opaque value and hands it back intact
    let back = eval(&ctx, "held").unwrap();
    assert_eq!(ctx.external_value(&back).unwrap(), data);
    ctx.release(back);

    eval(&ctx, "delete globalThis.held");
    ctx.collect_garbage();
    assert_eq!(externals.count(data), 1);
}

#[test]
fn test_no_finalizer_after_context_drop() {
    let (ctx, callbacks, externals) = logged_context();
    let external = ctx.create_external(fake_ptr(5));
    let callback = ctx.create_callback(fake_ptr(6), |_, _, _| Ok(None)).unwrap();

    ctx.release((external, callback));
    drop(ctx);

    assert!(externals.calls().is_empty());
    assert!(callbacks.calls().is_empty());
}

#[test]
fn test_engine_initiated_collections_run_finalizers() {
    let config = BridgeConfig {
        heap_initial_mb: 1,
        heap_max_mb: 256,
        ..BridgeConfig::default()
    };
    let (ctx, callbacks, externals) = logged_context_with(&config);

    const N: usize = 64;
    let values: Vec<_> = (0..N).map(|n| ctx.create_external(fake_ptr(n))).collect();
    let callback = ctx.create_callback(fake_ptr(N), |_, _, _| Ok(None)).unwrap();
    ctx.release((values, callback));

    // Allocation pressure only, collect_garbage is never called
    for _ in 0..500 {
        if externals.calls().len() == N && callbacks.calls().len() == 1 {
            break;
        }
        eval(
            &ctx,
            "globalThis.churn = Array.from({ length: 50000 }, (_, i) => ({ i, s: 'item' + i })); churn.length",
        );
    }

    let mut calls = externals.calls();
    calls.sort_unstable();
    let expected: Vec<usize> = (0..N).map(|n| fake_ptr(n) as usize).collect();
    assert_eq!(calls, expected);
    assert_eq!(callbacks.calls(), vec![fake_ptr(N) as usize]);
    assert_eq!(ctx.live_anchors(), 0);
}
