mod common;

use common::eval;
use v8_bridge::{BridgeConfig, Context, Error, FinalizerHooks};

fn limited_context(heap_max_mb: usize) -> std::sync::Arc<Context> {
    let config = BridgeConfig {
        heap_initial_mb: 1,
        heap_max_mb,
        ..BridgeConfig::default()
    };
    Context::with_config(&config, FinalizerHooks::new())
}

#[test]
fn test_runaway_allocation_is_terminated() {
    let ctx = limited_context(16);
    assert!(!ctx.memory_limit_hit());

    let result = ctx.evaluate(
        "hog.js",
        "const hog = []; while (true) { hog.push(new Array(10000).fill({ x: 1 })); }",
    );

    match result {
        Err(Error::Script(exception)) => {
            assert!(exception.is_termination(), "{exception:?}");
            assert_eq!(exception.message(), "execution terminated: heap limit reached");
            assert!(exception.exception().is_none());
        }
        other => panic!("expected termination, got {other:?}"),
    }

    assert!(ctx.memory_limit_hit());
}

#[test]
fn test_context_usable_after_termination() {
    let ctx = limited_context(16);

    let _ = ctx.evaluate(
        "hog.js",
        "globalThis.hog = []; while (true) { hog.push(new Array(10000).fill(0)); }",
    );
    assert!(ctx.memory_limit_hit());

    eval(&ctx, "globalThis.hog = null");
    ctx.collect_garbage();

    assert_eq!(eval(&ctx, "1+1").unwrap().as_int().unwrap(), 2);
}

#[test]
fn test_small_scripts_within_limit() {
    let ctx = limited_context(32);
    let result = eval(&ctx, "new Array(1000).fill(1).reduce((a, b) => a + b, 0)").unwrap();
    assert_eq!(result.as_int().unwrap(), 1000);
    assert!(!ctx.memory_limit_hit());
}

#[test]
fn test_unlimited_by_default() {
    let ctx = common::context();
    assert!(!ctx.memory_limit_hit());
}
