//! Tests for GC plumbing against a bare isolate.

use super::*;
use std::cell::Cell;
use std::pin::pin;
use std::rc::Rc;
use std::sync::Arc;

fn new_isolate() -> v8::UnenteredIsolate {
    crate::platform::get_platform(&crate::BridgeConfig::default());
    v8::Isolate::new_unentered(v8::CreateParams::default())
}

#[test]
fn test_js_lock_held_while_alive() {
    let mut isolate = new_isolate();

    let isolate_ptr = {
        let mut locker = v8::Locker::new(&mut isolate);
        let isolate_ptr = &mut *locker as *mut v8::Isolate;
        assert!(!JsLock::is_held(isolate_ptr));

        let lock = JsLock::new(&mut *locker);
        assert_eq!(lock.isolate_ptr(), isolate_ptr);
        assert!(JsLock::is_held(isolate_ptr));
        isolate_ptr
    };

    assert!(!JsLock::is_held(isolate_ptr));
}

#[test]
fn test_js_lock_nesting_restores_previous() {
    let mut first = new_isolate();
    let mut second = new_isolate();

    let mut outer_locker = v8::Locker::new(&mut first);
    let outer = JsLock::new(&mut *outer_locker);

    {
        let mut inner_locker = v8::Locker::new(&mut second);
        let inner = JsLock::new(&mut *inner_locker);

        assert!(JsLock::is_held(inner.isolate_ptr()));
        assert!(!JsLock::is_held(outer.isolate_ptr()));
    }

    assert!(JsLock::is_held(outer.isolate_ptr()));
}

#[test]
fn test_persistent_dropped_without_lock_is_deferred() {
    let mut isolate = new_isolate();
    let queue = Arc::new(DeferredDestructionQueue::new());

    let persistent = {
        let mut locker = v8::Locker::new(&mut isolate);
        let isolate_ptr = &mut *locker as *mut v8::Isolate;
        let scope = pin!(v8::HandleScope::new(&mut *locker));
        let mut scope = scope.init();
        let context = v8::Context::new(&scope, Default::default());
        let scope = &mut v8::ContextScope::new(&mut scope, context);
        let object = v8::Object::new(scope);
        Persistent::new(v8::Global::new(scope, object), isolate_ptr, queue.clone())
    };

    drop(persistent);
    assert_eq!(queue.len(), 1);

    let mut locker = v8::Locker::new(&mut isolate);
    queue.destroy_pending();
    let _lock = JsLock::new(&mut *locker);
    assert!(queue.is_empty());
}

#[test]
fn test_persistent_dropped_under_lock_is_immediate() {
    let mut isolate = new_isolate();
    let queue = Arc::new(DeferredDestructionQueue::new());

    let mut locker = v8::Locker::new(&mut isolate);
    let isolate_ptr = &mut *locker as *mut v8::Isolate;
    let _lock = JsLock::new(&mut *locker);

    let persistent = {
        let scope = pin!(v8::HandleScope::new(unsafe { &mut *isolate_ptr }));
        let mut scope = scope.init();
        let context = v8::Context::new(&scope, Default::default());
        let scope = &mut v8::ContextScope::new(&mut scope, context);
        let object = v8::Object::new(scope);
        Persistent::new(v8::Global::new(scope, object), isolate_ptr, queue.clone())
    };

    drop(persistent);
    assert!(queue.is_empty());
}

#[test]
fn test_anchor_finalizer_runs_after_collection() {
    let mut isolate = new_isolate();
    let registry = AnchorRegistry::new();
    let collected = Rc::new(Cell::new(0));

    let mut locker = v8::Locker::new(&mut isolate);
    let isolate_ptr = &mut *locker as *mut v8::Isolate;

    {
        let scope = pin!(v8::HandleScope::new(unsafe { &mut *isolate_ptr }));
        let mut scope = scope.init();
        let context = v8::Context::new(&scope, Default::default());
        let scope = &mut v8::ContextScope::new(&mut scope, context);
        let external = v8::External::new(scope, std::ptr::null_mut());
        let collected = collected.clone();
        registry.anchor(scope, external, move || collected.set(collected.get() + 1));
    }

    assert_eq!(registry.len(), 1);
    assert_eq!(collected.get(), 0);

    locker.low_memory_notification();
    assert_eq!(collected.get(), 1);
    // Finalized but not yet swept
    assert_eq!(registry.len(), 1);

    registry.sweep();
    assert!(registry.is_empty());

    locker.low_memory_notification();
    assert_eq!(collected.get(), 1);
}

#[test]
fn test_cleared_anchor_never_finalizes() {
    let mut isolate = new_isolate();
    let registry = AnchorRegistry::new();
    let collected = Rc::new(Cell::new(false));

    let mut locker = v8::Locker::new(&mut isolate);
    let isolate_ptr = &mut *locker as *mut v8::Isolate;

    {
        let scope = pin!(v8::HandleScope::new(unsafe { &mut *isolate_ptr }));
        let mut scope = scope.init();
        let context = v8::Context::new(&scope, Default::default());
        let scope = &mut v8::ContextScope::new(&mut scope, context);
        let external = v8::External::new(scope, std::ptr::null_mut());
        let collected = collected.clone();
        registry.anchor(scope, external, move || collected.set(true));
    }

    registry.clear();
    locker.low_memory_notification();

    assert!(!collected.get());
    assert!(registry.is_empty());
}
