//! Weak anchors tying host-owned payloads to the engine's collector.
//!
//! Each anchor is a `v8::Weak` on an engine-side `v8::External`, keyed by a
//! registry-local id. When the collector proves the external unreachable the
//! anchor's finalizer runs; it records the id as finalized and the registry
//! drops the spent weak handle on the next sweep, which always happens under
//! the isolate lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Per-context registry of weak anchors.
#[derive(Default)]
pub struct AnchorRegistry {
    next_token: AtomicU64,
    live: Mutex<HashMap<u64, v8::Weak<v8::External>>>,
    finalized: Arc<Mutex<Vec<u64>>>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor `target` weakly. `on_collect` runs at most once, during a
    /// collection pause, after the engine proves `target` unreachable.
    ///
    /// If the registry is cleared first, `on_collect` is dropped without
    /// running, together with everything it owns.
    pub fn anchor<F>(
        &self,
        scope: &mut v8::PinScope<'_, '_>,
        target: v8::Local<'_, v8::External>,
        on_collect: F,
    ) where
        F: FnOnce() + 'static,
    {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        let finalized = Arc::clone(&self.finalized);

        let weak = v8::Weak::with_finalizer(
            scope,
            target,
            Box::new(move |_: &mut v8::Isolate| {
                finalized
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(id);
                on_collect();
            }),
        );

        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, weak);
    }

    /// Drop the weak handles of finalized anchors.
    ///
    /// Must be called under the isolate lock.
    pub fn sweep(&self) {
        let finalized = std::mem::take(
            &mut *self
                .finalized
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        if finalized.is_empty() {
            return;
        }

        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &finalized {
            live.remove(id);
        }

        log::trace!("Swept {} finalized anchors", finalized.len());
    }

    /// Drop every anchor without running its finalizer.
    ///
    /// Must be called under the isolate lock, before the isolate is disposed.
    pub fn clear(&self) {
        let live = std::mem::take(&mut *self.live.lock().unwrap_or_else(PoisonError::into_inner));
        let count = live.len();
        drop(live);

        self.finalized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        if count > 0 {
            log::debug!("Dropped {} unfinalized anchors", count);
        }
    }

    /// Number of anchors still registered (finalized ones count until swept).
    pub fn len(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
