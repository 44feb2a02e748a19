//! Ownership plumbing between host reference counts and the engine's GC.
//!
//! Two ownership domains meet here. The host holds strong, explicitly
//! counted references to bridge values; the engine holds weak anchors whose
//! finalizers fire when its collector says so. Neither domain owns the other.
//!
//! ## Layers
//!
//! ```text
//! JsLock                     thread-local "this thread holds isolate X"
//!   │                        set right after v8::Locker, nests
//!   ▼
//! Persistent<T>              strong host-side handle, one v8::Global
//!   │   drop with lock    →  reset now
//!   │   drop without lock →  parked
//!   ▼
//! DeferredDestructionQueue   parked Globals, reset on next lock
//!
//! AnchorRegistry             weak engine-side anchors, v8::Weak<External>
//!                            host never sees the weak handle,
//!                            spent anchors swept on next lock
//! ```

mod anchors;
mod deferred_destruction;
mod js_lock;
mod persistent;

pub use anchors::AnchorRegistry;
pub use deferred_destruction::DeferredDestructionQueue;
pub use js_lock::JsLock;
pub use persistent::Persistent;

#[cfg(test)]
mod tests;
