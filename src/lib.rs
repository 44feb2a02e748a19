//! Embedding bridge over V8 with a flat C ABI.
//!
//! The safe Rust API ([`Context`], [`Value`], [`ScriptException`]) does the
//! work; [`ffi`] exposes it to native hosts as reference-counted opaque
//! handles.

pub mod callback;
pub mod config;
pub mod context;
pub mod error;
pub mod exception;
pub mod external;
pub mod ffi;
pub mod finalizer;
pub mod gc;
mod marshal;
pub mod platform;
pub mod security;
pub mod value;

mod array;
mod function;
mod object;
mod string;

// Core API
pub use callback::CallbackResult;
pub use config::{BridgeConfig, ConfigError};
pub use context::Context;
pub use error::{Error, Result, RuntimeError};
pub use exception::ScriptException;
pub use finalizer::{ExternFinalizer, Finalize, FinalizerHooks, ForeignFinalizer};
pub use value::{Value, ValueKind, ValueRef, kind_of};
