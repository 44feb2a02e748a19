//! Resource protection for contexts.
//!
//! - [`heap_limit`]: near-heap-limit callback that terminates runaway
//!   scripts instead of letting V8 abort the host process

mod heap_limit;

pub use heap_limit::{HeapLimitState, install_heap_limit_callback};
