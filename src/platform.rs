//! Global V8 platform initialization.
//!
//! V8 can only be initialized once per process. Every context goes through
//! [`get_platform`], so the first caller wins and the rest share its platform.

use std::sync::OnceLock;
use v8;

use crate::config::BridgeConfig;

static PLATFORM: OnceLock<v8::SharedRef<v8::Platform>> = OnceLock::new();

/// Get the global V8 platform, initializing it if necessary.
///
/// Safe to call from multiple threads. Flags from `config` are applied only
/// by the call that actually performs the initialization.
pub fn get_platform(config: &BridgeConfig) -> &'static v8::SharedRef<v8::Platform> {
    PLATFORM.get_or_init(|| {
        // On macOS, use single-threaded GC to avoid code collection issues
        #[cfg(target_os = "macos")]
        v8::V8::set_flags_from_string("--single-threaded-gc");

        for flag in &config.v8_flags {
            log::debug!("Setting V8 flag {}", flag);
            v8::V8::set_flags_from_string(flag);
        }

        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();

        log::info!("Initialized V8 {}", v8::V8::get_version());
        platform
    })
}

/// Run the foreground tasks the engine posted for `isolate`.
///
/// Collections the engine starts on its own post their second-pass weak
/// callbacks here instead of running them, so host finalizers only fire once
/// the tasks are pumped. The isolate must be locked by the caller.
pub(crate) fn pump_tasks(isolate: &v8::Isolate) {
    let Some(platform) = PLATFORM.get() else {
        return;
    };

    let mut ran = 0usize;
    while v8::Platform::pump_message_loop(platform, isolate, false) {
        ran += 1;
    }

    if ran > 0 {
        log::trace!("Ran {} pending engine tasks", ran);
    }
}

/// Whether the process-wide engine initialization has already happened.
pub fn is_initialized() -> bool {
    PLATFORM.get().is_some()
}
