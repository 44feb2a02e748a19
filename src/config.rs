//! Bridge configuration.
//!
//! The flat surface has no configuration parameter, so hosts configure the
//! bridge through the environment. Rust hosts can build a [`BridgeConfig`]
//! directly and pass it to [`Context::with_config`](crate::Context::with_config).

use serde::Deserialize;
use std::sync::OnceLock;

/// JSON document applied before the individual variables below.
pub const ENV_CONFIG: &str = "V8_BRIDGE_CONFIG";
pub const ENV_HEAP_INITIAL_MB: &str = "V8_BRIDGE_HEAP_INITIAL_MB";
pub const ENV_HEAP_MAX_MB: &str = "V8_BRIDGE_HEAP_MAX_MB";
/// Whitespace separated V8 flags, e.g. `--expose-gc --no-opt`.
pub const ENV_FLAGS: &str = "V8_BRIDGE_FLAGS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bridge configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("initial heap ({initial} MB) exceeds maximum heap ({max} MB)")]
    HeapBounds { initial: usize, max: usize },
}

/// Engine settings for contexts created by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Initial heap size in MB (0 = engine default)
    pub heap_initial_mb: usize,

    /// Maximum heap size in MB (0 = engine default, no near-limit callback)
    pub heap_max_mb: usize,

    /// Flags passed to V8 before the platform is initialized.
    /// Only the first initialization in a process honours them.
    pub v8_flags: Vec<String>,
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the configuration from the process environment.
    ///
    /// Malformed values are logged and ignored rather than failing context
    /// creation, since the flat surface has no way to report them.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match lookup(ENV_CONFIG) {
            Some(json) => Self::from_json(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring {}: {}", ENV_CONFIG, e);
                Self::default()
            }),
            None => Self::default(),
        };

        if let Some(mb) = parse_mb(&lookup, ENV_HEAP_INITIAL_MB) {
            config.heap_initial_mb = mb;
        }

        if let Some(mb) = parse_mb(&lookup, ENV_HEAP_MAX_MB) {
            config.heap_max_mb = mb;
        }

        if let Some(flags) = lookup(ENV_FLAGS) {
            config
                .v8_flags
                .extend(flags.split_whitespace().map(str::to_string));
        }

        if let Err(e) = config.validate() {
            log::warn!("{} - using engine default heap limits", e);
            config.heap_initial_mb = 0;
            config.heap_max_mb = 0;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heap_max_mb > 0 && self.heap_initial_mb > self.heap_max_mb {
            return Err(ConfigError::HeapBounds {
                initial: self.heap_initial_mb,
                max: self.heap_max_mb,
            });
        }

        Ok(())
    }

    /// Heap limits in bytes, if a maximum is configured.
    pub fn heap_limits(&self) -> Option<(usize, usize)> {
        if self.heap_max_mb == 0 {
            return None;
        }

        Some((self.heap_initial_mb * 1024 * 1024, self.heap_max_mb * 1024 * 1024))
    }
}

fn parse_mb(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;

    match raw.trim().parse() {
        Ok(mb) => Some(mb),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a number of megabytes", key, raw);
            None
        }
    }
}

/// Configuration used by the flat surface, read from the environment once.
pub fn process_config() -> &'static BridgeConfig {
    static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();
    CONFIG.get_or_init(BridgeConfig::from_env)
}
