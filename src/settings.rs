//! Engine settings
//!
//! Settings are resolved in this order, later sources winning:
//! 1. built-in defaults (`#[serde(default)]`)
//! 2. an optional TOML file (`neovm.toml`, or `NEOVM_CONFIG_PATH`)
//! 3. environment variables prefixed with `NEOVM__` (e.g. `NEOVM__LIMITS__MAX_STACK_SIZE`)
//!
//! A `.env` file is read first, if present.

use crate::errors::VmError;
use crate::logging::LogVerbosity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "neovm.toml";
pub const CONFIG_PATH_ENV: &str = "NEOVM_CONFIG_PATH";

/// Resource limits enforced by the reference interpreter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Items across the current frame's evaluation and alt stacks
    pub max_stack_size: usize,
    /// Bytes in a single ByteString
    pub max_item_size: usize,
    /// Frames on the invocation stack
    pub max_invocation_stack_size: usize,
    /// Elements in a single Array, Struct or Map
    pub max_array_size: usize,
    /// Bytes in an integer operand
    pub max_integer_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_stack_size: 2 * 1024,
            max_item_size: 1024 * 1024,
            max_invocation_stack_size: 1024,
            max_array_size: 1024,
            max_integer_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub limits: Limits,
    /// Gas available to stepping before any `execute` call sets a budget
    ///
    /// `None` means unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_gas: Option<u64>,
    /// Streams enabled on loggers created from these settings
    pub log_verbosity: LogVerbosity,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            limits: Limits::default(),
            default_gas: None,
            log_verbosity: LogVerbosity::empty(),
        }
    }
}

impl EngineSettings {
    /// Load from `.env`, the config file and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load from a specific file (which may be missing) and the environment
    pub fn load_from(path: &str) -> Result<Self> {
        // missing keys fall back to the serde defaults above
        let settings: EngineSettings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("NEOVM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", path))?
            .try_deserialize()
            .context("Failed to parse engine settings")?;

        settings.validate().context("Invalid engine settings")?;
        Ok(settings)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: EngineSettings = toml::from_str(source).context("Failed to parse settings TOML")?;
        settings.validate().context("Invalid engine settings")?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize settings")
    }

    /// Reject limits that would make every script fault
    pub fn validate(&self) -> Result<(), VmError> {
        let limits = &self.limits;
        let zero = [
            ("max_stack_size", limits.max_stack_size),
            ("max_item_size", limits.max_item_size),
            ("max_invocation_stack_size", limits.max_invocation_stack_size),
            ("max_array_size", limits.max_array_size),
            ("max_integer_size", limits.max_integer_size),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        if let Some((name, _)) = zero {
            return Err(VmError::InvalidConfiguration(format!("{} must be greater than zero", name)));
        }
        Ok(())
    }
}
