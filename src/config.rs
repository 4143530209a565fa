//! Engine configuration
//!
//! Read from the environment (`EngineConfig::from_env`) or embedded in a
//! scenario file under `config:`.
//!
//! | Env var | Field | Effect |
//! |---|---|---|
//! | `LAZYBIND_DISABLE` | `disabled` | every guard binds eagerly |
//! | `LAZYBIND_NO_WARN` | `no_warn` | silence the disabled-mode warning |

use serde::{Deserialize, Serialize};

use crate::value::Value;

pub const DISABLE_ENV: &str = "LAZYBIND_DISABLE";
pub const NO_WARN_ENV: &str = "LAZYBIND_NO_WARN";

/// Engine-wide settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Open every guard in eager mode
    pub disabled: bool,
    /// Do not warn when `disabled` is set
    pub no_warn: bool,
    /// Fallback for type-only guards that configure none
    pub default_fallback: Option<Value>,
}

impl EngineConfig {
    /// Read flags from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read flags through `lookup`; any non-empty value enables a flag
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).map(|v| !v.is_empty()).unwrap_or(false);
        Self {
            disabled: flag(DISABLE_ENV),
            no_warn: flag(NO_WARN_ENV),
            default_fallback: None,
        }
    }

    pub fn with_default_fallback(mut self, fallback: Value) -> Self {
        self.default_fallback = Some(fallback);
        self
    }
}
