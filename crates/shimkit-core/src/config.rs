//! Shim configuration
//!
//! Loaded from a small JSON document; every field is optional:
//!
//! ```json
//! { "mode": "strict", "call_through": false }
//! ```

use serde::{Deserialize, Serialize};

use crate::resolver::MatchMode;
use crate::{Error, Result};

/// Behaviour switches shared by a shim and the children it creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShimConfig {
    /// Name matching precision
    pub mode: MatchMode,
    /// Coerce arguments positionally when a backing method's parameter
    /// types differ from the contract's (fuzzy mode only)
    pub call_through: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        ShimConfig {
            mode: MatchMode::Fuzzy,
            call_through: true,
        }
    }
}

impl From<MatchMode> for ShimConfig {
    fn from(mode: MatchMode) -> Self {
        ShimConfig {
            mode,
            ..ShimConfig::default()
        }
    }
}

impl ShimConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Whether a mismatched backing call may be retried with coerced arguments
    pub fn allows_call_through(&self) -> bool {
        self.call_through && self.mode.is_fuzzy()
    }
}
