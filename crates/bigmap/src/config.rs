//! Resolver settings.
//!
//! ```toml
//! max_chain_length = 64
//! strict_actions = false
//! rpc_fallback = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Longest temporary-pointer chain followed before giving up.
    pub max_chain_length: usize,
    /// Abort on unknown mutation-log actions instead of skipping them.
    pub strict_actions: bool,
    /// Let origination parsing re-fetch storage from the node when the
    /// script storage holds no big-map pointers.
    pub rpc_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            max_chain_length: 64,
            strict_actions: false,
            rpc_fallback: true,
        }
    }
}

impl ResolverConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ResolveError> {
        toml::from_str(content).map_err(|e| ResolveError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ResolveError::Config(format!("could not read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}
