//! Build settings.
//!
//! Hosts load these from their own configuration files; the registry only
//! needs them to be deserializable.
//!
//! ```
//! use sijill_registry::settings::{AmbiguityStrategy, BuildSettings};
//!
//! let settings = BuildSettings::default();
//! assert_eq!(settings.ambiguity_strategy, AmbiguityStrategy::ForcePriority);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How competing registrations for a single-instance contract are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityStrategy {
    /// The unique lowest override priority wins; ties are fatal.
    #[default]
    ForcePriority,
    /// More than one registration is fatal.
    Strict,
    /// The first discovered registration wins, priorities are ignored.
    UseFirst,
}

impl fmt::Display for AmbiguityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbiguityStrategy::ForcePriority => write!(f, "ForcePriority"),
            AmbiguityStrategy::Strict => write!(f, "Strict"),
            AmbiguityStrategy::UseFirst => write!(f, "UseFirst"),
        }
    }
}

/// Settings that shape a registry build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Strategy for single-instance contracts with competing registrations.
    pub ambiguity_strategy: AmbiguityStrategy,
    /// Module prefix rewrites applied before types are compared.
    pub module_aliases: BTreeMap<String, String>,
    /// Exact type path rewrites.
    pub type_aliases: BTreeMap<String, String>,
    /// Catalog of real type paths. Empty disables the check.
    pub known_types: Vec<String>,
}

impl BuildSettings {
    pub fn with_strategy(mut self, strategy: AmbiguityStrategy) -> Self {
        self.ambiguity_strategy = strategy;
        self
    }
}
