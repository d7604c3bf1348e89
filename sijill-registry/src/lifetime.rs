//! Service lifetimes.
//!
//! A lifetime determines how long an instance produced for a binding lives:
//! - [`Lifetime::Transient`] — new instance every time
//! - [`Lifetime::Singleton`] — one instance for the entire process
//! - [`Lifetime::Scoped`] — one instance per scope (e.g., HTTP request)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Defines the lifetime of the instances a binding produces.
///
/// # Examples
/// ```
/// use sijill_registry::lifetime::Lifetime;
///
/// assert_eq!(Lifetime::default(), Lifetime::Transient);
/// assert!(Lifetime::Singleton.is_cached());
/// assert!(!Lifetime::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// New instance created on every resolve call.
    ///
    /// Never cached.
    #[default]
    Transient,

    /// One instance shared by the whole process.
    ///
    /// Created on first resolve, lives as long as the engine that built it.
    Singleton,

    /// One instance per scope.
    ///
    /// Created on first resolve within a scope, dropped when the scope ends.
    /// Cannot be resolved outside of a scope.
    Scoped,
}

impl Lifetime {
    /// Returns `true` if instances are cached by the engine.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    /// Returns `true` if resolution requires an active scope.
    #[inline]
    pub fn requires_scope(&self) -> bool {
        matches!(self, Lifetime::Scoped)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Transient => write!(f, "Transient"),
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_is_cached() {
        assert!(Lifetime::Singleton.is_cached());
        assert!(Lifetime::Scoped.is_cached());
        assert!(!Lifetime::Transient.is_cached());
    }

    #[test]
    fn only_scoped_requires_scope() {
        assert!(Lifetime::Scoped.requires_scope());
        assert!(!Lifetime::Singleton.requires_scope());
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(format!("{}", Lifetime::Singleton), "Singleton");
        assert_eq!(format!("{}", Lifetime::Scoped), "Scoped");
        assert_eq!(format!("{}", Lifetime::Transient), "Transient");
    }

    #[test]
    fn lifetime_deserializes_snake_case() {
        let lifetime: Lifetime = serde_json::from_str("\"scoped\"").unwrap();
        assert_eq!(lifetime, Lifetime::Scoped);
    }
}
