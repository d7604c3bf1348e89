//! Override and processing priorities.
//!
//! Both priorities are plain ordinals where the lower value wins: a binding
//! with override priority `50` beats one with `100`, and multi-instance
//! bindings are listed in ascending order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordinal used for override and processing decisions. Lower wins.
///
/// # Examples
/// ```
/// use sijill_registry::priority::Priority;
///
/// assert!(Priority::HIGH < Priority::NORMAL);
/// assert!(Priority::from(50) < Priority::from(100));
/// assert_eq!(Priority::default(), Priority::NORMAL);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const HIGHEST: Priority = Priority(i32::MIN);
    pub const HIGH: Priority = Priority(-1000);
    pub const ABOVE_NORMAL: Priority = Priority(-100);
    pub const NORMAL: Priority = Priority(0);
    pub const BELOW_NORMAL: Priority = Priority(100);
    pub const LOW: Priority = Priority(1000);
    /// Used for the implicit contract declarations of builder registrations.
    pub const LOWEST: Priority = Priority(i32::MAX);

    #[inline]
    pub fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
