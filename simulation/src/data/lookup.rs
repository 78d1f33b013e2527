//! Explicit result type for table lookups that may need a fallback

use std::fmt;
use tracing::warn;

/// Why a lookup returned something other than the requested entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// The nearest earlier year was used.
    EarlierYear(i32),
    /// No earlier year exists; the earliest later year was used.
    LaterYear(i32),
    /// The most recent year of the table was used.
    LatestYear(i32),
    /// Estimated from a fitted trend rather than read from the table.
    Trend,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::EarlierYear(y) => write!(f, "earlier year {y}"),
            Fallback::LaterYear(y) => write!(f, "later year {y}"),
            Fallback::LatestYear(y) => write!(f, "latest year {y}"),
            Fallback::Trend => f.write_str("linear trend"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    FallbackUsed(T, Fallback),
    Missing,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::FallbackUsed(v, why) => Lookup::FallbackUsed(f(v), why),
            Lookup::Missing => Lookup::Missing,
        }
    }

    /// The value whether it was found directly or through a fallback.
    pub fn value(self) -> Option<T> {
        match self {
            Lookup::Found(v) | Lookup::FallbackUsed(v, _) => Some(v),
            Lookup::Missing => None,
        }
    }

    /// Resolve to a value, logging any fallback against `what`.
    pub fn or_logged(self, what: impl fmt::Display, default: T) -> T {
        match self {
            Lookup::Found(v) => v,
            Lookup::FallbackUsed(v, why) => {
                warn!("{what}: using {why}");
                v
            }
            Lookup::Missing => {
                warn!("{what}: no data, using default");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_keeps_fallbacks() {
        assert_eq!(Lookup::Found(3).value(), Some(3));
        assert_eq!(Lookup::FallbackUsed(4, Fallback::EarlierYear(2010)).value(), Some(4));
        assert_eq!(Lookup::<i32>::Missing.value(), None);
    }

    #[test]
    fn test_or_logged_uses_default_only_when_missing() {
        assert_eq!(Lookup::FallbackUsed(2.0, Fallback::Trend).or_logged("x", 9.0), 2.0);
        assert_eq!(Lookup::Missing.or_logged("x", 9.0), 9.0);
    }
}
