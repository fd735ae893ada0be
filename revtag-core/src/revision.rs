//! Revisions and the Revision Clock
//!
//! A revision is an integer timestamp of a mutation event. Every mutation in a
//! tag graph is ordered by a single monotonic counter, the [`RevisionClock`],
//! so comparing two revisions is enough to decide whether something changed.
//!
//! # Reserved Values
//!
//! - [`Revision::CONSTANT`] (0): never changes, so any snapshot validates it.
//! - [`Revision::INITIAL`] (1): the clock's starting point and the initial
//!   revision of every freshly created tag.
//! - [`Revision::VOLATILE`]: sits outside the numeric order entirely. It
//!   absorbs `max`, a volatile snapshot validates nothing, and a volatile
//!   computed value invalidates every snapshot.
//!
//! `Revision` does not implement `PartialOrd`. Compare with [`Revision::max`]
//! and [`Revision::validates`].

use std::cell::Cell;
use std::fmt;

/// Raw value used to encode the volatile sentinel.
const VOLATILE_RAW: u64 = u64::MAX;

/// An opaque timestamp produced by computing a tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Revision(u64);

impl Revision {
    /// Revision of tags that never change.
    pub const CONSTANT: Revision = Revision(0);

    /// Starting revision of the clock and of every new tag.
    pub const INITIAL: Revision = Revision(1);

    /// Sentinel that never validates against any snapshot.
    pub const VOLATILE: Revision = Revision(VOLATILE_RAW);

    /// Create a revision from a raw counter value.
    ///
    /// Returns `None` for the raw value reserved for [`Revision::VOLATILE`].
    #[inline]
    pub const fn new(value: u64) -> Option<Self> {
        if value == VOLATILE_RAW {
            None
        } else {
            Some(Self(value))
        }
    }

    /// The numeric value, or `None` for the volatile sentinel.
    #[inline]
    pub const fn get(self) -> Option<u64> {
        if self.is_volatile() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Whether this is the volatile sentinel.
    #[inline]
    pub const fn is_volatile(self) -> bool {
        self.0 == VOLATILE_RAW
    }

    /// The later of two revisions. Volatile wins over everything.
    #[inline]
    pub fn max(self, other: Revision) -> Revision {
        if self.is_volatile() || other.is_volatile() {
            Revision::VOLATILE
        } else if other.0 > self.0 {
            other
        } else {
            self
        }
    }

    /// Whether a snapshot taken as `self` is still valid for a tag that now
    /// computes to `current`.
    ///
    /// Holds iff `self >= current`, with the volatile sentinel on either side
    /// forcing `false`.
    #[inline]
    pub fn validates(self, current: Revision) -> bool {
        if self.is_volatile() || current.is_volatile() {
            return false;
        }
        self.0 >= current.0
    }

    /// Equality used by the rebinding buffer. Volatile never matches, not
    /// even itself.
    #[inline]
    pub(crate) fn same_as(self, other: Revision) -> bool {
        !self.is_volatile() && self.0 == other.0
    }

    fn next(self) -> Revision {
        debug_assert!(self.0 < VOLATILE_RAW - 1, "revision counter exhausted");
        Revision(self.0 + 1)
    }
}

impl Default for Revision {
    fn default() -> Self {
        Revision::INITIAL
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_volatile() {
            f.write_str("Revision(VOLATILE)")
        } else {
            write!(f, "Revision({})", self.0)
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_volatile() {
            f.write_str("volatile")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// The monotonic counter that orders every change in one tag graph.
///
/// The clock is owned by a [`Runtime`](crate::Runtime) and shared by every
/// tag it creates. It is a plain `Cell`: a graph is driven by a single owner
/// and is never touched from two threads at once.
#[derive(Debug)]
pub struct RevisionClock {
    now: Cell<Revision>,
}

impl RevisionClock {
    /// Create a clock reading [`Revision::INITIAL`].
    pub fn new() -> Self {
        Self {
            now: Cell::new(Revision::INITIAL),
        }
    }

    /// Advance the clock and return the new epoch.
    pub fn bump(&self) -> Revision {
        let next = self.now.get().next();
        self.now.set(next);
        next
    }

    /// Read the current epoch without advancing.
    #[inline]
    pub fn current(&self) -> Revision {
        self.now.get()
    }

    /// Rewind to [`Revision::INITIAL`].
    pub(crate) fn reset(&self) {
        self.now.set(Revision::INITIAL);
    }
}

impl Default for RevisionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(n: u64) -> Revision {
        Revision::new(n).unwrap()
    }

    #[test]
    fn clock_starts_at_initial_and_bumps() {
        let clock = RevisionClock::new();
        assert_eq!(clock.current(), Revision::INITIAL);

        assert_eq!(clock.bump(), rev(2));
        assert_eq!(clock.bump(), rev(3));
        assert_eq!(clock.current(), rev(3));
    }

    #[test]
    fn clock_reset_rewinds() {
        let clock = RevisionClock::new();
        clock.bump();
        clock.bump();
        clock.reset();
        assert_eq!(clock.current(), Revision::INITIAL);
    }

    #[test]
    fn volatile_is_not_constructible_from_raw() {
        assert!(Revision::new(u64::MAX).is_none());
        assert_eq!(Revision::VOLATILE.get(), None);
        assert_eq!(rev(7).get(), Some(7));
    }

    #[test]
    fn max_is_absorbed_by_volatile() {
        assert_eq!(rev(3).max(rev(5)), rev(5));
        assert_eq!(rev(5).max(rev(3)), rev(5));
        assert_eq!(rev(5).max(Revision::VOLATILE), Revision::VOLATILE);
        assert_eq!(Revision::VOLATILE.max(Revision::CONSTANT), Revision::VOLATILE);
    }

    #[test]
    fn validation_is_non_strict() {
        assert!(rev(4).validates(rev(4)));
        assert!(rev(5).validates(rev(4)));
        assert!(!rev(3).validates(rev(4)));
        assert!(Revision::CONSTANT.validates(Revision::CONSTANT));
    }

    #[test]
    fn volatile_never_validates() {
        assert!(!rev(100).validates(Revision::VOLATILE));
        assert!(!Revision::VOLATILE.validates(rev(1)));
        assert!(!Revision::VOLATILE.validates(Revision::VOLATILE));
    }

    #[test]
    fn volatile_never_matches_buffer() {
        assert!(rev(2).same_as(rev(2)));
        assert!(!rev(2).same_as(rev(3)));
        assert!(!Revision::VOLATILE.same_as(Revision::VOLATILE));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_serializes_as_plain_integer() {
        let encoded = serde_json::to_string(&rev(42)).unwrap();
        assert_eq!(encoded, "42");
        let decoded: Revision = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, rev(42));
    }
}
