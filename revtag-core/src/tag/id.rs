//! Tag identifiers and kinds.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a tag.
///
/// Every dirtyable, updatable and combinator tag gets one at construction.
/// Sentinels have none. Ids are used for error reporting, logging and the
/// debug consumption set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u64);

impl TagId {
    /// Generate a new unique tag ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TagId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The variant of a [`Tag`](super::Tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// A leaf over one mutable storage cell. Supports `dirty`.
    Dirtyable,

    /// A tag whose single dependency can be rebound. Supports `dirty` and
    /// `update`.
    Updatable,

    /// The max over a fixed set of children. Immutable.
    Combinator,

    /// Never changes.
    Constant,

    /// Never valid.
    Volatile,

    /// Reads the live clock.
    Current,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::Dirtyable => "dirtyable",
            TagKind::Updatable => "updatable",
            TagKind::Combinator => "combinator",
            TagKind::Constant => "constant",
            TagKind::Volatile => "volatile",
            TagKind::Current => "current",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_ids_are_unique() {
        let id1 = TagId::next();
        let id2 = TagId::next();
        let id3 = TagId::next();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn kinds_display_lowercase() {
        assert_eq!(TagKind::Dirtyable.to_string(), "dirtyable");
        assert_eq!(TagKind::Combinator.to_string(), "combinator");
        assert_eq!(TagId::from(7).to_string(), "#7");
    }
}
