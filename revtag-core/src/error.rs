//! Error types for tag operations.
//!
//! All of these are programmer errors: they are reported fail-fast and never
//! retried or absorbed.

use thiserror::Error;

use crate::tag::{TagId, TagKind};

/// Errors raised by tag operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// The operation is not supported by this tag variant, e.g. dirtying a
    /// combinator or rebinding a dirtyable tag.
    #[error("cannot {operation} a {kind} tag")]
    InvalidTagKind {
        /// The rejected operation (`"dirty"` or `"update"`).
        operation: &'static str,
        /// The variant it was attempted on.
        kind: TagKind,
    },

    /// `compute()` reentered a tag that is not allow-listed for cycles.
    #[error("cycle detected while computing tag {tag}; cycles in tags are not allowed")]
    CycleDetected {
        /// The reentered tag.
        tag: TagId,
    },

    /// A tag was dirtied after it had already been read in the current
    /// tracking transaction.
    #[error(
        "tag {tag} was dirtied after it was consumed in {}",
        .transaction.as_deref().unwrap_or("the current tracking transaction")
    )]
    ConsumedBeforeDirtied {
        /// The dirtied tag.
        tag: TagId,
        /// Debug label of the transaction that consumed it, if any.
        transaction: Option<String>,
    },
}

/// Result alias for tag operations.
pub type Result<T> = std::result::Result<T, TagError>;
