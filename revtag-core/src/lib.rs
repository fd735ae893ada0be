//! Revtag Core
//!
//! This crate provides a revision-tag dependency tracking engine. It decides,
//! without recomputing anything, whether a previously cached derived value is
//! still valid after some piece of mutable state changed.
//!
//! It implements:
//!
//! - A per-graph monotonic revision clock
//! - Tags over mutable state (dirtyable), rebindable dependencies
//!   (updatable), and fixed sets of dependencies (combinators)
//! - Per-epoch memoization with cycle detection
//! - Buffered rebinding, so pointing a tag at a new dependency never reads
//!   as a change by itself
//! - Tracking frames that collect consumed tags automatically
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `revision`: Revisions and the clock that orders them
//! - `tag`: The tag sum type and the compute algorithm
//! - `runtime`: The owner of one tag graph
//! - `validators`: Snapshot, validate, dirty and update operations
//! - `tracking`: Tracking frames
//! - `scheduler`: The host's revalidation hook
//!
//! # Example
//!
//! ```rust
//! use revtag_core::{dirty_tag, validate_tag, value_for_tag, Revision, Runtime};
//!
//! let rt = Runtime::new();
//! let tag = rt.create_tag();
//! assert_eq!(value_for_tag(&tag).unwrap(), Revision::INITIAL);
//!
//! let snapshot = value_for_tag(&tag).unwrap();
//! dirty_tag(&tag).unwrap();
//!
//! // The snapshot no longer matches; whatever was derived from it is stale.
//! assert!(!validate_tag(&tag, snapshot).unwrap());
//! ```

pub mod revision;
pub mod tag;
mod error;
mod runtime;
mod scheduler;
mod tracking;
mod validators;

#[cfg(debug_assertions)]
mod debug;

pub use error::{Result, TagError};
pub use revision::{Revision, RevisionClock};
pub use runtime::Runtime;
pub use scheduler::{Revalidate, RevalidationQueue};
pub use tag::{Tag, TagId, TagKind};
pub use validators::{
    dirty_tag, is_const_tag, update_tag, validate_tag, value_for_tag, CONSTANT_TAG, VOLATILE_TAG,
};
