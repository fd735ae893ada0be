//! Tags
//!
//! A tag is a trackable handle over a piece of mutable state or over a
//! derived computation. Computing a tag yields a [`Revision`]; a snapshot of
//! that revision can later be checked against a fresh compute to learn whether
//! anything the tag covers has changed.
//!
//! # Variants
//!
//! - `Dirtyable`: a leaf, created once per storage cell and bumped with
//!   `dirty_tag` whenever the cell is written.
//! - `Updatable`: its own revision plus one dependency that can be rebound
//!   with `update_tag`.
//! - `Combinator`: the max over a fixed set of children, built by `combine`.
//! - `Constant`, `Volatile`, `Current`: sentinels that are always valid,
//!   never valid, and valid only from "now" on.
//!
//! Tags are cheap `Rc` handles. Cloning a tag clones the handle, not the
//! state.

mod id;
mod node;

pub use id::{TagId, TagKind};
pub use node::{CombinatorTag, CurrentTag, DirtyableTag, UpdatableTag};

pub(crate) use node::Children;

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::revision::Revision;
use crate::runtime::Shared;

/// A handle to a node in a tag graph.
#[derive(Clone)]
pub enum Tag {
    /// Leaf over one mutable storage cell.
    Dirtyable(Rc<DirtyableTag>),
    /// Own revision plus one rebindable dependency.
    Updatable(Rc<UpdatableTag>),
    /// Max over a fixed set of children.
    Combinator(Rc<CombinatorTag>),
    /// Always valid.
    Constant,
    /// Never valid.
    Volatile,
    /// Valid only for snapshots taken at or after the current epoch.
    Current(CurrentTag),
}

impl Tag {
    /// The constant sentinel.
    pub const CONSTANT: Tag = Tag::Constant;

    /// The volatile sentinel.
    pub const VOLATILE: Tag = Tag::Volatile;

    /// Compute the tag's current revision.
    ///
    /// Fails only with [`TagError::CycleDetected`](crate::TagError) when a
    /// cycle passes through a tag that is not allow-listed, and only in debug
    /// builds.
    pub fn compute(&self) -> Result<Revision> {
        match self {
            Tag::Dirtyable(tag) => Ok(tag.compute()),
            Tag::Updatable(tag) => tag.compute(),
            Tag::Combinator(tag) => tag.compute(),
            Tag::Constant => Ok(Revision::CONSTANT),
            Tag::Volatile => Ok(Revision::VOLATILE),
            Tag::Current(tag) => Ok(tag.compute()),
        }
    }

    /// Which variant this is.
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::Dirtyable(_) => TagKind::Dirtyable,
            Tag::Updatable(_) => TagKind::Updatable,
            Tag::Combinator(_) => TagKind::Combinator,
            Tag::Constant => TagKind::Constant,
            Tag::Volatile => TagKind::Volatile,
            Tag::Current(_) => TagKind::Current,
        }
    }

    /// The tag's id. Sentinels have none.
    pub fn id(&self) -> Option<TagId> {
        match self {
            Tag::Dirtyable(tag) => Some(tag.id()),
            Tag::Updatable(tag) => Some(tag.core().id()),
            Tag::Combinator(tag) => Some(tag.core().id()),
            Tag::Constant | Tag::Volatile | Tag::Current(_) => None,
        }
    }

    /// Whether reentering this tag during compute degrades instead of
    /// failing.
    pub fn allows_cycles(&self) -> bool {
        match self {
            Tag::Updatable(tag) => tag.core().allows_cycles(),
            Tag::Combinator(tag) => tag.core().allows_cycles(),
            _ => false,
        }
    }

    /// Whether two handles refer to the same tag.
    ///
    /// Sentinels compare equal to themselves. Current tags compare equal when
    /// they read the same clock.
    pub fn ptr_eq(&self, other: &Tag) -> bool {
        match (self, other) {
            (Tag::Dirtyable(a), Tag::Dirtyable(b)) => Rc::ptr_eq(a, b),
            (Tag::Updatable(a), Tag::Updatable(b)) => Rc::ptr_eq(a, b),
            (Tag::Combinator(a), Tag::Combinator(b)) => Rc::ptr_eq(a, b),
            (Tag::Constant, Tag::Constant) | (Tag::Volatile, Tag::Volatile) => true,
            (Tag::Current(a), Tag::Current(b)) => Rc::ptr_eq(&a.shared, &b.shared),
            _ => false,
        }
    }

    /// The graph this tag belongs to. Constant and volatile belong to none.
    pub(crate) fn shared(&self) -> Option<&Rc<Shared>> {
        match self {
            Tag::Dirtyable(tag) => Some(&tag.shared),
            Tag::Updatable(tag) => Some(&tag.shared),
            Tag::Combinator(tag) => Some(&tag.shared),
            Tag::Current(tag) => Some(&tag.shared),
            Tag::Constant | Tag::Volatile => None,
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Dirtyable(tag) => fmt::Debug::fmt(tag, f),
            Tag::Updatable(tag) => fmt::Debug::fmt(tag, f),
            Tag::Combinator(tag) => fmt::Debug::fmt(tag, f),
            Tag::Constant => f.write_str("ConstantTag"),
            Tag::Volatile => f.write_str("VolatileTag"),
            Tag::Current(tag) => fmt::Debug::fmt(tag, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Runtime;

    #[test]
    fn sentinels_compute_reserved_revisions() {
        let rt = Runtime::new();
        assert_eq!(Tag::CONSTANT.compute().unwrap(), Revision::CONSTANT);
        assert_eq!(Tag::VOLATILE.compute().unwrap(), Revision::VOLATILE);
        assert_eq!(rt.current_tag().compute().unwrap(), rt.current_revision());
    }

    #[test]
    fn kinds_and_ids() {
        let rt = Runtime::new();
        let leaf = rt.create_tag();
        let updatable = rt.create_updatable_tag();
        let combined = rt.combine([leaf.clone(), updatable.clone()]);

        assert_eq!(leaf.kind(), TagKind::Dirtyable);
        assert_eq!(updatable.kind(), TagKind::Updatable);
        assert_eq!(combined.kind(), TagKind::Combinator);
        assert_eq!(rt.current_tag().kind(), TagKind::Current);
        assert_eq!(Tag::CONSTANT.kind(), TagKind::Constant);

        assert!(leaf.id().is_some());
        assert_ne!(leaf.id(), updatable.id());
        assert!(Tag::VOLATILE.id().is_none());
        assert!(rt.current_tag().id().is_none());
    }

    #[test]
    fn ptr_eq_compares_identity() {
        let rt = Runtime::new();
        let a = rt.create_tag();
        let b = rt.create_tag();

        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert!(Tag::CONSTANT.ptr_eq(&Tag::Constant));
        assert!(!Tag::CONSTANT.ptr_eq(&Tag::VOLATILE));
        assert!(rt.current_tag().ptr_eq(&rt.current_tag()));
        assert!(!rt.current_tag().ptr_eq(&Runtime::new().current_tag()));
    }

    #[test]
    fn only_cyclic_updatables_allow_cycles() {
        let rt = Runtime::new();
        assert!(rt.create_cyclic_updatable_tag().allows_cycles());
        assert!(!rt.create_updatable_tag().allows_cycles());
        assert!(!rt.create_tag().allows_cycles());
    }
}
