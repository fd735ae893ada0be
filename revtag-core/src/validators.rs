//! Validators
//!
//! The operations hosts call on tags: take a snapshot with [`value_for_tag`],
//! check it later with [`validate_tag`], and report mutations with
//! [`dirty_tag`] and [`update_tag`].

use crate::error::{Result, TagError};
use crate::revision::Revision;
use crate::tag::Tag;

/// The constant sentinel. Every snapshot validates it.
pub const CONSTANT_TAG: Tag = Tag::CONSTANT;

/// The volatile sentinel. No snapshot validates it.
pub const VOLATILE_TAG: Tag = Tag::VOLATILE;

/// Snapshot the tag's current revision.
///
/// Pure from the caller's point of view; tags only update internal caches.
/// Inside a tracking transaction the tag is recorded as read.
pub fn value_for_tag(tag: &Tag) -> Result<Revision> {
    let value = tag.compute()?;
    if let Some(shared) = tag.shared() {
        shared.record_read(tag);
    }
    Ok(value)
}

/// Whether `snapshot`, taken earlier from [`value_for_tag`], is still valid.
pub fn validate_tag(tag: &Tag, snapshot: Revision) -> Result<bool> {
    Ok(snapshot.validates(tag.compute()?))
}

/// Record that the storage behind `tag` changed.
///
/// Bumps the clock, stamps the tag with the new revision and notifies the
/// runtime's revalidation hook. Only dirtyable and updatable tags accept
/// this.
pub fn dirty_tag(tag: &Tag) -> Result<()> {
    match tag {
        Tag::Dirtyable(inner) => {
            let id = inner.id();
            inner.shared.before_dirty(id)?;
            let revision = inner.dirty();
            inner.shared.after_dirty(id, revision);
        }
        Tag::Updatable(inner) => {
            let id = inner.core().id();
            inner.shared.before_dirty(id)?;
            let revision = inner.dirty();
            inner.shared.after_dirty(id, revision);
        }
        other => {
            return Err(TagError::InvalidTagKind {
                operation: "dirty",
                kind: other.kind(),
            })
        }
    }
    Ok(())
}

/// Point an updatable tag at a new dependency.
///
/// Rebinding to [`CONSTANT_TAG`] drops the dependency; the tag then tracks
/// only its own revision. Rebinding never reads as a change by itself.
pub fn update_tag(tag: &Tag, subtag: &Tag) -> Result<()> {
    let Tag::Updatable(inner) = tag else {
        return Err(TagError::InvalidTagKind {
            operation: "update",
            kind: tag.kind(),
        });
    };

    if is_const_tag(subtag) {
        inner.rebind(None)
    } else {
        inner.rebind(Some(subtag.clone()))
    }
}

/// Whether `tag` is the constant sentinel.
pub fn is_const_tag(tag: &Tag) -> bool {
    matches!(tag, Tag::Constant)
}
