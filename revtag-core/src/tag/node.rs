//! Tag State and the Compute Algorithm
//!
//! Dirtyable tags only carry their own revision. Updatable and combinator
//! tags additionally memoize the value they last computed, keyed by the clock
//! epoch at which they computed it.
//!
//! # Compute
//!
//! For a memoizing tag:
//!
//! 1. If the tag is already being computed further up the stack, a cycle was
//!    found. Unless the tag is allow-listed this is an error in debug builds.
//!    Otherwise the clock is bumped and the bumped epoch is reported, which
//!    reads as "changed" to every earlier snapshot and guarantees termination.
//! 2. If the tag already computed during the current epoch, return the
//!    memoized value.
//! 3. Otherwise fold the tag's own revision with its children's values,
//!    memoize the result and stamp it with the epoch.
//!
//! The result is the maximum revision among the tag and its transitive
//! dependencies.
//!
//! # Rebind Buffering
//!
//! Rebinding an updatable tag is not a change in itself. When the new child's
//! value is already ahead of the parent's memoized value, the next compute
//! would report a change that never happened. To hide that, the child's value
//! at rebind time is buffered. As long as the child still computes to the
//! buffered value, the parent keeps reporting its previous value. The first
//! time the child moves, the buffer is dropped and normal tracking resumes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::{Tag, TagId};
use crate::error::{Result, TagError};
use crate::revision::Revision;
use crate::runtime::Shared;

/// Children of a combinator. Most combinators join only a handful of tags.
pub(crate) type Children = SmallVec<[Tag; 4]>;

/// Clears the reentrancy flag when the compute frame exits, including when
/// it exits through an error.
struct UpdatingGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> UpdatingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Bookkeeping shared by every memoizing tag.
pub(crate) struct TagCore {
    id: TagId,

    /// The tag's own last bump.
    revision: Cell<Revision>,

    /// Clock epoch at which `last_value` was computed.
    last_checked: Cell<Revision>,

    /// Memoized aggregate.
    last_value: Cell<Revision>,

    /// True only while this tag's compute is on the stack.
    is_updating: Cell<bool>,

    /// Reentering this tag degrades instead of failing.
    allow_cycles: bool,
}

impl TagCore {
    /// `last_checked` is the epoch the initial memo counts as computed at.
    /// `Revision::CONSTANT` is behind every clock reading, so the first read
    /// always folds.
    fn new(allow_cycles: bool, last_checked: Revision) -> Self {
        Self {
            id: TagId::next(),
            revision: Cell::new(Revision::INITIAL),
            last_checked: Cell::new(last_checked),
            last_value: Cell::new(Revision::INITIAL),
            is_updating: Cell::new(false),
            allow_cycles,
        }
    }

    /// Drop the memo so the next read folds even within the current epoch.
    fn invalidate(&self) {
        self.last_checked.set(Revision::CONSTANT);
    }

    /// Run the compute algorithm, delegating the child fold to `fold`.
    ///
    /// `fold` receives the tag's own revision and returns the aggregate.
    fn compute_with<F>(&self, shared: &Shared, fold: F) -> Result<Revision>
    where
        F: FnOnce(Revision) -> Result<Revision>,
    {
        if self.is_updating.get() {
            return self.reenter(shared);
        }

        let epoch = shared.clock.current();
        if self.last_checked.get() == epoch {
            return Ok(self.last_value.get());
        }

        let _guard = UpdatingGuard::enter(&self.is_updating);
        let result = fold(self.revision.get())?;
        self.last_value.set(result);
        // A cycle below may have bumped the clock, in which case this stays
        // behind it and the next read recomputes.
        self.last_checked.set(epoch);

        Ok(result)
    }

    fn reenter(&self, shared: &Shared) -> Result<Revision> {
        if cfg!(debug_assertions) && !self.allow_cycles {
            return Err(TagError::CycleDetected { tag: self.id });
        }

        let now = shared.clock.bump();
        self.last_checked.set(now);
        tracing::debug!(tag = %self.id, revision = %now, "cycle in tag graph, reporting tag as changed");

        Ok(self.last_value.get().max(now))
    }

    pub(crate) fn id(&self) -> TagId {
        self.id
    }

    pub(crate) fn allows_cycles(&self) -> bool {
        self.allow_cycles
    }
}

/// A leaf tag over one mutable storage cell.
pub struct DirtyableTag {
    id: TagId,
    revision: Cell<Revision>,
    pub(crate) shared: Rc<Shared>,
}

impl DirtyableTag {
    pub(crate) fn new(shared: Rc<Shared>) -> Self {
        Self {
            id: TagId::next(),
            revision: Cell::new(Revision::INITIAL),
            shared,
        }
    }

    pub(crate) fn id(&self) -> TagId {
        self.id
    }

    pub(crate) fn compute(&self) -> Revision {
        self.revision.get()
    }

    pub(crate) fn dirty(&self) -> Revision {
        let revision = self.shared.clock.bump();
        self.revision.set(revision);
        revision
    }
}

impl fmt::Debug for DirtyableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyableTag")
            .field("id", &self.id)
            .field("revision", &self.revision.get())
            .finish()
    }
}

/// A tag tracking its own revision plus one rebindable dependency.
pub struct UpdatableTag {
    core: TagCore,
    subtag: RefCell<Option<Tag>>,
    /// The subtag's value at rebind time, until it first moves.
    buffer: Cell<Option<Revision>>,
    pub(crate) shared: Rc<Shared>,
}

impl UpdatableTag {
    pub(crate) fn new(shared: Rc<Shared>, allow_cycles: bool) -> Self {
        Self {
            core: TagCore::new(allow_cycles, Revision::INITIAL),
            subtag: RefCell::new(None),
            buffer: Cell::new(None),
            shared,
        }
    }

    pub(crate) fn core(&self) -> &TagCore {
        &self.core
    }

    pub(crate) fn compute(&self) -> Result<Revision> {
        self.core.compute_with(&self.shared, |revision| {
            // Cloned out so the borrow is not held across the child's compute.
            let Some(subtag) = self.subtag() else {
                return Ok(revision);
            };

            let value = subtag.compute()?;
            match self.buffer.get() {
                Some(buffered) if value.same_as(buffered) => {
                    Ok(revision.max(self.core.last_value.get()))
                }
                _ => {
                    self.buffer.set(None);
                    Ok(revision.max(value))
                }
            }
        })
    }

    pub(crate) fn dirty(&self) -> Revision {
        let revision = self.shared.clock.bump();
        self.core.revision.set(revision);
        revision
    }

    /// Point this tag at a new dependency. `None` drops the dependency.
    pub(crate) fn rebind(&self, subtag: Option<Tag>) -> Result<()> {
        match subtag {
            None => {
                self.buffer.set(None);
                *self.subtag.borrow_mut() = None;
            }
            Some(subtag) => {
                let value = subtag.compute()?;
                tracing::trace!(tag = %self.core.id, buffered = %value, "rebinding updatable tag");
                // A volatile subtag can never be buffered away, and the memo
                // may still hold a value from before the rebind.
                if value.is_volatile() {
                    self.core.invalidate();
                }
                self.buffer.set(Some(value));
                *self.subtag.borrow_mut() = Some(subtag);
            }
        }
        Ok(())
    }

    pub(crate) fn has_subtag(&self) -> bool {
        self.subtag.borrow().is_some()
    }

    pub(crate) fn subtag(&self) -> Option<Tag> {
        self.subtag.borrow().clone()
    }
}

impl fmt::Debug for UpdatableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatableTag")
            .field("id", &self.core.id)
            .field("revision", &self.core.revision.get())
            .field("last_value", &self.core.last_value.get())
            .field("has_subtag", &self.has_subtag())
            .field("buffer", &self.buffer.get())
            .finish()
    }
}

/// The max over a fixed, ordered set of children.
pub struct CombinatorTag {
    core: TagCore,
    children: Children,
    pub(crate) shared: Rc<Shared>,
}

impl CombinatorTag {
    pub(crate) fn new(shared: Rc<Shared>, children: Children) -> Self {
        Self {
            core: TagCore::new(false, Revision::CONSTANT),
            children,
            shared,
        }
    }

    pub(crate) fn core(&self) -> &TagCore {
        &self.core
    }

    pub(crate) fn children(&self) -> &[Tag] {
        &self.children
    }

    pub(crate) fn compute(&self) -> Result<Revision> {
        self.core.compute_with(&self.shared, |revision| {
            self.children
                .iter()
                .try_fold(revision, |acc, child| Ok(acc.max(child.compute()?)))
        })
    }
}

impl fmt::Debug for CombinatorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinatorTag")
            .field("id", &self.core.id)
            .field("last_value", &self.core.last_value.get())
            .field("children", &self.children().len())
            .finish()
    }
}

/// Reads the live clock.
#[derive(Clone)]
pub struct CurrentTag {
    pub(crate) shared: Rc<Shared>,
}

impl CurrentTag {
    pub(crate) fn compute(&self) -> Revision {
        self.shared.clock.current()
    }
}

impl fmt::Debug for CurrentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentTag")
            .field("now", &self.compute())
            .finish()
    }
}
