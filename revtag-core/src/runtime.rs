//! Tag Runtime
//!
//! The runtime owns everything one tag graph shares: the revision clock, the
//! host's revalidation hook, the tracking-frame stack and, in debug builds,
//! the tracking-transaction state. Every tag it creates keeps a handle to it.
//!
//! # How It Works
//!
//! 1. Leaf tags are created with [`Runtime::create_tag`], one per mutable
//!    storage cell.
//!
//! 2. Writing a cell calls `dirty_tag`, which bumps the clock, stamps the
//!    leaf with the new revision and notifies the revalidation hook.
//!
//! 3. Derived reads combine the tags they consumed (explicitly with
//!    [`Runtime::combine`], or automatically with [`Runtime::track`]) and
//!    keep a snapshot of the combined tag's value.
//!
//! 4. Later, `validate_tag` recomputes the combined tag. Because the clock
//!    advanced, every memoizing tag on the way is stale and folds its
//!    children again, so the leaf's new revision surfaces and the snapshot
//!    is rejected.
//!
//! # Thread Safety
//!
//! None. A runtime and its tags are `!Send` and `!Sync`; all operations run
//! synchronously to completion. Hosts that need several threads give each
//! one its own runtime.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::revision::{Revision, RevisionClock};
use crate::scheduler::{NoRevalidate, Revalidate};
use crate::tag::{Children, CombinatorTag, CurrentTag, DirtyableTag, Tag, TagId, UpdatableTag};
use crate::tracking::TrackingStack;

#[cfg(debug_assertions)]
use crate::debug::Transactions;

/// State shared by a runtime and every tag it created.
pub(crate) struct Shared {
    pub(crate) clock: RevisionClock,
    scheduler: Box<dyn Revalidate>,
    tracking: TrackingStack,
    #[cfg(debug_assertions)]
    transactions: Transactions,
}

impl Shared {
    fn new(scheduler: Box<dyn Revalidate>) -> Self {
        Self {
            clock: RevisionClock::new(),
            scheduler,
            tracking: TrackingStack::default(),
            #[cfg(debug_assertions)]
            transactions: Transactions::default(),
        }
    }

    /// Record a read of `tag` and its dependencies for the write-after-read
    /// check.
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub(crate) fn record_read(&self, tag: &Tag) {
        #[cfg(debug_assertions)]
        self.transactions.mark_tag_consumed(tag);
    }

    /// Checks that must pass before `tag` is dirtied.
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub(crate) fn before_dirty(&self, tag: TagId) -> Result<()> {
        #[cfg(debug_assertions)]
        self.transactions.assert_not_consumed(tag)?;
        Ok(())
    }

    pub(crate) fn after_dirty(&self, tag: TagId, revision: Revision) {
        tracing::trace!(tag = %tag, revision = %revision, "tag dirtied");
        self.scheduler.schedule_revalidate();
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("clock", &self.clock)
            .field("tracking_depth", &self.tracking.depth())
            .finish_non_exhaustive()
    }
}

/// Owner of one tag graph.
///
/// Cloning a runtime clones the handle; clones share the same clock.
///
/// # Example
///
/// ```rust
/// use revtag_core::{dirty_tag, validate_tag, value_for_tag, Runtime};
///
/// let rt = Runtime::new();
/// let first = rt.create_tag();
/// let last = rt.create_tag();
/// let full_name = rt.combine([first.clone(), last.clone()]);
///
/// let snapshot = value_for_tag(&full_name).unwrap();
/// assert!(validate_tag(&full_name, snapshot).unwrap());
///
/// dirty_tag(&last).unwrap();
/// assert!(!validate_tag(&full_name, snapshot).unwrap());
/// ```
#[derive(Clone, Debug)]
pub struct Runtime {
    shared: Rc<Shared>,
}

impl Runtime {
    /// Create a runtime with no revalidation hook.
    pub fn new() -> Self {
        Self::from_scheduler(Box::new(NoRevalidate))
    }

    /// Create a runtime that notifies `hook` every time a tag is dirtied.
    pub fn with_scheduler<R>(hook: R) -> Self
    where
        R: Revalidate + 'static,
    {
        Self::from_scheduler(Box::new(hook))
    }

    fn from_scheduler(scheduler: Box<dyn Revalidate>) -> Self {
        Self {
            shared: Rc::new(Shared::new(scheduler)),
        }
    }

    /// The graph's clock.
    pub fn clock(&self) -> &RevisionClock {
        &self.shared.clock
    }

    /// The current epoch.
    pub fn current_revision(&self) -> Revision {
        self.shared.clock.current()
    }

    /// Create a leaf tag for one mutable storage cell.
    pub fn create_tag(&self) -> Tag {
        Tag::Dirtyable(Rc::new(DirtyableTag::new(Rc::clone(&self.shared))))
    }

    /// Create an updatable tag with no dependency.
    pub fn create_updatable_tag(&self) -> Tag {
        Tag::Updatable(Rc::new(UpdatableTag::new(Rc::clone(&self.shared), false)))
    }

    /// Create an updatable tag that is allowed to sit on a dependency cycle.
    ///
    /// Reentering it during compute bumps the clock and reports the tag as
    /// changed instead of failing with
    /// [`TagError::CycleDetected`](crate::TagError::CycleDetected).
    pub fn create_cyclic_updatable_tag(&self) -> Tag {
        Tag::Updatable(Rc::new(UpdatableTag::new(Rc::clone(&self.shared), true)))
    }

    /// Combine several tags into one that computes to the max of all of
    /// them.
    ///
    /// An empty input yields the constant sentinel and a single tag is
    /// returned as is.
    pub fn combine<I>(&self, tags: I) -> Tag
    where
        I: IntoIterator<Item = Tag>,
    {
        let mut children: Children = tags.into_iter().collect();
        match children.len() {
            0 => Tag::CONSTANT,
            1 => children.pop().unwrap_or(Tag::CONSTANT),
            _ => Tag::Combinator(Rc::new(CombinatorTag::new(
                Rc::clone(&self.shared),
                children,
            ))),
        }
    }

    /// The current-time sentinel of this graph.
    ///
    /// It computes to the live clock, so only snapshots taken at or after
    /// the latest change validate it.
    pub fn current_tag(&self) -> Tag {
        Tag::Current(CurrentTag {
            shared: Rc::clone(&self.shared),
        })
    }

    /// Run `f` in a fresh tracking frame.
    ///
    /// Returns `f`'s result together with a tag combining every tag consumed
    /// inside the frame. If the frame is nested in another tracking frame,
    /// the combined tag is also consumed by the parent.
    pub fn track<T, F>(&self, f: F) -> (T, Tag)
    where
        F: FnOnce() -> T,
    {
        let frame = self.shared.tracking.enter(true);
        let value = f();
        let tag = self.combine(frame.finish());
        self.shared.tracking.consume(&tag);
        (value, tag)
    }

    /// Run `f` with consumption suspended.
    pub fn untrack<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _frame = self.shared.tracking.enter(false);
        f()
    }

    /// Record `tag` as read by the innermost tracking frame.
    pub fn consume_tag(&self, tag: &Tag) {
        self.shared.tracking.consume(tag);
        self.shared.record_read(tag);
    }

    /// Whether a tracking frame is currently collecting.
    pub fn is_tracking(&self) -> bool {
        self.shared.tracking.is_tracking()
    }

    /// Run `f` as one synchronous evaluation pass.
    ///
    /// In debug builds, dirtying a tag that was read during the pass fails
    /// with [`TagError::ConsumedBeforeDirtied`](crate::TagError::ConsumedBeforeDirtied)
    /// naming `label`. Release builds just run `f`.
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub fn run_in_tracking_transaction<T, F>(&self, label: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        #[cfg(debug_assertions)]
        let _transaction = self.shared.transactions.begin(Some(label));
        f()
    }

    /// Rewind the clock and drop all tracking state.
    ///
    /// Tags created before the reset carry revisions from the old timeline
    /// and must be discarded with it.
    pub fn reset(&self) {
        tracing::debug!(revision = %self.current_revision(), "resetting tag runtime");
        self.shared.clock.reset();
        self.shared.tracking.clear();
        #[cfg(debug_assertions)]
        self.shared.transactions.reset();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RevalidationQueue;
    use crate::validators::{dirty_tag, validate_tag, value_for_tag};
    use std::cell::Cell;

    fn rev(n: u64) -> Revision {
        Revision::new(n).unwrap()
    }

    #[test]
    fn combine_collapses_trivial_inputs() {
        let rt = Runtime::new();
        let a = rt.create_tag();

        assert!(rt.combine(Vec::new()).ptr_eq(&Tag::CONSTANT));
        assert!(rt.combine([a.clone()]).ptr_eq(&a));
        assert!(!rt.combine([a.clone(), a.clone()]).ptr_eq(&a));
    }

    #[test]
    fn runtimes_do_not_share_clocks() {
        let first = Runtime::new();
        let second = Runtime::new();
        let tag = first.create_tag();

        dirty_tag(&tag).unwrap();
        dirty_tag(&tag).unwrap();

        assert_eq!(first.current_revision(), rev(3));
        assert_eq!(second.current_revision(), Revision::INITIAL);
    }

    #[test]
    fn dirty_notifies_scheduler_once_per_call() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let rt = Runtime::with_scheduler(move || counter.set(counter.get() + 1));
        let tag = rt.create_tag();

        dirty_tag(&tag).unwrap();
        dirty_tag(&tag).unwrap();
        value_for_tag(&tag).unwrap();

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn queue_scheduler_coalesces() {
        let queue = RevalidationQueue::new();
        let rt = Runtime::with_scheduler(queue.clone());
        let a = rt.create_tag();
        let b = rt.create_tag();

        dirty_tag(&a).unwrap();
        dirty_tag(&b).unwrap();

        assert_eq!(queue.notification_count(), 2);
        assert!(queue.take());
        assert!(!queue.take());
    }

    #[test]
    fn track_combines_consumed_tags() {
        let rt = Runtime::new();
        let a = rt.create_tag();
        let b = rt.create_tag();
        let c = rt.create_tag();

        let (sum, tag) = rt.track(|| {
            rt.consume_tag(&a);
            rt.consume_tag(&b);
            1 + 2
        });
        assert_eq!(sum, 3);
        assert!(!rt.is_tracking());

        let snapshot = value_for_tag(&tag).unwrap();
        dirty_tag(&c).unwrap();
        assert!(validate_tag(&tag, snapshot).unwrap());

        dirty_tag(&b).unwrap();
        assert!(!validate_tag(&tag, snapshot).unwrap());
    }

    #[test]
    fn track_with_nothing_consumed_is_constant() {
        let rt = Runtime::new();
        let ((), tag) = rt.track(|| {});
        assert!(tag.ptr_eq(&Tag::CONSTANT));
    }

    #[test]
    fn nested_track_feeds_parent() {
        let rt = Runtime::new();
        let a = rt.create_tag();
        let b = rt.create_tag();

        let (inner, outer) = rt.track(|| {
            rt.consume_tag(&a);
            let ((), inner) = rt.track(|| rt.consume_tag(&b));
            inner
        });

        assert!(inner.ptr_eq(&b));
        let snapshot = value_for_tag(&outer).unwrap();
        dirty_tag(&b).unwrap();
        assert!(!validate_tag(&outer, snapshot).unwrap());
    }

    #[test]
    fn untrack_hides_reads() {
        let rt = Runtime::new();
        let a = rt.create_tag();
        let b = rt.create_tag();

        let ((), tag) = rt.track(|| {
            rt.consume_tag(&a);
            rt.untrack(|| rt.consume_tag(&b));
        });

        assert!(tag.ptr_eq(&a));
    }

    #[test]
    fn reset_rewinds_clock_and_frames() {
        let rt = Runtime::new();
        let tag = rt.create_tag();
        dirty_tag(&tag).unwrap();

        let ((), _) = rt.track(|| {
            rt.reset();
            rt.consume_tag(&tag);
        });

        assert_eq!(rt.current_revision(), Revision::INITIAL);
        assert!(!rt.is_tracking());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn transaction_rejects_write_after_read() {
        use crate::error::TagError;

        let rt = Runtime::new();
        let tag = rt.create_tag();

        let result = rt.run_in_tracking_transaction("render", || {
            value_for_tag(&tag)?;
            dirty_tag(&tag)
        });

        assert_eq!(
            result,
            Err(TagError::ConsumedBeforeDirtied {
                tag: tag.id().unwrap(),
                transaction: Some("render".to_string()),
            })
        );

        // Outside the pass the same write is fine.
        assert!(dirty_tag(&tag).is_ok());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn transaction_rejects_write_to_dependency_of_read() {
        use crate::error::TagError;
        use crate::validators::update_tag;

        let rt = Runtime::new();
        let a = rt.create_tag();
        let b = rt.create_tag();
        let unread = rt.create_tag();
        let combined = rt.combine([a.clone(), b.clone()]);
        let updatable = rt.create_updatable_tag();
        update_tag(&updatable, &combined).unwrap();

        let result = rt.run_in_tracking_transaction("render", || {
            value_for_tag(&combined)?;
            dirty_tag(&a)
        });
        assert_eq!(
            result,
            Err(TagError::ConsumedBeforeDirtied {
                tag: a.id().unwrap(),
                transaction: Some("render".to_string()),
            })
        );

        // Reaching `b` through the updatable's subtag counts as a read too.
        let result = rt.run_in_tracking_transaction("layout", || {
            rt.consume_tag(&updatable);
            dirty_tag(&unread)?;
            dirty_tag(&b)
        });
        assert_eq!(
            result,
            Err(TagError::ConsumedBeforeDirtied {
                tag: b.id().unwrap(),
                transaction: Some("layout".to_string()),
            })
        );
    }
}
