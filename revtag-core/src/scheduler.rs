//! Revalidation Scheduling
//!
//! Dirtying a tag does not recompute anything. It only tells the host that
//! some derived state may need revalidating, and the host decides when to
//! do it.
//!
//! The notification is fire-and-forget. It is sent once per `dirty_tag` call
//! and hosts are free to coalesce repeated notifications into a single
//! revalidation pass. [`RevalidationQueue`] is a ready-made coalescing hook.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Host hook notified whenever a tag is dirtied.
pub trait Revalidate {
    /// Called once per `dirty_tag`. Must tolerate repeated calls.
    fn schedule_revalidate(&self);
}

/// No-op hook, used when the runtime is created without a scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NoRevalidate;

impl Revalidate for NoRevalidate {
    fn schedule_revalidate(&self) {}
}

impl<F> Revalidate for F
where
    F: Fn(),
{
    fn schedule_revalidate(&self) {
        self()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: Cell<bool>,
    notifications: Cell<usize>,
}

/// A coalescing revalidation hook.
///
/// Any number of notifications between two [`take`](Self::take) calls
/// collapse into one pending revalidation. Clones share state, so one clone
/// can be handed to the runtime while the host keeps another.
///
/// # Example
///
/// ```rust
/// use revtag_core::{dirty_tag, RevalidationQueue, Runtime};
///
/// let queue = RevalidationQueue::new();
/// let rt = Runtime::with_scheduler(queue.clone());
/// let tag = rt.create_tag();
///
/// dirty_tag(&tag).unwrap();
/// dirty_tag(&tag).unwrap();
///
/// assert!(queue.take());
/// assert!(!queue.take());
/// ```
#[derive(Clone, Default)]
pub struct RevalidationQueue {
    state: Rc<QueueState>,
}

impl RevalidationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a revalidation is pending.
    pub fn is_pending(&self) -> bool {
        self.state.pending.get()
    }

    /// Consume the pending revalidation, if any.
    ///
    /// Returns `true` when at least one notification arrived since the last
    /// call.
    pub fn take(&self) -> bool {
        self.state.pending.replace(false)
    }

    /// Total notifications received, coalesced or not.
    pub fn notification_count(&self) -> usize {
        self.state.notifications.get()
    }
}

impl Revalidate for RevalidationQueue {
    fn schedule_revalidate(&self) {
        self.state.pending.set(true);
        self.state
            .notifications
            .set(self.state.notifications.get() + 1);
    }
}

impl fmt::Debug for RevalidationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevalidationQueue")
            .field("pending", &self.is_pending())
            .field("notifications", &self.notification_count())
            .finish()
    }
}
