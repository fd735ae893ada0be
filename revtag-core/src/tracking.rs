//! Tracking Frames
//!
//! A tracking frame collects every tag consumed while it is active. When the
//! frame closes, the collected tags are combined into one tag that covers
//! everything the tracked code read.
//!
//! # Implementation
//!
//! Frames live on a per-runtime stack. Entering a frame pushes it; the guard
//! returned by [`TrackingStack::enter`] pops it again, even if the tracked
//! code panics. This supports nesting: a frame nested inside another hands
//! its combined tag to the parent when it closes, so the parent covers
//! everything the child read.
//!
//! An untracked frame suspends collection until it closes.

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::tag::{Tag, TagId};

/// Dedup key for consumed tags, preserving first-consumed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FrameKey {
    Node(TagId),
    Volatile,
    Current,
}

impl FrameKey {
    fn of(tag: &Tag) -> Option<Self> {
        match tag {
            Tag::Constant => None,
            Tag::Volatile => Some(FrameKey::Volatile),
            Tag::Current(_) => Some(FrameKey::Current),
            _ => tag.id().map(FrameKey::Node),
        }
    }
}

/// An entry on the tracking stack.
#[derive(Debug, Default)]
struct Frame {
    /// `None` while untracked.
    tags: Option<IndexMap<FrameKey, Tag>>,
}

/// Per-runtime stack of tracking frames.
#[derive(Debug, Default)]
pub(crate) struct TrackingStack {
    frames: RefCell<Vec<Frame>>,
}

impl TrackingStack {
    /// Push a frame. `tracked == false` suspends collection.
    pub(crate) fn enter(&self, tracked: bool) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame {
            tags: tracked.then(IndexMap::new),
        });
        FrameGuard {
            stack: self,
            depth: self.depth(),
        }
    }

    /// Record a tag in the innermost frame. No-op outside frames and inside
    /// untracked ones.
    pub(crate) fn consume(&self, tag: &Tag) {
        let Some(key) = FrameKey::of(tag) else {
            return;
        };
        if let Some(tags) = self
            .frames
            .borrow_mut()
            .last_mut()
            .and_then(|frame| frame.tags.as_mut())
        {
            tags.entry(key).or_insert_with(|| tag.clone());
        }
    }

    /// Whether consumption is currently being collected.
    pub(crate) fn is_tracking(&self) -> bool {
        self.frames
            .borrow()
            .last()
            .is_some_and(|frame| frame.tags.is_some())
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    pub(crate) fn clear(&self) {
        self.frames.borrow_mut().clear();
    }

    fn pop(&self) -> Vec<Tag> {
        self.frames
            .borrow_mut()
            .pop()
            .and_then(|frame| frame.tags)
            .map(|tags| tags.into_values().collect())
            .unwrap_or_default()
    }
}

/// Pops its frame when dropped.
pub(crate) struct FrameGuard<'a> {
    stack: &'a TrackingStack,
    depth: usize,
}

impl FrameGuard<'_> {
    /// Close the frame and return the tags it consumed, in consumption order.
    pub(crate) fn finish(self) -> Vec<Tag> {
        let tags = self.pop_own();
        std::mem::forget(self);
        tags
    }

    fn pop_own(&self) -> Vec<Tag> {
        // A runtime reset may already have cleared the stack.
        if self.stack.depth() != self.depth {
            debug_assert!(
                self.stack.depth() < self.depth,
                "tracking frames closed out of order"
            );
            return Vec::new();
        }
        self.stack.pop()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.pop_own();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Runtime;

    #[test]
    fn frames_collect_in_order_without_duplicates() {
        let rt = Runtime::new();
        let a = rt.create_tag();
        let b = rt.create_tag();
        let stack = TrackingStack::default();

        let frame = stack.enter(true);
        stack.consume(&b);
        stack.consume(&a);
        stack.consume(&b);
        stack.consume(&Tag::CONSTANT);
        let tags = frame.finish();

        assert_eq!(tags.len(), 2);
        assert!(tags[0].ptr_eq(&b));
        assert!(tags[1].ptr_eq(&a));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn consume_outside_frames_is_noop() {
        let rt = Runtime::new();
        let stack = TrackingStack::default();
        assert!(!stack.is_tracking());
        stack.consume(&rt.create_tag());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn untracked_frame_suspends_collection() {
        let rt = Runtime::new();
        let a = rt.create_tag();
        let b = rt.create_tag();
        let stack = TrackingStack::default();

        let outer = stack.enter(true);
        stack.consume(&a);
        {
            let _paused = stack.enter(false);
            assert!(!stack.is_tracking());
            stack.consume(&b);
        }
        assert!(stack.is_tracking());
        let tags = outer.finish();

        assert_eq!(tags.len(), 1);
        assert!(tags[0].ptr_eq(&a));
    }

    #[test]
    fn dropped_guard_pops_frame() {
        let stack = TrackingStack::default();
        {
            let _frame = stack.enter(true);
            assert_eq!(stack.depth(), 1);
        }
        assert_eq!(stack.depth(), 0);
    }
}
