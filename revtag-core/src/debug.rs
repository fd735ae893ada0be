//! Tracking Transactions
//!
//! Development-only detection of write-after-read hazards. A tracking
//! transaction marks one synchronous evaluation pass. Every tag read during
//! the pass is recorded, and dirtying a recorded tag before the pass ends is
//! reported as [`TagError::ConsumedBeforeDirtied`]: whatever read the tag has
//! already produced output from a value that is now stale.
//!
//! This module is compiled only with `debug_assertions`.

use std::cell::{Cell, RefCell};

use indexmap::IndexSet;

use crate::error::{Result, TagError};
use crate::tag::{Tag, TagId};

/// Transaction state for one runtime.
#[derive(Debug, Default)]
pub(crate) struct Transactions {
    depth: Cell<usize>,
    label: RefCell<Option<String>>,
    consumed: RefCell<IndexSet<TagId>>,
}

impl Transactions {
    /// Open a transaction. Nested transactions join the outermost one.
    pub(crate) fn begin(&self, label: Option<&str>) -> TransactionGuard<'_> {
        if self.depth.get() == 0 {
            *self.label.borrow_mut() = label.map(str::to_owned);
            self.consumed.borrow_mut().clear();
            tracing::debug!(label = label.unwrap_or("<anonymous>"), "tracking transaction started");
        }
        self.depth.set(self.depth.get() + 1);
        TransactionGuard { transactions: self }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.depth.get() > 0
    }

    /// Returns whether `tag` was newly recorded.
    pub(crate) fn mark_consumed(&self, tag: TagId) -> bool {
        self.is_active() && self.consumed.borrow_mut().insert(tag)
    }

    /// Record `tag` and every tag it currently depends on as read.
    ///
    /// Tags already in the set are not walked again, which also stops the
    /// walk on cyclic graphs.
    pub(crate) fn mark_tag_consumed(&self, tag: &Tag) {
        if !self.is_active() {
            return;
        }

        let mut pending = vec![tag.clone()];
        while let Some(tag) = pending.pop() {
            let Some(id) = tag.id() else {
                continue;
            };
            if !self.mark_consumed(id) {
                continue;
            }
            match &tag {
                Tag::Combinator(inner) => pending.extend(inner.children().iter().cloned()),
                Tag::Updatable(inner) => pending.extend(inner.subtag()),
                _ => {}
            }
        }
    }

    pub(crate) fn is_consumed(&self, tag: TagId) -> bool {
        self.consumed.borrow().contains(&tag)
    }

    /// Fail if `tag` was read in the active transaction.
    pub(crate) fn assert_not_consumed(&self, tag: TagId) -> Result<()> {
        if self.is_active() && self.is_consumed(tag) {
            return Err(TagError::ConsumedBeforeDirtied {
                tag,
                transaction: self.label.borrow().clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn reset(&self) {
        self.depth.set(0);
        self.label.borrow_mut().take();
        self.consumed.borrow_mut().clear();
    }

    fn end(&self) {
        // Already torn down by a runtime reset.
        let Some(depth) = self.depth.get().checked_sub(1) else {
            return;
        };
        self.depth.set(depth);
        if depth == 0 {
            tracing::debug!(consumed = self.consumed.borrow().len(), "tracking transaction finished");
            self.label.borrow_mut().take();
            self.consumed.borrow_mut().clear();
        }
    }
}

/// Ends its transaction when dropped.
pub(crate) struct TransactionGuard<'a> {
    transactions: &'a Transactions,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        self.transactions.end();
    }
}
