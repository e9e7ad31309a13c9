//! Ambient evaluation context.
//!
//! The context tracks "whoever is currently computing". When a cell is read
//! while a frame is active, the cell is recorded into the frame; the derived
//! cell that opened the frame later turns the recorded reads into its
//! dependency set.
//!
//! # Implementation
//!
//! A thread-local stack of frames, entered through a scoped guard. The guard
//! pops its frame on drop, so the stack stays balanced even when evaluation
//! panics. Nesting works naturally: a derived cell evaluated inside another
//! derived cell's expression records its reads into its own frame only.

use std::cell::RefCell;

use crate::ident::CellId;

use super::signal::Signal;

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// One evaluation frame: the cell being computed and the cells it has read.
struct Frame {
    subscriber: CellId,
    reads: Vec<Signal>,
}

/// Guard for an active evaluation frame. Popped on drop.
pub struct EvalScope {
    subscriber: CellId,
}

impl EvalScope {
    /// Open a frame for the given subscriber.
    pub(crate) fn enter(subscriber: CellId) -> Self {
        FRAMES.with(|frames| {
            frames.borrow_mut().push(Frame {
                subscriber,
                reads: Vec::new(),
            });
        });
        Self { subscriber }
    }

    /// Is any frame active on this thread?
    pub fn is_active() -> bool {
        FRAMES.with(|frames| !frames.borrow().is_empty())
    }

    /// The cell currently computing, if any.
    pub fn current_subscriber() -> Option<CellId> {
        FRAMES.with(|frames| frames.borrow().last().map(|f| f.subscriber))
    }

    /// Record a read into the active frame.
    ///
    /// Recording is idempotent per frame, and a cell reading its own value
    /// during its own evaluation is not recorded as a dependency.
    pub(crate) fn track_read(cell: &Signal) {
        FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let Some(frame) = frames.last_mut() else {
                return;
            };
            if frame.subscriber == cell.id() {
                return;
            }
            if frame.reads.iter().any(|read| read.id() == cell.id()) {
                return;
            }
            frame.reads.push(cell.clone());
        });
    }

    /// The cells read so far in this frame.
    pub(crate) fn captured(&self) -> Vec<Signal> {
        FRAMES.with(|frames| {
            frames
                .borrow()
                .last()
                .map(|frame| frame.reads.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for EvalScope {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            let popped = frames.borrow_mut().pop();
            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.subscriber, self.subscriber,
                    "evaluation frames popped out of order"
                );
            }
        });
    }
}
