//! # Block Queue
//!
//! A single-pass, blocking FIFO of block views for pipelined streaming
//! consumption. Where a [`File`](crate::storage::File) materializes and can
//! be re-read, a queue hands each block to exactly one logical consumer and
//! forgets it, the shape used when an upstream worker streams a slice of
//! its output (see `get_item_batch`) straight into a downstream operator.
//!
//! ## Blocking Contract
//!
//! The consumer's reader blocks while the queue is empty and not yet closed,
//! and wakes exactly when a block is appended or the producer calls
//! `close()`. After close-and-drain the reader reports a clean end of
//! stream. This is the only suspension point in the storage layer.
//!
//! Designed for one producer and one logical consumer; the handle is
//! cloneable so the two sides can live on different threads.

use std::collections::VecDeque;
use std::sync::Arc;

use eyre::{ensure, Result};
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::storage::reader::{BlockReader, BlockSource};
use crate::storage::VirtualBlock;

/// Reader over a queue's blocks; blocks the calling thread on an empty,
/// unclosed queue.
pub type QueueReader<const B: usize> = BlockReader<QueueBlockSource<B>, B>;

/// Blocking FIFO of block views with a one-way close.
#[derive(Clone)]
pub struct BlockQueue<const B: usize> {
    inner: Arc<QueueInner<B>>,
}

struct QueueInner<const B: usize> {
    state: Mutex<QueueState<B>>,
    ready: Condvar,
}

struct QueueState<const B: usize> {
    blocks: VecDeque<VirtualBlock<B>>,
    closed: bool,
}

impl<const B: usize> Default for BlockQueue<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const B: usize> BlockQueue<B> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    blocks: VecDeque::new(),
                    closed: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Appends one block view. Appending after `close()` is a usage
    /// violation.
    pub fn append_block(&self, block: VirtualBlock<B>) -> Result<()> {
        let mut state = self.inner.state.lock();
        ensure!(
            !state.closed,
            crate::error::DataError::usage("append on a closed block queue")
        );
        state.blocks.push_back(block);
        self.inner.ready.notify_one();
        Ok(())
    }

    /// Signals end of stream. One-way; calling it again is a no-op.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if !state.closed {
            state.closed = true;
            trace!(pending = state.blocks.len(), "block queue closed");
            self.inner.ready.notify_all();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// The consuming reader. Each block is delivered at most once.
    pub fn get_reader(&self) -> QueueReader<B> {
        BlockReader::new(QueueBlockSource {
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Source side of [`BlockQueue::get_reader`].
pub struct QueueBlockSource<const B: usize> {
    inner: Arc<QueueInner<B>>,
}

impl<const B: usize> BlockSource<B> for QueueBlockSource<B> {
    fn next_block(&mut self) -> Option<VirtualBlock<B>> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(view) = state.blocks.pop_front() {
                return Some(view);
            }
            if state.closed {
                return None;
            }
            self.inner.ready.wait(&mut state);
        }
    }
}
