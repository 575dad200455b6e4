//! # Storage Module
//!
//! The block-chunked storage engine: every byte an operator produces flows
//! through a [`BlockWriter`] into fixed-capacity immutable [`Block`]s, and
//! every byte an operator consumes comes back out through a [`BlockReader`].
//! Two containers sit between the ends:
//!
//! - [`File`]: sealed, seekable, re-readable; the materialization target
//!   for operator output that downstream stages replay.
//! - [`BlockQueue`]: blocking, single-pass FIFO; the pipelining channel for
//!   streamed slices.
//!
//! ## Architecture Overview
//!
//! ```text
//!  put/write_item            append_block              next_block
//! ┌──────────────┐  sealed  ┌──────────────────┐ views ┌──────────────┐
//! │  BlockWriter ├─────────>│ File │ BlockQueue├──────>│ BlockReader  │
//! └──────────────┘  blocks  └──────────────────┘       └──────────────┘
//!         │                         │                         │
//!         └─── serialization ───────┴──────── strategy ───────┘
//!                       (encoding::ItemSerialize)
//! ```
//!
//! Blocks are immutable once sealed and shared by reference; a
//! [`VirtualBlock`] is a `(block, offset, len)` view and the unit exchanged
//! between components. Items may span any number of blocks, so readers
//! reassemble across boundaries and each block records where its first
//! complete item starts.
//!
//! ## Block Size
//!
//! The capacity is a const generic on every type; [`DEFAULT_BLOCK_SIZE`]
//! (2 MiB) is the production default, chosen so a block amortizes network
//! round-trips when shipped between workers. Tests use tiny blocks to force
//! boundary crossings.
//!
//! ## Thread Safety
//!
//! Sealed blocks are immutable and freely shared across threads. A file's
//! interior is behind an `RwLock`; readers never block on each other. The
//! queue reader is the single blocking point in the crate (see [`queue`]).

pub mod block;
pub mod file;
pub mod queue;
pub mod reader;
pub mod writer;

pub use block::{Block, VirtualBlock};
pub use file::{File, FileBlockSource, FileReader, FileSink, FileWriter};
pub use queue::{BlockQueue, QueueBlockSource, QueueReader};
pub use reader::{BlockReader, BlockSource};
pub use writer::{BlockSink, BlockWriter};

/// Production block capacity in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 2 * 1024 * 1024;
