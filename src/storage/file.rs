//! # Block File
//!
//! A `File` is a sealed, multiply-readable, in-memory sequence of block
//! views with an item-count index. It is the materialization target for
//! operator output: grown only through its single writer, sealed when that
//! writer closes, and from then on immutable: any number of readers can
//! walk it concurrently because the underlying blocks never change.
//!
//! ## Item Index
//!
//! Alongside the views, the file keeps the running number of items that
//! start before each block (a prefix sum maintained on append). Seeking to
//! logical item `i` is a binary search over that index followed by typed
//! skipping within one block, proportional to the items skipped inside the
//! landing block rather than to the file size.
//!
//! ## Handles
//!
//! `File` is a cheap cloneable handle over shared interior state
//! (`Arc<RwLock<..>>`), the same shape the pager's cache uses: the writer,
//! every reader, and the owning operator node all hold the same file. A
//! consuming reader (`get_reader(true)`) releases the file's own view of
//! each block once fully read, so memory is returned as the last downstream
//! consumer moves past it.

use std::fmt;
use std::sync::Arc;

use eyre::{ensure, Result};
use parking_lot::RwLock;
use tracing::trace;

use crate::encoding::ItemSerialize;
use crate::error::DataError;
use crate::storage::reader::{BlockReader, BlockSource};
use crate::storage::writer::{BlockSink, BlockWriter};
use crate::storage::VirtualBlock;

/// Reader over a file's blocks.
pub type FileReader<const B: usize> = BlockReader<FileBlockSource<B>, B>;

/// Writer that materializes into a file.
pub type FileWriter<const B: usize> = BlockWriter<FileSink<B>, B>;

/// Sealed, seekable, shared sequence of block views.
#[derive(Clone, Default)]
pub struct File<const B: usize> {
    inner: Arc<RwLock<FileInner<B>>>,
}

struct FileInner<const B: usize> {
    /// `None` marks a view released by a consuming reader.
    blocks: Vec<Option<VirtualBlock<B>>>,
    /// Items starting before block `k`; maintained as a prefix sum.
    item_offsets: Vec<usize>,
    num_items: usize,
    total_bytes: usize,
    sealed: bool,
}

impl<const B: usize> Default for FileInner<B> {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            item_offsets: Vec::new(),
            num_items: 0,
            total_bytes: 0,
            sealed: false,
        }
    }
}

impl<const B: usize> File<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_blocks(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn num_items(&self) -> usize {
        self.inner.read().num_items
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.read().total_bytes
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.read().sealed
    }

    /// The `i`-th block view, `None` if out of range or already released by
    /// a consuming reader.
    pub fn virtual_block(&self, i: usize) -> Option<VirtualBlock<B>> {
        self.inner.read().blocks.get(i).cloned().flatten()
    }

    /// Binds a writer to this file. The file seals when the writer closes;
    /// requesting a writer on a sealed file is a usage violation.
    pub fn get_writer(&self) -> Result<FileWriter<B>> {
        ensure!(
            !self.inner.read().sealed,
            DataError::usage("writer requested on a sealed file")
        );
        Ok(BlockWriter::new(FileSink {
            inner: Arc::clone(&self.inner),
        }))
    }

    /// An independent reader starting at item 0.
    ///
    /// With `consume == true` the file drops its own reference to each block
    /// once the reader moves past it, trading re-readability for memory.
    pub fn get_reader(&self, consume: bool) -> FileReader<B> {
        BlockReader::new(FileBlockSource {
            inner: Arc::clone(&self.inner),
            next_idx: 0,
            consume,
        })
    }

    /// A reader positioned exactly at logical item `index` (of type `T`).
    ///
    /// Valid for `0 <= index <= num_items()`; seeking to `num_items()`
    /// yields a reader at end of file.
    pub fn get_reader_at<T: ItemSerialize>(&self, index: usize) -> Result<FileReader<B>> {
        let (view, block_idx, skip) = {
            let inner = self.inner.read();
            ensure!(
                index <= inner.num_items,
                DataError::usage(format!(
                    "seek to item {} beyond file end ({} items)",
                    index, inner.num_items
                ))
            );
            if index == inner.num_items {
                return Ok(BlockReader::new(FileBlockSource {
                    inner: Arc::clone(&self.inner),
                    next_idx: inner.blocks.len(),
                    consume: false,
                }));
            }

            // last block whose first item index is <= index; the partition
            // bound also guarantees index falls within that block's items
            let block_idx = inner.item_offsets.partition_point(|&off| off <= index) - 1;
            let view = inner.blocks[block_idx].clone().ok_or_else(|| {
                DataError::usage(format!("seek into released block {}", block_idx))
            })?;
            (view, block_idx, index - inner.item_offsets[block_idx])
        };

        let first_item = view
            .block()
            .first_item()
            .ok_or_else(|| DataError::malformed("indexed block has no item boundary"))?;
        let mut reader = BlockReader::with_position(
            FileBlockSource {
                inner: Arc::clone(&self.inner),
                next_idx: block_idx + 1,
                consume: false,
            },
            view,
            first_item as usize,
        );
        for _ in 0..skip {
            reader.skip_item::<T>()?;
        }
        Ok(reader)
    }
}

impl<const B: usize> fmt::Debug for File<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("File")
            .field("num_blocks", &inner.blocks.len())
            .field("num_items", &inner.num_items)
            .field("total_bytes", &inner.total_bytes)
            .field("sealed", &inner.sealed)
            .finish()
    }
}

/// Sink side of [`File::get_writer`].
pub struct FileSink<const B: usize> {
    inner: Arc<RwLock<FileInner<B>>>,
}

impl<const B: usize> BlockSink<B> for FileSink<B> {
    fn append_block(&mut self, block: VirtualBlock<B>) -> Result<()> {
        let mut inner = self.inner.write();
        ensure!(
            !inner.sealed,
            DataError::usage("append to a sealed file")
        );
        let items_before = inner.num_items;
        inner.item_offsets.push(items_before);
        inner.num_items += block.num_items();
        inner.total_bytes += block.size();
        inner.blocks.push(Some(block));
        Ok(())
    }

    fn close_sink(&mut self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.sealed = true;
        trace!(
            num_blocks = inner.blocks.len(),
            num_items = inner.num_items,
            total_bytes = inner.total_bytes,
            "file sealed"
        );
        Ok(())
    }
}

/// Source side of [`File::get_reader`]. Never blocks; all blocks are already
/// materialized.
pub struct FileBlockSource<const B: usize> {
    inner: Arc<RwLock<FileInner<B>>>,
    next_idx: usize,
    consume: bool,
}

impl<const B: usize> BlockSource<B> for FileBlockSource<B> {
    fn next_block(&mut self) -> Option<VirtualBlock<B>> {
        let mut inner = self.inner.write();
        let slot = inner.blocks.get_mut(self.next_idx)?;
        let view = if self.consume { slot.take() } else { slot.clone() };
        self.next_idx += 1;
        view
    }
}
