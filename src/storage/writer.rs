//! # Block Writer
//!
//! Serializes items into a rolling sequence of fixed-capacity blocks and
//! hands each sealed block to a sink (a file or a queue). The writer owns a
//! single in-progress buffer; appends that overrun the capacity spill into
//! fresh buffers transparently, so one item's bytes may span any number of
//! consecutive blocks.
//!
//! ## Item Boundary Tracking
//!
//! `mark_item()` records that the next byte written begins a new item. The
//! first mark in each block becomes that block's `first_item` offset, and the
//! per-block mark count becomes the sealed view's `num_items`. Items that
//! merely continue into a block contribute nothing to either.
//!
//! ## Closing
//!
//! `close()` seals the partial trailing block, tells the sink that no more
//! blocks follow, and makes every further write a usage violation. Dropping
//! an unclosed writer closes it; a sink failure at that point is logged and
//! swallowed, so explicit `close()` is preferred wherever the error matters.

use eyre::Result;
use tracing::{trace, warn};

use crate::encoding::varint::{encode_varint, MAX_VARINT_LEN};
use crate::encoding::{ItemSerialize, ItemWriter};
use crate::error::DataError;
use crate::storage::{Block, VirtualBlock};
use std::sync::Arc;

/// Destination for sealed blocks.
pub trait BlockSink<const B: usize> {
    fn append_block(&mut self, block: VirtualBlock<B>) -> Result<()>;

    /// Called exactly once, after the final block.
    fn close_sink(&mut self) -> Result<()>;
}

/// Serializes items into fixed-capacity blocks delivered to `S`.
pub struct BlockWriter<S: BlockSink<B>, const B: usize> {
    sink: S,
    buffer: Box<[u8; B]>,
    pos: usize,
    first_item: Option<u32>,
    num_items: usize,
    closed: bool,
}

impl<S: BlockSink<B>, const B: usize> std::fmt::Debug for BlockWriter<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockWriter")
            .field("pos", &self.pos)
            .field("first_item", &self.first_item)
            .field("num_items", &self.num_items)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<S: BlockSink<B>, const B: usize> BlockWriter<S, B> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            buffer: Box::new([0u8; B]),
            pos: 0,
            first_item: None,
            num_items: 0,
            closed: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Records that the next byte written starts a new item.
    pub fn mark_item(&mut self) -> Result<()> {
        self.check_open()?;
        if self.first_item.is_none() {
            self.first_item = Some(self.pos as u32);
        }
        self.num_items += 1;
        Ok(())
    }

    /// Appends raw bytes, sealing blocks as the buffer fills.
    pub fn append(&mut self, mut bytes: &[u8]) -> Result<()> {
        self.check_open()?;
        while !bytes.is_empty() {
            let room = B - self.pos;
            let take = room.min(bytes.len());
            self.buffer[self.pos..self.pos + take].copy_from_slice(&bytes[..take]);
            self.pos += take;
            bytes = &bytes[take..];
            if self.pos == B {
                self.seal_block()?;
            }
        }
        Ok(())
    }

    pub fn put_varint(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_varint(value, &mut buf);
        self.append(&buf[..len])
    }

    /// Appends a varint length prefix followed by the string bytes.
    pub fn put_string(&mut self, value: &str) -> Result<()> {
        self.put_varint(value.len() as u64)?;
        self.append(value.as_bytes())
    }

    /// Serializes one value without marking an item boundary.
    pub fn put<T: ItemSerialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    /// Writes one complete item: boundary mark plus serialized value.
    pub fn write_item<T: ItemSerialize>(&mut self, value: &T) -> Result<()> {
        self.mark_item()?;
        value.serialize(self)
    }

    /// Seals the trailing block and closes the sink. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.pos > 0 || self.first_item.is_some() {
            self.seal_partial()?;
        }
        self.closed = true;
        trace!("block writer closed");
        self.sink.close_sink()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(DataError::usage("write through a closed block writer").into());
        }
        Ok(())
    }

    fn seal_block(&mut self) -> Result<()> {
        debug_assert_eq!(self.pos, B);
        self.seal_partial()
    }

    fn seal_partial(&mut self) -> Result<()> {
        let block = Arc::new(Block::new(*self.buffer, self.first_item));
        let view = VirtualBlock::new(block, 0, self.pos, self.num_items);
        trace!(len = self.pos, num_items = self.num_items, "sealed block");
        self.pos = 0;
        self.first_item = None;
        self.num_items = 0;
        self.sink.append_block(view)
    }
}

impl<S: BlockSink<B>, const B: usize> ItemWriter for BlockWriter<S, B> {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        BlockWriter::append(self, bytes)
    }

    fn put_varint(&mut self, value: u64) -> Result<()> {
        BlockWriter::put_varint(self, value)
    }
}

impl<S: BlockSink<B>, const B: usize> Drop for BlockWriter<S, B> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("failed to close block writer on drop: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectSink<const B: usize> {
        blocks: Vec<VirtualBlock<B>>,
        closed: bool,
    }

    impl<const B: usize> BlockSink<B> for CollectSink<B> {
        fn append_block(&mut self, block: VirtualBlock<B>) -> Result<()> {
            self.blocks.push(block);
            Ok(())
        }

        fn close_sink(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn append_seals_full_blocks() {
        let mut w = BlockWriter::<_, 8>::new(CollectSink::default());
        w.mark_item().unwrap();
        w.append(&[1u8; 20]).unwrap();
        w.close().unwrap();

        let sink = w.sink();
        assert!(sink.closed);
        assert_eq!(sink.blocks.len(), 3);
        assert_eq!(sink.blocks[0].size(), 8);
        assert_eq!(sink.blocks[1].size(), 8);
        assert_eq!(sink.blocks[2].size(), 4);
    }

    #[test]
    fn first_item_follows_the_marks() {
        let mut w = BlockWriter::<_, 8>::new(CollectSink::default());
        // item 0: 6 bytes starting at offset 0
        w.mark_item().unwrap();
        w.append(&[0xAA; 6]).unwrap();
        // item 1: 12 bytes starting at offset 6, running through block 1
        w.mark_item().unwrap();
        w.append(&[0xBB; 12]).unwrap();
        // item 2: starts at offset 2 of block 2
        w.mark_item().unwrap();
        w.append(&[0xCC; 2]).unwrap();
        w.close().unwrap();

        let blocks = &w.sink().blocks;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].block().first_item(), Some(0));
        assert_eq!(blocks[0].num_items(), 2);
        assert_eq!(blocks[1].block().first_item(), None);
        assert_eq!(blocks[1].num_items(), 0);
        assert_eq!(blocks[2].block().first_item(), Some(2));
        assert_eq!(blocks[2].num_items(), 1);
    }

    #[test]
    fn exact_fill_starts_a_fresh_block() {
        let mut w = BlockWriter::<_, 8>::new(CollectSink::default());
        w.mark_item().unwrap();
        w.append(&[1u8; 8]).unwrap();
        // the mark lands at offset 0 of the next block, not offset 8
        w.mark_item().unwrap();
        w.append(&[2u8; 4]).unwrap();
        w.close().unwrap();

        let blocks = &w.sink().blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].block().first_item(), Some(0));
    }

    #[test]
    fn close_is_idempotent_and_seals_partial() {
        let mut w = BlockWriter::<_, 16>::new(CollectSink::default());
        w.write_item(&42u16).unwrap();
        w.close().unwrap();
        w.close().unwrap();

        assert_eq!(w.sink().blocks.len(), 1);
        assert_eq!(w.sink().blocks[0].size(), 2);
        assert_eq!(w.sink().blocks[0].as_slice(), &[0x2A, 0x00]);
    }

    #[test]
    fn empty_writer_produces_no_blocks() {
        let mut w = BlockWriter::<_, 16>::new(CollectSink::default());
        w.close().unwrap();
        assert!(w.sink().blocks.is_empty());
        assert!(w.sink().closed);
    }

    #[test]
    fn write_after_close_is_a_usage_violation() {
        let mut w = BlockWriter::<_, 16>::new(CollectSink::default());
        w.close().unwrap();

        let err = w.append(b"late").unwrap_err();
        assert!(err
            .downcast_ref::<DataError>()
            .unwrap()
            .is_usage_violation());
        assert!(w.mark_item().is_err());
        assert!(w.put_varint(1).is_err());
    }

    #[test]
    fn varint_spans_block_boundary() {
        let mut w = BlockWriter::<_, 4>::new(CollectSink::default());
        w.mark_item().unwrap();
        w.append(&[0u8; 3]).unwrap();
        w.mark_item().unwrap();
        w.put_varint(123456).unwrap();
        w.close().unwrap();

        let blocks = &w.sink().blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].as_slice(), &[0, 0, 0, 0xC0]);
        assert_eq!(blocks[1].as_slice(), &[0xC4, 0x07]);
        assert_eq!(blocks[0].block().first_item(), Some(0));
        assert_eq!(blocks[1].block().first_item(), None);
    }
}
