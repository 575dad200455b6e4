//! # Block Reader
//!
//! Decodes items from a sequence of block views pulled on demand from a
//! [`BlockSource`]: a file (random access, never blocks) or a queue (FIFO,
//! may block until the producer appends or closes). The reader crosses block
//! boundaries transparently: an item whose bytes span several blocks is
//! reassembled by copying from consecutive views.
//!
//! ## Exhaustion vs. Corruption
//!
//! Running out of data at an item boundary is the expected end of stream and
//! reports `StreamExhausted`; callers that check `has_next()` first never see
//! it. Running out of data *inside* an item (a varint or length prefix
//! promised more bytes than the stream holds) is `MalformedEncoding` and is
//! fatal for the read. The distinction is made centrally here: the first byte
//! of a read may hit clean exhaustion, any later byte may not.
//!
//! ## Item Batches
//!
//! `get_item_batch::<T>(count)` advances the reader past the next `count`
//! items while recording the byte ranges it walked, and returns them as
//! fresh [`VirtualBlock`] views aliasing the same underlying blocks. The
//! slices start on an item boundary, so a downstream consumer (typically a
//! [`BlockQueue`](crate::storage::BlockQueue) feeding another worker) can
//! decode them without any context from this file.

use eyre::Result;

use crate::encoding::varint::MAX_VARINT_LEN;
use crate::encoding::{ItemReader, ItemSerialize};
use crate::error::DataError;
use crate::storage::VirtualBlock;

/// Supplier of consecutive block views.
///
/// `next_block` returns `None` at end of stream. A queue-backed source blocks
/// the calling thread while the queue is empty and not yet closed.
pub trait BlockSource<const B: usize> {
    fn next_block(&mut self) -> Option<VirtualBlock<B>>;
}

/// Sequential item decoder over a [`BlockSource`].
pub struct BlockReader<S: BlockSource<B>, const B: usize> {
    source: S,
    current: Option<VirtualBlock<B>>,
    pos: usize,
    capture: Option<BatchCapture<B>>,
}

/// Records the byte ranges walked during `get_item_batch`.
struct BatchCapture<const B: usize> {
    slices: Vec<VirtualBlock<B>>,
    seg_start: usize,
    seg_items: usize,
}

impl<const B: usize> BatchCapture<B> {
    fn new(seg_start: usize) -> Self {
        Self {
            slices: Vec::new(),
            seg_start,
            seg_items: 0,
        }
    }

    fn flush_segment(&mut self, view: &VirtualBlock<B>, end: usize) {
        if end > self.seg_start || self.seg_items > 0 {
            self.slices
                .push(view.sub_view(self.seg_start, end - self.seg_start, self.seg_items));
        }
        self.seg_start = end;
        self.seg_items = 0;
    }
}

impl<S: BlockSource<B>, const B: usize> BlockReader<S, B> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: None,
            pos: 0,
            capture: None,
        }
    }

    /// Starts from `view` at byte offset `pos` instead of the source's first
    /// block. Used by item-index seeking.
    pub(crate) fn with_position(source: S, view: VirtualBlock<B>, pos: usize) -> Self {
        Self {
            source,
            current: Some(view),
            pos,
            capture: None,
        }
    }

    /// Whether another byte is available. For a queue source this may block
    /// until the producer appends a block or closes the queue.
    pub fn has_next(&mut self) -> bool {
        self.ensure_current()
    }

    /// Decodes the next item via its serialization strategy.
    pub fn next<T: ItemSerialize>(&mut self) -> Result<T> {
        T::deserialize(self)
    }

    /// Decodes a fixed-width value written without a length prefix.
    pub fn get<T: ItemSerialize>(&mut self) -> Result<T> {
        debug_assert!(T::IS_FIXED_SIZE, "get requires a fixed-size type");
        T::deserialize(self)
    }

    /// Advances past the next item without materializing it.
    pub fn skip_item<T: ItemSerialize>(&mut self) -> Result<()> {
        T::skip(self)
    }

    /// Copies the next `n` bytes out of the stream.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_bytes_into(&mut buf)?;
        Ok(buf)
    }

    /// Decodes a varint-length-prefixed string.
    pub fn get_string(&mut self) -> Result<String> {
        String::deserialize(self)
    }

    /// Decodes a base-128 varint.
    pub fn get_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        let mut nbytes = 0;
        loop {
            let byte = self.read_byte().map_err(|e| {
                if nbytes == 0 {
                    e
                } else {
                    DataError::malformed("truncated varint").into()
                }
            })?;
            nbytes += 1;
            if nbytes > MAX_VARINT_LEN {
                return Err(DataError::malformed("varint exceeds 10 bytes").into());
            }
            if shift == 63 && byte > 1 {
                return Err(DataError::malformed("varint overflows u64").into());
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Slices the next `count` items into fresh block views.
    ///
    /// The reader advances past the sliced items; a count larger than the
    /// remaining item total yields the remainder, and exhaustion surfaces on
    /// the reads that follow. `count == 0` is valid anywhere, including end
    /// of stream, and yields an empty batch.
    pub fn get_item_batch<T: ItemSerialize>(
        &mut self,
        count: usize,
    ) -> Result<Vec<VirtualBlock<B>>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.capture = Some(BatchCapture::new(self.pos));
        for _ in 0..count {
            if !self.ensure_current() {
                break;
            }
            if let Some(cap) = self.capture.as_mut() {
                cap.seg_items += 1;
            }
            if let Err(e) = self.skip_item::<T>() {
                self.capture = None;
                return Err(e);
            }
        }
        let mut cap = self.capture.take().expect("batch capture active");
        if let Some(view) = self.current.as_ref() {
            cap.flush_segment(view, self.pos);
        }
        Ok(cap.slices)
    }

    fn read_byte(&mut self) -> Result<u8> {
        if !self.ensure_current() {
            return Err(DataError::StreamExhausted.into());
        }
        let view = self.current.as_ref().expect("ensure_current returned true");
        let byte = view.as_slice()[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Makes `current` hold an unread byte, pulling blocks as needed.
    /// Returns false at end of stream.
    fn ensure_current(&mut self) -> bool {
        loop {
            if let Some(view) = self.current.as_ref() {
                if self.pos < view.size() {
                    return true;
                }
                if let Some(cap) = self.capture.as_mut() {
                    cap.flush_segment(view, self.pos);
                }
            }
            match self.source.next_block() {
                Some(next) => {
                    self.current = Some(next);
                    self.pos = 0;
                    if let Some(cap) = self.capture.as_mut() {
                        cap.seg_start = 0;
                        cap.seg_items = 0;
                    }
                }
                None => {
                    self.current = None;
                    return false;
                }
            }
        }
    }
}

impl<S: BlockSource<B>, const B: usize> ItemReader for BlockReader<S, B> {
    fn read_bytes_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if !self.ensure_current() {
                return Err(if filled == 0 {
                    DataError::StreamExhausted.into()
                } else {
                    eyre::Report::from(DataError::malformed("item truncated at end of stream"))
                });
            }
            let view = self.current.as_ref().expect("ensure_current returned true");
            let take = (view.size() - self.pos).min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&view.as_slice()[self.pos..self.pos + take]);
            self.pos += take;
            filled += take;
        }
        Ok(())
    }

    fn get_varint(&mut self) -> Result<u64> {
        BlockReader::get_varint(self)
    }

    fn skip_bytes(&mut self, n: usize) -> Result<()> {
        let mut remaining = n;
        let mut advanced = false;
        while remaining > 0 {
            if !self.ensure_current() {
                return Err(if advanced {
                    eyre::Report::from(DataError::malformed("item truncated at end of stream"))
                } else {
                    DataError::StreamExhausted.into()
                });
            }
            let view = self.current.as_ref().expect("ensure_current returned true");
            let take = (view.size() - self.pos).min(remaining);
            self.pos += take;
            remaining -= take;
            advanced = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::writer::{BlockSink, BlockWriter};

    struct VecSource<const B: usize>(std::vec::IntoIter<VirtualBlock<B>>);

    impl<const B: usize> BlockSource<B> for VecSource<B> {
        fn next_block(&mut self) -> Option<VirtualBlock<B>> {
            self.0.next()
        }
    }

    #[derive(Default)]
    struct CollectSink<const B: usize> {
        blocks: Vec<VirtualBlock<B>>,
    }

    impl<const B: usize> BlockSink<B> for CollectSink<B> {
        fn append_block(&mut self, block: VirtualBlock<B>) -> Result<()> {
            self.blocks.push(block);
            Ok(())
        }

        fn close_sink(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn write_blocks<const B: usize>(
        fill: impl FnOnce(&mut BlockWriter<CollectSink<B>, B>),
    ) -> Vec<VirtualBlock<B>> {
        let mut w = BlockWriter::<_, B>::new(CollectSink::default());
        fill(&mut w);
        w.close().unwrap();
        w.sink().blocks.clone()
    }

    fn reader_over<const B: usize>(
        blocks: Vec<VirtualBlock<B>>,
    ) -> BlockReader<VecSource<B>, B> {
        BlockReader::new(VecSource(blocks.into_iter()))
    }

    #[test]
    fn reads_cross_block_boundaries() {
        let blocks = write_blocks::<4>(|w| {
            w.mark_item().unwrap();
            w.append(b"hello world").unwrap();
        });
        assert_eq!(blocks.len(), 3);

        let mut r = reader_over(blocks);
        assert_eq!(r.read_bytes(11).unwrap(), b"hello world");
        assert!(!r.has_next());
    }

    #[test]
    fn mixed_items_roundtrip() {
        let blocks = write_blocks::<16>(|w| {
            w.write_item(&123456u32).unwrap();
            w.write_item(&String::from("test1test2test3")).unwrap();
            w.write_item(&(7u16, String::from("pair"))).unwrap();
        });

        let mut r = reader_over(blocks);
        assert_eq!(r.next::<u32>().unwrap(), 123456);
        assert_eq!(r.next::<String>().unwrap(), "test1test2test3");
        assert_eq!(r.next::<(u16, String)>().unwrap(), (7, "pair".into()));
        assert!(!r.has_next());
    }

    #[test]
    fn exhaustion_at_item_boundary() {
        let blocks = write_blocks::<16>(|w| {
            w.write_item(&1u16).unwrap();
        });

        let mut r = reader_over(blocks);
        r.next::<u16>().unwrap();
        let err = r.next::<u16>().unwrap_err();
        assert!(err.downcast_ref::<DataError>().unwrap().is_exhausted());
    }

    #[test]
    fn truncation_mid_item_is_malformed() {
        // hand-build a stream whose last item is cut short: a length prefix
        // of 8 followed by only 3 payload bytes
        let blocks = write_blocks::<16>(|w| {
            w.mark_item().unwrap();
            w.put_varint(8).unwrap();
            w.append(b"abc").unwrap();
        });

        let mut r = reader_over(blocks);
        let err = r.get_string().unwrap_err();
        assert!(err.downcast_ref::<DataError>().unwrap().is_malformed());
    }

    #[test]
    fn varint_reassembled_across_blocks() {
        let blocks = write_blocks::<4>(|w| {
            w.mark_item().unwrap();
            w.append(&[0u8; 3]).unwrap();
            w.mark_item().unwrap();
            w.put_varint(123456).unwrap();
        });

        let mut r = reader_over(blocks);
        r.read_bytes(3).unwrap();
        assert_eq!(r.get_varint().unwrap(), 123456);
    }

    #[test]
    fn batch_slices_cover_exact_item_ranges() {
        let blocks = write_blocks::<8>(|w| {
            for i in 0..20u64 {
                w.write_item(&i).unwrap();
            }
        });

        let mut r = reader_over(blocks);
        r.skip_item::<u64>().unwrap();
        let batch = r.get_item_batch::<u64>(5).unwrap();

        // items 1..=5 live in the slices; decode them back
        assert_eq!(batch.iter().map(VirtualBlock::num_items).sum::<usize>(), 5);
        assert_eq!(batch.iter().map(VirtualBlock::size).sum::<usize>(), 5 * 8);
        let mut br = reader_over(batch);
        for expect in 1..6u64 {
            assert!(br.has_next());
            assert_eq!(br.next::<u64>().unwrap(), expect);
        }
        assert!(!br.has_next());

        // the original reader continues at item 6
        assert_eq!(r.next::<u64>().unwrap(), 6);
    }

    #[test]
    fn empty_batch_is_valid_at_end_of_stream() {
        let blocks = write_blocks::<8>(|w| {
            w.write_item(&1u64).unwrap();
        });

        let mut r = reader_over(blocks);
        r.next::<u64>().unwrap();
        assert!(r.get_item_batch::<u64>(0).unwrap().is_empty());
    }

    #[test]
    fn oversized_batch_clamps_to_remainder() {
        let blocks = write_blocks::<8>(|w| {
            for i in 0..3u64 {
                w.write_item(&i).unwrap();
            }
        });

        let mut r = reader_over(blocks);
        let batch = r.get_item_batch::<u64>(100).unwrap();
        assert_eq!(batch.iter().map(VirtualBlock::num_items).sum::<usize>(), 3);
        assert!(!r.has_next());
        assert!(r
            .next::<u64>()
            .unwrap_err()
            .downcast_ref::<DataError>()
            .unwrap()
            .is_exhausted());
    }

    #[test]
    fn batch_of_variable_size_items() {
        let blocks = write_blocks::<16>(|w| {
            for i in 0..8usize {
                w.write_item(&"x".repeat(i + 1)).unwrap();
            }
        });

        let mut r = reader_over(blocks);
        let batch = r.get_item_batch::<String>(4).unwrap();
        let mut br = reader_over(batch);
        for i in 0..4usize {
            assert_eq!(br.next::<String>().unwrap(), "x".repeat(i + 1));
        }
        assert!(!br.has_next());
        assert_eq!(r.next::<String>().unwrap(), "x".repeat(5));
    }
}
