//! # Blocks and Block Views
//!
//! The atomic unit of storage and transfer is the [`Block`]: a fixed-capacity
//! byte buffer that is immutable once sealed by a writer. Blocks are shared
//! by reference (`Arc`) among every view that aliases them: a file keeps one
//! view per block, a queue hands views downstream, and an item-batch slice
//! creates fresh views onto the same underlying bytes. A block is freed when
//! the last view drops.
//!
//! ## Item Boundaries
//!
//! Items may span block boundaries, so a block cannot be decoded in
//! isolation. Each block records the byte offset of the first item that
//! *starts* inside it (`first_item`), or `None` when every byte continues an
//! item that began in an earlier block. Seeking by item index lands on a
//! block and starts decoding at that offset.
//!
//! ## Views
//!
//! [`VirtualBlock`] is a cheap `(block, start, len, num_items)` view. Many
//! views may alias one block; none can mutate it. `num_items` counts the
//! items that start within the viewed range, which keeps the file's
//! item-count index exact even for partial slices.
//!
//! The capacity is a const generic `B` so that a deployment's block size is
//! fixed at compile time; tests use tiny blocks (16 or 53 bytes) to force
//! items across boundaries.

use std::fmt;
use std::sync::Arc;

/// A sealed, fixed-capacity, immutable byte buffer.
pub struct Block<const B: usize> {
    data: [u8; B],
    first_item: Option<u32>,
}

impl<const B: usize> Block<B> {
    /// Seals `data` into an immutable block.
    ///
    /// `first_item` is the offset of the first item starting inside this
    /// block, `None` if every byte belongs to an item begun earlier.
    pub fn new(data: [u8; B], first_item: Option<u32>) -> Self {
        debug_assert!(first_item.is_none_or(|off| (off as usize) <= B));
        Self { data, first_item }
    }

    pub const fn capacity() -> usize {
        B
    }

    pub fn data(&self) -> &[u8; B] {
        &self.data
    }

    pub fn first_item(&self) -> Option<u32> {
        self.first_item
    }
}

impl<const B: usize> fmt::Debug for Block<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("capacity", &B)
            .field("first_item", &self.first_item)
            .finish()
    }
}

/// A view onto a shared [`Block`]: byte range plus the number of items that
/// start within it.
#[derive(Clone)]
pub struct VirtualBlock<const B: usize> {
    block: Arc<Block<B>>,
    start: usize,
    len: usize,
    num_items: usize,
}

impl<const B: usize> VirtualBlock<B> {
    pub fn new(block: Arc<Block<B>>, start: usize, len: usize, num_items: usize) -> Self {
        debug_assert!(start + len <= B, "view [{}, {}) exceeds capacity {}", start, start + len, B);
        Self {
            block,
            start,
            len,
            num_items,
        }
    }

    pub fn block(&self) -> &Arc<Block<B>> {
        &self.block
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of viewed bytes.
    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Items starting within this view.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.block.data[self.start..self.start + self.len]
    }

    /// A narrower view `[start, start + len)` relative to this view's range.
    pub fn sub_view(&self, start: usize, len: usize, num_items: usize) -> Self {
        debug_assert!(start + len <= self.len);
        Self::new(Arc::clone(&self.block), self.start + start, len, num_items)
    }
}

impl<const B: usize> fmt::Debug for VirtualBlock<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualBlock")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("num_items", &self.num_items)
            .field("refs", &Arc::strong_count(&self.block))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_records_first_item_offset() {
        let block = Block::<16>::new([0u8; 16], Some(11));
        assert_eq!(block.first_item(), Some(11));
        assert_eq!(Block::<16>::capacity(), 16);
    }

    #[test]
    fn continuation_block_has_no_first_item() {
        let block = Block::<16>::new([0xAA; 16], None);
        assert_eq!(block.first_item(), None);
    }

    #[test]
    fn view_exposes_byte_range() {
        let mut data = [0u8; 16];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        let block = Arc::new(Block::<16>::new(data, Some(0)));
        let vb = VirtualBlock::new(block, 4, 8, 2);

        assert_eq!(vb.size(), 8);
        assert_eq!(vb.num_items(), 2);
        assert_eq!(vb.as_slice(), &[4, 5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn views_share_one_block() {
        let block = Arc::new(Block::<16>::new([7u8; 16], Some(0)));
        let a = VirtualBlock::new(Arc::clone(&block), 0, 16, 1);
        let b = a.sub_view(8, 8, 0);

        assert_eq!(Arc::strong_count(&block), 3);
        assert_eq!(b.as_slice(), &[7u8; 8]);
        drop(a);
        assert_eq!(Arc::strong_count(&block), 2);
    }

    #[test]
    fn sub_view_offsets_compose() {
        let block = Arc::new(Block::<16>::new(
            core::array::from_fn(|i| i as u8),
            Some(0),
        ));
        let outer = VirtualBlock::new(block, 2, 12, 3);
        let inner = outer.sub_view(3, 4, 1);

        assert_eq!(inner.start(), 5);
        assert_eq!(inner.as_slice(), &[5, 6, 7, 8]);
    }
}
