//! # Seek and Slice Integration Tests
//!
//! Exercises the seek-by-item-index path together with item batches and the
//! streaming queue, the way a worker serves a partition of its output to a
//! peer:
//!
//! 1. Seek to an arbitrary item index, slice `[begin, end)` into fresh block
//!    views, stream them through a `BlockQueue`, decode on the other side
//! 2. Continue batching from where the previous batch left the reader
//! 3. Degenerate ranges: empty slices, single items, file tail, end-of-file
//!
//! The block size is a prime so items never align with block boundaries.

use rill::storage::{BlockQueue, File};

const BLOCK_SIZE: usize = 53;
const NUM_ITEMS: usize = 1000;

fn build_file() -> File<BLOCK_SIZE> {
    let file = File::<BLOCK_SIZE>::new();
    let mut w = file.get_writer().unwrap();
    for i in 0..NUM_ITEMS as u64 {
        w.write_item(&i).unwrap();
    }
    w.close().unwrap();
    file
}

/// Seeks to `begin`, slices `[begin, end)` through a queue, decodes it back,
/// and optionally batches 100 more items from the same reader.
fn check_range(file: &File<BLOCK_SIZE>, begin: usize, end: usize, read_more: bool) {
    let mut reader = file.get_reader_at::<u64>(begin).unwrap();

    let blocks = reader.get_item_batch::<u64>(end - begin).unwrap();
    let queue = BlockQueue::<BLOCK_SIZE>::new();
    for block in blocks {
        queue.append_block(block).unwrap();
    }
    queue.close();

    let mut qr = queue.get_reader();
    for i in begin..end {
        assert!(qr.has_next(), "range [{}, {}) missing item {}", begin, end, i);
        assert_eq!(qr.next::<u64>().unwrap(), i as u64);
    }
    assert!(!qr.has_next(), "range [{}, {}) has trailing items", begin, end);

    if !read_more {
        return;
    }

    // the file reader continues at `end`
    let more = 100;
    let blocks = reader.get_item_batch::<u64>(more).unwrap();
    let queue = BlockQueue::<BLOCK_SIZE>::new();
    for block in blocks {
        queue.append_block(block).unwrap();
    }
    queue.close();

    let mut qr = queue.get_reader();
    for i in end..end + more {
        assert!(qr.has_next());
        assert_eq!(qr.next::<u64>().unwrap(), i as u64);
    }
    assert!(!qr.has_next());
}

#[test]
fn full_sequential_read() {
    let file = build_file();
    assert_eq!(file.num_items(), NUM_ITEMS);

    let mut r = file.get_reader(false);
    for i in 0..NUM_ITEMS as u64 {
        assert!(r.has_next());
        assert_eq!(r.next::<u64>().unwrap(), i);
    }
    assert!(!r.has_next());
}

#[test]
fn ranges_with_moving_begin() {
    let file = build_file();
    for begin in 90..100 {
        check_range(&file, begin, 144, true);
    }
}

#[test]
fn ranges_with_moving_end() {
    let file = build_file();
    for end in 140..150 {
        check_range(&file, 96, end, true);
    }
}

#[test]
fn degenerate_and_boundary_ranges() {
    let file = build_file();
    check_range(&file, 0, 0, true);
    check_range(&file, 0, 1, true);
    check_range(&file, 1, 2, true);
    check_range(&file, 990, 1000, false);
    check_range(&file, 1000, 1000, false);
}

#[test]
fn batches_partition_the_file_exactly() {
    let file = build_file();
    let mut reader = file.get_reader(false);

    let mut seen = Vec::new();
    loop {
        let blocks = reader.get_item_batch::<u64>(37).unwrap();
        if blocks.is_empty() {
            break;
        }
        let queue = BlockQueue::<BLOCK_SIZE>::new();
        for block in blocks {
            queue.append_block(block).unwrap();
        }
        queue.close();
        let mut qr = queue.get_reader();
        while qr.has_next() {
            seen.push(qr.next::<u64>().unwrap());
        }
    }

    let expect: Vec<u64> = (0..NUM_ITEMS as u64).collect();
    assert_eq!(seen, expect);
}

#[test]
fn sliced_views_alias_the_original_blocks() {
    let file = build_file();
    let mut reader = file.get_reader_at::<u64>(10).unwrap();
    let blocks = reader.get_item_batch::<u64>(20).unwrap();

    // slicing duplicates no bytes: every view points into a file block
    let total: usize = blocks.iter().map(|b| b.size()).sum();
    assert_eq!(total, 20 * 8);
    assert_eq!(
        blocks.iter().map(|b| b.num_items()).sum::<usize>(),
        20
    );
}
