//! # rill - Dataflow Storage and Scheduling Core
//!
//! `rill` is the data plane and control plane of a distributed batch
//! dataflow engine: the block-chunked storage layer every operator writes
//! through and reads from, and the lazy execution graph that decides which
//! operators actually run when a result is requested.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │        Operator Library (external)        │
//! ├───────────────────────────────────────────┤
//! │   graph: nodes, context, cache operator   │
//! │   graph::scheduler: stage discovery/run   │
//! ├───────────────────────────────────────────┤
//! │   storage: File │ BlockQueue              │
//! │   storage: BlockWriter / BlockReader      │
//! ├───────────────────────────────────────────┤
//! │   encoding: varint, item serialization    │
//! ├───────────────────────────────────────────┤
//! │   Network / transport layer (external)    │
//! └───────────────────────────────────────────┘
//! ```
//!
//! The storage layer chunks serialized items into fixed-capacity immutable
//! blocks that are shared by reference (across files, queues, and sliced
//! batches) and never copied once sealed. Items may span blocks; readers
//! reassemble transparently, and files keep an item-count index so a reader
//! can seek to the n-th logical item without scanning from the front.
//!
//! The graph layer keeps operators lazy: building a pipeline allocates
//! nodes and links, nothing more. Requesting a result walks the parent
//! graph, schedules exactly the stages whose output is missing, pushes data
//! downstream stage by stage, and releases intermediate storage as consumers
//! fall away.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rill::storage::File;
//!
//! let file = File::<1024>::new();
//! let mut writer = file.get_writer()?;
//! writer.write_item(&(42u32, String::from("answer")))?;
//! writer.close()?;
//!
//! let mut reader = file.get_reader(false);
//! let (n, s) = reader.next::<(u32, String)>()?;
//! ```
//!
//! ## Module Overview
//!
//! - [`encoding`]: varint wire format and the fixed/variable-size item
//!   serialization strategy
//! - [`storage`]: blocks, views, writer/reader, `File`, `BlockQueue`
//! - [`graph`]: dataflow nodes, graph context, cache operator, stage
//!   scheduler
//! - [`error`]: the `StreamExhausted` / `UsageViolation` /
//!   `MalformedEncoding` taxonomy
//!
//! Out of scope here: the transport that moves blocks between workers, the
//! concrete operator library, and process bootstrap. They consume these APIs
//! from sibling crates.

pub mod encoding;
pub mod error;
pub mod graph;
pub mod storage;

pub use error::DataError;
