//! # Dataflow Graph Module
//!
//! The lazy execution graph: operators are [`node::DataflowNode`]s wired
//! child-to-parent at construction time, and nothing runs until an action
//! asks the [`scheduler`] to materialize a result. The scheduler discovers
//! the minimal set of stages by walking parents, runs each exactly once, and
//! severs child links afterward so intermediate storage can be reclaimed.
//!
//! Ownership is deliberately one-directional: children hold strong handles
//! to parents, parents hold weak back-references to children. The traversal
//! sees a bidirectional graph; the allocator sees a DAG with no cycles.
//!
//! [`cache::CacheNode`] is the one concrete operator that lives here: the
//! smallest useful deferred node, and the template for how operators bind
//! the storage layer into the graph. The full operator library (map, reduce,
//! group-by, sort) builds on the same surfaces from outside this crate.

pub mod cache;
pub mod context;
pub mod node;
pub mod scheduler;

pub use cache::CacheNode;
pub use context::Context;
pub use node::{
    DataflowNode, ItemCallback, NodeBase, NodeHandle, NodeId, NodeState, TypedNode,
    WeakNodeHandle,
};
pub use scheduler::run_scope;
