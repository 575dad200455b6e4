//! # Graph Context
//!
//! Graph-wide settings shared by every node: the node id allocator and the
//! global consume flag. The consume flag is the caller's declaration that
//! intermediate results may be drained as they are pushed downstream,
//! trading re-runnability for memory. Nodes combine it with their own
//! policy; see `NodeBase::consume_on_push`.
//!
//! The graph layer is single-threaded by contract (the scheduler runs
//! stages to completion one at a time), so a `Cell` suffices for the id
//! counter.

use std::cell::Cell;

use crate::graph::node::NodeId;

pub struct Context {
    next_id: Cell<NodeId>,
    consume: bool,
}

impl Context {
    /// A context that keeps intermediate data (consume disabled).
    pub fn new() -> Self {
        Self::with_consume(false)
    }

    pub fn with_consume(consume: bool) -> Self {
        Self {
            next_id: Cell::new(0),
            consume,
        }
    }

    pub fn next_node_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Whether pushes may drain intermediate storage.
    pub fn consume(&self) -> bool {
        self.consume
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
