//! # Dataflow Nodes
//!
//! One node per lazy operator in the execution graph. A node owns strong
//! links to its parents (the operators it consumes) and non-owning
//! back-references to its children (the operators that consume it), so the
//! traversal can walk both directions while ownership stays acyclic: a node
//! outlives nothing upward, and child links are severed explicitly by the
//! scheduler once a node has been pushed to every dependent.
//!
//! ## Lifecycle
//!
//! `New -> Executed -> Disposed`, strictly monotonic. `Executed` is set by
//! the scheduler after the node's data has been pushed; `Disposed` after its
//! retained storage is released.
//!
//! ## Deferred vs. Local Operations
//!
//! `can_execute()` distinguishes *deferred* operations, nodes that hold or
//! produce materialized data through an explicit `execute()` step and are
//! scheduled as their own stage, from *local* operations that only
//! transform a push-stream inline and are folded into their parent's push
//! chain.
//!
//! ## Typed Push Chains
//!
//! The scheduler sees nodes as `dyn DataflowNode`; item movement is typed.
//! A producer of `T` additionally implements [`TypedNode<T>`] and holds one
//! [`ItemCallback`] per child. Attaching a child registers both the weak
//! back-reference (for the scheduler) and the callback (for the data), and
//! `remove_all_children()` must clear both.
//!
//! ## Consume Policy
//!
//! `push_data(consume = true)` may destructively drain the node's storage.
//! Whether that is allowed combines the graph-wide consume flag from
//! [`Context`](crate::graph::Context), the node's own policy, and a
//! `never_consume` override for nodes whose whole point is retention (a
//! cache). Once drained, the `data_consumed` latch makes any further push a
//! fatal usage error in the scheduler.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use eyre::Result;

use crate::graph::Context;

pub type NodeId = u32;

/// Strong handle: how children own parents and the scheduler owns stages.
pub type NodeHandle = Rc<RefCell<dyn DataflowNode>>;

/// Non-owning back-reference from a parent to a child.
pub type WeakNodeHandle = Weak<RefCell<dyn DataflowNode>>;

/// Typed sink through which a parent pushes items to one child.
pub type ItemCallback<T> = Box<dyn FnMut(&T) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    New,
    Executed,
    Disposed,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::New => "NEW",
            NodeState::Executed => "EXECUTED",
            NodeState::Disposed => "DISPOSED",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operator in the graph, as seen by the scheduler.
pub trait DataflowNode {
    fn base(&self) -> &NodeBase;
    fn base_mut(&mut self) -> &mut NodeBase;

    /// Whether this node has an independent execution step (deferred
    /// operation). Local operations return false and are streamed as part
    /// of another stage's push.
    fn can_execute(&self) -> bool {
        true
    }

    /// Performs the deferred computation. Called at most once per node.
    fn execute(&mut self) -> Result<()>;

    /// Streams this node's result to every attached child, item by item.
    /// `consume` permits destructively draining the underlying storage.
    fn push_data(&mut self, consume: bool) -> Result<()>;

    /// Notification that upstream producer `parent_id` has finished feeding
    /// this node; used to seal writers collecting pushed items.
    fn stop_pre_op(&mut self, _parent_id: NodeId) -> Result<()> {
        Ok(())
    }

    /// Releases retained storage and enters `Disposed`.
    fn dispose(&mut self) {
        self.base_mut().set_state(NodeState::Disposed);
    }

    /// Severs all child links, typed sinks included.
    fn remove_all_children(&mut self) {
        self.base_mut().clear_children();
    }

    fn id(&self) -> NodeId {
        self.base().id()
    }

    fn label(&self) -> &str {
        self.base().label()
    }

    /// `label.id`, the form every log line uses.
    fn describe(&self) -> String {
        format!("{}.{}", self.label(), self.id())
    }

    fn state(&self) -> NodeState {
        self.base().state()
    }

    fn parents(&self) -> Vec<NodeHandle> {
        self.base().parents.clone()
    }

    /// Live children; dropped nodes are filtered out.
    fn children(&self) -> Vec<NodeHandle> {
        self.base()
            .children
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn add_child(&mut self, child: WeakNodeHandle) {
        self.base_mut().children.push(child);
    }

    /// Whether the next push may drain this node's data.
    fn consume_on_push(&self) -> bool {
        self.base().consume_on_push()
    }
}

/// A node additionally able to hand typed items to registered children.
pub trait TypedNode<T>: DataflowNode {
    fn add_sink(&mut self, sink: ItemCallback<T>);
}

/// Common state embedded in every concrete node.
pub struct NodeBase {
    id: NodeId,
    label: String,
    state: NodeState,
    parents: Vec<NodeHandle>,
    children: Vec<WeakNodeHandle>,
    context: Rc<Context>,
    consume_policy: bool,
    never_consume: bool,
    data_consumed: bool,
}

impl NodeBase {
    /// Parents are fixed at construction; children accumulate as later
    /// operators attach.
    pub fn new(context: &Rc<Context>, label: impl Into<String>, parents: Vec<NodeHandle>) -> Self {
        Self {
            id: context.next_node_id(),
            label: label.into(),
            state: NodeState::New,
            parents,
            children: Vec::new(),
            context: Rc::clone(context),
            consume_policy: true,
            never_consume: false,
            data_consumed: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn set_state(&mut self, state: NodeState) {
        debug_assert!(state >= self.state, "state regression {} -> {}", self.state, state);
        self.state = state;
    }

    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Marks this node as retaining its data across any number of pushes.
    pub fn set_never_consume(&mut self, never: bool) {
        self.never_consume = never;
    }

    pub fn set_consume_policy(&mut self, consume: bool) {
        self.consume_policy = consume;
    }

    pub fn consume_on_push(&self) -> bool {
        self.context.consume() && self.consume_policy && !self.never_consume
    }

    pub fn data_consumed(&self) -> bool {
        self.data_consumed
    }

    pub fn mark_consumed(&mut self) {
        self.data_consumed = true;
    }
}
