//! # Stage Scheduler
//!
//! Given a target node, discovers the minimal set of stages that must run to
//! materialize its result, then drives each stage through its execute and
//! data-push phases exactly once.
//!
//! ## Discovery
//!
//! A breadth-first search over the *parents* relation, visiting each node
//! once. Every unvisited parent becomes a stage. The search continues upward
//! through a parent when it still needs executing (`can_execute` and not yet
//! `Executed`), since its own inputs must be produced first, and always
//! through parents that cannot execute independently, because regenerating
//! their stream may reach further ancestors.
//!
//! ## Processing
//!
//! The discovered list is processed in LIFO order: BFS finds the target
//! first and its ancestors progressively deeper, so popping from the back
//! materializes intermediates before the nodes that depend on them. Per
//! stage:
//!
//! - not executable: skipped; it is streamed inline by another stage
//! - `New`: `execute()`, then push
//! - `Executed`: push only; the stream is re-materialized without
//!   recomputation, guarded against re-pushing already-drained data
//!
//! After a stage runs, its child links are severed. That is the release
//! point: once no consumer can reach the node through the graph, its
//! retained blocks are freed by reference counting. Parent links stay
//! intact.
//!
//! Stage order is deterministic for a fixed graph (parents are visited in
//! declaration order and no recomputation-minimizing reordering is
//! attempted), so re-running the same action without graph mutation executes
//! the same stages in the same order.

use std::collections::VecDeque;
use std::time::Instant;

use eyre::{bail, Result};
use hashbrown::HashSet;
use smallvec::SmallVec;
use tracing::{debug, error};

use crate::error::DataError;
use crate::graph::node::{DataflowNode, NodeHandle, NodeState};

/// One node scheduled for execution or re-push during a single pass.
/// Transient; discarded when the pass completes.
struct Stage {
    node: NodeHandle,
}

impl Stage {
    fn new(node: NodeHandle) -> Self {
        Self { node }
    }

    fn describe(&self) -> String {
        self.node.borrow().describe()
    }

    /// The nodes this stage pushes into, for the log lines.
    fn targets(&self) -> String {
        let children = self.node.borrow().children();
        let mut out = String::from("[");
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&child.borrow().describe());
        }
        out.push(']');
        out
    }

    /// First run: execute the deferred computation, then push.
    fn execute(&self) -> Result<()> {
        debug!(stage = %self.describe(), targets = %self.targets(), "START (execute) stage");
        let started = Instant::now();
        self.node.borrow_mut().execute()?;
        debug!(
            stage = %self.describe(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "FINISH (execute) stage"
        );
        self.run_push()
    }

    /// Re-run: the node already executed; re-materialize its stream only.
    fn push_data(&self) -> Result<()> {
        {
            let node = self.node.borrow();
            if node.consume_on_push() && node.base().data_consumed() {
                error!(
                    stage = %node.describe(),
                    "push on a consumed stage; data must be kept to be pushed again"
                );
                bail!(DataError::usage(format!(
                    "data of stage {} was already consumed; keep it to push again",
                    node.describe()
                )));
            }
        }
        self.run_push()
    }

    fn run_push(&self) -> Result<()> {
        debug!(stage = %self.describe(), targets = %self.targets(), "START (pushdata) stage");
        let started = Instant::now();
        let consume = self.node.borrow().consume_on_push();
        self.node.borrow_mut().push_data(consume)?;
        if consume {
            self.node.borrow_mut().base_mut().mark_consumed();
        }

        // upstream feed is complete; let children seal their collectors
        let (id, children) = {
            let node = self.node.borrow();
            (node.id(), node.children())
        };
        for child in children {
            child.borrow_mut().stop_pre_op(id)?;
        }

        self.node.borrow_mut().base_mut().set_state(NodeState::Executed);
        debug!(
            stage = %self.describe(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "FINISH (pushdata) stage"
        );
        Ok(())
    }
}

/// BFS over parents; each node becomes at most one stage.
fn find_stages(action: &NodeHandle) -> SmallVec<[Stage; 8]> {
    let mut stages: SmallVec<[Stage; 8]> = SmallVec::new();
    let mut found: HashSet<_> = HashSet::new();
    let mut queue: VecDeque<NodeHandle> = VecDeque::new();

    found.insert(action.borrow().id());
    stages.push(Stage::new(action.clone()));
    queue.push_back(action.clone());

    while let Some(node) = queue.pop_front() {
        let parents = node.borrow().parents();
        for parent in parents {
            let (id, can_execute, state) = {
                let p = parent.borrow();
                (p.id(), p.can_execute(), p.state())
            };
            if !found.insert(id) {
                continue;
            }
            debug!(stage = %parent.borrow().describe(), "found stage");
            stages.push(Stage::new(parent.clone()));

            if can_execute {
                // an executed parent's data is already materialized; its
                // ancestors are not needed again
                if state != NodeState::Executed {
                    queue.push_back(parent);
                }
            } else {
                // holds or streams data only; regenerating it may still
                // require its own parents
                queue.push_back(parent);
            }
        }
    }
    stages
}

/// Materializes `action`'s result: discovers the needed stages and drives
/// each one through execution and data-push, severing child links as stages
/// complete.
pub fn run_scope(action: &NodeHandle) -> Result<()> {
    debug!(target = %action.borrow().describe(), "running scope");

    let mut stages = find_stages(action);
    while let Some(stage) = stages.pop() {
        if !stage.node.borrow().can_execute() {
            continue;
        }
        let state = stage.node.borrow().state();
        match state {
            NodeState::New => stage.execute()?,
            NodeState::Executed => stage.push_data()?,
            NodeState::Disposed => {
                debug!(stage = %stage.describe(), "skipping disposed stage");
            }
        }
        // release point: nothing downstream can reach this node any more
        stage.node.borrow_mut().remove_all_children();
    }
    Ok(())
}
