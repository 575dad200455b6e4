//! # Cache Node
//!
//! The minimal deferred operator: materializes everything its parent pushes
//! into a [`File`] and replays that file to its own children on every push.
//! Attach one below an expensive pipeline to pay for the upstream work once.
//!
//! The file is written during the parent's push phase (the node's pre-op);
//! `stop_pre_op` seals the writer when the parent finishes. `execute()` is a
//! no-op: by the time this node's stage runs, the data is already on hand.
//! Caches are `never_consume` by default: their materialized file is kept
//! indefinitely so any number of later consumers can replay it.

use std::cell::RefCell;
use std::rc::Rc;

use eyre::Result;

use crate::encoding::ItemSerialize;
use crate::error::DataError;
use crate::graph::node::{
    DataflowNode, ItemCallback, NodeBase, NodeHandle, NodeId, TypedNode,
};
use crate::graph::Context;
use crate::storage::{File, FileWriter};

pub struct CacheNode<T: ItemSerialize + 'static, const B: usize> {
    base: NodeBase,
    file: File<B>,
    /// Active while the parent's pre-op feeds us; sealed by `stop_pre_op`.
    writer: Option<FileWriter<B>>,
    sinks: Vec<ItemCallback<T>>,
}

impl<T: ItemSerialize + 'static, const B: usize> CacheNode<T, B> {
    /// Builds a cache below `parent` and wires both link directions: the
    /// strong parent edge, the weak child back-reference, and the typed sink
    /// that saves pushed items into the cache's file.
    pub fn attach<P>(context: &Rc<Context>, parent: &Rc<RefCell<P>>) -> Result<Rc<RefCell<Self>>>
    where
        P: TypedNode<T> + 'static,
    {
        let file = File::new();
        let writer = file.get_writer()?;
        let mut base = NodeBase::new(context, "cache", vec![parent.clone() as NodeHandle]);
        base.set_never_consume(true);

        let node = Rc::new(RefCell::new(Self {
            base,
            file,
            writer: Some(writer),
            sinks: Vec::new(),
        }));

        let dyn_node: NodeHandle = node.clone();
        parent.borrow_mut().add_child(Rc::downgrade(&dyn_node));
        let weak = Rc::downgrade(&node);
        parent.borrow_mut().add_sink(Box::new(move |item: &T| {
            if let Some(cell) = weak.upgrade() {
                cell.borrow_mut().save(item)?;
            }
            Ok(())
        }));
        Ok(node)
    }

    /// The materialized file; sealed once the parent's pre-op completes.
    pub fn file(&self) -> &File<B> {
        &self.file
    }

    fn save(&mut self, item: &T) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_item(item),
            None => Err(DataError::usage("cache received an item after its input closed").into()),
        }
    }
}

impl<T: ItemSerialize + 'static, const B: usize> DataflowNode for CacheNode<T, B> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        // data was collected during the parent's push
        Ok(())
    }

    fn push_data(&mut self, consume: bool) -> Result<()> {
        let mut reader = self.file.get_reader(consume);
        for _ in 0..self.file.num_items() {
            let item = reader.next::<T>()?;
            for sink in &mut self.sinks {
                sink(&item)?;
            }
        }
        Ok(())
    }

    fn stop_pre_op(&mut self, _parent_id: NodeId) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.writer = None;
        self.file = File::new();
        self.base.set_state(crate::graph::node::NodeState::Disposed);
    }

    fn remove_all_children(&mut self) {
        self.base.clear_children();
        self.sinks.clear();
    }
}

impl<T: ItemSerialize + 'static, const B: usize> TypedNode<T> for CacheNode<T, B> {
    fn add_sink(&mut self, sink: ItemCallback<T>) {
        self.sinks.push(sink);
    }
}
