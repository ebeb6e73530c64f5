//! Pipeline graph description.

use super::transforms;
use crate::core::Tuple;
use crate::errors::HarnessError;
use crate::generator::SequenceGenerator;
use std::fmt;
use std::sync::Arc;

/// A per-tuple transform. An `Err` drops the tuple on that branch.
pub type TransformFn = Arc<dyn Fn(Tuple) -> Result<Tuple, String> + Send + Sync>;

/// Opaque attachment point for transforms and observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(usize);

impl StreamHandle {
    /// Position of the stream within its topology.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Receives the tuples delivered on one stream, in production order.
///
/// Calls for one observer never overlap: the engine delivers from a single
/// task per observer.
pub trait TupleObserver: Send + Sync {
    /// Called once per tuple.
    fn on_tuple(&self, tuple: &Tuple);

    /// Called once after the last tuple when the source ran to completion.
    /// Not called when the job is stopped.
    fn on_end(&self) {}
}

#[derive(Clone)]
pub(crate) enum Node {
    Source(SequenceGenerator),
    Transform {
        name: String,
        parent: usize,
        func: TransformFn,
    },
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(generator) => f.debug_tuple("Source").field(generator).finish(),
            Self::Transform { name, parent, .. } => f
                .debug_struct("Transform")
                .field("name", name)
                .field("parent", parent)
                .finish(),
        }
    }
}

/// A pipeline graph: generator sources, transforms, and the observers
/// attached to their streams.
pub struct Topology {
    name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) observers: Vec<(usize, Arc<dyn TupleObserver>)>,
}

impl Topology {
    /// Creates an empty topology.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Returns the topology name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of streams.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Adds a generator source.
    pub fn add_source(&mut self, generator: SequenceGenerator) -> StreamHandle {
        self.nodes.push(Node::Source(generator));
        StreamHandle(self.nodes.len() - 1)
    }

    /// Adds a transform fed by `input`.
    pub fn add_transform<F>(&mut self, input: StreamHandle, name: impl Into<String>, func: F) -> StreamHandle
    where
        F: Fn(Tuple) -> Result<Tuple, String> + Send + Sync + 'static,
    {
        self.nodes.push(Node::Transform {
            name: name.into(),
            parent: input.0,
            func: Arc::new(func),
        });
        StreamHandle(self.nodes.len() - 1)
    }

    /// Attaches an observer to a stream.
    pub fn on_tuple(&mut self, stream: StreamHandle, observer: Arc<dyn TupleObserver>) {
        self.observers.push((stream.0, observer));
    }

    /// Renders records as structured documents.
    pub fn to_document(&mut self, input: StreamHandle) -> StreamHandle {
        self.add_transform(input, "to_document", transforms::to_document)
    }

    /// Serializes documents to text.
    pub fn serialize(&mut self, input: StreamHandle) -> StreamHandle {
        self.add_transform(input, "serialize", transforms::serialize_document)
    }

    /// Renders each tuple as text.
    pub fn to_text(&mut self, input: StreamHandle) -> StreamHandle {
        self.add_transform(input, "to_text", transforms::to_text)
    }

    /// Checks that every reference points at an earlier stream.
    pub fn validate(&self) -> Result<(), HarnessError> {
        for (index, node) in self.nodes.iter().enumerate() {
            if let Node::Transform { name, parent, .. } = node {
                if *parent >= index {
                    return Err(HarnessError::InvalidTopology(format!(
                        "transform '{name}' reads stream#{parent}, which is not defined before it"
                    )));
                }
            }
        }
        for (stream, _) in &self.observers {
            if *stream >= self.nodes.len() {
                return Err(HarnessError::InvalidTopology(format!(
                    "observer attached to unknown stream#{stream}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the source index each stream descends from.
    pub(crate) fn roots(&self) -> Vec<usize> {
        let mut roots = Vec::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            let root = match node {
                Node::Source(_) => index,
                Node::Transform { parent, .. } => roots[*parent],
            };
            roots.push(root);
        }
        roots
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("observers", &self.observers.len())
            .finish()
    }
}
