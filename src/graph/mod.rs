//! Core graph data structures

mod builder;
mod edge;
mod metrics;
mod node;
mod store;


pub use builder::GraphBuilder;
pub use edge::{Edge, EdgeId, EdgeKind};
pub use metrics::{GitFlags, NodeMetrics};
pub use node::{field, FieldValue, Fields, GraphNode, NodeId, NodeKind, SourceLocation};
pub use store::{DuplicateNode, FileInfo, TraceGraph};
