//! Reference graph for the switch object store.
//!
//! For every referenced object the graph records which `(object, attribute)`
//! pairs point at it, grouped by the referencing object's type. It backs two
//! store operations:
//!
//! - **Delete validation**: an object with a live USER referrer cannot be
//!   deleted.
//! - **Dereferencing on delete**: a deleted object's outgoing edges are
//!   removed from the incoming lists of everything it pointed at.
//!
//! An object-id list attribute contributes one edge per element, all keyed
//! by the same attribute id, so edges are counted rather than deduplicated.
//!
//! # Modules
//!
//! - [`error`] -- Error types for graph operations
//! - [`graph`] -- [`ReferenceGraph`] and [`RefEdge`]

pub mod error;
pub mod graph;

pub use error::{RefError, RefResult};
pub use graph::{RefEdge, ReferenceGraph};
