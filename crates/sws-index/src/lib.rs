//! Secondary key index for the switch object store.
//!
//! Maps the ordered values of a key group's attributes to the object that
//! owns them. There is one table per declared key group per object type;
//! an object with K eligible key groups occupies K entries, which are added
//! and removed together.
//!
//! # Key Types
//!
//! - [`SecondaryIndex`] -- All key tables, behind one lock
//! - [`KeyTuple`] -- Ordered attribute values forming one key

pub mod error;
pub mod index;
pub mod key;

pub use error::{IndexError, IndexResult};
pub use index::SecondaryIndex;
pub use key::KeyTuple;
