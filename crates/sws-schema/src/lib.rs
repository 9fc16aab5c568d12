//! Schema service for the switch object store.
//!
//! The schema is built once from a [`ModelDescription`] (usually JSON) and is
//! read-only afterwards, so it is shared between threads without locking.
//!
//! # Key Types
//!
//! - [`ModelInfo`] -- The validated model and every query the store makes
//! - [`ObjectInfo`] -- One object type: class, attributes, key groups, memberships
//! - [`AttributeMetadata`] -- Kind, flags, default, and reference/enum constraints

pub mod description;
pub mod error;
pub mod metadata;
pub mod model;

pub use description::{AttributeDescription, MembershipDescription, ModelDescription, ObjectDescription};
pub use error::{SchemaError, SchemaResult};
pub use metadata::{AttributeFlags, AttributeMetadata, KeyGroup, Membership, ObjectClass, ObjectInfo};
pub use model::ModelInfo;
