//! Foundation types for the switch object store.
//!
//! Every other `sws-*` crate depends on this one.
//!
//! # Key Types
//!
//! - [`ObjectType`] -- Schema-defined kind of object (port, vlan, ...)
//! - [`ObjectId`] -- 64-bit handle packing an object type and a dense id
//! - [`AttrId`] -- Attribute identifier, unique across the schema
//! - [`AttributeValue`] -- Closed sum type of every storable value kind
//! - [`Attribute`] -- An `(AttrId, AttributeValue)` pair
//! - [`SwitchError`] / [`Status`] -- The store's error taxonomy

pub mod error;
pub mod net;
pub mod object;
pub mod value;

pub use error::{Status, SwitchError, SwitchResult};
pub use net::{IpPrefix, MacAddr, ValueRange};
pub use object::{AttrId, ObjectId, ObjectType};
pub use value::{AttrList, Attribute, AttributeValue, ValueKind};
