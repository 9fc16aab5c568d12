//! Attribute value storage for the switch object store.
//!
//! Every object owns a map from `(AttrId, extra)` to a slot. Scalars live at
//! `extra == 0`. A list attribute keeps a header at `extra == 0` holding the
//! element count and element kind, followed by one slot per element at
//! `1..=count`.
//!
//! # Design Rules
//!
//! 1. List length is always read from the header, never recomputed.
//! 2. A push writes the element and bumps the header under one lock.
//! 3. A clear pops from the tail, decrementing the header at each step, so an
//!    interrupted clear leaves a shorter but consistent list.
//! 4. Each call is internally locked; callers that need a *sequence* of calls
//!    to be atomic hold their own lock around it.

pub mod alloc;
pub mod attrs;
pub mod error;

pub use alloc::{Allocators, IdAllocator};
pub use attrs::{AttributeStore, ObjectStatus, Slot};
pub use error::{StoreError, StoreResult};
