//! Backend implementations for different document stores.
//!
//! Each backend implements the core traits from [`crate::store`]:
//!
//! - [`DocumentStore`](crate::store::DocumentStore) - Required
//! - [`BlobStore`](crate::store::BlobStore) - Optional, for binary objects
//!
//! # Available Backends
//!
//! | Backend | Module | Feature |
//! |---------|--------|---------|
//! | In-memory | [`memory`] | always |
//! | MongoDB + GridFS | `mongodb` | `mongodb` |

pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;
