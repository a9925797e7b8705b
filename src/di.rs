//! Dependency injection infrastructure.
//!
//! Repositories resolve their collaborators (document store, blob store,
//! settings) from a [`Connector`](crate::context::Connector) through the
//! `FromRef` trait and the derive macros from `di-macros`.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::di::FromRef;
//! use docrepo::store::SharedStore;
//!
//! let connector = Connector::in_memory("shop");
//! let store = SharedStore::from_ref(&connector);
//! ```

/// Trait for extracting a value from a reference to another type.
///
/// Types that implement `FromRef<T>` can be extracted from `&T`.
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

/// Blanket implementation: any Clone type can be extracted from itself.
impl<T: Clone> FromRef<T> for T {
    fn from_ref(input: &T) -> Self {
        input.clone()
    }
}

// Re-export derive macros
pub use di_macros::{Context, FromContext};
