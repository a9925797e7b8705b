//! Typed repositories over a document collection.
//!
//! [`ReadRepository`] covers every read: count, existence, listing with
//! filter/sort/paging/projection, streaming and lookup by id. [`Repository`]
//! adds the mutators and publishes a [`RepositoryEvent`] after each
//! committed insert or delete. Proximity reads ([`GeoRepository`]) and file
//! storage ([`BlobRepository`]) are extension traits.
//!
//! Both repository types are built from the injected [`Connector`](crate::context::Connector)
//! (or the [`Backends`](crate::context::Backends) extracted from it) and
//! capture whether their collection exists once at construction. Operations
//! on a missing collection short-circuit without a store round trip.

mod blob;
mod events;
mod geo;
mod read;
mod repository;

pub use blob::BlobRepository;
pub use events::{EventHub, ListenerId, RepositoryEvent, EVENT_CHANNEL_CAPACITY};
pub use geo::{GeoRepository, NearQuery, MAX_NEAR_DISTANCE_METERS, MIN_NEAR_DISTANCE_METERS};
pub use read::{EntityStream, ReadRepository};
pub use repository::Repository;
