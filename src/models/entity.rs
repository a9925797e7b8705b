//! Document identity.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use ulid::Ulid;

/// A document stored in a collection.
///
/// Identity is defined solely by [`id`](Entity::id) equality. Apart from the
/// id (and [`Located::LOCATION_FIELD`](super::Located::LOCATION_FIELD) for
/// geo documents) the repository layer treats documents as opaque serde
/// values, so the id must serialize under [`ID_FIELD`](Entity::ID_FIELD).
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Product {
///     #[serde(rename = "_id")]
///     id: String,
///     name: String,
///     price: f64,
/// }
///
/// impl Entity for Product {
///     type Id = String;
///     fn id(&self) -> &String {
///         &self.id
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Identifier type; compared by equality only.
    type Id: Serialize + PartialEq + Clone + Debug + Send + Sync;

    /// Name of the document field holding the id.
    const ID_FIELD: &'static str = "_id";

    /// Returns the document's identifier.
    fn id(&self) -> &Self::Id;
}

/// Generates a new ULID string.
pub fn generate_ulid() -> String {
    Ulid::new().to_string()
}
