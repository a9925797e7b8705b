//! Document models and capability traits.

mod entity;
mod geo;

pub use entity::{generate_ulid, Entity};
pub use geo::{GeoPoint, Located, EARTH_RADIUS_METERS};
