//! Geographic points and location-carrying documents.

use serde::{Deserialize, Serialize};

use super::Entity;

/// Mean Earth radius in meters, used for spherical distances.
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

/// A GeoJSON point.
///
/// Serializes as `{"type": "Point", "coordinates": [longitude, latitude]}`,
/// the layout geo-aware document stores index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }
}

#[derive(Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = String;

    fn try_from(point: GeoJsonPoint) -> Result<Self, Self::Error> {
        if point.kind != "Point" {
            return Err(format!("expected GeoJSON Point, got {}", point.kind));
        }
        let [longitude, latitude] = point.coordinates;
        Ok(GeoPoint::new(latitude, longitude))
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [point.longitude, point.latitude],
        }
    }
}

/// A document carrying a geographic location field.
pub trait Located: Entity {
    /// Name of the document field holding the [`GeoPoint`].
    const LOCATION_FIELD: &'static str = "location";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_serializes_as_geojson() {
        let point = GeoPoint::new(52.52, 13.405);
        let value = serde_json::to_value(point).unwrap();
        assert_eq!(value, json!({"type": "Point", "coordinates": [13.405, 52.52]}));

        let back: GeoPoint = serde_json::from_value(value).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_rejects_non_point_geometry() {
        let value = json!({"type": "LineString", "coordinates": [1.0, 2.0]});
        assert!(serde_json::from_value::<GeoPoint>(value).is_err());
    }

    #[test]
    fn test_distance_meters() {
        let berlin = GeoPoint::new(52.5200, 13.4050);
        let potsdam = GeoPoint::new(52.3906, 13.0645);

        let d = berlin.distance_meters(&potsdam);
        assert!((26_000.0..28_000.0).contains(&d), "distance was {d}");
        assert_eq!(berlin.distance_meters(&berlin), 0.0);
    }
}
