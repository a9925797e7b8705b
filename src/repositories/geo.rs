//! Proximity queries for documents with a location.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::models::{GeoPoint, Located};
use crate::query::ListOptions;
use crate::repositories::read::ReadRepository;
use crate::store::Filter;

/// Smallest distance (exclusive) for which the proximity constraint applies.
pub const MIN_NEAR_DISTANCE_METERS: f64 = 100.0;

/// Largest distance (exclusive) for which the proximity constraint applies.
pub const MAX_NEAR_DISTANCE_METERS: f64 = 50_000.0;

/// A "within distance of point" request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
}

impl NearQuery {
    pub fn new(latitude: f64, longitude: f64, distance_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            distance_meters,
        }
    }

    /// True if the distance lies strictly between
    /// [`MIN_NEAR_DISTANCE_METERS`] and [`MAX_NEAR_DISTANCE_METERS`].
    pub fn applies(&self) -> bool {
        self.distance_meters > MIN_NEAR_DISTANCE_METERS
            && self.distance_meters < MAX_NEAR_DISTANCE_METERS
    }

    /// The proximity constraint on `field`, or `None` when the distance is
    /// outside the accepted range.
    pub fn constraint(&self, field: &str) -> Option<Filter> {
        self.applies().then(|| {
            Filter::near(
                field,
                GeoPoint::new(self.latitude, self.longitude),
                self.distance_meters,
            )
        })
    }

    /// ANDs the constraint (when it applies) with `filter`.
    pub fn combine(&self, field: &str, filter: Filter) -> Filter {
        match self.constraint(field) {
            Some(near) => near.and(filter),
            None => {
                tracing::debug!(
                    distance_meters = self.distance_meters,
                    "Distance outside accepted range, proximity constraint dropped"
                );
                filter
            }
        }
    }
}

/// Proximity reads for repositories of [`Located`] documents.
///
/// The constraint is only applied for distances strictly between 100 m and
/// 50 km; outside that range the call behaves as if no location was given
/// and only the supplied filter applies. A missing collection yields empty
/// results and a zero count.
#[async_trait]
pub trait GeoRepository<T: Located> {
    /// Lists documents near a point, further restricted by `options`.
    ///
    /// Without a sort in `options` the results come nearest-first; an
    /// explicit sort replaces that order.
    async fn list_near(
        &self,
        near: &NearQuery,
        options: &ListOptions,
    ) -> Result<Vec<T>, RepositoryError>;

    /// Counts documents near a point that also match `filter`.
    async fn count_near(&self, near: &NearQuery, filter: &Filter) -> Result<u64, RepositoryError>;
}

#[async_trait]
impl<T: Located> GeoRepository<T> for ReadRepository<T> {
    async fn list_near(
        &self,
        near: &NearQuery,
        options: &ListOptions,
    ) -> Result<Vec<T>, RepositoryError> {
        let filter = near.combine(T::LOCATION_FIELD, options.filter.clone().unwrap_or_default());
        let options = ListOptions {
            filter: Some(filter),
            ..options.clone()
        };
        self.list(&options).await
    }

    async fn count_near(&self, near: &NearQuery, filter: &Filter) -> Result<u64, RepositoryError> {
        let filter = near.combine(T::LOCATION_FIELD, filter.clone());
        self.count(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_exclusive() {
        for distance in [0.0, 100.0, 50_000.0, 60_000.0, -5.0, f64::NAN] {
            assert!(!NearQuery::new(1.0, 2.0, distance).applies(), "{distance}");
        }
        for distance in [100.5, 5_000.0, 49_999.9] {
            assert!(NearQuery::new(1.0, 2.0, distance).applies(), "{distance}");
        }
    }

    #[test]
    fn test_combine_adds_constraint_first() {
        let near = NearQuery::new(52.52, 13.405, 5_000.0);
        let combined = near.combine("location", Filter::eq("open", true));
        assert_eq!(
            combined,
            Filter::And(vec![
                Filter::near("location", GeoPoint::new(52.52, 13.405), 5_000.0),
                Filter::eq("open", true),
            ])
        );
    }

    #[test]
    fn test_combine_out_of_range_keeps_filter() {
        let near = NearQuery::new(52.52, 13.405, 50_000.0);
        assert_eq!(
            near.combine("location", Filter::eq("open", true)),
            Filter::eq("open", true)
        );
        assert_eq!(near.combine("location", Filter::All), Filter::All);
    }
}
