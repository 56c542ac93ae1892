// Routing provider seam
//
// The delivery fee needs an origin→destination distance. Production routes
// through an external provider over HTTP; every failure path degrades to a
// deterministic 5 km / 15 min fallback so checkout never blocks on routing.

use axum::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::models::GeoPoint;

/// Bound on the routing round-trip; anything slower prices as the fallback
const ROUTING_TIMEOUT: Duration = Duration::from_secs(5);

const FALLBACK_DISTANCE_KM: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const FALLBACK_DURATION_MIN: i64 = 15;

/// Error types for the routing provider
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Routing provider request failed: {0}")]
    Request(String),

    #[error("Routing provider returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// Distance/duration for one origin-destination pair
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEstimate {
    pub distance_km: Decimal,
    pub duration_min: i64,
    /// True when the deterministic fallback was substituted for a real route
    pub is_default: bool,
}

/// Deterministic estimate used when the provider errors or times out
pub fn fallback_estimate() -> RouteEstimate {
    RouteEstimate {
        distance_km: FALLBACK_DISTANCE_KM,
        duration_min: FALLBACK_DURATION_MIN,
        is_default: true,
    }
}

/// Seam for the external routing service
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RouteEstimate, RoutingError>;
}

/// Resolve a route, substituting the fallback on any provider failure
pub async fn resolve_route(
    provider: &dyn DistanceProvider,
    origin: GeoPoint,
    destination: GeoPoint,
) -> RouteEstimate {
    match provider.route(origin, destination).await {
        Ok(estimate) => estimate,
        Err(e) => {
            tracing::warn!("Routing provider unavailable, using fallback: {}", e);
            fallback_estimate()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    distance_km: f64,
    duration_min: i64,
}

/// HTTP routing provider client
pub struct HttpDistanceProvider {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDistanceProvider {
    pub fn new(base_url: String) -> Result<Self, RoutingError> {
        let http = reqwest::Client::builder()
            .timeout(ROUTING_TIMEOUT)
            .build()
            .map_err(|e| RoutingError::Request(e.to_string()))?;

        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl DistanceProvider for HttpDistanceProvider {
    async fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<RouteEstimate, RoutingError> {
        let url = format!("{}/route", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("origin_lat", origin.latitude),
                ("origin_lng", origin.longitude),
                ("dest_lat", destination.latitude),
                ("dest_lng", destination.longitude),
            ])
            .send()
            .await
            .map_err(|e| RoutingError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| RoutingError::Request(e.to_string()))?;

        let body: RouteResponse = response
            .json()
            .await
            .map_err(|e| RoutingError::InvalidResponse(e.to_string()))?;

        let distance_km = Decimal::from_f64_retain(body.distance_km)
            .filter(|d| *d >= Decimal::ZERO)
            .ok_or_else(|| {
                RoutingError::InvalidResponse(format!("bad distance {}", body.distance_km))
            })?;

        Ok(RouteEstimate {
            distance_km: super::round2(distance_km),
            duration_min: body.duration_min,
            is_default: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct FailingProvider;

    #[async_trait]
    impl DistanceProvider for FailingProvider {
        async fn route(
            &self,
            _origin: GeoPoint,
            _destination: GeoPoint,
        ) -> Result<RouteEstimate, RoutingError> {
            Err(RoutingError::Request("connection refused".to_string()))
        }
    }

    struct FixedProvider(RouteEstimate);

    #[async_trait]
    impl DistanceProvider for FixedProvider {
        async fn route(
            &self,
            _origin: GeoPoint,
            _destination: GeoPoint,
        ) -> Result<RouteEstimate, RoutingError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_fallback_estimate_values() {
        let fallback = fallback_estimate();
        assert_eq!(fallback.distance_km, dec!(5));
        assert_eq!(fallback.duration_min, 15);
        assert!(fallback.is_default);
    }

    #[tokio::test]
    async fn test_resolve_route_degrades_to_fallback() {
        let origin = GeoPoint::new(19.43, -99.13);
        let destination = GeoPoint::new(19.44, -99.14);

        let estimate = resolve_route(&FailingProvider, origin, destination).await;
        assert!(estimate.is_default);
        assert_eq!(estimate.distance_km, dec!(5));
    }

    #[tokio::test]
    async fn test_resolve_route_passes_through_success() {
        let fixed = RouteEstimate {
            distance_km: dec!(2.40),
            duration_min: 9,
            is_default: false,
        };
        let origin = GeoPoint::new(19.43, -99.13);
        let destination = GeoPoint::new(19.44, -99.14);

        let estimate = resolve_route(&FixedProvider(fixed.clone()), origin, destination).await;
        assert_eq!(estimate, fixed);
    }
}
