use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::GeoPoint;
use crate::orders::PaymentMethod;
use crate::validation::{validate_latitude, validate_longitude};

/// Radius within which platform drivers may claim a branch's orders
pub const PLATFORM_RADIUS_KM: f64 = 10.0;

/// Courier operational states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Online,
    Offline,
    Busy,
    Unavailable,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Online => "online",
            DriverStatus::Offline => "offline",
            DriverStatus::Busy => "busy",
            DriverStatus::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A driver currently satisfying the eligibility predicate for an order
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EligibleDriver {
    pub user_id: i32,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
}

impl EligibleDriver {
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.current_lat, self.current_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

/// Ready order as shown to drivers (pull listing and push announce)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AvailableOrderView {
    pub order_id: i64,
    pub branch_id: i32,
    pub branch_name: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub dropoff_lat: f64,
    pub dropoff_lng: f64,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub order_placed_at: DateTime<Utc>,
}

/// Request DTO for PATCH /api/driver/status
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDriverStatusRequest {
    pub status: DriverStatus,
}

/// Request DTO for PATCH /api/driver/location
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationRequest {
    #[validate(custom = "validate_latitude")]
    pub latitude: f64,
    #[validate(custom = "validate_longitude")]
    pub longitude: f64,
}

/// Pagination for GET /api/driver/orders/available
#[derive(Debug, Deserialize)]
pub struct AvailableOrdersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl AvailableOrdersQuery {
    /// Clamp to sane bounds: page from 1, limit in [1, 100], default 20
    pub fn normalize(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_normalization() {
        let q = AvailableOrdersQuery {
            page: None,
            limit: None,
        };
        assert_eq!(q.normalize(), (1, 20));

        let q = AvailableOrdersQuery {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(q.normalize(), (1, 100));

        let q = AvailableOrdersQuery {
            page: Some(3),
            limit: Some(5),
        };
        assert_eq!(q.normalize(), (3, 5));
    }

    #[test]
    fn test_driver_status_serde() {
        let parsed: DriverStatus = serde_json::from_str("\"online\"").unwrap();
        assert_eq!(parsed, DriverStatus::Online);
        assert_eq!(DriverStatus::Unavailable.as_str(), "unavailable");
    }

    #[test]
    fn test_eligible_driver_point() {
        let with_fix = EligibleDriver {
            user_id: 1,
            current_lat: Some(19.0),
            current_lng: Some(-99.0),
        };
        assert!(with_fix.point().is_some());

        let without_fix = EligibleDriver {
            user_id: 2,
            current_lat: Some(19.0),
            current_lng: None,
        };
        assert!(without_fix.point().is_none());
    }
}
