use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Geographic point shared by branches, addresses and driver positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
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
}

/// Restaurant row. `commission_rate` is a percentage (0-100) applied to the
/// order subtotal; orders snapshot it at assembly time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: i32,
    pub name: String,
    pub commission_rate: Decimal,
    pub status: String,
}

impl Restaurant {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Physical outlet of a restaurant with its own delivery parameters
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub id: i32,
    pub restaurant_id: i32,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub uses_platform_drivers: bool,
    pub delivery_fee_base: Decimal,
    pub estimated_delivery_min: i32,
    pub estimated_delivery_max: i32,
    pub delivery_radius_km: Decimal,
    pub status: String,
}

impl Branch {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// One weekly-schedule record. Exactly one exists per (branch, day_of_week),
/// day_of_week 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BranchSchedule {
    pub id: i32,
    pub branch_id: i32,
    pub day_of_week: i16,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub is_closed: bool,
}

impl BranchSchedule {
    /// The pair (00:00:00, 23:59:59) is the sentinel for "open 24 hours"
    pub fn is_round_the_clock(&self) -> bool {
        self.opening_time == NaiveTime::from_hms_opt(0, 0, 0).unwrap()
            && self.closing_time == NaiveTime::from_hms_opt(23, 59, 59).unwrap()
    }

    /// Whether the branch accepts orders at `at`.
    ///
    /// Windows are half-open `[opening, closing)` at second precision, so a
    /// time equal to `closing_time` is already outside the window.
    pub fn is_open_at(&self, at: NaiveTime) -> bool {
        if self.is_closed {
            return false;
        }
        if self.is_round_the_clock() {
            return true;
        }
        self.opening_time <= at && at < self.closing_time
    }
}

/// Product row; `is_available` controls purchasability
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i32,
    pub restaurant_id: i32,
    pub subcategory_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: bool,
}

/// Modifier group; `min_selection <= max_selection` is enforced in schema
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModifierGroup {
    pub id: i32,
    pub restaurant_id: i32,
    pub name: String,
    pub min_selection: i32,
    pub max_selection: i32,
}

/// Priced choice within a modifier group ("Extra cheese +15.00")
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModifierOption {
    pub id: i32,
    pub modifier_group_id: i32,
    pub name: String,
    pub price_delta: Decimal,
    pub is_active: bool,
}

/// Delivery address owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub id: i32,
    pub user_id: i32,
    pub label: String,
    pub street: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Address {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(open: (u32, u32, u32), close: (u32, u32, u32), is_closed: bool) -> BranchSchedule {
        BranchSchedule {
            id: 1,
            branch_id: 1,
            day_of_week: 1,
            opening_time: NaiveTime::from_hms_opt(open.0, open.1, open.2).unwrap(),
            closing_time: NaiveTime::from_hms_opt(close.0, close.1, close.2).unwrap(),
            is_closed,
        }
    }

    #[test]
    fn test_open_within_window() {
        let s = schedule((9, 0, 0), (22, 0, 0), false);
        assert!(s.is_open_at(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(s.is_open_at(NaiveTime::from_hms_opt(15, 30, 0).unwrap()));
        assert!(s.is_open_at(NaiveTime::from_hms_opt(21, 59, 59).unwrap()));
    }

    #[test]
    fn test_closing_time_is_exclusive() {
        let s = schedule((9, 0, 0), (22, 0, 0), false);
        assert!(!s.is_open_at(NaiveTime::from_hms_opt(22, 0, 0).unwrap()));
        assert!(!s.is_open_at(NaiveTime::from_hms_opt(23, 0, 0).unwrap()));
    }

    #[test]
    fn test_closed_before_opening() {
        let s = schedule((9, 0, 0), (22, 0, 0), false);
        assert!(!s.is_open_at(NaiveTime::from_hms_opt(3, 15, 0).unwrap()));
        assert!(!s.is_open_at(NaiveTime::from_hms_opt(8, 59, 59).unwrap()));
    }

    #[test]
    fn test_round_the_clock_sentinel() {
        let s = schedule((0, 0, 0), (23, 59, 59), false);
        assert!(s.is_round_the_clock());
        assert!(s.is_open_at(NaiveTime::from_hms_opt(0, 0, 0).unwrap()));
        assert!(s.is_open_at(NaiveTime::from_hms_opt(3, 15, 0).unwrap()));
        assert!(s.is_open_at(NaiveTime::from_hms_opt(23, 59, 59).unwrap()));
    }

    #[test]
    fn test_is_closed_flag_wins() {
        let s = schedule((0, 0, 0), (23, 59, 59), true);
        assert!(!s.is_open_at(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }
}
