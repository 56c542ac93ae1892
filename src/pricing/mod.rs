// Pricing engine
//
// Deterministic monetary calculation for checkout: line totals with
// modifier deltas, delivery fee from routed distance, platform service
// fee, and the delivery-time estimate. Pure except for the routing seam
// in `routing`, which callers resolve before invoking the math.

pub mod routing;

pub use routing::{DistanceProvider, HttpDistanceProvider, RouteEstimate, RoutingError};

use rust_decimal::{Decimal, RoundingStrategy};

/// Base delivery fee in currency units
pub const DELIVERY_BASE_FEE: Decimal = Decimal::from_parts(15, 0, 0, false, 0);
/// Per-kilometer delivery rate
pub const DELIVERY_PER_KM: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
/// Floor for the delivery fee
pub const DELIVERY_MIN_FEE: Decimal = Decimal::from_parts(20, 0, 0, false, 0);
/// Platform service fee as a fraction of the subtotal (5%)
pub const SERVICE_FEE_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

const PREP_BASE_MINUTES: i64 = 20;
const PREP_ADJUST_THRESHOLD: i64 = 3;
const PREP_ADJUST_PER_ITEM: i64 = 2;
const DEFAULT_TRAVEL_MINUTES: i64 = 15;
const WINDOW_SPREAD_MINUTES: i64 = 10;

/// One cart line as the engine sees it: the product base price, the price
/// deltas of the selected modifier options, and the quantity.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: i32,
    pub base_price: Decimal,
    pub modifier_deltas: Vec<Decimal>,
    pub quantity: i32,
}

impl CartLine {
    /// Final unit price including modifiers
    pub fn unit_price(&self) -> Result<Decimal, PricingError> {
        let unit: Decimal = self.base_price + self.modifier_deltas.iter().sum::<Decimal>();
        if unit < Decimal::ZERO {
            return Err(PricingError::NegativePrice {
                product_id: self.product_id,
            });
        }
        Ok(unit)
    }
}

/// Result of pricing a cart
#[derive(Debug, Clone, PartialEq)]
pub struct Pricing {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub distance_km: Decimal,
    pub route_is_default: bool,
}

/// Estimated delivery window in minutes from order placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub min_minutes: i64,
    pub max_minutes: i64,
}

/// Error types for pricing operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    /// A line references a product id with no catalog match. Raised at the
    /// catalog-resolution step that feeds `price_cart` its lines.
    #[error("Product {product_id} has no matching catalog entry")]
    InvalidItem { product_id: i32 },

    #[error("Computed line price for product {product_id} is negative")]
    NegativePrice { product_id: i32 },
}

/// Round half-up to two fractional digits. Applied after every component
/// calculation so each persisted amount is exactly what clients see.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Service for order price calculation
pub struct PricingEngine;

impl PricingEngine {
    /// Price a cart against a resolved route.
    ///
    /// # Arguments
    /// * `lines` - cart lines with base prices and modifier deltas
    /// * `route` - distance/duration from the routing provider (or its
    ///   deterministic fallback)
    ///
    /// # Returns
    /// Component-wise rounded `Pricing`; `total = subtotal + delivery_fee +
    /// service_fee` holds exactly over the rounded components.
    pub fn price_cart(lines: &[CartLine], route: &RouteEstimate) -> Result<Pricing, PricingError> {
        let mut subtotal = Decimal::ZERO;
        for line in lines {
            let unit = line.unit_price()?;
            subtotal += round2(unit) * Decimal::from(line.quantity);
        }
        let subtotal = round2(subtotal);

        let delivery_fee = Self::delivery_fee(route.distance_km);
        let service_fee = round2(subtotal * SERVICE_FEE_RATE);
        let total = round2(subtotal + delivery_fee + service_fee);

        Ok(Pricing {
            subtotal,
            delivery_fee,
            service_fee,
            total,
            distance_km: route.distance_km,
            route_is_default: route.is_default,
        })
    }

    /// `max(min_fee, base + per_km × distance)`, rounded to two digits
    pub fn delivery_fee(distance_km: Decimal) -> Decimal {
        let computed = DELIVERY_BASE_FEE + DELIVERY_PER_KM * distance_km;
        round2(computed.max(DELIVERY_MIN_FEE))
    }

    /// Delivery-window estimate: a preparation baseline that grows with
    /// order size plus the routed travel time.
    pub fn estimate_delivery_window(travel_min: Option<i64>, item_count: usize) -> DeliveryWindow {
        let prep_adjust = ((item_count as i64) - PREP_ADJUST_THRESHOLD).max(0) * PREP_ADJUST_PER_ITEM;
        let travel = travel_min.unwrap_or(DEFAULT_TRAVEL_MINUTES);
        let min_minutes = PREP_BASE_MINUTES + prep_adjust + travel;

        DeliveryWindow {
            min_minutes,
            max_minutes: min_minutes + WINDOW_SPREAD_MINUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn route(distance_km: Decimal) -> RouteEstimate {
        RouteEstimate {
            distance_km,
            duration_min: 12,
            is_default: false,
        }
    }

    #[test]
    fn test_constants_have_expected_values() {
        assert_eq!(DELIVERY_BASE_FEE, dec!(15));
        assert_eq!(DELIVERY_PER_KM, dec!(5));
        assert_eq!(DELIVERY_MIN_FEE, dec!(20));
        assert_eq!(SERVICE_FEE_RATE, dec!(0.05));
    }

    #[test]
    fn test_card_order_scenario() {
        // One item at 150.00 plus extra cheese 15.00, qty 1, 2 km
        let lines = vec![CartLine {
            product_id: 1,
            base_price: dec!(150.00),
            modifier_deltas: vec![dec!(15.00)],
            quantity: 1,
        }];

        let pricing = PricingEngine::price_cart(&lines, &route(dec!(2))).unwrap();

        assert_eq!(pricing.subtotal, dec!(165.00));
        assert_eq!(pricing.delivery_fee, dec!(25.00));
        assert_eq!(pricing.service_fee, dec!(8.25));
        assert_eq!(pricing.total, dec!(198.25));
    }

    #[test]
    fn test_delivery_fee_floor() {
        // 15 + 5 × 0.5 = 17.50, below the 20.00 floor
        assert_eq!(PricingEngine::delivery_fee(dec!(0.5)), dec!(20.00));
        assert_eq!(PricingEngine::delivery_fee(dec!(1)), dec!(20.00));
        assert_eq!(PricingEngine::delivery_fee(dec!(1.01)), dec!(20.05));
        assert_eq!(PricingEngine::delivery_fee(dec!(2)), dec!(25.00));
    }

    #[test]
    fn test_fallback_route_prices_at_five_km() {
        let lines = vec![CartLine {
            product_id: 1,
            base_price: dec!(100.00),
            modifier_deltas: vec![],
            quantity: 1,
        }];
        let fallback = routing::fallback_estimate();
        let pricing = PricingEngine::price_cart(&lines, &fallback).unwrap();

        assert!(pricing.route_is_default);
        assert_eq!(pricing.delivery_fee, dec!(40.00)); // 15 + 5 × 5
    }

    #[test]
    fn test_quantity_multiplies_line_total() {
        let lines = vec![CartLine {
            product_id: 1,
            base_price: dec!(45.50),
            modifier_deltas: vec![dec!(4.50)],
            quantity: 3,
        }];
        let pricing = PricingEngine::price_cart(&lines, &route(dec!(2))).unwrap();
        assert_eq!(pricing.subtotal, dec!(150.00));
    }

    #[test]
    fn test_service_fee_rounding_half_up() {
        // 33.33 × 0.05 = 1.6665 → 1.67
        let lines = vec![CartLine {
            product_id: 1,
            base_price: dec!(33.33),
            modifier_deltas: vec![],
            quantity: 1,
        }];
        let pricing = PricingEngine::price_cart(&lines, &route(dec!(2))).unwrap();
        assert_eq!(pricing.service_fee, dec!(1.67));
    }

    #[test]
    fn test_empty_cart_prices_to_minimums() {
        let pricing = PricingEngine::price_cart(&[], &route(dec!(1))).unwrap();
        assert_eq!(pricing.subtotal, dec!(0));
        assert_eq!(pricing.total, dec!(20.00));
    }

    #[test]
    fn test_delivery_window_small_order() {
        let window = PricingEngine::estimate_delivery_window(Some(15), 1);
        assert_eq!(window.min_minutes, 35);
        assert_eq!(window.max_minutes, 45);
    }

    #[test]
    fn test_delivery_window_grows_with_items() {
        // 5 items: prep 20 + (5 - 3) × 2 = 24, travel 10
        let window = PricingEngine::estimate_delivery_window(Some(10), 5);
        assert_eq!(window.min_minutes, 34);
        assert_eq!(window.max_minutes, 44);
    }

    #[test]
    fn test_delivery_window_default_travel() {
        let window = PricingEngine::estimate_delivery_window(None, 2);
        assert_eq!(window.min_minutes, 35);
        assert_eq!(window.max_minutes, 45);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_line() -> impl Strategy<Value = CartLine> {
        (
            1i32..10_000,
            0u32..=100_000u32,
            prop::collection::vec(0u32..=5_000u32, 0..4),
            1i32..=99,
        )
            .prop_map(|(product_id, price_cents, delta_cents, quantity)| CartLine {
                product_id,
                base_price: Decimal::from(price_cents) / Decimal::from(100),
                modifier_deltas: delta_cents
                    .into_iter()
                    .map(|c| Decimal::from(c) / Decimal::from(100))
                    .collect(),
                quantity,
            })
    }

    proptest! {
        /// Same inputs always price identically
        #[test]
        fn prop_pricing_is_deterministic(
            lines in prop::collection::vec(arb_line(), 1..6),
            distance_cents in 0u32..=50_000u32
        ) {
            let route = RouteEstimate {
                distance_km: Decimal::from(distance_cents) / Decimal::from(100),
                duration_min: 10,
                is_default: false,
            };
            let a = PricingEngine::price_cart(&lines, &route).unwrap();
            let b = PricingEngine::price_cart(&lines, &route).unwrap();
            prop_assert_eq!(a, b);
        }

        /// Total is exactly the sum of its rounded components
        #[test]
        fn prop_total_is_sum_of_components(
            lines in prop::collection::vec(arb_line(), 1..6),
            distance_cents in 0u32..=50_000u32
        ) {
            let route = RouteEstimate {
                distance_km: Decimal::from(distance_cents) / Decimal::from(100),
                duration_min: 10,
                is_default: false,
            };
            let p = PricingEngine::price_cart(&lines, &route).unwrap();
            prop_assert_eq!(p.total, p.subtotal + p.delivery_fee + p.service_fee);
        }

        /// Delivery fee never drops below the floor
        #[test]
        fn prop_delivery_fee_floor(distance_cents in 0u32..=100_000u32) {
            let fee = PricingEngine::delivery_fee(Decimal::from(distance_cents) / Decimal::from(100));
            prop_assert!(fee >= DELIVERY_MIN_FEE);
        }

        /// The window is always spread by exactly ten minutes
        #[test]
        fn prop_window_spread(travel in proptest::option::of(0i64..120), items in 0usize..50) {
            let w = PricingEngine::estimate_delivery_window(travel, items);
            prop_assert_eq!(w.max_minutes - w.min_minutes, 10);
            prop_assert!(w.min_minutes >= 20);
        }
    }
}
