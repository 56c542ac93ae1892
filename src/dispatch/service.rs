use std::sync::Arc;

use crate::auth::{evaluate, Action, AuthenticatedUser, DriverProfile, Target};
use crate::cart::repository::CatalogRepository;
use crate::dispatch::error::DispatchError;
use crate::dispatch::geo::haversine_km;
use crate::dispatch::models::{
    AvailableOrderView, DriverStatus, EligibleDriver, PLATFORM_RADIUS_KM,
};
use crate::dispatch::repository::DispatchRepository;
use crate::models::{Branch, GeoPoint};
use crate::orders::repository::OrdersRepository;
use crate::orders::service::{order_event_payload, order_scope};
use crate::orders::{Order, OrderStatus};
use crate::realtime::{EventType, RealtimeBus};

/// Dispatch engine: computes the eligibility set, announces ready orders,
/// and arbitrates claims with first-writer-wins semantics.
#[derive(Clone)]
pub struct DispatchService {
    repo: DispatchRepository,
    catalog: CatalogRepository,
    orders: OrdersRepository,
    realtime: Arc<RealtimeBus>,
}

/// Platform drivers within the claim radius of the branch
pub(crate) fn within_radius(
    drivers: &[EligibleDriver],
    branch_point: GeoPoint,
    radius_km: f64,
) -> Vec<i32> {
    drivers
        .iter()
        .filter_map(|driver| {
            let point = driver.point()?;
            (haversine_km(point, branch_point) <= radius_km).then_some(driver.user_id)
        })
        .collect()
}

impl DispatchService {
    pub fn new(
        repo: DispatchRepository,
        catalog: CatalogRepository,
        orders: OrdersRepository,
        realtime: Arc<RealtimeBus>,
    ) -> Self {
        Self {
            repo,
            catalog,
            orders,
            realtime,
        }
    }

    /// The user ids currently eligible to claim an order at `branch`
    pub async fn eligibility_set(&self, branch: &Branch) -> Result<Vec<i32>, DispatchError> {
        if branch.uses_platform_drivers {
            let candidates = self.repo.online_platform_drivers().await?;
            Ok(within_radius(&candidates, branch.point(), PLATFORM_RADIUS_KM))
        } else {
            let drivers = self.repo.online_restaurant_drivers(branch.restaurant_id).await?;
            Ok(drivers.into_iter().map(|d| d.user_id).collect())
        }
    }

    /// Fan an AVAILABLE_ORDER event to every eligible driver. Invoked after
    /// the ready_for_pickup transition has committed; holds no transaction.
    pub async fn announce(&self, order: &Order) -> Result<(), DispatchError> {
        let branch = self
            .catalog
            .find_branch(order.branch_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        let address = self
            .catalog
            .find_address(order.address_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        let eligible = self.eligibility_set(&branch).await?;
        tracing::info!(
            "Announcing order {} to {} eligible driver(s)",
            order.id,
            eligible.len()
        );

        let payload = serde_json::json!({
            "orderId": order.id,
            "branchId": branch.id,
            "branchName": branch.name,
            "pickup": { "latitude": branch.latitude, "longitude": branch.longitude },
            "dropoff": { "latitude": address.latitude, "longitude": address.longitude },
            "total": order.total,
            "paymentMethod": order.payment_method,
            "orderPlacedAt": order.order_placed_at,
        });

        for driver_id in eligible {
            self.realtime
                .emit_to_user(driver_id, EventType::AvailableOrder, payload.clone())
                .await;
        }

        Ok(())
    }

    /// Driver claim. At most one concurrent claimer succeeds; the losers
    /// observe zero affected rows and get ORDER_ALREADY_TAKEN.
    pub async fn claim(
        &self,
        user: &AuthenticatedUser,
        order_id: i64,
    ) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        let branch = self
            .catalog
            .find_branch(order.branch_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        evaluate(
            user,
            Action::ClaimOrder,
            Target::Order(order_scope(&order, branch.restaurant_id)),
        )?;

        let rows = self
            .repo
            .claim(order_id, user.user_id, &branch, PLATFORM_RADIUS_KM)
            .await?;

        if rows == 0 {
            // Distinguish a lost race from an ineligible claimer
            let current = self
                .orders
                .find_by_id(order_id)
                .await
                .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
                .ok_or(DispatchError::OrderNotFound)?;

            if current.status == OrderStatus::ReadyForPickup
                && current.delivery_driver_id.is_none()
            {
                return Err(DispatchError::NotEligible);
            }
            return Err(DispatchError::AlreadyTaken);
        }

        let claimed = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        tracing::info!("Order {} claimed by driver {}", order_id, user.user_id);

        let payload = order_event_payload(&claimed, branch.restaurant_id);
        self.realtime
            .emit_to_restaurant(branch.restaurant_id, EventType::OrderClaimed, payload.clone())
            .await;
        self.realtime
            .emit_to_user(claimed.customer_id, EventType::OrderStatusChanged, payload.clone())
            .await;

        // Withdraw the announcement from the drivers who lost the race
        let eligible = self.eligibility_set(&branch).await?;
        let withdrawal = serde_json::json!({ "orderId": claimed.id });
        for driver_id in eligible {
            if driver_id != user.user_id {
                self.realtime
                    .emit_to_user(
                        driver_id,
                        EventType::AvailableOrderWithdrawn,
                        withdrawal.clone(),
                    )
                    .await;
            }
        }

        Ok(claimed)
    }

    /// Assigned driver marks the order delivered. Cash orders settle their
    /// payment in the same write.
    pub async fn complete(
        &self,
        user: &AuthenticatedUser,
        order_id: i64,
    ) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        let restaurant_id = self
            .orders
            .restaurant_of_order(order_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        evaluate(
            user,
            Action::CompleteDelivery,
            Target::Order(order_scope(&order, restaurant_id)),
        )?;

        let rows = self.repo.mark_delivered(order_id, user.user_id).await?;
        if rows == 0 {
            return Err(DispatchError::NotAssigned);
        }

        let delivered = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| DispatchError::DatabaseError(e.to_string()))?
            .ok_or(DispatchError::OrderNotFound)?;

        tracing::info!("Order {} delivered by driver {}", order_id, user.user_id);

        let payload = order_event_payload(&delivered, restaurant_id);
        self.realtime
            .emit_to_restaurant(restaurant_id, EventType::OrderStatusChanged, payload.clone())
            .await;
        self.realtime
            .emit_to_user(delivered.customer_id, EventType::OrderStatusChanged, payload)
            .await;

        Ok(delivered)
    }

    /// Paginated pull listing of claimable orders
    pub async fn available_orders(
        &self,
        user: &AuthenticatedUser,
        page: u32,
        limit: u32,
    ) -> Result<Vec<AvailableOrderView>, DispatchError> {
        evaluate(user, Action::ViewAvailableOrders, Target::OwnProfile)?;

        let offset = (page - 1) * limit;
        self.repo
            .available_orders_for_driver(user.user_id, PLATFORM_RADIUS_KM, limit, offset)
            .await
    }

    /// The caller's own courier profile
    pub async fn profile(&self, user: &AuthenticatedUser) -> Result<DriverProfile, DispatchError> {
        evaluate(user, Action::UpdateDriverProfile, Target::OwnProfile)?;

        self.repo
            .find_profile(user.user_id)
            .await?
            .ok_or(DispatchError::ProfileNotFound)
    }

    pub async fn set_status(
        &self,
        user: &AuthenticatedUser,
        status: DriverStatus,
    ) -> Result<(), DispatchError> {
        evaluate(user, Action::UpdateDriverProfile, Target::OwnProfile)?;

        let rows = self.repo.set_status(user.user_id, status).await?;
        if rows == 0 {
            return Err(DispatchError::ProfileNotFound);
        }

        tracing::debug!("Driver {} is now {}", user.user_id, status);
        Ok(())
    }

    pub async fn update_location(
        &self,
        user: &AuthenticatedUser,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), DispatchError> {
        evaluate(user, Action::UpdateDriverProfile, Target::OwnProfile)?;

        let rows = self
            .repo
            .update_location(user.user_id, latitude, longitude)
            .await?;
        if rows == 0 {
            return Err(DispatchError::ProfileNotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(user_id: i32, lat: f64, lng: f64) -> EligibleDriver {
        EligibleDriver {
            user_id,
            current_lat: Some(lat),
            current_lng: Some(lng),
        }
    }

    #[test]
    fn test_within_radius_filters_far_drivers() {
        let branch = GeoPoint::new(19.4326, -99.1332);
        let drivers = vec![
            driver(1, 19.4330, -99.1340),  // a few hundred meters
            driver(2, 19.5000, -99.3000),  // well outside 10 km
            driver(3, 19.4115, -99.1710),  // ~4.5 km
        ];

        let eligible = within_radius(&drivers, branch, PLATFORM_RADIUS_KM);
        assert_eq!(eligible, vec![1, 3]);
    }

    #[test]
    fn test_drivers_without_fix_are_excluded() {
        let branch = GeoPoint::new(19.4326, -99.1332);
        let drivers = vec![EligibleDriver {
            user_id: 9,
            current_lat: None,
            current_lng: None,
        }];

        assert!(within_radius(&drivers, branch, PLATFORM_RADIUS_KM).is_empty());
    }
}
