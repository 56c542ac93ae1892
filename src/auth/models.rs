use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Platform roles. Restaurant-scoped roles carry a restaurant (and
/// optionally branch) in their binding; platform-wide roles do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Owner,
    BranchManager,
    OrderManager,
    KitchenStaff,
    DriverPlatform,
    DriverRestaurant,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Owner => "owner",
            Role::BranchManager => "branch_manager",
            Role::OrderManager => "order_manager",
            Role::KitchenStaff => "kitchen_staff",
            Role::DriverPlatform => "driver_platform",
            Role::DriverRestaurant => "driver_restaurant",
            Role::Customer => "customer",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "owner" => Ok(Role::Owner),
            "branch_manager" => Ok(Role::BranchManager),
            "order_manager" => Ok(Role::OrderManager),
            "kitchen_staff" => Ok(Role::KitchenStaff),
            "driver_platform" => Ok(Role::DriverPlatform),
            "driver_restaurant" => Ok(Role::DriverRestaurant),
            "customer" => Ok(Role::Customer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }

    pub fn is_driver(&self) -> bool {
        matches!(self, Role::DriverPlatform | Role::DriverRestaurant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A role bound to an optional restaurant/branch scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub role: Role,
    pub restaurant_id: Option<i32>,
    pub branch_id: Option<i32>,
}

impl RoleBinding {
    /// Whether this binding grants `role` over the given restaurant/branch.
    ///
    /// A NULL branch on the binding means "every branch of the restaurant".
    pub fn covers(&self, role: Role, restaurant_id: i32, branch_id: i32) -> bool {
        self.role == role
            && self.restaurant_id == Some(restaurant_id)
            && (self.branch_id.is_none() || self.branch_id == Some(branch_id))
    }
}

/// Driver operational profile, 1:1 with users that hold a driver role
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DriverProfile {
    pub user_id: i32,
    pub vehicle_type: String,
    pub license_plate: String,
    pub status: String,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub kyc_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_string_round_trip() {
        for role in [
            Role::SuperAdmin,
            Role::Owner,
            Role::BranchManager,
            Role::OrderManager,
            Role::KitchenStaff,
            Role::DriverPlatform,
            Role::DriverRestaurant,
            Role::Customer,
        ] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
        assert!(Role::from_str("admin").is_err());
    }

    #[test]
    fn test_binding_covers_restaurant_scope() {
        let binding = RoleBinding {
            role: Role::Owner,
            restaurant_id: Some(7),
            branch_id: None,
        };
        assert!(binding.covers(Role::Owner, 7, 1));
        assert!(binding.covers(Role::Owner, 7, 99));
        assert!(!binding.covers(Role::Owner, 8, 1));
        assert!(!binding.covers(Role::KitchenStaff, 7, 1));
    }

    #[test]
    fn test_binding_covers_branch_scope() {
        let binding = RoleBinding {
            role: Role::BranchManager,
            restaurant_id: Some(7),
            branch_id: Some(3),
        };
        assert!(binding.covers(Role::BranchManager, 7, 3));
        assert!(!binding.covers(Role::BranchManager, 7, 4));
    }
}
