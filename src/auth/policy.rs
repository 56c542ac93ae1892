// Authorization evaluator
//
// Maps (principal, action, target) to an allow/deny decision using the
// principal's role bindings. Every protected handler calls `evaluate`
// exactly once; no ad-hoc role checks live in handlers or services.

use crate::auth::error::AuthError;
use crate::auth::middleware::AuthenticatedUser;
use crate::auth::models::Role;
use crate::orders::status_machine::StatusMachine;
use crate::orders::OrderStatus;

/// The order fields the evaluator needs to scope a decision
#[derive(Debug, Clone, Copy)]
pub struct OrderScope {
    pub restaurant_id: i32,
    pub branch_id: i32,
    pub customer_id: i32,
    pub delivery_driver_id: Option<i32>,
}

/// Operations gated by the evaluator
#[derive(Debug, Clone, Copy)]
pub enum Action {
    ViewCart,
    MutateCart,
    PlaceOrder,
    ManageAddresses,
    ViewOwnOrder,
    CancelOwnOrder,
    TransitionOrder { from: OrderStatus, to: OrderStatus },
    ViewRestaurantOrders,
    ViewAvailableOrders,
    ClaimOrder,
    CompleteDelivery,
    UpdateDriverProfile,
}

/// The entity an action is applied to
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Order(OrderScope),
    Restaurant { restaurant_id: i32 },
    User { user_id: i32 },
    OwnProfile,
}

/// Decide whether `principal` may perform `action` on `target`.
///
/// `super_admin` is allowed everything. Customer-facing actions require the
/// customer role over the principal's own rows; restaurant-side actions
/// require a binding scoped to the target restaurant (and branch, for
/// branch-scoped bindings); driver actions require a driver role, with the
/// full eligibility predicate enforced at claim time in SQL.
pub fn evaluate(
    principal: &AuthenticatedUser,
    action: Action,
    target: Target,
) -> Result<(), AuthError> {
    if principal.is_super_admin() {
        return Ok(());
    }

    let allowed = match action {
        Action::ViewCart | Action::MutateCart | Action::PlaceOrder | Action::ManageAddresses => {
            principal.has_role(Role::Customer) && owns_target(principal, target)
        }
        Action::ViewOwnOrder | Action::CancelOwnOrder => match target {
            Target::Order(scope) => {
                principal.has_role(Role::Customer) && scope.customer_id == principal.user_id
            }
            _ => false,
        },
        Action::TransitionOrder { from, to } => match target {
            Target::Order(scope) => may_transition(principal, from, to, scope),
            _ => false,
        },
        Action::ViewRestaurantOrders => {
            let restaurant_id = match target {
                Target::Restaurant { restaurant_id } => restaurant_id,
                Target::Order(scope) => scope.restaurant_id,
                _ => return deny(principal, action),
            };
            [
                Role::Owner,
                Role::BranchManager,
                Role::OrderManager,
                Role::KitchenStaff,
            ]
            .iter()
            .any(|role| {
                principal
                    .bindings
                    .iter()
                    .any(|b| b.role == *role && b.restaurant_id == Some(restaurant_id))
            })
        }
        Action::ViewAvailableOrders | Action::ClaimOrder => principal.is_driver(),
        Action::CompleteDelivery => match target {
            Target::Order(scope) => {
                principal.is_driver() && scope.delivery_driver_id == Some(principal.user_id)
            }
            _ => false,
        },
        Action::UpdateDriverProfile => principal.is_driver(),
    };

    if allowed {
        Ok(())
    } else {
        deny(principal, action)
    }
}

fn deny(principal: &AuthenticatedUser, action: Action) -> Result<(), AuthError> {
    Err(AuthError::InsufficientPermissions(format!(
        "User {} is not allowed to perform {:?}",
        principal.user_id, action
    )))
}

fn owns_target(principal: &AuthenticatedUser, target: Target) -> bool {
    match target {
        Target::User { user_id } => user_id == principal.user_id,
        _ => false,
    }
}

/// Role gate for a single state-machine edge, per the transition table
fn may_transition(
    principal: &AuthenticatedUser,
    from: OrderStatus,
    to: OrderStatus,
    scope: OrderScope,
) -> bool {
    StatusMachine::allowed_roles(from, to)
        .iter()
        .any(|role| match role {
            Role::Customer => {
                principal.has_role(Role::Customer) && scope.customer_id == principal.user_id
            }
            Role::DriverPlatform | Role::DriverRestaurant => {
                // Claims go through the dispatch engine; the only driver
                // transition reachable here is completing one's own delivery.
                principal.has_role(*role) && scope.delivery_driver_id == Some(principal.user_id)
            }
            Role::SuperAdmin => principal.is_super_admin(),
            staff => principal.binding_covering(*staff, scope.restaurant_id, scope.branch_id),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::RoleBinding;

    fn principal(bindings: Vec<RoleBinding>) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: 10,
            email: "p@example.com".to_string(),
            bindings,
        }
    }

    fn binding(role: Role, restaurant_id: Option<i32>, branch_id: Option<i32>) -> RoleBinding {
        RoleBinding {
            role,
            restaurant_id,
            branch_id,
        }
    }

    fn scope() -> OrderScope {
        OrderScope {
            restaurant_id: 5,
            branch_id: 2,
            customer_id: 10,
            delivery_driver_id: None,
        }
    }

    #[test]
    fn test_super_admin_allows_everything() {
        let admin = principal(vec![binding(Role::SuperAdmin, None, None)]);
        assert!(evaluate(
            &admin,
            Action::TransitionOrder {
                from: OrderStatus::Delivered,
                to: OrderStatus::Refunded,
            },
            Target::Order(scope()),
        )
        .is_ok());
        assert!(evaluate(&admin, Action::ViewRestaurantOrders, Target::Restaurant { restaurant_id: 99 }).is_ok());
    }

    #[test]
    fn test_customer_owns_own_cart_only() {
        let customer = principal(vec![binding(Role::Customer, None, None)]);
        assert!(evaluate(&customer, Action::MutateCart, Target::User { user_id: 10 }).is_ok());
        assert!(evaluate(&customer, Action::MutateCart, Target::User { user_id: 11 }).is_err());
    }

    #[test]
    fn test_customer_may_cancel_own_pending_order() {
        let customer = principal(vec![binding(Role::Customer, None, None)]);
        assert!(evaluate(
            &customer,
            Action::TransitionOrder {
                from: OrderStatus::Pending,
                to: OrderStatus::Cancelled,
            },
            Target::Order(scope()),
        )
        .is_ok());

        // Someone else's order
        let mut other = scope();
        other.customer_id = 99;
        assert!(evaluate(
            &customer,
            Action::TransitionOrder {
                from: OrderStatus::Pending,
                to: OrderStatus::Cancelled,
            },
            Target::Order(other),
        )
        .is_err());
    }

    #[test]
    fn test_kitchen_staff_scope() {
        let staff = principal(vec![binding(Role::KitchenStaff, Some(5), Some(2))]);
        let action = Action::TransitionOrder {
            from: OrderStatus::Confirmed,
            to: OrderStatus::Preparing,
        };
        assert!(evaluate(&staff, action, Target::Order(scope())).is_ok());

        // Wrong branch
        let mut elsewhere = scope();
        elsewhere.branch_id = 3;
        assert!(evaluate(&staff, action, Target::Order(elsewhere)).is_err());

        // Kitchen staff cannot cancel
        assert!(evaluate(
            &staff,
            Action::TransitionOrder {
                from: OrderStatus::Confirmed,
                to: OrderStatus::Cancelled,
            },
            Target::Order(scope()),
        )
        .is_err());
    }

    #[test]
    fn test_owner_covers_all_branches() {
        let owner = principal(vec![binding(Role::Owner, Some(5), None)]);
        let action = Action::TransitionOrder {
            from: OrderStatus::Preparing,
            to: OrderStatus::Cancelled,
        };
        let mut s = scope();
        s.branch_id = 42;
        assert!(evaluate(&owner, action, Target::Order(s)).is_ok());

        let mut other_restaurant = scope();
        other_restaurant.restaurant_id = 6;
        assert!(evaluate(&owner, action, Target::Order(other_restaurant)).is_err());
    }

    #[test]
    fn test_driver_completion_requires_assignment() {
        let driver = principal(vec![binding(Role::DriverPlatform, None, None)]);
        let mut assigned = scope();
        assigned.delivery_driver_id = Some(10);
        assert!(evaluate(&driver, Action::CompleteDelivery, Target::Order(assigned)).is_ok());

        let mut someone_else = scope();
        someone_else.delivery_driver_id = Some(77);
        assert!(evaluate(&driver, Action::CompleteDelivery, Target::Order(someone_else)).is_err());

        assert!(evaluate(&driver, Action::ClaimOrder, Target::Order(scope())).is_ok());
        assert!(evaluate(&driver, Action::ViewAvailableOrders, Target::OwnProfile).is_ok());
    }

    #[test]
    fn test_customer_cannot_run_restaurant_transitions() {
        let customer = principal(vec![binding(Role::Customer, None, None)]);
        assert!(evaluate(
            &customer,
            Action::TransitionOrder {
                from: OrderStatus::Confirmed,
                to: OrderStatus::Preparing,
            },
            Target::Order(scope()),
        )
        .is_err());
    }

    #[test]
    fn test_refund_is_super_admin_only() {
        let owner = principal(vec![binding(Role::Owner, Some(5), None)]);
        assert!(evaluate(
            &owner,
            Action::TransitionOrder {
                from: OrderStatus::Delivered,
                to: OrderStatus::Refunded,
            },
            Target::Order(scope()),
        )
        .is_err());
    }
}
