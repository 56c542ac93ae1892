use crate::auth::Role;
use crate::orders::OrderStatus;

/// The authoritative transition function for Order.status.
///
/// The table below is the single source of truth; the persistence layer
/// additionally guards every write with `UPDATE ... WHERE status = <from>`
/// so concurrent writers observe either one affected row or a stale state.
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition appears in the table
    ///
    /// # Valid Transitions
    /// - Pending → Confirmed (payment approved, or staff accept for cash)
    /// - Pending → Cancelled (payment rejected, or customer cancel)
    /// - Confirmed → Preparing, Cancelled
    /// - Preparing → ReadyForPickup, Cancelled
    /// - ReadyForPickup → OutForDelivery (courier claim)
    /// - OutForDelivery → Delivered (assigned courier)
    /// - Delivered → Refunded (administrative)
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        matches!(
            (from, to),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Confirmed, OrderStatus::Preparing)
                | (OrderStatus::Confirmed, OrderStatus::Cancelled)
                | (OrderStatus::Preparing, OrderStatus::ReadyForPickup)
                | (OrderStatus::Preparing, OrderStatus::Cancelled)
                | (OrderStatus::ReadyForPickup, OrderStatus::OutForDelivery)
                | (OrderStatus::OutForDelivery, OrderStatus::Delivered)
                | (OrderStatus::Delivered, OrderStatus::Refunded)
        )
    }

    /// Roles that may trigger a transition, per the actor column of the
    /// transition table. System-driven edges (webhook approval/rejection)
    /// bypass the policy evaluator and are not represented here beyond the
    /// staff/customer actors that may also trigger them.
    pub fn allowed_roles(from: OrderStatus, to: OrderStatus) -> &'static [Role] {
        match (from, to) {
            (OrderStatus::Pending, OrderStatus::Confirmed) => {
                &[Role::Owner, Role::BranchManager, Role::OrderManager]
            }
            (OrderStatus::Pending, OrderStatus::Cancelled) => &[Role::Customer],
            (OrderStatus::Confirmed, OrderStatus::Preparing)
            | (OrderStatus::Preparing, OrderStatus::ReadyForPickup) => &[
                Role::KitchenStaff,
                Role::Owner,
                Role::BranchManager,
                Role::OrderManager,
            ],
            (OrderStatus::Confirmed, OrderStatus::Cancelled)
            | (OrderStatus::Preparing, OrderStatus::Cancelled) => {
                &[Role::Owner, Role::BranchManager, Role::OrderManager]
            }
            (OrderStatus::ReadyForPickup, OrderStatus::OutForDelivery)
            | (OrderStatus::OutForDelivery, OrderStatus::Delivered) => {
                &[Role::DriverPlatform, Role::DriverRestaurant]
            }
            (OrderStatus::Delivered, OrderStatus::Refunded) => &[Role::SuperAdmin],
            _ => &[],
        }
    }

    /// Attempt a transition, returning the target status or an error message
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, String> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(format!("Invalid status transition from {} to {}", from, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    #[test]
    fn test_pending_to_confirmed() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Pending,
            OrderStatus::Confirmed
        ));
    }

    #[test]
    fn test_pending_to_cancelled() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Pending,
            OrderStatus::Cancelled
        ));
    }

    #[test]
    fn test_confirmed_to_preparing() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::Preparing
        ));
    }

    #[test]
    fn test_preparing_to_ready() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Preparing,
            OrderStatus::ReadyForPickup
        ));
    }

    #[test]
    fn test_ready_to_out_for_delivery() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::ReadyForPickup,
            OrderStatus::OutForDelivery
        ));
    }

    #[test]
    fn test_out_for_delivery_to_delivered() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered
        ));
    }

    #[test]
    fn test_staff_can_cancel_before_ready() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::Cancelled
        ));
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Preparing,
            OrderStatus::Cancelled
        ));
    }

    #[test]
    fn test_delivered_to_refunded() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Delivered,
            OrderStatus::Refunded
        ));
    }

    #[test]
    fn test_pending_to_delivered_is_illegal() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Pending,
            OrderStatus::Delivered
        ));
    }

    #[test]
    fn test_ready_orders_cannot_be_cancelled() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::ReadyForPickup,
            OrderStatus::Cancelled
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::OutForDelivery,
            OrderStatus::Cancelled
        ));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::Pending
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Preparing,
            OrderStatus::Confirmed
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::OutForDelivery,
            OrderStatus::ReadyForPickup
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Delivered,
            OrderStatus::OutForDelivery
        ));
    }

    #[test]
    fn test_no_skip_transitions() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Pending,
            OrderStatus::Preparing
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::ReadyForPickup
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::ReadyForPickup,
            OrderStatus::Delivered
        ));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        for to in ALL {
            assert!(!StatusMachine::is_valid_transition(
                OrderStatus::Cancelled,
                to
            ));
        }
    }

    #[test]
    fn test_refunded_is_terminal() {
        for to in ALL {
            assert!(!StatusMachine::is_valid_transition(
                OrderStatus::Refunded,
                to
            ));
        }
    }

    #[test]
    fn test_same_status_is_not_a_transition() {
        for status in ALL {
            assert!(!StatusMachine::is_valid_transition(status, status));
        }
    }

    #[test]
    fn test_transition_fn_matches_table() {
        let result = StatusMachine::transition(OrderStatus::Pending, OrderStatus::Confirmed);
        assert_eq!(result.unwrap(), OrderStatus::Confirmed);

        let result = StatusMachine::transition(OrderStatus::Pending, OrderStatus::Delivered);
        assert!(result.unwrap_err().contains("Invalid status transition"));
    }

    #[test]
    fn test_refund_roles() {
        let roles = StatusMachine::allowed_roles(OrderStatus::Delivered, OrderStatus::Refunded);
        assert_eq!(roles, &[crate::auth::Role::SuperAdmin]);
    }

    #[test]
    fn test_kitchen_roles_on_preparing_edges() {
        let roles = StatusMachine::allowed_roles(OrderStatus::Confirmed, OrderStatus::Preparing);
        assert!(roles.contains(&crate::auth::Role::KitchenStaff));
        assert!(roles.contains(&crate::auth::Role::Owner));

        let cancel = StatusMachine::allowed_roles(OrderStatus::Preparing, OrderStatus::Cancelled);
        assert!(!cancel.contains(&crate::auth::Role::KitchenStaff));
    }

    #[test]
    fn test_illegal_edges_have_no_roles() {
        assert!(StatusMachine::allowed_roles(OrderStatus::Pending, OrderStatus::Delivered).is_empty());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop_oneof![
            Just(OrderStatus::Pending),
            Just(OrderStatus::Confirmed),
            Just(OrderStatus::Preparing),
            Just(OrderStatus::ReadyForPickup),
            Just(OrderStatus::OutForDelivery),
            Just(OrderStatus::Delivered),
            Just(OrderStatus::Cancelled),
            Just(OrderStatus::Refunded),
        ]
    }

    /// transition() and is_valid_transition() never disagree
    #[test]
    fn prop_transition_consistency() {
        proptest!(|(
            from in order_status_strategy(),
            to in order_status_strategy()
        )| {
            let is_valid = StatusMachine::is_valid_transition(from, to);
            let result = StatusMachine::transition(from, to);
            prop_assert_eq!(is_valid, result.is_ok());
        });
    }

    /// Every edge with an actor is a legal edge
    #[test]
    fn prop_roles_only_on_legal_edges() {
        proptest!(|(
            from in order_status_strategy(),
            to in order_status_strategy()
        )| {
            if !StatusMachine::allowed_roles(from, to).is_empty() {
                prop_assert!(StatusMachine::is_valid_transition(from, to));
            }
        });
    }

    /// Terminal states have no outgoing edges
    #[test]
    fn prop_terminal_states_have_no_exits() {
        proptest!(|(to in order_status_strategy())| {
            prop_assert!(!StatusMachine::is_valid_transition(OrderStatus::Cancelled, to));
            prop_assert!(!StatusMachine::is_valid_transition(OrderStatus::Refunded, to));
        });
    }
}
