//! Status transition permissions.
//!
//! Who may move an order into which status is defined here as a single data table rather than
//! being scattered through the route handlers. Each row of [`STATUS_PERMISSIONS`] says: a user
//! holding this role, standing in this relation to the order, may request these target statuses.
//! A request is permitted if any row matches.
//!
//! Two flows sit deliberately outside this table:
//! * Payment webhooks act with provider authority, not user authority.
//! * Completing a delivery is its own operation with its own rule (admin, or the assigned rider).

use crate::db_types::{Order, OrderStatus, Role, Roles};

/// How the acting user is related to the order being changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRelation {
    pub is_owner: bool,
    pub is_assigned_rider: bool,
}

impl OrderRelation {
    pub fn between(user_id: i64, order: &Order) -> Self {
        Self { is_owner: order.customer_id == user_id, is_assigned_rider: order.rider_id == Some(user_id) }
    }

    fn satisfies(&self, requirement: Requires) -> bool {
        match requirement {
            Requires::Nothing => true,
            Requires::AssignedRider => self.is_assigned_rider,
            Requires::Ownership => self.is_owner,
        }
    }
}

/// The relation a role must hold with the order before its row of the table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requires {
    Nothing,
    AssignedRider,
    Ownership,
}

const ALL_STATUSES: [OrderStatus; 5] =
    [OrderStatus::Created, OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Completed, OrderStatus::Cancelled];

const STATUS_PERMISSIONS: [(Role, Requires, &[OrderStatus]); 3] = [
    (Role::Admin, Requires::Nothing, &ALL_STATUSES),
    (Role::Rider, Requires::AssignedRider, &[OrderStatus::Shipped, OrderStatus::Completed, OrderStatus::Paid]),
    (Role::Customer, Requires::Ownership, &[OrderStatus::Cancelled]),
];

/// Returns true if a user holding `roles`, related to the order as described by `relation`,
/// may move the order into `target`.
pub fn may_set_status(roles: &Roles, relation: OrderRelation, target: OrderStatus) -> bool {
    STATUS_PERMISSIONS
        .iter()
        .any(|(role, requires, targets)| roles.contains(*role) && relation.satisfies(*requires) && targets.contains(&target))
}
