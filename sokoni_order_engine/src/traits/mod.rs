//! # Database management and control.
//!
//! This module provides the interface contracts that order engine database *backends* must satisfy.
//!
//! ## Orders
//! An order is the central aggregate of the engine: a header row carrying the status, totals and
//! fulfillment state, plus its line items and an append-only ledger of adjustments. Backends are
//! responsible for keeping the aggregate consistent: every write recomputes the total from the
//! line items and bumps the order's version counter inside the same transaction.
//!
//! ## Traits
//! * [`OrderManagement`] defines the write side: creating orders, the amendment flow, status
//!   transitions, rider assignment and payment webhook processing.
//! * [`OrderQuery`] provides read-only projections: single orders, full aggregates and filtered
//!   lists.
//! * [`AuthManagement`] defines behaviour for managing user accounts and their roles.
//! * [`CatalogManagement`] provides access to the product catalog.
mod auth_management;
mod catalog_management;
mod order_management;
mod order_query;

pub use auth_management::{AuthApiError, AuthManagement};
pub use catalog_management::{CatalogApiError, CatalogManagement};
pub use order_management::{OrderManagement, OrderManagementError};
pub use order_query::{OrderQuery, OrderQueryError};
