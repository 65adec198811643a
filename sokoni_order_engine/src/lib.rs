//! Sokoni Order Engine
//!
//! The Sokoni order engine drives the order lifecycle for the Sokoni storefront: order capture,
//! payment reconciliation, delivery handoff, and the fulfillment adjustment flow that keeps an
//! order's totals honest when the pickers find the shelves emptier than the catalog claimed.
//! This library contains the core logic for the engine. It is HTTP-framework agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the
//!    data types used in the database. These are defined in the [`mod@db_types`] module and are
//!    public.
//! 2. The engine public API ([`OrderFlowApi`], [`AuthApi`], [`CatalogApi`]). This provides the
//!    public-facing functionality of the engine. It is responsible for managing orders,
//!    permissions, accounts and the catalog. Specific backends need to implement the traits in
//!    [`mod@traits`] in order to act as a backend for the Sokoni server.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted
//! when certain actions occur, for example when an order is paid or cancelled. A simple actor
//! framework is used so that you can easily hook into these events and perform custom actions,
//! such as invalidating caches or pushing order state to connected clients.

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod permissions;
mod soe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use soe_api::{auth_api::AuthApi, catalog_api::CatalogApi, order_flow_api::OrderFlowApi, order_objects};
pub use traits::{AuthManagement, CatalogManagement, OrderManagement, OrderQuery};
