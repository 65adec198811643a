//! # Sokoni order engine public API
//!
//! The `soe_api` module exposes the programmatic API for the Sokoni order engine.
//! The API is modular, so that clients of the API can pick and choose the functionality they want,
//! and different parts (e.g. auth and orders) could be hosted on different machines, or even use
//! Sqlite for one and Postgres for the other.
//!
//! * [`order_flow_api`] is the primary API for the order lifecycle. It enforces the role and
//!   relationship permission rules, drives the fulfillment adjustment flow, and emits events for
//!   every successful mutation.
//! * [`auth_api`] handles account registration, password verification and role management.
//! * [`catalog_api`] provides read access to the product catalog.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a
//! database backend that implements the specific backend traits required by the API.
//!
//! For example, to look up a product:
//!
//! ```rust,ignore
//! use sokoni_order_engine::{CatalogApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements CatalogManagement
//! let api = CatalogApi::new(db);
//! let product = api.product(1).await?;
//! ```

pub mod auth_api;
pub mod catalog_api;
pub mod order_flow_api;
pub mod order_objects;
