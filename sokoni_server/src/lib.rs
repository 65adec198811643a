//! The Sokoni REST server.
//!
//! This crate is the HTTP boundary around [`sokoni_order_engine`]. It owns
//! * the route definitions and their handlers ([`routes`]),
//! * JWT issuance and verification ([`auth`]) plus the role ACL middleware ([`middleware`]),
//! * the environment-driven configuration ([`config`]), and
//! * the server assembly itself ([`server`]).
//!
//! All business rules live in the engine. Handlers translate HTTP payloads into engine calls and engine errors
//! into HTTP status codes, and deliberately nothing more.

pub mod auth;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
