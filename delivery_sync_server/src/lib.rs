//! # Delivery sync server
//! This crate hosts the server for the delivery sync engine. It is responsible for:
//! * Listening for courier status webhooks and feeding them to the reconciler.
//! * Periodically polling the courier for the status of recent open orders (the poll sweeper).
//! * Dispatching orders to the courier and recording OTPs, on behalf of operators.
//! * Notifying vendors when a rider has been assigned to one of their orders.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/delivery-events`: The courier webhook. Access can be restricted to a whitelist of courier IP addresses.
//! * `/delivery/{order_number}`: The delivery record for an order, with its status history.
//! * `/delivery/{order_number}/track`: Polls the courier for the order right away.
//! * `/delivery/{order_number}/dispatch`: Requests a rider for the order.
//! * `/delivery/{order_number}/otps`: Records the pickup and delivery OTPs for the order.
pub mod cli;
pub mod config;
pub mod courier_routes;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod poll_sweeper;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
