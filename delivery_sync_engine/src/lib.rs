//! Delivery Sync Engine
//!
//! The engine keeps the locally stored delivery status of marketplace orders in step with what the courier reports.
//! Courier updates arrive over two unreliable channels, push (webhooks) and pull (polling), in any order and possibly
//! more than once. The engine turns each report into a [`StatusObservation`] and reconciles it against the stored
//! record with monotone, idempotent transition rules.
//!
//! The library is divided into:
//! 1. Data types ([`mod@db_types`]) and the backend traits ([`mod@traits`]). [`SqliteDatabase`] is the provided
//!    [`DeliveryStore`] implementation; the courier platform is abstracted behind [`CourierGateway`].
//! 2. The public API ([`ReconcilerApi`], [`TrackingApi`], [`DispatchApi`]).
//! 3. Pure helpers: the courier status mapper and the history ledger ([`mod@helpers`]).
//!
//! Side effects such as vendor notifications are never performed inline. The engine publishes events
//! ([`mod@events`]) after a change is committed, and the host application subscribes to them with hooks.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

mod dse_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use dse_api::{
    dispatch_api::DispatchApi,
    errors::{DispatchError, ReconcileError, TrackingError},
    observation::StatusObservation,
    order_locks::OrderLocks,
    reconcile_objects,
    reconciler_api::ReconcilerApi,
    sweep_objects,
    tracking_api::TrackingApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{CourierGateway, DeliveryStore};
