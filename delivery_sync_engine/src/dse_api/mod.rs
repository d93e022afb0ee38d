//! # Delivery sync engine public API
//!
//! * [`reconciler_api`] merges courier status observations, from webhooks or polling, into the stored delivery state.
//! * [`tracking_api`] polls the courier for recent open orders (the sweep) or for a single order on demand.
//! * [`dispatch_api`] requests riders from the courier and records vendor-supplied delivery details.
//!
//! All three share one [`OrderLocks`](order_locks::OrderLocks) instance, so writes to the same order never interleave.
//!
//! ```rust,ignore
//! use delivery_sync_engine::{events::EventProducers, ReconcilerApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let reconciler = ReconcilerApi::new(db, EventProducers::default());
//! let result = reconciler.reconcile(observation).await?;
//! ```

pub mod dispatch_api;
pub mod errors;
pub mod observation;
pub mod order_locks;
pub mod reconcile_objects;
pub mod reconciler_api;
pub mod sweep_objects;
pub mod tracking_api;
