//! Pure helpers used by the reconciliation flow.
//!
//! * [`status_mapper`] translates courier status codes into [`crate::db_types::DeliveryStatus`].
//! * [`history_ledger`] maintains the append-only status history of a delivery.
pub mod history_ledger;
pub mod status_mapper;

pub use status_mapper::map_courier_status;
