//! Adapters between the engine and the outside world: the courier platform and the vendor notification service.
//!
//! Each integration subscribes to the engine's events with its own [`delivery_sync_engine::events::EventHandlers`].
pub mod courier;
pub mod notifier;
