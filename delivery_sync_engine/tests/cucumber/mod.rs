mod delivery_world;
mod steps;

pub use delivery_world::{DeliverySystem, DeliveryWorld};
