// Network adapter modules split by the client socket vs plain HTTP routes.

pub mod client;
pub mod health;

pub use client::{spawn_update_serializer, ws_handler};
pub use health::health_handler;
