//! Core module for notification-based communication
//!
//! A lightweight actor system: a message loop per actor, typed payloads and
//! a controller for replies. The content process side of the geometry query
//! runs on it.

pub mod actor;
pub mod message;

// Re-exports for convenience
pub use actor::{Actor, ActorController, ActorSendError};
pub use message::{Message, MessageHandler};
