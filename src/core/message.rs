//! Message types and handler traits for the Actor system.

use async_trait::async_trait;

/// A generic message in the Actor system.
/// T represents the payload type, which can be any type that satisfies the required bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    /// The method name for this message
    pub method: String,
    /// The message payload
    pub payload: T,
}

impl<T> Message<T> {
    /// Create a new Message with the specified method and payload.
    pub fn new(method: impl Into<String>, payload: T) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }
}

/// Trait for handling messages in the Actor system.
///
/// Implementors define how to process incoming messages and can send replies
/// using the provided ActorController.
#[async_trait]
pub trait MessageHandler<T> {
    /// Handle an incoming message.
    ///
    /// # Arguments
    /// * `message` - The incoming message to process
    /// * `controller` - Controller for outgoing messages (replies, forwarding, etc.)
    async fn on_message(&mut self, message: Message<T>, controller: &crate::core::ActorController<T>);
}
