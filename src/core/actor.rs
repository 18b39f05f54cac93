//! Actor implementation for notification-based communication
//!
//! An Actor owns a message loop running as a task on the current tokio
//! runtime. Messages arrive on one channel, are handed to a MessageHandler,
//! and anything the handler sends goes out through the controller channel.

use crate::core::message::{Message, MessageHandler};
use std::marker::PhantomData;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A lightweight actor that handles notification messages.
///
/// Dropping the actor signals the loop to stop; `shutdown` additionally waits
/// for the loop task to finish. Outbound messages go through the
/// `ActorController` handed to the handler, so the outbound channel closes
/// once the loop ends.
pub struct Actor<T: Send + Sync + 'static, H: MessageHandler<T> + Send + Sync + 'static> {
    /// Channel for sending shutdown signal
    shutdown_sender: Option<oneshot::Sender<()>>,
    /// Handle to the message processing task
    task_handle: Option<JoinHandle<()>>,
    _phantom: PhantomData<(T, H)>,
}

impl<T: Send + Sync + 'static, H: MessageHandler<T> + Send + Sync + 'static> Actor<T, H> {
    /// Create a new Actor with the specified channels and handler.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `receiver` - Channel for receiving external messages
    /// * `sender` - Channel for sending messages to external recipients
    /// * `handler` - Message handler implementation
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Message<T>>,
        sender: mpsc::UnboundedSender<Message<T>>,
        handler: H,
    ) -> Self {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let controller = ActorController::new(sender);

        let task_handle = tokio::spawn(Self::run_message_loop(
            receiver,
            controller,
            handler,
            shutdown_receiver,
        ));

        Self {
            shutdown_sender: Some(shutdown_sender),
            task_handle: Some(task_handle),
            _phantom: PhantomData,
        }
    }

    /// Whether the message loop is still running.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    async fn run_message_loop(
        mut receiver: mpsc::UnboundedReceiver<Message<T>>,
        controller: ActorController<T>,
        mut handler: H,
        mut shutdown_receiver: oneshot::Receiver<()>,
    ) {
        loop {
            let message = tokio::select! {
                _ = &mut shutdown_receiver => {
                    log::debug!("Received shutdown signal, stopping message loop");
                    break;
                }
                message = receiver.recv() => message,
            };

            let Some(message) = message else {
                log::debug!("Receiver channel closed");
                break;
            };

            let method = message.method.clone();
            log::trace!("Received message: method={}", method);

            // A shutdown also abandons the message being handled
            tokio::select! {
                _ = &mut shutdown_receiver => {
                    log::debug!("Received shutdown signal while handling '{}'", method);
                    break;
                }
                _ = handler.on_message(message, &controller) => {}
            }
        }
    }

    /// Stop the message loop and wait for it to finish.
    pub async fn shutdown(&mut self) {
        log::debug!("Shutdown requested for Actor");

        if let Some(shutdown_sender) = self.shutdown_sender.take() {
            let _ = shutdown_sender.send(());
        }

        if let Some(task_handle) = self.task_handle.take() {
            let _ = task_handle.await;
        }
    }
}

impl<T: Send + Sync + 'static, H: MessageHandler<T> + Send + Sync + 'static> Drop for Actor<T, H> {
    fn drop(&mut self) {
        if let Some(shutdown_sender) = self.shutdown_sender.take() {
            log::debug!("Actor dropped without explicit shutdown, signalling loop");
            let _ = shutdown_sender.send(());
        }
    }
}

/// Error type for Actor message sending operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorSendError {
    ChannelClosed,
}

impl std::fmt::Display for ActorSendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorSendError::ChannelClosed => write!(f, "Actor channel is closed"),
        }
    }
}

impl std::error::Error for ActorSendError {}

/// Controller handed to message handlers for outgoing messages.
pub struct ActorController<T> {
    sender: mpsc::UnboundedSender<Message<T>>,
}

impl<T: Send + Sync + 'static> ActorController<T> {
    pub fn new(sender: mpsc::UnboundedSender<Message<T>>) -> Self {
        Self { sender }
    }

    /// Send a message to external recipients.
    pub fn send_message(&self, method: impl Into<String>, payload: T) -> Result<(), ActorSendError> {
        self.sender
            .send(Message::new(method, payload))
            .map_err(|_| ActorSendError::ChannelClosed)
    }
}

impl<T> Clone for ActorController<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
