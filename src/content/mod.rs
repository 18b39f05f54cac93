//! Content process side
//!
//! The page lives in an isolated, less trusted process. The privileged side
//! reaches it only through the JSON protocol in [`protocol`]; the
//! [`ContentActor`] answers those requests against the page's frame tree.

pub mod frame;
pub mod protocol;

pub use frame::{locate_find_selection, ControlKind, EditableControl, Frame, RangeRect, Selection};

use crate::core::{Actor, ActorController, Message, MessageHandler};
use async_trait::async_trait;
use protocol::{ContentRequest, ContentResponse, QueryOutcome};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContentError {
    #[error("DOM access failed: {0}")]
    Dom(String),

    #[error("Document is not loaded")]
    NotLoaded,
}

/// Live page as seen from inside the content process.
#[cfg_attr(test, mockall::automock)]
pub trait PageContent: Send + Sync {
    fn top_frame(&self) -> Result<Frame, ContentError>;
}

/// Page whose frame tree is replaced wholesale by the caller.
#[derive(Clone, Default)]
pub struct StaticPage {
    frame: Arc<Mutex<Option<Frame>>>,
}

impl StaticPage {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame: Arc::new(Mutex::new(Some(frame))),
        }
    }

    /// Page that has not finished loading.
    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn set_frame(&self, frame: Frame) {
        *self.frame.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
    }
}

impl PageContent for StaticPage {
    fn top_frame(&self) -> Result<Frame, ContentError> {
        self.frame
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ContentError::NotLoaded)
    }
}

/// Request handler running inside the content process.
pub struct ContentActor {
    page: Arc<dyn PageContent>,
    latency: Duration,
}

impl ContentActor {
    pub fn new(page: Arc<dyn PageContent>) -> Self {
        Self {
            page,
            latency: Duration::ZERO,
        }
    }

    /// Delay every reply, emulating a slow IPC round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn answer(&self, request: &ContentRequest) -> QueryOutcome {
        if request.version != protocol::PROTOCOL_VERSION {
            return QueryOutcome::Failed {
                message: format!(
                    "unsupported protocol version {} (expected {})",
                    request.version,
                    protocol::PROTOCOL_VERSION
                ),
            };
        }
        if request.query != protocol::FIND_SELECTION_GEOMETRY {
            return QueryOutcome::Failed {
                message: format!("unknown query '{}'", request.query),
            };
        }

        match self.page.top_frame() {
            Ok(top) => match locate_find_selection(&top) {
                Some(geometry) if geometry.is_finite() => QueryOutcome::Found { geometry },
                Some(geometry) => QueryOutcome::Failed {
                    message: format!("non-finite selection geometry {:?}", geometry),
                },
                None => QueryOutcome::NotFound,
            },
            Err(e) => QueryOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl MessageHandler<String> for ContentActor {
    async fn on_message(&mut self, message: Message<String>, controller: &ActorController<String>) {
        if message.method != protocol::REQUEST_METHOD {
            log::warn!("Content process ignoring unexpected method '{}'", message.method);
            return;
        }

        let request: ContentRequest = match protocol::decode(&message.payload) {
            Ok(request) => request,
            Err(e) => {
                // Without an id there is nobody to answer
                log::warn!("Content process dropping malformed request: {}", e);
                return;
            }
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let response = ContentResponse::new(request.id, self.answer(&request));
        log::debug!("Content process answering request {}: {:?}", request.id, response.outcome);

        match protocol::encode(&response) {
            Ok(text) => {
                if let Err(e) = controller.send_message(protocol::RESPONSE_METHOD, text) {
                    log::error!("Failed to send content response {}: {}", request.id, e);
                }
            }
            Err(e) => log::error!("Failed to encode content response {}: {}", request.id, e),
        }
    }
}

/// Privileged side's ends of the content process channels.
pub struct ContentChannel {
    pub requests: mpsc::UnboundedSender<Message<String>>,
    pub replies: mpsc::UnboundedReceiver<Message<String>>,
}

/// A running content process.
pub struct ContentProcess {
    actor: Option<Actor<String, ContentActor>>,
}

impl ContentProcess {
    /// Start the content actor. Must be called from within a tokio runtime.
    pub fn spawn(actor: ContentActor) -> (Self, ContentChannel) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        let process = Self {
            actor: Some(Actor::new(request_rx, reply_tx, actor)),
        };
        let channel = ContentChannel {
            requests: request_tx,
            replies: reply_rx,
        };
        (process, channel)
    }

    pub fn is_running(&self) -> bool {
        self.actor.as_ref().map(|a| a.is_running()).unwrap_or(false)
    }

    /// Stop the process. Requests still in flight are never answered and
    /// both channels close.
    pub async fn shutdown(&mut self) {
        if let Some(mut actor) = self.actor.take() {
            actor.shutdown().await;
            log::info!("Content process stopped");
        }
    }
}
