//! Privileged-side client of the content process geometry query.
//!
//! Each call sends one `findSelectionGeometry` request and waits for the
//! reply with the matching id. A background pump routes replies to their
//! waiting callers. There is no timeout; a content process that goes away
//! fails every outstanding call.

use crate::content::protocol::{self, ContentRequest, ContentResponse, QueryOutcome};
use crate::content::ContentChannel;
use crate::core::Message;
use crate::geometry::FindResultGeometry;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Content process is unreachable")]
    ChannelClosed,

    #[error("Content process went away before replying")]
    ReplyDropped,

    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Content process failed: {0}")]
    Remote(String),

    #[error("Malformed content reply: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type Waiter = oneshot::Sender<QueryResult<ContentResponse>>;
type PendingReplies = Arc<Mutex<HashMap<u64, Waiter>>>;

/// Just enough of a reply to find its waiter when the rest does not decode.
#[derive(Deserialize)]
struct ReplyId {
    id: u64,
}

pub struct GeometryQuery {
    next_id: AtomicU64,
    requests: mpsc::UnboundedSender<Message<String>>,
    pending: PendingReplies,
    pump: JoinHandle<()>,
}

impl GeometryQuery {
    /// Attach to a content process. Must be called from within a tokio
    /// runtime.
    pub fn new(channel: ContentChannel) -> Self {
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let pump = tokio::spawn(Self::run_reply_pump(channel.replies, pending.clone()));

        Self {
            next_id: AtomicU64::new(1),
            requests: channel.requests,
            pending,
            pump,
        }
    }

    /// Ask the content process where the find selection is.
    ///
    /// `Ok(None)` means the page holds no qualifying selection.
    pub async fn query(&self) -> QueryResult<Option<FindResultGeometry>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = protocol::encode(&ContentRequest::find_selection_geometry(id))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.lock_pending().insert(id, reply_tx);

        if self
            .requests
            .send(Message::new(protocol::REQUEST_METHOD, text))
            .is_err()
        {
            self.lock_pending().remove(&id);
            return Err(QueryError::ChannelClosed);
        }
        log::debug!("Sent geometry query {}", id);

        let response = reply_rx.await.map_err(|_| QueryError::ReplyDropped)??;
        if response.version != protocol::PROTOCOL_VERSION {
            return Err(QueryError::VersionMismatch {
                expected: protocol::PROTOCOL_VERSION,
                actual: response.version,
            });
        }

        match response.outcome {
            QueryOutcome::Found { geometry } => Ok(Some(geometry)),
            QueryOutcome::NotFound => Ok(None),
            QueryOutcome::Failed { message } => Err(QueryError::Remote(message)),
        }
    }

    /// Number of queries still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.lock_pending().len()
    }

    async fn run_reply_pump(mut replies: mpsc::UnboundedReceiver<Message<String>>, pending: PendingReplies) {
        while let Some(message) = replies.recv().await {
            if message.method != protocol::RESPONSE_METHOD {
                log::warn!("Ignoring unexpected content message '{}'", message.method);
                continue;
            }
            let (id, reply) = match protocol::decode::<ContentResponse>(&message.payload) {
                Ok(response) => (response.id, Ok(response)),
                Err(e) => match protocol::decode::<ReplyId>(&message.payload) {
                    Ok(ReplyId { id }) => {
                        log::warn!("Content reply {} does not decode: {}", id, e);
                        (id, Err(QueryError::Malformed(e.to_string())))
                    }
                    Err(_) => {
                        log::warn!("Dropping content reply without an id: {}", e);
                        continue;
                    }
                },
            };

            let waiter = pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
            match waiter {
                Some(waiter) => {
                    let _ = waiter.send(reply);
                }
                None => log::warn!("Reply {} has no waiting query", id),
            }
        }

        log::debug!("Content reply channel closed, failing outstanding queries");
        pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Waiter>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for GeometryQuery {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentActor, ContentProcess, Frame, RangeRect, Selection, StaticPage};
    use std::time::Duration;

    fn page_with_selection() -> StaticPage {
        StaticPage::new(
            Frame::named("top").with_child(
                Frame::named("child")
                    .at(40.0, 1.0)
                    .with_selection(Selection::around(RangeRect {
                        top: 10.0,
                        bottom: 22.0,
                        left: 0.0,
                        right: 0.0,
                    })),
            ),
        )
    }

    #[tokio::test]
    async fn test_query_found() {
        let (_process, channel) = ContentProcess::spawn(ContentActor::new(Arc::new(page_with_selection())));
        let query = GeometryQuery::new(channel);

        let geometry = query.query().await.unwrap().unwrap();
        assert_eq!(geometry.top, 10.0);
        assert_eq!(geometry.bottom, 22.0);
        assert_eq!(geometry.view_origin_y, 40.0);
        assert_eq!(query.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_query_not_found() {
        let (_process, channel) =
            ContentProcess::spawn(ContentActor::new(Arc::new(StaticPage::new(Frame::named("top")))));
        let query = GeometryQuery::new(channel);

        assert!(query.query().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_failure_is_error() {
        let (_process, channel) = ContentProcess::spawn(ContentActor::new(Arc::new(StaticPage::unloaded())));
        let query = GeometryQuery::new(channel);

        let err = query.query().await.unwrap_err();
        assert!(matches!(err, QueryError::Remote(_)));
        assert_eq!(err.to_string(), "Content process failed: Document is not loaded");
    }

    #[tokio::test]
    async fn test_unreachable_process() {
        let (mut process, channel) = ContentProcess::spawn(ContentActor::new(Arc::new(page_with_selection())));
        let query = GeometryQuery::new(channel);
        process.shutdown().await;

        let err = query.query().await.unwrap_err();
        assert!(matches!(err, QueryError::ChannelClosed | QueryError::ReplyDropped));
        assert_eq!(query.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_dies_mid_query() {
        let actor = ContentActor::new(Arc::new(page_with_selection())).with_latency(Duration::from_secs(1));
        let (mut process, channel) = ContentProcess::spawn(actor);
        let query = Arc::new(GeometryQuery::new(channel));

        let pending = {
            let query = query.clone();
            tokio::spawn(async move { query.query().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(query.in_flight(), 1);

        process.shutdown().await;
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, QueryError::ReplyDropped));
    }

    #[tokio::test]
    async fn test_concurrent_queries_matched_by_id() {
        let (_process, channel) = ContentProcess::spawn(ContentActor::new(Arc::new(page_with_selection())));
        let query = GeometryQuery::new(channel);

        let (a, b) = tokio::join!(query.query(), query.query());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(query.in_flight(), 0);
    }

    /// Fake content process answering every request with `reply(id)`.
    fn fake_peer(reply: fn(u64) -> String) -> GeometryQuery {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Message<String>>();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(message) = request_rx.recv().await {
                let request: ContentRequest = protocol::decode(&message.payload).unwrap();
                let _ = reply_tx.send(Message::new(protocol::RESPONSE_METHOD, reply(request.id)));
            }
        });
        GeometryQuery::new(ContentChannel {
            requests: request_tx,
            replies: reply_rx,
        })
    }

    #[tokio::test]
    async fn test_undecodable_reply_fails_query() {
        // A NaN origin serializes as null, which a geometry cannot hold
        let query = fake_peer(|id| {
            format!(
                r#"{{"id":{},"version":1,"outcome":{{"status":"found","geometry":{{"top":1.0,"bottom":2.0,"view_origin_y":null,"zoom":1.0}}}}}}"#,
                id
            )
        });

        let result = tokio::time::timeout(Duration::from_secs(2), query.query()).await;
        let err = result.expect("query must settle").unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
        assert_eq!(query.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_reply_without_id_is_ignored() {
        let query = fake_peer(|_| "{\"garbage\":true}".to_string());

        let result = tokio::time::timeout(Duration::from_millis(50), query.query()).await;
        assert!(result.is_err(), "nothing identifies the waiter");
    }

    #[tokio::test]
    async fn test_non_finite_page_geometry_fails_query() {
        let page = StaticPage::new(
            Frame::named("top").at(f64::NAN, 1.0).with_selection(Selection::around(RangeRect {
                top: 10.0,
                bottom: 22.0,
                left: 0.0,
                right: 0.0,
            })),
        );
        let (_process, channel) = ContentProcess::spawn(ContentActor::new(Arc::new(page)));
        let query = GeometryQuery::new(channel);

        let result = tokio::time::timeout(Duration::from_secs(2), query.query()).await;
        assert!(matches!(result.expect("query must settle"), Err(QueryError::Remote(_))));
        assert_eq!(query.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Message<String>>();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let query = GeometryQuery::new(ContentChannel {
            requests: request_tx,
            replies: reply_rx,
        });

        // Fake content process speaking a newer protocol
        tokio::spawn(async move {
            while let Some(message) = request_rx.recv().await {
                let request: ContentRequest = protocol::decode(&message.payload).unwrap();
                let response = ContentResponse {
                    id: request.id,
                    version: protocol::PROTOCOL_VERSION + 1,
                    outcome: QueryOutcome::NotFound,
                };
                let text = protocol::encode(&response).unwrap();
                reply_tx.send(Message::new(protocol::RESPONSE_METHOD, text)).unwrap();
            }
        });

        let err = query.query().await.unwrap_err();
        assert!(matches!(err, QueryError::VersionMismatch { expected: 1, actual: 2 }));
    }
}
