//! Geometry queries against the content process, plus scenario replay
//!
//! Covers the request/response protocol over the actor channels, the frame
//! scan as seen through a real query, and the bundled demo scenario.

use findglow::content::protocol::{self, ContentRequest, ContentResponse, QueryOutcome};
use findglow::content::{
    ContentActor, ContentProcess, ControlKind, EditableControl, Frame, RangeRect, Selection, StaticPage,
};
use findglow::core::Message;
use findglow::find::{GeometryQuery, QueryError};
use findglow::host::OverlayEvent;
use findglow::scenario::{replay, Scenario};
use findglow::HighlightConfig;
use std::sync::Arc;
use std::time::Duration;

fn range(top: f64, bottom: f64) -> RangeRect {
    RangeRect {
        top,
        bottom,
        left: 0.0,
        right: 0.0,
    }
}

fn spawn(page: StaticPage) -> (ContentProcess, GeometryQuery) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (process, channel) = ContentProcess::spawn(ContentActor::new(Arc::new(page)));
    (process, GeometryQuery::new(channel))
}

#[tokio::test]
async fn test_query_reports_innermost_frame_first() {
    let page = Frame::named("top")
        .with_selection(Selection::around(range(1.0, 5.0)))
        .with_child(Frame::named("empty"))
        .with_child(
            Frame::named("outer").at(50.0, 1.0).with_child(
                Frame::named("inner")
                    .at(75.0, 1.5)
                    .with_selection(Selection::around(range(20.0, 40.0))),
            ),
        );
    let (_process, query) = spawn(StaticPage::new(page));

    let geometry = query.query().await.unwrap().unwrap();
    assert_eq!(geometry.top, 20.0);
    assert_eq!(geometry.bottom, 40.0);
    assert_eq!(geometry.view_origin_y, 75.0);
    assert_eq!(geometry.zoom, 1.5);
}

#[tokio::test]
async fn test_editor_selection_found_when_window_selection_is_collapsed() {
    let page = Frame::named("top")
        .with_selection(Selection::collapsed_at(range(0.0, 0.0)))
        .with_editable(EditableControl {
            kind: ControlKind::Button,
            selection: Some(Selection::around(range(1.0, 2.0))),
        })
        .with_editable(EditableControl {
            kind: ControlKind::Input,
            selection: Some(Selection::around(range(210.0, 226.0))),
        });
    let (_process, query) = spawn(StaticPage::new(page));

    let geometry = query.query().await.unwrap().unwrap();
    assert_eq!(geometry.top, 210.0);
}

#[tokio::test]
async fn test_page_changes_are_seen_by_next_query() {
    let page = StaticPage::new(Frame::named("top"));
    let (_process, query) = spawn(page.clone());
    assert_eq!(query.query().await.unwrap(), None);

    page.set_frame(Frame::named("top").with_selection(Selection::around(range(8.0, 16.0))));
    assert!(query.query().await.unwrap().is_some());
}

#[tokio::test]
async fn test_unloaded_document_is_remote_error() {
    let (_process, query) = spawn(StaticPage::unloaded());
    let err = query.query().await.unwrap_err();
    assert!(matches!(err, QueryError::Remote(_)));
}

#[tokio::test]
async fn test_content_actor_answers_raw_protocol() {
    let (mut process, mut channel) = ContentProcess::spawn(ContentActor::new(Arc::new(StaticPage::new(
        Frame::named("top").with_selection(Selection::around(range(3.0, 9.0))),
    ))));

    let mut stale = ContentRequest::find_selection_geometry(7);
    stale.version = 0;
    for request in [ContentRequest::find_selection_geometry(6), stale] {
        let text = protocol::encode(&request).unwrap();
        channel
            .requests
            .send(Message::new(protocol::REQUEST_METHOD, text))
            .unwrap();
    }

    let first = channel.replies.recv().await.unwrap();
    assert_eq!(first.method, protocol::RESPONSE_METHOD);
    let first: ContentResponse = protocol::decode(&first.payload).unwrap();
    assert_eq!(first.id, 6);
    assert!(matches!(first.outcome, QueryOutcome::Found { .. }));

    let second: ContentResponse = protocol::decode(&channel.replies.recv().await.unwrap().payload).unwrap();
    assert_eq!(second.id, 7);
    assert!(matches!(second.outcome, QueryOutcome::Failed { .. }));

    process.shutdown().await;
    assert!(!process.is_running());
    assert!(channel.replies.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_demo_scenario_replay() {
    let scenario = Scenario::from_json(include_str!("../demos/find_again.json")).unwrap();
    let report = replay(&scenario, HighlightConfig::default()).await;

    for (at, event) in &report.timeline {
        println!("{:>6}ms {}", at.as_millis(), event);
    }

    // Three finds; each trigger produced a box and they never overlapped
    assert_eq!(report.stats.find_commands, 3);
    assert_eq!(report.stats.highlights_started, 3);
    assert_eq!(report.max_visible, 1);

    let tops: Vec<f64> = report
        .timeline
        .iter()
        .filter_map(|(_, e)| match e {
            OverlayEvent::Opened { rect, .. } => Some(rect.top),
            _ => None,
        })
        .collect();
    assert_eq!(tops, vec![456.0, 606.0, 606.0]);

    let (last_at, last) = report.timeline.last().unwrap();
    assert!(matches!(last, OverlayEvent::Closed { .. }));
    assert!(*last_at >= Duration::from_millis(4000));
}
