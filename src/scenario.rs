//! Scripted replay of a find session against the headless chrome
//!
//! A scenario describes a page, a viewport and a list of timed steps. Each
//! step either dispatches a host event or swaps the page content. Replaying
//! wires up the full stack (content process, geometry query, observer) and
//! reports every overlay transition the chrome saw.

use crate::config::HighlightConfig;
use crate::content::{ContentActor, ContentProcess, Frame, StaticPage};
use crate::find::{FindCommandObserver, GeometryQuery, ObserverStats};
use crate::geometry::ViewportRect;
use crate::host::{EventHub, HeadlessChrome, HostEvent, OverlayEvent};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Step {index} has neither an event nor a page")]
    EmptyStep { index: usize },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    #[serde(default)]
    pub event: Option<HostEvent>,
    /// Replaces the page content before `event` is dispatched
    #[serde(default)]
    pub page: Option<Frame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub viewport: ViewportRect,
    pub page: Frame,
    #[serde(default)]
    pub content_latency_ms: u64,
    pub steps: Vec<Step>,
    /// How long to keep running after the last step
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
}

fn default_linger_ms() -> u64 {
    3000
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        let mut scenario: Scenario = serde_json::from_str(text)?;
        if let Some(index) = scenario
            .steps
            .iter()
            .position(|step| step.event.is_none() && step.page.is_none())
        {
            return Err(ScenarioError::EmptyStep { index });
        }
        scenario.steps.sort_by_key(|step| step.at_ms);
        Ok(scenario)
    }
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub timeline: Vec<(Duration, OverlayEvent)>,
    pub stats: ObserverStats,
    pub max_visible: usize,
    pub stylesheets: Vec<String>,
}

/// Run `scenario` to completion. Must be called from within a tokio runtime;
/// steps are scheduled on the runtime clock.
pub async fn replay(scenario: &Scenario, config: HighlightConfig) -> ReplayReport {
    let hub = EventHub::new();
    let chrome = HeadlessChrome::new(scenario.viewport);
    let page = StaticPage::new(scenario.page.clone());
    let actor = ContentActor::new(Arc::new(page.clone()))
        .with_latency(Duration::from_millis(scenario.content_latency_ms));
    let (mut process, channel) = ContentProcess::spawn(actor);

    let observer = FindCommandObserver::new(hub.clone(), Arc::new(chrome.clone()), GeometryQuery::new(channel), config);
    observer.init();

    let start = Instant::now();
    let mut last_ms = 0;
    for step in &scenario.steps {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        last_ms = step.at_ms;

        if let Some(frame) = &step.page {
            log::info!("[{}ms] page content replaced", step.at_ms);
            page.set_frame(frame.clone());
        }
        if let Some(event) = &step.event {
            log::info!("[{}ms] dispatching {:?}", step.at_ms, event);
            hub.dispatch(event);
        }
    }
    tokio::time::sleep_until(start + Duration::from_millis(last_ms + scenario.linger_ms)).await;

    let stats = observer.stats();
    observer.shutdown();
    process.shutdown().await;

    ReplayReport {
        timeline: chrome.timeline(),
        stats,
        max_visible: chrome.max_visible(),
        stylesheets: chrome.stylesheets(),
    }
}
