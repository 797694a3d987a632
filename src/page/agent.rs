//! In-page capture agent: tracks the last selection inside a compose region, shows the floating
//! trigger, and writes finished rewrites back into the page.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::document::{Boundary, Document, NodeId, Range};
use super::locator::Locator;
use crate::commands::CoordinatorPort;
use crate::models::{Message, PageMessage, ReviewPayload, Response, SourcePayload};

pub const STYLE_ID: &str = "chameleon-inline-style";
pub const TRIGGER_LABEL: &str = "Rewrite in Chameleon";
pub const LOADING_LABEL: &str = "Loading…";
pub const TOAST_TEXT: &str = "Replaced ✓";
pub const LOADING_REVERT: Duration = Duration::from_millis(900);
pub const TOAST_DURATION: Duration = Duration::from_millis(1500);

const TRIGGER_GAP: f64 = 8.0;
const STYLE: &str = "#chameleon-mini{position:fixed;z-index:2147483647;display:none}\
#chameleon-toast{position:fixed;left:50%;bottom:24px;display:none;z-index:2147483647}";
const LISTENERS: [&str; 4] = ["selectionchange", "scroll", "resize", "CHAMELEON_APPLY_REWRITE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Armed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The captured range was replaced.
    Replaced,
    /// No usable range; the text went in at the caret.
    InsertedAtCursor,
    /// No compose region on the page; nothing changed.
    NoRegion,
}

/// Position of the floating trigger in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Trigger {
    visible: bool,
    position: Option<Point>,
    loading_until: Option<Instant>,
}

impl Trigger {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn position(&self) -> Option<Point> {
        self.position
    }

    pub fn label(&self, now: Instant) -> &'static str {
        match self.loading_until {
            Some(until) if now < until => LOADING_LABEL,
            _ => TRIGGER_LABEL,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Toast {
    visible_until: Option<Instant>,
}

impl Toast {
    pub fn is_visible(&self, now: Instant) -> bool {
        self.visible_until.is_some_and(|until| now < until)
    }

    pub fn text(&self) -> &'static str {
        TOAST_TEXT
    }
}

#[derive(Debug, Clone, Copy)]
struct CapturedRange {
    range: Range,
    generation: u64,
}

pub struct CaptureAgent {
    locator: Locator,
    state: AgentState,
    last_range: Option<CapturedRange>,
    trigger: Trigger,
    toast: Toast,
}

impl Default for CaptureAgent {
    fn default() -> Self {
        Self::new(Locator::default())
    }
}

impl CaptureAgent {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            state: AgentState::Idle,
            last_range: None,
            trigger: Trigger::default(),
            toast: Toast::default(),
        }
    }

    /// Hook the agent into a page. Safe to call again after re-injection: the style marker and
    /// each listener are only added once. Returns whether this call installed the marker.
    pub fn install(&mut self, doc: &mut Document) -> bool {
        for name in LISTENERS {
            doc.add_listener(name);
        }
        if doc.element_by_id(STYLE_ID).is_some() {
            return false;
        }
        let style = doc.create_element("style");
        doc.set_attribute(style, "id", STYLE_ID);
        let css = doc.create_text(STYLE);
        doc.append_child(style, css);
        let root = doc.root();
        doc.append_child(root, style);
        true
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn toast(&self) -> &Toast {
        &self.toast
    }

    pub fn has_captured_range(&self) -> bool {
        self.last_range.is_some()
    }

    fn hide_trigger(&mut self) {
        self.trigger.visible = false;
        self.state = AgentState::Idle;
    }

    /// React to a selection change in the page.
    pub fn on_selection_change(&mut self, doc: &Document) -> AgentState {
        let Some(range) = doc.selection_range().filter(|r| !r.is_collapsed()) else {
            self.hide_trigger();
            return self.state;
        };
        let contained = self.locator.locate(doc).is_some_and(|region| {
            doc.contains(region, range.start.node) && doc.contains(region, range.end.node)
        });
        if !contained {
            self.hide_trigger();
            return self.state;
        }

        self.last_range = Some(CapturedRange {
            range,
            generation: doc.generation(),
        });

        match doc.range_rect(range).filter(|r| !r.is_degenerate()) {
            Some(rect) => {
                self.trigger.position = Some(Point {
                    x: rect.right() + TRIGGER_GAP,
                    y: rect.top,
                });
                self.trigger.visible = true;
                self.state = AgentState::Armed;
            }
            None => self.hide_trigger(),
        }
        self.state
    }

    /// Scroll or resize: the trigger would be misplaced, so hide it. The captured range stays.
    pub fn on_viewport_change(&mut self) {
        self.hide_trigger();
    }

    /// The user clicked the trigger: hand the selected text to the coordinator and ask for the
    /// review surface. Returns the review surface reply, or `None` when there was nothing to send.
    pub async fn activate(
        &mut self,
        doc: &Document,
        port: &dyn CoordinatorPort,
    ) -> Option<Response> {
        let text = self.selected_text(doc);
        if text.is_empty() {
            return None;
        }

        let saved = port
            .send(Message::SaveLastSource(SourcePayload { text: text.clone() }))
            .await;
        if !saved.ok {
            warn!(error = ?saved.error, "saving source text failed");
        }
        let opened = port
            .send(Message::OpenReviewSurface(ReviewPayload { text: Some(text) }))
            .await;
        if !opened.ok {
            warn!(error = ?opened.error, "opening review surface failed");
        }

        self.trigger.loading_until = Some(Instant::now() + LOADING_REVERT);
        Some(opened)
    }

    /// Selected text, or the whole region when nothing is selected.
    fn selected_text(&self, doc: &Document) -> String {
        if let Some(range) = doc.selection_range().filter(|r| !r.is_collapsed()) {
            let text = doc.range_text(range).trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
        self.locator
            .locate(doc)
            .map(|region| doc.text_content(region).trim().to_string())
            .unwrap_or_default()
    }

    /// The captured range if the document is unchanged since capture and the range lies inside
    /// `region`. Offsets are not rebased across edits, so any mutation invalidates it.
    fn live_range(&self, doc: &Document, region: NodeId) -> Option<Range> {
        let captured = self.last_range?;
        if captured.generation != doc.generation() {
            return None;
        }
        let range = captured.range;
        let inside = |b: Boundary| doc.is_valid_boundary(b) && doc.contains(region, b.node);
        (inside(range.start) && inside(range.end)).then_some(range)
    }

    /// Write `text` into the page in place of the captured selection.
    pub fn apply_rewrite(&mut self, doc: &mut Document, text: &str) -> ApplyOutcome {
        let Some(region) = self.locator.locate(doc) else {
            debug!("apply skipped, no compose region");
            return ApplyOutcome::NoRegion;
        };

        let outcome = match self.live_range(doc, region) {
            Some(range) => {
                let point = doc.delete_range(range);
                let node = doc.create_text(text);
                doc.insert_node_at(point, node);
                if let Some(caret) = doc.after(node) {
                    doc.select_range(Range::collapsed(caret));
                }
                self.capture_inserted(doc, node);
                ApplyOutcome::Replaced
            }
            None => {
                if self.last_range.take().is_some() {
                    debug!("captured range went stale, inserting at caret");
                }
                let node = doc.insert_text_at_cursor(region, text);
                self.capture_inserted(doc, node);
                ApplyOutcome::InsertedAtCursor
            }
        };

        self.toast.visible_until = Some(Instant::now() + TOAST_DURATION);
        info!(?outcome, "rewrite applied");
        outcome
    }

    /// Keep the inserted text as the captured range so a second apply replaces it.
    fn capture_inserted(&mut self, doc: &Document, node: NodeId) {
        self.last_range = Some(CapturedRange {
            range: Range {
                start: Boundary::new(node, 0),
                end: Boundary::new(node, doc.node_len(node)),
            },
            generation: doc.generation(),
        });
    }

    /// Handle a message from the coordinator. Always acknowledges.
    pub fn handle_message(&mut self, doc: &mut Document, message: PageMessage) -> Response {
        match message {
            PageMessage::ApplyRewrite(payload) => {
                self.apply_rewrite(doc, &payload.text);
            }
        }
        Response::ok()
    }
}
