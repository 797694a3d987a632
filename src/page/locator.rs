use tracing::debug;

use super::document::{Document, NodeId};
use super::selector::{Selector, SelectorError};

/// Compose-region markers, most specific first.
pub const COMPOSE_MARKERS: [&str; 2] = [
    r#"div[contenteditable="true"][aria-label*="Message"]"#,
    r#"div[role="textbox"][contenteditable="true"]"#,
];
/// Any editable region; only trusted when visible.
pub const BROAD_EDITABLE: &str = r#"div[contenteditable="true"]"#;

/// Finds the compose region the user is working in.
#[derive(Debug, Clone)]
pub struct Locator {
    /// Explicit compose-region markers, tried in order.
    markers: Vec<Selector>,
    /// Any editable region; low confidence on its own.
    broad: Selector,
}

impl Default for Locator {
    fn default() -> Self {
        Self::from_patterns(&COMPOSE_MARKERS, BROAD_EDITABLE)
            .expect("built-in compose selectors are valid")
    }
}

impl Locator {
    pub fn new(markers: Vec<Selector>, broad: Selector) -> Self {
        Self { markers, broad }
    }

    /// Build a locator from selector strings such as `div[role="textbox"]`.
    pub fn from_patterns(markers: &[&str], broad: &str) -> Result<Self, SelectorError> {
        let markers = markers
            .iter()
            .map(|p| p.parse())
            .collect::<Result<Vec<Selector>, _>>()?;
        Ok(Self::new(markers, broad.parse()?))
    }

    /// Whether `node` is a region this locator recognizes.
    pub fn is_region(&self, doc: &Document, node: NodeId) -> bool {
        self.markers.iter().any(|s| s.matches(doc, node)) || self.broad.matches(doc, node)
    }

    /// Resolve the active region; `None` when the page has nothing editable.
    ///
    /// First match wins: the region around the selection anchor, then a marked compose region,
    /// then the visible editable region holding focus (or the first visible one).
    pub fn locate(&self, doc: &Document) -> Option<NodeId> {
        if let Some(selection) = doc.selection() {
            if doc.is_valid_boundary(selection.anchor) {
                if let Some(region) = doc
                    .ancestors(selection.anchor.node)
                    .find(|n| self.is_region(doc, *n))
                {
                    return Some(region);
                }
            }
        }

        if let Some(region) = self.markers.iter().find_map(|s| s.query_first(doc)) {
            return Some(region);
        }

        let visible: Vec<NodeId> = self
            .broad
            .query_all(doc)
            .into_iter()
            .filter(|n| doc.is_visible(*n))
            .collect();
        let focused = doc.focused();
        let region = visible
            .iter()
            .copied()
            .find(|n| focused.is_some_and(|f| doc.contains(*n, f)))
            .or_else(|| visible.first().copied());
        if region.is_none() {
            debug!("no editable region on page");
        }
        region
    }
}
