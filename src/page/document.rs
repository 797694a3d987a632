//! Owned model of the host page: element and text nodes, a selection, and layout boxes.
//!
//! Offsets inside text nodes count characters, offsets inside elements count children, as in the
//! DOM. Every structural change bumps [`Document::generation`], which is how captured ranges
//! notice that the tree moved under them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Viewport-relative box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        Rect {
            left,
            top,
            width: self.right().max(other.right()) - left,
            height: self.bottom().max(other.bottom()) - top,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Option<Rect>,
    hidden: bool,
}

/// A point in the tree: a container node and an offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Ordered span between two boundaries (`start` never after `end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

impl Range {
    pub fn collapsed(at: Boundary) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// The user's selection; `anchor` is where it started, `focus` where it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Boundary,
    pub focus: Boundary,
}

/// Preorder positions used to compare boundaries.
struct Order {
    pre: HashMap<NodeId, usize>,
    end: HashMap<NodeId, usize>,
    sequence: Vec<NodeId>,
}

/// What `delete_range` does to a single node.
enum Cut {
    Remove(NodeId),
    Trim(NodeId, usize, usize),
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    selection: Option<Selection>,
    focused: Option<NodeId>,
    listeners: BTreeSet<String>,
    generation: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = Node {
            data: NodeData::Element {
                tag: "html".to_string(),
                attrs: BTreeMap::new(),
            },
            parent: None,
            children: Vec::new(),
            rect: None,
            hidden: false,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            selection: None,
            focused: None,
            listeners: BTreeSet::new(),
            generation: 0,
        }
    }

    /// The document element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
            rect: None,
            hidden: false,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].data, NodeData::Text(_))
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, value: &str) {
        if let NodeData::Text(text) = &mut self.nodes[node.0].data {
            *text = value.to_string();
            self.touch();
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    fn index_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(node)?;
        let index = self.children(parent).iter().position(|c| *c == node)?;
        Some((parent, index))
    }

    fn detach(&mut self, node: NodeId) {
        if let Some((parent, index)) = self.index_in_parent(node) {
            self.nodes[parent.0].children.remove(index);
            self.nodes[node.0].parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child);
    }

    /// Insert `child` at `index` among `parent`'s children, moving it if already attached.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if self.contains(child, parent) {
            return;
        }
        let mut index = index;
        if let Some((old_parent, old_index)) = self.index_in_parent(child) {
            if old_parent == parent && old_index < index {
                index -= 1;
            }
        }
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.touch();
    }

    pub fn remove(&mut self, node: NodeId) {
        if self.parent(node).is_some() {
            self.detach(node);
            self.touch();
        }
    }

    /// `node` followed by its ancestors up to the root.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), move |n| self.parent(*n))
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == self.root)
    }

    /// Inclusive: a node contains itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == ancestor)
    }

    /// `from` and its descendants in document order.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id))
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Characters in a text node, children in an element.
    pub fn node_len(&self, node: NodeId) -> usize {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => text.chars().count(),
            NodeData::Element { .. } => self.nodes[node.0].children.len(),
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = Some(rect);
    }

    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.nodes[node.0].rect
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        self.nodes[node.0].hidden = hidden;
    }

    /// Connected and not inside a hidden subtree.
    pub fn is_visible(&self, node: NodeId) -> bool {
        self.is_connected(node) && self.ancestors(node).all(|n| !self.nodes[n.0].hidden)
    }

    pub fn focus(&mut self, node: Option<NodeId>) {
        self.focused = node;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Register a listener by name; false when it was already registered.
    pub fn add_listener(&mut self, name: &str) -> bool {
        self.listeners.insert(name.to_string())
    }

    pub fn has_listener(&self, name: &str) -> bool {
        self.listeners.contains(name)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn select(&mut self, anchor: Boundary, focus: Boundary) {
        self.selection = Some(Selection { anchor, focus });
    }

    pub fn select_range(&mut self, range: Range) {
        self.select(range.start, range.end);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// The selection as an ordered range.
    pub fn selection_range(&self) -> Option<Range> {
        let selection = self.selection?;
        if !self.is_valid_boundary(selection.anchor) || !self.is_valid_boundary(selection.focus) {
            return None;
        }
        Some(self.ordered(selection.anchor, selection.focus))
    }

    pub fn is_valid_boundary(&self, boundary: Boundary) -> bool {
        boundary.node.0 < self.nodes.len()
            && self.is_connected(boundary.node)
            && boundary.offset <= self.node_len(boundary.node)
    }

    fn order(&self) -> Order {
        let sequence = self.descendants(self.root);
        let pre: HashMap<NodeId, usize> =
            sequence.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let mut end = HashMap::with_capacity(sequence.len());
        for node in &sequence {
            let size = self.descendants(*node).len();
            end.insert(*node, pre[node] + size);
        }
        Order { pre, end, sequence }
    }

    /// Sort key of a boundary; detached containers sort after everything.
    fn key(&self, order: &Order, boundary: Boundary) -> (usize, usize) {
        let pre = |n: &NodeId| order.pre.get(n).copied().unwrap_or(usize::MAX);
        if self.is_text(boundary.node) {
            return (pre(&boundary.node), boundary.offset);
        }
        match self.children(boundary.node).get(boundary.offset) {
            Some(child) => (pre(child), 0),
            None => (
                order.end.get(&boundary.node).copied().unwrap_or(usize::MAX),
                0,
            ),
        }
    }

    /// Document-order comparison of two connected boundaries.
    pub fn compare(&self, a: Boundary, b: Boundary) -> Ordering {
        let order = self.order();
        self.key(&order, a).cmp(&self.key(&order, b))
    }

    pub fn ordered(&self, a: Boundary, b: Boundary) -> Range {
        if self.compare(a, b) == Ordering::Greater {
            Range { start: b, end: a }
        } else {
            Range { start: a, end: b }
        }
    }

    /// Character span `[from, to)` of each text node touched by `range`.
    fn text_segments(&self, order: &Order, range: Range) -> Vec<(NodeId, usize, usize)> {
        let (start_pre, start_off) = self.key(order, range.start);
        let (end_pre, end_off) = self.key(order, range.end);
        let mut out = Vec::new();
        for node in &order.sequence {
            if !self.is_text(*node) {
                continue;
            }
            let pre = order.pre[node];
            if pre < start_pre || pre > end_pre {
                continue;
            }
            let len = self.node_len(*node);
            let from = if pre == start_pre { start_off.min(len) } else { 0 };
            let to = if pre == end_pre { end_off.min(len) } else { len };
            if from < to {
                out.push((*node, from, to));
            }
        }
        out
    }

    pub fn range_text(&self, range: Range) -> String {
        let order = self.order();
        self.text_segments(&order, range)
            .into_iter()
            .filter_map(|(node, from, to)| {
                self.text(node)
                    .map(|t| t.chars().skip(from).take(to - from).collect::<String>())
            })
            .collect()
    }

    /// Union of the layout boxes of the text nodes the range touches.
    pub fn range_rect(&self, range: Range) -> Option<Rect> {
        let order = self.order();
        self.text_segments(&order, range)
            .into_iter()
            .filter_map(|(node, _, _)| self.rect(node))
            .reduce(|acc, r| acc.union(&r))
    }

    /// Remove the contents of `range` and return the collapsed point where it started.
    ///
    /// Text nodes holding either boundary are trimmed and kept; nodes lying wholly inside are
    /// removed.
    pub fn delete_range(&mut self, range: Range) -> Boundary {
        if range.is_collapsed() {
            return range.start;
        }
        let order = self.order();
        let (start_pre, start_off) = self.key(&order, range.start);
        let (end_pre, end_off) = self.key(&order, range.end);
        let on_edge = |doc: &Self, node: NodeId| {
            doc.contains(node, range.start.node) || doc.contains(node, range.end.node)
        };

        let mut cuts = Vec::new();
        let mut skip_until = 0;
        for node in &order.sequence {
            let pre = order.pre[node];
            if pre < skip_until || pre < start_pre || pre > end_pre {
                continue;
            }
            if self.is_text(*node) {
                let len = self.node_len(*node);
                let from = if pre == start_pre { start_off.min(len) } else { 0 };
                let to = if pre == end_pre { end_off.min(len) } else { len };
                if from == 0 && to == len && !on_edge(self, *node) {
                    cuts.push(Cut::Remove(*node));
                } else if from < to {
                    cuts.push(Cut::Trim(*node, from, to));
                }
            } else {
                let inside = (pre, 0) >= (start_pre, start_off) && (order.end[node], 0) <= (end_pre, end_off);
                if inside && !on_edge(self, *node) {
                    cuts.push(Cut::Remove(*node));
                    skip_until = order.end[node];
                }
            }
        }

        for cut in cuts {
            match cut {
                Cut::Remove(node) => self.detach(node),
                Cut::Trim(node, from, to) => {
                    if let NodeData::Text(text) = &mut self.nodes[node.0].data {
                        let kept: String = text
                            .chars()
                            .enumerate()
                            .filter(|(i, _)| *i < from || *i >= to)
                            .map(|(_, c)| c)
                            .collect();
                        *text = kept;
                    }
                }
            }
        }
        self.touch();
        range.start
    }

    /// Insert `node` at `point`, splitting a text container in two.
    pub fn insert_node_at(&mut self, point: Boundary, node: NodeId) {
        if !self.is_text(point.node) {
            self.insert_child(point.node, point.offset, node);
            return;
        }
        let Some((parent, index)) = self.index_in_parent(point.node) else {
            return;
        };
        let text = self.text(point.node).unwrap_or_default().to_string();
        let split = byte_offset(&text, point.offset);
        let (head, tail) = text.split_at(split);
        let tail = tail.to_string();
        if let NodeData::Text(t) = &mut self.nodes[point.node.0].data {
            *t = head.to_string();
        }
        self.insert_child(parent, index + 1, node);
        if !tail.is_empty() {
            let tail_node = self.create_text(&tail);
            self.insert_child(parent, index + 2, tail_node);
        }
    }

    /// Boundary right after `node` in its parent.
    pub fn after(&self, node: NodeId) -> Option<Boundary> {
        let (parent, index) = self.index_in_parent(node)?;
        Some(Boundary::new(parent, index + 1))
    }

    /// Type `text` at the caret inside `region`: replaces a selection within the region, or
    /// appends at the end when there is none. The caret ends up after the new text.
    pub fn insert_text_at_cursor(&mut self, region: NodeId, text: &str) -> NodeId {
        let node = self.create_text(text);
        let target = self
            .selection_range()
            .filter(|r| self.contains(region, r.start.node) && self.contains(region, r.end.node));
        match target {
            Some(range) => {
                let point = self.delete_range(range);
                self.insert_node_at(point, node);
            }
            None => self.append_child(region, node),
        }
        if let Some(caret) = self.after(node) {
            self.select_range(Range::collapsed(caret));
        }
        node
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
