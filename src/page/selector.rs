use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

use super::document::{Document, NodeId};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectorError {
    #[error("unsupported selector: {0}")]
    Unsupported(String),
    #[error("selector pattern failed to compile: {0}")]
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatcher {
    name: String,
    op: AttrOp,
}

/// A compound selector of the form `tag[attr][attr="v"][attr*="v"]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    tag: Option<String>,
    attrs: Vec<AttrMatcher>,
}

impl Selector {
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str) -> Self {
        self.attrs.push(AttrMatcher {
            name: name.to_ascii_lowercase(),
            op: AttrOp::Exists,
        });
        self
    }

    pub fn with_attr_eq(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrMatcher {
            name: name.to_ascii_lowercase(),
            op: AttrOp::Equals(value.to_string()),
        });
        self
    }

    pub fn with_attr_contains(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrMatcher {
            name: name.to_ascii_lowercase(),
            op: AttrOp::Contains(value.to_string()),
        });
        self
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        self.attrs.iter().all(|m| match (doc.attribute(node, &m.name), &m.op) {
            (None, _) => false,
            (Some(_), AttrOp::Exists) => true,
            (Some(v), AttrOp::Equals(want)) => v == want,
            (Some(v), AttrOp::Contains(want)) => v.contains(want.as_str()),
        })
    }

    /// Connected matches under the document root, in document order.
    pub fn query_all(&self, doc: &Document) -> Vec<NodeId> {
        doc.descendants(doc.root())
            .into_iter()
            .filter(|n| self.matches(doc, *n))
            .collect()
    }

    pub fn query_first(&self, doc: &Document) -> Option<NodeId> {
        doc.descendants(doc.root())
            .into_iter()
            .find(|n| self.matches(doc, *n))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let whole = Regex::new(r"^([A-Za-z][A-Za-z0-9-]*)?((?:\[[^\]]+\])*)$")
            .map_err(|e| SelectorError::Pattern(e.to_string()))?;
        let attr = Regex::new(
            r#"\[\s*([A-Za-z_:][-A-Za-z0-9_:.]*)\s*(?:(\*?=)\s*(?:"([^"]*)"|'([^']*)'|([^\s\]"']+))\s*)?\]"#,
        )
        .map_err(|e| SelectorError::Pattern(e.to_string()))?;

        let input = input.trim();
        let captures = whole
            .captures(input)
            .filter(|_| !input.is_empty())
            .ok_or_else(|| SelectorError::Unsupported(input.to_string()))?;

        let mut selector = Selector {
            tag: captures.get(1).map(|m| m.as_str().to_ascii_lowercase()),
            attrs: Vec::new(),
        };

        let brackets = captures.get(2).map(|m| m.as_str()).unwrap_or("");
        let mut consumed = 0;
        for cap in attr.captures_iter(brackets) {
            let Some(full) = cap.get(0) else { continue };
            if full.start() != consumed {
                return Err(SelectorError::Unsupported(input.to_string()));
            }
            consumed = full.end();

            let name = &cap[1];
            let value = cap
                .get(3)
                .or_else(|| cap.get(4))
                .or_else(|| cap.get(5))
                .map(|m| m.as_str())
                .unwrap_or("");
            selector = match cap.get(2).map(|m| m.as_str()) {
                None => selector.with_attr(name),
                Some("=") => selector.with_attr_eq(name, value),
                Some(_) => selector.with_attr_contains(name, value),
            };
        }
        if consumed != brackets.len() {
            return Err(SelectorError::Unsupported(input.to_string()));
        }
        Ok(selector)
    }
}
