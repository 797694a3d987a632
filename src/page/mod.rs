//! Page side: a small document model plus the agent that lives in the mail tab.

pub mod agent;
pub mod document;
pub mod locator;
pub mod selector;

pub use agent::{ApplyOutcome, AgentState, CaptureAgent};
pub use document::{Boundary, Document, NodeId, Range, Rect, Selection};
pub use locator::Locator;
pub use selector::{Selector, SelectorError};
