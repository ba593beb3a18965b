pub mod bidi;
pub mod buffer;
pub mod config;
pub mod document;
pub mod edit;
pub mod element;
pub mod error;
pub mod reconcile;

pub use buffer::{Content, GapBuffer, Position, RopeContent, Segment};
pub use config::{DocumentConfig, GrowthPolicy, RunDirection};
pub use document::{
    AttributeEdit, Document, DocumentEvent, DocumentFilter, DocumentListener, EventType,
    FilterBypass, SubEdit, UndoableEditListener,
};
pub use edit::{ContentEdit, EditState, UndoManager};
pub use element::{
    AttrKey, AttrValue, AttributeSet, ElementArena, ElementId, ElementSpec, JoinDirection, SpecType,
};
pub use error::{DocumentError, Result};
pub use reconcile::{ElementBuffer, ElementEdit, RemovePlan};
