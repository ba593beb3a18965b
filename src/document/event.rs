//! Compound document events.

use std::fmt;

use super::Document;
use crate::buffer::Content;
use crate::edit::{ContentEdit, EditState};
use crate::element::{AttributeSet, ElementArena, ElementId, ElementPin};
use crate::error::Result;
use crate::reconcile::ElementEdit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Insert,
    Remove,
    Change,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Insert => write!(f, "INSERT"),
            EventType::Remove => write!(f, "REMOVE"),
            EventType::Change => write!(f, "CHANGE"),
        }
    }
}

/// Attribute change of one element, stored as full before/after snapshots.
#[derive(Debug, Clone)]
pub struct AttributeEdit {
    element: ElementId,
    before: AttributeSet,
    after: AttributeSet,
    state: EditState,
    pin: Option<ElementPin>,
}

impl AttributeEdit {
    pub fn new(element: ElementId, before: AttributeSet, after: AttributeSet) -> Self {
        Self {
            element,
            before,
            after,
            state: EditState::new(),
            pin: None,
        }
    }

    /// Keep the element in `arena` while this edit lives.
    pub(crate) fn pinned(mut self, arena: &ElementArena) -> Self {
        self.pin = Some(arena.pin(self.element));
        self
    }

    pub fn die(&mut self) {
        self.state.die();
        self.pin = None;
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn before(&self) -> &AttributeSet {
        &self.before
    }

    pub fn after(&self) -> &AttributeSet {
        &self.after
    }

    pub fn undo(&mut self, arena: &mut ElementArena) -> Result<()> {
        self.state.undo()?;
        *arena.attributes_mut(self.element) = self.before.clone();
        Ok(())
    }

    pub fn redo(&mut self, arena: &mut ElementArena) -> Result<()> {
        self.state.redo()?;
        *arena.attributes_mut(self.element) = self.after.clone();
        Ok(())
    }
}

/// One part of a compound event. The variant order is the order sub-edits
/// appear in an event.
#[derive(Debug)]
pub enum SubEdit {
    Content(ContentEdit),
    Attribute(AttributeEdit),
    /// Child-list change in the default tree.
    Structure(ElementEdit),
    /// Child-list change in the bidi tree.
    Bidi(ElementEdit),
}

impl SubEdit {
    fn rank(&self) -> u8 {
        match self {
            SubEdit::Content(_) => 0,
            SubEdit::Attribute(_) => 1,
            SubEdit::Structure(_) => 2,
            SubEdit::Bidi(_) => 3,
        }
    }

    pub fn element_edit(&self) -> Option<&ElementEdit> {
        match self {
            SubEdit::Structure(edit) | SubEdit::Bidi(edit) => Some(edit),
            _ => None,
        }
    }

    fn undo(&mut self, content: &mut dyn Content, arena: &mut ElementArena) -> Result<()> {
        match self {
            SubEdit::Content(edit) => edit.undo(content),
            SubEdit::Attribute(edit) => edit.undo(arena),
            SubEdit::Structure(edit) | SubEdit::Bidi(edit) => edit.undo(arena),
        }
    }

    fn redo(&mut self, content: &mut dyn Content, arena: &mut ElementArena) -> Result<()> {
        match self {
            SubEdit::Content(edit) => edit.redo(content),
            SubEdit::Attribute(edit) => edit.redo(arena),
            SubEdit::Structure(edit) | SubEdit::Bidi(edit) => edit.redo(arena),
        }
    }

    fn die(&mut self) {
        match self {
            SubEdit::Content(edit) => edit.die(),
            SubEdit::Attribute(edit) => edit.die(),
            SubEdit::Structure(edit) | SubEdit::Bidi(edit) => edit.die(),
        }
    }
}

/// Everything one logical mutation did, undoable as a unit.
#[derive(Debug)]
pub struct DocumentEvent {
    event_type: EventType,
    offset: usize,
    length: usize,
    edits: Vec<SubEdit>,
    state: EditState,
}

impl DocumentEvent {
    pub fn new(event_type: EventType, offset: usize, length: usize) -> Self {
        Self {
            event_type,
            offset,
            length,
            edits: Vec::new(),
            state: EditState::new(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Sub-edits: content, then attributes, then default-tree structure,
    /// then bidi structure. An event that absorbed later ones holds one such
    /// block per mutation, in the order they ran.
    pub fn edits(&self) -> &[SubEdit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Add a sub-edit behind every sub-edit of the same or an earlier kind.
    pub fn add_edit(&mut self, edit: SubEdit) {
        let rank = edit.rank();
        let at = self.edits.partition_point(|existing| existing.rank() <= rank);
        self.edits.insert(at, edit);
    }

    pub fn add_structure(&mut self, edits: Vec<ElementEdit>) {
        for edit in edits {
            self.add_edit(SubEdit::Structure(edit));
        }
    }

    pub fn add_bidi(&mut self, edits: Vec<ElementEdit>) {
        for edit in edits {
            self.add_edit(SubEdit::Bidi(edit));
        }
    }

    /// Fold `other` (a later mutation) into this event. Its sub-edits go
    /// after all of ours, so undo unwinds it first.
    pub fn absorb(&mut self, other: DocumentEvent) {
        let end = (self.offset + self.length).max(other.offset + other.length);
        self.offset = self.offset.min(other.offset);
        self.length = end - self.offset;
        self.edits.extend(other.edits);
    }

    /// Structural change recorded for `element`, in either tree.
    pub fn get_change(&self, element: ElementId) -> Option<&ElementEdit> {
        self.edits
            .iter()
            .filter_map(SubEdit::element_edit)
            .find(|edit| edit.element() == element)
    }

    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.can_redo()
    }

    /// Undo every sub-edit, last first, under the document's write lock.
    pub fn undo(&mut self, document: &mut Document) -> Result<()> {
        document.undo_event(self)
    }

    /// Redo every sub-edit in recorded order.
    pub fn redo(&mut self, document: &mut Document) -> Result<()> {
        document.redo_event(self)
    }

    /// Kill the event and everything in it.
    pub fn die(&mut self) {
        self.state.die();
        for edit in &mut self.edits {
            edit.die();
        }
    }

    pub(crate) fn undo_parts(
        &mut self,
        content: &mut dyn Content,
        arena: &mut ElementArena,
    ) -> Result<()> {
        self.state.undo()?;
        for edit in self.edits.iter_mut().rev() {
            edit.undo(content, arena)?;
        }
        Ok(())
    }

    pub(crate) fn redo_parts(
        &mut self,
        content: &mut dyn Content,
        arena: &mut ElementArena,
    ) -> Result<()> {
        self.state.redo()?;
        for edit in &mut self.edits {
            edit.redo(content, arena)?;
        }
        Ok(())
    }
}

impl fmt::Display for DocumentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}) with {} edits",
            self.event_type,
            self.offset,
            self.offset + self.length,
            self.edits.len()
        )
    }
}
