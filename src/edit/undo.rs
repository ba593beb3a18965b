use crate::config::DocumentConfig;
use crate::document::{Document, DocumentEvent};
use crate::error::{DocumentError, Result};

/// A group of events that are undone/redone together
#[derive(Debug)]
pub struct EditGroup {
    events: Vec<DocumentEvent>,
}

impl EditGroup {
    fn new(events: Vec<DocumentEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn redo(&mut self, document: &mut Document) -> Result<()> {
        for event in &mut self.events {
            event.redo(document)?;
        }
        Ok(())
    }

    fn undo(&mut self, document: &mut Document) -> Result<()> {
        for event in self.events.iter_mut().rev() {
            event.undo(document)?;
        }
        Ok(())
    }

    fn die(&mut self) {
        for event in &mut self.events {
            event.die();
        }
    }
}

/// Bounded undo/redo history of document events.
#[derive(Debug)]
pub struct UndoManager {
    /// Groups that can be undone, oldest first
    stack: Vec<EditGroup>,
    /// Groups that can be redone, most recently undone last
    redo_stack: Vec<EditGroup>,
    /// Events collected between `begin_group` and `end_group`
    current_group: Option<Vec<DocumentEvent>>,
    /// Maximum number of undo levels
    max_size: usize,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::with_limit(crate::config::DEFAULT_UNDO_LIMIT)
    }

    pub fn with_limit(max_size: usize) -> Self {
        Self {
            stack: Vec::new(),
            redo_stack: Vec::new(),
            current_group: None,
            max_size,
        }
    }

    pub fn from_config(config: &DocumentConfig) -> Self {
        Self::with_limit(config.undo_limit)
    }

    pub fn limit(&self) -> usize {
        self.max_size
    }

    /// Record an event. Anything that could be redone is discarded.
    pub fn add_edit(&mut self, event: DocumentEvent) {
        for mut group in self.redo_stack.drain(..) {
            group.die();
        }
        match self.current_group.as_mut() {
            Some(group) => group.push(event),
            None => self.commit(vec![event]),
        }
    }

    /// Collect the following events into one undo step.
    pub fn begin_group(&mut self) {
        self.end_group();
        self.current_group = Some(Vec::new());
    }

    pub fn end_group(&mut self) {
        if let Some(events) = self.current_group.take() {
            if !events.is_empty() {
                self.commit(events);
            }
        }
    }

    fn commit(&mut self, events: Vec<DocumentEvent>) {
        self.stack.push(EditGroup::new(events));
        while self.stack.len() > self.max_size {
            let mut oldest = self.stack.remove(0);
            oldest.die();
            tracing::trace!("undo history trimmed to {}", self.max_size);
        }
    }

    /// Undo the most recent step.
    pub fn undo(&mut self, document: &mut Document) -> Result<()> {
        self.end_group();
        let mut group = self.stack.pop().ok_or(DocumentError::CannotUndo)?;
        if let Err(err) = group.undo(document) {
            self.stack.push(group);
            return Err(err);
        }
        self.redo_stack.push(group);
        Ok(())
    }

    /// Redo the most recently undone step.
    pub fn redo(&mut self, document: &mut Document) -> Result<()> {
        let mut group = self.redo_stack.pop().ok_or(DocumentError::CannotRedo)?;
        if let Err(err) = group.redo(document) {
            self.redo_stack.push(group);
            return Err(err);
        }
        self.stack.push(group);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.stack.is_empty()
            || self
                .current_group
                .as_ref()
                .is_some_and(|events| !events.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get the number of undo levels available
    pub fn undo_count(&self) -> usize {
        self.stack.len()
    }

    /// Forget the whole history; every recorded event is killed.
    pub fn discard_all_edits(&mut self) {
        for mut group in self.stack.drain(..).chain(self.redo_stack.drain(..)) {
            group.die();
        }
        if let Some(events) = self.current_group.as_mut() {
            for event in events.iter_mut() {
                event.die();
            }
            events.clear();
        }
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}
