pub mod undo;

use crate::buffer::{Content, SavedPosition};
use crate::error::{DocumentError, Result};

pub use undo::UndoManager;

/// Lifecycle shared by every undoable record.
///
/// A record starts out done. `undo` is legal only when done, `redo` only when
/// undone, and neither once the record has been killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditState {
    done: bool,
    alive: bool,
}

impl EditState {
    pub fn new() -> Self {
        Self {
            done: true,
            alive: true,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.alive && self.done
    }

    pub fn can_redo(&self) -> bool {
        self.alive && !self.done
    }

    pub fn undo(&mut self) -> Result<()> {
        if !self.can_undo() {
            return Err(DocumentError::CannotUndo);
        }
        self.done = false;
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        if !self.can_redo() {
            return Err(DocumentError::CannotRedo);
        }
        self.done = true;
        Ok(())
    }

    /// Kill the record; it can no longer be undone or redone.
    pub fn die(&mut self) {
        self.alive = false;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

impl Default for EditState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEditKind {
    Insert,
    Remove,
}

/// Undo record of one raw content mutation.
#[derive(Debug)]
pub struct ContentEdit {
    kind: ContentEditKind,
    offset: usize,
    text: String,
    length: usize,
    /// Positions that sat inside the text while it was out of the store.
    saved: Vec<SavedPosition>,
    state: EditState,
}

impl ContentEdit {
    pub(crate) fn insert(offset: usize, text: String) -> Self {
        let length = text.chars().count();
        Self {
            kind: ContentEditKind::Insert,
            offset,
            text,
            length,
            saved: Vec::new(),
            state: EditState::new(),
        }
    }

    pub(crate) fn remove(offset: usize, text: String, saved: Vec<SavedPosition>) -> Self {
        let length = text.chars().count();
        Self {
            kind: ContentEditKind::Remove,
            offset,
            text,
            length,
            saved,
            state: EditState::new(),
        }
    }

    pub fn kind(&self) -> ContentEditKind {
        self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in characters.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Inserted or removed text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.can_redo()
    }

    pub fn die(&mut self) {
        self.state.die();
    }

    pub fn undo(&mut self, content: &mut dyn Content) -> Result<()> {
        self.state.undo()?;
        match self.kind {
            ContentEditKind::Insert => self.take_out(content),
            ContentEditKind::Remove => self.put_back(content),
        }
        Ok(())
    }

    pub fn redo(&mut self, content: &mut dyn Content) -> Result<()> {
        self.state.redo()?;
        match self.kind {
            ContentEditKind::Insert => self.put_back(content),
            ContentEditKind::Remove => self.take_out(content),
        }
        Ok(())
    }

    fn take_out(&mut self, content: &mut dyn Content) {
        content.positions_mut().prune();
        self.saved = content
            .positions()
            .positions_in_range(self.offset, self.offset + self.length);
        if self.length > 0 {
            content.remove_chars(self.offset, self.length);
            content.positions().shift_for_remove(self.offset, self.length);
        }
    }

    fn put_back(&mut self, content: &mut dyn Content) {
        content.positions_mut().prune();
        if self.length > 0 {
            let chars: Vec<char> = self.text.chars().collect();
            content.insert_chars(self.offset, &chars);
            content.positions().shift_for_insert(self.offset, self.length);
        }
        content.positions().restore(&self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GapBuffer;

    fn text_of(content: &dyn Content) -> String {
        content.get_string(0, content.len()).unwrap()
    }

    #[test]
    fn test_edit_state_sequence() {
        let mut state = EditState::new();
        assert!(state.can_undo());
        assert_eq!(state.redo(), Err(DocumentError::CannotRedo));
        state.undo().unwrap();
        assert_eq!(state.undo(), Err(DocumentError::CannotUndo));
        state.redo().unwrap();
        state.die();
        assert_eq!(state.undo(), Err(DocumentError::CannotUndo));
    }

    #[test]
    fn test_insert_undo_redo() {
        let mut buffer = GapBuffer::new();
        buffer.insert_string(0, "hello").unwrap();
        let mut edit = buffer.insert_string(5, " world").unwrap().unwrap();
        assert_eq!(edit.kind(), ContentEditKind::Insert);

        edit.undo(&mut buffer).unwrap();
        assert_eq!(text_of(&buffer), "hello\n");
        edit.redo(&mut buffer).unwrap();
        assert_eq!(text_of(&buffer), "hello world\n");
        assert_eq!(edit.redo(&mut buffer), Err(DocumentError::CannotRedo));
    }

    #[test]
    fn test_remove_undo_restores_positions() {
        let mut buffer = GapBuffer::new();
        buffer.insert_string(0, "0123456789").unwrap();
        let inside = buffer.create_position(5).unwrap();
        let after = buffer.create_position(8).unwrap();

        let mut edit = buffer.remove(3, 4).unwrap();
        assert_eq!(edit.text(), "3456");
        assert_eq!(inside.offset(), 3);
        assert_eq!(after.offset(), 4);

        edit.undo(&mut buffer).unwrap();
        assert_eq!(text_of(&buffer), "0123456789\n");
        assert_eq!(inside.offset(), 5);
        assert_eq!(after.offset(), 8);
        assert_eq!(edit.undo(&mut buffer), Err(DocumentError::CannotUndo));

        edit.redo(&mut buffer).unwrap();
        assert_eq!(text_of(&buffer), "012789\n");
        assert_eq!(inside.offset(), 3);
    }

    #[test]
    fn test_undo_insert_then_redo_restores_inner_positions() {
        let mut buffer = GapBuffer::new();
        buffer.insert_string(0, "ab").unwrap();
        let mut edit = buffer.insert_string(1, "XYZ").unwrap().unwrap();
        let inner = buffer.create_position(3).unwrap();

        edit.undo(&mut buffer).unwrap();
        assert_eq!(inner.offset(), 1);
        edit.redo(&mut buffer).unwrap();
        assert_eq!(inner.offset(), 3);
    }
}
