//! Content stores: the raw character sequence behind a document.
//!
//! Every store keeps an implicit trailing `'\n'`, so a fresh store has length
//! 1 and the terminator can never be removed. Offsets count `char`s.

pub mod gap;
pub mod position;
pub mod rope;


use std::fmt;

use crate::edit::ContentEdit;
use crate::error::{DocumentError, Result};

pub use gap::GapBuffer;
pub use position::{Position, PositionTable, SavedPosition};
pub use rope::RopeContent;

/// Destination for [`Content::get_chars`].
///
/// With `partial_return` set, a request straddling an internal discontinuity
/// (the gap of a [`GapBuffer`]) returns only the piece before it; the caller
/// then asks again for the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub chars: Vec<char>,
    pub partial_return: bool,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partial() -> Self {
        Self {
            chars: Vec::new(),
            partial_return: true,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in &self.chars {
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

/// A mutable character store with live positions.
///
/// Implementors provide the unchecked primitives; range validation, position
/// maintenance and undo records are shared here.
pub trait Content: fmt::Debug + Send {
    /// Logical length, including the implicit terminator.
    fn len(&self) -> usize;

    fn positions(&self) -> &PositionTable;

    fn positions_mut(&mut self) -> &mut PositionTable;

    /// Write `chars` at `offset`. Callers have validated the offset.
    fn insert_chars(&mut self, offset: usize, chars: &[char]);

    /// Drop `[offset, offset + len)`. Callers have validated the range.
    fn remove_chars(&mut self, offset: usize, len: usize);

    /// Copy `[offset, offset + len)`. `partial` stops at an internal
    /// discontinuity, if the store has one.
    fn read_chars(&self, offset: usize, len: usize, partial: bool) -> Vec<char>;

    /// Insert `text` at `offset`. Empty text is a no-op and yields no edit.
    fn insert_string(&mut self, offset: usize, text: &str) -> Result<Option<ContentEdit>> {
        if offset > self.len() {
            return Err(DocumentError::bad_location(offset, "invalid insert"));
        }
        if text.is_empty() {
            return Ok(None);
        }
        self.positions_mut().prune();
        let chars: Vec<char> = text.chars().collect();
        self.insert_chars(offset, &chars);
        self.positions().shift_for_insert(offset, chars.len());
        Ok(Some(ContentEdit::insert(offset, text.to_string())))
    }

    /// Remove `len` characters at `offset`. The terminator is never removable.
    fn remove(&mut self, offset: usize, len: usize) -> Result<ContentEdit> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| DocumentError::bad_location(offset, "invalid remove length"))?;
        if end >= self.len() {
            return Err(DocumentError::bad_location(offset, "invalid remove range"));
        }
        self.positions_mut().prune();
        let removed: String = self.read_chars(offset, len, false).into_iter().collect();
        let saved = self.positions().positions_in_range(offset, end);
        if len > 0 {
            self.remove_chars(offset, len);
            self.positions().shift_for_remove(offset, len);
        }
        Ok(ContentEdit::remove(offset, removed, saved))
    }

    fn get_chars(&self, offset: usize, len: usize, segment: &mut Segment) -> Result<()> {
        check_range(offset, len, self.len())?;
        segment.chars = self.read_chars(offset, len, segment.partial_return);
        Ok(())
    }

    fn get_string(&self, offset: usize, len: usize) -> Result<String> {
        check_range(offset, len, self.len())?;
        Ok(self.read_chars(offset, len, false).into_iter().collect())
    }

    fn create_position(&mut self, offset: usize) -> Result<Position> {
        if offset > self.len() {
            return Err(DocumentError::bad_location(offset, "invalid position"));
        }
        Ok(self.positions_mut().create(offset))
    }
}

fn check_range(offset: usize, len: usize, total: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(DocumentError::bad_location(offset, "invalid range")),
    }
}
