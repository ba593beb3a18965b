//! Gap buffer content store.
//!
//! ```text
//!  [ text-before-gap | gap (unused) | text-after-gap ]
//!    0..gap_start      gap_start..gap_end  gap_end..array.len()
//! ```
//!
//! The logical text is `array[..gap_start]` followed by `array[gap_end..]`.
//! The gap is moved to the edit site before each mutation, so runs of edits
//! at one place copy nothing.

use super::position::PositionTable;
use super::Content;
use crate::config::{DocumentConfig, GrowthPolicy};

const GAP_FILL: char = '\0';

#[derive(Debug)]
pub struct GapBuffer {
    array: Vec<char>,
    gap_start: usize,
    gap_end: usize,
    growth: GrowthPolicy,
    positions: PositionTable,
}

impl GapBuffer {
    /// Empty buffer (holding just the terminator) with the default capacity.
    pub fn new() -> Self {
        Self::with_config(&DocumentConfig::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(&DocumentConfig::default().with_initial_capacity(capacity))
    }

    pub fn with_config(config: &DocumentConfig) -> Self {
        let capacity = config.initial_capacity.max(2);
        let mut array = vec![GAP_FILL; capacity];
        // Terminator sits behind the gap so the first insert at 0 copies nothing.
        array[capacity - 1] = '\n';
        Self {
            array,
            gap_start: 0,
            gap_end: capacity - 1,
            growth: config.growth,
            positions: PositionTable::new(),
        }
    }

    pub fn gap_start(&self) -> usize {
        self.gap_start
    }

    pub fn gap_end(&self) -> usize {
        self.gap_end
    }

    /// Length of the backing array, gap included.
    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    fn gap_size(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Move the gap so that `gap_start == pos`.
    fn move_gap_to(&mut self, pos: usize) {
        if pos == self.gap_start {
            return;
        }
        let gap = self.gap_size();
        if pos < self.gap_start {
            let count = self.gap_start - pos;
            self.array.copy_within(pos..pos + count, pos + gap);
        } else {
            let count = pos - self.gap_start;
            self.array
                .copy_within(self.gap_end..self.gap_end + count, self.gap_start);
        }
        tracing::trace!(from = self.gap_start, to = pos, "moved gap");
        self.gap_start = pos;
        self.gap_end = pos + gap;
    }

    /// Make room for `needed` more characters in the gap.
    fn ensure_gap(&mut self, needed: usize) {
        if self.gap_size() >= needed {
            return;
        }
        let content_len = self.len();
        let new_len = self.growth.grown_len(content_len + needed);
        let after = self.array.len() - self.gap_end;
        let mut array = vec![GAP_FILL; new_len];
        array[..self.gap_start].copy_from_slice(&self.array[..self.gap_start]);
        array[new_len - after..].copy_from_slice(&self.array[self.gap_end..]);
        tracing::trace!(old = self.array.len(), new = new_len, "grew gap buffer");
        self.array = array;
        self.gap_end = new_len - after;
    }
}

impl Default for GapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Content for GapBuffer {
    fn len(&self) -> usize {
        self.array.len() - self.gap_size()
    }

    fn positions(&self) -> &PositionTable {
        &self.positions
    }

    fn positions_mut(&mut self) -> &mut PositionTable {
        &mut self.positions
    }

    fn insert_chars(&mut self, offset: usize, chars: &[char]) {
        self.move_gap_to(offset);
        self.ensure_gap(chars.len());
        self.array[self.gap_start..self.gap_start + chars.len()].copy_from_slice(chars);
        self.gap_start += chars.len();
    }

    fn remove_chars(&mut self, offset: usize, len: usize) {
        self.move_gap_to(offset);
        self.array[self.gap_end..self.gap_end + len].fill(GAP_FILL);
        self.gap_end += len;
    }

    fn read_chars(&self, offset: usize, len: usize, partial: bool) -> Vec<char> {
        let end = offset + len;
        let gap = self.gap_size();
        if end <= self.gap_start {
            return self.array[offset..end].to_vec();
        }
        if offset >= self.gap_start {
            return self.array[offset + gap..end + gap].to_vec();
        }
        // Straddles the gap.
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&self.array[offset..self.gap_start]);
        if !partial {
            out.extend_from_slice(&self.array[self.gap_end..end + gap]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Segment;

    fn buffer_with(text: &str, capacity: usize) -> GapBuffer {
        let mut buffer = GapBuffer::with_capacity(capacity);
        buffer.insert_string(0, text).unwrap();
        buffer
    }

    #[test]
    fn test_new_buffer_holds_terminator() {
        let buffer = GapBuffer::new();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get_string(0, 1).unwrap(), "\n");
        assert_eq!(buffer.array_len(), 10);
    }

    #[test]
    fn test_insert_at_start_moves_gap() {
        let mut buffer = buffer_with("abcdefghij", 20);
        assert_eq!(buffer.array_len(), 20);
        buffer.insert_string(0, "z").unwrap();
        assert_eq!(buffer.gap_start(), 1);
        assert_eq!(buffer.get_string(0, 11).unwrap(), "zabcdefghij");
    }

    #[test]
    fn test_growth_preserves_text() {
        let mut buffer = GapBuffer::with_capacity(2);
        buffer.insert_string(0, "hello").unwrap();
        buffer.insert_string(5, " world").unwrap();
        buffer.insert_string(0, ">> ").unwrap();
        assert_eq!(buffer.get_string(0, buffer.len()).unwrap(), ">> hello world\n");
        assert!(buffer.gap_start() <= buffer.gap_end());
        assert!(buffer.gap_end() <= buffer.array_len());
    }

    #[test]
    fn test_increment_growth() {
        let config = DocumentConfig::default()
            .with_initial_capacity(4)
            .with_growth(GrowthPolicy::Increment(8));
        let mut buffer = GapBuffer::with_config(&config);
        buffer.insert_string(0, "abcdef").unwrap();
        assert_eq!(buffer.array_len(), 15);
    }

    #[test]
    fn test_get_chars_straddling_gap() {
        let mut buffer = buffer_with("abcdefghij", 20);
        buffer.insert_string(3, "X").unwrap();
        assert_eq!(buffer.gap_start(), 4);

        let mut whole = Segment::new();
        buffer.get_chars(2, 5, &mut whole).unwrap();
        assert_eq!(whole.to_string(), "cXdef");

        let mut partial = Segment::partial();
        buffer.get_chars(2, 5, &mut partial).unwrap();
        assert_eq!(partial.to_string(), "cX");
    }

    #[test]
    fn test_remove_then_insert_reuses_gap() {
        let mut buffer = buffer_with("abcdefghij", 20);
        buffer.remove(2, 3).unwrap();
        assert_eq!(buffer.gap_start(), 2);
        assert_eq!(buffer.get_string(0, buffer.len()).unwrap(), "abfghij\n");
        buffer.insert_string(2, "CDE").unwrap();
        assert_eq!(buffer.get_string(0, buffer.len()).unwrap(), "abCDEfghij\n");
    }
}
