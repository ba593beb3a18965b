use ropey::Rope;

use super::position::PositionTable;
use super::Content;

/// Content store backed by a [`Rope`].
///
/// Edits cost `O(log n)` wherever they land, so this store suits documents
/// edited at scattered places. It has no internal discontinuity: partial
/// reads always return the whole span.
#[derive(Debug)]
pub struct RopeContent {
    rope: Rope,
    positions: PositionTable,
}

impl RopeContent {
    pub fn new() -> Self {
        Self {
            rope: Rope::from_str("\n"),
            positions: PositionTable::new(),
        }
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }
}

impl Default for RopeContent {
    fn default() -> Self {
        Self::new()
    }
}

impl Content for RopeContent {
    fn len(&self) -> usize {
        self.rope.len_chars()
    }

    fn positions(&self) -> &PositionTable {
        &self.positions
    }

    fn positions_mut(&mut self) -> &mut PositionTable {
        &mut self.positions
    }

    fn insert_chars(&mut self, offset: usize, chars: &[char]) {
        let text: String = chars.iter().collect();
        self.rope.insert(offset, &text);
    }

    fn remove_chars(&mut self, offset: usize, len: usize) {
        self.rope.remove(offset..offset + len);
    }

    fn read_chars(&self, offset: usize, len: usize, _partial: bool) -> Vec<char> {
        self.rope.slice(offset..offset + len).chars().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rope_content_basics() {
        let mut content = RopeContent::new();
        content.insert_string(0, "hello").unwrap();
        content.insert_string(5, " world").unwrap();
        assert_eq!(content.len(), 12);
        assert_eq!(content.rope().to_string(), "hello world\n");
        content.remove(0, 6).unwrap();
        assert_eq!(content.get_string(0, 5).unwrap(), "world");
    }
}
