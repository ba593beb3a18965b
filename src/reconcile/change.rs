use super::ElementBuffer;
use crate::element::ElementId;
use crate::error::Result;

impl ElementBuffer<'_> {
    /// Split leaves so that `offset` and `offset + length` fall on leaf
    /// boundaries, ahead of an attribute change over that range.
    ///
    /// Only boundary leaves are replaced. Leaves between the two split
    /// points of one paragraph stay in the recorded window and show up in
    /// both arrays of its edit.
    pub fn change(&mut self, offset: usize, length: usize) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        let end = offset + length;
        let mut cursor = offset;
        loop {
            let paragraph = self.arena.paragraph_at(self.root, cursor);
            self.split_paragraph(paragraph, offset, end)?;
            let paragraph_end = self.arena.end_offset(paragraph);
            if paragraph_end >= end || paragraph_end <= cursor {
                break;
            }
            cursor = paragraph_end;
        }
        tracing::debug!(offset, length, edits = self.edits.len(), "change reconciled");
        Ok(())
    }

    fn split_paragraph(&mut self, paragraph: ElementId, start: usize, end: usize) -> Result<()> {
        let old = self.arena.children(paragraph).to_vec();
        let mut children = Vec::with_capacity(old.len() + 2);
        let mut split = false;
        for child in old {
            if !self.arena.is_leaf(child) {
                children.push(child);
                continue;
            }
            let child_start = self.arena.start_offset(child);
            let child_end = self.arena.end_offset(child);
            let cuts: Vec<usize> = [start, end]
                .into_iter()
                .filter(|cut| child_start < *cut && *cut < child_end)
                .collect();
            if cuts.is_empty() {
                children.push(child);
                continue;
            }
            split = true;
            let attributes = self.arena.attributes(child).copy_attributes();
            let mut piece_start = child_start;
            for cut in cuts.into_iter().chain(std::iter::once(child_end)) {
                children.push(self.new_leaf(attributes.clone(), piece_start, cut)?);
                piece_start = cut;
            }
        }
        if split {
            self.record(paragraph, children);
        }
        Ok(())
    }
}
