use super::ElementBuffer;
use crate::element::ElementId;
use crate::error::{DocumentError, Result};

/// Elements affected by a pending remove, captured while their offsets are
/// still distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovePlan {
    offset: usize,
    length: usize,
    shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    Nothing,
    /// Range inside one paragraph.
    Within {
        paragraph: ElementId,
        kept: Vec<ElementId>,
    },
    /// Range crosses paragraph boundaries under one parent: `first..=last`
    /// collapse into one merged paragraph.
    Merge {
        parent: ElementId,
        first: ElementId,
        index: usize,
        count: usize,
        kept: Vec<ElementId>,
    },
    /// Paragraphs under different parents; each keeps its own survivors.
    Separate {
        paragraphs: Vec<(ElementId, Vec<ElementId>)>,
    },
}

impl RemovePlan {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// True when the remove joins paragraphs.
    pub fn merges(&self) -> bool {
        matches!(self.shape, Shape::Merge { .. })
    }
}

impl ElementBuffer<'_> {
    /// Capture what a remove of `[offset, offset + length)` will touch.
    /// Must run before the content store drops the characters.
    pub fn plan_remove(&self, offset: usize, length: usize) -> RemovePlan {
        let shape = if length == 0 {
            Shape::Nothing
        } else {
            self.shape_for(offset, offset + length)
        };
        RemovePlan {
            offset,
            length,
            shape,
        }
    }

    fn shape_for(&self, start: usize, end: usize) -> Shape {
        let first = self.arena.paragraph_at(self.root, start);
        let last = self.arena.paragraph_at(self.root, end);
        if first == last {
            let kept = self.survivors(first, start, end);
            if kept.len() == self.arena.element_count(first) {
                return Shape::Nothing;
            }
            return Shape::Within {
                paragraph: first,
                kept,
            };
        }

        let shared = self
            .arena
            .parent(first)
            .filter(|parent| self.arena.parent(last) == Some(*parent));
        if let Some(parent) = shared {
            let siblings = self.arena.children(parent);
            let index = siblings.iter().position(|id| *id == first);
            let last_index = siblings.iter().position(|id| *id == last);
            if let (Some(index), Some(last_index)) = (index, last_index) {
                let mut kept = self.survivors(first, start, end);
                kept.extend(self.survivors(last, start, end));
                return Shape::Merge {
                    parent,
                    first,
                    index,
                    count: last_index - index + 1,
                    kept,
                };
            }
        }

        let mut paragraphs = Vec::new();
        let mut cursor = start;
        loop {
            let paragraph = self.arena.paragraph_at(self.root, cursor);
            paragraphs.push((paragraph, self.survivors(paragraph, start, end)));
            let next = self.arena.end_offset(paragraph);
            if paragraph == last || next <= cursor {
                break;
            }
            cursor = next;
        }
        Shape::Separate { paragraphs }
    }

    /// Children of `paragraph` not swallowed by `[start, end)`.
    fn survivors(&self, paragraph: ElementId, start: usize, end: usize) -> Vec<ElementId> {
        self.arena
            .children(paragraph)
            .iter()
            .copied()
            .filter(|child| {
                let child_start = self.arena.start_offset(*child);
                let child_end = self.arena.end_offset(*child);
                !(start <= child_start && child_end <= end)
            })
            .collect()
    }

    /// Apply a plan after the content store removed its range.
    ///
    /// Fully covered leaves are dropped and boundary leaves just shrink.
    /// Removing a paragraph separator merges the first and last paragraph
    /// into a new branch carrying the first paragraph's attributes;
    /// paragraphs in between vanish. The merge is one edit on the parent.
    pub fn remove(&mut self, plan: RemovePlan) -> Result<()> {
        match plan.shape {
            Shape::Nothing => {}
            Shape::Within { paragraph, kept } => self.record(paragraph, kept),
            Shape::Merge {
                parent,
                first,
                index,
                count,
                kept,
            } => {
                if kept.is_empty() {
                    return Err(DocumentError::IllegalState(
                        "merged paragraph lost every child".into(),
                    ));
                }
                let attributes = self.arena.attributes(first).copy_attributes();
                let merged = self.new_branch(attributes, &kept);
                self.replace_window(parent, index, count, vec![merged]);
            }
            Shape::Separate { paragraphs } => {
                for (paragraph, kept) in paragraphs {
                    if kept.is_empty() {
                        if let Some(parent) = self.arena.parent(paragraph) {
                            let siblings: Vec<ElementId> = self
                                .arena
                                .children(parent)
                                .iter()
                                .copied()
                                .filter(|id| *id != paragraph)
                                .collect();
                            self.record(parent, siblings);
                        }
                    } else {
                        self.record(paragraph, kept);
                    }
                }
            }
        }
        tracing::debug!(
            offset = plan.offset,
            length = plan.length,
            edits = self.edits.len(),
            "remove reconciled"
        );
        Ok(())
    }
}
