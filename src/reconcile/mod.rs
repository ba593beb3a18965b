//! The element buffer: turns raw content edits into element-tree edits.
//!
//! Every operation runs after the content store has already changed (for
//! removes, the affected elements are captured first with
//! [`ElementBuffer::plan_remove`]). Structural changes are applied to the
//! arena immediately and recorded as [`ElementEdit`]s, one per branch whose
//! child list changed, deepest branch first.

mod change;
mod create;
mod insert;
mod remove;

use crate::buffer::Content;
use crate::edit::EditState;
use crate::element::{AttributeSet, ElementArena, ElementId, ElementPin};
use crate::error::Result;

pub use remove::RemovePlan;

/// Child-list replacement on one branch.
///
/// `removed` held the children at `index..` before the edit; `added` holds
/// them after. An element listed in both was kept in place rather than
/// recreated; [`moved`](Self::moved) names those.
///
/// Edits recorded by an [`ElementBuffer`] pin every element they name, so
/// the arena keeps them for as long as the edit can be undone or redone.
#[derive(Debug, Clone)]
pub struct ElementEdit {
    element: ElementId,
    index: usize,
    removed: Vec<ElementId>,
    added: Vec<ElementId>,
    state: EditState,
    pins: Vec<ElementPin>,
}

impl ElementEdit {
    pub fn new(
        element: ElementId,
        index: usize,
        removed: Vec<ElementId>,
        added: Vec<ElementId>,
    ) -> Self {
        Self {
            element,
            index,
            removed,
            added,
            state: EditState::new(),
            pins: Vec::new(),
        }
    }

    /// Pin the branch and both child arrays in `arena`.
    pub(crate) fn pinned(mut self, arena: &ElementArena) -> Self {
        self.pins = std::iter::once(&self.element)
            .chain(&self.removed)
            .chain(&self.added)
            .map(|id| arena.pin(*id))
            .collect();
        self
    }

    /// The branch whose children changed.
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn removed(&self) -> &[ElementId] {
        &self.removed
    }

    pub fn added(&self) -> &[ElementId] {
        &self.added
    }

    /// Elements present in both arrays.
    pub fn moved(&self) -> Vec<ElementId> {
        self.removed
            .iter()
            .filter(|id| self.added.contains(id))
            .copied()
            .collect()
    }

    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.can_redo()
    }

    /// A dead edit can never run again, so it stops pinning.
    pub fn die(&mut self) {
        self.state.die();
        self.pins.clear();
    }

    pub fn undo(&mut self, arena: &mut ElementArena) -> Result<()> {
        self.state.undo()?;
        arena.replace(self.element, self.index, self.added.len(), &self.removed);
        Ok(())
    }

    pub fn redo(&mut self, arena: &mut ElementArena) -> Result<()> {
        self.state.redo()?;
        arena.replace(self.element, self.index, self.removed.len(), &self.added);
        Ok(())
    }
}

/// Reconciles one element tree with edits of the content it covers.
pub struct ElementBuffer<'a> {
    arena: &'a mut ElementArena,
    content: &'a mut dyn Content,
    root: ElementId,
    edits: Vec<ElementEdit>,
}

impl<'a> ElementBuffer<'a> {
    pub fn new(
        arena: &'a mut ElementArena,
        content: &'a mut dyn Content,
        root: ElementId,
    ) -> Self {
        Self {
            arena,
            content,
            root,
            edits: Vec::new(),
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn arena(&self) -> &ElementArena {
        &*self.arena
    }

    pub fn content(&self) -> &dyn Content {
        &*self.content
    }

    /// Edits recorded so far.
    pub fn edits(&self) -> &[ElementEdit] {
        &self.edits
    }

    pub fn into_edits(self) -> Vec<ElementEdit> {
        self.edits
    }

    pub(crate) fn new_leaf(
        &mut self,
        attributes: AttributeSet,
        start: usize,
        end: usize,
    ) -> Result<ElementId> {
        let start = self.content.create_position(start)?;
        let end = self.content.create_position(end)?;
        Ok(self.arena.add_leaf(None, attributes, start, end))
    }

    pub(crate) fn new_branch(
        &mut self,
        attributes: AttributeSet,
        children: &[ElementId],
    ) -> ElementId {
        let branch = self.arena.add_branch(None, attributes);
        self.arena.replace(branch, 0, 0, children);
        branch
    }

    /// Give `branch` the child list `children`, recording the differing span
    /// (common prefix and suffix trimmed). Identical lists record nothing.
    pub fn record(&mut self, branch: ElementId, children: Vec<ElementId>) {
        let old = self.arena.children(branch).to_vec();
        let prefix = old
            .iter()
            .zip(children.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let max_suffix = old.len().min(children.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(children.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        let removed = old[prefix..old.len() - suffix].to_vec();
        let added = children[prefix..children.len() - suffix].to_vec();
        if removed.is_empty() && added.is_empty() {
            return;
        }
        self.replace_window(branch, prefix, removed.len(), added);
    }

    /// Replace `remove_count` children of `branch` at `index` with `added`
    /// and record exactly that window.
    pub fn replace_window(
        &mut self,
        branch: ElementId,
        index: usize,
        remove_count: usize,
        added: Vec<ElementId>,
    ) {
        let removed = self.arena.replace(branch, index, remove_count, &added);
        tracing::trace!(
            branch = branch.index(),
            index,
            removed = removed.len(),
            added = added.len(),
            "element edit"
        );
        let edit = ElementEdit::new(branch, index, removed, added).pinned(&*self.arena);
        self.edits.push(edit);
    }
}
