//! The element tree: branches (sections, paragraphs) over leaves (runs of
//! content with uniform attributes).
//!
//! Elements live in an [`ElementArena`] and are addressed by [`ElementId`].
//! Ownership runs strictly parent to children through the branch child
//! lists; the `parent` field is a plain back-index.
//!
//! An element dropped from the tree stays in the arena while something can
//! still put it back: an edit in undo history holds an [`ElementPin`] on
//! every element it names. [`ElementArena::collect`] frees the rest, and a
//! freed slot bumps its generation so stale ids are detected.

pub mod attributes;
pub mod spec;

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::buffer::{Content, Position};

pub use attributes::{AttrKey, AttrValue, AttributeSet};
pub use spec::{ElementSpec, JoinDirection, SpecType};

pub const SECTION_NAME: &str = "section";
pub const PARAGRAPH_NAME: &str = "paragraph";
pub const CONTENT_NAME: &str = "content";
pub const BIDI_ROOT_NAME: &str = "bidi root";
pub const BIDI_LEVEL_NAME: &str = "bidi level";

/// Collection runs once this many elements were created since the last one,
/// or as many as were live after it, whichever is larger.
const COLLECT_FLOOR: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId {
    index: usize,
    generation: u32,
}

impl ElementId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Keeps one element, and everything below it, alive across collections.
#[derive(Debug, Clone)]
pub struct ElementPin(Arc<()>);

#[derive(Debug)]
pub enum ElementKind {
    Leaf { start: Position, end: Position },
    Branch { children: Vec<ElementId> },
}

#[derive(Debug)]
pub struct ElementNode {
    pub kind: ElementKind,
    pub attributes: AttributeSet,
    pub parent: Option<ElementId>,
    anchor: Arc<()>,
    retained: bool,
}

impl ElementNode {
    fn new(kind: ElementKind, attributes: AttributeSet, parent: Option<ElementId>) -> Self {
        Self {
            kind,
            attributes,
            parent,
            anchor: Arc::new(()),
            retained: false,
        }
    }

    fn is_pinned(&self) -> bool {
        self.retained || Arc::strong_count(&self.anchor) > 1
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<ElementNode>,
}

#[derive(Debug, Default)]
pub struct ElementArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
    created_since_collect: usize,
    live_after_collect: usize,
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements currently held, attached or not.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether `id` still names a live element.
    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementNode> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn add_leaf(
        &mut self,
        parent: Option<ElementId>,
        attributes: AttributeSet,
        start: Position,
        end: Position,
    ) -> ElementId {
        self.push(ElementNode::new(ElementKind::Leaf { start, end }, attributes, parent))
    }

    pub(crate) fn add_branch(
        &mut self,
        parent: Option<ElementId>,
        attributes: AttributeSet,
    ) -> ElementId {
        self.push(ElementNode::new(
            ElementKind::Branch {
                children: Vec::new(),
            },
            attributes,
            parent,
        ))
    }

    fn push(&mut self, node: ElementNode) -> ElementId {
        self.live += 1;
        self.created_since_collect += 1;
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.node = Some(node);
        ElementId {
            index,
            generation: slot.generation,
        }
    }

    /// The element behind `id`.
    ///
    /// # Panics
    ///
    /// When `id` was freed by [`collect`](Self::collect), like indexing a
    /// slice out of bounds.
    pub fn node(&self, id: ElementId) -> &ElementNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("element {} is no longer in the arena", id),
        }
    }

    fn node_mut(&mut self, id: ElementId) -> &mut ElementNode {
        match self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
        {
            Some(node) => node,
            None => panic!("element {} is no longer in the arena", id),
        }
    }

    /// Handle that keeps `id` from being collected while it lives.
    pub(crate) fn pin(&self, id: ElementId) -> ElementPin {
        ElementPin(Arc::clone(&self.node(id).anchor))
    }

    /// Keep `id` for the arena's whole life, attached or not.
    pub(crate) fn retain(&mut self, id: ElementId) {
        self.node_mut(id).retained = true;
    }

    /// Whether enough elements were created since the last collection to
    /// make another one worth its walk.
    pub fn wants_collect(&self) -> bool {
        self.created_since_collect >= self.live_after_collect.max(COLLECT_FLOOR)
    }

    /// Free every element that is not reachable from `roots` or from a
    /// pinned or retained element. Returns how many were freed.
    ///
    /// Freed leaves drop their positions; the content store prunes them on
    /// its next mutation. Parent links that pointed at a freed element are
    /// cleared.
    pub fn collect(&mut self, roots: &[ElementId]) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut stack: Vec<usize> = roots
            .iter()
            .filter(|root| self.contains(**root))
            .map(|root| root.index)
            .collect();
        stack.extend(self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().filter(|node| node.is_pinned()).map(|_| index)
        }));
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut marked[index], true) {
                continue;
            }
            if let Some(ElementNode {
                kind: ElementKind::Branch { children },
                ..
            }) = &self.slots[index].node
            {
                stack.extend(children.iter().map(|child| child.index));
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.is_some() && !marked[index] {
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
                freed += 1;
            }
        }
        self.live -= freed;
        self.created_since_collect = 0;
        self.live_after_collect = self.live;
        if freed > 0 {
            let slots = &self.slots;
            let stale = |parent: &ElementId| {
                slots
                    .get(parent.index)
                    .map_or(true, |slot| {
                        slot.node.is_none() || slot.generation != parent.generation
                    })
            };
            let orphans: Vec<usize> = slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| {
                    slot.node
                        .as_ref()
                        .and_then(|node| node.parent.as_ref())
                        .is_some_and(stale)
                })
                .map(|(index, _)| index)
                .collect();
            for index in orphans {
                if let Some(node) = self.slots[index].node.as_mut() {
                    node.parent = None;
                }
            }
            tracing::trace!(freed, live = self.live, "collected elements");
        }
        freed
    }

    pub fn is_leaf(&self, id: ElementId) -> bool {
        matches!(self.node(id).kind, ElementKind::Leaf { .. })
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.node(id).parent
    }

    pub fn attributes(&self, id: ElementId) -> &AttributeSet {
        &self.node(id).attributes
    }

    pub(crate) fn attributes_mut(&mut self, id: ElementId) -> &mut AttributeSet {
        &mut self.node_mut(id).attributes
    }

    /// Attribute lookup through the attribute set's resolve-parent chain
    /// (not through the element's parent).
    pub fn get_attribute(&self, id: ElementId, key: &AttrKey) -> Option<&AttrValue> {
        self.attributes(id).get_attribute(key)
    }

    pub fn name(&self, id: ElementId) -> &str {
        match self.attributes(id).get_attribute(&AttrKey::NAME) {
            Some(AttrValue::Str(name)) => &**name,
            _ if self.is_leaf(id) => CONTENT_NAME,
            _ => PARAGRAPH_NAME,
        }
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        match &self.node(id).kind {
            ElementKind::Branch { children } => children,
            ElementKind::Leaf { .. } => &[],
        }
    }

    pub fn element_count(&self, id: ElementId) -> usize {
        self.children(id).len()
    }

    /// Child at `index`, or `None` outside `[0, element_count)`.
    pub fn element(&self, id: ElementId, index: usize) -> Option<ElementId> {
        self.children(id).get(index).copied()
    }

    pub fn start_offset(&self, id: ElementId) -> usize {
        match &self.node(id).kind {
            ElementKind::Leaf { start, .. } => start.offset(),
            ElementKind::Branch { children } => children
                .first()
                .map(|child| self.start_offset(*child))
                .unwrap_or(0),
        }
    }

    pub fn end_offset(&self, id: ElementId) -> usize {
        match &self.node(id).kind {
            ElementKind::Leaf { end, .. } => end.offset(),
            ElementKind::Branch { children } => children
                .last()
                .map(|child| self.end_offset(*child))
                .unwrap_or(0),
        }
    }

    /// Index of the child whose range holds `offset`: 0 before the branch,
    /// the last child at or past its end. `None` for leaves and empty
    /// branches.
    pub fn element_index(&self, id: ElementId, offset: usize) -> Option<usize> {
        let children = self.children(id);
        if children.is_empty() {
            return None;
        }
        if offset < self.start_offset(id) {
            return Some(0);
        }
        if offset >= self.end_offset(id) {
            return Some(children.len() - 1);
        }
        let after = children.partition_point(|child| self.start_offset(*child) <= offset);
        Some(after.saturating_sub(1))
    }

    /// Descend from `root` to the leaf holding `offset`.
    pub fn leaf_at(&self, root: ElementId, offset: usize) -> ElementId {
        let mut current = root;
        while let Some(index) = self.element_index(current, offset) {
            current = self.children(current)[index];
        }
        current
    }

    /// Descend from `root` to the deepest branch holding `offset` whose
    /// children are leaves.
    pub fn paragraph_at(&self, root: ElementId, offset: usize) -> ElementId {
        let mut current = root;
        while let Some(index) = self.element_index(current, offset) {
            let child = self.children(current)[index];
            if self.is_leaf(child) {
                break;
            }
            current = child;
        }
        current
    }

    /// Splice `added` in place of `remove_count` children at `index`, returning
    /// the removed children.
    ///
    /// Added children are reparented to `branch`, and the children of an
    /// added branch are pointed back at it: a child list is the source of
    /// truth for parent links, and an element put back by undo may have had
    /// its children borrowed by a merged sibling in the meantime.
    pub fn replace(
        &mut self,
        branch: ElementId,
        index: usize,
        remove_count: usize,
        added: &[ElementId],
    ) -> Vec<ElementId> {
        for child in added {
            self.node_mut(*child).parent = Some(branch);
            let grandchildren = self.children(*child).to_vec();
            for grandchild in grandchildren {
                self.node_mut(grandchild).parent = Some(*child);
            }
        }
        match &mut self.node_mut(branch).kind {
            ElementKind::Branch { children } => {
                let end = (index + remove_count).min(children.len());
                children.splice(index..end, added.iter().copied()).collect()
            }
            ElementKind::Leaf { .. } => Vec::new(),
        }
    }

    /// Leaves under `root`, in document order.
    pub fn leaves(&self, root: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.is_leaf(id) {
                out.push(id);
            } else {
                stack.extend(self.children(id).iter().rev());
            }
        }
        out
    }

    /// Verify that every branch under `root` is covered exactly by its
    /// children, in order, with correct parent links.
    pub fn check_coverage(&self, root: ElementId) -> Result<(), String> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let children = self.children(id);
            let mut cursor = self.start_offset(id);
            for child in children {
                if self.parent(*child) != Some(id) {
                    return Err(format!("element {} has a stale parent link", child));
                }
                let start = self.start_offset(*child);
                let end = self.end_offset(*child);
                if start != cursor || end < start {
                    return Err(format!(
                        "element {} covers {}..{}, expected to start at {}",
                        child, start, end, cursor
                    ));
                }
                cursor = end;
                stack.push(*child);
            }
            if !children.is_empty() && cursor != self.end_offset(id) {
                return Err(format!("element {} not covered up to its end", id));
            }
        }
        Ok(())
    }

    /// JSON rendering of the tree under `root`, with leaf text.
    pub fn dump(&self, root: ElementId, content: &dyn Content) -> Value {
        let mut attributes = serde_json::Map::new();
        for (key, value) in self.attributes(root).iter() {
            if *key != AttrKey::NAME {
                attributes.insert(key.to_string(), json!(value.to_string()));
            }
        }
        let start = self.start_offset(root);
        let end = self.end_offset(root);
        if self.is_leaf(root) {
            let text = content
                .get_string(start, end.saturating_sub(start))
                .unwrap_or_default();
            json!({
                "name": self.name(root),
                "range": [start, end],
                "attributes": attributes,
                "text": text,
            })
        } else {
            let children: Vec<Value> = self
                .children(root)
                .iter()
                .map(|child| self.dump(*child, content))
                .collect();
            json!({
                "name": self.name(root),
                "range": [start, end],
                "attributes": attributes,
                "children": children,
            })
        }
    }
}
