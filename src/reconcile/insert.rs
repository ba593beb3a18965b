use std::mem;
use std::ops::Range;

use super::ElementBuffer;
use crate::element::spec::check_balanced;
use crate::element::{AttributeSet, ElementId, ElementSpec, JoinDirection, SpecType};
use crate::error::{DocumentError, Result};

/// A child under construction.
enum Piece {
    /// Kept as is.
    Existing(ElementId),
    /// Leaf created at materialization, covering `start..end`.
    Leaf {
        attributes: AttributeSet,
        start: usize,
        end: usize,
    },
    /// Branch closed during the walk; may still be reopened.
    Branch(Box<Frame>),
}

/// A branch open on the walk stack.
struct Frame {
    /// Existing branch that receives the children, or `None` for a new one.
    branch: Option<ElementId>,
    attributes: AttributeSet,
    children: Vec<Piece>,
    /// Children that follow the inserted run, appended when the frame closes
    /// at the end of the walk.
    tail: Vec<Piece>,
    /// The last content piece asked to join the first tail leaf.
    join_next: bool,
}

impl Frame {
    fn fresh(attributes: AttributeSet) -> Self {
        Self {
            branch: None,
            attributes,
            children: Vec::new(),
            tail: Vec::new(),
            join_next: false,
        }
    }
}

/// Per-depth state carried across end/start tags.
#[derive(Default)]
struct Carry {
    /// Tails detached by an end tag, waiting for the next frame at that depth.
    pending: Vec<Vec<Piece>>,
    /// Attributes of the last branch closed at each depth.
    closed: Vec<Option<AttributeSet>>,
}

impl Carry {
    fn take_pending(&mut self, depth: usize) -> Vec<Piece> {
        self.pending.get_mut(depth).map(mem::take).unwrap_or_default()
    }

    fn set_pending(&mut self, depth: usize, pieces: Vec<Piece>) {
        if self.pending.len() <= depth {
            self.pending.resize_with(depth + 1, Vec::new);
        }
        self.pending[depth] = pieces;
    }

    fn set_closed(&mut self, depth: usize, attributes: AttributeSet) {
        if self.closed.len() <= depth {
            self.closed.resize(depth + 1, None);
        }
        self.closed[depth] = Some(attributes);
    }

    fn closed(&self, depth: usize) -> Option<&AttributeSet> {
        self.closed.get(depth).and_then(Option::as_ref)
    }
}

impl ElementBuffer<'_> {
    /// Restructure the tree for the `length` characters at `offset`, as
    /// directed by `specs`.
    ///
    /// Right after a content insert the run sits inside one host leaf
    /// (positions grew it). The run may also span several leaves of the
    /// host's branch; those leaves are replaced. The walk starts with one
    /// frame per branch on the path from the root to the host; the covered
    /// leaves are cut into the part before the run, which opens the
    /// innermost frame, and the part after it, which heads that frame's
    /// tail. Specs then add content and open or close branches. Finally
    /// every open frame takes back its tail and the result is written into
    /// the arena; a new leaf that matches a replaced one exactly keeps the
    /// old element. Specs without tags touch only the host's branch.
    pub fn insert(&mut self, offset: usize, length: usize, specs: &[ElementSpec]) -> Result<()> {
        if specs.is_empty() {
            return Ok(());
        }
        let host = self.host_leaf(offset);
        let path = self.path_to(host)?;
        let open_depth = path.len() - 1;
        check_balanced(specs, open_depth).map_err(DocumentError::InvalidSpecs)?;

        let (mut stack, mut reusable) = self.open_frames(&path, offset, length);
        let mut carry = Carry::default();
        let mut cursor = offset;

        for spec in specs {
            match spec.kind {
                SpecType::Content => {
                    let top = stack
                        .last_mut()
                        .ok_or_else(|| DocumentError::InvalidSpecs("no open branch".into()))?;
                    self.push_content(top, spec, cursor);
                    cursor += spec.length;
                }
                SpecType::EndTag => self.end_tag(&mut stack, &mut carry)?,
                SpecType::StartTag => self.start_tag(&mut stack, &mut carry, spec)?,
            }
        }

        while stack.len() > 1 {
            let Some(mut frame) = stack.pop() else { break };
            frame.tail.append(&mut carry.take_pending(stack.len()));
            self.attach_tail(&mut frame);
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Piece::Branch(Box::new(frame)));
            }
        }
        let mut root_frame = stack
            .pop()
            .ok_or_else(|| DocumentError::InvalidSpecs("root frame closed".into()))?;
        root_frame.tail.append(&mut carry.take_pending(0));
        self.attach_tail(&mut root_frame);
        self.materialize(root_frame, &mut reusable)?;
        tracing::debug!(
            offset,
            length,
            specs = specs.len(),
            edits = self.edits.len(),
            "insert reconciled"
        );
        Ok(())
    }

    /// Leaf that holds an insert at `offset` after positions moved.
    fn host_leaf(&self, offset: usize) -> ElementId {
        self.arena.leaf_at(self.root, offset.saturating_sub(1))
    }

    /// Elements from the root down to `leaf`, both included.
    fn path_to(&self, leaf: ElementId) -> Result<Vec<ElementId>> {
        let mut path = vec![leaf];
        let mut current = leaf;
        while current != self.root {
            current = self
                .arena
                .parent(current)
                .ok_or_else(|| DocumentError::IllegalState("leaf detached from root".into()))?;
            path.push(current);
        }
        path.reverse();
        if path.len() < 2 {
            return Err(DocumentError::IllegalState("root has no leaves".into()));
        }
        Ok(path)
    }

    /// Frames along `path`, plus the leaves a finished walk may reuse.
    fn open_frames(
        &self,
        path: &[ElementId],
        offset: usize,
        length: usize,
    ) -> (Vec<Frame>, Vec<ElementId>) {
        let host = path[path.len() - 1];
        let end = offset + length;
        let mut stack = Vec::with_capacity(path.len());
        let mut reusable = Vec::new();
        for pair in path.windows(2) {
            let (branch, child) = (pair[0], pair[1]);
            let children = self.arena.children(branch);
            let index = children.iter().position(|id| *id == child).unwrap_or(0);
            let covered = if child == host {
                self.covered(children, index, offset, end)
            } else {
                index..index + 1
            };
            let mut frame = Frame {
                branch: Some(branch),
                attributes: self.arena.attributes(branch).clone(),
                children: children[..covered.start].iter().copied().map(Piece::Existing).collect(),
                tail: children[covered.end..].iter().copied().map(Piece::Existing).collect(),
                join_next: false,
            };
            if child == host {
                if let Some(first) = children[covered.clone()].first() {
                    let start = self.arena.start_offset(*first);
                    if start < offset {
                        frame.children.push(Piece::Leaf {
                            attributes: self.arena.attributes(*first).clone(),
                            start,
                            end: offset,
                        });
                    }
                }
                if let Some(last) = children[covered.clone()].last() {
                    let last_end = self.arena.end_offset(*last);
                    if end < last_end {
                        frame.tail.insert(
                            0,
                            Piece::Leaf {
                                attributes: self.arena.attributes(*last).clone(),
                                start: end,
                                end: last_end,
                            },
                        );
                    }
                }
                let low = covered.start.saturating_sub(1);
                let high = (covered.end + 1).min(children.len());
                reusable = children[low..high].to_vec();
            }
            stack.push(frame);
        }
        (stack, reusable)
    }

    /// Children of the host's branch replaced by the run `[start, end)`: the
    /// host unless it ends before the run, the leaves that begin inside the
    /// run, and empty leaves at its edges.
    fn covered(
        &self,
        children: &[ElementId],
        host: usize,
        start: usize,
        end: usize,
    ) -> Range<usize> {
        let empty_within = |id: ElementId| {
            let at = self.arena.start_offset(id);
            self.arena.is_leaf(id) && at == self.arena.end_offset(id) && start <= at && at <= end
        };
        let mut low = host;
        if self.arena.end_offset(children[host]) <= start && !empty_within(children[host]) {
            low += 1;
        }
        while low > 0 && empty_within(children[low - 1]) {
            low -= 1;
        }
        let mut high = host + 1;
        while let Some(next) = children.get(high) {
            let inside = self.arena.is_leaf(*next) && self.arena.start_offset(*next) < end;
            if !inside && !empty_within(*next) {
                break;
            }
            high += 1;
        }
        low..high
    }

    fn push_content(&self, frame: &mut Frame, spec: &ElementSpec, start: usize) {
        if spec.length == 0 {
            if spec.direction == JoinDirection::JoinNext {
                frame.join_next = matches!(frame.children.last(), Some(Piece::Leaf { .. }));
            }
            return;
        }
        let end = start + spec.length;
        match spec.direction {
            JoinDirection::JoinPrevious => {
                if self.join_previous(frame, &spec.attributes, start, end) {
                    frame.join_next = false;
                    return;
                }
                frame.join_next = false;
            }
            JoinDirection::JoinNext => {
                frame.children.push(Piece::Leaf {
                    attributes: spec.attributes.clone(),
                    start,
                    end,
                });
                frame.join_next = true;
                return;
            }
            JoinDirection::Originate | JoinDirection::JoinFracture => frame.join_next = false,
        }
        frame.children.push(Piece::Leaf {
            attributes: spec.attributes.clone(),
            start,
            end,
        });
    }

    /// Extend the leaf right before `start` when its attributes match.
    fn join_previous(
        &self,
        frame: &mut Frame,
        attributes: &AttributeSet,
        start: usize,
        end: usize,
    ) -> bool {
        let Some(last) = frame.children.last_mut() else {
            return false;
        };
        match last {
            Piece::Leaf {
                attributes: previous,
                end: previous_end,
                ..
            } if *previous == *attributes && *previous_end == start => {
                *previous_end = end;
                true
            }
            Piece::Existing(id) => {
                let id = *id;
                if self.arena.is_leaf(id)
                    && self.arena.attributes(id) == attributes
                    && self.arena.end_offset(id) == start
                {
                    *last = Piece::Leaf {
                        attributes: attributes.clone(),
                        start: self.arena.start_offset(id),
                        end,
                    };
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn end_tag(&self, stack: &mut Vec<Frame>, carry: &mut Carry) -> Result<()> {
        let mut frame = stack
            .pop()
            .ok_or_else(|| DocumentError::InvalidSpecs("end tag without open branch".into()))?;
        let depth = stack.len();
        let mut pending = mem::take(&mut frame.tail);
        pending.append(&mut carry.take_pending(depth));
        carry.set_pending(depth, pending);
        carry.set_closed(depth, frame.attributes.clone());
        frame.join_next = false;
        let parent = stack
            .last_mut()
            .ok_or_else(|| DocumentError::InvalidSpecs("end tag closed the root".into()))?;
        parent.children.push(Piece::Branch(Box::new(frame)));
        Ok(())
    }

    fn start_tag(
        &self,
        stack: &mut Vec<Frame>,
        carry: &mut Carry,
        spec: &ElementSpec,
    ) -> Result<()> {
        let depth = stack.len();
        let parent = stack
            .last_mut()
            .ok_or_else(|| DocumentError::InvalidSpecs("start tag without open branch".into()))?;
        let frame = match spec.direction {
            JoinDirection::JoinPrevious => match parent.children.pop() {
                Some(Piece::Branch(frame)) => {
                    let mut frame = *frame;
                    frame.tail = carry.take_pending(depth);
                    frame
                }
                other => {
                    parent.children.extend(other);
                    Frame::fresh(spec.attributes.clone())
                }
            },
            JoinDirection::JoinFracture => {
                let attributes = carry
                    .closed(depth)
                    .cloned()
                    .unwrap_or_else(|| spec.attributes.clone());
                let mut frame = Frame::fresh(attributes);
                frame.tail = carry.take_pending(depth);
                frame
            }
            JoinDirection::JoinNext => match parent.tail.first() {
                Some(Piece::Existing(next)) if !self.arena.is_leaf(*next) => {
                    let next = *next;
                    parent.tail.remove(0);
                    let mut tail = carry.take_pending(depth);
                    tail.extend(self.arena.children(next).iter().copied().map(Piece::Existing));
                    Frame {
                        branch: Some(next),
                        attributes: self.arena.attributes(next).clone(),
                        children: Vec::new(),
                        tail,
                        join_next: false,
                    }
                }
                _ => Frame::fresh(spec.attributes.clone()),
            },
            JoinDirection::Originate => Frame::fresh(spec.attributes.clone()),
        };
        stack.push(frame);
        Ok(())
    }

    /// Append the frame's tail, merging the first tail leaf into a trailing
    /// join-next leaf with equal attributes.
    fn attach_tail(&self, frame: &mut Frame) {
        let mut tail = mem::take(&mut frame.tail);
        if frame.join_next && !tail.is_empty() {
            let next = match &tail[0] {
                Piece::Leaf {
                    attributes,
                    start,
                    end,
                } => Some((attributes.clone(), *start, *end)),
                Piece::Existing(id) if self.arena.is_leaf(*id) => Some((
                    self.arena.attributes(*id).clone(),
                    self.arena.start_offset(*id),
                    self.arena.end_offset(*id),
                )),
                _ => None,
            };
            if let (
                Some((next_attributes, next_start, next_end)),
                Some(Piece::Leaf {
                    attributes, end, ..
                }),
            ) = (next, frame.children.last_mut())
            {
                if *attributes == next_attributes && *end == next_start {
                    *end = next_end;
                    tail.remove(0);
                }
            }
        }
        frame.join_next = false;
        frame.children.append(&mut tail);
    }

    /// Write a finished frame into the arena. Returns `None` when it ended
    /// up without children (and so drops out of its parent). New leaves
    /// take the place of an exact match from `reusable` when there is one.
    fn materialize(
        &mut self,
        frame: Frame,
        reusable: &mut Vec<ElementId>,
    ) -> Result<Option<ElementId>> {
        let mut ids = Vec::with_capacity(frame.children.len());
        for piece in frame.children {
            match piece {
                Piece::Existing(id) => ids.push(id),
                Piece::Leaf {
                    attributes,
                    start,
                    end,
                } => {
                    if end <= start {
                        continue;
                    }
                    let same = reusable.iter().position(|id| {
                        self.arena.is_leaf(*id)
                            && self.arena.start_offset(*id) == start
                            && self.arena.end_offset(*id) == end
                            && *self.arena.attributes(*id) == attributes
                    });
                    match same {
                        Some(index) => ids.push(reusable.swap_remove(index)),
                        None => ids.push(self.new_leaf(attributes, start, end)?),
                    }
                }
                Piece::Branch(child) => {
                    if let Some(id) = self.materialize(*child, reusable)? {
                        ids.push(id);
                    }
                }
            }
        }
        match frame.branch {
            Some(branch) if ids.is_empty() && branch != self.root => Ok(None),
            Some(branch) => {
                self.record(branch, ids);
                Ok(Some(branch))
            }
            None if ids.is_empty() => Ok(None),
            None => Ok(Some(self.new_branch(frame.attributes, &ids))),
        }
    }
}
