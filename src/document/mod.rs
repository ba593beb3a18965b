//! The document: one content store, a default element tree (sections,
//! paragraphs, runs) and a bidi tree over the same text.
//!
//! Every mutation runs the same pipeline under the write lock: content
//! edit, default-tree reconcile, bidi reconcile. The sub-edits are
//! collected into one [`DocumentEvent`], listeners are notified once, and
//! the event is handed back to the caller for undo.

pub mod event;
pub mod filter;

use std::fmt;

use serde_json::{json, Value};

use crate::bidi::{level_attributes, BidiReconciler};
use crate::buffer::{Content, GapBuffer, Position};
use crate::config::DocumentConfig;
use crate::element::spec::check_balanced;
use crate::element::{
    AttrKey, AttributeSet, ElementArena, ElementId, ElementSpec, JoinDirection, SpecType,
    BIDI_ROOT_NAME, SECTION_NAME,
};
use crate::error::{DocumentError, Result};
use crate::reconcile::{ElementBuffer, RemovePlan};

pub use event::{AttributeEdit, DocumentEvent, EventType, SubEdit};
pub use filter::{DocumentFilter, FilterBypass};

/// Observer of document changes, notified once per mutation.
pub trait DocumentListener: Send {
    fn insert_update(&mut self, event: &DocumentEvent);
    fn remove_update(&mut self, event: &DocumentEvent);
    fn changed_update(&mut self, event: &DocumentEvent);
}

/// Observer of undoable events, notified after document listeners.
pub trait UndoableEditListener: Send {
    fn undoable_edit_happened(&mut self, event: &DocumentEvent);
}

pub struct Document {
    config: DocumentConfig,
    content: Box<dyn Content>,
    arena: ElementArena,
    default_root: ElementId,
    bidi_root: ElementId,
    bidi: BidiReconciler,
    listeners: Vec<Box<dyn DocumentListener>>,
    undo_listeners: Vec<Box<dyn UndoableEditListener>>,
    filter: Option<Box<dyn DocumentFilter>>,
    locked: bool,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.len())
            .field("elements", &self.arena.len())
            .field("listeners", &self.listeners.len())
            .field("locked", &self.locked)
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_config(DocumentConfig::default())
    }

    pub fn with_config(config: DocumentConfig) -> Self {
        let content = Box::new(GapBuffer::with_config(&config));
        Self::with_content(content, config)
    }

    /// Wrap an existing store. Its text is split into one paragraph per
    /// line, each holding a single run.
    pub fn with_content(mut content: Box<dyn Content>, config: DocumentConfig) -> Self {
        let mut arena = ElementArena::new();
        let section = AttributeSet::new().with(AttrKey::NAME, SECTION_NAME);
        let default_root = arena.add_branch(None, section);
        let bidi_root =
            arena.add_branch(None, AttributeSet::new().with(AttrKey::NAME, BIDI_ROOT_NAME));

        let text: String = content.read_chars(0, content.len(), false).into_iter().collect();
        let mut paragraphs = Vec::new();
        let mut start = 0;
        for line in text.split_inclusive('\n') {
            let end = start + line.chars().count();
            let paragraph = arena.add_branch(Some(default_root), AttributeSet::new());
            let leaf = arena.add_leaf(
                Some(paragraph),
                AttributeSet::new(),
                content.positions_mut().create(start),
                content.positions_mut().create(end),
            );
            arena.replace(paragraph, 0, 0, &[leaf]);
            paragraphs.push(paragraph);
            start = end;
        }
        arena.replace(default_root, 0, 0, &paragraphs);

        let level = arena.add_leaf(
            Some(bidi_root),
            level_attributes(0),
            content.positions_mut().create(0),
            content.positions_mut().create(start),
        );
        arena.replace(bidi_root, 0, 0, &[level]);

        let bidi = BidiReconciler::new(config.default_direction);
        {
            let mut buffer = ElementBuffer::new(&mut arena, &mut *content, bidi_root);
            let initial = bidi.reconcile(&mut buffer, default_root, 0, start.saturating_sub(1));
            if let Err(err) = initial {
                tracing::warn!("initial bidi runs not computed: {}", err);
            }
        }
        tracing::debug!(len = start, paragraphs = paragraphs.len(), "document created");

        Self {
            config,
            content,
            arena,
            default_root,
            bidi_root,
            bidi,
            listeners: Vec::new(),
            undo_listeners: Vec::new(),
            filter: None,
            locked: false,
        }
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Visible length; the terminator is not counted.
    pub fn len(&self) -> usize {
        self.content.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_text(&self, offset: usize, length: usize) -> Result<String> {
        self.content.get_string(offset, length)
    }

    /// The whole visible text.
    pub fn text(&self) -> String {
        self.content
            .read_chars(0, self.len(), false)
            .into_iter()
            .collect()
    }

    pub fn content(&self) -> &dyn Content {
        &*self.content
    }

    pub fn elements(&self) -> &ElementArena {
        &self.arena
    }

    pub fn default_root_element(&self) -> ElementId {
        self.default_root
    }

    pub fn bidi_root_element(&self) -> ElementId {
        self.bidi_root
    }

    pub fn paragraph_element(&self, offset: usize) -> ElementId {
        self.arena.paragraph_at(self.default_root, offset)
    }

    /// Run of the default tree holding `offset`.
    pub fn character_element(&self, offset: usize) -> ElementId {
        self.arena.leaf_at(self.default_root, offset)
    }

    pub fn bidi_element(&self, offset: usize) -> ElementId {
        self.arena.leaf_at(self.bidi_root, offset)
    }

    pub fn start_position(&mut self) -> Result<Position> {
        self.content.create_position(0)
    }

    pub fn end_position(&mut self) -> Result<Position> {
        let len = self.content.len();
        self.content.create_position(len)
    }

    pub fn create_position(&mut self, offset: usize) -> Result<Position> {
        self.content.create_position(offset)
    }

    /// Both trees as JSON.
    pub fn dump(&self) -> Value {
        json!({
            "length": self.len(),
            "default": self.arena.dump(self.default_root, &*self.content),
            "bidi": self.arena.dump(self.bidi_root, &*self.content),
        })
    }

    pub fn add_document_listener(&mut self, listener: Box<dyn DocumentListener>) {
        self.listeners.push(listener);
    }

    pub fn add_undoable_edit_listener(&mut self, listener: Box<dyn UndoableEditListener>) {
        self.undo_listeners.push(listener);
    }

    pub fn set_document_filter(&mut self, filter: Option<Box<dyn DocumentFilter>>) {
        self.filter = filter;
    }

    pub fn has_document_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Take the write lock. The lock is not reentrant.
    pub fn write_lock(&mut self) -> Result<()> {
        if self.locked {
            return Err(DocumentError::IllegalState("write lock already held".into()));
        }
        self.locked = true;
        Ok(())
    }

    pub fn write_unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_write_locked(&self) -> bool {
        self.locked
    }

    fn with_write_lock<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.write_lock()?;
        let result = f(self);
        self.write_unlock();
        result
    }

    /// Leaf element over `[start, end)`, not attached to `parent`'s
    /// children. A real attribute set needs the write lock; `None` does not.
    /// Created elements are never collected.
    pub fn create_leaf_element(
        &mut self,
        parent: Option<ElementId>,
        attributes: Option<&AttributeSet>,
        start: usize,
        end: usize,
    ) -> Result<ElementId> {
        self.check_attribute_lock(attributes)?;
        if start > end {
            return Err(DocumentError::bad_location(start, "leaf starts after its end"));
        }
        let start = self.content.create_position(start)?;
        let end = self.content.create_position(end)?;
        let attributes = attributes.cloned().unwrap_or_default();
        let leaf = self.arena.add_leaf(parent, attributes, start, end);
        self.arena.retain(leaf);
        Ok(leaf)
    }

    pub fn create_branch_element(
        &mut self,
        parent: Option<ElementId>,
        attributes: Option<&AttributeSet>,
    ) -> Result<ElementId> {
        self.check_attribute_lock(attributes)?;
        let attributes = attributes.cloned().unwrap_or_default();
        let branch = self.arena.add_branch(parent, attributes);
        self.arena.retain(branch);
        Ok(branch)
    }

    pub fn add_element_attributes(
        &mut self,
        element: ElementId,
        attributes: Option<&AttributeSet>,
    ) -> Result<()> {
        self.check_attribute_lock(attributes)?;
        if let Some(attributes) = attributes {
            self.arena.attributes_mut(element).add_attributes(attributes);
        }
        Ok(())
    }

    // TODO: drop the None exemption once callers stop creating elements
    // outside the write lock.
    fn check_attribute_lock(&self, attributes: Option<&AttributeSet>) -> Result<()> {
        if attributes.is_some() && !self.locked {
            return Err(DocumentError::IllegalState(
                "attribute set changed without the write lock".into(),
            ));
        }
        Ok(())
    }

    /// Insert `text` at `offset`. Empty text is a silent no-op that skips
    /// the filter and the listeners.
    pub fn insert_string(
        &mut self,
        offset: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<Option<DocumentEvent>> {
        if text.is_empty() {
            return Ok(None);
        }
        let event = match self.filter.take() {
            Some(mut filter) => {
                let mut bypass = FilterBypass::new(self);
                let result = filter.insert_string(&mut bypass, offset, text, attributes);
                let event = bypass.into_event();
                self.filter = Some(filter);
                result?;
                event
            }
            None => self.apply_insert(offset, text, attributes)?,
        };
        Ok(self.publish(event))
    }

    /// Remove `length` characters at `offset`. A zero-length remove still
    /// passes through the filter and notifies listeners, but records
    /// nothing.
    pub fn remove(&mut self, offset: usize, length: usize) -> Result<Option<DocumentEvent>> {
        let event = match self.filter.take() {
            Some(mut filter) => {
                let mut bypass = FilterBypass::new(self);
                let result = filter.remove(&mut bypass, offset, length);
                let event = bypass.into_event();
                self.filter = Some(filter);
                result?;
                event
            }
            None => self.apply_remove(offset, length)?,
        };
        Ok(self.publish(event))
    }

    /// Remove then insert, as one undoable event.
    pub fn replace(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<Option<DocumentEvent>> {
        let event = match self.filter.take() {
            Some(mut filter) => {
                let mut bypass = FilterBypass::new(self);
                let result = filter.replace(&mut bypass, offset, length, text, attributes);
                let event = bypass.into_event();
                self.filter = Some(filter);
                result?;
                event
            }
            None => self.apply_replace(offset, length, text, attributes)?,
        };
        Ok(self.publish(event))
    }

    /// Insert the text carried by `specs` at `offset`, shaping the tree as
    /// they direct. Every content spec must carry its text.
    pub fn insert_specs(
        &mut self,
        offset: usize,
        specs: &[ElementSpec],
    ) -> Result<Option<DocumentEvent>> {
        let text = spec_text(specs)?;
        if text.is_empty() {
            return Ok(None);
        }
        self.check_insert_offset(offset)?;
        let depth = self.host_depth(offset);
        check_balanced(specs, depth).map_err(DocumentError::InvalidSpecs)?;
        let event = self.with_write_lock(|doc| doc.insert_locked(offset, &text, specs))?;
        self.fire(&event);
        Ok(self.publish(Some(event)))
    }

    /// Discard all text and structure, then build both from `specs`. The
    /// first paragraph is kept and takes the attributes of the first start
    /// tag, recorded as an attribute edit.
    pub fn create(&mut self, specs: &[ElementSpec]) -> Result<DocumentEvent> {
        let text = spec_text(specs)?;
        check_balanced(specs, 1).map_err(DocumentError::InvalidSpecs)?;
        let event = self.with_write_lock(|doc| {
            let length = text.chars().count();
            let mut event = DocumentEvent::new(EventType::Insert, 0, length);
            let old_len = doc.len();
            if old_len > 0 {
                event.add_edit(SubEdit::Content(doc.content.remove(0, old_len)?));
            }
            if let Some(edit) = doc.content.insert_string(0, &text)? {
                event.add_edit(SubEdit::Content(edit));
            }
            let mut buffer =
                ElementBuffer::new(&mut doc.arena, &mut *doc.content, doc.default_root);
            let created = buffer.create(specs);
            event.add_structure(buffer.into_edits());
            let finished = created.and_then(|retitled| {
                if let Some((paragraph, attributes)) = retitled {
                    if let Some(edit) = doc.change_attributes(paragraph, &attributes, true) {
                        event.add_edit(SubEdit::Attribute(edit));
                    }
                }
                doc.reconcile_bidi(&mut event, 0, length)
            });
            if let Err(err) = finished {
                doc.roll_back(&mut event);
                return Err(err);
            }
            Ok(event)
        })?;
        tracing::debug!(%event, "document rebuilt");
        self.collect_elements();
        self.fire(&event);
        self.fire_undoable(&event);
        Ok(event)
    }

    /// Set attributes on every run inside `[offset, offset + length)`,
    /// splitting boundary runs first. `replace` swaps the whole set instead
    /// of merging into it.
    pub fn set_character_attributes(
        &mut self,
        offset: usize,
        length: usize,
        attributes: &AttributeSet,
        replace: bool,
    ) -> Result<Option<DocumentEvent>> {
        self.check_range(offset, length)?;
        if length == 0 {
            return Ok(None);
        }
        let event = self.with_write_lock(|doc| {
            let mut event = DocumentEvent::new(EventType::Change, offset, length);
            let mut buffer =
                ElementBuffer::new(&mut doc.arena, &mut *doc.content, doc.default_root);
            buffer.change(offset, length)?;
            event.add_structure(buffer.into_edits());
            let end = offset + length;
            let runs: Vec<ElementId> = doc
                .arena
                .leaves(doc.default_root)
                .into_iter()
                .filter(|leaf| {
                    doc.arena.start_offset(*leaf) >= offset && doc.arena.end_offset(*leaf) <= end
                })
                .collect();
            for run in runs {
                if let Some(edit) = doc.change_attributes(run, attributes, replace) {
                    event.add_edit(SubEdit::Attribute(edit));
                }
            }
            Ok(event)
        })?;
        if event.is_empty() {
            return Ok(None);
        }
        self.fire(&event);
        Ok(self.publish(Some(event)))
    }

    /// Set attributes on every paragraph touching `[offset, offset + length]`.
    /// Bidi runs are recomputed, since the base direction may change.
    pub fn set_paragraph_attributes(
        &mut self,
        offset: usize,
        length: usize,
        attributes: &AttributeSet,
        replace: bool,
    ) -> Result<Option<DocumentEvent>> {
        self.check_range(offset, length)?;
        let event = self.with_write_lock(|doc| {
            let mut event = DocumentEvent::new(EventType::Change, offset, length);
            for paragraph in doc.paragraphs_touching(offset, offset + length) {
                if let Some(edit) = doc.change_attributes(paragraph, attributes, replace) {
                    event.add_edit(SubEdit::Attribute(edit));
                }
            }
            if let Err(err) = doc.reconcile_bidi(&mut event, offset, length) {
                doc.roll_back(&mut event);
                return Err(err);
            }
            Ok(event)
        })?;
        if event.is_empty() {
            return Ok(None);
        }
        self.fire(&event);
        Ok(self.publish(Some(event)))
    }

    pub(crate) fn apply_insert(
        &mut self,
        offset: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<Option<DocumentEvent>> {
        if text.is_empty() {
            return Ok(None);
        }
        self.check_insert_offset(offset)?;
        let specs = self.specs_for_insert(offset, text, attributes);
        let event = self.with_write_lock(|doc| doc.insert_locked(offset, text, &specs))?;
        self.fire(&event);
        Ok(Some(event))
    }

    pub(crate) fn apply_remove(
        &mut self,
        offset: usize,
        length: usize,
    ) -> Result<Option<DocumentEvent>> {
        self.check_range(offset, length)?;
        if length == 0 {
            let event = DocumentEvent::new(EventType::Remove, offset, 0);
            self.fire(&event);
            return Ok(None);
        }
        let event = self.with_write_lock(|doc| doc.remove_locked(offset, length))?;
        self.fire(&event);
        Ok(Some(event))
    }

    pub(crate) fn apply_replace(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<Option<DocumentEvent>> {
        if length == 0 && text.is_empty() {
            return Ok(None);
        }
        let removed = if length > 0 {
            self.apply_remove(offset, length)?
        } else {
            None
        };
        let inserted = self.apply_insert(offset, text, attributes)?;
        Ok(match (removed, inserted) {
            (Some(mut removed), Some(inserted)) => {
                removed.absorb(inserted);
                Some(removed)
            }
            (removed, inserted) => removed.or(inserted),
        })
    }

    fn insert_locked(
        &mut self,
        offset: usize,
        text: &str,
        specs: &[ElementSpec],
    ) -> Result<DocumentEvent> {
        let length = text.chars().count();
        let mut event = DocumentEvent::new(EventType::Insert, offset, length);
        if let Some(edit) = self.content.insert_string(offset, text)? {
            event.add_edit(SubEdit::Content(edit));
        }
        if let Err(err) = self.reconcile_insert(&mut event, offset, length, specs) {
            self.roll_back(&mut event);
            return Err(err);
        }
        tracing::debug!(%event, "insert");
        Ok(event)
    }

    fn remove_locked(&mut self, offset: usize, length: usize) -> Result<DocumentEvent> {
        let mut event = DocumentEvent::new(EventType::Remove, offset, length);
        let plan = ElementBuffer::new(&mut self.arena, &mut *self.content, self.default_root)
            .plan_remove(offset, length);
        event.add_edit(SubEdit::Content(self.content.remove(offset, length)?));
        if let Err(err) = self.reconcile_remove(&mut event, plan) {
            self.roll_back(&mut event);
            return Err(err);
        }
        tracing::debug!(%event, "remove");
        Ok(event)
    }

    fn reconcile_insert(
        &mut self,
        event: &mut DocumentEvent,
        offset: usize,
        length: usize,
        specs: &[ElementSpec],
    ) -> Result<()> {
        let mut buffer = ElementBuffer::new(&mut self.arena, &mut *self.content, self.default_root);
        let reconciled = buffer.insert(offset, length, specs);
        event.add_structure(buffer.into_edits());
        reconciled?;
        self.reconcile_bidi(event, offset, length)
    }

    fn reconcile_remove(&mut self, event: &mut DocumentEvent, plan: RemovePlan) -> Result<()> {
        let offset = plan.offset();
        let mut buffer = ElementBuffer::new(&mut self.arena, &mut *self.content, self.default_root);
        let reconciled = buffer.remove(plan);
        event.add_structure(buffer.into_edits());
        reconciled?;
        self.reconcile_bidi(event, offset, 0)
    }

    /// Recompute bidi runs around `[offset, offset + length]`. Edits made
    /// before a failure still land in `event`.
    fn reconcile_bidi(
        &mut self,
        event: &mut DocumentEvent,
        offset: usize,
        length: usize,
    ) -> Result<()> {
        let mut buffer = ElementBuffer::new(&mut self.arena, &mut *self.content, self.bidi_root);
        let reconciled = self.bidi.reconcile(&mut buffer, self.default_root, offset, length);
        event.add_bidi(buffer.into_edits());
        reconciled
    }

    /// Undo what a failed mutation already did, so structure never
    /// describes text that is not there.
    fn roll_back(&mut self, event: &mut DocumentEvent) {
        if let Err(err) = event.undo_parts(&mut *self.content, &mut self.arena) {
            tracing::error!(%event, "rollback failed: {}", err);
        } else {
            tracing::warn!(%event, "mutation rolled back");
        }
    }

    /// Element specs for inserting plain `text` at `offset`, computed before
    /// the text goes in.
    ///
    /// Text without line breaks only needs specs when its attributes differ
    /// from the run it lands in. Each line break closes the paragraph and
    /// fractures it, and text right after a line break continues into the
    /// next paragraph.
    fn specs_for_insert(
        &self,
        offset: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Vec<ElementSpec> {
        let attributes = attributes.cloned().unwrap_or_default();
        let after_newline = offset > 0 && self.content.read_chars(offset - 1, 1, false) == ['\n'];
        if !after_newline && !text.contains('\n') {
            let host = self.arena.leaf_at(self.default_root, offset.saturating_sub(1));
            if *self.arena.attributes(host) == attributes {
                return Vec::new();
            }
            return vec![ElementSpec::content(attributes, text.chars().count())
                .with_direction(JoinDirection::JoinPrevious)];
        }

        let paragraph = self.arena.attributes(self.paragraph_element(offset)).clone();
        let mut specs = Vec::new();
        if after_newline {
            specs.push(ElementSpec::end_tag());
            specs.push(
                ElementSpec::start_tag(paragraph.clone()).with_direction(JoinDirection::JoinNext),
            );
        }
        for segment in text.split_inclusive('\n') {
            let length = segment.chars().count();
            if segment.ends_with('\n') {
                specs.push(
                    ElementSpec::content(attributes.clone(), length)
                        .with_direction(JoinDirection::JoinPrevious),
                );
                specs.push(ElementSpec::end_tag());
                specs.push(
                    ElementSpec::start_tag(paragraph.clone())
                        .with_direction(JoinDirection::JoinFracture),
                );
            } else {
                specs.push(
                    ElementSpec::content(attributes.clone(), length)
                        .with_direction(JoinDirection::JoinNext),
                );
            }
        }
        specs
    }

    /// Number of branches above the run an insert at `offset` lands in.
    fn host_depth(&self, offset: usize) -> usize {
        let mut current = self.arena.leaf_at(self.default_root, offset.saturating_sub(1));
        let mut depth = 0;
        while let Some(parent) = self.arena.parent(current) {
            depth += 1;
            if parent == self.default_root {
                break;
            }
            current = parent;
        }
        depth
    }

    fn paragraphs_touching(&self, start: usize, end: usize) -> Vec<ElementId> {
        let mut paragraphs = Vec::new();
        let mut cursor = start;
        loop {
            let paragraph = self.paragraph_element(cursor);
            paragraphs.push(paragraph);
            let paragraph_end = self.arena.end_offset(paragraph);
            if paragraph_end > end || paragraph_end <= cursor {
                break;
            }
            cursor = paragraph_end;
        }
        paragraphs
    }

    fn change_attributes(
        &mut self,
        element: ElementId,
        attributes: &AttributeSet,
        replace: bool,
    ) -> Option<AttributeEdit> {
        let before = self.arena.attributes(element).clone();
        let after = if replace {
            attributes.copy_attributes()
        } else {
            let mut merged = before.clone();
            merged.add_attributes(attributes);
            merged
        };
        if before == after {
            return None;
        }
        *self.arena.attributes_mut(element) = after.clone();
        Some(AttributeEdit::new(element, before, after).pinned(&self.arena))
    }

    fn check_insert_offset(&self, offset: usize) -> Result<()> {
        if offset > self.len() {
            return Err(DocumentError::bad_location(offset, "insert past the end of the document"));
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<()> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(DocumentError::bad_location(offset, "range outside the document")),
        }
    }

    fn fire(&mut self, event: &DocumentEvent) {
        self.fire_as(event.event_type(), event);
    }

    fn fire_as(&mut self, event_type: EventType, event: &DocumentEvent) {
        for listener in &mut self.listeners {
            match event_type {
                EventType::Insert => listener.insert_update(event),
                EventType::Remove => listener.remove_update(event),
                EventType::Change => listener.changed_update(event),
            }
        }
    }

    fn fire_undoable(&mut self, event: &DocumentEvent) {
        for listener in &mut self.undo_listeners {
            listener.undoable_edit_happened(event);
        }
    }

    /// Hand a finished event to undo listeners. Events with nothing to undo
    /// are dropped.
    fn publish(&mut self, event: Option<DocumentEvent>) -> Option<DocumentEvent> {
        let event = event.filter(|event| !event.is_empty());
        self.collect_elements();
        let event = event?;
        self.fire_undoable(&event);
        Some(event)
    }

    /// Free elements that neither tree nor any live event can reach, once
    /// enough have piled up since the last pass.
    fn collect_elements(&mut self) {
        if !self.arena.wants_collect() {
            return;
        }
        let freed = self.arena.collect(&[self.default_root, self.bidi_root]);
        if freed > 0 {
            self.content.positions_mut().prune();
            tracing::debug!(freed, live = self.arena.len(), "elements collected");
        }
    }

    pub(crate) fn undo_event(&mut self, event: &mut DocumentEvent) -> Result<()> {
        self.with_write_lock(|doc| event.undo_parts(&mut *doc.content, &mut doc.arena))?;
        tracing::debug!(%event, "undo");
        let inverse = match event.event_type() {
            EventType::Insert => EventType::Remove,
            EventType::Remove => EventType::Insert,
            EventType::Change => EventType::Change,
        };
        self.fire_as(inverse, event);
        Ok(())
    }

    pub(crate) fn redo_event(&mut self, event: &mut DocumentEvent) -> Result<()> {
        self.with_write_lock(|doc| event.redo_parts(&mut *doc.content, &mut doc.arena))?;
        tracing::debug!(%event, "redo");
        self.fire(event);
        Ok(())
    }
}

/// Concatenated text of the content specs.
fn spec_text(specs: &[ElementSpec]) -> Result<String> {
    let mut text = String::new();
    for (index, spec) in specs.iter().enumerate() {
        if spec.kind != SpecType::Content {
            continue;
        }
        match &spec.data {
            Some(data) if data.chars().count() == spec.length => text.push_str(data),
            _ => {
                return Err(DocumentError::InvalidSpecs(format!(
                    "content spec {} carries no text of length {}",
                    index, spec.length
                )))
            }
        }
    }
    Ok(text)
}
