use std::sync::{Arc, Mutex};

use gapdoc::bidi::leaf_level;
use gapdoc::{
    AttrKey, AttributeSet, Document, DocumentError, DocumentEvent, DocumentFilter,
    DocumentListener, ElementSpec, EventType, FilterBypass, SubEdit, UndoManager,
    UndoableEditListener,
};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl DocumentListener for Recorder {
    fn insert_update(&mut self, event: &DocumentEvent) {
        self.push(format!("insert {} {}", event.offset(), event.length()));
    }

    fn remove_update(&mut self, event: &DocumentEvent) {
        self.push(format!("remove {} {}", event.offset(), event.length()));
    }

    fn changed_update(&mut self, event: &DocumentEvent) {
        self.push(format!("change {} {}", event.offset(), event.length()));
    }
}

impl UndoableEditListener for Recorder {
    fn undoable_edit_happened(&mut self, event: &DocumentEvent) {
        self.push(format!("undoable {}", event.event_type()));
    }
}

fn observed(text: &str) -> (Document, Recorder) {
    let mut doc = Document::new();
    doc.insert_string(0, text, None).unwrap();
    let recorder = Recorder::default();
    doc.add_document_listener(Box::new(recorder.clone()));
    doc.add_undoable_edit_listener(Box::new(recorder.clone()));
    (doc, recorder)
}

fn paragraph_ranges(doc: &Document) -> Vec<(usize, usize)> {
    let elements = doc.elements();
    elements
        .children(doc.default_root_element())
        .iter()
        .map(|p| (elements.start_offset(*p), elements.end_offset(*p)))
        .collect()
}

fn bidi_runs(doc: &Document) -> Vec<(usize, usize, u8)> {
    let elements = doc.elements();
    elements
        .children(doc.bidi_root_element())
        .iter()
        .map(|leaf| {
            (
                elements.start_offset(*leaf),
                elements.end_offset(*leaf),
                leaf_level(elements, *leaf),
            )
        })
        .collect()
}

fn kind_order(edit: &SubEdit) -> u8 {
    match edit {
        SubEdit::Content(_) => 0,
        SubEdit::Attribute(_) => 1,
        SubEdit::Structure(_) => 2,
        SubEdit::Bidi(_) => 3,
    }
}

fn structure_edits_on(event: &DocumentEvent, element: gapdoc::ElementId) -> usize {
    event
        .edits()
        .iter()
        .filter(|edit| matches!(edit, SubEdit::Structure(e) if e.element() == element))
        .count()
}

#[test]
fn test_newline_insert_splits_paragraph() {
    let (mut doc, recorder) = observed("abcdef");
    let root = doc.default_root_element();
    let event = doc.insert_string(3, "\n", None).unwrap().unwrap();

    assert_eq!(paragraph_ranges(&doc), vec![(0, 4), (4, 8)]);
    assert_eq!(structure_edits_on(&event, root), 1);
    assert!(event.get_change(root).is_some());
    assert_eq!(doc.get_text(4, 3).unwrap(), "def");
    assert_eq!(recorder.take(), vec!["insert 3 1", "undoable INSERT"]);
}

#[test]
fn test_newline_remove_merges_paragraphs() {
    let (mut doc, recorder) = observed("abc\ndef");
    let root = doc.default_root_element();
    let originals = doc.elements().children(root).to_vec();
    assert_eq!(originals.len(), 2);

    let event = doc.remove(3, 1).unwrap().unwrap();
    let change = event.get_change(root).unwrap();
    assert_eq!(change.removed(), originals.as_slice());
    assert_eq!(change.added().len(), 1);
    assert_eq!(structure_edits_on(&event, root), 1);
    assert_eq!(paragraph_ranges(&doc), vec![(0, 7)]);
    assert_eq!(doc.text(), "abcdef");
    assert_eq!(recorder.take(), vec!["remove 3 1", "undoable REMOVE"]);
}

#[test]
fn test_undo_fires_inverse_listener_and_restores_structure() {
    let (mut doc, recorder) = observed("abc\ndef");
    let before = paragraph_ranges(&doc);
    let mut event = doc.remove(3, 1).unwrap().unwrap();
    recorder.take();

    event.undo(&mut doc).unwrap();
    assert_eq!(doc.text(), "abc\ndef");
    assert_eq!(paragraph_ranges(&doc), before);
    assert_eq!(recorder.take(), vec!["insert 3 1"]);
    assert_eq!(event.undo(&mut doc), Err(DocumentError::CannotUndo));

    event.redo(&mut doc).unwrap();
    assert_eq!(doc.text(), "abcdef");
    assert_eq!(recorder.take(), vec!["remove 3 1"]);
    assert_eq!(event.redo(&mut doc), Err(DocumentError::CannotRedo));
}

#[test]
fn test_undo_manager_unwinds_in_reverse() {
    let mut doc = Document::new();
    let mut history = UndoManager::new();
    for (offset, text) in [(0, "one"), (3, "\ntwo"), (0, "zero\n")] {
        history.add_edit(doc.insert_string(offset, text, None).unwrap().unwrap());
    }
    assert_eq!(doc.text(), "zero\none\ntwo");
    assert_eq!(paragraph_ranges(&doc).len(), 3);

    history.undo(&mut doc).unwrap();
    assert_eq!(doc.text(), "one\ntwo");
    history.undo(&mut doc).unwrap();
    assert_eq!(doc.text(), "one");
    assert_eq!(paragraph_ranges(&doc), vec![(0, 4)]);
    history.redo(&mut doc).unwrap();
    assert_eq!(doc.text(), "one\ntwo");
    assert!(doc.elements().check_coverage(doc.default_root_element()).is_ok());
}

#[test]
fn test_replace_notifies_per_step_and_publishes_once() {
    let (mut doc, recorder) = observed("hello world");
    let mut event = doc.replace(0, 5, "HELLO", None).unwrap().unwrap();
    assert_eq!(doc.text(), "HELLO world");
    assert_eq!(
        recorder.take(),
        vec!["remove 0 5", "insert 0 5", "undoable REMOVE"]
    );

    event.undo(&mut doc).unwrap();
    assert_eq!(doc.text(), "hello world");
}

#[test]
fn test_write_lock_blocks_mutation() {
    let (mut doc, recorder) = observed("abc");
    doc.write_lock().unwrap();
    assert!(matches!(doc.remove(0, 1), Err(DocumentError::IllegalState(_))));
    assert!(matches!(
        doc.insert_string(0, "x", None),
        Err(DocumentError::IllegalState(_))
    ));
    assert!(doc.is_write_locked());
    doc.write_unlock();
    assert_eq!(doc.text(), "abc");
    assert!(recorder.take().is_empty());
}

#[derive(Default)]
struct RemoveLog(Arc<Mutex<Vec<(usize, usize)>>>);

impl DocumentFilter for RemoveLog {
    fn remove(
        &mut self,
        bypass: &mut FilterBypass<'_>,
        offset: usize,
        length: usize,
    ) -> gapdoc::Result<()> {
        self.0.lock().unwrap().push((offset, length));
        bypass.remove(offset, length)
    }
}

#[test]
fn test_filter_sees_zero_length_remove() {
    let (mut doc, recorder) = observed("abc");
    let log = Arc::new(Mutex::new(Vec::new()));
    doc.set_document_filter(Some(Box::new(RemoveLog(log.clone()))));

    assert!(doc.remove(1, 0).unwrap().is_none());
    assert_eq!(*log.lock().unwrap(), vec![(1, 0)]);
    assert_eq!(recorder.take(), vec!["remove 1 0"]);

    doc.remove(0, 2).unwrap().unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(doc.text(), "c");
}

struct Uppercase;

impl DocumentFilter for Uppercase {
    fn insert_string(
        &mut self,
        bypass: &mut FilterBypass<'_>,
        offset: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> gapdoc::Result<()> {
        bypass.insert_string(offset, &text.to_uppercase(), attributes)
    }
}

#[test]
fn test_filter_rewrites_insert() {
    let mut doc = Document::new();
    doc.set_document_filter(Some(Box::new(Uppercase)));
    assert!(doc.has_document_filter());
    doc.insert_string(0, "shout", None).unwrap().unwrap();
    assert_eq!(doc.text(), "SHOUT");
    // Empty inserts never reach the filter.
    assert!(doc.insert_string(0, "", None).unwrap().is_none());
}

#[test]
fn test_set_character_attributes_and_undo() {
    let (mut doc, recorder) = observed("hello world");
    let bold = AttributeSet::new().with(AttrKey::BOLD, true);
    let mut event = doc.set_character_attributes(0, 5, &bold, false).unwrap().unwrap();
    assert_eq!(event.event_type(), EventType::Change);

    let is_bold = |doc: &Document, offset: usize| {
        doc.elements()
            .get_attribute(doc.character_element(offset), &AttrKey::BOLD)
            .and_then(|value| value.as_bool())
            == Some(true)
    };
    assert!(is_bold(&doc, 0));
    assert!(is_bold(&doc, 4));
    assert!(!is_bold(&doc, 5));
    let paragraph = doc.paragraph_element(0);
    assert_eq!(doc.elements().element_count(paragraph), 2);
    assert_eq!(recorder.take(), vec!["change 0 5", "undoable CHANGE"]);

    // Applying the same set again changes nothing.
    assert!(doc.set_character_attributes(0, 5, &bold, false).unwrap().is_none());

    event.undo(&mut doc).unwrap();
    assert!(!is_bold(&doc, 0));
    assert_eq!(doc.elements().element_count(paragraph), 1);
}

#[test]
fn test_paragraph_direction_drives_bidi_levels() {
    let mut doc = Document::new();
    doc.insert_string(0, "abc", None).unwrap();
    assert_eq!(doc.elements().element_count(doc.bidi_root_element()), 1);

    let rtl = AttributeSet::new().with(AttrKey::RUN_DIRECTION, "rtl");
    doc.set_paragraph_attributes(0, 0, &rtl, false).unwrap().unwrap();
    let bidi_root = doc.bidi_root_element();
    let levels: Vec<u8> = doc
        .elements()
        .children(bidi_root)
        .iter()
        .map(|leaf| leaf_level(doc.elements(), *leaf))
        .collect();
    assert_eq!(levels, vec![2, 1]);
}

#[test]
fn test_rtl_insert_adds_bidi_run() {
    let mut doc = Document::new();
    doc.insert_string(0, "ab", None).unwrap();
    let event = doc.insert_string(1, "\u{05d0}\u{05d1}", None).unwrap().unwrap();
    let bidi_root = doc.bidi_root_element();
    assert!(event.get_change(bidi_root).is_some());
    let leaf = doc.bidi_element(1);
    assert_eq!(leaf_level(doc.elements(), leaf), 1);
    assert_eq!(doc.elements().start_offset(leaf), 1);
    assert_eq!(doc.elements().end_offset(leaf), 3);
}

#[test]
fn test_create_rebuilds_document() {
    let (mut doc, recorder) = observed("old text");
    let bold = AttributeSet::new().with(AttrKey::BOLD, true);
    let specs = [
        ElementSpec::start_tag(AttributeSet::new()),
        ElementSpec::text(AttributeSet::new(), "one\n"),
        ElementSpec::end_tag(),
        ElementSpec::start_tag(AttributeSet::new()),
        ElementSpec::text(bold, "two"),
        ElementSpec::end_tag(),
    ];
    doc.create(&specs).unwrap();

    assert_eq!(doc.text(), "one\ntwo");
    assert_eq!(paragraph_ranges(&doc), vec![(0, 4), (4, 8)]);
    let run = doc.character_element(5);
    assert_eq!(
        doc.elements().get_attribute(run, &AttrKey::BOLD).and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(recorder.take(), vec!["insert 0 7", "undoable INSERT"]);
}

#[test]
fn test_insert_specs_requires_text() {
    let mut doc = Document::new();
    let specs = [ElementSpec::content(AttributeSet::new(), 3)];
    assert!(matches!(
        doc.insert_specs(0, &specs),
        Err(DocumentError::InvalidSpecs(_))
    ));
    let specs = [ElementSpec::text(AttributeSet::new().with(AttrKey::ITALIC, true), "abc")];
    doc.insert_specs(0, &specs).unwrap().unwrap();
    assert_eq!(doc.text(), "abc");
}

#[test]
fn test_create_event_orders_every_kind_and_undoes_all() {
    let (mut doc, recorder) = observed("plain\ntext");
    let root = doc.default_root_element();
    let first = doc.elements().children(root)[0];
    let paragraphs = paragraph_ranges(&doc);
    let runs = bidi_runs(&doc);
    let bold = AttributeSet::new().with(AttrKey::BOLD, true);
    let rtl = AttributeSet::new().with(AttrKey::RUN_DIRECTION, "rtl");
    let is_bold = |doc: &Document, offset: usize| {
        doc.elements()
            .get_attribute(doc.character_element(offset), &AttrKey::BOLD)
            .and_then(|value| value.as_bool())
            == Some(true)
    };
    let direction = |doc: &Document| {
        doc.elements()
            .get_attribute(first, &AttrKey::RUN_DIRECTION)
            .and_then(|value| value.as_str())
            .map(str::to_string)
    };

    let specs = [
        ElementSpec::start_tag(rtl),
        ElementSpec::text(bold, "\u{05d0}\u{05d1}\n"),
        ElementSpec::end_tag(),
        ElementSpec::start_tag(AttributeSet::new()),
        ElementSpec::text(AttributeSet::new(), "abc"),
        ElementSpec::end_tag(),
    ];
    let mut event = doc.create(&specs).unwrap();
    assert_eq!(recorder.take(), vec!["insert 0 6", "undoable INSERT"]);

    let kinds: Vec<u8> = event.edits().iter().map(kind_order).collect();
    assert!(kinds.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", kinds);
    for kind in 0..4 {
        assert!(kinds.contains(&kind), "missing sub-edit kind {} in {:?}", kind, kinds);
    }
    assert!(event.get_change(root).is_some());
    assert!(event.get_change(doc.bidi_root_element()).is_some());

    assert_eq!(doc.text(), "\u{05d0}\u{05d1}\nabc");
    assert_eq!(doc.elements().children(root)[0], first);
    assert_eq!(direction(&doc).as_deref(), Some("rtl"));
    assert!(is_bold(&doc, 0));
    assert!(!is_bold(&doc, 3));
    assert_eq!(paragraph_ranges(&doc), vec![(0, 3), (3, 7)]);
    assert_eq!(bidi_runs(&doc), vec![(0, 3, 1), (3, 7, 0)]);

    event.undo(&mut doc).unwrap();
    assert_eq!(doc.text(), "plain\ntext");
    assert_eq!(paragraph_ranges(&doc), paragraphs);
    assert_eq!(bidi_runs(&doc), runs);
    assert_eq!(direction(&doc), None);
    assert!(!is_bold(&doc, 0));
    assert!(doc.elements().check_coverage(root).is_ok());
    assert!(doc.elements().check_coverage(doc.bidi_root_element()).is_ok());
    assert_eq!(recorder.take(), vec!["remove 0 6"]);

    event.redo(&mut doc).unwrap();
    assert_eq!(doc.text(), "\u{05d0}\u{05d1}\nabc");
    assert_eq!(direction(&doc).as_deref(), Some("rtl"));
    assert!(is_bold(&doc, 1));
    assert_eq!(bidi_runs(&doc), vec![(0, 3, 1), (3, 7, 0)]);
}

#[test]
fn test_elements_and_positions_stay_bounded_over_repeated_edits() {
    let mut doc = Document::new();
    doc.insert_string(0, "abcdef", None).unwrap();
    let mut peak_elements = 0;
    let mut peak_positions = 0;
    for _ in 0..2000 {
        doc.insert_string(3, "\n", None).unwrap();
        doc.remove(3, 1).unwrap();
        peak_elements = peak_elements.max(doc.elements().len());
        peak_positions = peak_positions.max(doc.content().positions().tracked());
    }
    assert_eq!(doc.text(), "abcdef");
    assert_eq!(paragraph_ranges(&doc), vec![(0, 7)]);
    assert!(peak_elements < 200, "arena grew to {} elements", peak_elements);
    assert!(peak_positions < 400, "{} positions tracked", peak_positions);
}

#[test]
fn test_undo_history_keeps_collected_elements_reachable() {
    let mut doc = Document::new();
    let mut history = UndoManager::with_limit(1000);
    doc.insert_string(0, "abcdef", None).unwrap();
    // Enough churn for several collections while every edit stays undoable.
    for round in 0..150 {
        let offset = if round % 2 == 0 { 3 } else { 0 };
        history.add_edit(doc.insert_string(offset, "x\n", None).unwrap().unwrap());
        history.add_edit(doc.remove(offset, 2).unwrap().unwrap());
    }
    while history.can_undo() {
        history.undo(&mut doc).unwrap();
        assert!(doc.elements().check_coverage(doc.default_root_element()).is_ok());
    }
    assert_eq!(doc.text(), "abcdef");
    assert_eq!(paragraph_ranges(&doc), vec![(0, 7)]);

    while history.can_redo() {
        history.redo(&mut doc).unwrap();
    }
    assert_eq!(doc.text(), "abcdef");
    assert!(doc.elements().check_coverage(doc.default_root_element()).is_ok());
}
