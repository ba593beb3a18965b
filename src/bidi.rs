//! Bidirectional level runs.
//!
//! The bidi tree is a flat root whose leaves are maximal runs of equal
//! embedding level. After every content edit the paragraphs touching the
//! edit are run through the Unicode Bidirectional Algorithm, and the runs
//! are laid over the bidi root as element specs through the same
//! [`ElementBuffer`] insert that maintains the default tree.

use unicode_bidi::{BidiInfo, Level};

use crate::config::RunDirection;
use crate::element::{
    AttrKey, AttributeSet, ElementArena, ElementId, ElementSpec, JoinDirection, BIDI_LEVEL_NAME,
};
use crate::error::Result;
use crate::reconcile::ElementBuffer;

/// `[start, end)` at one embedding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidiRun {
    pub start: usize,
    pub end: usize,
    pub level: u8,
}

impl BidiRun {
    pub fn is_rtl(&self) -> bool {
        self.level % 2 == 1
    }
}

/// Embedding level of every char of one paragraph.
pub fn paragraph_levels(text: &str, direction: RunDirection) -> Vec<u8> {
    let base = match direction {
        RunDirection::Ltr => Some(Level::ltr()),
        RunDirection::Rtl => Some(Level::rtl()),
        RunDirection::Auto => None,
    };
    let info = BidiInfo::new(text, base);
    text.char_indices()
        .map(|(byte, _)| info.levels[byte].number())
        .collect()
}

/// Level runs of one paragraph whose first char sits at `start`.
pub fn paragraph_runs(text: &str, start: usize, direction: RunDirection) -> Vec<BidiRun> {
    let mut runs: Vec<BidiRun> = Vec::new();
    for (index, level) in paragraph_levels(text, direction).into_iter().enumerate() {
        let offset = start + index;
        match runs.last_mut() {
            Some(run) if run.level == level => run.end = offset + 1,
            _ => runs.push(BidiRun {
                start: offset,
                end: offset + 1,
                level,
            }),
        }
    }
    runs
}

/// Merge touching runs of equal level and drop empty ones.
fn coalesce(runs: Vec<BidiRun>) -> Vec<BidiRun> {
    let mut out: Vec<BidiRun> = Vec::with_capacity(runs.len());
    for run in runs.into_iter().filter(|run| run.end > run.start) {
        match out.last_mut() {
            Some(last) if last.level == run.level && last.end == run.start => last.end = run.end,
            _ => out.push(run),
        }
    }
    out
}

/// Level stored on a bidi leaf.
pub fn leaf_level(arena: &ElementArena, leaf: ElementId) -> u8 {
    arena
        .get_attribute(leaf, &AttrKey::BIDI_LEVEL)
        .and_then(|value| value.as_int())
        .and_then(|level| u8::try_from(level).ok())
        .unwrap_or(0)
}

/// Attributes of a run element at `level`.
pub fn level_attributes(level: u8) -> AttributeSet {
    AttributeSet::new()
        .with(AttrKey::NAME, BIDI_LEVEL_NAME)
        .with(AttrKey::BIDI_LEVEL, i64::from(level))
}

#[derive(Debug, Clone)]
pub struct BidiReconciler {
    default_direction: RunDirection,
}

impl BidiReconciler {
    pub fn new(default_direction: RunDirection) -> Self {
        Self { default_direction }
    }

    /// Base direction of `paragraph`: its `RunDirection` attribute, else the
    /// configured default.
    pub fn direction_of(&self, arena: &ElementArena, paragraph: ElementId) -> RunDirection {
        arena
            .get_attribute(paragraph, &AttrKey::RUN_DIRECTION)
            .and_then(|value| value.as_str())
            .and_then(RunDirection::parse)
            .unwrap_or(self.default_direction)
    }

    /// Recompute runs for the paragraphs of `paragraph_root` touching
    /// `[offset, offset + length]`. `buffer` must be rooted at the bidi
    /// root.
    ///
    /// The touched paragraphs form a window. Its fresh runs become one
    /// content spec each, the first joining the run before the window and
    /// the last joining the run after it, and go through
    /// [`ElementBuffer::insert`] over the whole window. Leaves the window
    /// leaves unchanged are kept, so at most one edit is recorded.
    pub fn reconcile(
        &self,
        buffer: &mut ElementBuffer<'_>,
        paragraph_root: ElementId,
        offset: usize,
        length: usize,
    ) -> Result<()> {
        let (window_start, window_end, runs) =
            self.fresh_runs(buffer, paragraph_root, offset, length)?;
        let runs = coalesce(runs);
        let specs = run_specs(&runs);
        buffer.insert(window_start, window_end - window_start, &specs)?;
        tracing::trace!(offset, length, runs = runs.len(), "bidi runs reconciled");
        Ok(())
    }

    /// Window covered by the touched paragraphs and its freshly computed
    /// runs.
    fn fresh_runs(
        &self,
        buffer: &ElementBuffer<'_>,
        paragraph_root: ElementId,
        offset: usize,
        length: usize,
    ) -> Result<(usize, usize, Vec<BidiRun>)> {
        let arena = buffer.arena();
        let content = buffer.content();
        let last_offset = offset + length;
        let mut runs = Vec::new();
        let mut cursor = offset;
        let mut window_start = None;
        loop {
            let paragraph = arena.paragraph_at(paragraph_root, cursor);
            let start = arena.start_offset(paragraph);
            let end = arena.end_offset(paragraph).min(content.len());
            window_start.get_or_insert(start);
            let text = content.get_string(start, end.saturating_sub(start))?;
            runs.extend(paragraph_runs(&text, start, self.direction_of(arena, paragraph)));
            if end > last_offset || end <= cursor {
                return Ok((window_start.unwrap_or(offset), end, runs));
            }
            cursor = end;
        }
    }
}

/// Content specs laying `runs` over a window: the first run joins the leaf
/// before the window and the last joins the leaf after it. A lone run does
/// both, through a trailing empty join-next spec.
fn run_specs(runs: &[BidiRun]) -> Vec<ElementSpec> {
    let last = runs.len().saturating_sub(1);
    let mut specs: Vec<ElementSpec> = runs
        .iter()
        .enumerate()
        .map(|(index, run)| {
            let direction = match index {
                0 => JoinDirection::JoinPrevious,
                i if i == last => JoinDirection::JoinNext,
                _ => JoinDirection::Originate,
            };
            ElementSpec::content(level_attributes(run.level), run.end - run.start)
                .with_direction(direction)
        })
        .collect();
    if let [only] = runs {
        specs.push(
            ElementSpec::content(level_attributes(only.level), 0)
                .with_direction(JoinDirection::JoinNext),
        );
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Content;
    use crate::element::BIDI_ROOT_NAME;
    use crate::reconcile::test_support::tree;

    fn with_bidi_root(arena: &mut ElementArena, content: &mut dyn Content) -> ElementId {
        let root = arena.add_branch(None, AttributeSet::new().with(AttrKey::NAME, BIDI_ROOT_NAME));
        let len = content.len();
        let start = content.create_position(0).unwrap();
        let end = content.create_position(len).unwrap();
        let leaf = arena.add_leaf(Some(root), level_attributes(0), start, end);
        arena.replace(root, 0, 0, &[leaf]);
        root
    }

    fn levels(arena: &ElementArena, root: ElementId) -> Vec<(usize, usize, u8)> {
        arena
            .children(root)
            .iter()
            .map(|leaf| {
                let level = leaf_level(arena, *leaf);
                (arena.start_offset(*leaf), arena.end_offset(*leaf), level)
            })
            .collect()
    }

    #[test]
    fn test_numbers_in_rtl_text_get_level_two() {
        let levels = paragraph_levels("\u{5d0}\u{5d1} 12\n", RunDirection::Auto);
        assert_eq!(levels, vec![1, 1, 1, 2, 2, 1]);
    }

    #[test]
    fn test_ltr_text_is_one_run() {
        let runs = paragraph_runs("abc\n", 4, RunDirection::Ltr);
        assert_eq!(runs, vec![BidiRun { start: 4, end: 8, level: 0 }]);
        assert!(!runs[0].is_rtl());
    }

    #[test]
    fn test_plain_insert_records_nothing() {
        let (mut content, mut arena, root) = tree("abc", &[]);
        let bidi_root = with_bidi_root(&mut arena, &mut content);
        content.insert_string(1, "xy").unwrap();
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        BidiReconciler::new(RunDirection::Ltr)
            .reconcile(&mut buffer, root, 1, 2)
            .unwrap();
        assert!(buffer.edits().is_empty());
        assert_eq!(levels(&arena, bidi_root), vec![(0, 6, 0)]);
    }

    #[test]
    fn test_rtl_insert_splits_run() {
        let (mut content, mut arena, root) = tree("abc", &[]);
        let bidi_root = with_bidi_root(&mut arena, &mut content);
        content.insert_string(1, "\u{5d0}\u{5d1}").unwrap();
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        BidiReconciler::new(RunDirection::Ltr)
            .reconcile(&mut buffer, root, 1, 2)
            .unwrap();
        assert_eq!(buffer.edits().len(), 1);
        assert_eq!(levels(&arena, bidi_root), vec![(0, 1, 0), (1, 3, 1), (3, 6, 0)]);
    }

    #[test]
    fn test_removing_rtl_text_merges_runs_back() {
        let (mut content, mut arena, root) = tree("abc", &[]);
        let bidi_root = with_bidi_root(&mut arena, &mut content);
        let reconciler = BidiReconciler::new(RunDirection::Ltr);
        content.insert_string(1, "\u{5d0}").unwrap();
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        reconciler.reconcile(&mut buffer, root, 1, 1).unwrap();
        drop(buffer);

        content.remove(1, 1).unwrap();
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        reconciler.reconcile(&mut buffer, root, 1, 0).unwrap();
        assert_eq!(buffer.edits().len(), 1);
        assert_eq!(levels(&arena, bidi_root), vec![(0, 4, 0)]);
    }

    #[test]
    fn test_untouched_runs_keep_their_leaves() {
        let (mut content, mut arena, root) = tree("ab\n\u{5d0}\u{5d1}\ncd", &[]);
        let bidi_root = with_bidi_root(&mut arena, &mut content);
        let reconciler = BidiReconciler::new(RunDirection::Ltr);
        let len = content.len();
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        reconciler.reconcile(&mut buffer, root, 0, len - 1).unwrap();
        drop(buffer);
        assert_eq!(levels(&arena, bidi_root), vec![(0, 3, 0), (3, 5, 1), (5, 9, 0)]);
        let leaves = arena.children(bidi_root).to_vec();

        content.insert_string(1, "x").unwrap();
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        reconciler.reconcile(&mut buffer, root, 1, 1).unwrap();
        assert!(buffer.edits().is_empty());
        assert_eq!(arena.children(bidi_root), leaves.as_slice());
        assert_eq!(levels(&arena, bidi_root), vec![(0, 4, 0), (4, 6, 1), (6, 10, 0)]);
    }

    #[test]
    fn test_window_inside_one_run_joins_both_sides() {
        let (mut content, mut arena, root) = tree("ab\ncd\nef", &[]);
        let bidi_root = with_bidi_root(&mut arena, &mut content);
        let leaf = arena.children(bidi_root)[0];
        content.insert_string(4, "x").unwrap();
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        BidiReconciler::new(RunDirection::Ltr)
            .reconcile(&mut buffer, root, 4, 1)
            .unwrap();
        assert!(buffer.edits().is_empty());
        assert_eq!(arena.children(bidi_root), &[leaf]);
        assert_eq!(levels(&arena, bidi_root), vec![(0, 10, 0)]);
    }

    #[test]
    fn test_run_specs_join_outward() {
        let runs = [
            BidiRun { start: 0, end: 2, level: 0 },
            BidiRun { start: 2, end: 3, level: 1 },
            BidiRun { start: 3, end: 5, level: 0 },
        ];
        let kinds: Vec<String> = run_specs(&runs).iter().map(ToString::to_string).collect();
        assert_eq!(
            kinds,
            vec!["Content:JoinPrevious:2", "Content:Originate:1", "Content:JoinNext:2"]
        );
        let kinds: Vec<String> = run_specs(&runs[..1]).iter().map(ToString::to_string).collect();
        assert_eq!(kinds, vec!["Content:JoinPrevious:2", "Content:JoinNext:0"]);
    }

    #[test]
    fn test_paragraph_direction_attribute_wins() {
        let (mut content, mut arena, root) = tree("abc", &[]);
        let paragraph = arena.children(root)[0];
        arena
            .attributes_mut(paragraph)
            .add_attribute(AttrKey::RUN_DIRECTION, "rtl");
        let bidi_root = with_bidi_root(&mut arena, &mut content);
        let mut buffer = ElementBuffer::new(&mut arena, &mut content, bidi_root);
        BidiReconciler::new(RunDirection::Ltr)
            .reconcile(&mut buffer, root, 0, 0)
            .unwrap();
        assert_eq!(levels(&arena, bidi_root), vec![(0, 3, 2), (3, 4, 1)]);
    }
}
