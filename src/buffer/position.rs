use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// A live offset into a content store.
///
/// The offset follows every insert and remove applied to the store that
/// created it. Dropping the last clone releases the slot; the store prunes it
/// lazily on its next mutation.
#[derive(Debug, Clone)]
pub struct Position {
    mark: Arc<AtomicUsize>,
}

impl Position {
    /// Current offset
    pub fn offset(&self) -> usize {
        self.mark.load(Ordering::Acquire)
    }

    /// Whether both handles track the same mark.
    pub fn same_mark(&self, other: &Position) -> bool {
        Arc::ptr_eq(&self.mark, &other.mark)
    }
}

/// Offset of a position captured before its range was removed, so undo can
/// put it back exactly where it was.
#[derive(Debug, Clone)]
pub struct SavedPosition {
    mark: Weak<AtomicUsize>,
    offset: usize,
}

impl SavedPosition {
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Weakly-held set of every position created by one content store.
#[derive(Debug, Default)]
pub struct PositionTable {
    marks: Vec<Weak<AtomicUsize>>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self { marks: Vec::new() }
    }

    pub fn create(&mut self, offset: usize) -> Position {
        let mark = Arc::new(AtomicUsize::new(offset));
        self.marks.push(Arc::downgrade(&mark));
        Position { mark }
    }

    /// Drop slots whose positions are no longer referenced.
    pub fn prune(&mut self) {
        let before = self.marks.len();
        self.marks.retain(|mark| mark.strong_count() > 0);
        let dropped = before - self.marks.len();
        if dropped > 0 {
            tracing::trace!(dropped, live = self.marks.len(), "pruned positions");
        }
    }

    /// Number of slots still tracked (dead slots count until pruned).
    pub fn tracked(&self) -> usize {
        self.marks.len()
    }

    /// Shift for `len` characters inserted at `offset`.
    ///
    /// Positions at or after `offset` move forward, except that an insert at
    /// the very start leaves offset 0 anchored.
    pub fn shift_for_insert(&self, offset: usize, len: usize) {
        for mark in self.live() {
            let current = mark.load(Ordering::Acquire);
            if current >= offset && !(offset == 0 && current == 0) {
                mark.store(current + len, Ordering::Release);
            }
        }
    }

    /// Shift for `len` characters removed at `offset`; positions inside the
    /// removed range collapse onto `offset`.
    pub fn shift_for_remove(&self, offset: usize, len: usize) {
        for mark in self.live() {
            let current = mark.load(Ordering::Acquire);
            if current > offset {
                let delta = len.min(current - offset);
                mark.store(current - delta, Ordering::Release);
            }
        }
    }

    /// Capture positions whose offset lies in `[start, end]`.
    pub fn positions_in_range(&self, start: usize, end: usize) -> Vec<SavedPosition> {
        self.marks
            .iter()
            .filter_map(|weak| {
                let mark = weak.upgrade()?;
                let offset = mark.load(Ordering::Acquire);
                (offset >= start && offset <= end).then(|| SavedPosition {
                    mark: weak.clone(),
                    offset,
                })
            })
            .collect()
    }

    /// Put captured positions back at their saved offsets. Positions dropped
    /// in the meantime are skipped.
    pub fn restore(&self, saved: &[SavedPosition]) {
        for entry in saved {
            if let Some(mark) = entry.mark.upgrade() {
                mark.store(entry.offset, Ordering::Release);
            }
        }
    }

    fn live(&self) -> impl Iterator<Item = Arc<AtomicUsize>> + '_ {
        self.marks.iter().filter_map(Weak::upgrade)
    }
}
