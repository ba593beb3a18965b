use super::{Document, DocumentEvent};
use crate::element::AttributeSet;
use crate::error::Result;

/// Hook in front of every text mutation of a [`Document`].
///
/// A filter sees inserts, removes (zero-length ones included) and replaces
/// before they happen, and decides what actually reaches the document
/// through the [`FilterBypass`]. The default methods forward unchanged.
pub trait DocumentFilter: Send {
    fn insert_string(
        &mut self,
        bypass: &mut FilterBypass<'_>,
        offset: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<()> {
        bypass.insert_string(offset, text, attributes)
    }

    fn remove(
        &mut self,
        bypass: &mut FilterBypass<'_>,
        offset: usize,
        length: usize,
    ) -> Result<()> {
        bypass.remove(offset, length)
    }

    fn replace(
        &mut self,
        bypass: &mut FilterBypass<'_>,
        offset: usize,
        length: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<()> {
        bypass.replace(offset, length, text, attributes)
    }
}

/// Direct access to the document's mutations, skipping the filter.
pub struct FilterBypass<'a> {
    document: &'a mut Document,
    event: Option<DocumentEvent>,
}

impl<'a> FilterBypass<'a> {
    pub(crate) fn new(document: &'a mut Document) -> Self {
        Self {
            document,
            event: None,
        }
    }

    pub fn document(&self) -> &Document {
        &*self.document
    }

    pub fn insert_string(
        &mut self,
        offset: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<()> {
        let event = self.document.apply_insert(offset, text, attributes)?;
        self.collect(event);
        Ok(())
    }

    pub fn remove(&mut self, offset: usize, length: usize) -> Result<()> {
        let event = self.document.apply_remove(offset, length)?;
        self.collect(event);
        Ok(())
    }

    pub fn replace(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
        attributes: Option<&AttributeSet>,
    ) -> Result<()> {
        let event = self.document.apply_replace(offset, length, text, attributes)?;
        self.collect(event);
        Ok(())
    }

    fn collect(&mut self, event: Option<DocumentEvent>) {
        self.event = match (self.event.take(), event) {
            (Some(mut first), Some(next)) => {
                first.absorb(next);
                Some(first)
            }
            (first, next) => first.or(next),
        };
    }

    /// Everything that went through, as one event.
    pub(crate) fn into_event(self) -> Option<DocumentEvent> {
        self.event
    }
}
