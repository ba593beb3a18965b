use super::ElementBuffer;
use crate::element::spec::check_balanced;
use crate::element::{AttributeSet, ElementId, ElementSpec, SpecType};
use crate::error::{DocumentError, Result};

impl ElementBuffer<'_> {
    /// Replace every child of the root with the structure `specs` describe.
    ///
    /// The content store must already hold exactly the text of the content
    /// specs, in order. The last content run is stretched over the
    /// terminator. Without any content spec the root gets a single empty
    /// paragraph.
    ///
    /// The root's first paragraph survives as the first branch the specs
    /// open at the top level; only its children are swapped. It is returned
    /// with the attributes its start tag asks for, so the caller can apply
    /// and record them.
    pub fn create(&mut self, specs: &[ElementSpec]) -> Result<Option<(ElementId, AttributeSet)>> {
        check_balanced(specs, 1).map_err(DocumentError::InvalidSpecs)?;
        let total = self.content.len();
        let last_content = specs
            .iter()
            .rposition(|spec| spec.kind == SpecType::Content && spec.length > 0);

        let mut kept = self
            .arena
            .element(self.root, 0)
            .filter(|first| !self.arena.is_leaf(*first));
        let mut retitled = None;
        let mut stack: Vec<(AttributeSet, Vec<ElementId>)> =
            vec![(AttributeSet::new(), Vec::new())];
        let mut cursor = 0;
        for (index, spec) in specs.iter().enumerate() {
            match spec.kind {
                SpecType::StartTag => stack.push((spec.attributes.clone(), Vec::new())),
                SpecType::EndTag => {
                    let (attributes, children) = stack.pop().ok_or_else(|| {
                        DocumentError::InvalidSpecs("end tag closed the root".into())
                    })?;
                    let reuse = if stack.len() == 1 { kept.take() } else { None };
                    let branch = match reuse {
                        Some(first) => {
                            self.record(first, children);
                            retitled = Some((first, attributes));
                            first
                        }
                        None => self.new_branch(attributes, &children),
                    };
                    if let Some((_, parent)) = stack.last_mut() {
                        parent.push(branch);
                    }
                }
                SpecType::Content => {
                    if spec.length == 0 {
                        continue;
                    }
                    let end = if Some(index) == last_content {
                        total.max(cursor + spec.length)
                    } else {
                        cursor + spec.length
                    };
                    let leaf = self.new_leaf(spec.attributes.clone(), cursor, end)?;
                    if let Some((_, children)) = stack.last_mut() {
                        children.push(leaf);
                    }
                    cursor = end;
                }
            }
        }

        let mut children = stack.pop().map(|(_, children)| children).unwrap_or_default();
        if last_content.is_none() {
            let leaf = self.new_leaf(AttributeSet::new(), 0, total)?;
            children = vec![self.new_branch(AttributeSet::new(), &[leaf])];
            retitled = None;
        }
        let count = self.arena.element_count(self.root);
        self.replace_window(self.root, 0, count, children);
        tracing::debug!(specs = specs.len(), kept = retitled.is_some(), "structure created");
        Ok(retitled)
    }
}
