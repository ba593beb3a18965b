use std::fmt;

use super::attributes::AttributeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecType {
    /// Opens a branch.
    StartTag,
    /// Closes the innermost open branch.
    EndTag,
    /// A run of content.
    Content,
}

/// How a spec attaches to the structure around the insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDirection {
    /// Content: extend the leaf before the cursor.
    /// Start tag: reopen the branch that was just closed.
    JoinPrevious,
    /// Content: merge with the leaf after the inserted run. With length 0,
    /// the content just before it merges with that leaf instead.
    /// Start tag: continue into the next existing sibling branch.
    JoinNext,
    /// Always a fresh element.
    Originate,
    /// Start tag only: split the branch at the cursor; the new branch takes
    /// the fractured branch's attributes and everything after the cursor.
    JoinFracture,
}

impl fmt::Display for JoinDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinDirection::JoinPrevious => write!(f, "JoinPrevious"),
            JoinDirection::JoinNext => write!(f, "JoinNext"),
            JoinDirection::Originate => write!(f, "Originate"),
            JoinDirection::JoinFracture => write!(f, "Fracture"),
        }
    }
}

/// One fragment of desired structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub kind: SpecType,
    pub direction: JoinDirection,
    pub attributes: AttributeSet,
    /// Content length in characters; zero for tags.
    pub length: usize,
    /// Text carried by a content spec, used by bulk inserts.
    pub data: Option<String>,
}

impl ElementSpec {
    pub fn start_tag(attributes: AttributeSet) -> Self {
        Self {
            kind: SpecType::StartTag,
            direction: JoinDirection::Originate,
            attributes,
            length: 0,
            data: None,
        }
    }

    pub fn end_tag() -> Self {
        Self {
            kind: SpecType::EndTag,
            direction: JoinDirection::Originate,
            attributes: AttributeSet::new(),
            length: 0,
            data: None,
        }
    }

    /// Content spec for `length` characters already present in the store.
    pub fn content(attributes: AttributeSet, length: usize) -> Self {
        Self {
            kind: SpecType::Content,
            direction: JoinDirection::Originate,
            attributes,
            length,
            data: None,
        }
    }

    /// Content spec carrying its own text.
    pub fn text(attributes: AttributeSet, text: &str) -> Self {
        Self {
            kind: SpecType::Content,
            direction: JoinDirection::Originate,
            attributes,
            length: text.chars().count(),
            data: Some(text.to_string()),
        }
    }

    pub fn with_direction(mut self, direction: JoinDirection) -> Self {
        self.direction = direction;
        self
    }
}

impl fmt::Display for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SpecType::StartTag => write!(f, "StartTag:{}", self.direction),
            SpecType::EndTag => write!(f, "EndTag"),
            SpecType::Content => write!(f, "Content:{}:{}", self.direction, self.length),
        }
    }
}

/// Check that `specs` never close more branches than `open_depth` allows and
/// end at the depth they started from.
pub fn check_balanced(specs: &[ElementSpec], open_depth: usize) -> Result<(), String> {
    let mut depth = open_depth as isize;
    for (index, spec) in specs.iter().enumerate() {
        match spec.kind {
            SpecType::StartTag => depth += 1,
            SpecType::EndTag => {
                depth -= 1;
                // The root frame can never be closed.
                if depth < 1 {
                    return Err(format!("spec {} closes the root", index));
                }
            }
            SpecType::Content => {
                if spec.direction == JoinDirection::JoinFracture {
                    return Err(format!("spec {} is content with a fracture direction", index));
                }
            }
        }
    }
    if depth != open_depth as isize {
        return Err(format!(
            "unbalanced specs: {} open branches, expected {}",
            depth, open_depth
        ));
    }
    Ok(())
}
