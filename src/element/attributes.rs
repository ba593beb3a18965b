use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Attribute name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrKey(Cow<'static, str>);

impl AttrKey {
    /// Element name ("paragraph", "content", ...).
    pub const NAME: AttrKey = AttrKey::from_static("name");
    /// Embedding level of a bidi run.
    pub const BIDI_LEVEL: AttrKey = AttrKey::from_static("bidi_level");
    /// Paragraph base direction: `"ltr"`, `"rtl"` or `"auto"`.
    pub const RUN_DIRECTION: AttrKey = AttrKey::from_static("run_direction");
    pub const BOLD: AttrKey = AttrKey::from_static("bold");
    pub const ITALIC: AttrKey = AttrKey::from_static("italic");
    pub const UNDERLINE: AttrKey = AttrKey::from_static("underline");
    pub const FONT_FAMILY: AttrKey = AttrKey::from_static("font_family");
    pub const FONT_SIZE: AttrKey = AttrKey::from_static("font_size");

    pub const fn from_static(name: &'static str) -> Self {
        AttrKey(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        AttrKey(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    /// Opaque handle owned by a collaborator (a font, a component...).
    Handle(u64),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(Arc::from(value))
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(value) => write!(f, "{}", value),
            AttrValue::Int(value) => write!(f, "{}", value),
            AttrValue::Str(value) => write!(f, "{}", value),
            AttrValue::Handle(value) => write!(f, "#{}", value),
        }
    }
}

/// Key/value set with an optional resolve parent consulted on lookup misses.
///
/// Lookup contract:
/// - [`get_attribute`](Self::get_attribute) walks the resolve-parent chain.
/// - [`contains_attribute`](Self::contains_attribute),
///   [`contains_attributes`](Self::contains_attributes) and
///   [`is_defined`](Self::is_defined) look at local entries only.
///
/// So a value inherited from the resolve parent is found by `get_attribute`
/// while `contains_attribute` reports it absent. Callers depend on both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    attrs: BTreeMap<AttrKey, AttrValue>,
    resolve_parent: Option<Arc<AttributeSet>>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: AttrKey, value: impl Into<AttrValue>) -> Self {
        self.add_attribute(key, value);
        self
    }

    pub fn with_resolve_parent(mut self, parent: Arc<AttributeSet>) -> Self {
        self.resolve_parent = Some(parent);
        self
    }

    /// Number of local entries.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn resolve_parent(&self) -> Option<&Arc<AttributeSet>> {
        self.resolve_parent.as_ref()
    }

    pub fn set_resolve_parent(&mut self, parent: Option<Arc<AttributeSet>>) {
        self.resolve_parent = parent;
    }

    /// Local value, else the first value found up the resolve-parent chain.
    pub fn get_attribute(&self, key: &AttrKey) -> Option<&AttrValue> {
        let mut current = Some(self);
        while let Some(set) = current {
            if let Some(value) = set.attrs.get(key) {
                return Some(value);
            }
            current = set.resolve_parent.as_deref();
        }
        None
    }

    /// Local entries only; never consults the resolve parent.
    pub fn is_defined(&self, key: &AttrKey) -> bool {
        self.attrs.contains_key(key)
    }

    /// Local entries only; never consults the resolve parent.
    pub fn contains_attribute(&self, key: &AttrKey, value: &AttrValue) -> bool {
        self.attrs.get(key) == Some(value)
    }

    /// Every local entry of `other` is present locally here. Resolve parents
    /// of either set are ignored.
    pub fn contains_attributes(&self, other: &AttributeSet) -> bool {
        other
            .attrs
            .iter()
            .all(|(key, value)| self.contains_attribute(key, value))
    }

    /// Same local entries and same resolve parent.
    pub fn is_equal(&self, other: &AttributeSet) -> bool {
        self == other
    }

    /// Detached snapshot. The resolve parent is shared, not re-resolved.
    pub fn copy_attributes(&self) -> AttributeSet {
        self.clone()
    }

    pub fn add_attribute(&mut self, key: AttrKey, value: impl Into<AttrValue>) {
        self.attrs.insert(key, value.into());
    }

    /// Copy every local entry (and the resolve parent, if any) of `other`.
    pub fn add_attributes(&mut self, other: &AttributeSet) {
        for (key, value) in &other.attrs {
            self.attrs.insert(key.clone(), value.clone());
        }
        if other.resolve_parent.is_some() {
            self.resolve_parent = other.resolve_parent.clone();
        }
    }

    pub fn remove_attribute(&mut self, key: &AttrKey) -> Option<AttrValue> {
        self.attrs.remove(key)
    }

    /// Drop every local entry, keeping the resolve parent.
    pub fn clear(&mut self) {
        self.attrs.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttrKey, &AttrValue)> {
        self.attrs.iter()
    }
}
