//! Document configuration, with optional overrides from the environment.

use std::env;

/// Default backing-array capacity of a fresh gap buffer.
pub const DEFAULT_INITIAL_CAPACITY: usize = 10;

/// Default number of compound edits kept by an undo manager.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// How the gap buffer grows its backing array once the gap is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthPolicy {
    /// New array length is `(needed + 1) * 2`.
    Doubling,
    /// New array length is `needed + n`.
    Increment(usize),
}

impl GrowthPolicy {
    /// Array length to allocate when `needed` slots must fit.
    pub fn grown_len(&self, needed: usize) -> usize {
        match *self {
            GrowthPolicy::Doubling => (needed + 1) * 2,
            GrowthPolicy::Increment(n) => needed + n.max(1),
        }
    }
}

/// Base direction used for paragraphs without an explicit `RunDirection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDirection {
    Ltr,
    Rtl,
    /// Derived from the first strong character of each paragraph.
    Auto,
}

impl RunDirection {
    /// Parse `ltr`, `rtl` or `auto`, ignoring case and surrounding blanks.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => Some(RunDirection::Ltr),
            "rtl" => Some(RunDirection::Rtl),
            "auto" => Some(RunDirection::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunDirection::Ltr => "ltr",
            RunDirection::Rtl => "rtl",
            RunDirection::Auto => "auto",
        }
    }
}

/// Runtime configuration of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentConfig {
    pub initial_capacity: usize,
    pub growth: GrowthPolicy,
    pub undo_limit: usize,
    pub default_direction: RunDirection,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth: GrowthPolicy::Doubling,
            undo_limit: DEFAULT_UNDO_LIMIT,
            default_direction: RunDirection::Ltr,
        }
    }
}

impl DocumentConfig {
    /// Defaults overlaid with `GAPDOC_*` environment variables.
    ///
    /// # Supported Variables
    /// - `GAPDOC_INITIAL_CAPACITY`: backing array length of a new buffer
    /// - `GAPDOC_GROWTH_INCREMENT`: switches growth to a fixed increment
    /// - `GAPDOC_UNDO_LIMIT`: undo history length
    /// - `GAPDOC_RUN_DIRECTION`: `ltr`, `rtl` or `auto`
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = read_usize("GAPDOC_INITIAL_CAPACITY") {
            config.initial_capacity = capacity;
        }
        if let Some(increment) = read_usize("GAPDOC_GROWTH_INCREMENT") {
            config.growth = GrowthPolicy::Increment(increment);
        }
        if let Some(limit) = read_usize("GAPDOC_UNDO_LIMIT") {
            config.undo_limit = limit;
        }
        if let Ok(value) = env::var("GAPDOC_RUN_DIRECTION") {
            match RunDirection::parse(&value) {
                Some(direction) => config.default_direction = direction,
                None => tracing::warn!("Ignoring GAPDOC_RUN_DIRECTION={:?}", value),
            }
        }
        config
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit;
        self
    }

    pub fn with_default_direction(mut self, direction: RunDirection) -> Self {
        self.default_direction = direction;
        self
    }
}

fn read_usize(name: &str) -> Option<usize> {
    let value = env::var(name).ok()?;
    match value.trim().parse::<usize>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", name, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_policies() {
        assert_eq!(GrowthPolicy::Doubling.grown_len(10), 22);
        assert_eq!(GrowthPolicy::Increment(16).grown_len(10), 26);
        assert_eq!(GrowthPolicy::Increment(0).grown_len(10), 11);
    }

    #[test]
    fn test_run_direction_parse() {
        assert_eq!(RunDirection::parse(" RTL "), Some(RunDirection::Rtl));
        assert_eq!(RunDirection::parse("auto"), Some(RunDirection::Auto));
        assert_eq!(RunDirection::parse("sideways"), None);
    }

    #[test]
    fn test_builder() {
        let config = DocumentConfig::default()
            .with_initial_capacity(20)
            .with_undo_limit(3);
        assert_eq!(config.initial_capacity, 20);
        assert_eq!(config.undo_limit, 3);
        assert_eq!(config.growth, GrowthPolicy::Doubling);
    }
}
