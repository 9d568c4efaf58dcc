use serde::{Deserialize, Serialize};

/// Maximum length of the linearized ancestor chain of any class.
///
/// Limits the output of C3 linearization so that diamond-heavy hierarchies cannot
/// consume unbounded memory or CPU.
pub const DEFAULT_MAX_MRO_LENGTH: usize = 2600;

/// Maximum length of the ancestor chain of any single base.
pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 1000;

/// Names starting with this prefix are not promoted to abstract methods in interfaces.
pub const DEFAULT_RESERVED_PREFIX: &str = "_";

/// Configuration for a [`Runtime`](crate::Runtime).
///
/// Built with chained setters:
///
/// ```
/// use classguard::RuntimeConfig;
///
/// let config = RuntimeConfig::new().max_inheritance_depth(50).reserved_prefix("__");
/// assert_eq!(config.get_max_inheritance_depth(), 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    reserved_prefix: String,
    max_inheritance_depth: usize,
    max_mro_length: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_owned(),
            max_inheritance_depth: DEFAULT_MAX_INHERITANCE_DEPTH,
            max_mro_length: DEFAULT_MAX_MRO_LENGTH,
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefix of names that interfaces leave concrete.
    #[must_use]
    pub fn reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefix = prefix.into();
        self
    }

    /// Sets the maximum ancestor chain length of any base.
    #[must_use]
    pub fn max_inheritance_depth(mut self, limit: usize) -> Self {
        self.max_inheritance_depth = limit;
        self
    }

    /// Sets the maximum linearized chain length of a new class.
    #[must_use]
    pub fn max_mro_length(mut self, limit: usize) -> Self {
        self.max_mro_length = limit;
        self
    }

    #[must_use]
    pub fn get_reserved_prefix(&self) -> &str {
        &self.reserved_prefix
    }

    #[must_use]
    pub fn get_max_inheritance_depth(&self) -> usize {
        self.max_inheritance_depth
    }

    #[must_use]
    pub fn get_max_mro_length(&self) -> usize {
        self.max_mro_length
    }

    /// Returns true if `name` is exempt from interface promotion.
    ///
    /// An empty prefix reserves nothing.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        !self.reserved_prefix.is_empty() && name.starts_with(&self.reserved_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.get_reserved_prefix(), "_");
        assert_eq!(config.get_max_inheritance_depth(), 1000);
        assert_eq!(config.get_max_mro_length(), 2600);
        assert!(config.is_reserved("_helper"));
        assert!(!config.is_reserved("area"));
    }

    #[test]
    fn empty_prefix_reserves_nothing() {
        let config = RuntimeConfig::new().reserved_prefix("");
        assert!(!config.is_reserved("_helper"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"max_mro_length": 10}"#).unwrap();
        assert_eq!(config.get_max_mro_length(), 10);
        assert_eq!(config.get_max_inheritance_depth(), 1000);
    }
}
