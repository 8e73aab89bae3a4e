//! Repository configuration.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::config::{DeleteBehavior, RepositoryConfig};
//!
//! let config: RepositoryConfig = serde_json::from_str(r#"{ "delete_behavior": "existence_checked" }"#)?;
//! assert_eq!(config.delete_behavior, DeleteBehavior::ExistenceChecked);
//! assert_eq!(config.default_page_size, 10);
//! ```

use serde::{Deserialize, Serialize};

/// How [`delete`](crate::repository::EntityRepository::delete) reports missing documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Queue the deletion and report success whether or not the document existed.
    #[default]
    Unconditional,
    /// Load first; report `false` without writing when the document is missing.
    ExistenceChecked,
}

/// Settings shared by every operation of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub delete_behavior: DeleteBehavior,
    /// Page size used when a page request carries a size of zero.
    pub default_page_size: usize,
}

impl RepositoryConfig {
    pub fn builder() -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::default()
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            delete_behavior: DeleteBehavior::default(),
            default_page_size: 10,
        }
    }
}

/// Builder for [`RepositoryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RepositoryConfigBuilder {
    config: RepositoryConfig,
}

impl RepositoryConfigBuilder {
    pub fn with_delete_behavior(mut self, delete_behavior: DeleteBehavior) -> Self {
        self.config.delete_behavior = delete_behavior;
        self
    }

    pub fn with_default_page_size(mut self, default_page_size: usize) -> Self {
        self.config.default_page_size = default_page_size;
        self
    }

    pub fn build(self) -> RepositoryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: RepositoryConfig =
            serde_json::from_str(r#"{ "delete_behavior": "existence_checked" }"#).unwrap();

        assert_eq!(config.delete_behavior, DeleteBehavior::ExistenceChecked);
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn empty_object_is_the_default_config() {
        let config: RepositoryConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, RepositoryConfig::default());
        assert_eq!(config.delete_behavior, DeleteBehavior::Unconditional);
    }

    #[test]
    fn unknown_delete_behavior_is_rejected() {
        assert!(serde_json::from_str::<RepositoryConfig>(r#"{ "delete_behavior": "soft" }"#).is_err());
    }

    #[test]
    fn builder_overrides_individual_settings() {
        let config = RepositoryConfig::builder().with_default_page_size(50).build();

        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.delete_behavior, DeleteBehavior::Unconditional);
    }
}
