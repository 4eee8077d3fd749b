//! Registry configuration.
//!
//! Controls how default table names are derived. Per-type overrides
//! (`#[model(table_name = "...")]`) and per-call overrides always win over
//! anything configured here.

use std::fmt;
use std::sync::Arc;

/// Hook applied to default table names, e.g. to add a schema prefix.
pub type TableNameHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Configuration for a [`Registry`](crate::registry::Registry).
#[derive(Clone, Default)]
pub struct RegistryConfig {
    /// Keep default table names singular (`user` instead of `users`).
    pub singular_table: bool,

    /// Applied to default table names by
    /// [`Registry::storage_name`](crate::registry::Registry::storage_name).
    /// Not applied to explicit table names.
    pub table_name_handler: Option<TableNameHandler>,
}

impl RegistryConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep default table names singular.
    pub fn singular_table(mut self, singular: bool) -> Self {
        self.singular_table = singular;
        self
    }

    /// Set the default table-name handler.
    pub fn table_name_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.table_name_handler = Some(Arc::new(handler));
        self
    }

    /// Apply the handler (if any) to a default table name.
    pub fn apply_table_name_handler(&self, default_name: &str) -> String {
        match &self.table_name_handler {
            Some(handler) => handler(default_name),
            None => default_name.to_string(),
        }
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("singular_table", &self.singular_table)
            .field(
                "table_name_handler",
                &self.table_name_handler.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RegistryConfig::new();
        assert!(!config.singular_table);
        assert_eq!(config.apply_table_name_handler("users"), "users");
    }

    #[test]
    fn test_config_builder() {
        let config = RegistryConfig::new()
            .singular_table(true)
            .table_name_handler(|name| format!("app_{name}"));
        assert!(config.singular_table);
        assert_eq!(config.apply_table_name_handler("user"), "app_user");
        assert!(format!("{config:?}").contains("<fn>"));
    }
}
