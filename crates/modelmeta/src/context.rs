//! Session-level access to model metadata.
//!
//! A [`Context`] owns an `Arc<Registry>`. Cloning a context shares the
//! registry; building a new one with [`Context::new`] starts from an empty
//! cache, which is what tests and multi-tenant setups with different naming
//! rules want.

use std::collections::HashMap;
use std::sync::Arc;

use modelmeta_core::{
    BoundField, Error, FieldDescriptor, Model, ModelMetadata, Record, Registry, RegistryConfig,
    Result, Value, bind_path, project,
};

/// Owner of a metadata registry.
#[derive(Debug, Clone)]
pub struct Context {
    registry: Arc<Registry>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Context {
    /// Create a context with its own empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            registry: Arc::new(Registry::with_config(config)),
        }
    }

    /// Create a context around an existing registry.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// A context backed by the process-wide registry.
    pub fn shared() -> Self {
        Self::with_registry(Registry::shared())
    }

    /// The registry this context resolves through.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Fully resolved metadata for `M`.
    pub fn resolve<M: Model>(&self) -> Arc<ModelMetadata> {
        self.registry.resolve::<M>()
    }

    /// Table name for `M`. A per-call override wins.
    pub fn table_name<M: Model>(&self, naming_override: Option<&str>) -> String {
        let metadata = self.resolve::<M>();
        self.registry.storage_name(&metadata, naming_override)
    }

    /// Ordered field descriptors of `M`.
    pub fn fields<M: Model>(&self) -> Vec<Arc<FieldDescriptor>> {
        self.resolve::<M>().fields().to_vec()
    }

    /// Field views of `record`, keyed by storage name. With `None`, every
    /// view is detached and blank.
    pub fn fields_of<'r, M: Model>(
        &self,
        record: Option<&'r mut M>,
    ) -> HashMap<String, BoundField<'r>> {
        let metadata = self.resolve::<M>();
        project(record.map(|r| r as &mut dyn Record), &metadata)
    }

    /// Bind `value` into the field of `record` named `field` (declared or
    /// storage name).
    #[tracing::instrument(level = "debug", skip(self, record, value))]
    pub fn bind<M: Model>(
        &self,
        record: &mut M,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let metadata = self.resolve::<M>();
        let Some(descriptor) = metadata.field_by_name(field) else {
            return Err(Error::InvalidTarget {
                field: field.to_string(),
                reason: "model has no such field",
            });
        };
        if descriptor.is_ignored {
            return Err(Error::InvalidTarget {
                field: descriptor.storage_name.clone(),
                reason: "field is ignored",
            });
        }
        let is_blank = bind_path(record, descriptor, value)?;
        tracing::trace!(field = %descriptor.storage_name, is_blank, "field bound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Model;

    #[derive(Model, Default, Debug)]
    struct Account {
        id: i64,
        #[model("column:handle")]
        name: String,
    }

    #[test]
    fn test_fresh_contexts_do_not_share_registries() {
        let first = Context::default();
        let second = Context::default();
        first.resolve::<Account>();
        assert!(first.registry().contains::<Account>());
        assert!(!second.registry().contains::<Account>());

        let clone = first.clone();
        assert!(Arc::ptr_eq(clone.registry(), first.registry()));
    }

    #[test]
    fn test_table_name_override_and_handler() {
        let config = RegistryConfig::new().table_name_handler(|name| format!("crm_{name}"));
        let cx = Context::new(config);
        assert_eq!(cx.table_name::<Account>(None), "crm_accounts");
        assert_eq!(cx.table_name::<Account>(Some("legacy_accounts")), "legacy_accounts");
    }

    #[test]
    fn test_bind_by_declared_and_storage_name() {
        let cx = Context::default();
        let mut account = Account::default();
        cx.bind(&mut account, "id", "7").unwrap();
        cx.bind(&mut account, "handle", "ada").unwrap();
        assert_eq!(account.id, 7);
        assert_eq!(account.name, "ada");

        let err = cx.bind(&mut account, "missing", 1_i64).unwrap_err();
        assert!(err.is_invalid_target());
    }

    #[test]
    fn test_fields_of_without_record_is_blank() {
        let cx = Context::default();
        let views = cx.fields_of::<Account>(None);
        assert_eq!(views.len(), 2);
        assert!(views.values().all(|v| v.is_blank() && !v.is_attached()));
    }
}
