//! Model metadata registry.
//!
//! The registry memoizes [`ModelMetadata`] per model type for its whole
//! lifetime. Construction of an entry runs in two passes:
//!
//! 1. the model's own field list (scalar and embedded fields), after which
//!    the entry is *partially ready*;
//! 2. one deferred unit per relationship-bearing field, each of which may
//!    resolve other models, after which the entry is *fully ready*.
//!
//! A placeholder entry is inserted before the map lock is released, so a
//! concurrent request for the same type waits on that entry instead of
//! building a duplicate, and a recursive request from the constructing
//! thread itself finds the entry instead of recursing forever. Relationship
//! units only ever ask for *partial* metadata of the models they inspect,
//! which is always available once pass one of that model has finished.
//!
//! Pass one of a model can start the construction of an embedded model.
//! That nested construction stops after its own pass one: its pass two is
//! queued on the thread and drained once the outermost pass one has
//! published, so no relationship is ever resolved against an entry that is
//! still empty. Partial requests always return the pass-one snapshot, which
//! keeps the result independent of the order in which models are requested.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use crate::config::RegistryConfig;
use crate::field::FieldDescriptor;
use crate::metadata::ModelMetadata;
use crate::naming::default_table_name;
use crate::resolver::{self, Deferred, PassOne};
use crate::shape::{Model, ModelType, Shaped, TypeShape};

/// How complete the caller needs the metadata to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The pass-one snapshot: own and embedded columns, no relationship fields.
    Partial,
    /// Everything, including relationship wiring.
    Full,
}

enum EntryState {
    Empty,
    PartialReady(Arc<ModelMetadata>),
    FullyReady {
        partial: Arc<ModelMetadata>,
        full: Arc<ModelMetadata>,
    },
}

impl EntryState {
    fn ready(&self, readiness: Readiness) -> Option<Arc<ModelMetadata>> {
        match (self, readiness) {
            (
                EntryState::PartialReady(partial) | EntryState::FullyReady { partial, .. },
                Readiness::Partial,
            ) => Some(Arc::clone(partial)),
            (EntryState::FullyReady { full, .. }, Readiness::Full) => Some(Arc::clone(full)),
            _ => None,
        }
    }

    fn partial(&self) -> Option<Arc<ModelMetadata>> {
        self.ready(Readiness::Partial)
    }
}

/// Construction bookkeeping of one thread.
#[derive(Default)]
struct ThreadWork {
    /// Pass-one constructions in progress, innermost last.
    depth: usize,
    /// Entries whose pass two waits for the outermost pass one.
    pending: VecDeque<Arc<Entry>>,
}

#[derive(Default)]
struct PassTwo {
    pending: VecDeque<Deferred>,
    resolved: Vec<FieldDescriptor>,
}

struct Entry {
    model_type: ModelType,
    builder: ThreadId,
    state: Mutex<EntryState>,
    ready: Condvar,
    pass_two: Mutex<PassTwo>,
}

impl Entry {
    fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            builder: thread::current().id(),
            state: Mutex::new(EntryState::Empty),
            ready: Condvar::new(),
            pass_two: Mutex::new(PassTwo::default()),
        }
    }

    fn publish(&self, next: EntryState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = next;
        self.ready.notify_all();
    }

    fn snapshot(
        &self,
        state: &EntryState,
        storage_name: impl FnOnce() -> String,
    ) -> Arc<ModelMetadata> {
        match state {
            EntryState::PartialReady(meta) | EntryState::FullyReady { full: meta, .. } => {
                Arc::clone(meta)
            }
            EntryState::Empty => Arc::new(ModelMetadata::placeholder(
                self.model_type,
                storage_name(),
            )),
        }
    }

    fn partial(&self) -> Option<Arc<ModelMetadata>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .partial()
    }

    fn enqueue(&self, units: Vec<Deferred>) {
        let mut pass_two = self.pass_two.lock().unwrap_or_else(PoisonError::into_inner);
        pass_two.pending.extend(units);
    }

    fn next_unit(&self) -> Option<Deferred> {
        let mut pass_two = self.pass_two.lock().unwrap_or_else(PoisonError::into_inner);
        pass_two.pending.pop_front()
    }

    fn complete_unit(&self, field: FieldDescriptor) {
        let mut pass_two = self.pass_two.lock().unwrap_or_else(PoisonError::into_inner);
        pass_two.resolved.push(field);
    }

    fn take_resolved(&self) -> Vec<FieldDescriptor> {
        let mut pass_two = self.pass_two.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut pass_two.resolved)
    }
}

/// Removes an entry whose construction panicked and wakes its waiters with
/// the best metadata available, so nobody blocks forever and the next
/// request retries. Entries queued on the same thread are discarded too.
struct AbandonOnUnwind<'a> {
    registry: &'a Registry,
    entry: &'a Entry,
    armed: bool,
}

impl Drop for AbandonOnUnwind<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.registry.abandon(self.entry);
        let queued = self
            .registry
            .work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&thread::current().id());
        for entry in queued.into_iter().flat_map(|work| work.pending) {
            self.registry.abandon(&entry);
        }
    }
}

/// Process-wide (or per-context) cache of resolved model metadata.
///
/// # Example
///
/// ```ignore
/// use modelmeta::{Model, Registry};
///
/// #[derive(Model, Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// let registry = Registry::new();
/// let meta = registry.resolve::<User>();
/// assert_eq!(meta.storage_name, "users");
/// assert!(std::sync::Arc::ptr_eq(&meta, &registry.resolve::<User>()));
/// ```
pub struct Registry {
    config: RegistryConfig,
    entries: RwLock<HashMap<TypeId, Arc<Entry>>>,
    work: Mutex<HashMap<ThreadId, ThreadWork>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

impl Registry {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            work: Mutex::new(HashMap::new()),
        }
    }

    /// The lazily created process-wide registry (default configuration).
    pub fn shared() -> Arc<Registry> {
        static SHARED: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Registry::new())))
    }

    /// This registry's configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of model types with an entry (complete or under construction).
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when no model has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `M` has an entry.
    pub fn contains<M: Model>(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<M>())
    }

    /// Fully resolved metadata for `M`.
    pub fn resolve<M: Model>(&self) -> Arc<ModelMetadata> {
        self.resolve_model(M::model_type(), Readiness::Full)
    }

    /// Metadata for any field-able type.
    ///
    /// Records resolve as models, and collections of records resolve as their
    /// element model. Anything else yields metadata with no fields.
    pub fn resolve_shape<T: Shaped + ?Sized>(&self) -> Arc<ModelMetadata> {
        match T::type_shape() {
            TypeShape::Record(model_type) | TypeShape::Sequence(model_type) => {
                self.resolve_model(model_type, Readiness::Full)
            }
            _ => Arc::new(ModelMetadata::empty(std::any::type_name::<T>())),
        }
    }

    /// Metadata for `model_type` at the requested readiness.
    ///
    /// `Partial` always yields the pass-one snapshot (own and embedded
    /// fields only), `Full` the complete metadata. Blocks while another
    /// thread constructs the entry. A request from the constructing thread
    /// itself for more than is ready returns the best snapshot available
    /// instead of waiting on itself.
    pub fn resolve_model(
        &self,
        model_type: ModelType,
        readiness: Readiness,
    ) -> Arc<ModelMetadata> {
        let type_id = model_type.type_id();

        let existing = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned();
        if let Some(entry) = existing {
            tracing::trace!(model = model_type.name(), ?readiness, "model metadata cache hit");
            return self.wait(&entry, readiness);
        }

        let entry = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&type_id) {
                // Another thread inserted while we waited for the write lock.
                let entry = Arc::clone(entry);
                drop(entries);
                return self.wait(&entry, readiness);
            }
            let entry = Arc::new(Entry::new(model_type));
            entries.insert(type_id, Arc::clone(&entry));
            entry
        };

        tracing::debug!(model = model_type.name(), "model metadata cache miss");
        self.construct(&entry, readiness)
    }

    /// Table name for a resolved model.
    ///
    /// A per-call `naming_override` wins, then the type's own table name,
    /// then the configured handler applied to the default name.
    pub fn storage_name(&self, metadata: &ModelMetadata, naming_override: Option<&str>) -> String {
        if let Some(name) = naming_override {
            return name.to_string();
        }
        if metadata.explicit_storage_name {
            return metadata.storage_name.clone();
        }
        self.config.apply_table_name_handler(&metadata.storage_name)
    }

    /// Ordered field descriptors of a resolved model.
    pub fn fields_of<'m>(&self, metadata: &'m ModelMetadata) -> &'m [Arc<FieldDescriptor>] {
        metadata.fields()
    }

    /// Table name for `model_type` before overrides and handlers.
    pub(crate) fn default_storage_name(&self, model_type: ModelType) -> String {
        match model_type.shape().table_name {
            Some(name) => name.to_string(),
            None => default_table_name(model_type.name(), self.config.singular_table),
        }
    }

    fn wait(&self, entry: &Entry, readiness: Readiness) -> Arc<ModelMetadata> {
        let mut state = entry.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(meta) = state.ready(readiness) {
                return meta;
            }
            if entry.builder == thread::current().id() {
                tracing::warn!(
                    model = entry.model_type.name(),
                    ?readiness,
                    "model metadata requested by its own construction; returning partial snapshot"
                );
                return entry.snapshot(&state, || self.default_storage_name(entry.model_type));
            }
            state = entry.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn construct(&self, entry: &Arc<Entry>, readiness: Readiness) -> Arc<ModelMetadata> {
        let mut guard = AbandonOnUnwind {
            registry: self,
            entry,
            armed: true,
        };
        let model_type = entry.model_type;
        let storage_name = self.default_storage_name(model_type);

        self.begin_pass_one();
        let PassOne { fields, deferred } = resolver::pass_one(self, model_type);
        let partial = Arc::new(ModelMetadata::new(model_type, storage_name, fields));
        entry.enqueue(deferred);
        entry.publish(EntryState::PartialReady(Arc::clone(&partial)));
        tracing::debug!(
            model = model_type.name(),
            fields = partial.fields().len(),
            "model metadata pass one complete"
        );

        if self.end_pass_one(entry) {
            guard.armed = false;
            tracing::trace!(
                model = model_type.name(),
                "pass two queued behind the enclosing pass one"
            );
            return partial;
        }

        let full = self.complete(entry, &partial);
        guard.armed = false;
        self.drain_queued();
        match readiness {
            Readiness::Partial => partial,
            Readiness::Full => full,
        }
    }

    /// Pass two: resolve every deferred unit, then publish the full metadata.
    fn complete(&self, entry: &Entry, partial: &Arc<ModelMetadata>) -> Arc<ModelMetadata> {
        let model_type = entry.model_type;
        while let Some(unit) = entry.next_unit() {
            let field = resolver::resolve_deferred(self, model_type, partial, unit);
            entry.complete_unit(field);
        }

        let full = Arc::new(partial.extended(entry.take_resolved()));
        entry.publish(EntryState::FullyReady {
            partial: Arc::clone(partial),
            full: Arc::clone(&full),
        });
        tracing::debug!(
            model = model_type.name(),
            fields = full.fields().len(),
            relationships = full.relationships().count(),
            "model metadata ready"
        );
        full
    }

    /// Run pass two of every entry queued on this thread.
    fn drain_queued(&self) {
        while let Some(entry) = self.next_queued() {
            let mut guard = AbandonOnUnwind {
                registry: self,
                entry: &entry,
                armed: true,
            };
            if let Some(partial) = entry.partial() {
                self.complete(&entry, &partial);
            }
            guard.armed = false;
        }
    }

    fn begin_pass_one(&self) {
        let mut work = self.work.lock().unwrap_or_else(PoisonError::into_inner);
        work.entry(thread::current().id()).or_default().depth += 1;
    }

    /// Returns true when `entry` was queued because an enclosing pass one on
    /// this thread has not published yet.
    fn end_pass_one(&self, entry: &Arc<Entry>) -> bool {
        let mut work = self.work.lock().unwrap_or_else(PoisonError::into_inner);
        let id = thread::current().id();
        let Some(mine) = work.get_mut(&id) else {
            return false;
        };
        mine.depth = mine.depth.saturating_sub(1);
        if mine.depth > 0 {
            mine.pending.push_back(Arc::clone(entry));
            return true;
        }
        if mine.pending.is_empty() {
            work.remove(&id);
        }
        false
    }

    fn next_queued(&self) -> Option<Arc<Entry>> {
        let mut work = self.work.lock().unwrap_or_else(PoisonError::into_inner);
        let id = thread::current().id();
        let mine = work.get_mut(&id)?;
        if mine.depth > 0 {
            return None;
        }
        let next = mine.pending.pop_front();
        if mine.pending.is_empty() {
            work.remove(&id);
        }
        next
    }

    fn abandon(&self, entry: &Entry) {
        let model_type = entry.model_type;
        tracing::warn!(
            model = model_type.name(),
            "model metadata construction panicked; entry discarded"
        );
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&model_type.type_id());

        let mut state = entry.state.lock().unwrap_or_else(PoisonError::into_inner);
        let best = entry.snapshot(&state, || self.default_storage_name(model_type));
        let partial = state.partial().unwrap_or_else(|| Arc::clone(&best));
        *state = EntryState::FullyReady {
            partial,
            full: best,
        };
        entry.ready.notify_all();
    }
}
