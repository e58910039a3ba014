//! Concurrent, build-once cache of [`StructDescriptor`]s keyed by type.
//!
//! Reads are a lock-free [`ArcSwap`] load. A miss builds the descriptor outside of any lock and
//! publishes it with a read-copy-update; when two threads race on the same type the first
//! published descriptor wins and the other build is dropped, so every caller observes the same
//! `Arc`. Entries are never evicted.

use crate::error::MetadataError;
use crate::schema::metadata::{self, StructDescriptor};
use crate::schema::reflect::{RecordType, Reflect};
use crate::schema::registry::TagRegistry;
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

static GLOBAL_METADATA: Lazy<Metadata> = Lazy::new(Metadata::default);

type Descriptors = HashMap<TypeId, Arc<StructDescriptor>>;

pub struct Metadata {
    registry: TagRegistry,
    descriptors: ArcSwap<Descriptors>,
    builds: AtomicUsize,
}

impl Metadata {
    pub fn new(registry: TagRegistry) -> Self {
        Self { registry, descriptors: ArcSwap::from_pointee(HashMap::new()), builds: AtomicUsize::new(0) }
    }

    /// The process wide cache, using the built-in namespaces only.
    pub fn global() -> &'static Metadata {
        &GLOBAL_METADATA
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Returns the cached descriptor of `T` without building it.
    pub fn get<T: Reflect>(&self) -> Option<Arc<StructDescriptor>> {
        self.descriptors.load().get(&TypeId::of::<T>()).cloned()
    }

    pub fn get_or_build<T: Reflect>(&self) -> Result<Arc<StructDescriptor>, MetadataError> {
        self.get_or_build_record(RecordType::of::<T>())
    }

    /// Returns the descriptor of `record`, building and publishing it on first use.
    ///
    /// Build failures are not cached: the same error is produced again on the next call.
    pub fn get_or_build_record(&self, record: RecordType) -> Result<Arc<StructDescriptor>, MetadataError> {
        let type_id = record.type_id();
        if let Some(descriptor) = self.descriptors.load().get(&type_id) {
            trace!(record = record.name(), "struct metadata cache hit");
            return Ok(Arc::clone(descriptor));
        }

        let built = Arc::new(metadata::build(&self.registry, record)?);
        self.builds.fetch_add(1, Ordering::Relaxed);

        let previous = self.descriptors.rcu(|current| {
            if current.contains_key(&type_id) {
                return Arc::clone(current);
            }
            let mut next = HashMap::clone(current);
            next.insert(type_id, Arc::clone(&built));
            Arc::new(next)
        });

        match previous.get(&type_id) {
            Some(winner) => {
                debug!(record = record.name(), "concurrent struct metadata build lost the race");
                Ok(Arc::clone(winner))
            }
            None => {
                debug!(record = record.name(), fields = built.len(), "built struct metadata");
                Ok(built)
            }
        }
    }

    /// Number of successful descriptor builds, including builds that lost a race.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.load().is_empty()
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new(TagRegistry::default())
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("registry", &self.registry)
            .field("cached", &self.len())
            .field("builds", &self.build_count())
            .finish()
    }
}
