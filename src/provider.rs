//! Caller-owned registry holding one shared instance per service type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Types that know how to build their own shared instance.
///
/// Typically implemented for a composed chain wrapper so that a
/// [`ServiceRegistry`] can create it on first use.
pub trait ProvideService: Send + Sync + 'static {
    fn provide() -> Self
    where
        Self: Sized;
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Lazily-initialized map from type to a single shared instance.
///
/// Instances live as long as the registry (or as long as a caller keeps an
/// `Arc` to them). Initializers run outside the internal lock, so two
/// threads may race to build the same type; the first instance stored wins
/// and every caller receives that one.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: Mutex<HashMap<TypeId, Entry>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the instance of `T`, building it with `init` if absent.
    pub fn get_or_init<T, F>(&self, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get::<T>() {
            return existing;
        }

        let created = Arc::new(init());
        let stored = Arc::clone(
            self.lock()
                .entry(TypeId::of::<T>())
                .or_insert_with(|| Arc::clone(&created) as Entry),
        );
        stored.downcast::<T>().unwrap_or(created)
    }

    /// Returns the instance of `P`, building it with [`ProvideService::provide`].
    pub fn provide<P: ProvideService>(&self) -> Arc<P> {
        self.get_or_init(P::provide)
    }

    /// Returns the stored instance of `T` without building one.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let entry = self.lock().get(&TypeId::of::<T>()).cloned()?;
        entry.downcast::<T>().ok()
    }

    /// Stores `instance`, returning the one it replaced.
    pub fn insert<T: Send + Sync + 'static>(&self, instance: T) -> Option<Arc<T>> {
        let previous = self.lock().insert(TypeId::of::<T>(), Arc::new(instance))?;
        previous.downcast::<T>().ok()
    }

    /// Removes and returns the instance of `T`.
    pub fn remove<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let previous = self.lock().remove(&TypeId::of::<T>())?;
        previous.downcast::<T>().ok()
    }

    /// Returns `true` if an instance of `T` is stored.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.lock().contains_key(&TypeId::of::<T>())
    }

    /// Drops every stored instance held by the registry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored instances.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TypeId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("len", &self.len())
            .finish()
    }
}
