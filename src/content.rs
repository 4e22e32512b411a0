use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

/// Type-erased value produced by an extractor.
///
/// Access is always checked: asking for the wrong type yields `None`.
#[derive(Clone)]
pub struct ExtractedContent {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ExtractedContent {
    /// Wraps `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: any::type_name::<T>(),
        }
    }

    /// Borrows the value as `T` if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns a shared handle to the value as `T` if that is its type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Returns `true` if the stored value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Name of the stored type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ExtractedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtractedContent")
            .field(&self.type_name)
            .finish()
    }
}
