//! Type-erased values handed around by the container.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// A built value, a binding, or a default: anything the container can hand
/// to a resolution target.
///
/// An `Instance` always wraps an `Arc<T>`, so `T` may be unsized
/// (`dyn Trait`). Cloning an instance is cheap and keeps identity:
/// [`Instance::ptr_eq`] is what "the same instance" means for cached
/// builds.
///
/// # Examples
/// ```
/// use joinery_container::Instance;
///
/// let port = Instance::new(8080u16);
/// assert_eq!(port.downcast::<u16>().map(|p| *p), Some(8080));
/// assert!(port.downcast::<u32>().is_none());
/// ```
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    /// Wraps an owned value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value, which may be a trait object.
    pub fn from_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the wrapped value if it was stored as `T`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    pub fn is<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.value.is::<Arc<T>>()
    }

    /// Name of the type the value was stored as.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both handles point at the same stored value.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn downcast_sized_value() {
        let instance = Instance::new(String::from("dog"));
        assert_eq!(instance.downcast::<String>().as_deref().map(String::as_str), Some("dog"));
        assert!(instance.is::<String>());
    }

    #[test]
    fn downcast_trait_object() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::from_arc(greeter);
        let back = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(back.greet(), "hello");
        assert!(instance.downcast::<English>().is_none());
    }

    #[test]
    fn clones_share_identity() {
        let a = Instance::new(5i64);
        let b = a.clone();
        let c = Instance::new(5i64);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(Arc::ptr_eq(&a.downcast::<i64>().unwrap(), &b.downcast::<i64>().unwrap()));
    }

    #[test]
    fn debug_names_the_type() {
        let debug = format!("{:?}", Instance::new(1u8));
        assert!(debug.contains("u8"));
    }
}
