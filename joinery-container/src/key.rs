//! Type identification keys.
//!
//! [`TypeKey`] identifies a declared parameter type, a known class or the
//! abstract side of a class override.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use joinery_support::naming;

/// Identifies a Rust type within the container.
///
/// Two keys are equal when their [`TypeId`]s are equal; the type name is
/// carried only for lookups by name and for error messages.
///
/// # Examples
/// ```
/// use joinery_container::key::TypeKey;
///
/// struct OrderProcessor;
///
/// let key = TypeKey::of::<OrderProcessor>();
/// assert_eq!(key.short_name(), "OrderProcessor");
/// assert_eq!(key.lookup_name(), "order_processor");
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates a key for type `T`. Unsized types such as `dyn Trait` work.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without module paths.
    pub fn short_name(&self) -> String {
        naming::shorten_type_name(self.type_name)
    }

    /// Returns the snake_case name this type can be looked up by.
    pub fn lookup_name(&self) -> String {
        naming::lookup_name(self.type_name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}
