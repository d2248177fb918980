//! Build targets: the [`Component`] trait, its type-erased [`Class`]
//! descriptor, and [`Module`]s of classes.
//!
//! # Examples
//! ```rust
//! use joinery_container::prelude::*;
//!
//! struct Greeting {
//!     text: String,
//! }
//!
//! impl Component for Greeting {
//!     fn signature() -> Signature {
//!         Signature::new().param(Param::typed::<String>("text"))
//!     }
//!
//!     fn construct(args: &Arguments) -> Result<Self> {
//!         Ok(Self { text: args.value("text")? })
//!     }
//! }
//!
//! let di = Di::builder().binding("text", String::from("hi")).build();
//! let greeting = di.build_class::<Greeting>().unwrap();
//! assert_eq!(greeting.text, "hi");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::container::Di;
use crate::error::Result;
use crate::function::Arguments;
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::signature::Signature;

/// A type the container can build.
///
/// Construction is two-phase: [`Component::construct`] receives the
/// resolved parameters, then [`Component::activate`] associates the new
/// value with the container that built it, so its
/// [`Inject`](crate::Inject) attributes can resolve on first read.
pub trait Component: Send + Sync + Sized + 'static {
    /// Describes the constructor parameters.
    fn signature() -> Signature;

    /// Builds the value from resolved parameters.
    fn construct(args: &Arguments) -> Result<Self>;

    /// Activates lazily-resolved attributes against `di`.
    fn activate(&self, _di: &Di) {}
}

/// How a replacement class is seen as the type it overrides.
///
/// ```rust
/// use std::sync::Arc;
/// use joinery_container::prelude::*;
///
/// trait Shape: Send + Sync {
///     fn sides(&self) -> u8;
/// }
///
/// struct Square;
///
/// impl Shape for Square {
///     fn sides(&self) -> u8 { 4 }
/// }
///
/// impl Component for Square {
///     fn signature() -> Signature { Signature::new() }
///     fn construct(_: &Arguments) -> Result<Self> { Ok(Square) }
/// }
///
/// impl Implements<dyn Shape> for Square {
///     fn upcast(self: Arc<Self>) -> Arc<dyn Shape> { self }
/// }
///
/// let di = Di::new();
/// di.add_class_override::<dyn Shape, Square>();
/// let shape = di.build_type::<dyn Shape>().unwrap();
/// assert_eq!(shape.sides(), 4);
/// ```
pub trait Implements<B: ?Sized>: Component {
    fn upcast(self: Arc<Self>) -> Arc<B>;
}

/// Type-erased descriptor of a [`Component`].
#[derive(Clone)]
pub struct Class {
    key: TypeKey,
    signature: fn() -> Signature,
    construct: fn(&Arguments) -> Result<Instance>,
    activate: fn(&Instance, &Di),
}

impl Class {
    pub fn of<T: Component>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            signature: T::signature,
            construct: construct_erased::<T>,
            activate: activate_erased::<T>,
        }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Short type name, used in error messages and resolution chains.
    pub fn name(&self) -> String {
        self.key.short_name()
    }

    /// The snake_case name an untyped parameter can find this class by.
    pub fn lookup_name(&self) -> String {
        self.key.lookup_name()
    }

    pub fn signature(&self) -> Signature {
        (self.signature)()
    }

    pub(crate) fn construct(&self, args: &Arguments) -> Result<Instance> {
        (self.construct)(args)
    }

    pub(crate) fn activate(&self, instance: &Instance, di: &Di) {
        (self.activate)(instance, di)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class").field("key", &self.key).finish()
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

fn construct_erased<T: Component>(args: &Arguments) -> Result<Instance> {
    T::construct(args).map(Instance::new)
}

fn activate_erased<T: Component>(instance: &Instance, di: &Di) {
    if let Some(value) = instance.downcast::<T>() {
        value.activate(di);
    }
}

/// A named namespace of classes, registered in bulk.
#[derive(Clone, Debug, Default)]
pub struct Module {
    name: String,
    classes: Vec<Class>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    pub fn class<T: Component>(mut self) -> Self {
        self.classes.push(Class::of::<T>());
        self
    }

    pub fn with_class(mut self, class: Class) -> Self {
        self.classes.push(class);
        self
    }

    /// Collects every class registered for `name` with
    /// [`register_class!`](crate::register_class).
    pub fn discover(name: &str) -> Self {
        let classes = inventory::iter::<ModuleEntry>
            .into_iter()
            .filter(|entry| entry.module == name)
            .map(|entry| (entry.class)())
            .collect();
        Self {
            name: name.to_string(),
            classes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }
}

/// A compile-time registration of a class under a module name.
pub struct ModuleEntry {
    module: &'static str,
    class: fn() -> Class,
}

impl ModuleEntry {
    pub const fn new(module: &'static str, class: fn() -> Class) -> Self {
        Self { module, class }
    }
}

inventory::collect!(ModuleEntry);

/// Registers a [`Component`] under a module name, for [`Module::discover`].
///
/// ```rust,ignore
/// joinery_container::register_class!("shapes", Circle);
/// ```
#[macro_export]
macro_rules! register_class {
    ($module:literal, $ty:ty) => {
        $crate::inventory::submit! {
            $crate::class::ModuleEntry::new($module, $crate::class::Class::of::<$ty>)
        }
    };
}
