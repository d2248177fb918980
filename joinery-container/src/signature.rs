//! Declarative parameter descriptors and the inspector that validates them.
//!
//! Rust has no runtime reflection over constructor parameters, so every
//! build target describes its own parameters with a [`Signature`]. The
//! `#[derive(Component)]` macro writes one from a struct's fields.

use std::fmt;

use crate::class::Class;
use crate::error::{CatchAll, ConfigurationError, DiError, Result};
use crate::instance::Instance;
use crate::key::TypeKey;

/// What a parameter falls back to when nothing resolves it.
#[derive(Clone)]
pub enum DefaultValue {
    /// Passed through as is.
    Value(Instance),
    /// Built through the container, like any other class.
    Class(Class),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(instance) => f.debug_tuple("Value").field(instance).finish(),
            DefaultValue::Class(class) => f.debug_tuple("Class").field(&class.name()).finish(),
        }
    }
}

/// One declared parameter of a build target.
///
/// # Examples
/// ```
/// use joinery_container::{Param, TypeKey};
///
/// struct Database;
///
/// let by_name = Param::named("port");
/// assert!(by_name.ty().is_none());
///
/// let typed = Param::typed::<Database>("database").default(0u8);
/// assert_eq!(typed.ty(), Some(&TypeKey::of::<Database>()));
/// assert!(typed.has_default());
/// ```
#[derive(Clone, Debug)]
pub struct Param {
    name: String,
    ty: Option<TypeKey>,
    default: Option<DefaultValue>,
}

impl Param {
    /// A parameter resolved by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            default: None,
        }
    }

    /// A parameter resolved by name first, then by its declared type `T`.
    pub fn typed<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: Some(TypeKey::of::<T>()),
            default: None,
        }
    }

    /// Falls back to `value` when nothing resolves the parameter.
    pub fn default<V: Send + Sync + 'static>(self, value: V) -> Self {
        self.default_instance(Instance::new(value))
    }

    pub fn default_instance(mut self, value: Instance) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    /// Falls back to `None::<T>`; read it with [`Arguments::optional`](crate::Arguments::optional).
    pub fn default_none<T: Send + Sync + 'static>(self) -> Self {
        self.default(Option::<T>::None)
    }

    /// Falls back to a freshly built instance of `class`.
    pub fn default_class(mut self, class: Class) -> Self {
        self.default = Some(DefaultValue::Class(class));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Option<&TypeKey> {
        self.ty.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
}

/// The ordered parameter list of a constructor or function.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    params: Vec<Param>,
    variadic: bool,
    keywords: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Declares an open-ended positional parameter list.
    ///
    /// The container refuses to build such targets; this exists so wrappers
    /// around foreign callables can describe them faithfully.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Declares an open-ended keyword parameter map. Refused like
    /// [`Signature::variadic`].
    pub fn keywords(mut self) -> Self {
        self.keywords = true;
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Reports the parameters of `target`, in declaration order.
///
/// # Errors
/// [`DiError::Configuration`] if the signature declares a catch-all
/// positional or keyword parameter. Positional is reported first.
pub fn inspect<'a>(target: &str, signature: &'a Signature) -> Result<&'a [Param]> {
    let catch_all = if signature.variadic {
        Some(CatchAll::Positional)
    } else if signature.keywords {
        Some(CatchAll::Keyword)
    } else {
        None
    };

    match catch_all {
        Some(catch_all) => Err(DiError::Configuration(ConfigurationError {
            target: target.to_string(),
            catch_all,
        })),
        None => Ok(signature.params()),
    }
}
