//! Quasi-global modules: process-wide resources exposed on purpose for
//! injection, addressed by dotted paths such as `os.environ`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::instance::Instance;

/// One named member of a [`GlobalModule`].
#[derive(Clone)]
pub enum Attribute {
    /// Always the same value.
    Value(Instance),
    /// A nested namespace, walked by the next path segment.
    Module(Arc<GlobalModule>),
    /// Produces a fresh value on every lookup.
    Factory(Arc<dyn Fn() -> Instance + Send + Sync>),
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Value(instance) => f.debug_tuple("Value").field(instance).finish(),
            Attribute::Module(module) => f.debug_tuple("Module").field(&module.name).finish(),
            Attribute::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// A namespace of resources.
///
/// # Examples
/// ```
/// use joinery_container::{GlobalModule, Instance};
///
/// let app = GlobalModule::new("app")
///     .with_value("version", "1.2.0")
///     .with_module(GlobalModule::new("limits").with_value("max_body", 4096usize));
///
/// let max = app.lookup(&["limits", "max_body"]).unwrap();
/// assert_eq!(max.downcast::<usize>().map(|v| *v), Some(4096));
/// assert!(app.lookup(&["limits", "missing"]).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct GlobalModule {
    name: String,
    value: Option<Instance>,
    attributes: HashMap<String, Attribute>,
}

/// Why a path could not be walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    /// The path walked so far, e.g. `os.path`.
    pub walked: String,
    pub missing: String,
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` has no attribute `{}`", self.walked, self.missing)
    }
}

impl GlobalModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets what the bare module name resolves to. Without one, the module
    /// resolves to itself.
    pub fn resolves_to<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.value = Some(Instance::new(value));
        self
    }

    pub fn with_value<T: Send + Sync + 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.with_attribute(name, Attribute::Value(Instance::new(value)))
    }

    pub fn with_factory<T, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.with_attribute(
            name,
            Attribute::Factory(Arc::new(move || Instance::new(factory()))),
        )
    }

    pub fn with_module(self, module: GlobalModule) -> Self {
        let name = module.name.clone();
        self.with_attribute(name, Attribute::Module(Arc::new(module)))
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Walks `segments` below this module.
    pub fn lookup(&self, segments: &[&str]) -> Result<Instance, LookupFailure> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(self.as_instance());
        };

        let failure = || LookupFailure {
            walked: self.name.clone(),
            missing: (*first).to_string(),
        };

        match self.attributes.get(*first).ok_or_else(failure)? {
            Attribute::Module(module) => module.lookup(rest).map_err(|inner| LookupFailure {
                walked: format!("{}.{}", self.name, inner.walked),
                missing: inner.missing,
            }),
            Attribute::Value(value) if rest.is_empty() => Ok(value.clone()),
            Attribute::Factory(factory) if rest.is_empty() => Ok(factory()),
            Attribute::Value(_) | Attribute::Factory(_) => Err(LookupFailure {
                walked: format!("{}.{}", self.name, first),
                missing: rest[0].to_string(),
            }),
        }
    }

    fn as_instance(&self) -> Instance {
        match &self.value {
            Some(value) => value.clone(),
            None => Instance::new(self.clone()),
        }
    }
}
