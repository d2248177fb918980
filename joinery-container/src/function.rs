//! Callable resolution targets and the arguments they receive.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, MissingDependencyError, Result};
use crate::instance::Instance;
use crate::signature::Signature;

type Body<R> = Arc<dyn Fn(&Arguments) -> Result<R> + Send + Sync>;

/// A function whose parameters the container satisfies.
///
/// # Examples
/// ```rust
/// use joinery_container::prelude::*;
///
/// let describe = Function::new(
///     "describe",
///     Signature::new().param(Param::named("animal")),
///     |args| Ok(format!("Jane owns a {}", args.value::<String>("animal")?)),
/// );
///
/// let di = Di::builder().binding("animal", String::from("dog")).build();
/// assert_eq!(di.call_function(&describe).unwrap(), "Jane owns a dog");
/// ```
pub struct Function<R> {
    name: String,
    signature: Signature,
    body: Body<R>,
}

/// A type-erased function, as registered by providers.
pub type Factory = Function<Instance>;

impl<R> Function<R> {
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn invoke(&self, args: &Arguments) -> Result<R> {
        (self.body)(args)
    }
}

impl<R: Send + Sync + 'static> Function<R> {
    /// Erases the return type, so the function can serve as a [`Factory`].
    pub fn erase(self) -> Factory {
        let body = self.body;
        Function {
            name: self.name,
            signature: self.signature,
            body: Arc::new(move |args: &Arguments| body(args).map(Instance::new)),
        }
    }
}

impl<R> Clone for Function<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            signature: self.signature.clone(),
            body: Arc::clone(&self.body),
        }
    }
}

impl<R> fmt::Debug for Function<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Resolved parameter values, as handed to a constructor or function body.
#[derive(Debug)]
pub struct Arguments {
    target: String,
    values: HashMap<String, Instance>,
}

impl Arguments {
    pub(crate) fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            values: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: Instance) {
        self.values.insert(name.into(), value);
    }

    /// Name of the class or function being built.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the raw resolved value.
    ///
    /// # Errors
    /// [`DiError::MissingDependency`] if `name` was not declared in the
    /// signature.
    pub fn instance(&self, name: &str) -> Result<&Instance> {
        self.values.get(name).ok_or_else(|| {
            DiError::MissingDependency(
                MissingDependencyError::new(name, Some(self.target.clone()))
                    .with_detail("the parameter is read but not declared in the signature"),
            )
        })
    }

    /// Returns the shared value of `name`. `T` may be a trait object.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let instance = self.instance(name)?;
        instance
            .downcast::<T>()
            .ok_or_else(|| self.mismatch::<T>(name, instance))
    }

    /// Returns a clone of the value of `name`.
    pub fn value<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T> {
        self.get::<T>(name).map(|value| T::clone(&value))
    }

    /// Reads a parameter that was either resolved to a `T` or fell back to
    /// an `Option<T>` default.
    pub fn optional<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<Option<T>> {
        let instance = self.instance(name)?;
        if let Some(value) = instance.downcast::<T>() {
            return Ok(Some(T::clone(&value)));
        }
        instance
            .downcast::<Option<T>>()
            .map(|value| (*value).clone())
            .ok_or_else(|| self.mismatch::<T>(name, instance))
    }

    /// Like [`Arguments::optional`], for shared values: accepts a `T` or an
    /// `Option<Arc<T>>` default.
    pub fn optional_arc<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<T>>> {
        let instance = self.instance(name)?;
        if let Some(value) = instance.downcast::<T>() {
            return Ok(Some(value));
        }
        instance
            .downcast::<Option<Arc<T>>>()
            .map(|value| (*value).clone())
            .ok_or_else(|| self.mismatch::<T>(name, instance))
    }

    fn mismatch<T: ?Sized>(&self, name: &str, found: &Instance) -> DiError {
        DiError::TypeMismatch {
            target: self.target.clone(),
            parameter: name.to_string(),
            expected: type_name::<T>(),
            found: found.type_name(),
        }
    }
}
