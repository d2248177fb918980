//! Lazily-resolved attributes.
//!
//! An [`Inject`] field declares a dependency that is not passed to the
//! constructor. After construction the container *activates* the owner,
//! which records the container on each attribute; reads then resolve
//! through that container.
//!
//! # Examples
//! ```rust
//! use joinery_container::prelude::*;
//!
//! struct Report {
//!     title: Inject<String>,
//! }
//!
//! impl Component for Report {
//!     fn signature() -> Signature {
//!         Signature::new()
//!     }
//!
//!     fn construct(_: &Arguments) -> Result<Self> {
//!         Ok(Self { title: Inject::by_name("report_title") })
//!     }
//!
//!     fn activate(&self, di: &Di) {
//!         self.title.activate(di);
//!     }
//! }
//!
//! let di = Di::builder().binding("report_title", String::from("Q3")).build();
//! let report = di.build_class::<Report>().unwrap();
//! assert_eq!(*report.title.get().unwrap(), "Q3");
//! ```

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use parking_lot::RwLock;
use tracing::trace;

use crate::class::{Class, Component};
use crate::container::{Di, WeakDi};
use crate::environment::Environment;
use crate::error::{DiError, NotActivatedError, Result};
use crate::instance::Instance;
use crate::stdlib::{Environ, Socket, Subprocess};

/// Where an [`Inject`] attribute gets its value from.
#[derive(Clone, Debug)]
pub enum Source {
    /// Resolved like an untyped parameter of that name.
    Name(String),
    /// A fresh build of the class on every read.
    Class(Class),
    /// A global-module path such as `os.environ`.
    Global { path: String, cache: bool },
    /// The owning container itself.
    Container,
    Now,
    Utcnow,
    /// The container's shared [`Environment`].
    Environment,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Name(name) => write!(f, "by name `{name}`"),
            Source::Class(class) => write!(f, "by class {}", class.name()),
            Source::Global { path, .. } => write!(f, "global `{path}`"),
            Source::Container => f.write_str("container"),
            Source::Now => f.write_str("now"),
            Source::Utcnow => f.write_str("utcnow"),
            Source::Environment => f.write_str("environment"),
        }
    }
}

/// A dependency resolved when read rather than at construction.
///
/// The attribute holds its container weakly, so a component cached inside
/// a container does not keep that container alive.
pub struct Inject<T: ?Sized> {
    source: Source,
    memoize: bool,
    state: RwLock<Binding>,
    marker: PhantomData<fn() -> Arc<T>>,
}

#[derive(Default)]
struct Binding {
    owner: Option<WeakDi>,
    memo: Option<Instance>,
}

impl<T: ?Sized + Send + Sync + 'static> Inject<T> {
    pub fn from_source(source: Source) -> Self {
        Self {
            source,
            memoize: false,
            state: RwLock::new(Binding::default()),
            marker: PhantomData,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::from_source(Source::Name(name.into()))
    }

    pub fn by_class_of(class: Class) -> Self {
        Self::from_source(Source::Class(class))
    }

    /// A global-module path, cached by the container.
    pub fn by_global(path: impl Into<String>) -> Self {
        Self::from_source(Source::Global {
            path: path.into(),
            cache: true,
        })
    }

    /// Keeps the first resolved value until the attribute is rebound.
    pub fn cached(mut self) -> Self {
        self.memoize = true;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Associates this attribute with `di`. Re-activating with the same
    /// container does nothing; a different container takes over future
    /// reads and drops any memoized value.
    pub fn activate(&self, di: &Di) {
        let mut state = self.state.write();
        if state.owner.as_ref().is_some_and(|current| current.points_to(di)) {
            return;
        }
        trace!(source = %self.source, rebind = state.owner.is_some(), "Activating injected attribute");
        state.owner = Some(di.downgrade());
        state.memo = None;
    }

    pub fn is_activated(&self) -> bool {
        self.state.read().owner.is_some()
    }

    /// Resolves the attribute.
    ///
    /// # Errors
    /// [`DiError::NotActivated`] before activation,
    /// [`DiError::ContainerDropped`] once the container is gone; otherwise
    /// whatever resolving the source fails with.
    pub fn get(&self) -> Result<Arc<T>> {
        let (owner, memo) = {
            let state = self.state.read();
            (state.owner.clone(), state.memo.clone())
        };

        let instance = match memo {
            Some(instance) => instance,
            None => {
                let di = self.upgrade(owner)?;
                let resolved = di.resolve_source(&self.source)?;
                if self.memoize {
                    self.remember(&di, resolved)
                } else {
                    resolved
                }
            }
        };

        instance.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
            target: "injected attribute".to_string(),
            parameter: self.source.to_string(),
            expected: type_name::<T>(),
            found: instance.type_name(),
        })
    }

    /// Stores `resolved` unless a racing read already did, or the attribute
    /// was rebound to another container meanwhile.
    fn remember(&self, di: &Di, resolved: Instance) -> Instance {
        let mut state = self.state.write();
        if !state.owner.as_ref().is_some_and(|owner| owner.points_to(di)) {
            return resolved;
        }
        state.memo.get_or_insert(resolved).clone()
    }

    fn upgrade(&self, owner: Option<WeakDi>) -> Result<Di> {
        let owner = owner.ok_or_else(|| {
            DiError::NotActivated(NotActivatedError {
                attribute: self.source.to_string(),
                type_name: type_name::<T>(),
            })
        })?;
        owner.upgrade().ok_or_else(|| DiError::ContainerDropped {
            attribute: self.source.to_string(),
        })
    }
}

impl<T: Component> Inject<T> {
    /// A fresh `T` built on every read.
    pub fn by_class() -> Self {
        Self::by_class_of(Class::of::<T>())
    }
}

impl Inject<Di> {
    pub fn di() -> Self {
        Self::from_source(Source::Container)
    }
}

impl Inject<DateTime<Local>> {
    pub fn now() -> Self {
        Self::from_source(Source::Now)
    }
}

impl Inject<DateTime<Utc>> {
    pub fn utcnow() -> Self {
        Self::from_source(Source::Utcnow)
    }
}

impl Inject<Environment> {
    /// The container's environment, kept after the first read.
    pub fn environment() -> Self {
        Self::from_source(Source::Environment).cached()
    }
}

impl Inject<Environ> {
    pub fn environ() -> Self {
        Self::by_global("os.environ")
    }
}

impl Inject<Socket> {
    pub fn socket() -> Self {
        Self::by_global("socket")
    }
}

impl Inject<Subprocess> {
    pub fn subprocess() -> Self {
        Self::by_global("subprocess")
    }
}

impl<T: ?Sized> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("source", &self.source)
            .field("memoize", &self.memoize)
            .field("activated", &self.state.read().owner.is_some())
            .finish()
    }
}
