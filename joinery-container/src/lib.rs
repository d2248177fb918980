//! Core container implementation for Joinery.
//!
//! Build targets declare their parameters with a [`Signature`]; the
//! [`Di`] container satisfies each parameter from bindings, overrides,
//! providers, known classes and global modules, recursively.

pub mod class;
mod clock;
pub mod container;
pub mod environment;
pub mod error;
pub mod function;
pub mod globals;
mod guard;
pub mod inject;
pub mod instance;
pub mod key;
pub mod provider;
mod registry;
pub mod signature;
pub mod stdlib;

pub use class::{Class, Component, Implements, Module, ModuleEntry};
pub use container::{Di, DiBuilder, Target, WeakDi, prelude};
pub use environment::{EnvValue, Environment, EnvironmentError};
pub use error::{
    CatchAll, ChainLink, CircularDependencyError, ConfigurationError, DiError,
    MissingDependencyError, NotActivatedError, Result,
};
pub use function::{Arguments, Factory, Function};
pub use globals::{Attribute, GlobalModule, LookupFailure};
pub use inject::{Inject, Source};
pub use instance::Instance;
pub use key::TypeKey;
pub use provider::{Capabilities, GenericBuilder, Provider, ProviderRegistry};
pub use signature::{DefaultValue, Param, Signature, inspect};
pub use stdlib::{Environ, Socket, Subprocess};

#[doc(hidden)]
pub use inventory;
