//! Providers: pluggable factory objects consulted during resolution.
//!
//! A provider offers two capabilities, either or both:
//! - **named** factories, registered under a dependency name (the
//!   `provide_<name>` convention), and
//! - a **generic** builder that recognises whole families of types
//!   structurally (say, every repository type) rather than one by one.
//!
//! # Examples
//! ```rust
//! use joinery_container::prelude::*;
//!
//! struct Pricing;
//!
//! impl Provider for Pricing {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) {
//!         registry.provide("multiplier", Signature::new(), |_| Ok(3i64));
//!         registry.provide(
//!             "price",
//!             Signature::new().param(Param::named("multiplier")),
//!             |args| Ok(args.value::<i64>("multiplier")? * 100),
//!         );
//!     }
//! }
//!
//! let di = Di::builder().provider(Pricing).build();
//! assert_eq!(*di.build_named::<i64>("price").unwrap(), 300);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::container::Di;
use crate::error::Result;
use crate::function::{Arguments, Factory, Function};
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::signature::Signature;

/// A module of related factories.
pub trait Provider: Send + Sync {
    /// Registers named factories. Called once, when the provider is added.
    fn register(&self, _registry: &mut dyn ProviderRegistry) {}

    /// Returns the generic builder, if this provider has one.
    fn generic(&self) -> Option<&dyn GenericBuilder> {
        None
    }

    /// Human-readable name for logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Builds any type it recognises, not just named dependencies.
pub trait GenericBuilder: Send + Sync {
    fn can_build(&self, ty: &TypeKey) -> bool;

    /// Builds `ty` for the parameter `parameter`. `di` resolves anything
    /// the builder itself needs.
    fn build(&self, ty: &TypeKey, parameter: &str, di: &Di) -> Result<Instance>;
}

/// Interface providers use to register named factories.
pub trait ProviderRegistry {
    fn provide_factory(&mut self, name: &str, factory: Factory);
}

impl dyn ProviderRegistry + '_ {
    /// Registers `body` as the factory for `name`. The factory's own
    /// parameters are resolved through the container when it is invoked.
    pub fn provide<R, F>(&mut self, name: &str, signature: Signature, body: F)
    where
        R: Send + Sync + 'static,
        F: Fn(&Arguments) -> Result<R> + Send + Sync + 'static,
    {
        let factory = Function::new(format!("provide_{name}"), signature, body).erase();
        self.provide_factory(name, factory);
    }
}

/// Which resolution steps a provider takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub named: bool,
    pub generic: bool,
}

#[derive(Default)]
struct FactoryTable {
    provider: String,
    factories: HashMap<String, Factory>,
}

impl ProviderRegistry for FactoryTable {
    fn provide_factory(&mut self, name: &str, factory: Factory) {
        if self.factories.insert(name.to_string(), factory).is_some() {
            warn!(provider = %self.provider, name, "Provider registered the same factory twice; keeping the last");
        }
    }
}

struct ProviderEntry {
    provider: Arc<dyn Provider>,
    factories: HashMap<String, Factory>,
    capabilities: Capabilities,
}

/// Providers in registration order. Earlier providers win.
#[derive(Default)]
pub(crate) struct ProviderChain {
    entries: Vec<ProviderEntry>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, provider: Arc<dyn Provider>) {
        let mut table = FactoryTable {
            provider: provider.name().to_string(),
            factories: HashMap::new(),
        };
        provider.register(&mut table);

        let capabilities = Capabilities {
            named: !table.factories.is_empty(),
            generic: provider.generic().is_some(),
        };
        debug!(
            provider = %provider.name(),
            factories = table.factories.len(),
            generic = capabilities.generic,
            "Added provider"
        );

        self.entries.push(ProviderEntry {
            provider,
            factories: table.factories,
            capabilities,
        });
    }

    /// The first factory registered under `name`, with its provider's name.
    pub fn named(&self, name: &str) -> Option<(String, Factory)> {
        self.entries
            .iter()
            .filter(|entry| entry.capabilities.named)
            .find_map(|entry| {
                entry
                    .factories
                    .get(name)
                    .map(|factory| (entry.provider.name().to_string(), factory.clone()))
            })
    }

    /// Providers with a generic builder, in priority order.
    pub fn generic_providers(&self) -> Vec<Arc<dyn Provider>> {
        self.entries
            .iter()
            .filter(|entry| entry.capabilities.generic)
            .map(|entry| Arc::clone(&entry.provider))
            .collect()
    }

    pub fn capabilities(&self) -> Vec<(String, Capabilities)> {
        self.entries
            .iter()
            .map(|entry| (entry.provider.name().to_string(), entry.capabilities))
            .collect()
    }

    pub fn factory_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|entry| entry.factories.keys().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
