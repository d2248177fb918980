//! The binding store: named bindings, class overrides, known classes and
//! global modules.
//!
//! Populated during wiring; read on every resolution. The container keeps
//! it behind a single lock and never holds that lock while user code runs.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::class::{Class, Implements};
use crate::globals::GlobalModule;
use crate::instance::Instance;
use crate::key::TypeKey;

/// A registered substitution of one type for another at build time.
#[derive(Clone)]
pub(crate) struct Override {
    pub replacement: Class,
    /// Views a built replacement as the overridden type.
    pub adapt: fn(&Instance) -> Option<Instance>,
}

impl Override {
    pub fn new<B, D>() -> Self
    where
        B: ?Sized + Send + Sync + 'static,
        D: Implements<B>,
    {
        Self {
            replacement: Class::of::<D>(),
            adapt: adapt_instance::<B, D>,
        }
    }
}

fn adapt_instance<B, D>(instance: &Instance) -> Option<Instance>
where
    B: ?Sized + Send + Sync + 'static,
    D: Implements<B>,
{
    instance
        .downcast::<D>()
        .map(|built| Instance::from_arc(D::upcast(built)))
}

#[derive(Default)]
pub(crate) struct Registry {
    bindings: HashMap<String, Instance>,
    overrides: HashMap<TypeKey, Override>,
    classes: HashMap<TypeKey, Class>,
    class_names: HashMap<String, TypeKey>,
    globals: HashMap<String, Arc<GlobalModule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins.
    pub fn bind(&mut self, name: String, value: Instance) {
        debug!(name = %name, value = value.type_name(), "Registered binding");
        self.bindings.insert(name, value);
    }

    pub fn binding(&self, name: &str) -> Option<Instance> {
        self.bindings.get(name).cloned()
    }

    pub fn add_override(&mut self, base: TypeKey, over: Override) {
        debug!(base = %base, replacement = %over.replacement.name(), "Registered class override");
        self.overrides.insert(base, over);
    }

    pub fn override_for(&self, key: &TypeKey) -> Option<Override> {
        let found = self.overrides.get(key).cloned();
        if let Some(ref over) = found {
            trace!(from = %key, to = %over.replacement.name(), "Following override");
        }
        found
    }

    pub fn add_class(&mut self, class: Class) {
        let lookup = class.lookup_name();
        debug!(class = %class.name(), lookup = %lookup, "Registered class");
        self.class_names.insert(lookup, *class.key());
        self.classes.insert(*class.key(), class);
    }

    pub fn class(&self, key: &TypeKey) -> Option<Class> {
        self.classes.get(key).cloned()
    }

    pub fn class_by_name(&self, name: &str) -> Option<Class> {
        self.class_names
            .get(name)
            .and_then(|key| self.classes.get(key))
            .cloned()
    }

    /// Replaces any module with the same root name.
    pub fn add_global(&mut self, module: GlobalModule) {
        debug!(module = module.name(), "Registered global module");
        self.globals.insert(module.name().to_string(), Arc::new(module));
    }

    pub fn global(&self, root: &str) -> Option<Arc<GlobalModule>> {
        self.globals.get(root).cloned()
    }

    /// Every name a parameter could resolve by, for "did you mean" hints.
    pub fn known_names(&self) -> Vec<String> {
        self.bindings
            .keys()
            .chain(self.class_names.keys())
            .chain(self.globals.keys())
            .cloned()
            .collect()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}
