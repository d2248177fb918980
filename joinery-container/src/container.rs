//! # The Container
//!
//! [`Di`] builds object graphs from declared parameters. Each parameter is
//! resolved independently, in this order:
//!
//! ```text
//! caller override ─> binding ─> class override ─> provider factory / built-in
//!     ─> generic provider ─> known class ─> global module ─> default ─> error
//! ```
//!
//! A step that matches but fails propagates its error; only a parameter no
//! step matches falls back to its default.
//!
//! # Examples
//! ```rust
//! use joinery_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! impl Component for Database {
//!     fn signature() -> Signature {
//!         Signature::new().param(Param::typed::<String>("database_url"))
//!     }
//!     fn construct(args: &Arguments) -> Result<Self> {
//!         Ok(Database { url: args.value("database_url")? })
//!     }
//! }
//!
//! struct Orders {
//!     db: Arc<Database>,
//! }
//!
//! impl Component for Orders {
//!     fn signature() -> Signature {
//!         Signature::new().param(Param::typed::<Database>("db"))
//!     }
//!     fn construct(args: &Arguments) -> Result<Self> {
//!         Ok(Orders { db: args.get("db")? })
//!     }
//! }
//!
//! let di = Di::builder()
//!     .binding("database_url", String::from("postgres://localhost/shop"))
//!     .class::<Database>()
//!     .build();
//!
//! let orders = di.build_class::<Orders>().unwrap();
//! assert_eq!(orders.db.url, "postgres://localhost/shop");
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Local, Utc};
use dashmap::DashMap;
use joinery_support::rendering::suggest_similar;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument, trace};

use crate::class::{Class, Component, Implements, Module};
use crate::clock::Clock;
use crate::environment::Environment;
use crate::error::{DiError, MissingDependencyError, Result};
use crate::function::{Arguments, Function};
use crate::globals::GlobalModule;
use crate::guard::{Building, ResolutionGuard};
use crate::inject::Source;
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::provider::{Capabilities, Provider, ProviderChain};
use crate::registry::{Override, Registry};
use crate::signature::{DefaultValue, Param, inspect};
use crate::stdlib;

/// Names the container answers itself when no provider claims them.
const BUILTIN_NAMES: [&str; 4] = ["di", "now", "utcnow", "environment"];

const MAX_SUGGESTIONS: usize = 3;

/// What to build: a name, a type, or a class.
#[derive(Debug, Clone)]
pub enum Target {
    /// Resolved like an untyped parameter; dotted names walk global modules.
    Name(String),
    /// Follows class overrides, then known classes.
    Type(TypeKey),
    Class(Class),
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

impl From<TypeKey> for Target {
    fn from(key: TypeKey) -> Self {
        Target::Type(key)
    }
}

impl From<Class> for Target {
    fn from(class: Class) -> Self {
        Target::Class(class)
    }
}

/// Builds by name and builds by type never share an entry, even when a
/// name equals a class's lookup name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Name(String),
    Type(TypeKey),
}

struct Inner {
    registry: RwLock<Registry>,
    providers: RwLock<ProviderChain>,
    cache: DashMap<CacheKey, Instance>,
    clock: RwLock<Clock>,
}

// ============================================================
// DiBuilder
// ============================================================

/// Wires a [`Di`] up front.
///
/// Everything here is also available on [`Di`] itself; the builder just
/// reads better when the wiring is known in one place.
///
/// # Examples
/// ```rust,ignore
/// let di = Di::builder()
///     .binding("port", 8080u16)
///     .module(&Module::discover("handlers"))
///     .provider(StoragePlugin::default())
///     .class_override::<dyn Mailer, SmtpMailer>()
///     .build();
/// ```
pub struct DiBuilder {
    di: Di,
}

impl DiBuilder {
    fn new() -> Self {
        Self { di: Di::new() }
    }

    pub fn binding<T: Send + Sync + 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.di.add_binding(name, value);
        self
    }

    pub fn binding_instance(self, name: impl Into<String>, value: Instance) -> Self {
        self.di.add_binding_instance(name, value);
        self
    }

    pub fn class<T: Component>(self) -> Self {
        self.di.add_class::<T>();
        self
    }

    pub fn classes(self, classes: impl IntoIterator<Item = Class>) -> Self {
        self.di.add_classes(classes);
        self
    }

    pub fn module(self, module: &Module) -> Self {
        self.di.add_module(module);
        self
    }

    pub fn provider(self, provider: impl Provider + 'static) -> Self {
        self.di.add_provider(provider);
        self
    }

    pub fn class_override<B, D>(self) -> Self
    where
        B: ?Sized + Send + Sync + 'static,
        D: Implements<B>,
    {
        self.di.add_class_override::<B, D>();
        self
    }

    pub fn global_module(self, module: GlobalModule) -> Self {
        self.di.add_global_module(module);
        self
    }

    pub fn now(self, now: DateTime<Local>) -> Self {
        self.di.set_now(now);
        self
    }

    pub fn utcnow(self, utcnow: DateTime<Utc>) -> Self {
        self.di.set_utcnow(utcnow);
        self
    }

    pub fn build(self) -> Di {
        let (bindings, classes) = {
            let registry = self.di.read_registry();
            (registry.binding_count(), registry.class_count())
        };
        info!(
            bindings,
            classes,
            providers = self.di.inner.providers.read().len(),
            "Container wired"
        );
        self.di
    }
}

// ============================================================
// Di
// ============================================================

/// The dependency-resolution container.
///
/// Cheap to clone; clones share all state. Registration is meant for the
/// wiring phase, but every method takes `&self` and is safe to call from
/// any thread. No lock is held while constructors or factories run.
#[derive(Clone)]
pub struct Di {
    inner: Arc<Inner>,
}

impl Di {
    /// An empty container with the built-in global modules.
    pub fn new() -> Self {
        let mut registry = Registry::new();
        for module in stdlib::builtin_modules() {
            registry.add_global(module);
        }
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(registry),
                providers: RwLock::new(ProviderChain::new()),
                cache: DashMap::new(),
                clock: RwLock::new(Clock::default()),
            }),
        }
    }

    pub fn builder() -> DiBuilder {
        DiBuilder::new()
    }

    /// Returns `true` if both handles share the same container.
    pub fn ptr_eq(&self, other: &Di) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that does not keep the container alive.
    pub fn downgrade(&self) -> WeakDi {
        WeakDi {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ── Registration ──

    /// Binds `name` to `value`. Re-binding replaces the previous value.
    pub fn add_binding<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) {
        self.add_binding_instance(name, Instance::new(value));
    }

    pub fn add_binding_instance(&self, name: impl Into<String>, value: Instance) {
        self.inner.registry.write().bind(name.into(), value);
    }

    pub fn add_class<T: Component>(&self) {
        self.inner.registry.write().add_class(Class::of::<T>());
    }

    pub fn add_classes(&self, classes: impl IntoIterator<Item = Class>) {
        let mut registry = self.inner.registry.write();
        for class in classes {
            registry.add_class(class);
        }
    }

    /// Registers every class of `module`.
    pub fn add_module(&self, module: &Module) {
        debug!(module = module.name(), classes = module.classes().len(), "Registering module");
        self.add_classes(module.classes().iter().cloned());
    }

    pub fn add_modules<'a>(&self, modules: impl IntoIterator<Item = &'a Module>) {
        for module in modules {
            self.add_module(module);
        }
    }

    /// Appends `provider` to the chain. Earlier providers win name clashes.
    pub fn add_provider(&self, provider: impl Provider + 'static) {
        self.inner.providers.write().push(Arc::new(provider));
    }

    /// Builds `D` wherever `B` is requested by type.
    pub fn add_class_override<B, D>(&self)
    where
        B: ?Sized + Send + Sync + 'static,
        D: Implements<B>,
    {
        self.inner
            .registry
            .write()
            .add_override(TypeKey::of::<B>(), Override::new::<B, D>());
    }

    /// Registers `module`, replacing any module with the same root name.
    pub fn add_global_module(&self, module: GlobalModule) {
        self.inner.registry.write().add_global(module);
    }

    // ── Clock ──

    pub fn set_now(&self, now: DateTime<Local>) {
        debug!(%now, "Mocking now");
        self.inner.clock.write().set_now(now);
    }

    pub fn set_utcnow(&self, utcnow: DateTime<Utc>) {
        debug!(%utcnow, "Mocking utcnow");
        self.inner.clock.write().set_utcnow(utcnow);
    }

    pub fn reset_now(&self) {
        self.inner.clock.write().reset_now();
    }

    pub fn reset_utcnow(&self) {
        self.inner.clock.write().reset_utcnow();
    }

    /// The mocked local time if set, the wall clock otherwise.
    pub fn now(&self) -> DateTime<Local> {
        self.inner.clock.read().now()
    }

    pub fn utcnow(&self) -> DateTime<Utc> {
        self.inner.clock.read().utcnow()
    }

    // ── Introspection ──

    /// Which resolution steps each provider takes part in, in priority order.
    pub fn provider_capabilities(&self) -> Vec<(String, Capabilities)> {
        self.inner.providers.read().capabilities()
    }

    /// Number of cached builds.
    pub fn cached_count(&self) -> usize {
        self.inner.cache.len()
    }

    // ── Building ──

    /// Builds `target`, reusing the cached instance when `cache` is set.
    ///
    /// # Errors
    /// [`DiError::MissingDependency`] when nothing satisfies the target or
    /// one of its transitive parameters; any other [`DiError`] raised
    /// while constructing the graph.
    pub fn build(&self, target: impl Into<Target>, cache: bool) -> Result<Instance> {
        self.build_target(target.into(), cache)
    }

    #[instrument(skip(self))]
    fn build_target(&self, target: Target, cache: bool) -> Result<Instance> {
        match target {
            Target::Name(name) => self.build_from_name(&name, cache),
            Target::Type(key) => self.build_type_key(&key, cache),
            Target::Class(class) => self.build_class_instance(&class, cache),
        }
    }

    /// Resolves `name` as an untyped dependency, or walks a dotted
    /// global-module path.
    pub fn build_from_name(&self, name: &str, cache: bool) -> Result<Instance> {
        let key = CacheKey::Name(name.to_string());
        if cache && let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let param = Param::named(name);
        let instance = self.resolve_param(&param, None)?;
        // The container never caches a handle to itself.
        let cache = cache && !instance.is::<Di>();
        Ok(self.store(key, instance, cache))
    }

    /// [`build_from_name`](Di::build_from_name), read as `T`.
    pub fn build_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let instance = self.build_from_name(name, false)?;
        downcast_built(name, &instance)
    }

    /// Builds a fresh `T`, or its override.
    pub fn build_class<T: Component>(&self) -> Result<Arc<T>> {
        let class = Class::of::<T>();
        let instance = self.build_class_instance(&class, false)?;
        downcast_built(&class.name(), &instance)
    }

    /// Builds `T` once per container.
    pub fn build_class_cached<T: Component>(&self) -> Result<Arc<T>> {
        let class = Class::of::<T>();
        let instance = self.build_class_instance(&class, true)?;
        downcast_built(&class.name(), &instance)
    }

    /// Builds whatever is registered for the type `B`, following overrides.
    /// `B` may be a trait object.
    pub fn build_type<B: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<B>> {
        let key = TypeKey::of::<B>();
        let instance = self.build_type_key(&key, false)?;
        downcast_built(&key.short_name(), &instance)
    }

    /// Walks a dotted path such as `os.environ` through the global modules.
    ///
    /// # Errors
    /// [`DiError::MissingDependency`] if the root module is not registered
    /// or a segment does not exist.
    #[instrument(skip(self))]
    pub fn build_standard_lib(&self, path: &str, cache: bool) -> Result<Instance> {
        let key = CacheKey::Name(path.to_string());
        if cache && let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        let Some(module) = self.read_registry().global(root) else {
            return Err(DiError::MissingDependency(
                MissingDependencyError::new(path, None)
                    .with_detail(format!("no global module named `{root}`")),
            ));
        };

        let instance = module.lookup(&rest).map_err(|failure| {
            DiError::MissingDependency(
                MissingDependencyError::new(path, None).with_detail(failure.to_string()),
            )
        })?;
        trace!(path, value = instance.type_name(), "Resolved global");
        Ok(self.store(key, instance, cache))
    }

    /// Calls `function` with every parameter resolved.
    pub fn call_function<R>(&self, function: &Function<R>) -> Result<R> {
        self.call_function_with(function, std::iter::empty::<(String, Instance)>())
    }

    /// Calls `function`, taking the given values in place of resolution for
    /// the parameters they name.
    #[instrument(skip_all, fields(function = function.name()))]
    pub fn call_function_with<R, S>(
        &self,
        function: &Function<R>,
        overrides: impl IntoIterator<Item = (S, Instance)>,
    ) -> Result<R>
    where
        S: Into<String>,
    {
        let overrides: HashMap<String, Instance> = overrides
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        self.invoke(function, &overrides)
    }

    /// Resolves an [`Inject`](crate::Inject) attribute's source.
    pub(crate) fn resolve_source(&self, source: &Source) -> Result<Instance> {
        match source {
            Source::Name(name) => self.build_from_name(name, false),
            Source::Class(class) => self.build_class_instance(class, false),
            Source::Global { path, cache } => self.build_standard_lib(path, *cache),
            Source::Container => Ok(Instance::new(self.clone())),
            Source::Now => Ok(Instance::new(self.now())),
            Source::Utcnow => Ok(Instance::new(self.utcnow())),
            Source::Environment => self.environment(),
        }
    }

    // ── Resolution ──

    fn resolve_param(&self, param: &Param, target: Option<&str>) -> Result<Instance> {
        let name = param.name();

        if let Some(value) = self.read_registry().binding(name) {
            trace!(name, "Resolved by binding");
            return Ok(value);
        }

        if let Some(ty) = param.ty() {
            let over = self.read_registry().override_for(ty);
            if let Some(over) = over {
                return self.build_override(ty, &over);
            }
        }

        if let Some(instance) = self.resolve_named(name)? {
            return Ok(instance);
        }

        if let Some(ty) = param.ty() {
            let generic = self.inner.providers.read().generic_providers();
            for provider in generic {
                if let Some(builder) = provider.generic()
                    && builder.can_build(ty)
                {
                    trace!(name, ty = %ty, provider = provider.name(), "Resolved by generic provider");
                    return builder.build(ty, name, self);
                }
            }
        }

        let class = {
            let registry = self.read_registry();
            param
                .ty()
                .and_then(|ty| registry.class(ty))
                .or_else(|| registry.class_by_name(name))
        };
        if let Some(class) = class {
            trace!(name, class = %class.name(), "Resolved by known class");
            return self.build_class_instance(&class, false);
        }

        if let Some(path) = self.global_path_for(param) {
            return self.build_standard_lib(&path, false);
        }

        match param.default_value() {
            Some(DefaultValue::Value(value)) => {
                trace!(name, "Using default");
                Ok(value.clone())
            }
            Some(DefaultValue::Class(class)) => {
                trace!(name, class = %class.name(), "Building default class");
                self.build_class_instance(class, false)
            }
            None => Err(self.missing(name, target)),
        }
    }

    /// Provider factories first, then the container's own names.
    fn resolve_named(&self, name: &str) -> Result<Option<Instance>> {
        let found = self.inner.providers.read().named(name);
        if let Some((provider, factory)) = found {
            trace!(name, provider = %provider, "Resolved by provider factory");
            let building = Building::Factory {
                provider,
                name: name.to_string(),
            };
            let _guard = ResolutionGuard::enter(building, factory.name().to_string())?;
            return self.invoke(&factory, &HashMap::new()).map(Some);
        }

        let builtin = match name {
            "di" => Instance::new(self.clone()),
            "now" => Instance::new(self.now()),
            "utcnow" => Instance::new(self.utcnow()),
            "environment" => self.environment()?,
            _ => return Ok(None),
        };
        trace!(name, "Resolved built-in");
        Ok(Some(builtin))
    }

    /// The global path a parameter refers to: its name when the first
    /// segment is a registered root, else its type's lookup name.
    fn global_path_for(&self, param: &Param) -> Option<String> {
        let registry = self.read_registry();
        let name = param.name();
        let root = name.split('.').next().unwrap_or(name);
        if registry.global(root).is_some() {
            return Some(name.to_string());
        }
        param
            .ty()
            .map(TypeKey::lookup_name)
            .filter(|lookup| registry.global(lookup).is_some())
    }

    fn build_type_key(&self, key: &TypeKey, cache: bool) -> Result<Instance> {
        let (over, class) = {
            let registry = self.read_registry();
            (registry.override_for(key), registry.class(key))
        };

        match (over, class) {
            (_, Some(class)) => self.build_class_instance(&class, cache),
            (Some(over), None) => {
                let cache_key = CacheKey::Type(*key);
                if cache && let Some(hit) = self.cached(&cache_key) {
                    return Ok(hit);
                }
                let instance = self.build_override(key, &over)?;
                Ok(self.store(cache_key, instance, cache))
            }
            (None, None) => Err(DiError::MissingDependency(
                MissingDependencyError::new(key.short_name(), None)
                    .with_detail(format!("no class or override is registered for {key}")),
            )),
        }
    }

    fn build_class_instance(&self, class: &Class, cache: bool) -> Result<Instance> {
        let key = CacheKey::Type(*class.key());
        if cache && let Some(hit) = self.cached(&key) {
            trace!(class = %class.name(), "Cache hit");
            return Ok(hit);
        }

        let over = self.read_registry().override_for(class.key());
        let instance = match over {
            Some(over) => self.build_override(class.key(), &over)?,
            None => self.construct(class)?,
        };
        Ok(self.store(key, instance, cache))
    }

    fn build_override(&self, base: &TypeKey, over: &Override) -> Result<Instance> {
        trace!(from = %base, to = %over.replacement.name(), "Building override");
        let built = self.construct(&over.replacement)?;
        (over.adapt)(&built).ok_or_else(|| DiError::TypeMismatch {
            target: over.replacement.name(),
            parameter: "override".to_string(),
            expected: base.type_name(),
            found: built.type_name(),
        })
    }

    fn construct(&self, class: &Class) -> Result<Instance> {
        let name = class.name();
        let signature = class.signature();
        let params = inspect(&name, &signature)?;

        let _guard = ResolutionGuard::enter(Building::Class(*class.key()), name.clone())?;
        let args = self.resolve_arguments(&name, params, &HashMap::new())?;
        let instance = class.construct(&args)?;
        class.activate(&instance, self);
        debug!(class = %name, "Built");
        Ok(instance)
    }

    fn invoke<R>(&self, function: &Function<R>, overrides: &HashMap<String, Instance>) -> Result<R> {
        let params = inspect(function.name(), function.signature())?;
        let args = self.resolve_arguments(function.name(), params, overrides)?;
        function.invoke(&args)
    }

    fn resolve_arguments(
        &self,
        target: &str,
        params: &[Param],
        overrides: &HashMap<String, Instance>,
    ) -> Result<Arguments> {
        let mut args = Arguments::new(target);
        for param in params {
            let value = match overrides.get(param.name()) {
                Some(value) => {
                    trace!(name = param.name(), "Using caller override");
                    value.clone()
                }
                None => self
                    .resolve_param(param, Some(target))
                    .map_err(|err| err.within(target, param.name()))?,
            };
            args.insert(param.name(), value);
        }
        Ok(args)
    }

    fn environment(&self) -> Result<Instance> {
        self.build_class_instance(&Class::of::<Environment>(), true)
    }

    // ── Helpers ──

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.registry.read()
    }

    fn cached(&self, key: &CacheKey) -> Option<Instance> {
        self.inner.cache.get(key).map(|entry| entry.value().clone())
    }

    /// Caches `instance` when asked. A racing build that stored first wins,
    /// so every cached read sees the same instance.
    fn store(&self, key: CacheKey, instance: Instance, cache: bool) -> Instance {
        if !cache {
            return instance;
        }
        self.inner.cache.entry(key).or_insert(instance).value().clone()
    }

    fn missing(&self, name: &str, target: Option<&str>) -> DiError {
        let mut known = self.read_registry().known_names();
        known.extend(self.inner.providers.read().factory_names());
        known.extend(BUILTIN_NAMES.iter().map(|n| n.to_string()));
        let candidates: Vec<&str> = known.iter().map(String::as_str).collect();

        DiError::MissingDependency(
            MissingDependencyError::new(name, target.map(str::to_string))
                .with_suggestions(suggest_similar(name, &candidates, MAX_SUGGESTIONS)),
        )
    }
}

impl Default for Di {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Di {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Di {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.read_registry();
        f.debug_struct("Di")
            .field("bindings", &registry.binding_count())
            .field("classes", &registry.class_count())
            .field("providers", &self.inner.providers.read().len())
            .field("cached", &self.inner.cache.len())
            .field("clock_mocked", &self.inner.clock.read().is_mocked())
            .finish()
    }
}

/// A non-owning [`Di`] handle, as held by activated
/// [`Inject`](crate::Inject) attributes.
#[derive(Clone, Default)]
pub struct WeakDi {
    inner: Weak<Inner>,
}

impl WeakDi {
    /// The container, if any strong handle to it is still alive.
    pub fn upgrade(&self) -> Option<Di> {
        self.inner.upgrade().map(|inner| Di { inner })
    }

    /// Returns `true` if this handle points at `di`.
    pub fn points_to(&self, di: &Di) -> bool {
        Weak::ptr_eq(&self.inner, &Arc::downgrade(&di.inner))
    }
}

impl fmt::Debug for WeakDi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDi")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

fn downcast_built<T: ?Sized + Send + Sync + 'static>(target: &str, instance: &Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
        target: target.to_string(),
        parameter: "built value".to_string(),
        expected: type_name::<T>(),
        found: instance.type_name(),
    })
}

// ============================================================
// Prelude
// ============================================================

/// Import everything you need with `use joinery_container::prelude::*`.
pub mod prelude {
    pub use crate::class::{Class, Component, Implements, Module};
    pub use crate::container::{Di, DiBuilder, Target, WeakDi};
    pub use crate::environment::{EnvValue, Environment};
    pub use crate::error::{DiError, Result};
    pub use crate::function::{Arguments, Function};
    pub use crate::globals::GlobalModule;
    pub use crate::inject::Inject;
    pub use crate::instance::Instance;
    pub use crate::provider::{GenericBuilder, Provider, ProviderRegistry};
    pub use crate::signature::{Param, Signature};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatchAll;
    use crate::provider::{GenericBuilder, ProviderRegistry};
    use crate::signature::Signature;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Server {
        port: u16,
    }

    impl Component for Server {
        fn signature() -> Signature {
            Signature::new().param(Param::typed::<u16>("port"))
        }
        fn construct(args: &Arguments) -> Result<Self> {
            Ok(Server {
                port: args.value("port")?,
            })
        }
    }

    struct Greeting {
        value: Option<String>,
    }

    impl Component for Greeting {
        fn signature() -> Signature {
            Signature::new().param(Param::typed::<Option<String>>("value").default_none::<String>())
        }
        fn construct(args: &Arguments) -> Result<Self> {
            Ok(Greeting {
                value: args.optional("value")?,
            })
        }
    }

    struct Pricing;

    impl Provider for Pricing {
        fn register(&self, registry: &mut dyn ProviderRegistry) {
            registry.provide("multiplier", Signature::new(), |_| Ok(3i64));
        }
    }

    struct Calculator {
        multiplier: i64,
    }

    impl Component for Calculator {
        fn signature() -> Signature {
            Signature::new().param(Param::named("multiplier"))
        }
        fn construct(args: &Arguments) -> Result<Self> {
            Ok(Calculator {
                multiplier: args.value("multiplier")?,
            })
        }
    }

    trait Base: Send + Sync {
        fn kind(&self) -> &'static str;
    }

    struct Derived;

    impl Base for Derived {
        fn kind(&self) -> &'static str {
            "derived"
        }
    }

    impl Component for Derived {
        fn signature() -> Signature {
            Signature::new()
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Derived)
        }
    }

    impl Implements<dyn Base> for Derived {
        fn upcast(self: Arc<Self>) -> Arc<dyn Base> {
            self
        }
    }

    struct Payments;

    impl Component for Payments {
        fn signature() -> Signature {
            Signature::new().param(Param::named("gateway"))
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Payments)
        }
    }

    struct Checkout;

    impl Component for Checkout {
        fn signature() -> Signature {
            Signature::new().param(Param::typed::<Payments>("payments"))
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Checkout)
        }
    }

    struct Shop;

    impl Component for Shop {
        fn signature() -> Signature {
            Signature::new().param(Param::typed::<Checkout>("checkout"))
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Shop)
        }
    }

    struct Chicken;
    struct Egg;

    impl Component for Chicken {
        fn signature() -> Signature {
            Signature::new().param(Param::typed::<Egg>("egg"))
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Chicken)
        }
    }

    impl Component for Egg {
        fn signature() -> Signature {
            Signature::new().param(Param::typed::<Chicken>("chicken"))
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Egg)
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn fixed_local() -> DateTime<Local> {
        Local.with_ymd_and_hms(2001, 2, 3, 4, 5, 6).unwrap()
    }

    // ── Concrete scenarios ──

    #[test]
    fn binding_satisfies_typed_param() {
        let di = Di::builder().binding("port", 8080u16).build();
        assert_eq!(di.build_class::<Server>().unwrap().port, 8080);
    }

    #[test]
    fn optional_param_defaults_to_none() {
        let di = Di::new();
        assert_eq!(di.build_class::<Greeting>().unwrap().value, None);

        di.add_binding("value", String::from("hello"));
        assert_eq!(di.build_class::<Greeting>().unwrap().value.as_deref(), Some("hello"));
    }

    #[test]
    fn provider_factory_satisfies_param() {
        let di = Di::builder().provider(Pricing).build();
        assert_eq!(di.build_class::<Calculator>().unwrap().multiplier, 3);
    }

    #[test]
    fn override_reaches_function_params() {
        let di = Di::builder().class_override::<dyn Base, Derived>().build();
        let describe = Function::new(
            "describe",
            Signature::new().param(Param::typed::<dyn Base>("thing")),
            |args| Ok(args.get::<dyn Base>("thing")?.kind()),
        );
        assert_eq!(di.call_function(&describe).unwrap(), "derived");
        assert_eq!(di.build_type::<dyn Base>().unwrap().kind(), "derived");
    }

    #[test]
    fn mocked_now_until_reset() {
        let di = Di::new();
        di.set_now(fixed_local());

        let first = di.build_named::<DateTime<Local>>("now").unwrap();
        let second = di.build_named::<DateTime<Local>>("now").unwrap();
        assert_eq!(*first, fixed_local());
        assert_eq!(*second, fixed_local());

        di.reset_now();
        assert!(*di.build_named::<DateTime<Local>>("now").unwrap() > fixed_local());
    }

    #[test]
    fn mocked_utcnow() {
        let fixed = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        let di = Di::builder().utcnow(fixed).build();
        assert_eq!(*di.build_named::<DateTime<Utc>>("utcnow").unwrap(), fixed);
        di.reset_utcnow();
        assert!(di.utcnow() > fixed);
    }

    #[test]
    fn cached_global_path_is_shared() {
        let di = Di::new();
        let a = di.build("os.environ", true).unwrap();
        let b = di.build("os.environ", true).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(a.downcast::<crate::stdlib::Environ>().is_some());

        let c = di.build_standard_lib("os.environ", false).unwrap();
        assert!(!a.ptr_eq(&c));
    }

    // ── Precedence ──

    #[test]
    fn binding_beats_known_class() {
        let di = Di::builder()
            .binding("port", 1u16)
            .class::<Server>()
            .binding("server", String::from("bound"))
            .build();
        let server = di.build_named::<String>("server").unwrap();
        assert_eq!(*server, "bound");
    }

    #[test]
    fn untyped_param_finds_class_by_lookup_name() {
        let di = Di::builder().binding("port", 9000u16).class::<Server>().build();
        let server = di.build_named::<Server>("server").unwrap();
        assert_eq!(server.port, 9000);
    }

    #[test]
    fn caller_override_beats_binding() {
        let di = Di::builder().binding("animal", String::from("dog")).build();
        let describe = Function::new(
            "describe",
            Signature::new().param(Param::named("animal")),
            |args| args.value::<String>("animal"),
        );
        let animal = di
            .call_function_with(&describe, [("animal", Instance::new(String::from("cat")))])
            .unwrap();
        assert_eq!(animal, "cat");
        assert_eq!(di.call_function(&describe).unwrap(), "dog");
    }

    #[test]
    fn named_factory_beats_generic_builder() {
        struct Repository {
            table: String,
        }

        struct Tables;

        impl GenericBuilder for Tables {
            fn can_build(&self, ty: &TypeKey) -> bool {
                *ty == TypeKey::of::<Repository>()
            }
            fn build(&self, _: &TypeKey, parameter: &str, _: &Di) -> Result<Instance> {
                Ok(Instance::new(Repository {
                    table: parameter.to_string(),
                }))
            }
        }

        impl Provider for Tables {
            fn register(&self, registry: &mut dyn ProviderRegistry) {
                registry.provide("audit", Signature::new(), |_| {
                    Ok(Repository {
                        table: "audit_log".into(),
                    })
                });
            }
            fn generic(&self) -> Option<&dyn GenericBuilder> {
                Some(self)
            }
        }

        let di = Di::builder().provider(Tables).build();
        let tables = Function::new(
            "tables",
            Signature::new()
                .param(Param::typed::<Repository>("users"))
                .param(Param::typed::<Repository>("audit")),
            |args| {
                Ok((
                    args.get::<Repository>("users")?.table.clone(),
                    args.get::<Repository>("audit")?.table.clone(),
                ))
            },
        );
        let (users, audit) = di.call_function(&tables).unwrap();
        assert_eq!(users, "users");
        assert_eq!(audit, "audit_log");

        let caps = di.provider_capabilities();
        assert_eq!(caps[0].1, Capabilities { named: true, generic: true });
    }

    #[test]
    fn earliest_provider_wins() {
        struct Five;
        impl Provider for Five {
            fn register(&self, registry: &mut dyn ProviderRegistry) {
                registry.provide("multiplier", Signature::new(), |_| Ok(5i64));
            }
        }

        let di = Di::builder().provider(Pricing).provider(Five).build();
        assert_eq!(*di.build_named::<i64>("multiplier").unwrap(), 3);
    }

    #[test]
    fn global_by_param_name_and_type() {
        let di = Di::new();
        let net = Function::new(
            "net",
            Signature::new()
                .param(Param::named("socket"))
                .param(Param::typed::<crate::stdlib::Subprocess>("launcher")),
            |args| {
                args.get::<crate::stdlib::Socket>("socket")?;
                args.get::<crate::stdlib::Subprocess>("launcher")?;
                Ok(())
            },
        );
        di.call_function(&net).unwrap();
    }

    #[test]
    fn builtin_di_is_the_container() {
        let di = Di::new();
        let own = di.build_named::<Di>("di").unwrap();
        assert!(own.ptr_eq(&di));
        assert_eq!(*own, di);
    }

    // ── Defaults ──

    #[test]
    fn default_class_is_built() {
        let di = Di::builder().binding("port", 443u16).build();
        let pick = Function::new(
            "pick",
            Signature::new().param(Param::named("server").default_class(Class::of::<Server>())),
            |args| Ok(args.get::<Server>("server")?.port),
        );
        assert_eq!(di.call_function(&pick).unwrap(), 443);
    }

    #[test]
    fn failing_match_does_not_fall_back_to_default() {
        struct Flaky;
        impl Component for Flaky {
            fn signature() -> Signature {
                Signature::new()
            }
            fn construct(_: &Arguments) -> Result<Self> {
                Err(DiError::construction_failed("Flaky", "boom"))
            }
        }

        let di = Di::builder().class::<Flaky>().build();
        let use_flaky = Function::new(
            "use_flaky",
            Signature::new().param(Param::typed::<Flaky>("flaky").default(0u8)),
            |_| Ok(()),
        );
        assert!(matches!(
            di.call_function(&use_flaky).unwrap_err(),
            DiError::ConstructionFailed { .. }
        ));
    }

    // ── Failures ──

    #[test]
    fn catch_all_rejected_before_resolution() {
        static PROBES: AtomicUsize = AtomicUsize::new(0);

        struct Probe;
        impl Provider for Probe {
            fn register(&self, registry: &mut dyn ProviderRegistry) {
                registry.provide("probe", Signature::new(), |_| {
                    PROBES.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }
        }

        struct Greedy;
        impl Component for Greedy {
            fn signature() -> Signature {
                Signature::new().param(Param::named("probe")).keywords()
            }
            fn construct(_: &Arguments) -> Result<Self> {
                Ok(Greedy)
            }
        }

        let di = Di::builder().provider(Probe).build();
        match di.build_class::<Greedy>().err().expect("build should fail") {
            DiError::Configuration(e) => assert_eq!(e.catch_all, CatchAll::Keyword),
            other => panic!("Expected Configuration, got: {other:?}"),
        }
        assert_eq!(PROBES.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_dependency_names_full_chain() {
        init_tracing();
        let di = Di::builder()
            .class::<Payments>()
            .class::<Checkout>()
            .build();

        match di.build_class::<Shop>().err().expect("build should fail") {
            DiError::MissingDependency(e) => {
                assert_eq!(e.parameter, "gateway");
                assert_eq!(e.target.as_deref(), Some("Payments"));
                let chain: Vec<String> = e.chain.iter().map(ToString::to_string).collect();
                assert_eq!(chain, ["Shop(checkout)", "Checkout(payments)", "Payments(gateway)"]);
            }
            other => panic!("Expected MissingDependency, got: {other:?}"),
        }
    }

    #[test]
    fn missing_name_suggests_similar() {
        let di = Di::builder().binding("mailer", ()).build();
        match di.build_from_name("mailr", false).unwrap_err() {
            DiError::MissingDependency(e) => {
                assert!(e.target.is_none());
                assert!(e.chain.is_empty());
                assert!(e.suggestions.contains(&"mailer".to_string()));
            }
            other => panic!("Expected MissingDependency, got: {other:?}"),
        }
    }

    #[test]
    fn missing_global_segment_is_missing_dependency() {
        let di = Di::new();
        let err = di.build_standard_lib("os.nope", false).unwrap_err();
        assert!(err.is_missing_dependency());
        assert!(format!("{err}").contains("`os` has no attribute `nope`"));

        assert!(di.build_standard_lib("nosuchmodule.x", true).unwrap_err().is_missing_dependency());
        assert!(di.build_type::<dyn Base>().err().expect("build should fail").is_missing_dependency());
    }

    #[test]
    fn class_cycle_is_detected() {
        init_tracing();
        let di = Di::builder().class::<Chicken>().class::<Egg>().build();
        match di.build_class::<Chicken>().err().expect("build should fail") {
            DiError::CircularDependency(e) => assert_eq!(e.chain, ["Chicken", "Egg", "Chicken"]),
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
        // The guard unwound; unrelated builds still work.
        di.add_binding("port", 1u16);
        assert!(di.build_class::<Server>().is_ok());
    }

    mod db {
        use super::*;

        pub struct Config {
            pub url: String,
        }

        impl Component for Config {
            fn signature() -> Signature {
                Signature::new().param(Param::typed::<String>("database_url"))
            }
            fn construct(args: &Arguments) -> Result<Self> {
                Ok(Config {
                    url: args.value("database_url")?,
                })
            }
        }
    }

    mod http {
        use super::*;

        pub struct Config {
            pub db: Arc<super::db::Config>,
        }

        impl Component for Config {
            fn signature() -> Signature {
                Signature::new().param(Param::typed::<super::db::Config>("db"))
            }
            fn construct(args: &Arguments) -> Result<Self> {
                Ok(Config { db: args.get("db")? })
            }
        }
    }

    #[test]
    fn same_short_name_in_different_modules_is_not_a_cycle() {
        let di = Di::builder()
            .binding("database_url", String::from("postgres://db"))
            .class::<db::Config>()
            .build();
        let config = di.build_class::<http::Config>().unwrap();
        assert_eq!(config.db.url, "postgres://db");
    }

    #[test]
    fn provider_cycle_is_detected() {
        struct Loop;
        impl Provider for Loop {
            fn register(&self, registry: &mut dyn ProviderRegistry) {
                registry.provide("a", Signature::new().param(Param::named("b")), |_| Ok(()));
                registry.provide("b", Signature::new().param(Param::named("a")), |_| Ok(()));
            }
        }

        let di = Di::builder().provider(Loop).build();
        match di.build_from_name("a", false).unwrap_err() {
            DiError::CircularDependency(e) => {
                assert_eq!(e.chain, ["provide_a", "provide_b", "provide_a"])
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn built_value_of_wrong_type_is_a_mismatch() {
        let di = Di::builder().binding("port", 8080u16).build();
        assert!(matches!(
            di.build_named::<String>("port").unwrap_err(),
            DiError::TypeMismatch { .. }
        ));
    }

    // ── Caching ──

    #[test]
    fn cached_builds_share_an_instance() {
        let di = Di::builder().binding("port", 80u16).build();
        let a = di.build_class_cached::<Server>().unwrap();
        let b = di.build_class_cached::<Server>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = di.build_class::<Server>().unwrap();
        let d = di.build_class::<Server>().unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn name_and_type_caches_are_separate() {
        let di = Di::builder().binding("port", 80u16).class::<Server>().build();
        let by_name = di.build("server", true).unwrap();
        let by_class = di.build(Class::of::<Server>(), true).unwrap();
        let by_type = di.build(TypeKey::of::<Server>(), true).unwrap();
        assert!(!by_name.ptr_eq(&by_class));
        assert!(by_class.ptr_eq(&by_type));
        assert_eq!(di.cached_count(), 2);
    }

    #[test]
    fn environment_is_cached_per_container() {
        let di = Di::new();
        let a = di.build_named::<Environment>("environment").unwrap();
        let b = di.build_named::<Environment>("environment").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = Di::new().build_named::<Environment>("environment").unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn dropped_container_is_freed() {
        let di = Di::new();
        di.build_named::<Environment>("environment").unwrap();
        let me = di.build("di", true).unwrap();
        assert!(me.downcast::<Di>().unwrap().ptr_eq(&di));
        drop(me);

        let weak = di.downgrade();
        drop(di);
        assert!(weak.upgrade().is_none());
    }

    // ── Registration ──

    #[test]
    fn modules_register_their_classes() {
        let di = Di::new();
        di.add_modules([&Module::new("web").class::<Server>().class::<Calculator>()]);
        di.add_binding("port", 3000u16);
        di.add_binding("multiplier", 2i64);
        assert_eq!(di.build_named::<Server>("server").unwrap().port, 3000);
        assert_eq!(di.build_named::<Calculator>("calculator").unwrap().multiplier, 2);
    }

    #[test]
    fn rebinding_replaces_value() {
        let di = Di::builder().binding("port", 1u16).build();
        di.add_binding("port", 2u16);
        assert_eq!(di.build_class::<Server>().unwrap().port, 2);
    }

    #[test]
    fn replacing_a_global_module() {
        let env: crate::stdlib::Environ = [("HOME", "/tmp/home")].into_iter().collect();
        let di = Di::builder()
            .global_module(GlobalModule::new("os").with_value("environ", env))
            .build();
        let environ = di.build_named::<crate::stdlib::Environ>("os.environ").unwrap();
        assert_eq!(environ.get("HOME"), Some("/tmp/home"));
    }

    // ── Concurrency ──

    #[test]
    fn concurrent_cached_builds_agree() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        struct Shared;
        impl Component for Shared {
            fn signature() -> Signature {
                Signature::new()
            }
            fn construct(_: &Arguments) -> Result<Self> {
                BUILT.fetch_add(1, Ordering::SeqCst);
                Ok(Shared)
            }
        }

        let di = Di::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let di = di.clone();
                std::thread::spawn(move || di.build_class_cached::<Shared>().unwrap())
            })
            .collect();
        let built: Vec<Arc<Shared>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(built.iter().all(|b| Arc::ptr_eq(b, &built[0])));
        assert!(BUILT.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn concurrent_unrelated_graphs_do_not_interfere() {
        let di = Di::builder()
            .binding("port", 80u16)
            .class::<Chicken>()
            .class::<Egg>()
            .build();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let di = di.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        di.build_class::<Server>().map(|s| s.port).ok()
                    } else {
                        di.build_class::<Chicken>().map(|_| 0).ok()
                    }
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.join().unwrap();
            if i % 2 == 0 {
                assert_eq!(result, Some(80));
            } else {
                assert_eq!(result, None);
            }
        }
    }

    #[test]
    fn debug_display() {
        let di = Di::builder().binding("port", 80u16).class::<Server>().build();
        let debug = format!("{di:?}");
        assert!(debug.contains("bindings: 1"));
        assert!(debug.contains("classes: 1"));
    }
}
