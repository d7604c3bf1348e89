//! # The Container — default backing engine
//!
//! Resolves contracts against a finished [`Registry`] and manages the
//! lifetime of the instances it produces.
//!
//! # Architecture
//! ```text
//! RegistryBuilder ──build_registry()──> Arc<Registry>
//!                                           │
//!                                  DefaultEngine::build()
//!                                           │
//!                                           ▼
//!                                       Container ──create_scope()──> ScopedContainer
//! ```
//!
//! # Examples
//! ```rust
//! use sijill_registry::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String { format!("[console] {msg}") }
//! }
//!
//! let mut builder = Container::builder();
//! builder.register_instance::<dyn Logger>(Arc::new(ConsoleLogger));
//! let container = builder.build().expect("Failed to build container");
//!
//! let logger = container.resolve::<dyn Logger>().expect("Failed to resolve");
//! assert_eq!(logger.log("hi"), "[console] hi");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use sijill_support::rendering::suggest_similar;
use tracing::{debug, info, trace};

use crate::binding::Binding;
use crate::builder::RegistryBuilder;
use crate::canonical::TypeKey;
use crate::declaration::{ConstructorInfo, ImplementationType, Instance, InstancingStrategy};
use crate::engine::{BackingEngine, Resolver};
use crate::error::{NoConstructorError, NotRegisteredError, Result, SijillError};
use crate::lifetime::Lifetime;
use crate::registry::Registry;

const MAX_SUGGESTIONS: usize = 3;

// ═══════════════════════════════════════════
// DefaultEngine
// ═══════════════════════════════════════════

/// Builds a [`Container`] from a registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEngine;

impl BackingEngine for DefaultEngine {
    type Output = Container;

    fn build(&self, registry: Arc<Registry>) -> Result<Container> {
        Ok(Container::new(registry))
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Immutable, thread-safe resolver over a [`Registry`].
///
/// Singletons are created on first request, once per binding.
pub struct Container {
    registry: Arc<Registry>,
    singletons: Box<[OnceCell<Instance>]>,
}

impl Container {
    /// Create a new builder.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn new(registry: Arc<Registry>) -> Self {
        let singletons = (0..registry.binding_count()).map(|_| OnceCell::new()).collect();
        info!(
            contracts = registry.len(),
            bindings = registry.binding_count(),
            "Container ready"
        );
        Self {
            registry,
            singletons,
        }
    }

    /// The registry this container resolves against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Create a scope with its own cache for [`Lifetime::Scoped`] bindings.
    pub fn create_scope(&self) -> ScopedContainer<'_> {
        debug!("Creating new scope");
        ScopedContainer {
            parent: self,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn root(&self) -> Resolution<'_> {
        Resolution {
            container: self,
            scope: None,
        }
    }

    fn not_registered(&self, contract: &TypeKey) -> SijillError {
        let available: Vec<&str> = self.registry.contracts().map(TypeKey::as_str).collect();
        SijillError::NotRegistered(NotRegisteredError {
            requested: contract.clone(),
            suggestions: suggest_similar(contract.as_str(), &available, MAX_SUGGESTIONS),
        })
    }
}

impl Resolver for Container {
    fn resolve_key(&self, contract: &TypeKey) -> Result<Instance> {
        self.root().resolve_key(contract)
    }

    fn resolve_many_key(&self, contract: &TypeKey) -> Result<Vec<Instance>> {
        self.root().resolve_many_key(contract)
    }

    fn is_registered(&self, contract: &TypeKey) -> bool {
        self.registry.contains(contract)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("contracts", &self.registry.len())
            .field("bindings", &self.registry.binding_count())
            .finish()
    }
}

// ═══════════════════════════════════════════
// ScopedContainer
// ═══════════════════════════════════════════

/// A scope: one instance per [`Lifetime::Scoped`] binding.
///
/// Singletons still come from the parent container.
pub struct ScopedContainer<'a> {
    parent: &'a Container,
    cache: Mutex<HashMap<usize, Instance>>,
}

impl ScopedContainer<'_> {
    fn context(&self) -> Resolution<'_> {
        Resolution {
            container: self.parent,
            scope: Some(self),
        }
    }
}

impl Resolver for ScopedContainer<'_> {
    fn resolve_key(&self, contract: &TypeKey) -> Result<Instance> {
        self.context().resolve_key(contract)
    }

    fn resolve_many_key(&self, contract: &TypeKey) -> Result<Vec<Instance>> {
        self.context().resolve_many_key(contract)
    }

    fn is_registered(&self, contract: &TypeKey) -> bool {
        self.parent.is_registered(contract)
    }
}

impl fmt::Debug for ScopedContainer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedContainer")
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Resolution (internal bridge)
// ═══════════════════════════════════════════

/// Resolver handed to factories and activators: the container plus the
/// scope the request started in, if any.
struct Resolution<'a> {
    container: &'a Container,
    scope: Option<&'a ScopedContainer<'a>>,
}

impl Resolution<'_> {
    fn instantiate(&self, binding: &Binding, requested: &TypeKey) -> Result<Instance> {
        trace!(contract = %requested, binding = binding.id(), lifetime = %binding.lifetime(), "Resolving");

        match binding.lifetime() {
            Lifetime::Transient => self.activate(binding, requested),
            Lifetime::Singleton => {
                let Some(cell) = self.container.singletons.get(binding.id()) else {
                    return Err(self.container.not_registered(requested));
                };
                // singletons never capture the requesting scope
                let root = self.container.root();
                cell.get_or_try_init(|| root.activate(binding, requested))
                    .cloned()
            }
            Lifetime::Scoped => {
                let Some(scope) = self.scope else {
                    return Err(SijillError::ScopeRequired {
                        contract: requested.clone(),
                    });
                };
                if let Some(instance) = scope.cache.lock().get(&binding.id()) {
                    return Ok(instance.clone());
                }
                // lock released while activating so dependencies can use the scope
                let instance = self.activate(binding, requested)?;
                Ok(scope
                    .cache
                    .lock()
                    .entry(binding.id())
                    .or_insert(instance)
                    .clone())
            }
        }
    }

    fn activate(&self, binding: &Binding, requested: &TypeKey) -> Result<Instance> {
        match binding.strategy() {
            InstancingStrategy::Instance { instance, .. } => Ok(instance.clone()),
            InstancingStrategy::Factory { factory, .. } => factory(self),
            InstancingStrategy::Type(implementation) => {
                self.construct(binding, implementation, requested)
            }
        }
    }

    fn construct(
        &self,
        binding: &Binding,
        implementation: &ImplementationType,
        requested: &TypeKey,
    ) -> Result<Instance> {
        let implementation_key = binding
            .implementation()
            .cloned()
            .unwrap_or_else(|| requested.clone());
        let no_constructor = |reason: String| {
            SijillError::NoConstructor(NoConstructorError {
                implementation: implementation_key.clone(),
                contract: requested.clone(),
                reason,
            })
        };

        let constructor = match binding.constructor() {
            Some(selected) => selected.clone(),
            None => self
                .pick_constructor(implementation.constructors())
                .map_err(&no_constructor)?,
        };
        let Some(activator) = constructor.activator() else {
            return Err(no_constructor(format!(
                "constructor `{}` has no activator",
                constructor.signature()
            )));
        };

        let raw = activator(self)?;
        match implementation.upcast() {
            Some(upcast) => upcast(raw).ok_or_else(|| {
                SijillError::construction(
                    requested.clone(),
                    format!(
                        "constructor `{}` produced an instance of another type",
                        constructor.signature()
                    ),
                )
            }),
            None => Ok(raw),
        }
    }

    /// Picks a constructor when none is marked: the only public one, else
    /// the widest public one whose parameters are all registered.
    fn pick_constructor(&self, constructors: &[ConstructorInfo]) -> std::result::Result<ConstructorInfo, String> {
        let public: Vec<&ConstructorInfo> = constructors.iter().filter(|ctor| ctor.is_public()).collect();
        if let [only] = public.as_slice() {
            return Ok((*only).clone());
        }

        let registry = &self.container.registry;
        let resolvable: Vec<&ConstructorInfo> = public
            .into_iter()
            .filter(|ctor| {
                ctor.parameters().iter().all(|param| {
                    TypeKey::parse(param.display_name())
                        .map(|key| registry.contains(&key))
                        .unwrap_or(false)
                })
            })
            .collect();

        let Some(widest) = resolvable.iter().map(|ctor| ctor.parameters().len()).max() else {
            return Err("no public constructor has all of its parameters registered".to_string());
        };
        let candidates: Vec<&ConstructorInfo> = resolvable
            .into_iter()
            .filter(|ctor| ctor.parameters().len() == widest)
            .collect();

        match candidates.as_slice() {
            [ctor] => {
                trace!(constructor = %ctor.signature(), "Picked widest resolvable constructor");
                Ok((*ctor).clone())
            }
            _ => Err(format!(
                "{} constructors take {widest} registered parameters; mark one as the injection constructor",
                candidates.len()
            )),
        }
    }
}

impl Resolver for Resolution<'_> {
    fn resolve_key(&self, contract: &TypeKey) -> Result<Instance> {
        let registry = &self.container.registry;
        let Some(entry) = registry.get(contract) else {
            return Err(self.container.not_registered(contract));
        };
        if entry.is_multiple() {
            return Err(SijillError::MultiplicityMismatch {
                contract: contract.clone(),
            });
        }
        let Some(binding) = registry.single(contract) else {
            return Err(self.container.not_registered(contract));
        };
        self.instantiate(binding, contract)
    }

    fn resolve_many_key(&self, contract: &TypeKey) -> Result<Vec<Instance>> {
        self.container
            .registry
            .bindings_for(contract)
            .into_iter()
            .map(|binding| self.instantiate(binding, contract))
            .collect()
    }

    fn is_registered(&self, contract: &TypeKey) -> bool {
        self.container.is_registered(contract)
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, DefaultEngine, ScopedContainer};
    pub use crate::builder::{RegistrationBuilder, RegistryBuilder};
    pub use crate::declaration::{ConstructorInfo, Implements, Injectable};
    pub use crate::engine::{BackingEngine, Resolver, ResolverExt};
    pub use crate::error::{Result, SijillError};
    pub use crate::implements;
    pub use crate::lifetime::Lifetime;
    pub use crate::priority::Priority;
    pub use crate::registry::Registry;
    pub use crate::settings::{AmbiguityStrategy, BuildSettings};
    pub use crate::source::{DeclarationSource, StaticSource};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
