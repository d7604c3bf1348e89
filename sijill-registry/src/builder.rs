//! Builder facade.
//!
//! Collects declaration sources and imperative registrations, then runs
//! the build pipeline:
//!
//! ```text
//! sources + registrations ──Aggregator──> Aggregation
//!                         ──ConflictResolver──> resolved contracts
//!                         ──ConstructorSelector──> Arc<Registry> ──BackingEngine──> resolver
//! ```
//!
//! [`build`](RegistryBuilder::build) borrows the builder and rebuilds from
//! scratch on every call. Registries returned earlier are never touched by
//! later registrations.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::aggregate::{Aggregation, Aggregator};
use crate::canonical::{TypeCanonicalizer, TypeDescriptor};
use crate::constructor::ConstructorSelector;
use crate::container::{Container, DefaultEngine};
use crate::declaration::{ContractDeclaration, Implements, Injectable, ServiceDeclaration};
use crate::engine::{BackingEngine, Resolver};
use crate::error::Result;
use crate::lifetime::Lifetime;
use crate::metadata::MetadataValue;
use crate::priority::Priority;
use crate::registry::Registry;
use crate::resolve::ConflictResolver;
use crate::settings::BuildSettings;
use crate::source::{DeclarationSource, StaticSource};

/// Name of the source holding the builder's own registrations.
pub const BUILDER_SOURCE: &str = "builder";

/// One imperative registration: the service plus its implicit contract
/// declaration.
#[derive(Debug, Clone)]
struct Registration {
    contract: ContractDeclaration,
    service: ServiceDeclaration,
}

/// Accumulates sources and registrations and builds registries.
///
/// # Examples
/// ```rust
/// use sijill_registry::prelude::*;
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 { 42 }
/// }
///
/// let mut builder = RegistryBuilder::new();
/// builder
///     .register_factory::<dyn Clock, _>(|_| Ok(Arc::new(FixedClock)))
///     .singleton()
///     .metadata("kind", "fixed");
///
/// let container = builder.build().unwrap();
/// assert_eq!(container.resolve::<dyn Clock>().unwrap().now(), 42);
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    settings: BuildSettings,
    sources: Vec<Arc<dyn DeclarationSource>>,
    registrations: Vec<Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: BuildSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Appends a declaration source. Source order breaks ties.
    pub fn add_source<S: DeclarationSource + 'static>(&mut self, source: S) -> &mut Self {
        self.add_shared_source(Arc::new(source))
    }

    /// Appends a source that is shared with other builders.
    pub fn add_shared_source(&mut self, source: Arc<dyn DeclarationSource>) -> &mut Self {
        debug!(source = source.name(), position = self.sources.len(), "Added declaration source");
        self.sources.push(source);
        self
    }

    // ── Registrations ──

    /// Registers implementation `T` for contract `C`.
    pub fn register_type<T, C>(&mut self) -> RegistrationBuilder<'_>
    where
        T: Injectable + Implements<C>,
        C: ?Sized + Send + Sync + 'static,
    {
        self.push::<C>(ServiceDeclaration::implementation::<T, C>())
    }

    /// Registers implementation `T` as its own contract.
    pub fn register_self<T: Injectable>(&mut self) -> RegistrationBuilder<'_> {
        self.register_type::<T, T>()
    }

    /// Registers a pre-built instance for contract `C`.
    pub fn register_instance<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        instance: Arc<C>,
    ) -> RegistrationBuilder<'_> {
        self.push::<C>(ServiceDeclaration::instance::<C>(instance))
    }

    /// Registers a factory for contract `C`.
    pub fn register_factory<C, F>(&mut self, factory: F) -> RegistrationBuilder<'_>
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<Arc<C>> + Send + Sync + 'static,
    {
        self.push::<C>(ServiceDeclaration::factory::<C, F>(factory))
    }

    fn push<C: ?Sized + 'static>(&mut self, service: ServiceDeclaration) -> RegistrationBuilder<'_> {
        debug!(service = service.strategy.name(), "Registered service");
        self.registrations.push(Registration {
            contract: ContractDeclaration::of::<C>().with_priority(Priority::LOWEST),
            service,
        });
        let index = self.registrations.len() - 1;
        RegistrationBuilder {
            registration: &mut self.registrations[index],
        }
    }

    /// Number of imperative registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    // ── Build ──

    /// Every source, with the builder's registrations last.
    fn all_sources(&self) -> Vec<Arc<dyn DeclarationSource>> {
        let mut builder_source = StaticSource::new(BUILDER_SOURCE);
        for registration in &self.registrations {
            builder_source.push_contract(registration.contract.clone());
            builder_source.push_service(registration.service.clone());
        }

        let mut sources = self.sources.clone();
        sources.push(Arc::new(builder_source));
        sources
    }

    fn aggregator(&self) -> Aggregator {
        Aggregator::new(TypeCanonicalizer::from_settings(&self.settings))
    }

    /// Runs conflict resolution and constructor selection, then freezes
    /// the registry.
    fn finish(&self, aggregation: Aggregation) -> Result<Arc<Registry>> {
        let mut resolved =
            ConflictResolver::new(self.settings.ambiguity_strategy).resolve(aggregation)?;
        ConstructorSelector::new().apply(&mut resolved)?;

        let registry = Registry::from_resolved(resolved);
        info!(
            contracts = registry.len(),
            bindings = registry.binding_count(),
            "Registry built successfully ✓"
        );
        Ok(Arc::new(registry))
    }

    /// Builds a new immutable registry.
    ///
    /// # Errors
    /// Any discovery, contract, binding or constructor error. No partial
    /// registry is ever returned.
    #[instrument(skip(self), fields(sources = self.sources.len() + 1, registrations = self.registrations.len()), name = "registry_build")]
    pub fn build_registry(&self) -> Result<Arc<Registry>> {
        info!(strategy = %self.settings.ambiguity_strategy, "Building registry");
        let aggregation = self.aggregator().aggregate(&self.all_sources())?;
        self.finish(aggregation)
    }

    /// Like [`build_registry`](Self::build_registry), enumerating sources
    /// concurrently.
    #[cfg(feature = "async")]
    #[instrument(skip(self), fields(sources = self.sources.len() + 1, registrations = self.registrations.len()), name = "registry_build_async")]
    pub async fn build_registry_async(&self) -> Result<Arc<Registry>> {
        info!(strategy = %self.settings.ambiguity_strategy, "Building registry");
        let aggregation = self.aggregator().aggregate_parallel(&self.all_sources()).await?;
        self.finish(aggregation)
    }

    /// Builds a registry and hands it to `engine`.
    pub fn build_with<E: BackingEngine>(&self, engine: &E) -> Result<E::Output> {
        engine.build(self.build_registry()?)
    }

    /// Builds a registry and the default [`Container`].
    pub fn build(&self) -> Result<Container> {
        self.build_with(&DefaultEngine)
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|source| source.name()).collect();
        f.debug_struct("RegistryBuilder")
            .field("settings", &self.settings)
            .field("sources", &sources)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

/// Chainable settings of one registration.
///
/// ```rust,ignore
/// builder
///     .register_type::<SmtpMailer, dyn Mailer>()
///     .singleton()
///     .override_priority(Priority::HIGH)
///     .metadata("transport", "smtp");
/// ```
pub struct RegistrationBuilder<'a> {
    registration: &'a mut Registration,
}

impl RegistrationBuilder<'_> {
    pub fn lifetime(self, lifetime: Lifetime) -> Self {
        self.registration.service.lifetime = Some(lifetime);
        self
    }

    pub fn singleton(self) -> Self {
        self.lifetime(Lifetime::Singleton)
    }

    pub fn scoped(self) -> Self {
        self.lifetime(Lifetime::Scoped)
    }

    pub fn transient(self) -> Self {
        self.lifetime(Lifetime::Transient)
    }

    /// Lets the contract hold several bindings.
    ///
    /// Only this registration's implicit contract declaration is changed.
    /// Every registration for the contract has to set it, otherwise the
    /// implicit declarations disagree and the build fails with
    /// [`SijillError::AmbiguousContract`](crate::error::SijillError::AmbiguousContract).
    pub fn allow_multiple(self) -> Self {
        self.registration.contract.allow_multiple = true;
        self
    }

    /// Registers the contract's open generic definition, so other closed
    /// forms can join it.
    pub fn open_generic(self) -> Self {
        self.registration.contract.open_generic = true;
        self
    }

    pub fn metadata(self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.registration.service.metadata.insert(key, value);
        self
    }

    /// Instances are disposed by their owner, never by the engine.
    pub fn externally_owned(self) -> Self {
        self.registration.service.externally_owned = true;
        self
    }

    pub fn override_priority(self, priority: impl Into<Priority>) -> Self {
        self.registration.service.override_priority = priority.into();
        self
    }

    pub fn processing_priority(self, priority: impl Into<Priority>) -> Self {
        self.registration.service.processing_priority = priority.into();
        self
    }

    /// Registers under another contract descriptor, e.g. an alias path.
    pub fn for_contract(self, contract: TypeDescriptor) -> Self {
        self.registration.contract.contract = contract.clone();
        self.registration.service.contract = Some(contract);
        self
    }

    /// Name of the registered strategy.
    pub fn name(&self) -> &str {
        self.registration.service.strategy.name()
    }
}

impl std::fmt::Debug for RegistrationBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationBuilder")
            .field("service", &self.registration.service)
            .finish()
    }
}
