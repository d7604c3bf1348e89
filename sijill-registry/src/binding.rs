//! Resolved bindings.

use std::sync::Arc;

use crate::aggregate::{DeclaredContract, DeclaredService};
use crate::canonical::TypeKey;
use crate::declaration::{ConstructorInfo, InstancingStrategy};
use crate::lifetime::Lifetime;
use crate::metadata::Metadata;
use crate::priority::Priority;

/// The final registration of one instancing strategy against a contract.
///
/// Bindings are immutable once the registry is built.
#[derive(Debug, Clone)]
pub struct Binding {
    pub(crate) id: usize,
    pub(crate) contract: TypeKey,
    pub(crate) declared_contract: TypeKey,
    pub(crate) implementation: Option<TypeKey>,
    pub(crate) strategy: InstancingStrategy,
    pub(crate) lifetime: Lifetime,
    pub(crate) allow_multiple: bool,
    pub(crate) open_generic: bool,
    pub(crate) override_priority: Priority,
    pub(crate) processing_priority: Priority,
    pub(crate) metadata: Metadata,
    pub(crate) externally_owned: bool,
    pub(crate) constructor: Option<ConstructorInfo>,
    pub(crate) source: Arc<str>,
    pub(crate) discovery: usize,
}

impl Binding {
    /// Combines the governing contract declaration with the winning service.
    ///
    /// Metadata starts from the contract defaults and is overwritten by the
    /// service's own entries; an explicit service lifetime beats the
    /// contract default.
    pub(crate) fn resolve(contract: &DeclaredContract, service: DeclaredService) -> Self {
        Self {
            id: 0,
            contract: contract.contract.clone(),
            declared_contract: service.contract,
            implementation: service.implementation,
            strategy: service.strategy,
            lifetime: service.lifetime.unwrap_or(contract.lifetime),
            allow_multiple: contract.allow_multiple,
            open_generic: contract.open_generic,
            override_priority: service.override_priority,
            processing_priority: service.processing_priority,
            metadata: contract.metadata.merged(&service.metadata),
            externally_owned: service.externally_owned,
            constructor: None,
            source: service.source,
            discovery: service.discovery,
        }
    }

    /// Position of the binding in the registry.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The contract this binding is registered under.
    ///
    /// For open generic contracts this is the open definition.
    pub fn contract(&self) -> &TypeKey {
        &self.contract
    }

    /// The contract as the service declared it, e.g. a closed generic.
    pub fn declared_contract(&self) -> &TypeKey {
        &self.declared_contract
    }

    pub fn implementation(&self) -> Option<&TypeKey> {
        self.implementation.as_ref()
    }

    pub fn strategy(&self) -> &InstancingStrategy {
        &self.strategy
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn allow_multiple(&self) -> bool {
        self.allow_multiple
    }

    pub fn is_open_generic(&self) -> bool {
        self.open_generic
    }

    pub fn override_priority(&self) -> Priority {
        self.override_priority
    }

    pub fn processing_priority(&self) -> Priority {
        self.processing_priority
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Instances are owned elsewhere and must never be disposed by the engine.
    pub fn is_externally_owned(&self) -> bool {
        self.externally_owned
    }

    /// The selected injection constructor.
    ///
    /// `None` leaves the choice to the backing engine.
    pub fn constructor(&self) -> Option<&ConstructorInfo> {
        self.constructor.as_ref()
    }

    /// Name of the source that declared the service.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn discovery(&self) -> usize {
        self.discovery
    }

    /// Implementation key, or the strategy name for factories and instances.
    pub fn describe(&self) -> String {
        match &self.implementation {
            Some(implementation) => implementation.to_string(),
            None => self.strategy.name().to_string(),
        }
    }

    /// Returns `true` if this binding can serve a request for `requested`.
    ///
    /// Closed generic requests against an open contract only match bindings
    /// declared for that closed form or for the open definition itself.
    pub fn serves(&self, requested: &TypeKey) -> bool {
        self.declared_contract == *requested
            || self.declared_contract.is_open_generic()
            || !self.open_generic
    }
}
