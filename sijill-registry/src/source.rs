//! Declaration sources — pluggable producers of declarations.
//!
//! A source groups related declarations together, similar to a
//! service-provider module. Sources are asked once per build pass and
//! their order matters: it is the last tie-break for otherwise equal
//! registrations.
//!
//! # Examples
//! ```rust,ignore
//! struct LoggingModule;
//!
//! impl DeclarationSource for LoggingModule {
//!     fn contract_declarations(&self) -> Result<Vec<ContractDeclaration>, SourceError> {
//!         Ok(vec![ContractDeclaration::of::<dyn Logger>().singleton()])
//!     }
//!
//!     fn service_declarations(&self) -> Result<Vec<ServiceDeclaration>, SourceError> {
//!         Ok(vec![ServiceDeclaration::implementation::<ConsoleLogger, dyn Logger>()])
//!     }
//! }
//! ```

use crate::declaration::{ContractDeclaration, ServiceDeclaration};
use crate::error::SourceError;

/// A module that declares contracts and the services satisfying them.
///
/// Enumeration must not mutate global state; it may block (e.g. to scan
/// plugin manifests). An error aborts the whole build.
pub trait DeclarationSource: Send + Sync {
    /// Contract declarations, in the source's own order.
    fn contract_declarations(&self) -> Result<Vec<ContractDeclaration>, SourceError>;

    /// Service declarations, in the source's own order.
    fn service_declarations(&self) -> Result<Vec<ServiceDeclaration>, SourceError>;

    /// Human-readable name for logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// An in-memory source.
///
/// The builder uses one for its own registrations.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    name: String,
    contracts: Vec<ContractDeclaration>,
    services: Vec<ServiceDeclaration>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contracts: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn with_contract(mut self, declaration: ContractDeclaration) -> Self {
        self.contracts.push(declaration);
        self
    }

    pub fn with_service(mut self, declaration: ServiceDeclaration) -> Self {
        self.services.push(declaration);
        self
    }

    pub fn push_contract(&mut self, declaration: ContractDeclaration) {
        self.contracts.push(declaration);
    }

    pub fn push_service(&mut self, declaration: ServiceDeclaration) {
        self.services.push(declaration);
    }
}

impl DeclarationSource for StaticSource {
    fn contract_declarations(&self) -> Result<Vec<ContractDeclaration>, SourceError> {
        Ok(self.contracts.clone())
    }

    fn service_declarations(&self) -> Result<Vec<ServiceDeclaration>, SourceError> {
        Ok(self.services.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Link-time declaration entry.
///
/// Crates submit entries with `inventory::submit!` and
/// [`InventorySource`] collects them:
///
/// ```rust,ignore
/// inventory::submit! {
///     DeclarationEntry {
///         name: "logging",
///         contracts: || vec![ContractDeclaration::of::<dyn Logger>().singleton()],
///         services: || vec![ServiceDeclaration::implementation::<ConsoleLogger, dyn Logger>()],
///     }
/// }
/// ```
pub struct DeclarationEntry {
    /// Unique entry name; entries are enumerated in name order
    pub name: &'static str,
    pub contracts: fn() -> Vec<ContractDeclaration>,
    pub services: fn() -> Vec<ServiceDeclaration>,
}

inventory::collect!(DeclarationEntry);

/// Source over every [`DeclarationEntry`] submitted in the binary.
///
/// Link order is unspecified, so entries are visited sorted by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventorySource;

impl InventorySource {
    fn entries() -> Vec<&'static DeclarationEntry> {
        let mut entries: Vec<&'static DeclarationEntry> =
            inventory::iter::<DeclarationEntry>().collect();
        entries.sort_by_key(|entry| entry.name);
        entries
    }

    /// Names of all submitted entries, sorted.
    pub fn entry_names() -> Vec<&'static str> {
        Self::entries().into_iter().map(|entry| entry.name).collect()
    }
}

impl DeclarationSource for InventorySource {
    fn contract_declarations(&self) -> Result<Vec<ContractDeclaration>, SourceError> {
        Ok(Self::entries()
            .into_iter()
            .flat_map(|entry| (entry.contracts)())
            .collect())
    }

    fn service_declarations(&self) -> Result<Vec<ServiceDeclaration>, SourceError> {
        Ok(Self::entries()
            .into_iter()
            .flat_map(|entry| (entry.services)())
            .collect())
    }

    fn name(&self) -> &str {
        "inventory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Marker;

    fn marker_contracts() -> Vec<ContractDeclaration> {
        vec![ContractDeclaration::of::<Marker>().singleton()]
    }

    fn marker_services() -> Vec<ServiceDeclaration> {
        vec![ServiceDeclaration::instance::<Marker>(Arc::new(Marker))]
    }

    inventory::submit! {
        DeclarationEntry {
            name: "source-tests::marker",
            contracts: marker_contracts,
            services: marker_services,
        }
    }

    struct NamedSource;

    impl DeclarationSource for NamedSource {
        fn contract_declarations(&self) -> Result<Vec<ContractDeclaration>, SourceError> {
            Ok(vec![])
        }

        fn service_declarations(&self) -> Result<Vec<ServiceDeclaration>, SourceError> {
            Err("scan failed".into())
        }
    }

    #[test]
    fn static_source_returns_declarations_in_order() {
        let source = StaticSource::new("static")
            .with_contract(ContractDeclaration::of::<u8>())
            .with_contract(ContractDeclaration::of::<u16>());

        let contracts = source.contract_declarations().unwrap();
        assert_eq!(contracts.len(), 2);
        assert!(contracts[0].contract.display_name().contains("u8"));
        assert_eq!(source.name(), "static");
    }

    #[test]
    fn default_name_is_type_name() {
        assert!(NamedSource.name().contains("NamedSource"));
        assert!(NamedSource.service_declarations().is_err());
    }

    #[test]
    fn inventory_source_collects_submitted_entries() {
        assert!(InventorySource::entry_names().contains(&"source-tests::marker"));

        let contracts = InventorySource.contract_declarations().unwrap();
        assert!(
            contracts
                .iter()
                .any(|c| c.contract.display_name().ends_with("Marker"))
        );
        let services = InventorySource.service_declarations().unwrap();
        assert!(!services.is_empty());
    }
}
