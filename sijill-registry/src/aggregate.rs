//! Declaration aggregation.
//!
//! Flattens the declarations of every source into one list, in source
//! order, canonicalizing every type on the way. Nothing is resolved here:
//! conflicting declarations pass through untouched for the
//! [`ConflictResolver`](crate::resolve::ConflictResolver).

use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use crate::canonical::{TypeCanonicalizer, TypeKey};
use crate::declaration::{ContractDeclaration, InstancingStrategy, ServiceDeclaration};
use crate::error::{InvalidContractError, InvalidContractReason, Result, SijillError};
use crate::lifetime::Lifetime;
use crate::metadata::Metadata;
use crate::priority::Priority;
use crate::source::DeclarationSource;

/// A canonicalized contract declaration.
#[derive(Debug, Clone)]
pub struct DeclaredContract {
    pub contract: TypeKey,
    pub lifetime: Lifetime,
    pub allow_multiple: bool,
    pub open_generic: bool,
    pub metadata: Metadata,
    pub override_priority: Priority,
    /// Name of the declaring source
    pub source: Arc<str>,
    /// Global discovery index
    pub discovery: usize,
}

/// A canonicalized service declaration.
#[derive(Debug, Clone)]
pub struct DeclaredService {
    pub contract: TypeKey,
    /// Canonical implementation type for [`InstancingStrategy::Type`]
    pub implementation: Option<TypeKey>,
    pub strategy: InstancingStrategy,
    pub lifetime: Option<Lifetime>,
    pub override_priority: Priority,
    pub processing_priority: Priority,
    pub metadata: Metadata,
    pub externally_owned: bool,
    pub source: Arc<str>,
    pub discovery: usize,
}

impl DeclaredService {
    /// Implementation key, or the strategy name for factories and instances.
    pub fn describe(&self) -> String {
        match &self.implementation {
            Some(implementation) => implementation.to_string(),
            None => self.strategy.name().to_string(),
        }
    }
}

/// Everything the sources declared, flattened and canonicalized.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub contracts: Vec<DeclaredContract>,
    pub services: Vec<DeclaredService>,
    next_discovery: usize,
}

impl Aggregation {
    fn next_discovery(&mut self) -> usize {
        let index = self.next_discovery;
        self.next_discovery += 1;
        index
    }
}

/// Raw output of one source.
struct SourceBatch {
    name: Arc<str>,
    contracts: Vec<ContractDeclaration>,
    services: Vec<ServiceDeclaration>,
}

fn enumerate(source: &dyn DeclarationSource) -> Result<SourceBatch> {
    let name = source.name().to_string();
    trace!(source = %name, "Enumerating declaration source");

    let discovery_error = |err| SijillError::Discovery {
        source_name: name.clone(),
        source: err,
    };
    let contracts = source.contract_declarations().map_err(discovery_error)?;
    let services = source.service_declarations().map_err(discovery_error)?;

    Ok(SourceBatch {
        name: Arc::from(name.as_str()),
        contracts,
        services,
    })
}

/// Collects and canonicalizes declarations from ordered sources.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    canonicalizer: TypeCanonicalizer,
}

impl Aggregator {
    pub fn new(canonicalizer: TypeCanonicalizer) -> Self {
        Self { canonicalizer }
    }

    /// Visits every source once, in the given order.
    ///
    /// # Errors
    /// - [`SijillError::Discovery`] — a source failed to enumerate
    /// - [`SijillError::InvalidContract`] — a service declares no contract
    #[instrument(skip_all, fields(sources = sources.len()), name = "aggregate")]
    pub fn aggregate(&self, sources: &[Arc<dyn DeclarationSource>]) -> Result<Aggregation> {
        let mut aggregation = Aggregation::default();
        for source in sources {
            let batch = enumerate(source.as_ref())?;
            self.absorb(&mut aggregation, batch)?;
        }
        debug!(
            contracts = aggregation.contracts.len(),
            services = aggregation.services.len(),
            "Declarations aggregated"
        );
        Ok(aggregation)
    }

    /// Like [`aggregate`](Self::aggregate), but enumerates sources
    /// concurrently on the blocking thread pool.
    ///
    /// Results are joined in source order, so the outcome is identical to
    /// the sequential pass.
    #[cfg(feature = "async")]
    #[instrument(skip_all, fields(sources = sources.len()), name = "aggregate_parallel")]
    pub async fn aggregate_parallel(
        &self,
        sources: &[Arc<dyn DeclarationSource>],
    ) -> Result<Aggregation> {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let name = source.name().to_string();
                let source = Arc::clone(source);
                let handle = tokio::task::spawn_blocking(move || enumerate(source.as_ref()));
                (name, handle)
            })
            .collect();

        let mut aggregation = Aggregation::default();
        for (name, handle) in handles {
            let batch = handle.await.map_err(|err| SijillError::Discovery {
                source_name: name,
                source: Box::new(err),
            })??;
            self.absorb(&mut aggregation, batch)?;
        }
        debug!(
            contracts = aggregation.contracts.len(),
            services = aggregation.services.len(),
            "Declarations aggregated"
        );
        Ok(aggregation)
    }

    fn absorb(&self, aggregation: &mut Aggregation, batch: SourceBatch) -> Result<()> {
        let SourceBatch {
            name,
            contracts,
            services,
        } = batch;

        for declaration in contracts {
            let discovery = aggregation.next_discovery();
            if let Some(contract) = self.canonical_contract(&name, declaration, discovery) {
                aggregation.contracts.push(contract);
            }
        }

        for declaration in services {
            let discovery = aggregation.next_discovery();
            if let Some(service) = self.canonical_service(&name, declaration, discovery)? {
                aggregation.services.push(service);
            }
        }

        Ok(())
    }

    fn canonical_contract(
        &self,
        source: &Arc<str>,
        declaration: ContractDeclaration,
        discovery: usize,
    ) -> Option<DeclaredContract> {
        let mut contract = match self.canonicalizer.canonicalize(&declaration.contract) {
            Ok(contract) => contract,
            Err(err) => {
                warn!(source = %source, error = %err, "Skipping contract declaration");
                return None;
            }
        };

        let mut open_generic = declaration.open_generic || contract.is_open_generic();
        if open_generic {
            if let Some(definition) = contract.generic_definition() {
                contract = definition;
            } else if !contract.is_open_generic() {
                warn!(
                    source = %source,
                    contract = %contract,
                    "Contract declared open-generic but has no generic parameters"
                );
                open_generic = false;
            }
        }

        trace!(source = %source, contract = %contract, discovery, "Declared contract");
        Some(DeclaredContract {
            contract,
            lifetime: declaration.lifetime,
            allow_multiple: declaration.allow_multiple,
            open_generic,
            metadata: declaration.metadata,
            override_priority: declaration.override_priority,
            source: Arc::clone(source),
            discovery,
        })
    }

    fn canonical_service(
        &self,
        source: &Arc<str>,
        declaration: ServiceDeclaration,
        discovery: usize,
    ) -> Result<Option<DeclaredService>> {
        let Some(contract_descriptor) = &declaration.contract else {
            return Err(SijillError::InvalidContract(InvalidContractError {
                declaration: declaration.strategy.name().to_string(),
                source_name: source.to_string(),
                reason: InvalidContractReason::Missing,
            }));
        };

        let contract = match self.canonicalizer.canonicalize(contract_descriptor) {
            Ok(contract) => contract,
            Err(err) => {
                warn!(
                    source = %source,
                    service = declaration.strategy.name(),
                    error = %err,
                    "Skipping service declaration"
                );
                return Ok(None);
            }
        };

        let implementation = match &declaration.strategy {
            InstancingStrategy::Type(implementation) => {
                match self.canonicalizer.canonicalize(implementation.descriptor()) {
                    Ok(key) => Some(key),
                    Err(err) => {
                        warn!(
                            source = %source,
                            contract = %contract,
                            error = %err,
                            "Skipping service declaration"
                        );
                        return Ok(None);
                    }
                }
            }
            _ => None,
        };

        trace!(source = %source, contract = %contract, discovery, "Declared service");
        Ok(Some(DeclaredService {
            contract,
            implementation,
            strategy: declaration.strategy,
            lifetime: declaration.lifetime,
            override_priority: declaration.override_priority,
            processing_priority: declaration.processing_priority,
            metadata: declaration.metadata,
            externally_owned: declaration.externally_owned,
            source: Arc::clone(source),
            discovery,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::TypeDescriptor;
    use crate::declaration::{ConstructorInfo, ImplementationType};
    use crate::error::SourceError;
    use crate::source::StaticSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Clock;

    fn sources(list: Vec<StaticSource>) -> Vec<Arc<dyn DeclarationSource>> {
        list.into_iter()
            .map(|s| Arc::new(s) as Arc<dyn DeclarationSource>)
            .collect()
    }

    struct FailingSource;

    impl DeclarationSource for FailingSource {
        fn contract_declarations(&self) -> std::result::Result<Vec<ContractDeclaration>, SourceError> {
            Err("plugin directory missing".into())
        }

        fn service_declarations(&self) -> std::result::Result<Vec<ServiceDeclaration>, SourceError> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct CountingSource(AtomicUsize);

    impl DeclarationSource for CountingSource {
        fn contract_declarations(&self) -> std::result::Result<Vec<ContractDeclaration>, SourceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        fn service_declarations(&self) -> std::result::Result<Vec<ServiceDeclaration>, SourceError> {
            Ok(vec![])
        }
    }

    #[test]
    fn discovery_order_follows_source_order() {
        let first = StaticSource::new("first")
            .with_service(ServiceDeclaration::instance::<Clock>(Arc::new(Clock)));
        let second = StaticSource::new("second")
            .with_contract(ContractDeclaration::of::<Clock>())
            .with_service(ServiceDeclaration::instance::<Clock>(Arc::new(Clock)));

        let aggregation = Aggregator::default()
            .aggregate(&sources(vec![first, second]))
            .unwrap();

        assert_eq!(aggregation.services.len(), 2);
        assert_eq!(&*aggregation.services[0].source, "first");
        assert_eq!(&*aggregation.services[1].source, "second");
        assert!(aggregation.services[0].discovery < aggregation.contracts[0].discovery);
        assert!(aggregation.contracts[0].discovery < aggregation.services[1].discovery);
    }

    #[test]
    fn source_error_aborts() {
        let list: Vec<Arc<dyn DeclarationSource>> = vec![
            Arc::new(StaticSource::new("ok")),
            Arc::new(FailingSource),
        ];

        match Aggregator::default().aggregate(&list).unwrap_err() {
            SijillError::Discovery { source_name, .. } => assert_eq!(source_name, "failing"),
            other => panic!("Expected Discovery, got: {other:?}"),
        }
    }

    #[test]
    fn each_source_enumerated_once() {
        let counting = Arc::new(CountingSource(AtomicUsize::new(0)));
        let list: Vec<Arc<dyn DeclarationSource>> = vec![counting.clone()];

        Aggregator::default().aggregate(&list).unwrap();
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_contract_is_fatal() {
        let source = StaticSource::new("broken").with_service(ServiceDeclaration::new(
            InstancingStrategy::instance::<Clock>(Arc::new(Clock)),
            None,
        ));

        match Aggregator::default().aggregate(&sources(vec![source])).unwrap_err() {
            SijillError::InvalidContract(err) => {
                assert_eq!(err.reason, InvalidContractReason::Missing);
                assert_eq!(err.source_name, "broken");
                assert!(err.declaration.contains("Clock"));
            }
            other => panic!("Expected InvalidContract, got: {other:?}"),
        }
    }

    #[test]
    fn unresolved_types_are_skipped() {
        let source = StaticSource::new("plugins")
            .with_contract(ContractDeclaration::new(TypeDescriptor::unresolved(
                "plugin::Gone",
                "not loaded",
            )))
            .with_service(
                ServiceDeclaration::instance::<Clock>(Arc::new(Clock))
                    .for_contract(TypeDescriptor::path("plugin::Broken<")),
            )
            .with_service(ServiceDeclaration::new(
                InstancingStrategy::Type(ImplementationType::described(
                    TypeDescriptor::unresolved("plugin::Impl", "not loaded"),
                    vec![ConstructorInfo::new("new")],
                )),
                Some(TypeDescriptor::of::<Clock>()),
            ))
            .with_service(ServiceDeclaration::instance::<Clock>(Arc::new(Clock)));

        let aggregation = Aggregator::default().aggregate(&sources(vec![source])).unwrap();
        assert!(aggregation.contracts.is_empty());
        assert_eq!(aggregation.services.len(), 1);
    }

    #[test]
    fn open_generic_contract_uses_definition() {
        #[allow(dead_code)]
        struct Cache<T>(T);

        let source = StaticSource::new("generic")
            .with_contract(ContractDeclaration::of::<Cache<u8>>().open_generic());

        let aggregation = Aggregator::default().aggregate(&sources(vec![source])).unwrap();
        let contract = &aggregation.contracts[0];
        assert!(contract.open_generic);
        assert!(contract.contract.is_open_generic());
        assert!(contract.contract.as_str().ends_with("Cache<_>"));
    }

    #[test]
    fn implementation_keys_are_canonical() {
        let canonicalizer = TypeCanonicalizer::new().with_module_alias("facade", "core_impl");
        let source = StaticSource::new("aliases").with_service(ServiceDeclaration::new(
            InstancingStrategy::Type(ImplementationType::described(
                TypeDescriptor::path("facade::SmtpMailer"),
                vec![],
            )),
            Some(TypeDescriptor::path("facade::Mailer")),
        ));

        let aggregation = Aggregator::new(canonicalizer)
            .aggregate(&sources(vec![source]))
            .unwrap();
        let service = &aggregation.services[0];
        assert_eq!(service.contract.as_str(), "core_impl::Mailer");
        assert_eq!(service.describe(), "core_impl::SmtpMailer");
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn parallel_aggregation_preserves_order() {
        let list = sources(
            (0..8)
                .map(|i| {
                    StaticSource::new(format!("source-{i}"))
                        .with_service(ServiceDeclaration::instance::<Clock>(Arc::new(Clock)))
                })
                .collect(),
        );

        let parallel = Aggregator::default().aggregate_parallel(&list).await.unwrap();
        let sequential = Aggregator::default().aggregate(&list).unwrap();

        let order = |a: &Aggregation| -> Vec<(String, usize)> {
            a.services.iter().map(|s| (s.source.to_string(), s.discovery)).collect()
        };
        assert_eq!(order(&parallel), order(&sequential));
        assert_eq!(&*parallel.services[0].source, "source-0");
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn parallel_aggregation_reports_failures() {
        let list: Vec<Arc<dyn DeclarationSource>> = vec![Arc::new(FailingSource)];
        assert!(Aggregator::default().aggregate_parallel(&list).await.is_err());
    }
}
