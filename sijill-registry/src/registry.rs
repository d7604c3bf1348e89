//! The finished registry — every contract mapped to its bindings.
//!
//! A [`Registry`] is produced once by the builder and never mutated
//! afterwards. Reads need no locking; hosts that load plugins later build
//! a new registry and install it through a [`RegistryHandle`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::binding::Binding;
use crate::canonical::TypeKey;
use crate::resolve::ResolvedContract;

/// Bindings registered for one contract.
#[derive(Debug, Clone)]
pub enum RegistryEntry {
    /// Single-instance contract.
    Single(Binding),
    /// Multi-instance contract, in resolution order.
    Multiple(Vec<Binding>),
}

impl RegistryEntry {
    pub fn bindings(&self) -> &[Binding] {
        match self {
            RegistryEntry::Single(binding) => std::slice::from_ref(binding),
            RegistryEntry::Multiple(bindings) => bindings,
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, RegistryEntry::Multiple(_))
    }
}

/// Immutable map from canonical contract to bindings.
///
/// Safe for unsynchronized concurrent reads.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<TypeKey, RegistryEntry>,
    binding_count: usize,
}

impl Registry {
    /// Freezes resolved contracts. Binding ids follow contract order.
    pub(crate) fn from_resolved(resolved: Vec<ResolvedContract>) -> Self {
        let mut entries = BTreeMap::new();
        let mut next_id = 0;

        for contract in resolved {
            let mut bindings = contract.bindings;
            for binding in &mut bindings {
                binding.id = next_id;
                next_id += 1;
            }

            let entry = if contract.allow_multiple {
                RegistryEntry::Multiple(bindings)
            } else {
                match bindings.pop() {
                    Some(binding) => RegistryEntry::Single(binding),
                    None => continue,
                }
            };
            debug!(contract = %contract.contract, bindings = entry.bindings().len(), "Registered contract");
            entries.insert(contract.contract, entry);
        }

        Self {
            entries,
            binding_count: next_id,
        }
    }

    /// A registry without any contract.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up the entry serving `contract`.
    ///
    /// A closed generic request falls back to its open definition.
    pub fn get(&self, contract: &TypeKey) -> Option<&RegistryEntry> {
        if let Some(entry) = self.entries.get(contract) {
            return Some(entry);
        }
        let definition = contract.generic_definition()?;
        let entry = self.entries.get(&definition)?;
        trace!(requested = %contract, definition = %definition, "Falling back to open generic contract");
        Some(entry)
    }

    /// Bindings that can serve a request for `contract`, in order.
    ///
    /// Entries of open generic contracts only contribute bindings declared
    /// for the requested closed form or for the open definition.
    pub fn bindings_for(&self, contract: &TypeKey) -> Vec<&Binding> {
        self.get(contract)
            .map(|entry| {
                entry
                    .bindings()
                    .iter()
                    .filter(|binding| binding.serves(contract))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The single binding of a single-instance contract.
    pub fn single(&self, contract: &TypeKey) -> Option<&Binding> {
        match self.get(contract)? {
            RegistryEntry::Single(binding) if binding.serves(contract) => Some(binding),
            _ => None,
        }
    }

    /// Returns `true` if some binding serves `contract`.
    pub fn contains(&self, contract: &TypeKey) -> bool {
        !self.bindings_for(contract).is_empty()
    }

    /// Registered contracts, sorted.
    pub fn contracts(&self) -> impl Iterator<Item = &TypeKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &RegistryEntry)> {
        self.entries.iter()
    }

    /// Number of contracts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of bindings across all contracts.
    pub fn binding_count(&self) -> usize {
        self.binding_count
    }
}

/// Shared reference to the current registry.
///
/// Readers take a snapshot with [`load`](Self::load) and keep it for the
/// whole resolution; [`swap`](Self::swap) only affects later loads.
#[derive(Debug)]
pub struct RegistryHandle {
    current: RwLock<Arc<Registry>>,
}

impl RegistryHandle {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            current: RwLock::new(registry),
        }
    }

    /// Snapshot of the current registry.
    pub fn load(&self) -> Arc<Registry> {
        Arc::clone(&self.current.read())
    }

    /// Installs `registry` and returns the previous one.
    pub fn swap(&self, registry: Arc<Registry>) -> Arc<Registry> {
        let mut current = self.current.write();
        debug!(
            previous = current.binding_count(),
            next = registry.binding_count(),
            "Swapping registry"
        );
        std::mem::replace(&mut *current, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::declaration::{ContractDeclaration, ServiceDeclaration};
    use crate::resolve::ConflictResolver;
    use crate::source::{DeclarationSource, StaticSource};

    trait Plugin: Send + Sync {}
    struct Audit;
    impl Plugin for Audit {}

    #[allow(dead_code)]
    struct Cache<T>(T);

    fn registry(source: StaticSource) -> Registry {
        let sources: Vec<Arc<dyn DeclarationSource>> = vec![Arc::new(source)];
        let aggregation = Aggregator::default().aggregate(&sources).unwrap();
        Registry::from_resolved(ConflictResolver::default().resolve(aggregation).unwrap())
    }

    fn sample() -> Registry {
        registry(
            StaticSource::new("sample")
                .with_contract(ContractDeclaration::of::<dyn Plugin>().allow_multiple())
                .with_contract(ContractDeclaration::of::<String>())
                .with_contract(ContractDeclaration::open_generic_of::<Cache<()>>())
                .with_service(ServiceDeclaration::instance::<dyn Plugin>(Arc::new(Audit)))
                .with_service(ServiceDeclaration::instance::<dyn Plugin>(Arc::new(Audit)))
                .with_service(ServiceDeclaration::instance::<String>(Arc::new("db".into())))
                .with_service(ServiceDeclaration::instance::<Cache<u8>>(Arc::new(Cache(1)))),
        )
    }

    #[test]
    fn entries_keep_multiplicity() {
        let registry = sample();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.binding_count(), 4);

        let plugins = registry.get(&TypeKey::of::<dyn Plugin>()).unwrap();
        assert!(plugins.is_multiple());
        assert_eq!(plugins.bindings().len(), 2);
        assert!(registry.single(&TypeKey::of::<dyn Plugin>()).is_none());
        assert!(registry.single(&TypeKey::of::<String>()).is_some());
    }

    #[test]
    fn binding_ids_are_unique() {
        let registry = sample();
        let mut ids: Vec<usize> = registry
            .iter()
            .flat_map(|(_, entry)| entry.bindings().iter().map(Binding::id))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..registry.binding_count()).collect::<Vec<_>>());
    }

    #[test]
    fn closed_generic_lookup_uses_open_entry() {
        let registry = sample();
        assert!(registry.contains(&TypeKey::of::<Cache<u8>>()));
        assert!(!registry.contains(&TypeKey::of::<Cache<i64>>()));
        assert!(registry.get(&TypeKey::of::<Cache<i64>>()).is_some());
    }

    #[test]
    fn unknown_contract_is_absent() {
        let registry = sample();
        assert!(registry.get(&TypeKey::of::<u64>()).is_none());
        assert!(registry.bindings_for(&TypeKey::of::<u64>()).is_empty());
        assert!(Registry::empty().is_empty());
    }

    #[test]
    fn registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
        assert_send_sync::<RegistryHandle>();
    }

    #[test]
    fn swap_leaves_snapshots_untouched() {
        let handle = RegistryHandle::new(Arc::new(sample()));
        let snapshot = handle.load();

        let previous = handle.swap(Arc::new(Registry::empty()));
        assert!(Arc::ptr_eq(&previous, &snapshot));
        assert_eq!(snapshot.len(), 3);
        assert!(handle.load().is_empty());
    }
}
