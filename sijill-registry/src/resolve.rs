//! Conflict resolution.
//!
//! Groups the aggregated declarations by contract and settles every group:
//!
//! 1. Contract declarations compete first; the governing declaration
//!    decides lifetime, multiplicity and open-generic handling.
//! 2. Multi-instance contracts keep every service, ordered by override
//!    priority, processing priority, then discovery order.
//! 3. Single-instance contracts pick one winner according to the
//!    [`AmbiguityStrategy`]; anything that cannot be settled is an error.

use std::collections::BTreeMap;

use tracing::{debug, instrument, trace};

use crate::aggregate::{Aggregation, DeclaredContract, DeclaredService};
use crate::binding::Binding;
use crate::canonical::TypeKey;
use crate::error::{
    AmbiguousBindingError, AmbiguousContractError, Candidate, InvalidContractError,
    InvalidContractReason, Result, SijillError,
};
use crate::lifetime::Lifetime;
use crate::settings::AmbiguityStrategy;

/// A contract with its settled bindings.
#[derive(Debug, Clone)]
pub struct ResolvedContract {
    pub contract: TypeKey,
    pub lifetime: Lifetime,
    pub allow_multiple: bool,
    pub open_generic: bool,
    /// Exactly one binding unless `allow_multiple`. This also holds for
    /// single-instance open generic contracts: their closed forms compete,
    /// and the contract serves only the winner's closed form.
    pub bindings: Vec<Binding>,
}

/// Settles competing declarations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    strategy: AmbiguityStrategy,
}

impl ConflictResolver {
    pub fn new(strategy: AmbiguityStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AmbiguityStrategy {
        self.strategy
    }

    /// Resolves the aggregation into one entry per referenced contract.
    ///
    /// Contracts without services are left out. The result is sorted by
    /// contract key.
    ///
    /// # Errors
    /// - [`SijillError::AmbiguousContract`] — contract declarations tie
    /// - [`SijillError::AmbiguousBinding`] — services tie for a single contract
    /// - [`SijillError::InvalidContract`] — a service targets an undeclared contract
    #[instrument(skip_all, fields(strategy = %self.strategy), name = "resolve")]
    pub fn resolve(&self, aggregation: Aggregation) -> Result<Vec<ResolvedContract>> {
        let Aggregation {
            contracts, services, ..
        } = aggregation;

        let mut declarations: BTreeMap<TypeKey, Vec<DeclaredContract>> = BTreeMap::new();
        for declaration in contracts {
            declarations
                .entry(declaration.contract.clone())
                .or_default()
                .push(declaration);
        }

        let mut governing: BTreeMap<TypeKey, DeclaredContract> = BTreeMap::new();
        for (contract, candidates) in declarations {
            let winner = self.govern(&contract, candidates)?;
            governing.insert(contract, winner);
        }

        let mut groups: BTreeMap<TypeKey, Vec<DeclaredService>> = BTreeMap::new();
        for service in services {
            let key = group_key(&service.contract, &governing).ok_or_else(|| {
                SijillError::InvalidContract(InvalidContractError {
                    declaration: service.describe(),
                    source_name: service.source.to_string(),
                    reason: InvalidContractReason::Undeclared(service.contract.clone()),
                })
            })?;
            groups.entry(key).or_default().push(service);
        }

        let mut resolved = Vec::with_capacity(groups.len());
        for (key, mut candidates) in groups {
            let Some(contract) = governing.get(&key) else {
                continue;
            };
            candidates.sort_by_key(|service| service.discovery);

            let winners = if contract.allow_multiple {
                candidates.sort_by_key(|service| {
                    (service.override_priority, service.processing_priority, service.discovery)
                });
                candidates
            } else {
                vec![self.pick(&key, candidates)?]
            };

            let bindings: Vec<Binding> = winners
                .into_iter()
                .map(|service| Binding::resolve(contract, service))
                .collect();

            debug!(
                contract = %key,
                lifetime = %contract.lifetime,
                allow_multiple = contract.allow_multiple,
                bindings = bindings.len(),
                "Resolved contract"
            );

            resolved.push(ResolvedContract {
                contract: key,
                lifetime: contract.lifetime,
                allow_multiple: contract.allow_multiple,
                open_generic: contract.open_generic,
                bindings,
            });
        }

        Ok(resolved)
    }

    /// Picks the governing declaration of one contract.
    ///
    /// The lowest override priority governs. Tied declarations with
    /// equivalent settings are merged instead of reported, so a contract
    /// declared identically by two sources is fine.
    fn govern(
        &self,
        contract: &TypeKey,
        mut candidates: Vec<DeclaredContract>,
    ) -> Result<DeclaredContract> {
        candidates.sort_by_key(|declaration| (declaration.override_priority, declaration.discovery));

        let contenders: Vec<DeclaredContract> = match self.strategy {
            AmbiguityStrategy::UseFirst => {
                candidates.sort_by_key(|declaration| declaration.discovery);
                candidates.truncate(1);
                candidates
            }
            AmbiguityStrategy::ForcePriority | AmbiguityStrategy::Strict => {
                let best = candidates[0].override_priority;
                candidates
                    .into_iter()
                    .take_while(|declaration| declaration.override_priority == best)
                    .collect()
            }
        };

        let mut contenders = contenders.into_iter();
        let Some(mut winner) = contenders.next() else {
            unreachable!("contract groups are never empty");
        };

        let rest: Vec<DeclaredContract> = contenders.collect();
        if rest.iter().any(|other| !equivalent(&winner, other)) {
            let mut all = vec![winner];
            all.extend(rest);
            return Err(SijillError::AmbiguousContract(AmbiguousContractError {
                contract: contract.clone(),
                strategy: self.strategy,
                candidates: all.iter().map(contract_candidate).collect(),
            }));
        }

        for other in &rest {
            trace!(contract = %contract, source = %other.source, "Merging equivalent contract declaration");
            winner.metadata.merge(&other.metadata);
        }

        Ok(winner)
    }

    /// Picks the winning service of a single-instance contract.
    ///
    /// `candidates` are in discovery order.
    fn pick(&self, contract: &TypeKey, mut candidates: Vec<DeclaredService>) -> Result<DeclaredService> {
        if candidates.len() == 1 {
            return Ok(candidates.remove(0));
        }

        match self.strategy {
            AmbiguityStrategy::UseFirst => {
                let winner = candidates.remove(0);
                debug!(contract = %contract, winner = %winner.describe(), "First declaration wins");
                Ok(winner)
            }
            AmbiguityStrategy::Strict => Err(self.ambiguous(contract, &candidates)),
            AmbiguityStrategy::ForcePriority => {
                let best = candidates
                    .iter()
                    .map(|service| service.override_priority)
                    .min()
                    .unwrap_or_default();
                let tied = candidates
                    .iter()
                    .filter(|service| service.override_priority == best)
                    .count();

                if tied > 1 {
                    let tied: Vec<DeclaredService> = candidates
                        .into_iter()
                        .filter(|service| service.override_priority == best)
                        .collect();
                    return Err(self.ambiguous(contract, &tied));
                }

                let index = candidates
                    .iter()
                    .position(|service| service.override_priority == best)
                    .unwrap_or(0);
                let winner = candidates.remove(index);
                for loser in &candidates {
                    trace!(
                        contract = %contract,
                        loser = %loser.describe(),
                        priority = %loser.override_priority,
                        "Overridden"
                    );
                }
                debug!(
                    contract = %contract,
                    winner = %winner.describe(),
                    priority = %winner.override_priority,
                    "Lowest override priority wins"
                );
                Ok(winner)
            }
        }
    }

    fn ambiguous(&self, contract: &TypeKey, candidates: &[DeclaredService]) -> SijillError {
        SijillError::AmbiguousBinding(AmbiguousBindingError {
            contract: contract.clone(),
            strategy: self.strategy,
            candidates: candidates.iter().map(service_candidate).collect(),
        })
    }
}

/// The group a service belongs to: its own contract if declared, else the
/// open generic definition if that is declared open-generic.
///
/// Every closed form of an open definition lands in the same group, so
/// `Store<i32>` and `Store<u8>` compete unless the definition allows
/// multiple bindings.
fn group_key(contract: &TypeKey, governing: &BTreeMap<TypeKey, DeclaredContract>) -> Option<TypeKey> {
    if governing.contains_key(contract) {
        return Some(contract.clone());
    }
    let definition = contract.generic_definition()?;
    governing
        .get(&definition)
        .filter(|declaration| declaration.open_generic)
        .map(|_| definition)
}

fn equivalent(a: &DeclaredContract, b: &DeclaredContract) -> bool {
    a.lifetime == b.lifetime && a.allow_multiple == b.allow_multiple && a.open_generic == b.open_generic
}

fn contract_candidate(declaration: &DeclaredContract) -> Candidate {
    Candidate {
        name: format!(
            "{} ({}, allow_multiple={})",
            declaration.contract, declaration.lifetime, declaration.allow_multiple
        ),
        priority: declaration.override_priority,
        source: declaration.source.clone(),
        discovery: declaration.discovery,
    }
}

fn service_candidate(service: &DeclaredService) -> Candidate {
    Candidate {
        name: service.describe(),
        priority: service.override_priority,
        source: service.source.clone(),
        discovery: service.discovery,
    }
}
