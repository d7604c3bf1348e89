//! Injection constructor selection.

use tracing::{debug, trace};

use crate::canonical::TypeKey;
use crate::declaration::{ConstructorInfo, InstancingStrategy};
use crate::error::{AmbiguousConstructorError, Result, SijillError};
use crate::resolve::ResolvedContract;

/// Picks the injection constructor of implementation types.
///
/// Only public constructors are considered. Exactly one marked constructor
/// is selected; several marked constructors are a build error; no marked
/// constructor leaves the choice to the backing engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstructorSelector;

impl ConstructorSelector {
    pub fn new() -> Self {
        Self
    }

    /// Selects the marked constructor among `constructors`.
    ///
    /// # Errors
    /// [`SijillError::AmbiguousConstructor`] if more than one public
    /// constructor is marked.
    pub fn select(
        &self,
        implementation: &TypeKey,
        constructors: &[ConstructorInfo],
        contract: &TypeKey,
    ) -> Result<Option<ConstructorInfo>> {
        let marked: Vec<&ConstructorInfo> = constructors
            .iter()
            .filter(|ctor| ctor.is_public() && ctor.is_injection())
            .collect();

        match marked.as_slice() {
            [] => {
                trace!(implementation = %implementation, "No injection constructor marked");
                Ok(None)
            }
            [ctor] => Ok(Some((*ctor).clone())),
            _ => Err(SijillError::AmbiguousConstructor(AmbiguousConstructorError {
                implementation: implementation.clone(),
                contract: contract.clone(),
                constructors: marked.iter().map(|ctor| ctor.signature()).collect(),
            })),
        }
    }

    /// Selects constructors for every type binding in `resolved`.
    pub(crate) fn apply(&self, resolved: &mut [ResolvedContract]) -> Result<()> {
        for contract in resolved.iter_mut() {
            for binding in &mut contract.bindings {
                let InstancingStrategy::Type(implementation) = &binding.strategy else {
                    continue;
                };
                let Some(key) = &binding.implementation else {
                    continue;
                };

                let selected =
                    self.select(key, implementation.constructors(), &binding.declared_contract)?;
                if let Some(ctor) = &selected {
                    debug!(
                        implementation = %key,
                        constructor = %ctor.signature(),
                        "Selected injection constructor"
                    );
                }
                binding.constructor = selected;
            }
        }
        Ok(())
    }
}
