//! The boundary between the registry and whatever instantiates services.
//!
//! A [`BackingEngine`] receives the finished, read-only
//! [`Registry`](crate::registry::Registry) and produces a [`Resolver`].
//! [`Container`](crate::container::Container) is the engine shipped with
//! this crate; any other engine only has to implement these traits.

use std::any::type_name;
use std::sync::Arc;

use crate::canonical::TypeKey;
use crate::declaration::{Instance, downcast_instance};
use crate::error::{Result, SijillError};
use crate::registry::Registry;

/// Resolves contracts to type-erased instances.
///
/// This is what factories and constructor activators receive to resolve
/// their own dependencies.
pub trait Resolver: Send + Sync {
    /// Resolves the single binding of `contract`.
    ///
    /// # Errors
    /// Fails if the contract is unknown or allows multiple bindings.
    fn resolve_key(&self, contract: &TypeKey) -> Result<Instance>;

    /// Resolves every binding of `contract`, in registry order.
    ///
    /// Unknown contracts yield an empty list.
    fn resolve_many_key(&self, contract: &TypeKey) -> Result<Vec<Instance>>;

    /// Returns `true` if the registry holds bindings for `contract`.
    fn is_registered(&self, contract: &TypeKey) -> bool;
}

/// Typed resolution on top of [`Resolver`].
///
/// ```rust,ignore
/// let logger: Arc<dyn Logger> = resolver.resolve::<dyn Logger>()?;
/// let validators: Vec<Arc<dyn Validator>> = resolver.resolve_many::<dyn Validator>()?;
/// ```
pub trait ResolverExt: Resolver {
    fn resolve<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        let contract = TypeKey::of::<C>();
        let instance = self.resolve_key(&contract)?;
        downcast_instance::<C>(&instance).ok_or(SijillError::TypeMismatch {
            contract,
            expected: type_name::<C>(),
        })
    }

    fn resolve_many<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<C>>> {
        let contract = TypeKey::of::<C>();
        self.resolve_many_key(&contract)?
            .iter()
            .map(|instance| {
                downcast_instance::<C>(instance).ok_or_else(|| SijillError::TypeMismatch {
                    contract: contract.clone(),
                    expected: type_name::<C>(),
                })
            })
            .collect()
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

/// Turns a finished registry into a ready resolver.
pub trait BackingEngine {
    type Output;

    /// Takes shared ownership of `registry` for the rest of the process.
    fn build(&self, registry: Arc<Registry>) -> Result<Self::Output>;
}
