//! Declarations produced by sources.
//!
//! A [`ContractDeclaration`] says how a contract behaves by default
//! (lifetime, multiplicity, open-generic, metadata). A
//! [`ServiceDeclaration`] says that an [`InstancingStrategy`] satisfies a
//! contract. Both are plain inputs recreated on every build pass.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::canonical::TypeDescriptor;
use crate::engine::Resolver;
use crate::error::Result;
use crate::lifetime::Lifetime;
use crate::metadata::{Metadata, MetadataValue};
use crate::priority::Priority;

/// A type-erased instance.
///
/// By convention an instance produced for contract `C` holds an `Arc<C>`,
/// which [`downcast_instance`] recovers.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Factory producing an instance, given a resolver for sub-dependencies.
///
/// # Why `Arc` and not `Box`?
/// Declarations are cloned into every build pass and the finished registry
/// is shared between threads.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<Instance> + Send + Sync>;

/// Converts an instance of an implementation into an instance of its contract.
pub type CastFn = Arc<dyn Fn(Instance) -> Option<Instance> + Send + Sync>;

/// Wraps `value` as an [`Instance`] for contract `C`.
pub fn into_instance<C: ?Sized + Send + Sync + 'static>(value: Arc<C>) -> Instance {
    Arc::new(value)
}

/// Recovers the `Arc<C>` stored in an [`Instance`].
pub fn downcast_instance<C: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Option<Arc<C>> {
    instance.downcast_ref::<Arc<C>>().cloned()
}

/// Declares that `Self` can stand in for contract `C`.
///
/// Every type implements its own contract. For trait contracts use
/// [`implements!`](crate::implements):
///
/// ```
/// use sijill_registry::implements;
///
/// trait Logger: Send + Sync {}
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
///
/// implements!(ConsoleLogger => dyn Logger);
/// ```
pub trait Implements<C: ?Sized> {
    fn upcast(self: Arc<Self>) -> Arc<C>;
}

impl<T: ?Sized> Implements<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Implements [`Implements`] for trait-object contracts.
#[macro_export]
macro_rules! implements {
    ($ty:ty => $($contract:ty),+ $(,)?) => {
        $(
            impl $crate::declaration::Implements<$contract> for $ty {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$contract> {
                    self
                }
            }
        )+
    };
}

/// Constructor visibility. Only public constructors are eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Crate,
    Private,
}

/// Description of one constructor of an implementation type.
///
/// ```
/// use sijill_registry::declaration::ConstructorInfo;
///
/// struct Config;
/// let ctor = ConstructorInfo::new("with_config").param::<Config>().injection();
/// assert!(ctor.is_injection());
/// assert_eq!(ctor.parameters().len(), 1);
/// ```
#[derive(Clone)]
pub struct ConstructorInfo {
    name: Arc<str>,
    parameters: Vec<TypeDescriptor>,
    visibility: Visibility,
    injection: bool,
    activator: Option<FactoryFn>,
}

impl ConstructorInfo {
    /// A public, unmarked constructor without parameters.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            parameters: Vec::new(),
            visibility: Visibility::Public,
            injection: false,
            activator: None,
        }
    }

    /// Appends a parameter of type `P`.
    pub fn param<P: ?Sized + 'static>(mut self) -> Self {
        self.parameters.push(TypeDescriptor::of::<P>());
        self
    }

    /// Appends a parameter by descriptor.
    pub fn param_descriptor(mut self, descriptor: TypeDescriptor) -> Self {
        self.parameters.push(descriptor);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Marks this constructor as the injection constructor.
    pub fn injection(mut self) -> Self {
        self.injection = true;
        self
    }

    /// Sets the function the engine calls to run this constructor.
    pub fn activate<T, F>(mut self, constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    {
        self.activator = Some(Arc::new(move |resolver: &dyn Resolver| -> Result<Instance> {
            Ok(into_instance(Arc::new(constructor(resolver)?)))
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[TypeDescriptor] {
        &self.parameters
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_injection(&self) -> bool {
        self.injection
    }

    pub fn activator(&self) -> Option<&FactoryFn> {
        self.activator.as_ref()
    }

    /// `name(param, ...)`, used in error messages.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(TypeDescriptor::display_name).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("signature", &self.signature())
            .field("visibility", &self.visibility)
            .field("injection", &self.injection)
            .field("activator", &self.activator.is_some())
            .finish()
    }
}

/// Implementation types describe their constructors explicitly.
///
/// ```
/// use sijill_registry::declaration::{ConstructorInfo, Injectable};
///
/// struct Clock;
///
/// impl Injectable for Clock {
///     fn constructors() -> Vec<ConstructorInfo> {
///         vec![ConstructorInfo::new("new").activate(|_| Ok(Clock))]
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + 'static {
    fn constructors() -> Vec<ConstructorInfo>;
}

/// A concrete implementation type and its constructors.
#[derive(Clone)]
pub struct ImplementationType {
    descriptor: TypeDescriptor,
    constructors: Arc<[ConstructorInfo]>,
    upcast: Option<CastFn>,
}

impl ImplementationType {
    /// Implementation `T` registered as its own contract.
    pub fn of<T: Injectable>() -> Self {
        Self::implementing::<T, T>()
    }

    /// Implementation `T` registered for contract `C`.
    pub fn implementing<T, C>() -> Self
    where
        T: Injectable + Implements<C>,
        C: ?Sized + Send + Sync + 'static,
    {
        let upcast: CastFn = Arc::new(|instance: Instance| {
            instance
                .downcast_ref::<Arc<T>>()
                .map(|value| into_instance::<C>(<T as Implements<C>>::upcast(value.clone())))
        });
        Self {
            descriptor: TypeDescriptor::of::<T>(),
            constructors: T::constructors().into(),
            upcast: Some(upcast),
        }
    }

    /// Implementation known only by descriptor (e.g. from plugin metadata).
    pub fn described(descriptor: TypeDescriptor, constructors: Vec<ConstructorInfo>) -> Self {
        Self {
            descriptor,
            constructors: constructors.into(),
            upcast: None,
        }
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    pub(crate) fn upcast(&self) -> Option<&CastFn> {
        self.upcast.as_ref()
    }
}

impl fmt::Debug for ImplementationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationType")
            .field("descriptor", &self.descriptor)
            .field("constructors", &self.constructors)
            .finish()
    }
}

/// How instances for a service are produced.
#[derive(Clone)]
pub enum InstancingStrategy {
    /// Construct a concrete type.
    Type(ImplementationType),
    /// Call a factory.
    Factory { name: Arc<str>, factory: FactoryFn },
    /// Hand out a pre-built instance.
    Instance { name: Arc<str>, instance: Instance },
}

impl InstancingStrategy {
    /// Factory producing `Arc<C>`.
    pub fn factory<C, F>(factory: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<Arc<C>> + Send + Sync + 'static,
    {
        InstancingStrategy::Factory {
            name: Arc::from(format!("factory of {}", type_name::<C>())),
            factory: Arc::new(move |resolver: &dyn Resolver| -> Result<Instance> {
                Ok(into_instance(factory(resolver)?))
            }),
        }
    }

    /// Pre-built instance of contract `C`.
    pub fn instance<C: ?Sized + Send + Sync + 'static>(value: Arc<C>) -> Self {
        InstancingStrategy::Instance {
            name: Arc::from(format!("instance of {}", type_name::<C>())),
            instance: into_instance(value),
        }
    }

    /// Human-readable name used in logs and errors.
    pub fn name(&self) -> &str {
        match self {
            InstancingStrategy::Type(implementation) => implementation.descriptor().display_name(),
            InstancingStrategy::Factory { name, .. } => name,
            InstancingStrategy::Instance { name, .. } => name,
        }
    }
}

impl fmt::Debug for InstancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstancingStrategy::Type(implementation) => {
                f.debug_tuple("Type").field(implementation).finish()
            }
            InstancingStrategy::Factory { name, .. } => f.debug_tuple("Factory").field(name).finish(),
            InstancingStrategy::Instance { name, .. } => {
                f.debug_tuple("Instance").field(name).finish()
            }
        }
    }
}

/// Declares a contract and its default binding settings.
///
/// ```
/// use sijill_registry::declaration::ContractDeclaration;
/// use sijill_registry::lifetime::Lifetime;
///
/// trait Validator {}
///
/// let declaration = ContractDeclaration::of::<dyn Validator>()
///     .allow_multiple()
///     .singleton();
/// assert!(declaration.allow_multiple);
/// assert_eq!(declaration.lifetime, Lifetime::Singleton);
/// ```
#[derive(Debug, Clone)]
pub struct ContractDeclaration {
    pub contract: TypeDescriptor,
    pub lifetime: Lifetime,
    pub allow_multiple: bool,
    pub open_generic: bool,
    pub metadata: Metadata,
    pub override_priority: Priority,
}

impl ContractDeclaration {
    pub fn new(contract: TypeDescriptor) -> Self {
        Self {
            contract,
            lifetime: Lifetime::default(),
            allow_multiple: false,
            open_generic: false,
            metadata: Metadata::new(),
            override_priority: Priority::NORMAL,
        }
    }

    /// Declares contract `C`.
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self::new(TypeDescriptor::of::<C>())
    }

    /// Declares the open generic definition of `C`.
    pub fn open_generic_of<C: ?Sized + 'static>() -> Self {
        let mut declaration = Self::new(TypeDescriptor::open_generic_of::<C>());
        declaration.open_generic = true;
        declaration
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn singleton(self) -> Self {
        self.with_lifetime(Lifetime::Singleton)
    }

    pub fn scoped(self) -> Self {
        self.with_lifetime(Lifetime::Scoped)
    }

    pub fn allow_multiple(mut self) -> Self {
        self.allow_multiple = true;
        self
    }

    pub fn open_generic(mut self) -> Self {
        self.open_generic = true;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.override_priority = priority.into();
        self
    }
}

/// Declares that a strategy satisfies a contract.
///
/// ```
/// use std::sync::Arc;
/// use sijill_registry::declaration::ServiceDeclaration;
///
/// let declaration = ServiceDeclaration::instance::<String>(Arc::new("postgres://".into()))
///     .with_priority(50)
///     .externally_owned();
/// assert!(declaration.externally_owned);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDeclaration {
    pub strategy: InstancingStrategy,
    /// `None` is a configuration error reported when the build runs.
    pub contract: Option<TypeDescriptor>,
    /// Overrides the contract's default lifetime.
    pub lifetime: Option<Lifetime>,
    pub override_priority: Priority,
    pub processing_priority: Priority,
    pub metadata: Metadata,
    pub externally_owned: bool,
}

impl ServiceDeclaration {
    pub fn new(strategy: InstancingStrategy, contract: Option<TypeDescriptor>) -> Self {
        Self {
            strategy,
            contract,
            lifetime: None,
            override_priority: Priority::NORMAL,
            processing_priority: Priority::NORMAL,
            metadata: Metadata::new(),
            externally_owned: false,
        }
    }

    /// Implementation `T` for contract `C`.
    pub fn implementation<T, C>() -> Self
    where
        T: Injectable + Implements<C>,
        C: ?Sized + Send + Sync + 'static,
    {
        Self::new(
            InstancingStrategy::Type(ImplementationType::implementing::<T, C>()),
            Some(TypeDescriptor::of::<C>()),
        )
    }

    /// Pre-built instance for contract `C`.
    pub fn instance<C: ?Sized + Send + Sync + 'static>(value: Arc<C>) -> Self {
        Self::new(InstancingStrategy::instance(value), Some(TypeDescriptor::of::<C>()))
    }

    /// Factory for contract `C`.
    pub fn factory<C, F>(factory: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<Arc<C>> + Send + Sync + 'static,
    {
        Self::new(InstancingStrategy::factory::<C, F>(factory), Some(TypeDescriptor::of::<C>()))
    }

    /// Retargets the declaration to another contract descriptor.
    pub fn for_contract(mut self, contract: TypeDescriptor) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.override_priority = priority.into();
        self
    }

    pub fn with_processing_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.processing_priority = priority.into();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn externally_owned(mut self) -> Self {
        self.externally_owned = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    impl Injectable for English {
        fn constructors() -> Vec<ConstructorInfo> {
            vec![ConstructorInfo::new("new").activate(|_| Ok(English))]
        }
    }

    crate::implements!(English => dyn Greeter);

    #[test]
    fn instance_round_trips_through_any() {
        let instance = into_instance::<dyn Greeter>(Arc::new(English));
        let greeter = downcast_instance::<dyn Greeter>(&instance).unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(downcast_instance::<English>(&instance).is_none());
    }

    #[test]
    fn implementation_upcasts_to_contract() {
        let implementation = ImplementationType::implementing::<English, dyn Greeter>();
        let activator = implementation.constructors()[0].activator().unwrap().clone();
        let upcast = implementation.upcast().unwrap().clone();

        struct NoResolver;
        impl Resolver for NoResolver {
            fn resolve_key(&self, contract: &crate::canonical::TypeKey) -> Result<Instance> {
                Err(crate::error::SijillError::NotRegistered(crate::error::NotRegisteredError {
                    requested: contract.clone(),
                    suggestions: vec![],
                }))
            }
            fn resolve_many_key(&self, _: &crate::canonical::TypeKey) -> Result<Vec<Instance>> {
                Ok(vec![])
            }
            fn is_registered(&self, _: &crate::canonical::TypeKey) -> bool {
                false
            }
        }

        let raw = activator(&NoResolver).unwrap();
        let contract_instance = upcast(raw).unwrap();
        let greeter = downcast_instance::<dyn Greeter>(&contract_instance).unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn constructor_signature() {
        let ctor = ConstructorInfo::new("new").param::<u32>().param::<bool>();
        assert_eq!(ctor.signature(), "new(u32, bool)");
        assert!(ctor.is_public());
        assert!(!ctor.is_injection());
    }

    #[test]
    fn strategy_names() {
        let strategy = InstancingStrategy::instance::<u8>(Arc::new(1));
        assert_eq!(strategy.name(), "instance of u8");

        let declaration = ServiceDeclaration::implementation::<English, dyn Greeter>();
        assert!(declaration.strategy.name().ends_with("English"));
        assert!(declaration.contract.unwrap().display_name().contains("Greeter"));
    }

    #[test]
    fn open_generic_contract_declaration() {
        #[allow(dead_code)]
        struct Repo<T>(T);
        let declaration = ContractDeclaration::open_generic_of::<Repo<()>>();
        assert!(declaration.open_generic);
        assert!(declaration.contract.display_name().ends_with("Repo<_>"));
    }
}
