//! Service registry construction for Sijill.
//!
//! Declarations from any number of sources are aggregated, canonicalized,
//! resolved into one binding per contract (or an ordered list for
//! multi-instance contracts) and frozen into an immutable [`Registry`]
//! that a [`BackingEngine`] turns into a resolver.

pub mod aggregate;
pub mod binding;
pub mod builder;
pub mod canonical;
pub mod constructor;
pub mod container;
pub mod declaration;
pub mod engine;
pub mod error;
pub mod lifetime;
pub mod metadata;
pub mod priority;
pub mod registry;
pub mod resolve;
pub mod settings;
pub mod source;

pub use binding::Binding;
pub use builder::{RegistrationBuilder, RegistryBuilder};
pub use canonical::{TypeCanonicalizer, TypeDescriptor, TypeKey};
pub use container::{Container, DefaultEngine, ScopedContainer, prelude};
pub use declaration::{ContractDeclaration, ServiceDeclaration};
pub use engine::{BackingEngine, Resolver, ResolverExt};
pub use error::{Result, SijillError};
pub use lifetime::Lifetime;
pub use priority::Priority;
pub use registry::{Registry, RegistryEntry, RegistryHandle};
pub use settings::{AmbiguityStrategy, BuildSettings};
