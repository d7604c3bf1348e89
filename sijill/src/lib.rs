//! # Sijill — declarative service registries for Rust
//!
//! Sijill builds the registry behind a dependency injection container.
//! Any number of declaration sources describe contracts and the services
//! that satisfy them; the builder merges them into one immutable registry,
//! settles conflicting registrations deterministically and hands the result
//! to a resolution engine.
//!
//! ```rust
//! use sijill::prelude::*;
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Polite;
//! impl Greeter for Polite {
//!     fn greet(&self) -> String { "Good morning".into() }
//! }
//!
//! impl Injectable for Polite {
//!     fn constructors() -> Vec<ConstructorInfo> {
//!         vec![ConstructorInfo::new("new").activate(|_| Ok(Polite))]
//!     }
//! }
//!
//! implements!(Polite => dyn Greeter);
//!
//! let mut builder = Container::builder();
//! builder.register_type::<Polite, dyn Greeter>().singleton();
//!
//! let container = builder.build().unwrap();
//! assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "Good morning");
//! ```

pub use sijill_registry::*;
pub use sijill_support::rendering;
