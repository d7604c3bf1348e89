//! Error types for registry builds and resolution.
//!
//! Build errors name the contract, the competing candidates and where
//! each candidate was declared, so a broken configuration can be fixed
//! without a debugger.

use std::fmt;
use std::sync::Arc;

use sijill_support::rendering::{CandidateEntry, render_candidates, render_list};

use crate::canonical::TypeKey;
use crate::priority::Priority;
use crate::settings::AmbiguityStrategy;

/// Error a [`DeclarationSource`](crate::source::DeclarationSource) reports
/// while enumerating.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Sijill operations.
#[derive(Debug, thiserror::Error)]
pub enum SijillError {
    /// A declaration source failed while enumerating. No registry is built.
    #[error("Declaration source `{source_name}` failed: {source}")]
    Discovery {
        source_name: String,
        #[source]
        source: SourceError,
    },

    /// A service declaration has no usable contract.
    #[error("{}", .0)]
    InvalidContract(InvalidContractError),

    /// Competing contract declarations could not be settled.
    #[error("{}", .0)]
    AmbiguousContract(AmbiguousContractError),

    /// Competing service declarations for a single-instance contract.
    #[error("{}", .0)]
    AmbiguousBinding(AmbiguousBindingError),

    /// More than one injection constructor on an implementation.
    #[error("{}", .0)]
    AmbiguousConstructor(AmbiguousConstructorError),

    /// Requested contract is absent from the registry.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// Single resolve requested for a multi-instance contract.
    #[error(
        "Contract {contract} allows multiple bindings\n  Hint: use .resolve_many() to get all of them"
    )]
    MultiplicityMismatch { contract: TypeKey },

    /// A scoped binding was requested outside of a scope.
    #[error(
        "Cannot resolve {contract} (Scoped) outside of a scope\n  Hint: call .create_scope() and resolve from the scope"
    )]
    ScopeRequired { contract: TypeKey },

    /// The engine found no usable constructor for an implementation.
    #[error("{}", .0)]
    NoConstructor(NoConstructorError),

    /// The produced instance does not have the requested type.
    #[error("Type mismatch for {contract}: expected {expected}")]
    TypeMismatch {
        contract: TypeKey,
        expected: &'static str,
    },

    /// A factory or constructor returned an error.
    #[error("Failed to construct {contract}: {source}")]
    ConstructionFailed {
        contract: TypeKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SijillError {
    /// Wraps an arbitrary error raised while constructing `contract`.
    pub fn construction(
        contract: TypeKey,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        SijillError::ConstructionFailed {
            contract,
            source: source.into(),
        }
    }

    /// Returns `true` for errors raised while building a registry.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            SijillError::Discovery { .. }
                | SijillError::InvalidContract(_)
                | SijillError::AmbiguousContract(_)
                | SijillError::AmbiguousBinding(_)
                | SijillError::AmbiguousConstructor(_)
        )
    }
}

/// One competing declaration, as reported in ambiguity errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Implementation type, or a description of the factory/instance
    pub name: String,
    pub priority: Priority,
    /// Name of the declaring source
    pub source: Arc<str>,
    /// Global discovery index
    pub discovery: usize,
}

impl Candidate {
    fn entry(&self) -> CandidateEntry {
        CandidateEntry {
            name: self.name.clone(),
            priority: self.priority.value(),
            origin: Some(format!("{}, #{}", self.source, self.discovery)),
        }
    }
}

fn render(candidates: &[Candidate]) -> String {
    let entries: Vec<CandidateEntry> = candidates.iter().map(Candidate::entry).collect();
    render_candidates(&entries)
}

/// Why a service declaration's contract is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidContractReason {
    /// The declaration names no contract at all.
    Missing,
    /// No contract declaration governs the named contract.
    Undeclared(TypeKey),
}

/// Error when a service declaration references no usable contract.
#[derive(Debug)]
pub struct InvalidContractError {
    /// Description of the offending declaration
    pub declaration: String,
    pub source_name: String,
    pub reason: InvalidContractReason,
}

impl fmt::Display for InvalidContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            InvalidContractReason::Missing => write!(
                f,
                "Invalid contract: service {} (from: {}) declares no contract",
                self.declaration, self.source_name,
            )?,
            InvalidContractReason::Undeclared(contract) => write!(
                f,
                "Invalid contract: service {} (from: {}) targets {}, which no contract declaration governs",
                self.declaration, self.source_name, contract,
            )?,
        }
        write!(
            f,
            "\n  Hint: declare the contract with a ContractDeclaration or register it through the builder"
        )
    }
}

/// Error when contract declarations tie with different settings.
#[derive(Debug)]
pub struct AmbiguousContractError {
    pub contract: TypeKey,
    pub strategy: AmbiguityStrategy,
    pub candidates: Vec<Candidate>,
}

impl fmt::Display for AmbiguousContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ambiguous contract declaration for {} ({}): conflicting declarations",
            self.contract, self.strategy,
        )?;
        write!(f, "{}", render(&self.candidates))?;
        write!(
            f,
            "  Hint: give one declaration a lower override priority or make their settings agree"
        )
    }
}

/// Error when several services compete for a single-instance contract.
#[derive(Debug)]
pub struct AmbiguousBindingError {
    pub contract: TypeKey,
    pub strategy: AmbiguityStrategy,
    /// The tied candidates (all candidates under [`AmbiguityStrategy::Strict`])
    pub candidates: Vec<Candidate>,
}

impl fmt::Display for AmbiguousBindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ambiguous binding for {} ({}): {} candidates",
            self.contract,
            self.strategy,
            self.candidates.len(),
        )?;
        write!(f, "{}", render(&self.candidates))?;
        match self.strategy {
            AmbiguityStrategy::Strict => write!(
                f,
                "  Hint: remove all but one registration, or allow multiple bindings for the contract"
            ),
            _ => write!(
                f,
                "  Hint: give the preferred registration a lower override priority"
            ),
        }
    }
}

/// Error when an implementation marks more than one injection constructor.
#[derive(Debug)]
pub struct AmbiguousConstructorError {
    pub implementation: TypeKey,
    pub contract: TypeKey,
    /// Signatures of every marked constructor
    pub constructors: Vec<String>,
}

impl fmt::Display for AmbiguousConstructorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ambiguous injection constructor on {} (contract {}): {}",
            self.implementation,
            self.contract,
            render_list(&self.constructors),
        )?;
        write!(f, "\n  Hint: mark exactly one constructor as the injection constructor")
    }
}

/// Error when a requested contract is not in the registry.
#[derive(Debug)]
pub struct NotRegisteredError {
    pub requested: TypeKey,
    /// Registered contracts with similar names
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Contract not registered: {}", self.requested)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Did you forget to register an implementation of {}?",
            self.requested.short_name()
        )
    }
}

/// Error when the engine cannot pick or invoke a constructor.
#[derive(Debug)]
pub struct NoConstructorError {
    pub implementation: TypeKey,
    pub contract: TypeKey,
    pub reason: String,
}

impl fmt::Display for NoConstructorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No usable constructor on {} (contract {}): {}",
            self.implementation, self.contract, self.reason,
        )
    }
}

/// Convenient Result type for Sijill operations.
pub type Result<T> = std::result::Result<T, SijillError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, priority: i32, discovery: usize) -> Candidate {
        Candidate {
            name: name.to_string(),
            priority: Priority(priority),
            source: Arc::from("test"),
            discovery,
        }
    }

    #[test]
    fn ambiguous_binding_lists_candidates() {
        let err = SijillError::AmbiguousBinding(AmbiguousBindingError {
            contract: TypeKey::parse("dyn app::Logger").unwrap(),
            strategy: AmbiguityStrategy::ForcePriority,
            candidates: vec![candidate("app::FastLogger", 100, 0), candidate("app::DefaultLogger", 100, 1)],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Ambiguous binding for dyn app::Logger"));
        assert!(msg.contains("app::FastLogger"));
        assert!(msg.contains("app::DefaultLogger"));
        assert!(msg.contains("(from: test, #1)"));
        assert!(err.is_build_error());
    }

    #[test]
    fn ambiguous_constructor_lists_signatures() {
        let err = SijillError::AmbiguousConstructor(AmbiguousConstructorError {
            implementation: TypeKey::parse("app::Mailer").unwrap(),
            contract: TypeKey::parse("dyn app::Sender").unwrap(),
            constructors: vec!["new(app::Config)".into(), "with_pool(app::Pool)".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("app::Mailer"));
        assert!(msg.contains("dyn app::Sender"));
        assert!(msg.contains("new(app::Config), with_pool(app::Pool)"));
    }

    #[test]
    fn not_registered_error_display() {
        let err = SijillError::NotRegistered(NotRegisteredError {
            requested: TypeKey::parse("app::UserServise").unwrap(),
            suggestions: vec!["app::UserService".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("not registered"));
        assert!(msg.contains("- app::UserService"));
        assert!(!err.is_build_error());
    }

    #[test]
    fn invalid_contract_names_declaration() {
        let err = SijillError::InvalidContract(InvalidContractError {
            declaration: "app::Orphan".into(),
            source_name: "plugins".into(),
            reason: InvalidContractReason::Missing,
        });

        let msg = format!("{err}");
        assert!(msg.contains("app::Orphan"));
        assert!(msg.contains("plugins"));
    }

    #[test]
    fn discovery_error_keeps_source() {
        use std::error::Error as _;

        let err = SijillError::Discovery {
            source_name: "disk".into(),
            source: "manifest unreadable".into(),
        };
        assert!(err.to_string().contains("disk"));
        assert!(err.source().is_some());
    }
}
