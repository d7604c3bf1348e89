//! Canonical type identities.
//!
//! Sources describe types in whatever form they have at hand: a Rust type
//! (`TypeDescriptor::of::<T>()`), a textual path from plugin metadata, or a
//! name they could not bind at all. [`TypeCanonicalizer`] turns every
//! [`TypeDescriptor`] into a [`TypeKey`], an interned identity that compares
//! equal for every spelling of the same type.
//!
//! Generic arguments are part of the identity. An argument written as `_`
//! marks an unbound parameter, so `my_app::Cache<_>` is the open generic
//! definition of `my_app::Cache<i32>`.

use std::any::type_name;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use sijill_support::rendering::shorten_type_name;

use crate::settings::BuildSettings;

static INTERNER: Lazy<DashMap<Box<str>, Arc<str>>> = Lazy::new(DashMap::new);

fn intern(text: &str) -> Arc<str> {
    if let Some(existing) = INTERNER.get(text) {
        return existing.value().clone();
    }
    INTERNER
        .entry(Box::from(text))
        .or_insert_with(|| Arc::from(text))
        .value()
        .clone()
}

const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32",
    "u64", "u128", "usize", "f32", "f64", "()",
];

/// Generic arguments of a [`TypeKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Generics {
    /// Not a generic type.
    None,
    /// Open generic definition with the given number of unbound parameters.
    Open(usize),
    /// Closed generic type with concrete arguments.
    Closed(Arc<[TypeKey]>),
}

/// Canonical, interned identity of a type.
///
/// Two keys are equal when their canonical spelling is equal. The canonical
/// text is interned, so comparisons of equal keys usually short-circuit on
/// pointer equality.
///
/// # Examples
/// ```
/// use sijill_registry::canonical::TypeKey;
///
/// let open = TypeKey::parse("my_app::Cache<_>").unwrap();
/// let closed = TypeKey::parse("my_app::Cache< i32 >").unwrap();
///
/// assert!(open.is_open_generic());
/// assert_eq!(closed.as_str(), "my_app::Cache<i32>");
/// assert_eq!(closed.generic_definition(), Some(open));
/// ```
#[derive(Clone)]
pub struct TypeKey {
    canonical: Arc<str>,
    path: Arc<str>,
    generics: Generics,
}

impl TypeKey {
    /// Creates the key of the Rust type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let name = type_name::<T>();
        Self::parse(name).unwrap_or_else(|_| Self::from_parts(&normalize(name), Generics::None))
    }

    /// Parses a textual type path.
    ///
    /// # Errors
    /// Returns [`UnresolvedType`] for empty text, unbalanced brackets,
    /// empty generic arguments, or partially bound generics such as
    /// `Map<_, i32>`.
    pub fn parse(text: &str) -> Result<Self, UnresolvedType> {
        let normalized = normalize(text);
        parse_normalized(&normalized).map_err(|reason| UnresolvedType {
            descriptor: text.to_string(),
            reason,
        })
    }

    pub(crate) fn from_parts(path: &str, generics: Generics) -> Self {
        let canonical = match &generics {
            Generics::None => path.to_string(),
            Generics::Open(arity) => {
                format!("{path}<{}>", vec!["_"; *arity].join(", "))
            }
            Generics::Closed(args) => {
                let rendered: Vec<&str> = args.iter().map(TypeKey::as_str).collect();
                format!("{path}<{}>", rendered.join(", "))
            }
        };
        Self {
            canonical: intern(&canonical),
            path: intern(path),
            generics,
        }
    }

    /// The canonical spelling, e.g. `my_app::Cache<i32>`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// The path without generic arguments, e.g. `my_app::Cache`.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn generics(&self) -> &Generics {
        &self.generics
    }

    /// Returns `true` for open generic definitions like `Cache<_>`.
    #[inline]
    pub fn is_open_generic(&self) -> bool {
        matches!(self.generics, Generics::Open(_))
    }

    /// Returns `true` for closed generic types like `Cache<i32>`.
    #[inline]
    pub fn is_closed_generic(&self) -> bool {
        matches!(self.generics, Generics::Closed(_))
    }

    /// Returns the open generic definition of a closed generic key.
    ///
    /// `None` for non-generic keys and for keys that are already open.
    pub fn generic_definition(&self) -> Option<TypeKey> {
        match &self.generics {
            Generics::Closed(args) => Some(Self::from_parts(&self.path, Generics::Open(args.len()))),
            _ => None,
        }
    }

    /// Short display name with module paths stripped.
    pub fn short_name(&self) -> String {
        shorten_type_name(&self.canonical)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.canonical, &other.canonical) || self.canonical == other.canonical
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.canonical)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// A type as described by a declaration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// A Rust type known at compile time.
    Static { type_name: &'static str },
    /// A textual path, possibly using aliases or `_` for unbound parameters.
    Path(String),
    /// A type the source could not bind (stale or partial metadata).
    Unresolved { name: String, reason: String },
}

impl TypeDescriptor {
    /// Describes the Rust type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Static {
            type_name: type_name::<T>(),
        }
    }

    /// Describes the open generic definition of `T`.
    ///
    /// The concrete arguments of `T` only serve to name the type; they are
    /// replaced by unbound parameters.
    ///
    /// ```
    /// use sijill_registry::canonical::TypeDescriptor;
    ///
    /// struct Cache<T>(T);
    /// let open = TypeDescriptor::open_generic_of::<Cache<()>>();
    /// assert!(open.display_name().ends_with("Cache<_>"));
    /// ```
    pub fn open_generic_of<T: ?Sized + 'static>() -> Self {
        match TypeKey::of::<T>().generic_definition() {
            Some(definition) => Self::Path(definition.as_str().to_string()),
            None => Self::of::<T>(),
        }
    }

    /// Describes a type by its textual path.
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// Describes a type the source failed to bind.
    pub fn unresolved(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unresolved {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The name as the source wrote it.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Static { type_name } => type_name,
            Self::Path(path) => path,
            Self::Unresolved { name, .. } => name,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A descriptor that does not name a real type.
///
/// Not fatal: the declaration containing it is skipped with a warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot resolve type `{descriptor}`: {reason}")]
pub struct UnresolvedType {
    pub descriptor: String,
    pub reason: String,
}

/// Maps type descriptors to canonical [`TypeKey`]s.
///
/// Canonicalization is pure: the same descriptor always yields the same key
/// for a given canonicalizer.
///
/// # Examples
/// ```
/// use sijill_registry::canonical::{TypeCanonicalizer, TypeDescriptor};
///
/// let canonicalizer = TypeCanonicalizer::new()
///     .with_module_alias("app", "app_core")
///     .with_type_alias("Logger", "app_core::logging::Logger");
///
/// let a = canonicalizer.canonicalize(&TypeDescriptor::path("app::logging::Logger")).unwrap();
/// let b = canonicalizer.canonicalize(&TypeDescriptor::path("Logger")).unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeCanonicalizer {
    /// Module prefix rewrites, longest prefix first.
    module_aliases: Vec<(String, String)>,
    type_aliases: BTreeMap<String, String>,
    known_types: HashSet<String>,
}

impl TypeCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a canonicalizer from the alias and catalog sections of
    /// [`BuildSettings`].
    pub fn from_settings(settings: &BuildSettings) -> Self {
        let mut canonicalizer = Self::new();
        for (from, to) in &settings.module_aliases {
            canonicalizer = canonicalizer.with_module_alias(from, to);
        }
        for (alias, target) in &settings.type_aliases {
            canonicalizer = canonicalizer.with_type_alias(alias, target);
        }
        for path in &settings.known_types {
            canonicalizer = canonicalizer.with_known_type(path);
        }
        canonicalizer
    }

    /// Rewrites paths under module `from` to module `to`.
    pub fn with_module_alias(mut self, from: &str, to: &str) -> Self {
        let from = with_separator(from);
        let to = with_separator(to);
        self.module_aliases.retain(|(existing, _)| *existing != from);
        self.module_aliases.push((from, to));
        self.module_aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        self
    }

    /// Rewrites the exact path `alias` to `target`.
    pub fn with_type_alias(mut self, alias: &str, target: &str) -> Self {
        self.type_aliases.insert(normalize(alias), normalize(target));
        self
    }

    /// Adds a path to the catalog of known types.
    ///
    /// Once the catalog is non-empty, textual descriptors must name
    /// catalogued (or primitive) types to resolve.
    pub fn with_known_type(mut self, path: &str) -> Self {
        self.known_types.insert(normalize(path));
        self
    }

    /// Returns the canonical key for `descriptor`.
    ///
    /// # Errors
    /// Returns [`UnresolvedType`] if the descriptor is
    /// [`TypeDescriptor::Unresolved`], malformed, or names a type missing
    /// from a non-empty catalog.
    pub fn canonicalize(&self, descriptor: &TypeDescriptor) -> Result<TypeKey, UnresolvedType> {
        match descriptor {
            TypeDescriptor::Static { type_name } => {
                // already the defining path; aliases only map spelled paths onto it
                Ok(TypeKey::parse(type_name)
                    .unwrap_or_else(|_| TypeKey::from_parts(&normalize(type_name), Generics::None)))
            }
            TypeDescriptor::Path(path) => {
                let key = self.rewrite(&TypeKey::parse(path)?);
                self.check_known(&key).map_err(|reason| UnresolvedType {
                    descriptor: path.clone(),
                    reason,
                })?;
                Ok(key)
            }
            TypeDescriptor::Unresolved { name, reason } => Err(UnresolvedType {
                descriptor: name.clone(),
                reason: reason.clone(),
            }),
        }
    }

    fn rewrite(&self, key: &TypeKey) -> TypeKey {
        if self.module_aliases.is_empty() && self.type_aliases.is_empty() {
            return key.clone();
        }
        let path = self.rewrite_path(key.path());
        let generics = match key.generics() {
            Generics::Closed(args) => Generics::Closed(args.iter().map(|arg| self.rewrite(arg)).collect()),
            other => other.clone(),
        };
        TypeKey::from_parts(&path, generics)
    }

    fn rewrite_path(&self, path: &str) -> String {
        let (prefix, bare) = match path.strip_prefix("dyn ") {
            Some(rest) => ("dyn ", rest),
            None => ("", path),
        };

        if let Some(target) = self.type_aliases.get(bare) {
            return format!("{prefix}{target}");
        }

        for (from, to) in &self.module_aliases {
            if let Some(rest) = bare.strip_prefix(from.as_str()) {
                return format!("{prefix}{to}{rest}");
            }
        }

        path.to_string()
    }

    fn check_known(&self, key: &TypeKey) -> Result<(), String> {
        if self.known_types.is_empty() {
            return Ok(());
        }

        let bare = key.path().strip_prefix("dyn ").unwrap_or(key.path());
        let opaque = bare.contains(['(', '[', '&', '+', ' ']);
        if !opaque && !PRIMITIVES.contains(&bare) && !self.known_types.contains(bare) {
            return Err(format!("`{bare}` is not a known type"));
        }

        if let Generics::Closed(args) = key.generics() {
            for arg in args.iter() {
                self.check_known(arg)?;
            }
        }
        Ok(())
    }
}

fn with_separator(module: &str) -> String {
    let module = normalize(module);
    let module = module.trim_end_matches("::");
    format!("{module}::")
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Removes insignificant whitespace, keeping one space between words
/// (`dyn Trait`, `impl Trait`).
fn normalize(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && result.chars().last().is_some_and(is_ident_char) && is_ident_char(ch) {
            result.push(' ');
        }
        pending_space = false;
        result.push(ch);
    }

    result
}

/// Bracket depth changes for `ch` at byte `index`; `->` is not a bracket.
fn depth_delta(text: &str, index: usize, ch: char) -> i32 {
    match ch {
        '<' | '(' | '[' => 1,
        '>' if index > 0 && text.as_bytes()[index - 1] == b'-' => 0,
        '>' | ')' | ']' => -1,
        _ => 0,
    }
}

fn parse_normalized(text: &str) -> Result<TypeKey, String> {
    if text.is_empty() {
        return Err("empty type name".to_string());
    }

    let mut depth = 0;
    for (index, ch) in text.char_indices() {
        depth += depth_delta(text, index, ch);
        if depth < 0 {
            return Err(format!("unbalanced `{ch}`"));
        }
    }
    if depth != 0 {
        return Err("unclosed bracket".to_string());
    }

    let ends_with_generics = text.ends_with('>') && !text.ends_with("->");
    if !ends_with_generics {
        return Ok(TypeKey::from_parts(text, Generics::None));
    }

    // find the `<` matching the final `>`
    let close = text.len() - 1;
    let mut depth = 0;
    let mut open = None;
    for (index, ch) in text.char_indices().rev() {
        depth += depth_delta(text, index, ch);
        if depth == 0 {
            open = Some(index);
            break;
        }
    }
    let open = open.ok_or_else(|| "unbalanced generic arguments".to_string())?;
    if !text[open..].starts_with('<') {
        return Ok(TypeKey::from_parts(text, Generics::None));
    }

    let path = &text[..open];
    if path.is_empty() {
        return Err("generic arguments without a type path".to_string());
    }

    let arguments = split_arguments(&text[open + 1..close]);
    if arguments.iter().any(|arg| arg.is_empty()) {
        return Err("empty generic argument".to_string());
    }

    let unbound = arguments.iter().filter(|arg| **arg == "_").count();
    let generics = if unbound == arguments.len() {
        Generics::Open(unbound)
    } else if unbound > 0 {
        return Err("partially bound generic arguments are not supported".to_string());
    } else {
        let args = arguments
            .iter()
            .map(|arg| parse_normalized(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Generics::Closed(args.into())
    };

    Ok(TypeKey::from_parts(path, generics))
}

fn split_arguments(text: &str) -> Vec<&str> {
    let mut arguments = Vec::new();
    let mut depth = 0;
    let mut start = 0;

    for (index, ch) in text.char_indices() {
        depth += depth_delta(text, index, ch);
        if ch == ',' && depth == 0 {
            arguments.push(text[start..index].trim());
            start = index + 1;
        }
    }
    arguments.push(text[start..].trim());
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    struct Cache<T>(T);
    trait Logger {}

    #[test]
    fn key_of_type() {
        let key = TypeKey::of::<Cache<i32>>();
        assert!(key.as_str().ends_with("Cache<i32>"));
        assert!(key.is_closed_generic());
    }

    #[test]
    fn key_equality_same_type() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<i32>());
    }

    #[test]
    fn equal_keys_share_interned_text() {
        let a = TypeKey::parse("app::Cache<i32>").unwrap();
        let b = TypeKey::parse("app::Cache <i32>").unwrap();
        assert!(Arc::ptr_eq(&a.canonical, &b.canonical));
    }

    #[test]
    fn static_and_path_descriptors_agree() {
        let canonicalizer = TypeCanonicalizer::new();
        let from_type = canonicalizer
            .canonicalize(&TypeDescriptor::of::<Cache<String>>())
            .unwrap();
        let spelled = format!(
            "{}< alloc::string::String >",
            TypeKey::of::<Cache<String>>().path()
        );
        let from_path = canonicalizer.canonicalize(&TypeDescriptor::path(spelled)).unwrap();
        assert_eq!(from_type, from_path);
    }

    #[test]
    fn open_generic_definition() {
        let closed = TypeKey::parse("app::Map<i32, alloc::string::String>").unwrap();
        let open = closed.generic_definition().unwrap();
        assert_eq!(open.as_str(), "app::Map<_, _>");
        assert!(open.is_open_generic());
        assert_eq!(open.generic_definition(), None);
    }

    #[test]
    fn open_generic_descriptor_of_type() {
        let canonicalizer = TypeCanonicalizer::new();
        let open = canonicalizer
            .canonicalize(&TypeDescriptor::open_generic_of::<Cache<u8>>())
            .unwrap();
        let closed = TypeKey::of::<Cache<i64>>();
        assert_eq!(closed.generic_definition(), Some(open));
    }

    #[test]
    fn trait_object_keys() {
        let key = TypeKey::of::<dyn Logger>();
        assert!(key.as_str().starts_with("dyn "));
        assert_eq!(key.generics(), &Generics::None);
    }

    #[test]
    fn function_pointer_is_opaque() {
        let key = TypeKey::parse("fn(i32) -> i32").unwrap();
        assert_eq!(key.generics(), &Generics::None);
    }

    #[test]
    fn malformed_paths_are_unresolved() {
        assert!(TypeKey::parse("").is_err());
        assert!(TypeKey::parse("app::Cache<i32").is_err());
        assert!(TypeKey::parse("app::Cache<>").is_err());
        assert!(TypeKey::parse("app::Map<_, i32>").is_err());
    }

    #[test]
    fn module_alias_applies_to_arguments() {
        let canonicalizer = TypeCanonicalizer::new().with_module_alias("facade", "core_impl");
        let key = canonicalizer
            .canonicalize(&TypeDescriptor::path("facade::Cache<facade::Item>"))
            .unwrap();
        assert_eq!(key.as_str(), "core_impl::Cache<core_impl::Item>");
    }

    #[test]
    fn module_alias_matches_whole_segments() {
        let canonicalizer = TypeCanonicalizer::new().with_module_alias("app", "app_core");
        let key = canonicalizer
            .canonicalize(&TypeDescriptor::path("application::Thing"))
            .unwrap();
        assert_eq!(key.as_str(), "application::Thing");
    }

    #[test]
    fn type_alias_keeps_dyn_prefix() {
        let canonicalizer = TypeCanonicalizer::new().with_type_alias("Logger", "app::Logger");
        let key = canonicalizer.canonicalize(&TypeDescriptor::path("dyn Logger")).unwrap();
        assert_eq!(key.as_str(), "dyn app::Logger");
    }

    #[test]
    fn unresolved_descriptor_fails() {
        let canonicalizer = TypeCanonicalizer::new();
        let err = canonicalizer
            .canonicalize(&TypeDescriptor::unresolved("plugin::Gone", "assembly not loaded"))
            .unwrap_err();
        assert_eq!(err.descriptor, "plugin::Gone");
        assert!(err.to_string().contains("assembly not loaded"));
    }

    #[test]
    fn catalog_rejects_unknown_paths() {
        let canonicalizer = TypeCanonicalizer::new().with_known_type("app::Cache");
        assert!(canonicalizer.canonicalize(&TypeDescriptor::path("app::Cache<i32>")).is_ok());
        assert!(canonicalizer.canonicalize(&TypeDescriptor::path("app::Missing")).is_err());
        assert!(canonicalizer.canonicalize(&TypeDescriptor::path("app::Cache<app::Missing>")).is_err());
        // compile-time types are always real
        assert!(canonicalizer.canonicalize(&TypeDescriptor::of::<String>()).is_ok());
    }

    #[test]
    fn static_descriptors_match_type_keys() {
        let canonicalizer = TypeCanonicalizer::new().with_module_alias("alloc::string", "text");
        let key = canonicalizer.canonicalize(&TypeDescriptor::of::<String>()).unwrap();
        assert_eq!(key, TypeKey::of::<String>());
    }

    #[test]
    fn canonicalization_is_deterministic() {
        let canonicalizer = TypeCanonicalizer::new().with_module_alias("a", "b");
        let descriptor = TypeDescriptor::path("a::X<a::Y<_>>");
        let first = canonicalizer.canonicalize(&descriptor);
        let second = canonicalizer.canonicalize(&descriptor);
        // nested `_` is an open definition used as an argument
        assert_eq!(first, second);
    }
}
