//! Serdes — type-driven conversion of application state to wire values.
//!
//! A registry holds `(matcher, serializer, deserializer)` entries. To
//! serialise a value, its type chain is walked most specific first; for each
//! type name the entries are scanned newest first, and the first match wins.
//! Unmatched values come back unchanged: serialisation never fails.
//!
//! A process-wide registry backs the free functions (`serialise`,
//! `register_serdes`, `reset_serdes`). Tests that touch it must reset it.

pub mod defaults;
pub mod error;
pub mod state;
pub mod value;
pub mod wrappers;

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde_json::Value;

pub use error::{SerdesError, SerdesResult};
pub use state::StateProxy;
pub use value::{ForeignObject, StateMap, StateValue};
pub use wrappers::{encode_data_url, BytesWrapper, FileWrapper};

/// Serializer: receives the registry so nested values can be serialised
/// without going back through the global lock.
pub type SerializerFn = Arc<dyn Fn(&SerdesRegistry, &StateValue) -> StateValue + Send + Sync>;

pub type DeserializerFn = Arc<dyn Fn(&StateValue) -> StateValue + Send + Sync>;

/// What an entry applies to.
#[derive(Clone)]
pub enum TypeMatcher {
    /// Exact fully-qualified type name.
    Name(String),
    /// Any type name the predicate accepts.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl TypeMatcher {
    /// Match a concrete Rust type by its fully-qualified name.
    ///
    /// The name comes from `std::any::type_name`, which is not stable across
    /// compiler versions: keys built this way are only valid within one build
    /// and must not be persisted or exchanged between binaries.
    pub fn of<T: ?Sized>() -> Self {
        TypeMatcher::Name(type_name::<T>().to_string())
    }

    /// Match a type by name, without linking against it.
    pub fn name(name: impl Into<String>) -> Self {
        TypeMatcher::Name(name.into())
    }

    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        TypeMatcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, type_name: &str) -> bool {
        match self {
            TypeMatcher::Name(name) => name == type_name,
            TypeMatcher::Predicate(f) => f(type_name),
        }
    }
}

impl fmt::Debug for TypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeMatcher::Name(name) => f.debug_tuple("Name").field(name).finish(),
            TypeMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for TypeMatcher {
    fn from(name: &str) -> Self {
        TypeMatcher::name(name)
    }
}

impl From<String> for TypeMatcher {
    fn from(name: String) -> Self {
        TypeMatcher::Name(name)
    }
}

/// One registry entry. Serializer and deserializer default to identity.
#[derive(Clone)]
pub struct Serdes {
    matcher: TypeMatcher,
    serializer: SerializerFn,
    deserializer: DeserializerFn,
}

impl Serdes {
    pub fn new(matcher: impl Into<TypeMatcher>) -> Self {
        Self {
            matcher: matcher.into(),
            serializer: Arc::new(|_: &SerdesRegistry, v: &StateValue| v.clone()),
            deserializer: Arc::new(|v: &StateValue| v.clone()),
        }
    }

    pub fn serializer(
        mut self,
        f: impl Fn(&SerdesRegistry, &StateValue) -> StateValue + Send + Sync + 'static,
    ) -> Self {
        self.serializer = Arc::new(f);
        self
    }

    pub fn deserializer(
        mut self,
        f: impl Fn(&StateValue) -> StateValue + Send + Sync + 'static,
    ) -> Self {
        self.deserializer = Arc::new(f);
        self
    }

    pub fn matcher(&self) -> &TypeMatcher {
        &self.matcher
    }
}

impl fmt::Debug for Serdes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serdes")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// Ordered serdes entries.
#[derive(Debug, Clone)]
pub struct SerdesRegistry {
    entries: Vec<Serdes>,
}

impl SerdesRegistry {
    /// A registry with no entries: every value passes through.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A registry with the core serializers installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        defaults::register_core(&mut registry);
        registry
    }

    /// Add an entry. It takes precedence over earlier entries; a name matcher
    /// already present is replaced.
    pub fn register(&mut self, serdes: Serdes) {
        if let TypeMatcher::Name(ref name) = serdes.matcher {
            self.entries
                .retain(|e| !matches!(&e.matcher, TypeMatcher::Name(existing) if existing == name));
        }
        self.entries.push(serdes);
    }

    /// Back to the core serializers.
    pub fn reset(&mut self) {
        *self = Self::with_defaults();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, chain: &[String]) -> Option<&Serdes> {
        chain.iter().find_map(|type_name| {
            self.entries
                .iter()
                .rev()
                .find(|e| e.matcher.matches(type_name))
        })
    }

    /// Convert `value` with the most specific matching serializer.
    pub fn serialise(&self, value: &StateValue) -> StateValue {
        match self.lookup(&value.type_chain()) {
            Some(entry) => (entry.serializer)(self, value),
            None => value.clone(),
        }
    }

    /// Serialise, then lower to JSON. Fails when the result still holds a
    /// value with no JSON form (unknown foreign objects, infinities).
    pub fn serialise_to_json(&self, value: &StateValue) -> SerdesResult<Value> {
        self.serialise(value).to_json()
    }

    /// Apply the deserializer registered for `type_name` (identity if none).
    pub fn deserialise(&self, type_name: &str, value: &StateValue) -> StateValue {
        match self.lookup(&[type_name.to_string()]) {
            Some(entry) => (entry.deserializer)(value),
            None => value.clone(),
        }
    }
}

impl Default for SerdesRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

static REGISTRY: LazyLock<RwLock<SerdesRegistry>> =
    LazyLock::new(|| RwLock::new(SerdesRegistry::with_defaults()));

/// Register an entry in the process-wide registry.
pub fn register_serdes(serdes: Serdes) {
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(serdes);
}

/// Restore the process-wide registry to the core serializers.
pub fn reset_serdes() {
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .reset();
}

/// Serialise with the process-wide registry.
///
/// Serializers must recurse through the registry they are handed, not
/// through this function.
pub fn serialise(value: &StateValue) -> StateValue {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .serialise(value)
}

/// Deserialise with the process-wide registry.
pub fn deserialise(type_name: &str, value: &StateValue) -> StateValue {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .deserialise(type_name, value)
}
