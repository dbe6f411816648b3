//! Process-wide class-alias and type-converter registry.
//!
//! The registry is the only state shared across encode/decode passes. It
//! holds three collections, each matching one extension seam of the codec:
//!
//! - **Aliases**: class-name/alias-name to compiled [`ClassAlias`] — the hot
//!   path, consulted on every typed object
//! - **Strategies**: an ordered list of [`AliasStrategy`] implementations
//!   applied at alias-compile time to whole families of classes
//! - **Converters**: an ordered list of runtime-type converters consulted by
//!   [`crate::encode_any`] for values that have no class alias at all
//!
//! # Thread Safety
//!
//! Registration is mostly a startup activity, lookups happen on every pass.
//! The registry is therefore built for concurrent read-mostly access:
//!
//! - Lock-free concurrent hash map for the alias index (`DashMap`)
//! - Lock-free ordered maps for strategies and converters (`SkipMap`),
//!   keyed by an atomic insertion sequence so iteration order is
//!   registration order
//! - No blocking operations during normal lookup or insertion

use std::{
    any::{Any, TypeId},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::{
    alias::{AliasStrategy, ClassAlias, ClassDef},
    flex,
    Error::{DuplicateClass, UnknownAlias},
    Result, Value,
};

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

/// Handle returned by converter registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConverterHandle(u64);

type ConvertFn = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type PredicateFn = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

enum Matcher {
    Type(TypeId),
    Predicate(PredicateFn),
}

struct Converter {
    matcher: Matcher,
    convert: ConvertFn,
}

impl Converter {
    fn try_convert(&self, value: &dyn Any) -> Option<Value> {
        match &self.matcher {
            Matcher::Type(id) if *id == value.type_id() => (self.convert)(value),
            Matcher::Type(_) => None,
            Matcher::Predicate(pred) if pred(value) => (self.convert)(value),
            Matcher::Predicate(_) => None,
        }
    }
}

/// Global maps from class/alias name to compiled [`ClassAlias`], plus the
/// strategy and converter extension seams.
///
/// All lookups are non-blocking; see the module documentation for the
/// concurrency model. Codec passes reach the registry through
/// [`crate::CodecOptions::registry`], defaulting to [`Registry::global`].
pub struct Registry {
    aliases: DashMap<String, Arc<ClassAlias>>,
    strategies: SkipMap<u64, Arc<dyn AliasStrategy>>,
    converters: SkipMap<u64, Converter>,
    sequence: AtomicU64,
}

impl Registry {
    /// Create an empty registry with nothing pre-registered.
    #[must_use]
    pub fn new() -> Self {
        Registry {
            aliases: DashMap::new(),
            strategies: SkipMap::new(),
            converters: SkipMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a registry with the well-known flex collection proxies
    /// (`flex.messaging.io.ArrayCollection`, `flex.messaging.io.ObjectProxy`)
    /// pre-registered, so proxy envelopes decode at any time.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Registry::new();
        flex::register_proxies(&registry);
        registry
    }

    /// The process-wide registry instance, used by any pass whose options
    /// carry no explicit registry. Initialized on first use with
    /// [`Registry::with_defaults`].
    #[must_use]
    pub fn global() -> Arc<Registry> {
        GLOBAL
            .get_or_init(|| Arc::new(Registry::with_defaults()))
            .clone()
    }

    /// Compile and register a class definition.
    ///
    /// The compiled alias is indexed under both the class name and the wire
    /// alias name. Aliases are immutable once compiled; re-registering a name
    /// requires [`Registry::unregister_class`] first.
    ///
    /// # Errors
    /// [`crate::Error::DuplicateClass`] when either name is taken, or
    /// [`crate::Error::Registration`] when the definition is inconsistent.
    pub fn register_class(&self, def: ClassDef) -> Result<Arc<ClassAlias>> {
        if self.aliases.contains_key(def.class_name()) {
            return Err(DuplicateClass(def.class_name().to_string()));
        }
        if self.aliases.contains_key(def.alias_name()) {
            return Err(DuplicateClass(def.alias_name().to_string()));
        }

        let alias = Arc::new(ClassAlias::compile(&def, self)?);
        self.aliases
            .insert(alias.class_name().to_string(), alias.clone());
        if alias.alias_name() != alias.class_name() {
            self.aliases
                .insert(alias.alias_name().to_string(), alias.clone());
        }
        Ok(alias)
    }

    /// Remove a registration by class name or alias name, returning the
    /// removed alias.
    ///
    /// # Errors
    /// [`crate::Error::UnknownAlias`] when the name is not registered.
    pub fn unregister_class(&self, name_or_alias: &str) -> Result<Arc<ClassAlias>> {
        let Some((_, alias)) = self.aliases.remove(name_or_alias) else {
            return Err(UnknownAlias(name_or_alias.to_string()));
        };
        // The registration lives under both names; drop the other one too.
        if alias.class_name() != alias.alias_name() {
            let other = if name_or_alias == alias.class_name() {
                alias.alias_name()
            } else {
                alias.class_name()
            };
            self.aliases.remove(other);
        }
        Ok(alias)
    }

    /// Resolve a registered alias by class name or alias name.
    ///
    /// # Errors
    /// [`crate::Error::UnknownAlias`] when the name is not registered.
    pub fn get_class_alias(&self, name_or_alias: &str) -> Result<Arc<ClassAlias>> {
        self.try_get_class_alias(name_or_alias)
            .ok_or_else(|| UnknownAlias(name_or_alias.to_string()))
    }

    /// Resolve a registered alias, `None` when unregistered.
    #[must_use]
    pub fn try_get_class_alias(&self, name_or_alias: &str) -> Option<Arc<ClassAlias>> {
        self.aliases
            .get(name_or_alias)
            .map(|entry| entry.value().clone())
    }

    /// Append an alias strategy to the ordered strategy list.
    ///
    /// Strategies are consulted at alias-compile time in registration order;
    /// the first whose predicate matches a definition is applied.
    pub fn register_alias_strategy(&self, strategy: Arc<dyn AliasStrategy>) {
        let key = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.strategies.insert(key, strategy);
    }

    /// Remove a strategy by its stable name. Returns `true` when one was
    /// removed.
    pub fn unregister_alias_strategy(&self, name: &str) -> bool {
        let key = self
            .strategies
            .iter()
            .find(|entry| entry.value().name() == name)
            .map(|entry| *entry.key());
        match key {
            Some(key) => self.strategies.remove(&key).is_some(),
            None => false,
        }
    }

    /// The first registered strategy that applies to `def`.
    #[must_use]
    pub fn strategy_for(&self, def: &ClassDef) -> Option<Arc<dyn AliasStrategy>> {
        self.strategies
            .iter()
            .find(|entry| entry.value().applies_to(def))
            .map(|entry| entry.value().clone())
    }

    /// Register a converter for one concrete runtime type.
    ///
    /// Converters bypass class aliases entirely: they turn arbitrary
    /// application values into encodable [`Value`]s and are consulted by
    /// [`crate::encode_any`] in registration order after the built-in
    /// conversions.
    pub fn add_type<T: Any>(
        &self,
        convert: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> ConverterHandle {
        let convert: ConvertFn =
            Arc::new(move |any: &dyn Any| any.downcast_ref::<T>().map(&convert));
        let key = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.converters.insert(
            key,
            Converter {
                matcher: Matcher::Type(TypeId::of::<T>()),
                convert,
            },
        );
        ConverterHandle(key)
    }

    /// Register a converter guarded by an arbitrary predicate instead of a
    /// concrete type.
    pub fn add_type_match(
        &self,
        predicate: impl Fn(&dyn Any) -> bool + Send + Sync + 'static,
        convert: impl Fn(&dyn Any) -> Option<Value> + Send + Sync + 'static,
    ) -> ConverterHandle {
        let key = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.converters.insert(
            key,
            Converter {
                matcher: Matcher::Predicate(Arc::new(predicate)),
                convert: Arc::new(convert),
            },
        );
        ConverterHandle(key)
    }

    /// Remove a previously registered converter. Returns `true` when one was
    /// removed.
    pub fn remove_type(&self, handle: ConverterHandle) -> bool {
        self.converters.remove(&handle.0).is_some()
    }

    /// Run the ordered converter list against a runtime value.
    ///
    /// Returns the first successful conversion, or `None` when no registered
    /// converter claims the value.
    #[must_use]
    pub fn convert(&self, value: &dyn Any) -> Option<Value> {
        self.converters
            .iter()
            .find_map(|entry| entry.value().try_convert(value))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("aliases", &self.aliases.len())
            .field("strategies", &self.strategies.len())
            .field("converters", &self.converters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve_by_both_names() {
        let registry = Registry::new();
        registry
            .register_class(ClassDef::new("com.example.User").alias("user"))
            .unwrap();

        let by_class = registry.get_class_alias("com.example.User").unwrap();
        let by_alias = registry.get_class_alias("user").unwrap();
        assert!(Arc::ptr_eq(&by_class, &by_alias));
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = Registry::new();
        registry.register_class(ClassDef::new("A")).unwrap();
        assert!(matches!(
            registry.register_class(ClassDef::new("A")),
            Err(DuplicateClass(name)) if name == "A"
        ));
        assert!(matches!(
            registry.register_class(ClassDef::new("B").alias("A")),
            Err(DuplicateClass(_))
        ));
    }

    #[test]
    fn unregister_removes_both_names() {
        let registry = Registry::new();
        registry
            .register_class(ClassDef::new("com.example.User").alias("user"))
            .unwrap();
        registry.unregister_class("user").unwrap();

        assert!(registry.get_class_alias("user").is_err());
        assert!(registry.get_class_alias("com.example.User").is_err());
        assert!(matches!(
            registry.unregister_class("user"),
            Err(UnknownAlias(_))
        ));
    }

    #[test]
    fn with_defaults_knows_the_flex_proxies() {
        let registry = Registry::with_defaults();
        assert!(registry
            .try_get_class_alias(flex::ARRAY_COLLECTION)
            .is_some());
        assert!(registry.try_get_class_alias(flex::OBJECT_PROXY).is_some());
    }

    #[test]
    fn converters_run_in_registration_order() {
        let registry = Registry::new();
        registry.add_type::<u64>(|v| Value::string(format!("first:{v}")));
        registry.add_type::<u64>(|v| Value::string(format!("second:{v}")));

        assert_eq!(
            registry.convert(&7u64),
            Some(Value::string("first:7"))
        );
        assert_eq!(registry.convert(&"no converter"), None);
    }

    #[test]
    fn removed_converter_stops_matching() {
        let registry = Registry::new();
        let handle = registry.add_type::<u64>(|v| Value::Int(*v as i32));
        assert!(registry.convert(&1u64).is_some());
        assert!(registry.remove_type(handle));
        assert!(!registry.remove_type(handle));
        assert!(registry.convert(&1u64).is_none());
    }

    #[test]
    fn predicate_converters() {
        let registry = Registry::new();
        registry.add_type_match(
            |any| any.downcast_ref::<i128>().is_some_and(|v| *v >= 0),
            |any| {
                let v = any.downcast_ref::<i128>()?;
                Some(Value::Number(*v as f64))
            },
        );
        assert_eq!(registry.convert(&5i128), Some(Value::Number(5.0)));
        assert_eq!(registry.convert(&-5i128), None);
    }
}
