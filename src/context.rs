//! Per-pass reference tracking and class-alias resolution state.
//!
//! A [`Context`] lives for exactly one encode or decode pass. It owns the
//! three reference tables the wire formats share or specialize:
//!
//! - an **object table** tracking every compound value, identity-keyed on
//!   encode and index-addressed on decode (both formats)
//! - a **string table** deduplicating non-empty strings by value (AMF3 only)
//! - a **traits table** deduplicating class definitions (AMF3 only)
//!
//! plus a per-pass cache of resolved [`ClassAlias`] handles so the global
//! registry is consulted at most once per class name per pass.
//!
//! # Register-then-descend
//!
//! Cyclic graphs terminate only because a compound value is entered into the
//! object table *before* its body is visited. An inner occurrence of a value
//! still being written then resolves to a back-reference instead of recursing
//! forever. Both codecs preserve this ordering on encode and decode; it is
//! the single load-bearing invariant of this module.
//!
//! # Lifecycle
//!
//! One context per pass. [`Context::clear`] resets every table without
//! destroying the instance, which is how [`crate::ByteArray`] reuses its
//! embedded context across successive top-level `read_object`/`write_object`
//! calls.

use std::{collections::HashMap, rc::Rc, sync::Arc};

use crate::{
    alias::ClassAlias,
    error::ReferenceKind,
    registry::Registry,
    Error::{OutOfRangeReference, UnknownAlias},
    Result, Value,
};

/// AMF3 encoding mode of one traits record.
///
/// The three modes are mutually exclusive per class alias and determine how
/// an object body is laid out after its traits header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitsMode {
    /// A fixed, ordered attribute-name list declared once per traits entry;
    /// values follow positionally.
    Static,
    /// The static attributes (if any) followed by key/value pairs terminated
    /// by an empty-string key.
    Dynamic,
    /// An opaque payload fully produced and consumed by the alias's external
    /// hooks; the codec does not interpret it.
    External,
}

/// One entry of the AMF3 traits (class-definition) table.
///
/// Rebuilt fresh each pass: it wraps the immutable [`ClassAlias`] (when one
/// resolved) with the wire-level facts of this particular stream, namely the
/// sealed attribute names actually declared and the computed encoding mode.
#[derive(Debug)]
pub struct Traits {
    /// The wire class name; empty for anonymous objects.
    pub class_name: Rc<str>,
    /// How the object body following this traits record is encoded.
    pub mode: TraitsMode,
    /// Sealed attribute names in declaration order (wire names).
    pub attributes: Vec<Rc<str>>,
    /// The resolved alias, absent for anonymous objects.
    pub alias: Option<Arc<ClassAlias>>,
}

/// Per-pass reference tables and alias cache.
///
/// Not thread-safe and never shared: each concurrent pass gets its own
/// instance. The only cross-pass state is the [`Registry`] handle it resolves
/// aliases against.
pub struct Context {
    objects: Vec<Value>,
    object_ids: HashMap<usize, usize>,
    strings: Vec<Rc<str>>,
    string_ids: HashMap<Rc<str>, usize>,
    traits: Vec<Rc<Traits>>,
    traits_ids: HashMap<Rc<str>, usize>,
    aliases: HashMap<String, Arc<ClassAlias>>,
    registry: Arc<Registry>,
    strict: bool,
}

impl Context {
    /// Create a fresh context resolving aliases against `registry`.
    ///
    /// `strict` controls what happens when a typed object's class name is not
    /// registered: strict passes fail with [`crate::Error::UnknownAlias`],
    /// non-strict passes degrade to an untyped record that preserves the
    /// wire class name.
    #[must_use]
    pub fn new(registry: Arc<Registry>, strict: bool) -> Self {
        Context {
            objects: Vec::new(),
            object_ids: HashMap::new(),
            strings: Vec::new(),
            string_ids: HashMap::new(),
            traits: Vec::new(),
            traits_ids: HashMap::new(),
            aliases: HashMap::new(),
            registry,
            strict,
        }
    }

    /// The registry this context resolves aliases against.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Reset every table and the alias cache without destroying the instance.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.object_ids.clear();
        self.strings.clear();
        self.string_ids.clear();
        self.traits.clear();
        self.traits_ids.clear();
        self.aliases.clear();
    }

    /// Register a value in the object table and return its index.
    ///
    /// Must be called *before* the value's body is written or read; see the
    /// module documentation on register-then-descend. For identity-bearing
    /// values the first registration wins: re-registering the same pointer
    /// consumes a new index (keeping encoder and decoder tables aligned) but
    /// back-references keep resolving to the first occurrence.
    pub fn add_object(&mut self, value: &Value) -> usize {
        let index = self.objects.len();
        if let Some(id) = value.identity() {
            self.object_ids.entry(id).or_insert(index);
        }
        self.objects.push(value.clone());
        index
    }

    /// Replace a previously registered object-table entry.
    ///
    /// Used when an external envelope turns out to be transparent: the
    /// placeholder registered before the body was read is swapped for the
    /// value the envelope actually carried, so back-references to the
    /// envelope resolve to that value.
    pub fn replace_object(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.objects.get_mut(index) {
            *slot = value;
        }
    }

    /// Look up the object-table index of a previously registered value, by
    /// pointer identity.
    #[must_use]
    pub fn object_reference(&self, value: &Value) -> Option<usize> {
        self.object_ids.get(&value.identity()?).copied()
    }

    /// Resolve a decoded object back-reference.
    ///
    /// # Errors
    /// [`crate::Error::OutOfRangeReference`] when `index` is past the table;
    /// tables only grow within a pass, so this is always fatal malformed
    /// input and never an underrun.
    pub fn object_by_reference(&self, index: usize) -> Result<Value> {
        self.objects
            .get(index)
            .cloned()
            .ok_or(OutOfRangeReference {
                kind: ReferenceKind::Object,
                index,
            })
    }

    /// Register a non-empty string in the string table and return its index.
    ///
    /// The empty string is the sole value never referenced and must not be
    /// added; both codec paths special-case it before reaching the table.
    pub fn add_string(&mut self, string: &Rc<str>) -> usize {
        let index = self.strings.len();
        self.string_ids.entry(string.clone()).or_insert(index);
        self.strings.push(string.clone());
        index
    }

    /// Look up the string-table index of a previously written string, by
    /// value.
    #[must_use]
    pub fn string_reference(&self, string: &str) -> Option<usize> {
        self.string_ids.get(string).copied()
    }

    /// Resolve a decoded string back-reference.
    ///
    /// # Errors
    /// [`crate::Error::OutOfRangeReference`] when `index` is past the table.
    pub fn string_by_reference(&self, index: usize) -> Result<Rc<str>> {
        self.strings
            .get(index)
            .cloned()
            .ok_or(OutOfRangeReference {
                kind: ReferenceKind::String,
                index,
            })
    }

    /// Register a traits record and return its index.
    pub fn add_traits(&mut self, traits: Rc<Traits>) -> usize {
        let index = self.traits.len();
        self.traits_ids
            .entry(traits.class_name.clone())
            .or_insert(index);
        self.traits.push(traits);
        index
    }

    /// Look up the traits-table index for a class name already declared in
    /// this pass.
    #[must_use]
    pub fn traits_reference(&self, class_name: &str) -> Option<usize> {
        self.traits_ids.get(class_name).copied()
    }

    /// Resolve a decoded traits back-reference.
    ///
    /// # Errors
    /// [`crate::Error::OutOfRangeReference`] when `index` is past the table.
    pub fn traits_by_reference(&self, index: usize) -> Result<Rc<Traits>> {
        self.traits
            .get(index)
            .cloned()
            .ok_or(OutOfRangeReference {
                kind: ReferenceKind::Traits,
                index,
            })
    }

    /// Resolve the alias for a class name: per-pass cache, then the registry,
    /// then a lazily compiled anonymous alias.
    ///
    /// The anonymous fallback is what makes non-strict passes degrade
    /// gracefully: an unregistered class becomes a dynamic alias with no
    /// static metadata, so its attributes pass through untouched and the
    /// class name is preserved verbatim.
    ///
    /// # Errors
    /// [`crate::Error::UnknownAlias`] when the name is unregistered and this
    /// context is strict.
    pub fn alias_for(&mut self, class_name: &str) -> Result<Arc<ClassAlias>> {
        if let Some(alias) = self.aliases.get(class_name) {
            return Ok(alias.clone());
        }

        let alias = match self.registry.try_get_class_alias(class_name) {
            Some(alias) => alias,
            None if self.strict => return Err(UnknownAlias(class_name.to_string())),
            None => Arc::new(ClassAlias::anonymous(class_name)),
        };

        self.aliases.insert(class_name.to_string(), alias.clone());
        Ok(alias)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("objects", &self.objects.len())
            .field("strings", &self.strings.len())
            .field("traits", &self.traits.len())
            .field("strict", &self.strict)
            .finish()
    }
}
