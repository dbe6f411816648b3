//! Compiled per-class wire-mapping metadata.
//!
//! A [`ClassAlias`] is the decision table driving how one application class
//! encodes and decodes: which attributes are static (part of the class
//! contract), which are excluded or readonly, how names are renamed between
//! the wire and the object, and whether the class serializes itself through
//! external hooks instead of attribute traversal.
//!
//! # Architecture
//!
//! - [`ClassDef`] - the registration-time descriptor an application hands to
//!   the registry; a builder standing in for a class object in a language
//!   without runtime reflection
//! - [`AliasParts`] - the mutable intermediate state of a compilation,
//!   exposed to [`AliasStrategy`] hooks so adapter crates can contribute
//!   attributes for whole families of classes
//! - [`ClassAlias`] - the immutable compiled result, cached globally in the
//!   registry and per-pass in [`crate::Context`]
//! - [`ExternalHooks`] - the capability seam for classes that own their wire
//!   representation (AMF3 `Externalizable`)
//!
//! # Compilation
//!
//! Compilation merges inherited metadata deepest-base-first: attribute sets
//! union, static attribute order is base-first, synonym maps merge with the
//! subclass winning on key conflicts, and the dynamic/amf3 flags propagate
//! only when the subclass left them unset. The result is idempotent and
//! never recompiled; removal happens only through explicit unregistration.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
    sync::Arc,
};

use bitflags::bitflags;

use crate::{
    amf3,
    buffer::{Reader, Writer},
    registry::Registry,
    Error::{MissingAttribute, Registration},
    Object, Result, Value,
};

bitflags! {
    /// Behavioral flags of a compiled alias.
    ///
    /// `DYNAMIC_SET` / `AMF3_SET` record whether the corresponding flag was
    /// set explicitly (by the definition or an ancestor) rather than
    /// defaulted, which is what inheritance propagation keys on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AliasFlags: u8 {
        /// Instances may carry attributes beyond the static list.
        const DYNAMIC = 1;
        /// Prefer the AMF3 wire format; an AMF0 pass escapes to AMF3 for
        /// instances of this class.
        const AMF3 = 1 << 1;
        /// The class serializes itself through [`ExternalHooks`].
        const EXTERNAL = 1 << 2;
        /// The class is sealed: no dynamic attributes, ever.
        const SEALED = 1 << 3;
        /// `DYNAMIC` was set explicitly rather than defaulted.
        const DYNAMIC_SET = 1 << 4;
        /// `AMF3` was set explicitly rather than defaulted.
        const AMF3_SET = 1 << 5;
    }
}

/// Custom read/write hooks for externally-serialized classes.
///
/// An external class owns its wire representation: after the traits header
/// the codec hands the stream to these hooks and does not interpret the
/// payload. The capability is checked once at alias-compile time, never per
/// call.
pub trait ExternalHooks: Send + Sync {
    /// Write the external payload for `value`.
    ///
    /// # Errors
    /// Any encode error; the codec propagates it unchanged.
    fn write(
        &self,
        value: &Value,
        encoder: &mut amf3::Encoder<'_>,
        w: &mut Writer,
    ) -> Result<()>;

    /// Read the external payload back.
    ///
    /// `obj` is the placeholder instance already registered in the object
    /// table (register-then-descend). Hooks either populate it in place and
    /// return `None`, or return `Some(value)` when the envelope is
    /// transparent and decoding should surface `value` instead of the
    /// envelope itself.
    ///
    /// # Errors
    /// Any decode error; the codec propagates it unchanged.
    fn read(
        &self,
        decoder: &mut amf3::Decoder<'_>,
        r: &mut Reader<'_>,
        obj: &Rc<RefCell<Object>>,
    ) -> Result<Option<Value>>;
}

/// Pluggable compilation and instantiation hooks for families of classes.
///
/// This is the adapter seam: an ORM integration registers one strategy whose
/// predicate matches its model classes, contributes their persistent fields
/// during compilation, and optionally overrides instantiation. The first
/// registered strategy whose predicate matches a definition is applied.
pub trait AliasStrategy: Send + Sync {
    /// Stable name used for unregistration.
    fn name(&self) -> &str;

    /// Whether this strategy applies to `def`.
    fn applies_to(&self, def: &ClassDef) -> bool;

    /// Contribute metadata before the alias is finalized.
    ///
    /// # Errors
    /// Any registration error; compilation is aborted.
    fn custom_properties(&self, def: &ClassDef, parts: &mut AliasParts) -> Result<()> {
        let _ = (def, parts);
        Ok(())
    }

    /// Override instance creation for decode. `None` falls back to a plain
    /// typed [`Object`] with no constructor side effects.
    fn create_instance(&self, alias: &ClassAlias) -> Option<Object> {
        let _ = alias;
        None
    }
}

/// Registration-time descriptor for one application class.
///
/// Rust has no runtime class objects to introspect, so registration takes a
/// descriptor instead: the class name, its parent (which must already be
/// registered), the declared attribute metadata and the behavioral flags.
/// Built fluently:
///
/// ```rust
/// use amfwire::ClassDef;
///
/// let def = ClassDef::new("com.example.User")
///     .alias("user")
///     .static_attrs(["name", "email"])
///     .readonly_attrs(["id"])
///     .dynamic(false);
/// ```
#[derive(Clone)]
pub struct ClassDef {
    class_name: String,
    alias: Option<String>,
    parent: Option<String>,
    static_attrs: Vec<String>,
    exclude_attrs: Vec<String>,
    readonly_attrs: Vec<String>,
    proxy_attrs: Vec<String>,
    synonyms: Vec<(String, String)>,
    dynamic: Option<bool>,
    amf3: Option<bool>,
    sealed: bool,
    external: Option<Arc<dyn ExternalHooks>>,
}

impl ClassDef {
    /// Start a definition for `class_name`.
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        ClassDef {
            class_name: class_name.into(),
            alias: None,
            parent: None,
            static_attrs: Vec::new(),
            exclude_attrs: Vec::new(),
            readonly_attrs: Vec::new(),
            proxy_attrs: Vec::new(),
            synonyms: Vec::new(),
            dynamic: None,
            amf3: None,
            sealed: false,
            external: None,
        }
    }

    /// Set the wire alias name. Defaults to the class name itself.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name the parent class whose compiled alias this one inherits from.
    /// The parent must be registered before this definition is.
    #[must_use]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare static attributes in wire declaration order.
    #[must_use]
    pub fn static_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_attrs.extend(attrs.into_iter().map(Into::into));
        self
    }

    /// Declare attributes that never appear on the wire.
    #[must_use]
    pub fn exclude_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_attrs.extend(attrs.into_iter().map(Into::into));
        self
    }

    /// Declare attributes that encode but are never applied on decode.
    #[must_use]
    pub fn readonly_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readonly_attrs
            .extend(attrs.into_iter().map(Into::into));
        self
    }

    /// Declare attributes wrapped in a collection proxy on encode.
    #[must_use]
    pub fn proxy_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.proxy_attrs.extend(attrs.into_iter().map(Into::into));
        self
    }

    /// Rename one attribute between its in-object name and its wire name.
    #[must_use]
    pub fn synonym(mut self, object_name: impl Into<String>, wire_name: impl Into<String>) -> Self {
        self.synonyms.push((object_name.into(), wire_name.into()));
        self
    }

    /// Explicitly allow or forbid dynamic attributes. Unset inherits from the
    /// parent, or defaults to allowed.
    #[must_use]
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    /// Explicitly prefer the AMF3 wire format. Unset inherits from the
    /// parent, or defaults to off.
    #[must_use]
    pub fn amf3(mut self, amf3: bool) -> Self {
        self.amf3 = Some(amf3);
        self
    }

    /// Seal the class: forces dynamic attributes off regardless of flags.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Make the class external, serialized through `hooks`.
    #[must_use]
    pub fn external(mut self, hooks: Arc<dyn ExternalHooks>) -> Self {
        self.external = Some(hooks);
        self
    }

    /// The class name being defined.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The declared parent class name, if any.
    #[must_use]
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The wire alias name that will be registered.
    #[must_use]
    pub fn alias_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.class_name)
    }
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("class_name", &self.class_name)
            .field("alias", &self.alias)
            .field("parent", &self.parent)
            .field("static_attrs", &self.static_attrs)
            .field("external", &self.external.is_some())
            .finish()
    }
}

/// Mutable intermediate state of one alias compilation.
///
/// This is what ancestor merging operates on and what an [`AliasStrategy`]
/// sees in its `custom_properties` hook, after the definition's own metadata
/// and all inherited metadata have been folded in but before finalization.
#[derive(Debug, Default)]
pub struct AliasParts {
    /// Static attributes in wire declaration order, base classes first.
    pub static_attrs: Vec<String>,
    /// Attributes that never appear on the wire.
    pub exclude_attrs: HashSet<String>,
    /// Attributes that encode but are never applied on decode.
    pub readonly_attrs: HashSet<String>,
    /// Attributes wrapped in a collection proxy on encode.
    pub proxy_attrs: HashSet<String>,
    /// Attribute renames, in-object name to wire name.
    pub synonyms: HashMap<String, String>,
    /// Tri-state dynamic flag; `None` inherits or defaults.
    pub dynamic: Option<bool>,
    /// Tri-state AMF3-preference flag; `None` inherits or defaults.
    pub amf3: Option<bool>,
}

impl AliasParts {
    fn from_def(def: &ClassDef) -> Self {
        let mut parts = AliasParts {
            dynamic: def.dynamic,
            amf3: def.amf3,
            ..AliasParts::default()
        };
        for attr in &def.static_attrs {
            if !parts.static_attrs.contains(attr) {
                parts.static_attrs.push(attr.clone());
            }
        }
        parts.exclude_attrs.extend(def.exclude_attrs.iter().cloned());
        parts
            .readonly_attrs
            .extend(def.readonly_attrs.iter().cloned());
        parts.proxy_attrs.extend(def.proxy_attrs.iter().cloned());
        for (object_name, wire_name) in &def.synonyms {
            parts
                .synonyms
                .insert(object_name.clone(), wire_name.clone());
        }
        parts
    }

    fn merge_ancestor(&mut self, ancestor: &ClassAlias) {
        // Ordered union, base attributes first; duplicates keep the base position.
        let mut merged: Vec<String> = ancestor.static_attrs.clone();
        for attr in self.static_attrs.drain(..) {
            if !merged.contains(&attr) {
                merged.push(attr);
            }
        }
        self.static_attrs = merged;

        self.exclude_attrs
            .extend(ancestor.exclude_attrs.iter().cloned());
        self.readonly_attrs
            .extend(ancestor.readonly_attrs.iter().cloned());
        self.proxy_attrs.extend(ancestor.proxy_attrs.iter().cloned());

        // Subclass entries win on key conflicts.
        let mut synonyms = ancestor.synonyms.clone();
        synonyms.extend(self.synonyms.drain());
        self.synonyms = synonyms;

        if self.dynamic.is_none() && ancestor.flags.contains(AliasFlags::DYNAMIC_SET) {
            self.dynamic = Some(ancestor.is_dynamic());
        }
        if self.amf3.is_none() && ancestor.flags.contains(AliasFlags::AMF3_SET) {
            self.amf3 = Some(ancestor.is_amf3());
        }
    }
}

/// One attribute as the encoder will write it.
#[derive(Debug, Clone)]
pub struct EncodableAttr {
    /// The wire name, synonyms already applied.
    pub name: Rc<str>,
    /// The value to write; [`Value::Undefined`] for a declared static
    /// attribute absent on the instance.
    pub value: Value,
    /// Whether the value is wrapped in its collection proxy on the wire.
    pub proxied: bool,
}

/// The immutable compiled wire mapping for one application class.
///
/// Created by [`crate::Registry::register_class`] (or lazily as an anonymous
/// alias for unregistered classes in non-strict passes), cached globally by
/// class and alias name, and per pass on [`crate::Context`]. Never mutated or
/// recompiled once built.
pub struct ClassAlias {
    class_name: String,
    alias: String,
    parent: Option<String>,
    static_attrs: Vec<String>,
    exclude_attrs: HashSet<String>,
    readonly_attrs: HashSet<String>,
    proxy_attrs: HashSet<String>,
    synonyms: HashMap<String, String>,
    synonyms_reverse: HashMap<String, String>,
    flags: AliasFlags,
    external: Option<Arc<dyn ExternalHooks>>,
    strategy: Option<Arc<dyn AliasStrategy>>,
    shortcut_encode: bool,
    shortcut_decode: bool,
}

impl ClassAlias {
    /// Compile a definition against `registry`, merging ancestor metadata
    /// deepest-base-first and applying the first matching alias strategy.
    ///
    /// # Errors
    /// [`crate::Error::Registration`] when the definition is inconsistent or
    /// names a parent that is not registered.
    pub fn compile(def: &ClassDef, registry: &Registry) -> Result<ClassAlias> {
        if def.class_name.is_empty() {
            return Err(Registration("class name must not be empty".to_string()));
        }

        if let Some(hooks) = &def.external {
            // External classes own their payload; attribute metadata would be
            // dead weight and is rejected to keep definitions honest.
            if !def.static_attrs.is_empty() || !def.synonyms.is_empty() {
                return Err(Registration(format!(
                    "external class '{}' must not declare attribute metadata",
                    def.class_name
                )));
            }
            return Ok(ClassAlias {
                class_name: def.class_name.clone(),
                alias: def.alias_name().to_string(),
                parent: def.parent.clone(),
                static_attrs: Vec::new(),
                exclude_attrs: HashSet::new(),
                readonly_attrs: HashSet::new(),
                proxy_attrs: HashSet::new(),
                synonyms: HashMap::new(),
                synonyms_reverse: HashMap::new(),
                flags: AliasFlags::EXTERNAL,
                external: Some(hooks.clone()),
                strategy: None,
                shortcut_encode: false,
                shortcut_decode: false,
            });
        }

        let mut parts = AliasParts::from_def(def);

        let mut chain = Vec::new();
        let mut parent = def.parent.clone();
        while let Some(name) = parent {
            let Some(ancestor) = registry.try_get_class_alias(&name) else {
                return Err(Registration(format!(
                    "parent class '{name}' of '{}' is not registered",
                    def.class_name
                )));
            };
            parent = ancestor.parent().map(str::to_string);
            chain.push(ancestor);
        }
        for ancestor in chain.iter().rev() {
            parts.merge_ancestor(ancestor);
        }

        let strategy = registry.strategy_for(def);
        if let Some(strategy) = &strategy {
            strategy.custom_properties(def, &mut parts)?;
        }

        let mut flags = AliasFlags::empty();
        if parts.dynamic.is_some() {
            flags |= AliasFlags::DYNAMIC_SET;
        }
        if parts.amf3.is_some() {
            flags |= AliasFlags::AMF3_SET;
        }
        // Sealed classes force dynamic off regardless of flags.
        let dynamic = !def.sealed && parts.dynamic.unwrap_or(true);
        if dynamic {
            flags |= AliasFlags::DYNAMIC;
        }
        if def.sealed {
            flags |= AliasFlags::SEALED;
        }
        if parts.amf3.unwrap_or(false) {
            flags |= AliasFlags::AMF3;
        }

        let synonyms_reverse = parts
            .synonyms
            .iter()
            .map(|(object_name, wire_name)| (wire_name.clone(), object_name.clone()))
            .collect();

        let shortcut_encode = dynamic
            && parts.static_attrs.is_empty()
            && parts.exclude_attrs.is_empty()
            && parts.proxy_attrs.is_empty()
            && parts.synonyms.is_empty();
        let shortcut_decode = shortcut_encode && parts.readonly_attrs.is_empty();

        Ok(ClassAlias {
            class_name: def.class_name.clone(),
            alias: def.alias_name().to_string(),
            parent: def.parent.clone(),
            static_attrs: parts.static_attrs,
            exclude_attrs: parts.exclude_attrs,
            readonly_attrs: parts.readonly_attrs,
            proxy_attrs: parts.proxy_attrs,
            synonyms: parts.synonyms,
            synonyms_reverse,
            flags,
            external: None,
            strategy,
            shortcut_encode,
            shortcut_decode,
        })
    }

    /// The alias for a class name nobody registered: dynamic, no metadata,
    /// class name preserved verbatim. Compiled per pass by
    /// [`crate::Context::alias_for`] in non-strict mode.
    #[must_use]
    pub fn anonymous(class_name: &str) -> ClassAlias {
        ClassAlias {
            class_name: class_name.to_string(),
            alias: class_name.to_string(),
            parent: None,
            static_attrs: Vec::new(),
            exclude_attrs: HashSet::new(),
            readonly_attrs: HashSet::new(),
            proxy_attrs: HashSet::new(),
            synonyms: HashMap::new(),
            synonyms_reverse: HashMap::new(),
            flags: AliasFlags::DYNAMIC,
            external: None,
            strategy: None,
            shortcut_encode: true,
            shortcut_decode: true,
        }
    }

    /// The application class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The wire alias name written into typed-object headers.
    #[must_use]
    pub fn alias_name(&self) -> &str {
        &self.alias
    }

    /// The parent class name, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Merged static attributes in wire order (in-object names).
    #[must_use]
    pub fn static_attrs(&self) -> &[String] {
        &self.static_attrs
    }

    /// Whether instances may carry dynamic attributes.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(AliasFlags::DYNAMIC)
    }

    /// Whether this class prefers the AMF3 wire format.
    #[must_use]
    pub fn is_amf3(&self) -> bool {
        self.flags.contains(AliasFlags::AMF3)
    }

    /// Whether this class serializes itself through external hooks.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.flags.contains(AliasFlags::EXTERNAL)
    }

    /// The external hooks, present exactly when [`ClassAlias::is_external`].
    #[must_use]
    pub fn hooks(&self) -> Option<&Arc<dyn ExternalHooks>> {
        self.external.as_ref()
    }

    /// Fast path: no metadata applies on encode, attributes pass through.
    #[must_use]
    pub fn shortcut_encode(&self) -> bool {
        self.shortcut_encode
    }

    /// Fast path: no metadata applies on decode either.
    #[must_use]
    pub fn shortcut_decode(&self) -> bool {
        self.shortcut_decode
    }

    /// Sealed attribute names as they appear in an AMF3 traits header:
    /// statics minus exclusions, renamed to wire names, declaration order.
    #[must_use]
    pub fn sealed_wire_attrs(&self) -> Vec<String> {
        self.static_attrs
            .iter()
            .filter(|name| !self.exclude_attrs.contains(*name))
            .map(|name| self.wire_name(name).to_string())
            .collect()
    }

    fn wire_name<'a>(&'a self, object_name: &'a str) -> &'a str {
        self.synonyms
            .get(object_name)
            .map_or(object_name, String::as_str)
    }

    fn object_name<'a>(&'a self, wire_name: &'a str) -> &'a str {
        self.synonyms_reverse
            .get(wire_name)
            .map_or(wire_name, String::as_str)
    }

    /// Collect the attributes to write for `obj`, in wire order.
    ///
    /// Statics come first in declaration order; a declared static absent on
    /// the instance encodes as [`Value::Undefined`], never an error. Dynamic
    /// attributes follow in insertion order when the class allows them.
    /// Exclusions are dropped, synonyms renamed to wire names, and proxy
    /// attributes flagged for envelope wrapping by the encoder.
    pub fn encodable_attributes(&self, obj: &Object) -> Vec<EncodableAttr> {
        if self.shortcut_encode {
            return obj
                .iter()
                .map(|(name, value)| EncodableAttr {
                    name: name.clone(),
                    value: value.clone(),
                    proxied: false,
                })
                .collect();
        }

        let mut out = Vec::new();
        for name in &self.static_attrs {
            if self.exclude_attrs.contains(name) {
                continue;
            }
            out.push(EncodableAttr {
                name: self.wire_name(name).into(),
                value: obj.get(name).cloned().unwrap_or(Value::Undefined),
                proxied: self.proxy_attrs.contains(name),
            });
        }
        if self.is_dynamic() {
            for (name, value) in obj.iter() {
                if self.static_attrs.iter().any(|s| s == name.as_ref())
                    || self.exclude_attrs.contains(name.as_ref())
                {
                    continue;
                }
                out.push(EncodableAttr {
                    name: self.wire_name(name).into(),
                    value: value.clone(),
                    proxied: self.proxy_attrs.contains(name.as_ref()),
                });
            }
        }
        out
    }

    /// Filter decoded wire attributes down to what may be applied.
    ///
    /// Validates that every declared static attribute (exclusions aside)
    /// arrived, renames wire names back to in-object names, and drops
    /// excluded and readonly attributes. Proxy attributes need no unwrapping
    /// here: their envelopes already decoded transparently to the carried
    /// value.
    ///
    /// # Errors
    /// [`crate::Error::MissingAttribute`] when a declared static attribute is
    /// absent from `attrs`.
    pub fn decodable_attributes(
        &self,
        attrs: Vec<(Rc<str>, Value)>,
    ) -> Result<Vec<(Rc<str>, Value)>> {
        if self.shortcut_decode {
            return Ok(attrs);
        }

        let mut renamed: Vec<(Rc<str>, Value)> = attrs
            .into_iter()
            .map(|(name, value)| {
                let object_name = self.object_name(&name);
                let name = if object_name == name.as_ref() {
                    name
                } else {
                    object_name.into()
                };
                (name, value)
            })
            .collect();

        for name in &self.static_attrs {
            if self.exclude_attrs.contains(name) {
                continue;
            }
            if !renamed.iter().any(|(k, _)| k.as_ref() == name) {
                return Err(MissingAttribute {
                    class: self.class_name.clone(),
                    attr: name.clone(),
                });
            }
        }

        renamed.retain(|(name, _)| {
            !self.exclude_attrs.contains(name.as_ref())
                && !self.readonly_attrs.contains(name.as_ref())
        });
        Ok(renamed)
    }

    /// Apply filtered attributes to an instance in place.
    pub fn apply_attributes(&self, obj: &mut Object, attrs: Vec<(Rc<str>, Value)>) {
        for (name, value) in attrs {
            obj.set(name, value);
        }
    }

    /// Create a fresh instance for decode, carrying the class name and no
    /// constructor side effects. A strategy may override this for its family
    /// of classes.
    #[must_use]
    pub fn create_instance(&self) -> Object {
        if let Some(strategy) = &self.strategy {
            if let Some(instance) = strategy.create_instance(self) {
                return instance;
            }
        }
        Object::typed(self.class_name.as_str())
    }
}

impl std::fmt::Debug for ClassAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassAlias")
            .field("class_name", &self.class_name)
            .field("alias", &self.alias)
            .field("static_attrs", &self.static_attrs)
            .field("flags", &self.flags)
            .field("external", &self.external.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(def: ClassDef, registry: &Registry) -> ClassAlias {
        ClassAlias::compile(&def, registry).unwrap()
    }

    #[test]
    fn static_attrs_merge_base_first() {
        let registry = Registry::new();
        registry
            .register_class(ClassDef::new("A").static_attrs(["a"]))
            .unwrap();
        let b = compile(
            ClassDef::new("B").parent("A").static_attrs(["b"]),
            &registry,
        );
        assert_eq!(b.static_attrs(), ["a", "b"]);
    }

    #[test]
    fn three_level_merge_stays_base_first() {
        let registry = Registry::new();
        registry
            .register_class(ClassDef::new("A").static_attrs(["a"]))
            .unwrap();
        registry
            .register_class(ClassDef::new("B").parent("A").static_attrs(["b", "a"]))
            .unwrap();
        let c = compile(
            ClassDef::new("C").parent("B").static_attrs(["c"]),
            &registry,
        );
        assert_eq!(c.static_attrs(), ["a", "b", "c"]);
    }

    #[test]
    fn flags_inherit_only_when_unset() {
        let registry = Registry::new();
        registry
            .register_class(ClassDef::new("A").dynamic(false).amf3(true))
            .unwrap();

        let inherits = compile(ClassDef::new("B").parent("A"), &registry);
        assert!(!inherits.is_dynamic());
        assert!(inherits.is_amf3());

        let overrides = compile(
            ClassDef::new("C").parent("A").dynamic(true).amf3(false),
            &registry,
        );
        assert!(overrides.is_dynamic());
        assert!(!overrides.is_amf3());
    }

    #[test]
    fn subclass_synonym_wins_on_collision() {
        let registry = Registry::new();
        registry
            .register_class(
                ClassDef::new("A")
                    .static_attrs(["field"])
                    .synonym("field", "base_name"),
            )
            .unwrap();
        let b = compile(
            ClassDef::new("B").parent("A").synonym("field", "sub_name"),
            &registry,
        );
        assert_eq!(b.sealed_wire_attrs(), ["sub_name"]);
    }

    #[test]
    fn sealed_forces_dynamic_off() {
        let registry = Registry::new();
        let alias = compile(ClassDef::new("A").dynamic(true).sealed(), &registry);
        assert!(!alias.is_dynamic());
    }

    #[test]
    fn unregistered_parent_is_a_registration_error() {
        let registry = Registry::new();
        let err = ClassAlias::compile(&ClassDef::new("B").parent("Nope"), &registry).unwrap_err();
        assert!(matches!(err, Registration(_)));
    }

    #[test]
    fn shortcut_flags() {
        let registry = Registry::new();
        let plain = compile(ClassDef::new("Plain"), &registry);
        assert!(plain.shortcut_encode());
        assert!(plain.shortcut_decode());

        let readonly = compile(ClassDef::new("R").readonly_attrs(["id"]), &registry);
        assert!(readonly.shortcut_encode());
        assert!(!readonly.shortcut_decode());

        let with_static = compile(ClassDef::new("S").static_attrs(["x"]), &registry);
        assert!(!with_static.shortcut_encode());
    }

    #[test]
    fn missing_static_encodes_as_undefined() {
        let registry = Registry::new();
        let alias = compile(
            ClassDef::new("Point").static_attrs(["x", "y"]).dynamic(false),
            &registry,
        );
        let mut obj = Object::typed("Point");
        obj.set("x", Value::Int(1));

        let attrs = alias.encodable_attributes(&obj);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name.as_ref(), "x");
        assert_eq!(attrs[1].value, Value::Undefined);
    }

    #[test]
    fn missing_static_on_decode_is_an_error() {
        let registry = Registry::new();
        let alias = compile(ClassDef::new("Point").static_attrs(["x", "y"]), &registry);
        let attrs = vec![("x".into(), Value::Int(1))];
        let err = alias.decodable_attributes(attrs).unwrap_err();
        assert!(matches!(
            err,
            MissingAttribute { class, attr } if class == "Point" && attr == "y"
        ));
    }

    #[test]
    fn readonly_and_excluded_are_dropped_on_decode() {
        let registry = Registry::new();
        let alias = compile(
            ClassDef::new("User")
                .static_attrs(["name"])
                .readonly_attrs(["id"])
                .exclude_attrs(["secret"]),
            &registry,
        );
        let attrs = vec![
            ("name".into(), Value::string("ada")),
            ("id".into(), Value::Int(7)),
            ("secret".into(), Value::string("nope")),
        ];
        let kept = alias.decodable_attributes(attrs).unwrap();
        let names: Vec<_> = kept.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, ["name"]);
    }

    #[test]
    fn strategy_contributes_attributes() {
        struct ModelStrategy;
        impl AliasStrategy for ModelStrategy {
            fn name(&self) -> &str {
                "model"
            }
            fn applies_to(&self, def: &ClassDef) -> bool {
                def.class_name().starts_with("models.")
            }
            fn custom_properties(&self, _def: &ClassDef, parts: &mut AliasParts) -> Result<()> {
                parts.static_attrs.push("pk".to_string());
                Ok(())
            }
        }

        let registry = Registry::new();
        registry.register_alias_strategy(Arc::new(ModelStrategy));

        let model = compile(ClassDef::new("models.User").static_attrs(["name"]), &registry);
        assert_eq!(model.static_attrs(), ["name", "pk"]);

        let plain = compile(ClassDef::new("plain.User"), &registry);
        assert!(plain.static_attrs().is_empty());
    }
}
