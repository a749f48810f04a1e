//! Tag namespace and the class-aware traversal in both directions.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::class::Class;
use crate::error::{CodecError, ConfigurationError};
use crate::text::{self, Replacer, Reviver, Space};
use crate::value::{Obj, Value};

/// Reserved key carrying the type tag, unless configured otherwise.
pub const DEFAULT_TYPE_KEY: &str = "_type";

/// What [`Registry::register`] does when a tag is already taken by a
/// different class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateTagPolicy {
    /// The later registration replaces the earlier one.
    #[default]
    Replace,
    /// Registration fails with [`ConfigurationError::DuplicateTag`].
    Reject,
}

/// Options for a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Reserved object key holding the type tag.
    pub type_key: String,
    pub duplicate_tags: DuplicateTagPolicy,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        RegistryOptions {
            type_key: DEFAULT_TYPE_KEY.to_owned(),
            duplicate_tags: DuplicateTagPolicy::default(),
        }
    }
}

struct RegistryInner {
    options: RegistryOptions,
    tag_map: HashMap<String, Class>,
}

/// A namespace of tag → class mappings.
///
/// Cloning yields another handle to the same namespace. Registration is
/// expected to finish before concurrent `stringify`/`parse` calls begin.
///
/// # Example
///
/// ```
/// use json_class_codec::{ClassBuilder, Registry, Value};
///
/// let registry = Registry::new();
/// let user = ClassBuilder::new("User", [&registry])
///     .unwrap()
///     .constructor(|this| {
///         this.set("name", "");
///     })
///     .register()
///     .unwrap();
///
/// let alice = user.instantiate();
/// alice.set("name", "alice");
///
/// let text = registry.stringify(&Value::from(alice)).unwrap();
/// assert_eq!(text, r#"{"_type":"User","name":"alice"}"#);
///
/// let back = registry.parse(&text).unwrap();
/// assert!(back.is_instance_of(&user));
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

/// Non-owning registry handle kept by class descriptors.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RwLock<RegistryInner>>);

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<Registry> {
        self.0.upgrade().map(|inner| Registry { inner })
    }
}

impl fmt::Debug for WeakRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(registry) => write!(f, "Weak({:?})", registry),
            None => f.write_str("Weak(<dropped>)"),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    /// An empty registry configured by `options`.
    pub fn with_options(options: RegistryOptions) -> Self {
        Registry {
            inner: Arc::new(RwLock::new(RegistryInner {
                options,
                tag_map: HashMap::new(),
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn options(&self) -> RegistryOptions {
        self.read().options.clone()
    }

    /// The reserved key this registry writes tags under.
    pub fn type_key(&self) -> String {
        self.read().options.type_key.clone()
    }

    /// Maps `class.name()` to `class`.
    ///
    /// Registering the same class twice is a no-op. A different class under
    /// a taken tag replaces it or fails, per [`DuplicateTagPolicy`]. A class
    /// whose constructor sets this registry's type key is rejected with
    /// [`ConfigurationError::ReservedKey`].
    pub fn register(&self, class: &Class) -> Result<&Self, ConfigurationError> {
        self.admit(class)?;
        self.insert(class);
        Ok(self)
    }

    pub(crate) fn admit(&self, class: &Class) -> Result<(), ConfigurationError> {
        let inner = self.read();
        if class.owns_key(&inner.options.type_key) {
            return Err(ConfigurationError::ReservedKey {
                class: class.name().to_owned(),
                key: inner.options.type_key.clone(),
            });
        }
        match inner.tag_map.get(class.name()) {
            Some(existing)
                if existing != class
                    && inner.options.duplicate_tags == DuplicateTagPolicy::Reject =>
            {
                Err(ConfigurationError::DuplicateTag {
                    tag: class.name().to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn insert(&self, class: &Class) {
        let replaced = self
            .write()
            .tag_map
            .insert(class.name().to_owned(), class.clone());
        if replaced.is_some_and(|previous| previous != *class) {
            debug!(tag = class.name(), "tag reassigned to a different class");
        }
    }

    /// The class registered under `tag`.
    pub fn resolve(&self, tag: &str) -> Option<Class> {
        self.read().tag_map.get(tag).cloned()
    }

    /// Whether `class` itself (not just its tag) is registered here.
    pub fn contains(&self, class: &Class) -> bool {
        self.read()
            .tag_map
            .get(class.name())
            .is_some_and(|registered| registered == class)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.read().tag_map.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.read().tag_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tag_map.is_empty()
    }

    // ---------------------------------------------------------------- encode

    /// Serializes `value` to compact JSON text.
    pub fn stringify(&self, value: &Value) -> Result<String, CodecError> {
        self.stringify_with(value, None, Space::None)
    }

    /// Serializes `value`, applying `replacer` to the resolved tree and
    /// indenting per `space`.
    pub fn stringify_with(
        &self,
        value: &Value,
        replacer: Option<Replacer<'_>>,
        space: impl Into<Space>,
    ) -> Result<String, CodecError> {
        let mut json = self.to_json(value)?;
        if let Some(replacer) = replacer {
            json = text::replace(replacer, "", json).unwrap_or(JsonValue::Null);
        }
        text::format(&json, &space.into())
    }

    /// Resolves `value` into a plain JSON tree with type tags embedded.
    pub fn to_json(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let mut walk = Walk::default();
        self.encode(value, &mut walk)
    }

    fn encode(&self, value: &Value, walk: &mut Walk) -> Result<JsonValue, CodecError> {
        let type_key = self.type_key();
        self.encode_value(value, &type_key, walk)
    }

    /// Encodes a value that has no parent class context.
    fn encode_value(
        &self,
        value: &Value,
        type_key: &str,
        walk: &mut Walk,
    ) -> Result<JsonValue, CodecError> {
        match value {
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::Number(n) => Ok(JsonValue::Number(n.clone())),
            Value::String(s) => Ok(JsonValue::String(s.clone())),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    walk.keys.push(i.to_string());
                    out.push(self.encode_value(item, type_key, walk)?);
                    walk.keys.pop();
                }
                Ok(JsonValue::Array(out))
            }
            Value::Object(obj) => {
                let class = obj.class().filter(|class| self.contains(class));
                self.encode_object(obj, class.as_ref(), type_key, walk)
            }
        }
    }

    fn encode_object(
        &self,
        obj: &Obj,
        class: Option<&Class>,
        type_key: &str,
        walk: &mut Walk,
    ) -> Result<JsonValue, CodecError> {
        if !walk.enter(obj) {
            return Err(CodecError::CircularReference {
                path: walk.pointer(),
            });
        }

        let mut map = Map::new();
        if let Some(class) = class {
            if obj.contains_key(type_key) {
                return Err(ConfigurationError::ReservedKey {
                    class: class.name().to_owned(),
                    key: type_key.to_owned(),
                }
                .into());
            }
            map.insert(type_key.to_owned(), JsonValue::String(class.name().to_owned()));
        }
        for (key, child) in obj.entries() {
            walk.keys.push(key.clone());
            let json = match class {
                Some(class) => self.encode_member(class, &key, &child, type_key, walk)?,
                None => self.encode_value(&child, type_key, walk)?,
            };
            walk.keys.pop();
            map.insert(key, json);
        }

        walk.leave(obj);
        Ok(JsonValue::Object(map))
    }

    /// Property route, then class route, then this registry.
    fn encode_member(
        &self,
        parent: &Class,
        key: &str,
        child: &Value,
        type_key: &str,
        walk: &mut Walk,
    ) -> Result<JsonValue, CodecError> {
        let descriptor = parent.descriptor();
        if let Some(target) = descriptor.property_target(parent.name(), key)? {
            return target.encode(child, walk);
        }
        if let Some(child_class) = child.class() {
            if let Some(target) = descriptor.class_target(parent.name(), &child_class)? {
                return target.encode(child, walk);
            }
        }
        self.encode_value(child, type_key, walk)
    }

    // ---------------------------------------------------------------- decode

    /// Parses JSON text, reconstructing instances of registered classes.
    pub fn parse(&self, text: &str) -> Result<Value, CodecError> {
        self.parse_with(text, None)
    }

    /// Parses JSON text, then applies `reviver` bottom-up.
    pub fn parse_with(&self, text: &str, reviver: Option<Reviver<'_>>) -> Result<Value, CodecError> {
        let json = text::decode(text)?;
        let value = self.from_json(&json)?;
        Ok(match reviver {
            Some(reviver) => text::revive(reviver, "", value).unwrap_or(Value::Null),
            None => value,
        })
    }

    /// Reconstructs a value from a decoded JSON tree.
    pub fn from_json(&self, json: &JsonValue) -> Result<Value, CodecError> {
        let type_key = self.type_key();
        self.decode_value(json, &type_key)
    }

    fn decode_value(&self, json: &JsonValue, type_key: &str) -> Result<Value, CodecError> {
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::Number(n) => Ok(Value::Number(n.clone())),
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.decode_value(item, type_key))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            JsonValue::Object(map) => match tag_of(map, type_key) {
                Some(tag) => self.decode_tagged(tag, map, type_key),
                None => {
                    let obj = Obj::new();
                    for (key, child) in map {
                        obj.set(key.clone(), self.decode_value(child, type_key)?);
                    }
                    Ok(Value::Object(obj))
                }
            },
        }
    }

    fn decode_tagged(
        &self,
        tag: &str,
        map: &Map<String, JsonValue>,
        type_key: &str,
    ) -> Result<Value, CodecError> {
        let class = self.resolve(tag).ok_or_else(|| CodecError::UnknownType {
            tag: tag.to_owned(),
        })?;
        let mut props = Vec::with_capacity(map.len().saturating_sub(1));
        for (key, child) in map {
            if key == type_key {
                continue;
            }
            props.push((key, self.decode_member(&class, key, child, type_key)?));
        }
        let obj = Obj::bare(class);
        for (key, value) in props {
            obj.set(key.clone(), value);
        }
        Ok(Value::Object(obj))
    }

    /// Property route is checked before the child's own tag.
    fn decode_member(
        &self,
        parent: &Class,
        key: &str,
        child: &JsonValue,
        type_key: &str,
    ) -> Result<Value, CodecError> {
        let descriptor = parent.descriptor();
        if let Some(target) = descriptor.property_target(parent.name(), key)? {
            return target.from_json(child);
        }
        if let JsonValue::Object(map) = child {
            if let Some(target) = descriptor.class_target_for_json(map) {
                return target.from_json(child);
            }
        }
        self.decode_value(child, type_key)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Registry {}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("type_key", &self.type_key())
            .field("tags", &self.tags())
            .finish()
    }
}

/// Only string values under the type key count as tags.
fn tag_of<'a>(map: &'a Map<String, JsonValue>, type_key: &str) -> Option<&'a str> {
    map.get(type_key).and_then(JsonValue::as_str)
}

/// State of one `stringify` traversal: the objects on the current path and
/// the keys leading to the current node.
#[derive(Default)]
struct Walk {
    ancestors: HashSet<*const ()>,
    keys: Vec<String>,
}

impl Walk {
    fn enter(&mut self, obj: &Obj) -> bool {
        self.ancestors.insert(obj.id())
    }

    fn leave(&mut self, obj: &Obj) {
        self.ancestors.remove(&obj.id());
    }

    /// JSON Pointer to the current node.
    fn pointer(&self) -> String {
        let mut out = String::new();
        for key in &self.keys {
            out.push('/');
            out.push_str(&key.replace('~', "~0").replace('/', "~1"));
        }
        out
    }
}
