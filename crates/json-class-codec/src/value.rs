//! Dynamic object graph handled by the codec.
//!
//! [`Value`] mirrors the JSON data model, except that objects are shared
//! handles ([`Obj`]) which may carry a [`Class`]. Cloning an [`Obj`] clones
//! the handle, so the same object can be reachable from several places and
//! graphs may contain cycles.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};

use crate::class::Class;

/// A node of an object graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(Obj),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The class of an object value, `None` for plain objects and non-objects.
    pub fn class(&self) -> Option<Class> {
        self.as_obj().and_then(Obj::class)
    }

    /// `instanceof` check: `true` only for objects of exactly `class`.
    pub fn is_instance_of(&self, class: &Class) -> bool {
        self.as_obj().is_some_and(|obj| obj.is_instance_of(class))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

/// Non-finite floats become `null`, as in JSON text.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(arr: Vec<Value>) -> Self {
        Value::Array(arr)
    }
}

impl From<Obj> for Value {
    fn from(obj: Obj) -> Self {
        Value::Object(obj)
    }
}

/// Plain JSON converts into plain (class-less) objects.
impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

struct ObjData {
    class: Option<Class>,
    props: IndexMap<String, Value>,
}

/// Shared handle to an object: an optional class plus own properties in
/// insertion order.
#[derive(Clone)]
pub struct Obj(Rc<RefCell<ObjData>>);

impl Obj {
    /// Creates an empty plain object.
    pub fn new() -> Self {
        Self::with_class(None)
    }

    /// Creates an empty instance of `class` without running its constructor.
    pub(crate) fn bare(class: Class) -> Self {
        Self::with_class(Some(class))
    }

    fn with_class(class: Option<Class>) -> Self {
        Obj(Rc::new(RefCell::new(ObjData {
            class,
            props: IndexMap::new(),
        })))
    }

    pub fn class(&self) -> Option<Class> {
        self.0.borrow().class.clone()
    }

    pub fn is_instance_of(&self, class: &Class) -> bool {
        self.0.borrow().class.as_ref() == Some(class)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().props.get(key).cloned()
    }

    /// Sets an own property, returning the previous value.
    ///
    /// Existing keys keep their position.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().props.insert(key.into(), value.into())
    }

    /// Removes an own property, preserving the order of the others.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().props.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().props.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().props.keys().cloned().collect()
    }

    /// Snapshot of the own properties. Nested objects are shared, not copied.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .props
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().props.is_empty()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Obj {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let obj = Obj::new();
        for (k, v) in iter {
            obj.set(k, v);
        }
        obj
    }
}

/// Structural equality: same class and recursively equal properties.
///
/// Comparing graphs that contain cycles does not terminate unless the cycle
/// closes on identical handles.
impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let a = self.0.borrow();
        let b = other.0.borrow();
        a.class == b.class && a.props == b.props
    }
}

/// Nested objects are printed shallowly so cyclic graphs can be debugged.
impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        if let Some(class) = &data.class {
            write!(f, "{} ", class.name())?;
        }
        f.debug_map()
            .entries(data.props.iter().map(|(k, v)| (k, Shallow(v))))
            .finish()
    }
}

struct Shallow<'a>(&'a Value);

impl fmt::Debug for Shallow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Object(obj) => match obj.class() {
                Some(class) => write!(f, "{} {{ .. }}", class.name()),
                None => f.write_str("{ .. }"),
            },
            Value::Array(arr) => write!(f, "[ {} items ]", arr.len()),
            other => fmt::Debug::fmt(other, f),
        }
    }
}
