//! Dynamic values stored in tracked records.
//!
//! Records are plain mutable maps from string keys to [`Value`]. A record has
//! identity: two `RawObject` handles are the same object iff they point at the
//! same allocation, and writes compare object values by identity, never by
//! content.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Error as _, Serialize, SerializeMap, Serializer};

use super::dep::TargetId;
use super::object::Reactive;

/// A value held by a tracked record, a property, or a ref.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A plain record. Reading it through a [`Reactive`] wraps it.
    Object(RawObject),
    /// A wrapped record.
    Reactive(Reactive),
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

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// The underlying record of an object or reactive value.
    pub fn as_raw(&self) -> Option<RawObject> {
        match self {
            Value::Object(raw) => Some(raw.clone()),
            Value::Reactive(r) => Some(r.raw()),
            _ => None,
        }
    }

    /// Strip wrappers so raw records never store wrappers.
    pub(crate) fn into_raw(self) -> Value {
        match self {
            Value::Reactive(r) => Value::Object(r.raw()),
            other => other,
        }
    }

    /// Text form used for host text content.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Object(_) | Value::Reactive(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

/// Strict inequality: scalars by value (so `NaN != NaN`, and `1 == 1.0`),
/// records by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(raw) => write!(f, "Object({:?})", raw.id()),
            Value::Reactive(r) => write!(f, "Reactive({:?})", r.raw().id()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Value::Object(raw)
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                // Arrays become records keyed by index.
                let raw = RawObject::new();
                for (i, item) in items.into_iter().enumerate() {
                    raw.insert(i.to_string(), Value::from(item));
                }
                Value::Object(raw)
            }
            serde_json::Value::Object(map) => {
                let raw = RawObject::new();
                for (key, item) in map {
                    raw.insert(key, Value::from(item));
                }
                Value::Object(raw)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Object(raw) => raw.serialize(serializer),
            Value::Reactive(r) => r.raw().serialize(serializer),
        }
    }
}

struct RawBody {
    id: TargetId,
    fields: RefCell<IndexMap<Rc<str>, Value>>,
}

/// A plain mutable record with identity. Mutating it directly is not tracked.
#[derive(Clone)]
pub struct RawObject {
    body: Rc<RawBody>,
}

impl RawObject {
    pub fn new() -> Self {
        Self {
            body: Rc::new(RawBody {
                id: TargetId::new(),
                fields: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Build a record from a JSON object. Non-object JSON yields an empty record.
    pub fn from_json(json: serde_json::Value) -> Self {
        match Value::from(json) {
            Value::Object(raw) => raw,
            _ => RawObject::new(),
        }
    }

    /// Identity used by the dependency store and the wrapper cache.
    pub fn id(&self) -> TargetId {
        self.body.id
    }

    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.body.fields.borrow().get(key).cloned()
    }

    /// Insert without tracking. Returns the previous value.
    pub fn insert(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
        self.body
            .fields
            .borrow_mut()
            .insert(key.into(), value.into().into_raw())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.body.fields.borrow_mut().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.body.fields.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        self.body.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.body.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.fields.borrow().is_empty()
    }

    pub(crate) fn fields(&self) -> Ref<'_, IndexMap<Rc<str>, Value>> {
        self.body.fields.borrow()
    }

    pub(crate) fn fields_mut(&self) -> RefMut<'_, IndexMap<Rc<str>, Value>> {
        self.body.fields.borrow_mut()
    }
}

impl Default for RawObject {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields().iter()).finish()
    }
}

thread_local! {
    /// Records currently being serialized on this thread.
    static SERIALIZING: RefCell<HashSet<TargetId>> = RefCell::new(HashSet::new());
}

/// Marks a record as in progress until dropped.
struct SerializeGuard {
    id: TargetId,
}

impl SerializeGuard {
    fn enter(id: TargetId) -> Option<Self> {
        SERIALIZING
            .with(|active| active.borrow_mut().insert(id))
            .then_some(Self { id })
    }
}

impl Drop for SerializeGuard {
    fn drop(&mut self) {
        SERIALIZING.with(|active| active.borrow_mut().remove(&self.id));
    }
}

impl Serialize for RawObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(_guard) = SerializeGuard::enter(self.id()) else {
            return Err(S::Error::custom("record contains itself"));
        };
        let fields = self.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in fields.iter() {
            map.serialize_entry(&**key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_inequality() {
        assert_eq!(Value::from(1), Value::from(1));
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(1), Value::from(1.5));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::from("a"), Value::from("a".to_string()));

        let a = RawObject::new();
        let b = RawObject::new();
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(RawObject::new()), Value::from(b));
    }

    #[test]
    fn json_round_trip_shape() {
        let raw = RawObject::from_json(json!({
            "name": "ripple",
            "count": 3,
            "nested": { "ok": true },
        }));

        assert_eq!(raw.get("name"), Some(Value::from("ripple")));
        assert_eq!(raw.get("count"), Some(Value::from(3)));
        let nested = raw.get("nested").and_then(|v| v.as_raw()).unwrap();
        assert_eq!(nested.get("ok"), Some(Value::from(true)));

        let text = serde_json::to_value(Value::from(raw)).unwrap();
        assert_eq!(text, json!({ "name": "ripple", "count": 3, "nested": { "ok": true } }));
    }

    #[test]
    fn self_containing_record_fails_to_serialize() {
        let raw = RawObject::from_json(json!({ "a": 1 }));
        raw.insert("me", raw.clone());

        assert!(serde_json::to_value(&raw).is_err());
        assert_eq!(Value::from(raw.clone()).to_display_string(), "");

        // A record reachable twice without a cycle is fine.
        let shared = RawObject::from_json(json!({ "x": 1 }));
        let parent = RawObject::new();
        parent.insert("left", shared.clone());
        parent.insert("right", shared);
        assert_eq!(
            serde_json::to_value(&parent).unwrap(),
            json!({ "left": { "x": 1 }, "right": { "x": 1 } })
        );

        // Breaking the cycle releases the in-progress marker.
        raw.remove("me");
        assert_eq!(serde_json::to_value(&raw).unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn display_strings() {
        assert_eq!(Value::Null.to_display_string(), "");
        assert_eq!(Value::from(42).to_display_string(), "42");
        assert_eq!(Value::from("hi").to_display_string(), "hi");
    }
}
