use std::fmt;
use std::mem;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter, Keys};
use serde::Serialize;

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    /// A nested property group. Shared, so inheriting a group is a pointer copy.
    Group(Arc<PropertyMap>),
}

impl From<PropertyMap> for Value {
    fn from(map: PropertyMap) -> Self {
        Value::Group(Arc::new(map))
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::Group(_) => "Group",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&PropertyMap> {
        match self {
            Value::Group(map) => Some(&**map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => {
                // keep floats visually distinct from integers
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Group(map) => write!(f, "{}", map),
        }
    }
}

/// An insertion-ordered mapping from property key to value.
///
/// Overwriting a key keeps its original position, so inherited keys stay
/// ahead of keys a derived class introduces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PropertyMap(IndexMap<String, Value>);

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap(IndexMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Look up a value through nested groups, e.g. `"stats.hp"`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_group()?.get(segment)?;
        }
        Some(current)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_group(&self, key: &str) -> Option<&PropertyMap> {
        self.get(key).and_then(Value::as_group)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Apply `convert` to the value stored under `key`, if any.
    pub fn convert<T>(&self, key: &str, convert: impl FnOnce(&Value) -> T) -> Option<T> {
        self.get(key).map(convert)
    }

    /// Set `key`, replacing any previous value wholesale.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Set `key`, merging key-wise when both the existing and the incoming
    /// value are groups. Anything else replaces the existing value.
    pub fn merge_value(&mut self, key: String, incoming: Value) {
        self.merge(PropertyMap(IndexMap::from([(key, incoming)])));
    }

    /// Merge every entry of `other` into this map, last write wins per key.
    ///
    /// Group pairs are merged with an explicit stack of half-merged maps, so
    /// the depth of the values never turns into call-stack depth.
    pub fn merge(&mut self, other: PropertyMap) {
        struct Frame {
            target: PropertyMap,
            incoming: IntoIter<String, Value>,
            /// Key of `target` in the frame below.
            key: String,
        }

        let mut stack = vec![Frame {
            target: mem::take(self),
            incoming: other.into_iter(),
            key: String::new(),
        }];

        while let Some(frame) = stack.last_mut() {
            match frame.incoming.next() {
                Some((key, Value::Group(incoming))) => match frame.target.0.get_mut(&key) {
                    Some(Value::Group(existing)) => {
                        if Arc::ptr_eq(existing, &incoming) {
                            continue;
                        }
                        let target = Arc::unwrap_or_clone(mem::take(existing));
                        let incoming = Arc::unwrap_or_clone(incoming);
                        stack.push(Frame {
                            target,
                            incoming: incoming.into_iter(),
                            key,
                        });
                    }
                    _ => {
                        frame.target.0.insert(key, Value::Group(incoming));
                    }
                },
                Some((key, value)) => {
                    frame.target.0.insert(key, value);
                }
                None => {
                    let Some(done) = stack.pop() else { break };
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.target.0.insert(done.key, Value::from(done.target));
                        }
                        None => *self = done.target,
                    }
                }
            }
        }
    }
}

impl Drop for PropertyMap {
    /// Unlinks nested groups onto a heap stack instead of recursing into them.
    fn drop(&mut self) {
        let mut pending: Vec<PropertyMap> = Vec::new();
        let mut current = mem::take(&mut self.0);
        loop {
            for (_, value) in current.drain(..) {
                if let Value::Group(group) = value {
                    if let Some(map) = Arc::into_inner(group) {
                        pending.push(map);
                    }
                }
            }
            match pending.pop() {
                Some(mut map) => current = mem::take(&mut map.0),
                None => break,
            }
        }
    }
}

impl fmt::Display for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl IntoIterator for PropertyMap {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(mut self) -> Self::IntoIter {
        mem::take(&mut self.0).into_iter()
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        PropertyMap(iter.into_iter().collect())
    }
}
