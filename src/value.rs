//! Document-tree types for converted XML values

use indexmap::map::{IntoIter, Iter, IterMut, Keys, Values};
use indexmap::IndexMap;
use std::ops::Index;

/// A value in the document tree
///
/// A parsed element is `Null` (empty element), `Text` (character data
/// only), a `Node` (attributes and/or child elements), or a `List`
/// when the same tag repeats as a sibling.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / empty element
    #[default]
    Null,
    /// Character data
    Text(String),
    /// Element with attributes and children (key-value pairs with
    /// order preservation)
    Node(Node),
    /// Repeated sibling elements, in encounter order
    List(Vec<Value>),
}

impl Value {
    /// Returns true if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if this value is character data
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns true if this value is a node
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Returns true if this value is a list
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Returns the text if this is character data, None otherwise
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the node if this is a node, None otherwise
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the list if this is a list, None otherwise
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns a mutable reference to the node if this is a node
    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Returns a mutable reference to the list if this is a list
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Looks up a child value by key if this is a node
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_node().and_then(|n| n.get(key))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Self::Node(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self::Node(Node(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// An order-preserving node (map of string keys to values)
///
/// Keys prefixed with the configured attribute marker denote XML
/// attributes; the configured text key denotes character data; all
/// other keys denote child elements. Insertion order is preserved so
/// emission reproduces document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node(pub(crate) IndexMap<String, Value>);

impl Node {
    /// Creates a new empty node
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Creates a new node with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self(IndexMap::with_capacity(capacity))
    }

    /// Returns the number of key-value pairs in the node
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the node contains no key-value pairs
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a reference to the value corresponding to the key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a mutable reference to the value corresponding to the key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Inserts a key-value pair into the node
    ///
    /// Returns the previous value if the key already existed. The key
    /// keeps its original insertion position in that case.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a key from the node, preserving the order of the
    /// remaining entries
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Returns true if the node contains the specified key
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns an iterator over the keys
    pub fn keys(&self) -> Keys<'_, String, Value> {
        self.0.keys()
    }

    /// Returns an iterator over the values
    pub fn values(&self) -> Values<'_, String, Value> {
        self.0.values()
    }

    /// Returns an iterator over key-value pairs
    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Returns an iterator that allows modifying each value
    pub fn iter_mut(&mut self) -> IterMut<'_, String, Value> {
        self.0.iter_mut()
    }
}

impl Index<&str> for Node {
    type Output = Value;

    #[allow(clippy::indexing_slicing)]
    fn index(&self, key: &str) -> &Self::Output {
        &self.0[key]
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Node {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<IndexMap<String, Value>> for Node {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Node {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::{Node, Value};
    use serde::de::{self, MapAccess, SeqAccess, Visitor};
    use serde::ser::{SerializeMap, SerializeSeq};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Self::Null => serializer.serialize_unit(),
                Self::Text(s) => serializer.serialize_str(s),
                Self::List(items) => {
                    let mut seq = serializer.serialize_seq(Some(items.len()))?;
                    for item in items {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                }
                Self::Node(node) => node.serialize(serializer),
            }
        }
    }

    impl Serialize for Node {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.len()))?;
            for (key, value) in self.iter() {
                map.serialize_entry(key, value)?;
            }
            map.end()
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Value;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("null, a string, a sequence, or a map")
        }

        fn visit_unit<E>(self) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Null)
        }

        fn visit_none<E>(self) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Null)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }

        fn visit_bool<E>(self, v: bool) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Text(v.to_string()))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Text(v.to_string()))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Text(v.to_string()))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Text(v.to_string()))
        }

        fn visit_str<E>(self, v: &str) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Text(v.to_owned()))
        }

        fn visit_string<E>(self, v: String) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::Text(v))
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
            let mut items = Vec::new();
            while let Some(item) = seq.next_element()? {
                items.push(item);
            }
            Ok(Value::List(items))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
            let mut node = Node::new();
            while let Some((key, value)) = access.next_entry::<String, Value>()? {
                node.insert(key, value);
            }
            Ok(Value::Node(node))
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }
    }
}
