use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A value on the host side of the sandbox boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Absence of a value (`null` and `undefined` both map here)
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// An atomic identifier, passed to scripts by name
    Symbol(String),
    List(Vec<HostValue>),
    /// Ordered key/value pairs; keys are coerced to strings on the script side
    Map(Vec<(HostValue, HostValue)>),
    /// Any other host type, carried as its textual representation
    Opaque(String),
}

impl HostValue {
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    pub fn opaque(value: impl fmt::Display) -> Self {
        Self::Opaque(value.to_string())
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<HostValue>,
        V: Into<HostValue>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The string a map key becomes on the script side.
    pub fn key_string(&self) -> String {
        match self {
            Self::Symbol(name) => name.clone(),
            Self::Text(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Text(s) | Self::Opaque(s) => f.write_str(s),
            Self::Symbol(name) => f.write_str(name),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key.key_string(), value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) | Self::Symbol(s) | Self::Opaque(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.key_string(), value)?;
                }
                map.end()
            }
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::Text(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Self::Text(k), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_string_coercion() {
        assert_eq!(HostValue::symbol("name").key_string(), "name");
        assert_eq!(HostValue::from("text key").key_string(), "text key");
        assert_eq!(HostValue::Int(7).key_string(), "7");
        assert_eq!(HostValue::Bool(false).key_string(), "false");
    }

    #[test]
    fn test_display_forms() {
        let value = HostValue::map([
            (HostValue::symbol("a"), HostValue::Int(1)),
            (HostValue::from("b"), HostValue::from(vec![2, 3])),
        ]);
        assert_eq!(value.to_string(), "{a: 1, b: [2, 3]}");
        assert_eq!(HostValue::Float(1.5).to_string(), "1.5");
        assert_eq!(HostValue::Null.to_string(), "");
    }

    #[test]
    fn test_from_json() {
        let value = HostValue::from(serde_json::json!({"a": 1, "b": [2.5, null, "x"]}));
        assert_eq!(
            value,
            HostValue::Map(vec![
                (HostValue::from("a"), HostValue::Int(1)),
                (
                    HostValue::from("b"),
                    HostValue::List(vec![
                        HostValue::Float(2.5),
                        HostValue::Null,
                        HostValue::from("x"),
                    ])
                ),
            ])
        );
    }

    #[test]
    fn test_serialize_uses_coerced_keys() {
        let value = HostValue::map([(HostValue::Int(1), HostValue::symbol("one"))]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"1":"one"}"#);
    }
}
