use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{self, DateTime, Utc};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::util::{f64_to_i64_safe, millis_to_datetime};

/// An attribute value is one scalar supplied by the caller in an [Attributes] set, or one
/// reference value configured on a [crate::Constraint].
///
/// Signed integers of every width are stored as [AttributeValue::Int] and unsigned ones as
/// [AttributeValue::UInt], so operators only ever compare 64-bit values. Byte sequences can be
/// built in code but are never produced by deserialization.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Stores a boolean.
    Bool(bool),
    /// Stores a signed integer.
    Int(i64),
    /// Stores an unsigned integer too large for [AttributeValue::Int], or one built from an
    /// unsigned Rust type.
    UInt(u64),
    /// Stores a floating point number.
    Float(f64),
    /// Stores a string.
    String(String),
    /// Stores a byte sequence.
    #[serde(skip_deserializing)]
    Bytes(Vec<u8>),
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> AttributeValue {
        AttributeValue::String(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> AttributeValue {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> AttributeValue {
        AttributeValue::Bool(b)
    }
}

impl From<i32> for AttributeValue {
    fn from(i: i32) -> Self {
        AttributeValue::Int(i.into())
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<u32> for AttributeValue {
    fn from(u: u32) -> Self {
        AttributeValue::UInt(u.into())
    }
}

impl From<u64> for AttributeValue {
    fn from(u: u64) -> Self {
        AttributeValue::UInt(u)
    }
}

impl From<f32> for AttributeValue {
    fn from(f: f32) -> Self {
        AttributeValue::Float(f.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        AttributeValue::Float(f)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(bytes: Vec<u8>) -> Self {
        AttributeValue::Bytes(bytes)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(bytes: &[u8]) -> Self {
        AttributeValue::Bytes(bytes.to_vec())
    }
}

impl AttributeValue {
    /// Returns None unless self is a String. It will not convert.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a signed 64-bit integer. Only signed integers convert.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an unsigned 64-bit integer. Only unsigned integers convert.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttributeValue::UInt(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns None unless self is a Float. It will not convert.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns None unless self is a bool. It will not convert.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as text for strings and byte sequences, and None otherwise.
    ///
    /// Byte sequences that are not valid UTF-8 are converted lossily.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            AttributeValue::String(s) => Some(Cow::Borrowed(s)),
            AttributeValue::Bytes(b) => Some(String::from_utf8_lossy(b)),
            _ => None,
        }
    }

    /// Attempt to convert any of the following into a chrono::DateTime in UTC:
    ///  * RFC3339/ISO8601 timestamp (example: "2016-04-16T17:09:12.759-07:00")
    ///  * Unix epoch milliseconds as an integer or a whole float
    /// It will return None if the conversion fails or if no conversion is possible.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Int(millis) => millis_to_datetime(*millis),
            AttributeValue::UInt(millis) => {
                i64::try_from(*millis).ok().and_then(millis_to_datetime)
            }
            AttributeValue::Float(millis) => f64_to_i64_safe(*millis).and_then(millis_to_datetime),
            AttributeValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok(),
            AttributeValue::Bool(_) => None,
            other => {
                warn!(
                    "Don't know how or whether to convert attribute value {:?} to datetime",
                    other
                );
                None
            }
        }
    }
}

/// The request-time attribute set an evaluation is made against.
///
/// A name that is absent reads as None, which the existence operators distinguish from every
/// legal value. JSON `null` entries are treated as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(HashMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the named attribute, or None if it is missing.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style variant of [Attributes::insert].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, Option<AttributeValue>>::deserialize(deserializer)?;
        Ok(Attributes(
            raw.into_iter()
                .filter_map(|(k, v)| v.map(|v| (k, v)))
                .collect(),
        ))
    }
}

impl From<HashMap<String, AttributeValue>> for Attributes {
    fn from(map: HashMap<String, AttributeValue>) -> Self {
        Attributes(map)
    }
}

impl<S, T> FromIterator<(S, T)> for Attributes
where
    String: From<S>,
    AttributeValue: From<T>,
{
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        Attributes(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
