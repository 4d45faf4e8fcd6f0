use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A measured value attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

pub type Fields = BTreeMap<String, FieldValue>;
pub type Tags = BTreeMap<String, String>;

/// One flattened measurement: at least one field plus its tags.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    pub fields: Fields,
    pub tags: Tags,
}

impl Record {
    /// The `node` tag: the dotted path of the container the fields came from.
    pub fn node(&self) -> Option<&str> {
        self.tags.get(crate::flatten::NODE_TAG).map(String::as_str)
    }
}
