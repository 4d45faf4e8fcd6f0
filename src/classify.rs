use crate::error::CoercionError;
use crate::record::FieldValue;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;

/// Picks the numeric core out of a decorated string such as `"10 MB"` or
/// `"id_0x60AD4140F"`.
static NUMERIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^0-9]*(0x[0-9A-Fa-f]+|[0-9.,A-Fa-f]+)[^0-9]*").expect("numeric pattern is valid")
});

// ── Variable declarations ───────────────────────────────────────────

/// The type a string leaf is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Bool,
    Int,
    Float,
    Duration,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VariableKind::Bool => "bool",
            VariableKind::Int => "int",
            VariableKind::Float => "float",
            VariableKind::Duration => "duration",
            VariableKind::Unknown => "unknown",
        })
    }
}

/// A declared coercion for the string leaf at `name`.
///
/// `name` is the full dotted path of the leaf, segments joined with `__`
/// (e.g. `oscam__status__client__au`). `parameter` is only read for `int`
/// variables, where it holds the numeric base.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Variable {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(rename = "type", alias = "Type", default)]
    pub kind: VariableKind,
    #[serde(alias = "Parameter", default)]
    pub parameter: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Variable {
            name: name.into(),
            kind,
            parameter: String::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = parameter.into();
        self
    }

    /// The integer base requested by `parameter`; 0 means auto-detect.
    pub fn int_base(&self) -> Result<u32, CoercionError> {
        if self.parameter.is_empty() {
            return Ok(0);
        }
        let base = parse_int(&self.parameter, 0)
            .ok()
            .and_then(|b| u32::try_from(b).ok())
            .filter(|b| (2..=36).contains(b));
        base.ok_or_else(|| CoercionError::InvalidBase(self.parameter.clone()))
    }
}

// ── Leaves ──────────────────────────────────────────────────────────

/// The kind of a leaf, carried alongside its value for the debug dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    String,
    Number,
    Bool,
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LeafKind::String => "string",
            LeafKind::Number => "number",
            LeafKind::Bool => "bool",
        })
    }
}

/// A borrowed scalar leaf of the document tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    String(&'a str),
    Number(f64),
    Bool(bool),
}

impl Scalar<'_> {
    pub fn kind(&self) -> LeafKind {
        match self {
            Scalar::String(_) => LeafKind::String,
            Scalar::Number(_) => LeafKind::Number,
            Scalar::Bool(_) => LeafKind::Bool,
        }
    }
}

impl fmt::Display for Scalar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// What a leaf turned into before the tag-key check.
///
/// `text` is the string a leaf contributes when its path is a tag key.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Field { value: FieldValue, text: String },
    Tag(String),
    Ignore,
}

/// Classify the leaf at `path`.
///
/// Numbers and booleans are fields. Strings are tags unless a variable is
/// declared for `path`, in which case they are coerced to the declared type.
/// Variables of kind `duration` or `unknown` make the leaf ignored.
pub fn classify(
    path: &str,
    leaf: Scalar<'_>,
    variables: &[Variable],
) -> Result<Classification, CoercionError> {
    match leaf {
        Scalar::Number(n) => Ok(Classification::Field {
            value: FieldValue::Float(n),
            text: format!("{:.2}", n),
        }),
        Scalar::Bool(b) => Ok(Classification::Field {
            value: FieldValue::Boolean(b),
            text: b.to_string(),
        }),
        Scalar::String("") => Ok(Classification::Ignore),
        Scalar::String(s) => match variables.iter().find(|v| v.name == path) {
            Some(variable) => coerce(variable, s),
            None => Ok(Classification::Tag(s.to_string())),
        },
    }
}

/// Coerce `raw` to the type declared by `variable`.
pub fn coerce(variable: &Variable, raw: &str) -> Result<Classification, CoercionError> {
    match variable.kind {
        VariableKind::Float => {
            let text = extract_numeric(raw).ok_or(CoercionError::NoNumericValue)?;
            let parsed: f32 = text.parse()?;
            if !parsed.is_finite() {
                return Err(CoercionError::FloatOutOfRange);
            }
            Ok(Classification::Field {
                value: FieldValue::Float(f64::from(parsed)),
                text: text.to_string(),
            })
        }
        VariableKind::Int => {
            let base = variable.int_base()?;
            let text = extract_numeric(raw).ok_or(CoercionError::NoNumericValue)?;
            Ok(Classification::Field {
                value: FieldValue::Integer(parse_int(text, base)?),
                text: text.to_string(),
            })
        }
        VariableKind::Bool => {
            let trimmed = raw.trim();
            if let Some(b) = parse_bool(trimmed) {
                return Ok(Classification::Field {
                    value: FieldValue::Boolean(b),
                    text: trimmed.to_string(),
                });
            }
            let text = extract_numeric(raw).ok_or(CoercionError::NoNumericValue)?;
            let b = parse_bool(text).ok_or(CoercionError::Bool)?;
            Ok(Classification::Field {
                value: FieldValue::Boolean(b),
                text: text.to_string(),
            })
        }
        VariableKind::Duration | VariableKind::Unknown => Ok(Classification::Ignore),
    }
}

/// Extract the numeric or hex core of a decorated string.
pub fn extract_numeric(raw: &str) -> Option<&str> {
    NUMERIC_PATTERN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

/// Parse a signed integer in `base`; base 0 picks the base from the prefix
/// (`0x`, `0o`, `0b`, or a leading `0` for octal).
fn parse_int(text: &str, base: u32) -> Result<i64, CoercionError> {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match base {
        0 => detect_base(unsigned),
        16 => (16, strip_prefix_ci(unsigned, "0x").unwrap_or(unsigned)),
        _ => (base, unsigned),
    };
    Ok(i64::from_str_radix(&format!("{}{}", sign, digits), radix)?)
}

fn detect_base(s: &str) -> (u32, &str) {
    if let Some(rest) = strip_prefix_ci(s, "0x") {
        (16, rest)
    } else if let Some(rest) = strip_prefix_ci(s, "0b") {
        (2, rest)
    } else if let Some(rest) = strip_prefix_ci(s, "0o") {
        (8, rest)
    } else if s.len() > 1 && s.starts_with('0') {
        (8, &s[1..])
    } else {
        (10, s)
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&s[prefix.len()..]),
        _ => None,
    }
}
