use crate::classify::VariableKind;
use std::path::PathBuf;
use thiserror::Error;

/// Why a declared variable could not be coerced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("no numeric value found")]
    NoNumericValue,

    #[error("invalid float: {0}")]
    Float(#[from] std::num::ParseFloatError),

    #[error("float out of range")]
    FloatOutOfRange,

    #[error("invalid integer: {0}")]
    Int(#[from] std::num::ParseIntError),

    #[error("invalid integer base \"{0}\"")]
    InvalidBase(String),

    #[error("invalid boolean literal")]
    Bool,
}

/// Errors raised while walking a document tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlattenError {
    /// A declared leaf could not be coerced to its declared type.
    #[error("{path}: cannot coerce \"{value}\": {source}")]
    CoercionParseFailure {
        path: String,
        value: String,
        #[source]
        source: CoercionError,
    },

    #[error("{path}: document nests deeper than {limit} levels")]
    DepthLimitExceeded { path: String, limit: usize },
}

/// Errors raised while decoding a raw body into a tree.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid XML at byte {offset}: {message}")]
    Xml { message: String, offset: usize },
}

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading configuration file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("variable \"{name}\": type \"{kind}\" is not supported")]
    UnsupportedVariableKind { name: String, kind: VariableKind },

    #[error("variable \"{name}\": invalid integer base \"{parameter}\"")]
    InvalidIntBase { name: String, parameter: String },

    #[error("max_depth must be at least 1")]
    ZeroMaxDepth,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid source URL \"{url}\": {source}")]
    InvalidSourceUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
