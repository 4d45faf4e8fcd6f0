pub mod classify;
pub mod config;
pub mod debug;
pub mod decode;
pub mod error;
pub mod flatten;
pub mod from_xml;
pub mod line_protocol;
pub mod measurement;
pub mod record;
pub mod tags;
pub mod tree;

use std::io::Write;

pub use classify::{Variable, VariableKind};
pub use config::Config;
pub use decode::{decode, InputFormat};
pub use error::{ConfigError, DecodeError, Error, FlattenError, Result};
pub use flatten::{CoercionPolicy, Flattener};
pub use measurement::Measurement;
pub use record::{FieldValue, Record, Tags};
pub use tree::Value;

// ── Core API ───────────────────────────────────────────────────────

/// Flatten a decoded document into records.
///
/// Every record carries `caller_tags` (typically `url` and `server`), the
/// `node` tag naming the container its field came from, and the index and
/// discovered tags that apply to it.
pub fn flatten(
    root: &Value,
    caller_tags: &Tags,
    variables: &[Variable],
    tag_keys: &[String],
) -> Result<Vec<Record>, FlattenError> {
    Flattener::new(variables.to_vec(), tag_keys.to_vec()).flatten(root, caller_tags)
}

/// Decode and flatten a raw response body as configured.
///
/// An empty body yields no records. When `debug` is given every visited leaf
/// is also written to it.
pub fn process(
    body: &[u8],
    config: &Config,
    caller_tags: &Tags,
    debug: Option<&mut dyn Write>,
) -> Result<Vec<Record>> {
    let Some(root) = decode(body, config.input_format, config.max_depth)? else {
        return Ok(Vec::new());
    };
    let flattener = config.flattener();
    let records = match debug {
        Some(out) => flattener.flatten_observed(&root, caller_tags, out)?,
        None => flattener.flatten(&root, caller_tags)?,
    };
    Ok(records)
}
