use crate::classify::{classify, Classification, Scalar, Variable};
use crate::debug;
use crate::error::FlattenError;
use crate::record::{Record, Tags};
use crate::tags::{finalize, DiscoveredTags, IndexContext};
use crate::tree::Value;
use serde::Deserialize;
use std::io::Write;

const LOG_TARGET: &str = "flatten";

/// Joins path segments, e.g. `oscam__status__client`.
pub const SEPARATOR: &str = "__";

/// `node` tag value for leaves sitting directly under the document root.
pub const ROOT_NODE: &str = "__";

/// Tag naming the container a record's fields came from.
pub const NODE_TAG: &str = "node";

pub const DEFAULT_MAX_DEPTH: usize = 128;

/// What to do when a declared leaf cannot be coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// Abort the whole flatten call.
    #[default]
    FailFast,
    /// Drop the offending leaf and keep walking.
    SkipLeaf,
}

/// Flattens document trees into records.
///
/// Holds only immutable settings; every call to [`Flattener::flatten`] gets
/// its own accumulator, so one instance can serve many documents.
#[derive(Debug, Clone)]
pub struct Flattener {
    variables: Vec<Variable>,
    tag_keys: Vec<String>,
    policy: CoercionPolicy,
    max_depth: usize,
}

/// Per-call traversal state.
struct Accumulator<'a> {
    records: Vec<Record>,
    tags: DiscoveredTags,
    debug: Option<&'a mut dyn Write>,
}

impl Flattener {
    pub fn new(variables: Vec<Variable>, tag_keys: Vec<String>) -> Self {
        Flattener {
            variables,
            tag_keys,
            policy: CoercionPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_coercion_policy(mut self, policy: CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Flatten `root` into records carrying `caller_tags`.
    pub fn flatten(&self, root: &Value, caller_tags: &Tags) -> Result<Vec<Record>, FlattenError> {
        self.run(root, caller_tags, None)
    }

    /// Like [`Flattener::flatten`], also writing every visited leaf to `out`.
    ///
    /// Write failures are logged and stop the dump; they never change the
    /// records.
    pub fn flatten_observed(
        &self,
        root: &Value,
        caller_tags: &Tags,
        out: &mut dyn Write,
    ) -> Result<Vec<Record>, FlattenError> {
        let records = self.run(root, caller_tags, Some(&mut *out))?;
        if let Err(e) = out.flush() {
            log::warn!(target: LOG_TARGET, "Could not flush debug dump: {e}");
        }
        Ok(records)
    }

    fn run(
        &self,
        root: &Value,
        caller_tags: &Tags,
        debug: Option<&mut dyn Write>,
    ) -> Result<Vec<Record>, FlattenError> {
        let mut acc = Accumulator {
            records: Vec::new(),
            tags: DiscoveredTags::default(),
            debug,
        };
        self.walk(&mut acc, root, "", "", &IndexContext::new(), 0)?;

        log::debug!(
            target: LOG_TARGET,
            "Flattened {} record(s), {} global tag(s), {} scoped tag(s)",
            acc.records.len(),
            acc.tags.global.len(),
            acc.tags.scoped.len()
        );
        Ok(finalize(acc.records, caller_tags, &acc.tags))
    }

    fn walk(
        &self,
        acc: &mut Accumulator<'_>,
        node: &Value,
        container: &str,
        name: &str,
        index: &IndexContext,
        depth: usize,
    ) -> Result<(), FlattenError> {
        let name = sanitize_name(name);
        let path = join_path(container, &name);
        if depth > self.max_depth {
            return Err(FlattenError::DepthLimitExceeded {
                path,
                limit: self.max_depth,
            });
        }

        let leaf = match node {
            Value::Null => return Ok(()),
            Value::String(s) if s.is_empty() => return Ok(()),
            Value::String(s) => Scalar::String(s.as_str()),
            Value::Number(n) => Scalar::Number(*n),
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    let mut element = index.clone();
                    element.insert(name.clone(), i.to_string());
                    self.walk(acc, item, container, &name, &element, depth + 1)?;
                }
                return Ok(());
            }
            Value::Mapping(entries) => {
                for (key, child) in entries {
                    self.walk(acc, child, &path, key, index, depth + 1)?;
                }
                return Ok(());
            }
        };
        self.visit_leaf(acc, leaf, container, name, path, index)
    }

    fn visit_leaf(
        &self,
        acc: &mut Accumulator<'_>,
        leaf: Scalar<'_>,
        container: &str,
        name: String,
        path: String,
        index: &IndexContext,
    ) -> Result<(), FlattenError> {
        if let Some(out) = acc.debug.as_deref_mut() {
            if let Err(e) = debug::write_leaf(out, &path, &leaf) {
                log::warn!(target: LOG_TARGET, "Debug dump disabled after write error: {e}");
                acc.debug = None;
            }
        }

        let classification = match classify(&path, leaf, &self.variables) {
            Ok(c) => c,
            Err(source) => match self.policy {
                CoercionPolicy::FailFast => {
                    return Err(FlattenError::CoercionParseFailure {
                        path,
                        value: leaf.to_string(),
                        source,
                    });
                }
                CoercionPolicy::SkipLeaf => {
                    log::warn!(target: LOG_TARGET, "Skipping {path}: cannot coerce \"{leaf}\": {source}");
                    return Ok(());
                }
            },
        };

        let (value, text) = match classification {
            Classification::Ignore => return Ok(()),
            Classification::Tag(text) => (None, text),
            Classification::Field { value, text } => (Some(value), text),
        };

        if self.is_tag_key(&path) {
            acc.tags.gather(path, text, index);
            return Ok(());
        }

        // Strings that are not tag keys carry nothing measurable.
        let Some(value) = value else {
            return Ok(());
        };

        let mut record = Record::default();
        let node = if container.is_empty() { ROOT_NODE } else { container };
        record.tags.insert(NODE_TAG.to_string(), node.to_string());
        record
            .tags
            .extend(index.iter().map(|(k, v)| (k.clone(), v.clone())));
        record.fields.insert(name, value);
        acc.records.push(record);
        Ok(())
    }

    fn is_tag_key(&self, path: &str) -> bool {
        self.tag_keys.iter().any(|k| k == path)
    }
}

/// Strip characters that would make a dotted path ambiguous.
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(|c| !matches!(c, '-' | '.')).collect()
}

fn join_path(container: &str, name: &str) -> String {
    if container.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", container, SEPARATOR, name)
    }
}
