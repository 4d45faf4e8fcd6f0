use crate::classify::{Variable, VariableKind};
use crate::decode::InputFormat;
use crate::error::ConfigError;
use crate::flatten::{CoercionPolicy, Flattener, DEFAULT_MAX_DEPTH};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const LOG_TARGET: &str = "config";

const fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Settings for one source, read from TOML:
///
/// ```toml
/// name = "oscam"
/// input_format = "xml"
/// tag_keys = ["oscam__status__client__name"]
///
/// [[variable]]
/// name = "oscam__status__client__request__caid"
/// type = "int"
/// parameter = "16"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Suffix of the measurement name (`webapi_<name>`).
    #[serde(default, alias = "Name")]
    pub name: String,

    #[serde(default, alias = "InputFormatType")]
    pub input_format: InputFormat,

    /// Dotted leaf paths whose values become tags instead of fields.
    #[serde(default, alias = "TagKeys")]
    pub tag_keys: Vec<String>,

    #[serde(default, rename = "variable", alias = "Variable")]
    pub variables: Vec<Variable>,

    #[serde(default)]
    pub coercion_policy: CoercionPolicy,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Write every visited leaf to a `webapi_debug_*.txt` file.
    #[serde(default, alias = "Debug")]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: String::new(),
            input_format: InputFormat::default(),
            tag_keys: Vec::new(),
            variables: Vec::new(),
            coercion_policy: CoercionPolicy::default(),
            max_depth: default_max_depth(),
            debug: false,
        }
    }
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::debug!(target: LOG_TARGET, "Loading configuration from '{}'", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject declarations the flattener would silently ignore or could
    /// never apply.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for variable in &self.variables {
            match variable.kind {
                VariableKind::Duration | VariableKind::Unknown => {
                    return Err(ConfigError::UnsupportedVariableKind {
                        name: variable.name.clone(),
                        kind: variable.kind,
                    });
                }
                VariableKind::Int => {
                    if variable.int_base().is_err() {
                        return Err(ConfigError::InvalidIntBase {
                            name: variable.name.clone(),
                            parameter: variable.parameter.clone(),
                        });
                    }
                }
                VariableKind::Bool | VariableKind::Float => {}
            }
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroMaxDepth);
        }
        Ok(())
    }

    pub fn flattener(&self) -> Flattener {
        Flattener::new(self.variables.clone(), self.tag_keys.clone())
            .with_coercion_policy(self.coercion_policy)
            .with_max_depth(self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
        assert_eq!(Config::default().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn full_file() {
        let config = Config::from_toml(
            r#"
            name = "oscam"
            input_format = "xml"
            tag_keys = ["oscam__status__client__name"]
            coercion_policy = "skip_leaf"
            max_depth = 16
            debug = true

            [[variable]]
            name = "oscam__status__client__request__caid"
            type = "int"
            parameter = "16"

            [[variable]]
            Name = "oscam__status__client__times__idle"
            Type = "float"
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "oscam");
        assert_eq!(config.input_format, InputFormat::Xml);
        assert_eq!(config.coercion_policy, CoercionPolicy::SkipLeaf);
        assert_eq!(config.max_depth, 16);
        assert!(config.debug);
        assert_eq!(
            config.variables,
            vec![
                Variable::new("oscam__status__client__request__caid", VariableKind::Int)
                    .with_parameter("16"),
                Variable::new("oscam__status__client__times__idle", VariableKind::Float),
            ]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml("nmae = \"x\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml("[[variable]]\nname = \"a\"\nkind = \"int\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unsupported_kinds_are_rejected() {
        for kind in ["duration", "string", ""] {
            let text = format!("[[variable]]\nname = \"a\"\ntype = \"{}\"", kind);
            assert!(
                matches!(
                    Config::from_toml(&text),
                    Err(ConfigError::UnsupportedVariableKind { .. })
                ),
                "kind {}",
                kind
            );
        }
        // A missing type is unknown too.
        assert!(matches!(
            Config::from_toml("[[variable]]\nname = \"a\""),
            Err(ConfigError::UnsupportedVariableKind { kind: VariableKind::Unknown, .. })
        ));
    }

    #[test]
    fn int_base_is_checked() {
        for parameter in ["1", "37", "sixteen"] {
            let text = format!("[[variable]]\nname = \"a\"\ntype = \"int\"\nparameter = \"{}\"", parameter);
            assert!(matches!(
                Config::from_toml(&text),
                Err(ConfigError::InvalidIntBase { .. })
            ));
        }
        assert!(Config::from_toml("[[variable]]\nname = \"a\"\ntype = \"int\"\nparameter = \"0x10\"").is_ok());
    }

    #[test]
    fn zero_depth_is_rejected() {
        assert!(matches!(
            Config::from_toml("max_depth = 0"),
            Err(ConfigError::ZeroMaxDepth)
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("test-data/no-such-config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
