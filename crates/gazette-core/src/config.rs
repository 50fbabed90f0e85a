//! gazette Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults that compile a tab-separated dictionary into memory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Dictionary source and column layout
    pub dictionary: DictionaryConfig,

    /// Trie compilation settings
    pub compile: CompileConfig,

    /// Normalizers in registration order
    pub normalizers: Vec<NormalizerConfig>,

    /// Attribute store location
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply every override that `lookup` finds a value for
    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup("GAZETTE_DICTIONARY") {
            self.dictionary.path = Some(PathBuf::from(path));
        }
        if let Some(limit) = lookup("GAZETTE_ITEM_LIMIT") {
            self.compile.item_limit = limit.parse().map_err(|_| ConfigError::InvalidValue {
                key: "GAZETTE_ITEM_LIMIT".to_string(),
                value: limit,
            })?;
        }
        if let Some(policy) = lookup("GAZETTE_ROW_POLICY") {
            self.compile.row_policy = policy.parse()?;
        }

        // Store
        if let Some(path) = lookup("GAZETTE_STORE_PATH") {
            self.store.mode = StoreMode::File;
            self.store.path = Some(PathBuf::from(path));
        }

        // Logging
        if let Some(level) = lookup("GAZETTE_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(self)
    }
}

/// Dictionary source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Path to the delimited dictionary file
    pub path: Option<PathBuf>,

    /// Column separator
    pub column_separator: char,

    /// Character trimmed from both ends of every column
    pub column_enclosure: Option<char>,

    /// Column definitions, in column order
    pub fields: Vec<FieldDefinition>,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: None,
            column_separator: '\t',
            column_enclosure: None,
            fields: vec![],
        }
    }
}

/// Definition of one dictionary column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Attribute name for the column
    pub name: String,

    /// Whether the column is used at all
    #[serde(default = "default_true")]
    pub include: bool,

    /// Separator for multi-valued columns
    #[serde(default)]
    pub delimiter: Option<String>,

    /// Column holds the entity id
    #[serde(default)]
    pub id: bool,

    /// Column holds the normalizer tag
    #[serde(default)]
    pub tag: bool,

    /// Column holds the synonym
    #[serde(default)]
    pub value: bool,
}

impl FieldDefinition {
    /// Plain attribute column
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            include: true,
            delimiter: None,
            id: false,
            tag: false,
            value: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn as_id(mut self) -> Self {
        self.id = true;
        self
    }

    pub fn as_tag(mut self) -> Self {
        self.tag = true;
        self
    }

    pub fn as_value(mut self) -> Self {
        self.value = true;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.include = false;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Trie compilation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Separator between words of a synonym
    pub word_separator: char,

    /// Radix-compress each finished shard
    pub compressed: bool,

    /// Maximum rows per shard (0 = unbounded)
    pub item_limit: usize,

    /// Option passed through to every normalizer
    pub tokenizer_option: u8,

    /// Build the keyword index used for disambiguation
    pub include_keywords: bool,

    /// Index keywords for every entity, not only colliding ones
    pub disambiguate_all: bool,

    /// What to do with a malformed dictionary row
    pub row_policy: RowPolicy,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            word_separator: ' ',
            compressed: true,
            item_limit: 0,
            tokenizer_option: 0,
            include_keywords: true,
            disambiguate_all: false,
            row_policy: RowPolicy::Skip,
        }
    }
}

/// Handling of dictionary rows that cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowPolicy {
    /// Log and record the error, then continue with the next row
    #[default]
    Skip,
    /// Stop compilation with the error
    Abort,
}

impl std::str::FromStr for RowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            _ => Err(ConfigError::InvalidValue {
                key: "GAZETTE_ROW_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Normalizer registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Name used as the trie layer key
    pub name: String,

    /// Implementation to build
    #[serde(default)]
    pub kind: NormalizerKind,

    /// Lowercase text before tokenizing (token kind only)
    #[serde(default)]
    pub lowercase: bool,

    /// Custom token pattern (token kind only)
    #[serde(default)]
    pub pattern: Option<String>,

    /// Make this the default normalizer
    #[serde(default)]
    pub default: bool,

    /// Tag values routed to this normalizer
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Built-in normalizer implementations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerKind {
    /// Identity transform
    Bypass,
    /// Regex tokenizer
    #[default]
    Token,
}

/// Attribute store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Where attributes live
    pub mode: StoreMode,

    /// Database file (file mode)
    pub path: Option<PathBuf>,

    /// Directory for the scratch database (temporary mode)
    pub directory: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: StoreMode::Memory,
            path: None,
            directory: PathBuf::from("."),
        }
    }
}

/// Attribute store placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    #[default]
    Memory,
    File,
    /// Uniquely named file removed when the store is dropped
    Temporary,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
