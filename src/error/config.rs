use super::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("Config cannot set both '{left}' and '{right}'.")]
    Conflict {
        left: &'static str,
        right: &'static str,
    },
    #[error("Invalid header: {source}")]
    InvalidHeader {
        #[source]
        source: ValidationError,
    },
    #[error("Invalid header name '{name}'.")]
    InvalidHeaderName { name: String },
    #[error("Invalid value for header '{name}'.")]
    InvalidHeaderValue { name: String },
    #[error("Invalid '{field}': {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: ValidationError,
    },
    #[error("Config '{field}' must be >= 1.")]
    FieldMustBePositive { field: &'static str },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL '{url}' must use http or https.")]
    UnsupportedScheme { url: String },
    #[error("Body template is not valid JSON: {source}")]
    InvalidBody {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read body template '{path}': {source}")]
    ReadBody {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Template field '{name}' is not declared (add it to random fields or vars).")]
    MissingTemplateField { name: String },
    #[error("Template field '{name}' is declared both as a random field and a var.")]
    DuplicateTemplateField { name: String },
    #[error("Template field '{name}' is reserved.")]
    ReservedTemplateField { name: String },
    #[error("Random field '{name}' has min {min} greater than max {max}.")]
    InvalidRandomRange { name: String, min: i64, max: i64 },
    #[error("Ramp stage {index} has a zero duration.")]
    StageDurationZero { index: usize },
    #[error("Ramp stages must reach at least one virtual user.")]
    StagesWithoutUsers,
    #[error("Think time jitter min must be <= max.")]
    ThinkTimeRange,
}
