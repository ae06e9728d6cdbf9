use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::multiplier::parse_multiplier;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// The kind of placement decision a filter chain is used for.
pub enum Purpose {
    /// Picking the slave a user uploads to.
    Upload,
    /// Picking the slave a user downloads from.
    Download,
    /// Picking the destination of a replication job.
    JobUpload,
    /// Picking the source of a replication job.
    JobDownload,
}

impl Purpose {
    pub const ALL: [Purpose; 4] = [
        Purpose::Upload,
        Purpose::Download,
        Purpose::JobUpload,
        Purpose::JobDownload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Upload => "upload",
            Purpose::Download => "download",
            Purpose::JobUpload => "job-upload",
            Purpose::JobDownload => "job-download",
        }
    }
}

impl Display for Purpose {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "upload" => Ok(Purpose::Upload),
            "down" | "download" => Ok(Purpose::Download),
            "jobup" | "job-upload" | "job_upload" => Ok(Purpose::JobUpload),
            "jobdown" | "job-download" | "job_download" => Ok(Purpose::JobDownload),
            _ => Err(ConfigError::UnknownPurpose(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
/// A single filter parameter value.
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
/// The definition of a single filter within a chain.
///
/// ```toml
/// [[upload]]
/// filter = "bandwidth"
/// multiplier = "/10*10"
/// ```
pub struct FilterConfig {
    /// The registered filter name, matched case-insensitively.
    pub filter: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, ParamValue>,
}

impl FilterConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            params: BTreeMap::new(),
        }
    }

    /// Sets a parameter of the filter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn missing(&self, param: &str) -> ConfigError {
        ConfigError::MissingParam {
            filter: self.filter.clone(),
            param: param.to_string(),
        }
    }

    fn invalid(&self, param: &str, reason: impl Display) -> ConfigError {
        ConfigError::InvalidParam {
            filter: self.filter.clone(),
            param: param.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn get(&self, param: &str) -> Option<&ParamValue> {
        self.params.get(param)
    }

    /// A required string parameter, numbers are rendered as strings.
    pub fn get_str(&self, param: &str) -> Result<String, ConfigError> {
        self.get(param)
            .map(|v| v.to_string())
            .ok_or_else(|| self.missing(param))
    }

    /// A required multiplier expression.
    pub fn get_multiplier(&self, param: &str) -> Result<f64, ConfigError> {
        match self.get(param).ok_or_else(|| self.missing(param))? {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Str(expr) => parse_multiplier(expr),
            ParamValue::Bool(_) => Err(self.invalid(param, "expected a multiplier expression")),
        }
    }

    /// An optional flag, `default` when unset.
    pub fn get_bool_or(&self, param: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(param) {
            None => Ok(default),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(ParamValue::Str(s)) => s.trim().parse().map_err(|e| self.invalid(param, e)),
            Some(_) => Err(self.invalid(param, "expected true or false")),
        }
    }

    /// A required signed integer.
    pub fn get_i64(&self, param: &str) -> Result<i64, ConfigError> {
        match self.get(param).ok_or_else(|| self.missing(param))? {
            ParamValue::Int(v) => Ok(*v),
            ParamValue::Str(s) => s.trim().parse().map_err(|e| self.invalid(param, e)),
            _ => Err(self.invalid(param, "expected an integer")),
        }
    }

    /// A required non-negative integer.
    pub fn get_u64(&self, param: &str) -> Result<u64, ConfigError> {
        let value = self.get_i64(param)?;
        u64::try_from(value).map_err(|_| self.invalid(param, "must not be negative"))
    }

    /// A required duration, either a human readable string such as
    /// `"2m 30s"` or a number of milliseconds.
    pub fn get_duration(&self, param: &str) -> Result<Duration, ConfigError> {
        match self.get(param).ok_or_else(|| self.missing(param))? {
            ParamValue::Int(ms) if *ms >= 0 => Ok(Duration::from_millis(*ms as u64)),
            ParamValue::Str(s) => match s.trim().parse::<u64>() {
                Ok(ms) => Ok(Duration::from_millis(ms)),
                Err(_) => humantime::parse_duration(s.trim()).map_err(|e| self.invalid(param, e)),
            },
            _ => Err(self.invalid(param, "expected a duration")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// The filter chains for every placement purpose.
///
/// ```toml
/// [[upload]]
/// filter = "maxtransfers"
/// maxtransfers = 10
///
/// [[upload]]
/// filter = "bandwidth"
/// multiplier = 1
///
/// [[job-download]]
/// filter = "bandwidth"
/// multiplier = "/10"
/// ```
pub struct SelectionConfig {
    #[serde(default)]
    pub upload: Vec<FilterConfig>,
    #[serde(default)]
    pub download: Vec<FilterConfig>,
    #[serde(default)]
    pub job_upload: Vec<FilterConfig>,
    #[serde(default)]
    pub job_download: Vec<FilterConfig>,
}

impl SelectionConfig {
    /// Parses the chains from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses the chains from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn chain(&self, purpose: Purpose) -> &[FilterConfig] {
        match purpose {
            Purpose::Upload => &self.upload,
            Purpose::Download => &self.download,
            Purpose::JobUpload => &self.job_upload,
            Purpose::JobDownload => &self.job_download,
        }
    }

    /// Replaces the chain of the given purpose.
    pub fn with_chain(mut self, purpose: Purpose, filters: Vec<FilterConfig>) -> Self {
        match purpose {
            Purpose::Upload => self.upload = filters,
            Purpose::Download => self.download = filters,
            Purpose::JobUpload => self.job_upload = filters,
            Purpose::JobDownload => self.job_download = filters,
        }
        self
    }
}
