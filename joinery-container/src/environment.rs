//! Environment configuration, available to every component as
//! `environment`.
//!
//! Lookups check, in order:
//! 1. values set with [`Environment::set`],
//! 2. the process environment (the injected `os.environ` global),
//! 3. the `.env` file at `env_file_path` (default `.env`).
//!
//! `.env` lines look like `NAME=value`. Blank lines and lines starting with
//! `#` are skipped. Values are typed: `true`/`false` become booleans, quoted
//! values lose their quotes, then integers, floats, and finally plain
//! strings. A missing file counts as empty.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::de::IntoDeserializer;
use serde::de::value::Error as ValueError;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace};

use crate::class::Component;
use crate::container::Di;
use crate::error::{DiError, Result};
use crate::function::Arguments;
use crate::inject::{Inject, Source};
use crate::signature::{Param, Signature};
use crate::stdlib::Environ;

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl EnvValue {
    /// Types a raw `.env` value.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower == "true" {
            return EnvValue::Bool(true);
        }
        if lower == "false" {
            return EnvValue::Bool(false);
        }
        for quote in ['"', '\''] {
            if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
                return EnvValue::String(raw[1..raw.len() - 1].to_string());
            }
        }
        if let Ok(int) = raw.parse::<i64>() {
            return EnvValue::Int(int);
        }
        if let Ok(float) = raw.parse::<f64>() {
            return EnvValue::Float(float);
        }
        EnvValue::String(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnvValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EnvValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EnvValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Deserializes the value into `T`.
    pub fn deserialize_into<'de, T: Deserialize<'de>>(self) -> std::result::Result<T, ValueError> {
        T::deserialize(EnvValueDeserializer(self))
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{b}"),
            EnvValue::Int(i) => write!(f, "{i}"),
            EnvValue::Float(x) => write!(f, "{x}"),
            EnvValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        EnvValue::String(value.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        EnvValue::String(value)
    }
}

impl From<bool> for EnvValue {
    fn from(value: bool) -> Self {
        EnvValue::Bool(value)
    }
}

impl From<i64> for EnvValue {
    fn from(value: i64) -> Self {
        EnvValue::Int(value)
    }
}

impl From<f64> for EnvValue {
    fn from(value: f64) -> Self {
        EnvValue::Float(value)
    }
}

/// Errors from environment lookups.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Could not find environment config '{0}' in environment or .env file")]
    NotFound(String),

    #[error("Parse error in environment line #{line}: should be 'key=value'")]
    Parse { line: usize },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Environment config '{name}' has an unexpected type: {source}")]
    Deserialize {
        name: String,
        #[source]
        source: ValueError,
    },

    #[error(transparent)]
    Di(#[from] DiError),
}

/// Process and `.env` configuration.
pub struct Environment {
    env_file_path: PathBuf,
    os_environ: Inject<Environ>,
    overrides: RwLock<HashMap<String, EnvValue>>,
    file_values: OnceCell<HashMap<String, EnvValue>>,
}

impl Environment {
    pub fn new(env_file_path: impl Into<PathBuf>) -> Self {
        Self {
            env_file_path: env_file_path.into(),
            os_environ: Inject::from_source(Source::Global {
                path: "os.environ".to_string(),
                cache: false,
            }),
            overrides: RwLock::new(HashMap::new()),
            file_values: OnceCell::new(),
        }
    }

    pub fn env_file_path(&self) -> &Path {
        &self.env_file_path
    }

    /// Sets a value that takes priority over every other source.
    pub fn set(&self, name: impl Into<String>, value: impl Into<EnvValue>) {
        self.overrides.write().insert(name.into(), value.into());
    }

    /// # Errors
    /// [`EnvironmentError::NotFound`] when no source has `name`.
    pub fn get(&self, name: &str) -> std::result::Result<EnvValue, EnvironmentError> {
        self.get_optional(name)?
            .ok_or_else(|| EnvironmentError::NotFound(name.to_string()))
    }

    pub fn get_optional(&self, name: &str) -> std::result::Result<Option<EnvValue>, EnvironmentError> {
        if let Some(value) = self.overrides.read().get(name) {
            trace!(name, "Environment value from override");
            return Ok(Some(value.clone()));
        }

        let environ = self.os_environ.get()?;
        if let Some(value) = environ.get(name) {
            trace!(name, "Environment value from process environment");
            return Ok(Some(EnvValue::String(value.to_string())));
        }

        Ok(self.file_values()?.get(name).cloned())
    }

    /// Reads `name` as any deserializable type.
    pub fn get_as<T>(&self, name: &str) -> std::result::Result<T, EnvironmentError>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.get(name)?
            .deserialize_into()
            .map_err(|source| EnvironmentError::Deserialize {
                name: name.to_string(),
                source,
            })
    }

    fn file_values(&self) -> std::result::Result<&HashMap<String, EnvValue>, EnvironmentError> {
        self.file_values.get_or_try_init(|| {
            match std::fs::read_to_string(&self.env_file_path) {
                Ok(contents) => {
                    let values = parse_env_file(&contents)?;
                    debug!(path = %self.env_file_path.display(), count = values.len(), "Loaded .env file");
                    Ok(values)
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %self.env_file_path.display(), "No .env file");
                    Ok(HashMap::new())
                }
                Err(source) => Err(EnvironmentError::Io {
                    path: self.env_file_path.clone(),
                    source,
                }),
            }
        })
    }
}

/// Parses `.env` contents into typed values.
pub fn parse_env_file(contents: &str) -> std::result::Result<HashMap<String, EnvValue>, EnvironmentError> {
    let mut values = HashMap::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(EnvironmentError::Parse { line: index + 1 });
        };
        values.insert(key.trim().to_string(), EnvValue::parse(value.trim()));
    }
    Ok(values)
}

impl Component for Environment {
    fn signature() -> Signature {
        Signature::new().param(Param::typed::<PathBuf>("env_file_path").default(PathBuf::from(".env")))
    }

    fn construct(args: &Arguments) -> Result<Self> {
        Ok(Self::new(args.value::<PathBuf>("env_file_path")?))
    }

    fn activate(&self, di: &Di) {
        self.os_environ.activate(di);
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("env_file_path", &self.env_file_path)
            .field("overrides", &self.overrides.read().len())
            .finish()
    }
}

impl<'de> IntoDeserializer<'de, ValueError> for EnvValue {
    type Deserializer = EnvValueDeserializer;

    fn into_deserializer(self) -> Self::Deserializer {
        EnvValueDeserializer(self)
    }
}

/// Deserializer over a single [`EnvValue`].
pub struct EnvValueDeserializer(EnvValue);

impl<'de> Deserializer<'de> for EnvValueDeserializer {
    type Error = ValueError;

    fn deserialize_any<V: serde::de::Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ValueError> {
        match self.0 {
            EnvValue::Bool(b) => visitor.visit_bool(b),
            EnvValue::Int(i) => visitor.visit_i64(i),
            EnvValue::Float(f) => visitor.visit_f64(f),
            EnvValue::String(s) => visitor.visit_string(s),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}
