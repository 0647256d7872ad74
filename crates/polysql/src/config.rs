//! Database configuration.
//!
//! ```toml
//! client = "postgres"
//! debug = true
//!
//! [connection]
//! url = "${DATABASE_URL}"
//! ```
//!
//! `connection` is forwarded to the driver as-is (after `${VAR}` expansion).

use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    pub client: Dialect,
    #[serde(default)]
    pub connection: Map<String, JsonValue>,
    /// Emit executed SQL at DEBUG instead of TRACE.
    #[serde(default)]
    pub debug: bool,
}

impl DatabaseConfig {
    pub fn new(client: Dialect) -> Self {
        Self {
            client,
            connection: Map::new(),
            debug: false,
        }
    }

    /// Set a connection option.
    pub fn with_connection(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.connection.insert(key.into(), value.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse TOML and expand `${VAR}` references in connection strings.
    pub fn from_toml_str(raw: &str) -> PolyResult<Self> {
        let mut config: Self =
            toml::from_str(raw).map_err(|e| PolyError::config(format!("invalid config: {e}")))?;
        config.expand_env()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> PolyResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PolyError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Build from `POLYSQL_CLIENT`, `DATABASE_URL` and `POLYSQL_DEBUG`.
    pub fn from_env() -> PolyResult<Self> {
        let client: Dialect = std::env::var("POLYSQL_CLIENT")
            .map_err(|_| PolyError::config("POLYSQL_CLIENT is not set"))?
            .parse()?;
        let mut config = Self::new(client);
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.connection.insert("url".into(), JsonValue::String(url));
        }
        if let Ok(debug) = std::env::var("POLYSQL_DEBUG") {
            config.debug = matches!(debug.trim(), "1" | "true" | "TRUE" | "yes" | "on");
        }
        Ok(config)
    }

    /// Replace `${VAR}` in every connection string with the environment value.
    pub fn expand_env(&mut self) -> PolyResult<()> {
        for value in self.connection.values_mut() {
            expand_json(value)?;
        }
        Ok(())
    }

    /// Options as the driver expects them (MSSQL drivers take `server`, not `host`).
    pub fn connection_options(&self) -> Map<String, JsonValue> {
        let mut options = self.connection.clone();
        if self.client == Dialect::MsSql && !options.contains_key("server") {
            if let Some(host) = options.remove("host") {
                options.insert("server".into(), host);
            }
        }
        options
    }

    /// String connection option.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.connection.get(key).and_then(JsonValue::as_str)
    }

    /// `connection.url`, when given as a URL.
    pub fn url(&self) -> Option<&str> {
        self.option_str("url")
    }
}

fn expand_json(value: &mut JsonValue) -> PolyResult<()> {
    match value {
        JsonValue::String(s) => *s = expand_env_vars(s)?,
        JsonValue::Array(items) => {
            for item in items {
                expand_json(item)?;
            }
        }
        JsonValue::Object(map) => {
            for item in map.values_mut() {
                expand_json(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Expand `${VAR}` references; a missing variable is an error.
pub fn expand_env_vars(input: &str) -> PolyResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(PolyError::config(format!(
                    "unterminated env var reference: ${{{key}}}"
                )));
            }
            if key.is_empty() {
                return Err(PolyError::config("invalid env var reference: ${}"));
            }

            let v = std::env::var(&key).map_err(|_| {
                PolyError::config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
