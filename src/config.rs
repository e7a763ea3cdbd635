//! Configuration file management for zabbix-ssl.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments. Settings can be specified in multiple places with
//! clear precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! nginx_dir = "/etc/nginx/"
//! apache_dir = "/etc/apache2/sites-enabled"
//! output = "json"
//! timeout_secs = 3
//! strict = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

pub const DEFAULT_NGINX_DIR: &str = "/etc/nginx/";
pub const DEFAULT_APACHE_DIR: &str = "/etc/apache";
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// How `discover` prints its report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// Zabbix low-level discovery JSON
    Json,
    /// Table for humans
    Text,
}

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values are filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Directory holding Nginx configuration files
    pub nginx_dir: Option<PathBuf>,
    /// Directory holding Apache configuration files
    pub apache_dir: Option<PathBuf>,
    /// Output format of the discover command
    pub output: Option<OutputFormat>,
    /// Connect/read timeout for certificate checks, in seconds
    pub timeout_secs: Option<u64>,
    /// Fail when any configuration file could not be parsed
    pub strict: Option<bool>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    /// * `Err(ConfigError::Validation)` - Values are out of range
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use zabbix_ssl::config::Config;
    /// let config = Config::from_file("zabbix-ssl.toml")?;
    /// # Ok::<(), zabbix_ssl::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Configuration with every value set to its default.
    ///
    /// - `nginx_dir`: `/etc/nginx/`
    /// - `apache_dir`: `/etc/apache`
    /// - `output`: json
    /// - `timeout_secs`: 3
    /// - `strict`: false
    pub fn defaults() -> Self {
        Config {
            nginx_dir: Some(PathBuf::from(DEFAULT_NGINX_DIR)),
            apache_dir: Some(PathBuf::from(DEFAULT_APACHE_DIR)),
            output: Some(OutputFormat::Json),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            strict: Some(false),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    ///
    /// # Example
    ///
    /// ```
    /// # use zabbix_ssl::config::Config;
    /// let file_config = Config::from_file("zabbix-ssl.toml").unwrap_or_default();
    /// let merged = Config::defaults().merge_with(file_config);
    /// assert!(merged.nginx_dir.is_some());
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.nginx_dir.is_some() {
            self.nginx_dir = other.nginx_dir;
        }
        if other.apache_dir.is_some() {
            self.apache_dir = other.apache_dir;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.strict.is_some() {
            self.strict = other.strict;
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) will override other
    /// configurations.
    pub fn from_cli_args(
        nginx_dir: Option<PathBuf>,
        apache_dir: Option<PathBuf>,
        output: Option<OutputFormat>,
        timeout_secs: Option<u64>,
        strict: Option<bool>,
    ) -> Self {
        Config {
            nginx_dir,
            apache_dir,
            output,
            timeout_secs,
            strict,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn nginx_dir(&self) -> &Path {
        self.nginx_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_NGINX_DIR))
    }

    pub fn apache_dir(&self) -> &Path {
        self.apache_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_APACHE_DIR))
    }

    pub fn output(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Json)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn strict(&self) -> bool {
        self.strict.unwrap_or(false)
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            nginx_dir: Some(PathBuf::from("/etc/nginx/conf.d")),
            apache_dir: Some(PathBuf::from("/etc/apache2/sites-enabled")),
            output: Some(OutputFormat::Json),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            strict: Some(true),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (out of range values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            nginx_dir = "/srv/nginx"
            apache_dir = "/srv/apache"
            output = "text"
            timeout_secs = 5
            strict = true
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.nginx_dir, Some(PathBuf::from("/srv/nginx")));
        assert_eq!(config.apache_dir, Some(PathBuf::from("/srv/apache")));
        assert_eq!(config.output, Some(OutputFormat::Text));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.strict());
    }

    #[test]
    fn test_config_merge() {
        let base_config = Config::defaults();

        let override_config = Config {
            nginx_dir: Some(PathBuf::from("/override/nginx")),
            apache_dir: None,
            output: Some(OutputFormat::Text),
            timeout_secs: None,
            strict: Some(true),
        };

        let merged = base_config.merge_with(override_config);

        assert_eq!(merged.nginx_dir(), Path::new("/override/nginx"));
        assert_eq!(merged.apache_dir(), Path::new(DEFAULT_APACHE_DIR)); // From base
        assert_eq!(merged.output(), OutputFormat::Text);
        assert_eq!(merged.timeout_secs, Some(DEFAULT_TIMEOUT_SECS)); // From base
        assert!(merged.strict());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();

        assert_eq!(config.nginx_dir(), Path::new("/etc/nginx/"));
        assert_eq!(config.apache_dir(), Path::new("/etc/apache"));
        assert_eq!(config.output(), OutputFormat::Json);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(!config.strict());

        // Accessors fall back to defaults on an empty config too
        assert_eq!(Config::default().timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_config_from_cli_args() {
        let config = Config::from_cli_args(
            None,
            Some(PathBuf::from("/cli/apache")),
            Some(OutputFormat::Text),
            Some(10),
            None,
        );

        assert_eq!(config.nginx_dir, None);
        assert_eq!(config.apache_dir, Some(PathBuf::from("/cli/apache")));
        assert_eq!(config.output, Some(OutputFormat::Text));
        assert_eq!(config.timeout_secs, Some(10));
        assert_eq!(config.strict, None);
    }

    #[test]
    fn test_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"nginx_dir = [invalid toml").unwrap();

        match Config::from_file(temp_file.path()).unwrap_err() {
            ConfigError::Parse(_) => {} // Expected
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"timeout_secs = 0").unwrap();

        match Config::from_file(temp_file.path()).unwrap_err() {
            ConfigError::Validation(_) => {}
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_example_toml_generation() {
        let example = Config::example_toml();

        let parsed: Config = toml::from_str(&example).unwrap();
        assert!(parsed.nginx_dir.is_some());
        assert!(parsed.apache_dir.is_some());
        assert_eq!(parsed.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_output_format_names() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
