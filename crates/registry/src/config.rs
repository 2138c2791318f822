//! Registry configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// TOML syntax or schema error.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// The command prefix is unusable.
	#[error("invalid prefix {0:?} (must be non-empty without whitespace)")]
	InvalidPrefix(String),
}

/// Tree-wide registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
	/// Default command prefix, used by nodes without their own.
	pub prefix: String,
	/// Seconds after which an unfilled placeholder counts as expired.
	///
	/// `None` keeps placeholders alive indefinitely.
	pub placeholder_ttl_secs: Option<u64>,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			prefix: "!".to_owned(),
			placeholder_ttl_secs: None,
		}
	}
}

impl RegistryConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Checks invariants that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_prefix(&self.prefix)
	}

	/// Placeholder lifetime as a [`Duration`].
	pub fn placeholder_ttl(&self) -> Option<Duration> {
		self.placeholder_ttl_secs.map(Duration::from_secs)
	}
}

pub(crate) fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
	if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
		return Err(ConfigError::InvalidPrefix(prefix.to_owned()));
	}
	Ok(())
}
