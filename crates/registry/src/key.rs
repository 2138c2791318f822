//! Node identity and alias normalization.

use std::fmt;

use crate::config::validate_prefix;
use crate::error::{RegistryError, Result};

/// Qualifier used for the tree root.
pub const ROOT_QUALIFIER: &str = "registry";

/// The `(qualifier, name)` pair identifying a node within its parent.
///
/// The qualifier is a category tag such as `client` or `module`. Both parts are
/// fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
	qualifier: String,
	name: String,
}

impl QualifiedName {
	/// Creates a qualified name, rejecting blank parts.
	pub fn new(qualifier: impl Into<String>, name: impl Into<String>) -> Result<Self> {
		let qualifier = qualifier.into();
		let name = name.into();
		if qualifier.trim().is_empty() {
			return Err(RegistryError::InvalidArgument(format!("empty qualifier for node {name:?}")));
		}
		if name.trim().is_empty() {
			return Err(RegistryError::InvalidArgument(format!("empty name for {qualifier} node")));
		}
		if qualifier.contains([':', '/']) || name.contains('/') {
			return Err(RegistryError::InvalidArgument(format!("reserved separator in {qualifier}:{name}")));
		}
		Ok(Self { qualifier, name })
	}

	pub(crate) fn root() -> Self {
		Self {
			qualifier: ROOT_QUALIFIER.to_owned(),
			name: "root".to_owned(),
		}
	}

	/// Parses `qualifier:name`.
	pub fn parse(s: &str) -> Result<Self> {
		let (qualifier, name) = s
			.split_once(':')
			.ok_or_else(|| RegistryError::InvalidArgument(format!("expected qualifier:name, got {s:?}")))?;
		Self::new(qualifier, name)
	}

	pub fn qualifier(&self) -> &str {
		&self.qualifier
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl fmt::Display for QualifiedName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.qualifier, self.name)
	}
}

/// Normalizes an alias or incoming token for matching.
pub fn normalize_alias(alias: &str) -> String {
	alias.trim().to_lowercase()
}

/// A backing context that owns a registry node.
///
/// Implemented by whatever the host uses to scope commands: a client session,
/// a loaded module, a channel group. `link_parent` chains scopes so the tree
/// can create intermediate nodes.
pub trait Linked: Send + Sync {
	/// Category tag, e.g. `client` or `module`.
	fn qualifier(&self) -> &str;

	/// Name unique among siblings of the same qualifier.
	fn name(&self) -> &str;

	/// Enclosing context, or `None` to hang directly off the root.
	fn link_parent(&self) -> Option<&dyn Linked> {
		None
	}

	/// Whether a freshly created node should be essential.
	fn essential(&self) -> bool {
		false
	}

	/// Prefix override for a freshly created node.
	fn prefix(&self) -> Option<&str> {
		None
	}
}

/// Identity and creation hints of one level of an origin chain.
pub(crate) struct LinkInfo {
	pub(crate) key: QualifiedName,
	pub(crate) essential: bool,
	pub(crate) prefix: Option<String>,
}

/// Walks `origin` up to its outermost context, returning levels outermost first.
///
/// Every key and prefix hint is validated here, before the tree is touched.
pub(crate) fn lineage(origin: &dyn Linked) -> Result<Vec<LinkInfo>> {
	let mut levels = Vec::new();
	let mut current: Option<&dyn Linked> = Some(origin);
	while let Some(link) = current {
		let key = QualifiedName::new(link.qualifier(), link.name())?;
		if let Some(prefix) = link.prefix() {
			validate_prefix(prefix).map_err(|e| RegistryError::InvalidArgument(format!("{key}: {e}")))?;
		}
		levels.push(LinkInfo {
			key,
			essential: link.essential(),
			prefix: link.prefix().map(str::to_owned),
		});
		current = link.link_parent();
	}
	levels.reverse();
	Ok(levels)
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("Ping", "ping")]
	#[case("  LONG ", "long")]
	#[case("échO", "écho")]
	fn aliases_normalize_case_and_whitespace(#[case] raw: &str, #[case] expected: &str) {
		assert_eq!(normalize_alias(raw), expected);
	}

	#[rstest]
	#[case("", "x")]
	#[case("module", "  ")]
	#[case("mod:ule", "x")]
	#[case("module", "a/b")]
	fn blank_or_reserved_parts_are_rejected(#[case] qualifier: &str, #[case] name: &str) {
		assert!(matches!(QualifiedName::new(qualifier, name), Err(RegistryError::InvalidArgument(_))));
	}

	#[test]
	fn parse_splits_on_first_colon() {
		let key = QualifiedName::parse("channel:ops:alerts").unwrap();
		assert_eq!(key.qualifier(), "channel");
		assert_eq!(key.name(), "ops:alerts");
		assert_eq!(key.to_string(), "channel:ops:alerts");
	}
}
