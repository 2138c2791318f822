//! Error types for registry mutation and command execution.

use std::time::Duration;

use thiserror::Error;

use crate::context::ReplyError;

/// Programming and configuration errors raised by registry operations.
///
/// These are surfaced to the caller of the mutating operation and never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
	/// An alias or qualified name collides with an existing, non-overridable entry.
	#[error("naming conflict on {key:?}: already held by {existing}")]
	NamingConflict {
		/// The alias or qualified name that collided.
		key: String,
		/// The command name or node path holding it.
		existing: String,
	},

	/// Commands cannot be registered on placeholder nodes.
	#[error("operation not supported on placeholder node {node}")]
	UnsupportedOnPlaceholder {
		/// Path of the placeholder.
		node: String,
	},

	/// An identity field was empty or otherwise malformed.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// The node handle is no longer linked into the tree.
	#[error("node {node} is detached from the registry tree")]
	Detached {
		/// Path the node had when it was detached.
		node: String,
	},

	/// The command instance is already registered under another node.
	#[error("command {command} is already registered under {node}")]
	AlreadyRegistered {
		/// Command name.
		command: String,
		/// Path of the node holding it.
		node: String,
	},

	/// A disabled command reached the dispatcher.
	#[error("disabled command {command} reached dispatch")]
	CommandDisabled {
		/// Command name.
		command: String,
	},
}

impl RegistryError {
	/// Returns true for [`RegistryError::NamingConflict`].
	pub fn is_naming_conflict(&self) -> bool {
		matches!(self, Self::NamingConflict { .. })
	}
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Recoverable failure reported by a command's own execution.
///
/// Triggers the failure callback and stops the chain at the failing command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionFailure {
	/// The permission predicate rejected the invoker.
	#[error("missing permission for {command}")]
	MissingPermission {
		/// Command name.
		command: String,
	},

	/// The command hit a rate limit on an external effect.
	#[error("rate limited, retry after {retry_after:?}")]
	RateLimited {
		/// Suggested wait before retrying.
		retry_after: Duration,
	},

	/// Arguments did not fit the command.
	#[error("invalid usage: {0}")]
	InvalidUsage(String),

	/// Delivering a reply failed.
	#[error(transparent)]
	Reply(#[from] ReplyError),

	/// Any other command-defined failure.
	#[error("{0}")]
	Other(String),
}
