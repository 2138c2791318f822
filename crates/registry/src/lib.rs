//! Hierarchical command registry and dispatch engine.
//!
//! Commands are registered on nodes of a [`RegistryTree`]. Each node stands for
//! a backing context (a client, a module, a channel group) identified by a
//! [`QualifiedName`]. Nodes whose context does not exist yet are kept as
//! placeholders so configuration can be attached ahead of time.
//!
//! Incoming messages flow through three stages:
//!
//! 1. [`RegistryTree::get_or_create_node`] maps the message origin to a node.
//! 2. [`RegistryTree::resolve`] strips the prefix and matches aliases, walking
//!    into subcommands and child nodes.
//! 3. [`Dispatcher::dispatch`] runs the resolved chain and schedules the
//!    post-execution callback.
//!
//! [`CommandRegistry`] bundles the three for the common case.

pub mod command;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod key;
pub mod node;
pub mod resolve;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

pub use command::{Command, CommandBuilder, CommandRef, CommandSpec, Registration};
pub use config::{ConfigError, RegistryConfig};
pub use context::{CommandContext, Message, Reply, ReplyBuilder, ReplyError};
pub use dispatch::{Callback, Dispatched, Dispatcher};
pub use error::{ExecutionFailure, RegistryError, Result};
pub use key::{Linked, QualifiedName, normalize_alias};
pub use node::{Node, NodeKind, NodeRef};
pub use resolve::Resolved;
pub use tree::{RegistryTree, Removal};

/// Outcome of handling one incoming message.
#[derive(Debug)]
pub enum Handled {
	/// No command matched. This is ordinary traffic.
	NotFound,
	/// A command chain was dispatched.
	Dispatched(Dispatched),
}

impl Handled {
	/// Returns the dispatch report, if a command matched.
	pub fn dispatched(&self) -> Option<&Dispatched> {
		match self {
			Self::NotFound => None,
			Self::Dispatched(d) => Some(d),
		}
	}
}

/// Registry tree plus dispatcher, wired for message handling.
pub struct CommandRegistry {
	tree: RegistryTree,
	dispatcher: Dispatcher,
}

impl CommandRegistry {
	/// Creates a registry with the given configuration.
	pub fn new(config: RegistryConfig) -> Self {
		Self {
			tree: RegistryTree::new(config),
			dispatcher: Dispatcher::new(),
		}
	}

	/// Returns the underlying tree.
	pub fn tree(&self) -> &RegistryTree {
		&self.tree
	}

	/// Returns the dispatcher.
	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Resolves `tokens` against the node belonging to `origin` and dispatches the match.
	///
	/// `tokens` is the already tokenized message content, prefix included.
	pub async fn handle<S: AsRef<str>>(
		&self,
		origin: &dyn Linked,
		message: Message,
		tokens: &[S],
		reply: Arc<dyn ReplyBuilder>,
	) -> Result<Handled> {
		let node = self.tree.get_or_create_node(origin)?;
		let Some(resolved) = self.tree.resolve(&node, tokens) else {
			return Ok(Handled::NotFound);
		};

		let ctx = Arc::new(CommandContext::new(message, reply).with_node(resolved.node.clone()).with_args(resolved.args.clone()));
		let dispatched = self.dispatcher.dispatch(&resolved, ctx).await?;
		Ok(Handled::Dispatched(dispatched))
	}
}

impl Default for CommandRegistry {
	fn default() -> Self {
		Self::new(RegistryConfig::default())
	}
}
