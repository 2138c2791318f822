//! Execution context handed to commands and their callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ExecutionFailure;
use crate::node::NodeRef;

/// The message that triggered a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
	/// Author identifier on the messaging platform.
	pub author: String,
	/// Channel the message was posted in.
	pub channel: String,
	/// Raw message text.
	pub content: String,
}

impl Message {
	pub fn new(author: impl Into<String>, channel: impl Into<String>, content: impl Into<String>) -> Self {
		Self {
			author: author.into(),
			channel: channel.into(),
			content: content.into(),
		}
	}
}

/// A reply to be delivered to the originating channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
	pub content: String,
	/// Deliver to the author alone when the platform supports it.
	pub private: bool,
}

impl Reply {
	pub fn text(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			private: false,
		}
	}

	pub fn private(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			private: true,
		}
	}
}

/// Reply delivery failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("reply delivery failed: {0}")]
pub struct ReplyError(pub String);

/// Reply construction capability provided by the host.
#[async_trait]
pub trait ReplyBuilder: Send + Sync {
	/// Delivers a reply.
	async fn send(&self, reply: Reply) -> Result<(), ReplyError>;
}

/// Context shared by every command in a dispatched chain and by its callbacks.
pub struct CommandContext {
	message: Message,
	args: Vec<String>,
	node: Option<NodeRef>,
	reply: Arc<dyn ReplyBuilder>,
}

impl CommandContext {
	pub fn new(message: Message, reply: Arc<dyn ReplyBuilder>) -> Self {
		Self {
			message,
			args: Vec::new(),
			node: None,
			reply,
		}
	}

	/// Sets the arguments left over after resolution.
	pub fn with_args(mut self, args: Vec<String>) -> Self {
		self.args = args;
		self
	}

	/// Records the node the command was resolved on.
	pub fn with_node(mut self, node: NodeRef) -> Self {
		self.node = Some(node);
		self
	}

	pub fn message(&self) -> &Message {
		&self.message
	}

	pub fn args(&self) -> &[String] {
		&self.args
	}

	pub fn node(&self) -> Option<&NodeRef> {
		self.node.as_ref()
	}

	/// Sends a plain text reply.
	pub async fn reply(&self, content: impl Into<String>) -> Result<(), ExecutionFailure> {
		self.send(Reply::text(content)).await
	}

	/// Sends a prepared reply.
	pub async fn send(&self, reply: Reply) -> Result<(), ExecutionFailure> {
		self.reply.send(reply).await.map_err(ExecutionFailure::from)
	}
}

impl std::fmt::Debug for CommandContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandContext")
			.field("message", &self.message)
			.field("args", &self.args)
			.field("node", &self.node.as_ref().map(|n| n.path()))
			.finish_non_exhaustive()
	}
}
