//! Line loop feeding the registry.

use std::sync::Arc;

use async_trait::async_trait;
use herald_registry::{Callback, CommandRegistry, Handled, Linked, Message, QualifiedName, Reply, ReplyBuilder, ReplyError};
use herald_worker::TaskClass;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Origin chain given on the command line.
pub struct Origin {
	key: QualifiedName,
	parent: Option<Box<Origin>>,
}

impl Origin {
	/// Builds the chain from keys listed outermost first.
	///
	/// An empty list yields `client:console`.
	pub fn from_keys(keys: Vec<QualifiedName>) -> herald_registry::Result<Self> {
		let mut keys = keys.into_iter();
		let first = match keys.next() {
			Some(key) => key,
			None => QualifiedName::new("client", "console")?,
		};
		Ok(keys.fold(Self { key: first, parent: None }, |parent, key| Self {
			key,
			parent: Some(Box::new(parent)),
		}))
	}
}

impl Linked for Origin {
	fn qualifier(&self) -> &str {
		self.key.qualifier()
	}

	fn name(&self) -> &str {
		self.key.name()
	}

	fn link_parent(&self) -> Option<&dyn Linked> {
		self.parent.as_deref().map(|p| p as &dyn Linked)
	}

	fn essential(&self) -> bool {
		true
	}
}

/// Prints replies to stdout.
struct StdoutReplier;

#[async_trait]
impl ReplyBuilder for StdoutReplier {
	async fn send(&self, reply: Reply) -> Result<(), ReplyError> {
		if reply.private {
			println!("(private) {}", reply.content);
		} else {
			println!("{}", reply.content);
		}
		Ok(())
	}
}

pub struct Session {
	registry: Arc<CommandRegistry>,
	origin: Arc<Origin>,
	replier: Arc<dyn ReplyBuilder>,
	pending: Vec<JoinHandle<()>>,
}

impl Session {
	pub fn new(registry: Arc<CommandRegistry>, origin: Arc<Origin>) -> Self {
		Self {
			registry,
			origin,
			replier: Arc::new(StdoutReplier),
			pending: Vec::new(),
		}
	}

	/// Handles every line of `input`, then waits for scheduled callbacks.
	///
	/// Returns the number of lines that matched a command.
	pub async fn run(mut self, input: impl AsyncBufRead + Unpin) -> anyhow::Result<usize> {
		let mut lines = input.lines();
		let mut matched = 0;
		while let Some(line) = lines.next_line().await? {
			if self.handle_line(&line).await? {
				matched += 1;
			}
			if self.registry.tree().placeholder_ttl().is_some() {
				self.registry.tree().prune_expired();
			}
		}
		for handle in self.pending.drain(..) {
			if let Err(err) = handle.await {
				warn!(%err, "cli.callback.join_failed");
			}
		}
		Ok(matched)
	}

	/// Handles one line on a dispatch task; lines are still processed in order.
	async fn handle_line(&mut self, line: &str) -> anyhow::Result<bool> {
		let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
		if tokens.is_empty() {
			return Ok(false);
		}
		let message = Message::new("console", self.origin.name(), line);
		let registry = self.registry.clone();
		let origin = self.origin.clone();
		let replier = self.replier.clone();
		let handled = herald_worker::spawn(TaskClass::Dispatch, async move {
			registry.handle(&*origin, message, tokens.as_slice(), replier).await
		})
		.await??;

		match handled {
			Handled::NotFound => {
				debug!(line, "cli.unmatched");
				Ok(false)
			}
			Handled::Dispatched(dispatched) => {
				if let Err(failure) = &dispatched.result {
					eprintln!("{}: {failure}", dispatched.command.spec().name());
				}
				if let Callback::Scheduled(handle) = dispatched.callback {
					self.pending.push(handle);
				}
				Ok(true)
			}
		}
	}
}
