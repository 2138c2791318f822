//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::command::{Command, CommandBuilder, CommandRef, CommandSpec};
use crate::context::{CommandContext, Message, Reply, ReplyBuilder, ReplyError};
use crate::error::ExecutionFailure;
use crate::key::Linked;

/// Ordered record of everything test commands did.
pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

pub(crate) fn journal() -> Journal {
	Arc::new(Mutex::new(Vec::new()))
}

/// Command that appends `<name>` on execute and `<name>:success` / `<name>:failure` on callbacks.
pub(crate) struct Probe {
	spec: CommandSpec,
	journal: Journal,
	fail_with: Option<ExecutionFailure>,
	permitted: AtomicBool,
}

impl Probe {
	pub(crate) fn new(builder: CommandBuilder, journal: &Journal) -> Arc<Self> {
		Arc::new(Self {
			spec: builder.build().unwrap(),
			journal: journal.clone(),
			fail_with: None,
			permitted: AtomicBool::new(true),
		})
	}

	pub(crate) fn failing(builder: CommandBuilder, journal: &Journal, failure: ExecutionFailure) -> Arc<Self> {
		Arc::new(Self {
			spec: builder.build().unwrap(),
			journal: journal.clone(),
			fail_with: Some(failure),
			permitted: AtomicBool::new(true),
		})
	}

	pub(crate) fn deny(&self) {
		self.permitted.store(false, Ordering::SeqCst);
	}
}

#[async_trait]
impl Command for Probe {
	fn spec(&self) -> &CommandSpec {
		&self.spec
	}

	async fn execute(&self, _ctx: &CommandContext) -> Result<(), ExecutionFailure> {
		self.journal.lock().push(self.spec.name().to_owned());
		match &self.fail_with {
			Some(failure) => Err(failure.clone()),
			None => Ok(()),
		}
	}

	async fn permitted(&self, _ctx: &CommandContext) -> bool {
		self.permitted.load(Ordering::SeqCst)
	}

	async fn on_success(&self, _ctx: &CommandContext) {
		self.journal.lock().push(format!("{}:success", self.spec.name()));
	}

	async fn on_failure(&self, _ctx: &CommandContext, _failure: &ExecutionFailure) {
		self.journal.lock().push(format!("{}:failure", self.spec.name()));
	}
}

/// Shorthand for a plain probe registered under `name`.
pub(crate) fn probe(name: &str, journal: &Journal) -> CommandRef {
	Probe::new(CommandSpec::builder(name), journal)
}

/// Reply sink collecting delivered replies.
#[derive(Default)]
pub(crate) struct Replies(pub(crate) Mutex<Vec<Reply>>);

#[async_trait]
impl ReplyBuilder for Replies {
	async fn send(&self, reply: Reply) -> Result<(), ReplyError> {
		self.0.lock().push(reply);
		Ok(())
	}
}

pub(crate) fn context() -> Arc<CommandContext> {
	Arc::new(CommandContext::new(Message::new("tester", "lobby", ""), Arc::new(Replies::default())))
}

/// Origin chain built from `(qualifier, name)` pairs, outermost first.
pub(crate) struct Origin {
	qualifier: String,
	name: String,
	essential: bool,
	prefix: Option<String>,
	parent: Option<Box<Origin>>,
}

impl Origin {
	pub(crate) fn new(qualifier: &str, name: &str) -> Self {
		Self {
			qualifier: qualifier.to_owned(),
			name: name.to_owned(),
			essential: false,
			prefix: None,
			parent: None,
		}
	}

	pub(crate) fn under(mut self, parent: Origin) -> Self {
		self.parent = Some(Box::new(parent));
		self
	}

	pub(crate) fn essential(mut self) -> Self {
		self.essential = true;
		self
	}

	pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
		self.prefix = Some(prefix.to_owned());
		self
	}
}

impl Linked for Origin {
	fn qualifier(&self) -> &str {
		&self.qualifier
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn link_parent(&self) -> Option<&dyn Linked> {
		self.parent.as_deref().map(|p| p as &dyn Linked)
	}

	fn essential(&self) -> bool {
		self.essential
	}

	fn prefix(&self) -> Option<&str> {
		self.prefix.as_deref()
	}
}
