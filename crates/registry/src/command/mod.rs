//! Command contract.
//!
//! A command is any type implementing [`Command`]. Its declarative half (name,
//! aliases, priority, flags, subcommands, callback delays) lives in a
//! [`CommandSpec`] built with [`CommandBuilder`]; behavior lives in the trait
//! methods.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::context::CommandContext;
use crate::error::{ExecutionFailure, RegistryError, Result};
use crate::key::normalize_alias;
use crate::node::{Node, NodeRef};

pub(crate) mod table;

/// Shared handle to a command.
pub type CommandRef = Arc<dyn Command>;

/// Behavior of a registrable command.
#[async_trait]
pub trait Command: Send + Sync + 'static {
	/// Declarative metadata and runtime flags.
	fn spec(&self) -> &CommandSpec;

	/// Runs the command.
	async fn execute(&self, ctx: &CommandContext) -> std::result::Result<(), ExecutionFailure>;

	/// Permission gate evaluated right before [`Command::execute`].
	async fn permitted(&self, _ctx: &CommandContext) -> bool {
		true
	}

	/// Runs after a successful execution, delayed by [`CommandSpec::on_success_delay`].
	async fn on_success(&self, _ctx: &CommandContext) {}

	/// Runs after a failed execution, delayed by [`CommandSpec::on_failure_delay`].
	async fn on_failure(&self, _ctx: &CommandContext, _failure: &ExecutionFailure) {}
}

/// Outcome of a successful [`register_command`](crate::RegistryTree::register_command).
#[derive(Clone)]
pub enum Registration {
	/// The command was added.
	Inserted,
	/// The command was added and displaced overridable commands.
	Replaced(Vec<CommandRef>),
	/// The same instance was already registered; nothing changed.
	Unchanged,
}

impl std::fmt::Debug for Registration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Inserted => write!(f, "Inserted"),
			Self::Replaced(cmds) => f.debug_tuple("Replaced").field(&cmds.iter().map(|c| c.spec().name()).collect::<Vec<_>>()).finish(),
			Self::Unchanged => write!(f, "Unchanged"),
		}
	}
}

/// Metadata and runtime state of a command.
pub struct CommandSpec {
	name: String,
	description: String,
	aliases: BTreeSet<String>,
	priority: i32,
	enabled: AtomicBool,
	overridable: bool,
	sub_command: bool,
	execute_parent: bool,
	sub_commands: Vec<CommandRef>,
	on_success_delay: Duration,
	on_failure_delay: Duration,
	registry: RwLock<Weak<Node>>,
}

impl CommandSpec {
	pub fn builder(name: impl Into<String>) -> CommandBuilder {
		CommandBuilder::new(name)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	/// Normalized aliases in lexicographic order. Always contains the normalized name.
	pub fn aliases(&self) -> &BTreeSet<String> {
		&self.aliases
	}

	/// Whether `token` matches one of the aliases after normalization.
	pub fn matches(&self, token: &str) -> bool {
		self.aliases.contains(&normalize_alias(token))
	}

	/// Tie-break order among equally matching commands (lower wins).
	pub fn priority(&self) -> i32 {
		self.priority
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::Acquire)
	}

	/// Enables or disables the command. Disabled commands stay registered but never resolve.
	pub fn set_enabled(&self, enabled: bool) {
		self.enabled.store(enabled, Ordering::Release);
	}

	/// Whether a later registration may displace this command on alias conflict.
	pub fn is_overridable(&self) -> bool {
		self.overridable
	}

	pub fn is_sub_command(&self) -> bool {
		self.sub_command
	}

	/// Whether the parent command runs before this one when it is reached as a subcommand.
	pub fn execute_parent(&self) -> bool {
		self.execute_parent
	}

	/// Subcommands in declaration order.
	pub fn sub_commands(&self) -> &[CommandRef] {
		&self.sub_commands
	}

	/// Subcommands ordered by name, then priority.
	pub fn sub_commands_sorted(&self) -> Vec<CommandRef> {
		let mut subs = self.sub_commands.clone();
		subs.sort_by(|a, b| a.spec().name.cmp(&b.spec().name).then(a.spec().priority.cmp(&b.spec().priority)));
		subs
	}

	pub fn on_success_delay(&self) -> Duration {
		self.on_success_delay
	}

	pub fn on_failure_delay(&self) -> Duration {
		self.on_failure_delay
	}

	/// Node this command is registered under, if it is still alive.
	pub fn registry(&self) -> Option<NodeRef> {
		self.registry.read().upgrade()
	}

	/// Fully qualified signature: node path followed by the command name.
	pub fn signature(&self) -> Option<String> {
		self.registry().map(|node| format!("{}/{}", node.path(), self.name))
	}

	pub(crate) fn bind_registry(&self, node: &NodeRef) {
		*self.registry.write() = Arc::downgrade(node);
		for sub in &self.sub_commands {
			sub.spec().bind_registry(node);
		}
	}

	pub(crate) fn clear_registry(&self) {
		*self.registry.write() = Weak::new();
		for sub in &self.sub_commands {
			sub.spec().clear_registry();
		}
	}
}

impl std::fmt::Debug for CommandSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandSpec")
			.field("name", &self.name)
			.field("aliases", &self.aliases)
			.field("priority", &self.priority)
			.field("enabled", &self.is_enabled())
			.field("sub_commands", &self.sub_commands.len())
			.finish_non_exhaustive()
	}
}

/// Builder for [`CommandSpec`].
#[derive(Default)]
pub struct CommandBuilder {
	name: String,
	description: String,
	aliases: Vec<String>,
	priority: i32,
	disabled: bool,
	overridable: bool,
	sub_command: bool,
	execute_parent: bool,
	sub_commands: Vec<CommandRef>,
	on_success_delay: Duration,
	on_failure_delay: Duration,
}

impl CommandBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn alias(mut self, alias: impl Into<String>) -> Self {
		self.aliases.push(alias.into());
		self
	}

	pub fn aliases<I, S>(mut self, aliases: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.aliases.extend(aliases.into_iter().map(Into::into));
		self
	}

	pub fn priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	/// Starts the command disabled.
	pub fn disabled(mut self) -> Self {
		self.disabled = true;
		self
	}

	pub fn overridable(mut self) -> Self {
		self.overridable = true;
		self
	}

	/// Marks the command as reachable only through a parent.
	pub fn sub_command(mut self) -> Self {
		self.sub_command = true;
		self
	}

	/// Runs the parent command before this one.
	pub fn execute_parent(mut self) -> Self {
		self.execute_parent = true;
		self
	}

	pub fn child(mut self, command: CommandRef) -> Self {
		self.sub_commands.push(command);
		self
	}

	pub fn on_success_delay(mut self, delay: Duration) -> Self {
		self.on_success_delay = delay;
		self
	}

	pub fn on_failure_delay(mut self, delay: Duration) -> Self {
		self.on_failure_delay = delay;
		self
	}

	/// Validates and freezes the spec.
	pub fn build(self) -> Result<CommandSpec> {
		let name = self.name.trim().to_owned();
		if name.is_empty() {
			return Err(RegistryError::InvalidArgument("empty command name".to_owned()));
		}

		let mut aliases = BTreeSet::new();
		for raw in std::iter::once(name.as_str()).chain(self.aliases.iter().map(String::as_str)) {
			let alias = normalize_alias(raw);
			if alias.is_empty() || alias.chars().any(char::is_whitespace) {
				return Err(RegistryError::InvalidArgument(format!("invalid alias {raw:?} for command {name}")));
			}
			aliases.insert(alias);
		}

		if let Some(sub) = self.sub_commands.iter().find(|s| !s.spec().is_sub_command()) {
			return Err(RegistryError::InvalidArgument(format!(
				"{} is declared as a child of {name} but not marked as a subcommand",
				sub.spec().name()
			)));
		}

		Ok(CommandSpec {
			name,
			description: self.description,
			aliases,
			priority: self.priority,
			enabled: AtomicBool::new(!self.disabled),
			overridable: self.overridable,
			sub_command: self.sub_command,
			execute_parent: self.execute_parent,
			sub_commands: self.sub_commands,
			on_success_delay: self.on_success_delay,
			on_failure_delay: self.on_failure_delay,
			registry: RwLock::new(Weak::new()),
		})
	}
}

/// Picks the enabled command matching `token` with the lowest priority, earliest first on ties.
pub(crate) fn select<'a, I>(candidates: I, token: &str) -> Option<&'a CommandRef>
where
	I: IntoIterator<Item = &'a CommandRef>,
{
	let token = normalize_alias(token);
	candidates
		.into_iter()
		.enumerate()
		.filter(|(_, c)| c.spec().is_enabled() && c.spec().aliases().contains(&token))
		.min_by_key(|(order, c)| (c.spec().priority(), *order))
		.map(|(_, c)| c)
}

#[cfg(test)]
mod tests;
