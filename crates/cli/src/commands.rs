//! Built-in console commands.
//!
//! The `economy` module is configured as a placeholder first and promoted once
//! "loaded", the same way a host attaches settings to modules before they exist.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use herald_registry::{Command, CommandContext, CommandRef, CommandSpec, ExecutionFailure, NodeRef, RegistryTree, Reply, Result};
use tracing::info;

/// Installs the built-in commands on `node` and loads the economy module below it.
pub fn install(tree: &RegistryTree, node: &NodeRef) -> Result<()> {
	let long: CommandRef = Arc::new(Ping {
		spec: CommandSpec::builder("long")
			.description("Follow up on the pong")
			.sub_command()
			.execute_parent()
			.build()?,
		text: "...and a long pong",
	});
	let ping = Arc::new(Ping {
		spec: CommandSpec::builder("ping").alias("p").description("Check that the registry answers").child(long).build()?,
		text: "pong",
	});
	tree.register_command(node, ping)?;
	tree.register_command(node, Arc::new(Echo(CommandSpec::builder("echo").alias("say").description("Repeat the arguments").build()?)))?;
	tree.register_command(
		node,
		Arc::new(Help(CommandSpec::builder("help").alias("?").description("List commands on this node").overridable().build()?)),
	)?;

	let economy = tree.get_placeholder_in(node, "module", "economy")?;
	let bank = tree.register_child(&economy, "group", "bank")?;
	let funds = Arc::new(AtomicI64::new(100));
	tree.register_command(
		&bank,
		Arc::new(Balance {
			spec: CommandSpec::builder("balance").alias("bal").description("Show the account balance").build()?,
			funds: funds.clone(),
		}),
	)?;
	tree.register_command(
		&bank,
		Arc::new(Deposit {
			spec: CommandSpec::builder("deposit").description("Add funds to the account").build()?,
			funds,
		}),
	)?;
	let economy = tree.promote(&economy)?;
	info!(node = %economy.path(), "cli.module.loaded");
	Ok(())
}

struct Ping {
	spec: CommandSpec,
	text: &'static str,
}

#[async_trait]
impl Command for Ping {
	fn spec(&self) -> &CommandSpec {
		&self.spec
	}

	async fn execute(&self, ctx: &CommandContext) -> std::result::Result<(), ExecutionFailure> {
		ctx.reply(self.text).await
	}
}

struct Echo(CommandSpec);

#[async_trait]
impl Command for Echo {
	fn spec(&self) -> &CommandSpec {
		&self.0
	}

	async fn execute(&self, ctx: &CommandContext) -> std::result::Result<(), ExecutionFailure> {
		if ctx.args().is_empty() {
			return Err(ExecutionFailure::InvalidUsage("echo <text>".to_owned()));
		}
		ctx.reply(ctx.args().join(" ")).await
	}
}

struct Help(CommandSpec);

#[async_trait]
impl Command for Help {
	fn spec(&self) -> &CommandSpec {
		&self.0
	}

	async fn execute(&self, ctx: &CommandContext) -> std::result::Result<(), ExecutionFailure> {
		let Some(node) = ctx.node() else {
			return Err(ExecutionFailure::Other("help needs a node".to_owned()));
		};
		ctx.send(Reply::private(render_help(node))).await
	}
}

/// Lists commands by name with their aliases, then child nodes.
pub(crate) fn render_help(node: &NodeRef) -> String {
	let mut out = String::new();
	for command in node.list_commands() {
		let spec = command.spec();
		let aliases: Vec<&str> = spec.aliases().iter().map(String::as_str).filter(|a| *a != spec.name()).collect();
		let _ = write!(out, "{}", spec.name());
		if !aliases.is_empty() {
			let _ = write!(out, " ({})", aliases.join(", "));
		}
		if !spec.description().is_empty() {
			let _ = write!(out, " - {}", spec.description());
		}
		if !spec.is_enabled() {
			out.push_str(" [disabled]");
		}
		out.push('\n');
		for sub in spec.sub_commands_sorted() {
			let _ = writeln!(out, "  {} - {}", sub.spec().name(), sub.spec().description());
		}
	}
	let children = node.children();
	if !children.is_empty() {
		let names: Vec<&str> = children.iter().map(|c| c.key().name()).collect();
		let _ = writeln!(out, "modules: {}", names.join(", "));
	}
	out.trim_end().to_owned()
}

struct Balance {
	spec: CommandSpec,
	funds: Arc<AtomicI64>,
}

#[async_trait]
impl Command for Balance {
	fn spec(&self) -> &CommandSpec {
		&self.spec
	}

	async fn execute(&self, ctx: &CommandContext) -> std::result::Result<(), ExecutionFailure> {
		ctx.reply(format!("balance: {}", self.funds.load(Ordering::Acquire))).await
	}
}

struct Deposit {
	spec: CommandSpec,
	funds: Arc<AtomicI64>,
}

#[async_trait]
impl Command for Deposit {
	fn spec(&self) -> &CommandSpec {
		&self.spec
	}

	async fn execute(&self, ctx: &CommandContext) -> std::result::Result<(), ExecutionFailure> {
		let amount = match ctx.args() {
			[amount] => amount.parse::<i64>().ok().filter(|a| *a > 0),
			_ => None,
		};
		let Some(amount) = amount else {
			return Err(ExecutionFailure::InvalidUsage("deposit <positive amount>".to_owned()));
		};
		let total = self.funds.fetch_add(amount, Ordering::AcqRel) + amount;
		ctx.reply(format!("deposited {amount}, balance: {total}")).await
	}
}
