//! Execution of resolved command chains.
//!
//! # Role
//!
//! Given a [`Resolved`] chain, runs the leaf and whichever ancestors it pulls
//! in through [`CommandSpec::execute_parent`](crate::CommandSpec::execute_parent),
//! outermost first. Each command passes its permission gate before executing.
//! The first failure stops the chain; deeper commands never run.
//!
//! After the chain settles, the callback of the command that ended it (the leaf
//! on success, the failing command on failure) runs inline when its delay is
//! zero, or is spawned to start after the delay otherwise.

use std::sync::Arc;

use herald_worker::TaskClass;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::command::CommandRef;
use crate::context::CommandContext;
use crate::error::{ExecutionFailure, RegistryError, Result};
use crate::resolve::Resolved;

/// What happened to the post-execution callback.
#[derive(Debug)]
pub enum Callback {
	/// Ran inline before `dispatch` returned.
	Ran,
	/// Spawned to run after the declared delay.
	Scheduled(JoinHandle<()>),
}

/// Report of one dispatched chain.
pub struct Dispatched {
	/// The command that ended the chain: the leaf, or the one that failed.
	pub command: CommandRef,
	/// Commands that executed successfully, in order.
	pub executed: Vec<CommandRef>,
	pub result: std::result::Result<(), ExecutionFailure>,
	pub callback: Callback,
}

impl Dispatched {
	pub fn is_success(&self) -> bool {
		self.result.is_ok()
	}

	/// Waits for a scheduled callback, then returns the execution result.
	pub async fn settle(self) -> std::result::Result<(), ExecutionFailure> {
		if let Callback::Scheduled(handle) = self.callback
			&& let Err(err) = handle.await
		{
			warn!(command = self.command.spec().name(), %err, "dispatch.callback.join_failed");
		}
		self.result
	}
}

impl std::fmt::Debug for Dispatched {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatched")
			.field("command", &self.command.spec().name())
			.field("executed", &self.executed.iter().map(|c| c.spec().name()).collect::<Vec<_>>())
			.field("result", &self.result)
			.field("callback", &self.callback)
			.finish()
	}
}

/// Runs resolved command chains.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Dispatcher {
	pub fn new() -> Self {
		Self
	}

	/// Executes `resolved` with the shared context.
	///
	/// Execution failures are reported in [`Dispatched::result`]. The only error
	/// is [`RegistryError::CommandDisabled`], raised before anything runs when a
	/// command in the plan was disabled after resolution, or in place of a later
	/// step when an earlier command disabled it while executing.
	pub async fn dispatch(&self, resolved: &Resolved, ctx: Arc<CommandContext>) -> Result<Dispatched> {
		let plan = execution_plan(resolved);
		if let Some(disabled) = plan.iter().find(|c| !c.spec().is_enabled()) {
			error!(command = disabled.spec().name(), "dispatch.disabled_command");
			return Err(RegistryError::CommandDisabled {
				command: disabled.spec().name().to_owned(),
			});
		}

		let mut executed = Vec::with_capacity(plan.len());
		for command in plan {
			if !command.spec().is_enabled() {
				error!(command = command.spec().name(), executed = executed.len(), "dispatch.disabled_command");
				return Err(RegistryError::CommandDisabled {
					command: command.spec().name().to_owned(),
				});
			}
			debug!(command = command.spec().name(), "dispatch.execute");
			if let Err(failure) = run(&command, &ctx).await {
				warn!(command = command.spec().name(), %failure, "dispatch.failed");
				let callback = schedule_failure(command.clone(), ctx, failure.clone()).await;
				return Ok(Dispatched {
					command,
					executed,
					result: Err(failure),
					callback,
				});
			}
			executed.push(command);
		}

		let command = resolved.command.clone();
		let callback = schedule_success(command.clone(), ctx).await;
		Ok(Dispatched {
			command,
			executed,
			result: Ok(()),
			callback,
		})
	}
}

/// Commands to run, outermost first.
///
/// Starting at the leaf, each command that sets `execute_parent` pulls in the
/// command directly above it in the chain.
pub(crate) fn execution_plan(resolved: &Resolved) -> Vec<CommandRef> {
	let full: Vec<&CommandRef> = resolved.full_chain().collect();
	let mut start = full.len() - 1;
	while start > 0 && full[start].spec().execute_parent() {
		start -= 1;
	}
	full[start..].iter().map(|c| (*c).clone()).collect()
}

async fn run(command: &CommandRef, ctx: &CommandContext) -> std::result::Result<(), ExecutionFailure> {
	if !command.permitted(ctx).await {
		return Err(ExecutionFailure::MissingPermission {
			command: command.spec().name().to_owned(),
		});
	}
	command.execute(ctx).await
}

async fn schedule_success(command: CommandRef, ctx: Arc<CommandContext>) -> Callback {
	let delay = command.spec().on_success_delay();
	if delay.is_zero() {
		command.on_success(&ctx).await;
		return Callback::Ran;
	}
	Callback::Scheduled(herald_worker::spawn_after(TaskClass::Callback, delay, async move {
		command.on_success(&ctx).await;
	}))
}

async fn schedule_failure(command: CommandRef, ctx: Arc<CommandContext>, failure: ExecutionFailure) -> Callback {
	let delay = command.spec().on_failure_delay();
	if delay.is_zero() {
		command.on_failure(&ctx, &failure).await;
		return Callback::Ran;
	}
	Callback::Scheduled(herald_worker::spawn_after(TaskClass::Callback, delay, async move {
		command.on_failure(&ctx, &failure).await;
	}))
}
