//! Immutable per-node command table.
//!
//! Tables are published through `ArcSwap`; every mutation builds a new table.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::CommandRef;
use crate::key::normalize_alias;

#[derive(Clone)]
struct Entry {
	command: CommandRef,
	ordinal: u64,
}

/// Commands registered directly on a node, indexed by alias.
#[derive(Clone, Default)]
pub(crate) struct CommandTable {
	/// Registration order.
	entries: Vec<Entry>,
	/// alias -> indices into `entries`, in registration order.
	by_alias: BTreeMap<String, Vec<usize>>,
	next_ordinal: u64,
}

impl CommandTable {
	pub(crate) fn contains(&self, command: &CommandRef) -> bool {
		self.entries.iter().any(|e| Arc::ptr_eq(&e.command, command))
	}

	pub(crate) fn commands(&self) -> impl Iterator<Item = &CommandRef> {
		self.entries.iter().map(|e| &e.command)
	}

	/// All commands claiming `alias`, disabled ones included.
	pub(crate) fn claimants(&self, alias: &str) -> impl Iterator<Item = &CommandRef> {
		self.by_alias
			.get(alias)
			.into_iter()
			.flatten()
			.map(|&i| &self.entries[i].command)
	}

	/// Resolves a token to the winning enabled command.
	///
	/// Lowest priority wins; equal priorities fall back to registration order.
	pub(crate) fn lookup(&self, token: &str) -> Option<&CommandRef> {
		let alias = normalize_alias(token);
		self.by_alias
			.get(&alias)?
			.iter()
			.map(|&i| &self.entries[i])
			.filter(|e| e.command.spec().is_enabled())
			.min_by_key(|e| (e.command.spec().priority(), e.ordinal))
			.map(|e| &e.command)
	}

	/// Returns a copy with `command` appended and every command in `displaced` removed.
	pub(crate) fn with_inserted(&self, command: CommandRef, displaced: &[CommandRef]) -> Self {
		let mut entries: Vec<Entry> = self
			.entries
			.iter()
			.filter(|e| !displaced.iter().any(|d| Arc::ptr_eq(d, &e.command)))
			.cloned()
			.collect();
		entries.push(Entry {
			command,
			ordinal: self.next_ordinal,
		});
		Self::from_entries(entries, self.next_ordinal + 1)
	}

	/// Returns a copy without `command`, or `None` if it is absent.
	pub(crate) fn with_removed(&self, command: &CommandRef) -> Option<Self> {
		if !self.contains(command) {
			return None;
		}
		let entries = self.entries.iter().filter(|e| !Arc::ptr_eq(&e.command, command)).cloned().collect();
		Some(Self::from_entries(entries, self.next_ordinal))
	}

	fn from_entries(entries: Vec<Entry>, next_ordinal: u64) -> Self {
		let mut by_alias: BTreeMap<String, Vec<usize>> = BTreeMap::new();
		for (i, entry) in entries.iter().enumerate() {
			for alias in entry.command.spec().aliases() {
				by_alias.entry(alias.clone()).or_default().push(i);
			}
		}
		Self {
			entries,
			by_alias,
			next_ordinal,
		}
	}
}
