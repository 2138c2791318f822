//! Registry nodes.
//!
//! # Role
//!
//! A node is either [`NodeKind::Real`], holding commands for a live backing
//! context, or [`NodeKind::Placeholder`], standing in for a context that does
//! not exist yet. Both share the structural fields (identity, parent, children,
//! placeholders, prefix, essential flag). The kind of a node object never
//! changes: promotion and demotion build a new object and move the children
//! across (see [`crate::tree`]).
//!
//! # Invariants
//!
//! - Placeholders never hold commands.
//! - Placeholders have no `last_changed` timestamp.
//! - Lock order is parent `links` before child `links`; no code takes a parent
//!   lock while holding a child lock.
//! - The detached flag only flips while the node's own `links` write lock is
//!   held, so anything inserted under a live-checked lock is carried over to the
//!   successor or detached along with the node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::command::table::CommandTable;
use crate::command::{CommandRef, Registration};
use crate::error::{RegistryError, Result};
use crate::key::QualifiedName;

/// Shared handle to a node.
pub type NodeRef = Arc<Node>;

/// Lifecycle state of a node object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	/// Backed by a live context; may hold commands.
	Real,
	/// Stand-in for a context that does not exist yet; holds only children.
	Placeholder,
}

enum Body {
	Real {
		commands: ArcSwap<CommandTable>,
		/// Serializes command-table writers; readers go through `commands` lock-free.
		write: Mutex<()>,
		last_changed: Mutex<DateTime<Utc>>,
	},
	Placeholder {
		created_at: DateTime<Utc>,
	},
}

/// Child maps of a node, keyed by qualified name in insertion order.
#[derive(Default)]
pub(crate) struct Links {
	pub(crate) children: IndexMap<QualifiedName, NodeRef>,
	pub(crate) placeholders: IndexMap<QualifiedName, NodeRef>,
}

/// A node of the registry tree.
pub struct Node {
	key: QualifiedName,
	body: Body,
	parent: RwLock<Weak<Node>>,
	essential: AtomicBool,
	prefix: RwLock<Option<String>>,
	pub(crate) links: RwLock<Links>,
	successor: RwLock<Weak<Node>>,
	detached: AtomicBool,
}

impl Node {
	pub(crate) fn new_real(key: QualifiedName, parent: Weak<Node>, essential: bool, prefix: Option<String>) -> NodeRef {
		Self::with_body(
			key,
			parent,
			essential,
			prefix,
			Body::Real {
				commands: ArcSwap::from_pointee(CommandTable::default()),
				write: Mutex::new(()),
				last_changed: Mutex::new(Utc::now()),
			},
		)
	}

	pub(crate) fn new_placeholder(key: QualifiedName, parent: Weak<Node>, essential: bool, prefix: Option<String>) -> NodeRef {
		Self::with_body(key, parent, essential, prefix, Body::Placeholder { created_at: Utc::now() })
	}

	fn with_body(key: QualifiedName, parent: Weak<Node>, essential: bool, prefix: Option<String>, body: Body) -> NodeRef {
		Arc::new(Self {
			key,
			body,
			parent: RwLock::new(parent),
			essential: AtomicBool::new(essential),
			prefix: RwLock::new(prefix),
			links: RwLock::new(Links::default()),
			successor: RwLock::new(Weak::new()),
			detached: AtomicBool::new(false),
		})
	}

	pub fn key(&self) -> &QualifiedName {
		&self.key
	}

	pub fn kind(&self) -> NodeKind {
		match self.body {
			Body::Real { .. } => NodeKind::Real,
			Body::Placeholder { .. } => NodeKind::Placeholder,
		}
	}

	pub fn is_placeholder(&self) -> bool {
		self.kind() == NodeKind::Placeholder
	}

	pub fn parent(&self) -> Option<NodeRef> {
		self.parent.read().upgrade()
	}

	pub(crate) fn set_parent(&self, parent: &NodeRef) {
		*self.parent.write() = Arc::downgrade(parent);
	}

	/// Slash-separated qualified names from below the root down to this node.
	///
	/// The root renders as its own key.
	pub fn path(&self) -> String {
		let mut parent = self.parent();
		if parent.is_none() {
			return self.key.to_string();
		}
		let mut segments = vec![self.key.to_string()];
		while let Some(node) = parent {
			parent = node.parent();
			if parent.is_some() {
				segments.push(node.key.to_string());
			}
		}
		segments.reverse();
		segments.join("/")
	}

	pub fn is_essential(&self) -> bool {
		self.essential.load(Ordering::Acquire)
	}

	pub fn set_essential(&self, essential: bool) {
		self.essential.store(essential, Ordering::Release);
		self.touch();
	}

	/// The node's own prefix, if set.
	pub fn prefix(&self) -> Option<String> {
		self.prefix.read().clone()
	}

	/// Sets or clears the node's own prefix.
	pub fn set_prefix(&self, prefix: Option<String>) -> Result<()> {
		if let Some(p) = &prefix {
			crate::config::validate_prefix(p).map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;
		}
		*self.prefix.write() = prefix;
		self.touch();
		Ok(())
	}

	/// The node's prefix, else the nearest ancestor's.
	///
	/// The root always carries the tree-wide default, so only detached nodes return `None`.
	pub fn effective_prefix(&self) -> Option<String> {
		if let Some(prefix) = self.prefix() {
			return Some(prefix);
		}
		let mut current = self.parent();
		while let Some(node) = current {
			if let Some(prefix) = node.prefix() {
				return Some(prefix);
			}
			current = node.parent();
		}
		None
	}

	/// Time of the last mutation. Always `None` for placeholders.
	pub fn last_changed(&self) -> Option<DateTime<Utc>> {
		match &self.body {
			Body::Real { last_changed, .. } => Some(*last_changed.lock()),
			Body::Placeholder { .. } => None,
		}
	}

	pub(crate) fn touch(&self) {
		if let Body::Real { last_changed, .. } = &self.body {
			*last_changed.lock() = Utc::now();
		}
	}

	/// Creation time of a placeholder.
	pub fn created_at(&self) -> Option<DateTime<Utc>> {
		match &self.body {
			Body::Placeholder { created_at } => Some(*created_at),
			Body::Real { .. } => None,
		}
	}

	/// Whether this is a placeholder older than `ttl`.
	pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
		let (Some(ttl), Some(created_at)) = (ttl, self.created_at()) else {
			return false;
		};
		chrono::Duration::from_std(ttl).is_ok_and(|ttl| now - created_at >= ttl)
	}

	/// Whether the node was unlinked from the tree (deleted, promoted or demoted).
	pub fn is_detached(&self) -> bool {
		self.detached.load(Ordering::Acquire)
	}

	/// The node currently standing in for this one.
	///
	/// Follows promotion/demotion successors; returns `self` when there is none.
	pub fn current(self: &Arc<Self>) -> NodeRef {
		let mut node = self.clone();
		loop {
			let next = node.successor.read().upgrade();
			match next {
				Some(next) => node = next,
				None => return node,
			}
		}
	}

	/// Real child nodes in insertion order.
	pub fn children(&self) -> Vec<NodeRef> {
		self.links.read().children.values().cloned().collect()
	}

	/// Placeholder children in insertion order.
	pub fn placeholders(&self) -> Vec<NodeRef> {
		self.links.read().placeholders.values().cloned().collect()
	}

	pub fn child(&self, key: &QualifiedName) -> Option<NodeRef> {
		self.links.read().children.get(key).cloned()
	}

	pub fn placeholder(&self, key: &QualifiedName) -> Option<NodeRef> {
		self.links.read().placeholders.get(key).cloned()
	}

	/// Commands registered directly on this node, in registration order.
	pub fn commands(&self) -> Vec<CommandRef> {
		self.table().map(|t| t.commands().cloned().collect()).unwrap_or_default()
	}

	/// Commands ordered by name, for listings.
	pub fn list_commands(&self) -> Vec<CommandRef> {
		let mut commands = self.commands();
		commands.sort_by(|a, b| a.spec().name().cmp(b.spec().name()));
		commands
	}

	/// The enabled command winning `token` among this node's direct commands.
	pub fn lookup(&self, token: &str) -> Option<CommandRef> {
		self.table()?.lookup(token).cloned()
	}

	pub(crate) fn table(&self) -> Option<Arc<CommandTable>> {
		match &self.body {
			Body::Real { commands, .. } => Some(commands.load_full()),
			Body::Placeholder { .. } => None,
		}
	}

	/// Adds `command` under the per-node write lock.
	pub(crate) fn insert_command(self: &Arc<Self>, command: CommandRef) -> Result<Registration> {
		let Body::Real { commands, write, .. } = &self.body else {
			return Err(RegistryError::UnsupportedOnPlaceholder { node: self.path() });
		};
		let _guard = write.lock();
		if self.is_detached() {
			return Err(RegistryError::Detached { node: self.path() });
		}

		let table = commands.load_full();
		if table.contains(&command) {
			return Ok(Registration::Unchanged);
		}
		if let Some(owner) = command.spec().registry() {
			return Err(RegistryError::AlreadyRegistered {
				command: command.spec().name().to_owned(),
				node: owner.path(),
			});
		}

		let mut displaced: Vec<CommandRef> = Vec::new();
		for alias in command.spec().aliases() {
			for existing in table.claimants(alias).filter(|c| c.spec().is_enabled()) {
				if !existing.spec().is_overridable() {
					return Err(RegistryError::NamingConflict {
						key: alias.clone(),
						existing: existing.spec().name().to_owned(),
					});
				}
				if !displaced.iter().any(|d| Arc::ptr_eq(d, existing)) {
					displaced.push(existing.clone());
				}
			}
		}

		commands.store(Arc::new(table.with_inserted(command.clone(), &displaced)));
		for old in &displaced {
			old.spec().clear_registry();
		}
		command.spec().bind_registry(self);
		self.touch();

		if displaced.is_empty() {
			Ok(Registration::Inserted)
		} else {
			Ok(Registration::Replaced(displaced))
		}
	}

	/// Removes `command`; returns whether it was present.
	pub(crate) fn remove_command(&self, command: &CommandRef) -> bool {
		let Body::Real { commands, write, .. } = &self.body else {
			return false;
		};
		let _guard = write.lock();
		let Some(next) = commands.load().with_removed(command) else {
			return false;
		};
		commands.store(Arc::new(next));
		command.spec().clear_registry();
		self.touch();
		true
	}

	/// Drops every command, clearing back-references.
	fn clear_commands(&self) {
		if let Body::Real { commands, write, .. } = &self.body {
			let _guard = write.lock();
			let old = commands.swap(Arc::new(CommandTable::default()));
			for command in old.commands() {
				command.spec().clear_registry();
			}
		}
	}

	/// Whether the node is essential, or anything below it is essential or an unexpired placeholder.
	pub fn has_essential_content(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
		if self.is_essential() {
			return true;
		}
		let links = self.links.read();
		links.children.values().any(|c| c.has_essential_content(ttl, now))
			|| links
				.placeholders
				.values()
				.any(|p| !p.is_expired(ttl, now) || p.has_essential_content(ttl, now))
	}

	/// Marks the node detached and takes its links in one critical section.
	///
	/// Writers that check [`Node::is_detached`] under this node's `links` lock
	/// either run before the take, and their insertion moves along with the
	/// links, or observe the flag.
	fn seal(&self) -> Links {
		let mut links = self.links.write();
		self.detached.store(true, Ordering::Release);
		std::mem::take(&mut *links)
	}

	/// Hands all children and placeholders to `successor` and unlinks this node.
	///
	/// The caller holds the write lock on the shared parent's `links`, so no
	/// lookup can reach either node mid-transfer.
	pub(crate) fn retire_into(&self, successor: &NodeRef) {
		*self.successor.write() = Arc::downgrade(successor);
		let moved = self.seal();
		for child in moved.children.values().chain(moved.placeholders.values()) {
			child.set_parent(successor);
		}
		*successor.links.write() = moved;
		successor.touch();
		self.clear_commands();
	}

	/// Unlinks this node and everything below it.
	pub(crate) fn detach_subtree(&self) {
		let links = self.seal();
		self.clear_commands();
		for child in links.children.values().chain(links.placeholders.values()) {
			child.detach_subtree();
		}
	}
}

impl std::fmt::Debug for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Node")
			.field("key", &self.key)
			.field("kind", &self.kind())
			.field("essential", &self.is_essential())
			.field("detached", &self.is_detached())
			.finish_non_exhaustive()
	}
}
