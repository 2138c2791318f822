//! Registry tree manager.
//!
//! # Role
//!
//! Owns the root node and performs every structural mutation: creating nodes
//! for origins, creating placeholders, promoting placeholders to real nodes,
//! demoting or deleting removed nodes, and registering commands.
//!
//! # Invariants
//!
//! - A qualified name appears at most once among a parent's children and
//!   placeholders combined.
//! - Promotion and demotion run under the parent's `links` write lock, so a
//!   concurrent lookup sees either the old node with all its children or the
//!   new node with all its children.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, trace};

use crate::command::{CommandRef, Registration};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::key::{Linked, QualifiedName, lineage};
use crate::node::{Links, Node, NodeKind, NodeRef};

/// What [`RegistryTree::remove_node`] did with the node.
#[derive(Debug, Clone)]
pub enum Removal {
	/// The node and its subtree were dropped.
	Deleted,
	/// The node was replaced by this placeholder, which now holds its children.
	Demoted(NodeRef),
	/// The node is a placeholder with essential content and stays as is.
	Retained,
}

/// The tree of registry nodes.
pub struct RegistryTree {
	root: NodeRef,
	placeholder_ttl: Option<Duration>,
}

impl RegistryTree {
	/// Creates a tree whose root carries `config.prefix` as the default prefix.
	pub fn new(config: RegistryConfig) -> Self {
		let placeholder_ttl = config.placeholder_ttl();
		let root = Node::new_real(QualifiedName::root(), std::sync::Weak::new(), true, Some(config.prefix));
		Self { root, placeholder_ttl }
	}

	pub fn root(&self) -> &NodeRef {
		&self.root
	}

	pub fn placeholder_ttl(&self) -> Option<Duration> {
		self.placeholder_ttl
	}

	/// Returns the real node for `origin`, creating it and any missing ancestors.
	///
	/// Placeholders along the way are promoted. If a level is demoted or deleted
	/// while the walk is in progress, the walk restarts from the root.
	pub fn get_or_create_node(&self, origin: &dyn Linked) -> Result<NodeRef> {
		let levels = lineage(origin)?;
		'walk: loop {
			let mut current = self.root.clone();
			for level in &levels {
				let mut links = current.links.write();
				if current.is_detached() {
					drop(links);
					trace!(node = %current.path(), "registry.node.walk_restarted");
					continue 'walk;
				}
				let next = if let Some(node) = links.children.get(&level.key) {
					node.clone()
				} else if let Some(placeholder) = links.placeholders.shift_remove(&level.key) {
					let node = promote_locked(&current, &mut links, placeholder);
					if level.essential {
						node.set_essential(true);
					}
					if node.prefix().is_none() && level.prefix.is_some() {
						node.set_prefix(level.prefix.clone())?;
					}
					node
				} else {
					let node = Node::new_real(level.key.clone(), Arc::downgrade(&current), level.essential, level.prefix.clone());
					links.children.insert(level.key.clone(), node.clone());
					current.touch();
					debug!(node = %node.path(), "registry.node.created");
					node
				};
				drop(links);
				current = next;
			}
			return Ok(current);
		}
	}

	/// Looks up the node for `origin` without creating anything.
	///
	/// Falls back to a placeholder at the last level when no real node exists.
	pub fn find_origin(&self, origin: &dyn Linked) -> Result<Option<NodeRef>> {
		let keys: Vec<_> = lineage(origin)?.into_iter().map(|l| l.key).collect();
		Ok(self.find(&keys))
	}

	/// Walks `keys` from the root through real children and placeholders.
	pub fn find(&self, keys: &[QualifiedName]) -> Option<NodeRef> {
		let mut current = self.root.clone();
		for key in keys {
			let next = {
				let links = current.links.read();
				links.children.get(key).or_else(|| links.placeholders.get(key)).cloned()
			};
			current = next?;
		}
		Some(current)
	}

	/// Returns the placeholder for `(qualifier, name)` directly under the root.
	pub fn get_placeholder(&self, qualifier: &str, name: &str) -> Result<NodeRef> {
		self.get_placeholder_in(&self.root, qualifier, name)
	}

	/// Returns or creates a placeholder under `parent`.
	///
	/// If a real node already exists under that name it is returned instead, so
	/// configuration can always be attached to the result.
	pub fn get_placeholder_in(&self, parent: &NodeRef, qualifier: &str, name: &str) -> Result<NodeRef> {
		let key = QualifiedName::new(qualifier, name)?;
		let mut links = parent.links.write();
		ensure_attached(parent)?;
		if let Some(node) = links.children.get(&key).or_else(|| links.placeholders.get(&key)) {
			return Ok(node.clone());
		}
		let placeholder = Node::new_placeholder(key.clone(), Arc::downgrade(parent), false, None);
		links.placeholders.insert(key, placeholder.clone());
		parent.touch();
		debug!(node = %placeholder.path(), "registry.placeholder.created");
		Ok(placeholder)
	}

	/// Creates a real child under `parent`.
	///
	/// A placeholder with the same name is promoted instead. Fails with
	/// [`RegistryError::NamingConflict`] if a real sibling already exists.
	pub fn register_child(&self, parent: &NodeRef, qualifier: &str, name: &str) -> Result<NodeRef> {
		let key = QualifiedName::new(qualifier, name)?;
		let mut links = parent.links.write();
		ensure_attached(parent)?;
		if let Some(existing) = links.children.get(&key) {
			return Err(RegistryError::NamingConflict {
				key: key.to_string(),
				existing: existing.path(),
			});
		}
		if let Some(placeholder) = links.placeholders.shift_remove(&key) {
			return Ok(promote_locked(parent, &mut links, placeholder));
		}
		let node = Node::new_real(key.clone(), Arc::downgrade(parent), false, None);
		links.children.insert(key, node.clone());
		parent.touch();
		debug!(node = %node.path(), "registry.node.created");
		Ok(node)
	}

	/// Promotes the placeholder `placeholder` to a real node.
	///
	/// Returns the real node; a node that is already real is returned unchanged.
	pub fn promote(&self, placeholder: &NodeRef) -> Result<NodeRef> {
		if placeholder.kind() == NodeKind::Real {
			return Ok(placeholder.clone());
		}
		let parent = placeholder.parent().ok_or_else(|| RegistryError::Detached { node: placeholder.path() })?;
		let mut links = parent.links.write();
		let linked = links.placeholders.get(placeholder.key()).is_some_and(|p| Arc::ptr_eq(p, placeholder));
		if !linked {
			return Err(RegistryError::Detached { node: placeholder.path() });
		}
		links.placeholders.shift_remove(placeholder.key());
		Ok(promote_locked(&parent, &mut links, placeholder.clone()))
	}

	/// Removes `node` from the tree.
	///
	/// A node with no essential content is deleted with its subtree. Otherwise a
	/// real node is demoted to a placeholder that takes over its children, and a
	/// placeholder is retained.
	pub fn remove_node(&self, node: &NodeRef) -> Result<Removal> {
		let Some(parent) = node.parent() else {
			return Err(RegistryError::InvalidArgument("the root node cannot be removed".to_owned()));
		};
		let mut links = parent.links.write();
		let map = match node.kind() {
			NodeKind::Real => &links.children,
			NodeKind::Placeholder => &links.placeholders,
		};
		if !map.get(node.key()).is_some_and(|n| Arc::ptr_eq(n, node)) {
			return Err(RegistryError::Detached { node: node.path() });
		}

		let essential = node.has_essential_content(self.placeholder_ttl, Utc::now());
		let removal = match (node.kind(), essential) {
			(NodeKind::Placeholder, true) => return Ok(Removal::Retained),
			(NodeKind::Placeholder, false) => {
				links.placeholders.shift_remove(node.key());
				node.detach_subtree();
				Removal::Deleted
			}
			(NodeKind::Real, false) => {
				links.children.shift_remove(node.key());
				node.detach_subtree();
				Removal::Deleted
			}
			(NodeKind::Real, true) => {
				let placeholder = Node::new_placeholder(node.key().clone(), Arc::downgrade(&parent), node.is_essential(), node.prefix());
				node.retire_into(&placeholder);
				links.children.shift_remove(node.key());
				links.placeholders.insert(node.key().clone(), placeholder.clone());
				Removal::Demoted(placeholder)
			}
		};
		drop(links);
		parent.touch();
		debug!(node = %node.path(), ?removal, "registry.node.removed");
		Ok(removal)
	}

	/// Removes the node belonging to `origin`, if any.
	pub fn remove_origin(&self, origin: &dyn Linked) -> Result<Option<Removal>> {
		match self.find_origin(origin)? {
			Some(node) if !Arc::ptr_eq(&node, &self.root) => self.remove_node(&node).map(Some),
			_ => Ok(None),
		}
	}

	/// Deletes expired placeholders that carry no essential content.
	///
	/// Returns the number of placeholders removed.
	pub fn prune_expired(&self) -> usize {
		let Some(ttl) = self.placeholder_ttl else {
			return 0;
		};
		prune_under(&self.root, ttl, Utc::now())
	}

	/// Registers `command` directly on `node`.
	///
	/// Fails on placeholders, on aliases held by enabled non-overridable
	/// commands, and for subcommands (those register through their parent).
	pub fn register_command(&self, node: &NodeRef, command: CommandRef) -> Result<Registration> {
		if command.spec().is_sub_command() {
			return Err(RegistryError::InvalidArgument(format!(
				"{} is a subcommand and must be registered through its parent",
				command.spec().name()
			)));
		}
		let registration = node.insert_command(command.clone())?;
		debug!(
			node = %node.path(),
			command = command.spec().name(),
			?registration,
			"registry.command.registered"
		);
		Ok(registration)
	}

	/// Removes `command` from `node`; returns whether it was registered there.
	pub fn unregister_command(&self, node: &NodeRef, command: &CommandRef) -> bool {
		let removed = node.remove_command(command);
		if removed {
			debug!(node = %node.path(), command = command.spec().name(), "registry.command.unregistered");
		}
		removed
	}
}

fn ensure_attached(node: &NodeRef) -> Result<()> {
	if node.is_detached() {
		return Err(RegistryError::Detached { node: node.path() });
	}
	Ok(())
}

/// Replaces `placeholder`, already taken out of `links`, with a real node.
///
/// `links` must be `parent`'s write-locked links.
fn promote_locked(parent: &NodeRef, links: &mut Links, placeholder: NodeRef) -> NodeRef {
	let key = placeholder.key().clone();
	let real = Node::new_real(key.clone(), Arc::downgrade(parent), placeholder.is_essential(), placeholder.prefix());
	placeholder.retire_into(&real);
	links.children.insert(key, real.clone());
	parent.touch();
	debug!(node = %real.path(), "registry.placeholder.promoted");
	real
}

fn prune_under(node: &NodeRef, ttl: Duration, now: chrono::DateTime<Utc>) -> usize {
	let mut removed = 0;
	let descend: Vec<NodeRef> = {
		let mut links = node.links.write();
		let expired: Vec<QualifiedName> = links
			.placeholders
			.values()
			.filter(|p| p.is_expired(Some(ttl), now) && !p.has_essential_content(Some(ttl), now))
			.map(|p| p.key().clone())
			.collect();
		for key in expired {
			if let Some(placeholder) = links.placeholders.shift_remove(&key) {
				debug!(node = %placeholder.path(), "registry.placeholder.expired");
				placeholder.detach_subtree();
				removed += 1;
			}
		}
		links.children.values().chain(links.placeholders.values()).cloned().collect()
	};
	if removed > 0 {
		node.touch();
	}
	removed + descend.iter().map(|child| prune_under(child, ttl, now)).sum::<usize>()
}

#[cfg(test)]
mod tests;
