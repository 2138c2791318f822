//! Resolution of token sequences to commands.
//!
//! # Role
//!
//! Strips the effective prefix, then matches tokens against the aliases of the
//! node's direct commands, walking into subcommands as long as tokens keep
//! matching. When no direct command matches, the leading token may name a real
//! child node, in which case resolution continues there. Placeholders are never
//! entered.
//!
//! Resolution only reads published command tables and briefly read-locks child
//! maps, so it runs concurrently with other resolutions and with writers on
//! unrelated nodes.

use crate::command::{CommandRef, select};
use crate::key::normalize_alias;
use crate::node::NodeRef;
use crate::tree::RegistryTree;

/// A matched command together with how it was reached.
#[derive(Clone)]
pub struct Resolved {
	/// Node holding the outermost matched command.
	pub node: NodeRef,
	/// The leaf command.
	pub command: CommandRef,
	/// Commands traversed to reach the leaf, outermost first. Empty for top-level matches.
	pub chain: Vec<CommandRef>,
	/// Tokens left after the matched aliases.
	pub args: Vec<String>,
}

impl Resolved {
	/// The ancestor chain followed by the leaf.
	pub fn full_chain(&self) -> impl Iterator<Item = &CommandRef> {
		self.chain.iter().chain(std::iter::once(&self.command))
	}
}

impl std::fmt::Debug for Resolved {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Resolved")
			.field("node", &self.node.path())
			.field("command", &self.command.spec().name())
			.field("chain", &self.chain.iter().map(|c| c.spec().name()).collect::<Vec<_>>())
			.field("args", &self.args)
			.finish()
	}
}

impl RegistryTree {
	/// Resolves `tokens` against `node`.
	///
	/// The first token must start with the node's effective prefix; the prefix
	/// may also stand alone as its own token. Returns `None` when nothing
	/// matches, which is ordinary traffic rather than an error.
	pub fn resolve<S: AsRef<str>>(&self, node: &NodeRef, tokens: &[S]) -> Option<Resolved> {
		resolve(node, tokens)
	}
}

/// Free-standing form of [`RegistryTree::resolve`].
pub fn resolve<S: AsRef<str>>(node: &NodeRef, tokens: &[S]) -> Option<Resolved> {
	let prefix = node.effective_prefix()?;
	let (first, rest) = tokens.split_first()?;
	let head = first.as_ref().strip_prefix(prefix.as_str())?;

	let mut words: Vec<&str> = Vec::with_capacity(tokens.len());
	if !head.is_empty() {
		words.push(head);
	}
	words.extend(rest.iter().map(|t| t.as_ref()));

	let resolved = resolve_words(node, &words);
	if resolved.is_none() {
		tracing::trace!(node = %node.path(), "resolve.miss");
	}
	resolved
}

fn resolve_words(node: &NodeRef, words: &[&str]) -> Option<Resolved> {
	let (first, rest) = words.split_first()?;

	if let Some(command) = node.lookup(first) {
		let mut chain = Vec::new();
		let mut current = command;
		let mut consumed = 1;
		while let Some(token) = words.get(consumed) {
			let Some(sub) = select(current.spec().sub_commands(), token).cloned() else {
				break;
			};
			chain.push(std::mem::replace(&mut current, sub));
			consumed += 1;
		}
		return Some(Resolved {
			node: node.clone(),
			command: current,
			chain,
			args: words[consumed..].iter().map(|w| (*w).to_owned()).collect(),
		});
	}

	let segment = normalize_alias(first);
	node.children()
		.into_iter()
		.filter(|child| names_child(child, &segment))
		.find_map(|child| resolve_words(&child, rest))
}

/// Whether a normalized path segment names `child`, either by bare name or as `qualifier:name`.
fn names_child(child: &NodeRef, segment: &str) -> bool {
	let key = child.key();
	normalize_alias(key.name()) == segment || normalize_alias(&key.to_string()) == segment
}
