use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::command::CommandSpec;
use crate::test_support::{Origin, Probe, journal, probe};

fn tree() -> RegistryTree {
	RegistryTree::new(RegistryConfig::default())
}

fn key(qualifier: &str, name: &str) -> QualifiedName {
	QualifiedName::new(qualifier, name).unwrap()
}

#[test]
fn get_or_create_builds_lineage_once() {
	let tree = tree();
	let origin = Origin::new("module", "economy").under(Origin::new("client", "bot"));

	let node = tree.get_or_create_node(&origin).unwrap();
	assert_eq!(node.path(), "client:bot/module:economy");
	assert_eq!(node.kind(), NodeKind::Real);

	let again = tree.get_or_create_node(&origin).unwrap();
	assert!(Arc::ptr_eq(&node, &again));
	assert_eq!(tree.root().children().len(), 1);
}

#[test]
fn get_or_create_rejects_blank_origin() {
	let tree = tree();
	let err = tree.get_or_create_node(&Origin::new("module", "")).unwrap_err();
	assert!(matches!(err, RegistryError::InvalidArgument(_)));
	assert!(tree.root().children().is_empty());
}

#[test]
fn get_or_create_promotes_placeholder() {
	let tree = tree();
	let placeholder = tree.get_placeholder("module", "economy").unwrap();
	assert!(placeholder.is_placeholder());

	let node = tree.get_or_create_node(&Origin::new("module", "economy")).unwrap();
	assert_eq!(node.kind(), NodeKind::Real);
	assert!(tree.root().placeholder(node.key()).is_none());
	assert!(placeholder.is_detached());
	assert!(Arc::ptr_eq(&placeholder.current(), &node));
}

#[test]
fn get_placeholder_is_idempotent_and_returns_existing_real_node() {
	let tree = tree();
	let first = tree.get_placeholder("module", "economy").unwrap();
	let second = tree.get_placeholder("module", "economy").unwrap();
	assert!(Arc::ptr_eq(&first, &second));

	let real = tree.get_or_create_node(&Origin::new("module", "music")).unwrap();
	let found = tree.get_placeholder("module", "music").unwrap();
	assert!(Arc::ptr_eq(&real, &found));
}

#[test]
fn promotion_moves_children_and_repoints_parents() {
	let tree = tree();
	let placeholder = tree.get_placeholder("module", "economy").unwrap();
	let shop = tree.register_child(&placeholder, "group", "shop").unwrap();
	let pending = tree.get_placeholder_in(&placeholder, "group", "bank").unwrap();
	pending.set_essential(true);

	let real = tree.promote(&placeholder).unwrap();

	assert_eq!(real.children().len(), 1);
	assert_eq!(real.placeholders().len(), 1);
	assert!(Arc::ptr_eq(&real.child(shop.key()).unwrap(), &shop));
	assert!(Arc::ptr_eq(&shop.parent().unwrap(), &real));
	assert!(Arc::ptr_eq(&pending.parent().unwrap(), &real));
	assert!(pending.is_essential());
	assert_eq!(shop.path(), "module:economy/group:shop");
	assert!(placeholder.children().is_empty());
}

#[test]
fn register_child_conflicts_with_real_sibling() {
	let tree = tree();
	tree.register_child(tree.root(), "module", "economy").unwrap();
	let err = tree.register_child(tree.root(), "module", "economy").unwrap_err();
	assert_eq!(
		err,
		RegistryError::NamingConflict {
			key: "module:economy".to_owned(),
			existing: "module:economy".to_owned(),
		}
	);
}

#[test]
fn register_child_fills_placeholder() {
	let tree = tree();
	let placeholder = tree.get_placeholder("module", "economy").unwrap();
	let node = tree.register_child(tree.root(), "module", "economy").unwrap();
	assert_eq!(node.kind(), NodeKind::Real);
	assert!(Arc::ptr_eq(&placeholder.current(), &node));
}

#[test]
fn same_name_different_qualifier_coexist() {
	let tree = tree();
	tree.register_child(tree.root(), "module", "music").unwrap();
	tree.register_child(tree.root(), "group", "music").unwrap();
	assert_eq!(tree.root().children().len(), 2);
}

#[test]
fn remove_plain_node_deletes_subtree() {
	let tree = tree();
	let log = journal();
	let node = tree.register_child(tree.root(), "module", "music").unwrap();
	let nested = tree.register_child(&node, "group", "playlists").unwrap();
	let cmd = probe("play", &log);
	tree.register_command(&nested, cmd.clone()).unwrap();

	let removal = tree.remove_node(&node).unwrap();

	assert!(matches!(removal, Removal::Deleted));
	assert!(tree.root().children().is_empty());
	assert!(node.is_detached());
	assert!(nested.is_detached());
	assert!(cmd.spec().registry().is_none());
}

#[test]
fn remove_node_with_essential_descendant_demotes() {
	let tree = tree();
	let log = journal();
	let node = tree.register_child(tree.root(), "module", "economy").unwrap();
	let bank = tree.register_child(&node, "group", "bank").unwrap();
	bank.set_essential(true);
	let cmd = probe("balance", &log);
	tree.register_command(&node, cmd.clone()).unwrap();

	let Removal::Demoted(placeholder) = tree.remove_node(&node).unwrap() else {
		panic!("expected demotion");
	};

	assert!(placeholder.is_placeholder());
	assert!(Arc::ptr_eq(&tree.root().placeholder(node.key()).unwrap(), &placeholder));
	assert!(tree.root().child(node.key()).is_none());
	assert!(Arc::ptr_eq(&bank.parent().unwrap(), &placeholder));
	assert!(bank.is_essential());
	assert!(cmd.spec().registry().is_none(), "commands do not survive demotion");
	assert!(placeholder.commands().is_empty());
	assert!(Arc::ptr_eq(&node.current(), &placeholder));
}

#[test]
fn remove_essential_node_demotes_and_repromotes() {
	let tree = tree();
	let origin = Origin::new("module", "economy").essential();
	let node = tree.get_or_create_node(&origin).unwrap();
	tree.register_child(&node, "group", "shop").unwrap();

	assert!(matches!(tree.remove_origin(&origin).unwrap(), Some(Removal::Demoted(_))));

	let back = tree.get_or_create_node(&origin).unwrap();
	assert!(back.is_essential());
	assert_eq!(back.children()[0].path(), "module:economy/group:shop");
}

#[test]
fn remove_node_with_pending_placeholder_demotes() {
	let tree = tree();
	let node = tree.register_child(tree.root(), "module", "economy").unwrap();
	tree.get_placeholder_in(&node, "group", "bank").unwrap();
	assert!(matches!(tree.remove_node(&node).unwrap(), Removal::Demoted(_)));
}

#[test]
fn expired_placeholder_does_not_keep_node() {
	let tree = RegistryTree::new(RegistryConfig {
		placeholder_ttl_secs: Some(0),
		..RegistryConfig::default()
	});
	let node = tree.register_child(tree.root(), "module", "economy").unwrap();
	tree.get_placeholder_in(&node, "group", "bank").unwrap();
	assert!(matches!(tree.remove_node(&node).unwrap(), Removal::Deleted));
}

#[test]
fn placeholder_removal_retains_essential_content() {
	let tree = tree();
	let placeholder = tree.get_placeholder("module", "economy").unwrap();
	assert!(matches!(tree.remove_node(&placeholder).unwrap(), Removal::Deleted));

	let placeholder = tree.get_placeholder("module", "economy").unwrap();
	tree.register_child(&placeholder, "group", "bank").unwrap().set_essential(true);
	assert!(matches!(tree.remove_node(&placeholder).unwrap(), Removal::Retained));
	assert!(tree.root().placeholder(placeholder.key()).is_some());
}

#[test]
fn root_cannot_be_removed_and_stale_handles_are_detached() {
	let tree = tree();
	assert!(matches!(tree.remove_node(tree.root()), Err(RegistryError::InvalidArgument(_))));

	let node = tree.register_child(tree.root(), "module", "economy").unwrap();
	tree.remove_node(&node).unwrap();
	assert!(matches!(tree.remove_node(&node), Err(RegistryError::Detached { .. })));
	assert!(matches!(tree.register_child(&node, "group", "x"), Err(RegistryError::Detached { .. })));
}

#[test]
fn prune_expired_drops_only_unessential_placeholders() {
	let tree = RegistryTree::new(RegistryConfig {
		placeholder_ttl_secs: Some(0),
		..RegistryConfig::default()
	});
	tree.get_placeholder("module", "stale").unwrap();
	let kept = tree.get_placeholder("module", "kept").unwrap();
	kept.set_essential(true);
	let nested_parent = tree.register_child(tree.root(), "client", "bot").unwrap();
	tree.get_placeholder_in(&nested_parent, "module", "old").unwrap();

	assert_eq!(tree.prune_expired(), 2);
	let remaining: Vec<QualifiedName> = tree.root().placeholders().iter().map(|p| p.key().clone()).collect();
	assert_eq!(remaining, vec![key("module", "kept")]);
	assert!(nested_parent.placeholders().is_empty());
}

#[test]
fn prune_without_ttl_is_noop() {
	let tree = tree();
	tree.get_placeholder("module", "economy").unwrap();
	assert_eq!(tree.prune_expired(), 0);
	assert!(!tree.root().is_expired(Some(Duration::ZERO), chrono::Utc::now()));
}

#[test]
fn placeholder_rejects_commands() {
	let tree = tree();
	let log = journal();
	let placeholder = tree.get_placeholder("module", "economy").unwrap();
	let err = tree.register_command(&placeholder, probe("balance", &log)).unwrap_err();
	assert_eq!(
		err,
		RegistryError::UnsupportedOnPlaceholder {
			node: "module:economy".to_owned()
		}
	);
}

#[test]
fn register_sets_back_reference_and_signature() {
	let tree = tree();
	let log = journal();
	let node = tree.get_or_create_node(&Origin::new("module", "economy").under(Origin::new("client", "bot"))).unwrap();
	let cmd = probe("balance", &log);

	assert!(matches!(tree.register_command(&node, cmd.clone()).unwrap(), Registration::Inserted));
	assert!(Arc::ptr_eq(&cmd.spec().registry().unwrap(), &node));
	assert_eq!(cmd.spec().signature().as_deref(), Some("client:bot/module:economy/balance"));
}

#[test]
fn reregistering_same_instance_is_noop() {
	let tree = tree();
	let log = journal();
	let node = tree.register_child(tree.root(), "module", "economy").unwrap();
	let cmd = probe("balance", &log);
	tree.register_command(&node, cmd.clone()).unwrap();
	let before = node.last_changed();

	assert!(matches!(tree.register_command(&node, cmd).unwrap(), Registration::Unchanged));
	assert_eq!(node.commands().len(), 1);
	assert_eq!(node.last_changed(), before);
}

#[test]
fn command_lives_under_one_node() {
	let tree = tree();
	let log = journal();
	let a = tree.register_child(tree.root(), "module", "a").unwrap();
	let b = tree.register_child(tree.root(), "module", "b").unwrap();
	let cmd = probe("shared", &log);
	tree.register_command(&a, cmd.clone()).unwrap();
	assert!(matches!(tree.register_command(&b, cmd), Err(RegistryError::AlreadyRegistered { .. })));
}

#[test]
fn alias_conflict_with_enabled_command_fails_and_keeps_existing() {
	let tree = tree();
	let log = journal();
	let node = tree.root().clone();
	let existing = Probe::new(CommandSpec::builder("ping").alias("p"), &log);
	tree.register_command(&node, existing.clone()).unwrap();

	let incoming = Probe::new(CommandSpec::builder("pong").alias("P"), &log);
	let err = tree.register_command(&node, incoming).unwrap_err();

	assert!(err.is_naming_conflict());
	assert_eq!(
		err,
		RegistryError::NamingConflict {
			key: "p".to_owned(),
			existing: "ping".to_owned(),
		}
	);
	assert_eq!(node.commands().len(), 1);
	assert_eq!(node.lookup("p").unwrap().spec().name(), "ping");
}

#[test]
fn alias_conflict_with_disabled_command_is_allowed() {
	let tree = tree();
	let log = journal();
	let node = tree.root().clone();
	let old = Probe::new(CommandSpec::builder("ping").disabled(), &log);
	tree.register_command(&node, old).unwrap();

	let new = Probe::new(CommandSpec::builder("ping").alias("p"), &log);
	assert!(matches!(tree.register_command(&node, new).unwrap(), Registration::Inserted));
	assert_eq!(node.commands().len(), 2);
}

#[test]
fn overridable_command_is_replaced() {
	let tree = tree();
	let log = journal();
	let node = tree.root().clone();
	let old: CommandRef = Probe::new(CommandSpec::builder("help").overridable(), &log);
	tree.register_command(&node, old.clone()).unwrap();

	let new: CommandRef = Probe::new(CommandSpec::builder("help").alias("h"), &log);
	let Registration::Replaced(displaced) = tree.register_command(&node, new.clone()).unwrap() else {
		panic!("expected replacement");
	};

	assert_eq!(displaced.len(), 1);
	assert!(Arc::ptr_eq(&displaced[0], &old));
	assert!(old.spec().registry().is_none());
	assert!(Arc::ptr_eq(&node.lookup("help").unwrap(), &new));
	assert_eq!(node.commands().len(), 1);
}

#[test]
fn sub_commands_cannot_register_directly() {
	let tree = tree();
	let log = journal();
	let sub = Probe::new(CommandSpec::builder("long").sub_command(), &log);
	assert!(matches!(tree.register_command(tree.root(), sub), Err(RegistryError::InvalidArgument(_))));
}

#[test]
fn unregister_clears_back_reference() {
	let tree = tree();
	let log = journal();
	let cmd = probe("ping", &log);
	tree.register_command(tree.root(), cmd.clone()).unwrap();

	assert!(tree.unregister_command(tree.root(), &cmd));
	assert!(cmd.spec().registry().is_none());
	assert!(tree.root().lookup("ping").is_none());
	assert!(!tree.unregister_command(tree.root(), &cmd));
}

#[test]
fn mutations_update_last_changed_except_on_placeholders() {
	let tree = tree();
	let log = journal();
	let node = tree.register_child(tree.root(), "module", "economy").unwrap();
	let created = node.last_changed().unwrap();
	tree.register_command(&node, probe("balance", &log)).unwrap();
	assert!(node.last_changed().unwrap() >= created);

	let placeholder = tree.get_placeholder("module", "later").unwrap();
	placeholder.set_essential(true);
	assert_eq!(placeholder.last_changed(), None);
	assert!(placeholder.created_at().is_some());
}

#[test]
fn find_walks_real_and_placeholder_nodes() {
	let tree = tree();
	let client = tree.register_child(tree.root(), "client", "bot").unwrap();
	tree.get_placeholder_in(&client, "module", "economy").unwrap();

	let found = tree.find(&[key("client", "bot"), key("module", "economy")]).unwrap();
	assert!(found.is_placeholder());
	assert!(tree.find(&[key("client", "other")]).is_none());
	assert!(Arc::ptr_eq(&tree.find(&[]).unwrap(), tree.root()));
}

#[test]
fn prefix_falls_back_to_ancestors() {
	let tree = tree();
	let client = tree.register_child(tree.root(), "client", "bot").unwrap();
	let module = tree.register_child(&client, "module", "economy").unwrap();
	assert_eq!(module.effective_prefix().as_deref(), Some("!"));

	client.set_prefix(Some("?".to_owned())).unwrap();
	assert_eq!(module.effective_prefix().as_deref(), Some("?"));
	assert!(matches!(module.set_prefix(Some(" ".to_owned())), Err(RegistryError::InvalidArgument(_))));
}

#[test]
fn invalid_origin_prefix_is_rejected_before_creating_anything() {
	let tree = tree();
	let origin = Origin::new("channel", "ops").with_prefix("a b").under(Origin::new("client", "bot"));

	let err = tree.get_or_create_node(&origin).unwrap_err();
	assert!(matches!(err, RegistryError::InvalidArgument(msg) if msg.contains("channel:ops")));
	assert!(tree.root().children().is_empty());
}

#[test]
fn invalid_origin_prefix_leaves_placeholder_unpromoted() {
	let tree = tree();
	let placeholder = tree.get_placeholder("module", "economy").unwrap();

	let err = tree.get_or_create_node(&Origin::new("module", "economy").with_prefix("")).unwrap_err();
	assert!(matches!(err, RegistryError::InvalidArgument(_)));
	assert!(!placeholder.is_detached());
	assert!(tree.root().child(placeholder.key()).is_none());
	assert!(Arc::ptr_eq(&tree.root().placeholder(placeholder.key()).unwrap(), &placeholder));
}

#[test]
fn valid_origin_prefix_is_applied_on_creation_and_promotion() {
	let tree = tree();
	let created = tree.get_or_create_node(&Origin::new("client", "bot").with_prefix("$")).unwrap();
	assert_eq!(created.prefix().as_deref(), Some("$"));

	tree.get_placeholder("module", "economy").unwrap();
	let promoted = tree.get_or_create_node(&Origin::new("module", "economy").with_prefix("%")).unwrap();
	assert_eq!(promoted.prefix().as_deref(), Some("%"));
}

#[test]
fn get_or_create_through_demoted_parent_promotes_it_again() {
	let tree = tree();
	let origin = Origin::new("channel", "ops").under(Origin::new("client", "bot").essential());
	let first = tree.get_or_create_node(&origin).unwrap();
	let client = first.parent().unwrap();

	let Removal::Demoted(placeholder) = tree.remove_node(&client).unwrap() else {
		panic!("essential node should be demoted");
	};
	assert!(client.is_detached());

	let again = tree.get_or_create_node(&origin).unwrap();
	assert!(Arc::ptr_eq(&again, &first));
	let parent = again.parent().unwrap();
	assert!(!parent.is_detached());
	assert!(!parent.is_placeholder());
	assert!(Arc::ptr_eq(&placeholder.current(), &parent));
	assert!(Arc::ptr_eq(&parent.parent().unwrap(), tree.root()));
}
