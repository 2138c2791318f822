use pretty_assertions::assert_eq;

use super::*;
use crate::test_support::{Probe, journal, probe};

#[test]
fn aliases_include_name_and_are_normalized_and_sorted() {
	let spec = CommandSpec::builder("Ping").aliases(["P", "pong", "ping"]).build().unwrap();
	let aliases: Vec<&str> = spec.aliases().iter().map(String::as_str).collect();
	assert_eq!(aliases, vec!["p", "ping", "pong"]);
	assert!(spec.matches("PONG"));
}

#[test]
fn blank_name_is_rejected() {
	assert!(matches!(CommandSpec::builder("  ").build(), Err(RegistryError::InvalidArgument(_))));
}

#[test]
fn alias_with_whitespace_is_rejected() {
	let err = CommandSpec::builder("ping").alias("pi ng").build().unwrap_err();
	assert!(matches!(err, RegistryError::InvalidArgument(msg) if msg.contains("pi ng")));
}

#[test]
fn child_must_be_marked_as_sub_command() {
	let log = journal();
	let loose = probe("long", &log);
	let err = CommandSpec::builder("ping").child(loose).build().unwrap_err();
	assert!(matches!(err, RegistryError::InvalidArgument(_)));
}

#[test]
fn enabled_flag_toggles() {
	let spec = CommandSpec::builder("ping").disabled().build().unwrap();
	assert!(!spec.is_enabled());
	spec.set_enabled(true);
	assert!(spec.is_enabled());
}

#[test]
fn select_prefers_lowest_priority_then_declaration_order() {
	let log = journal();
	let late_low: CommandRef = Probe::new(CommandSpec::builder("b").alias("x").priority(0).sub_command(), &log);
	let early_high: CommandRef = Probe::new(CommandSpec::builder("a").alias("x").priority(1).sub_command(), &log);
	let tie: CommandRef = Probe::new(CommandSpec::builder("c").alias("x").priority(0).sub_command(), &log);
	let subs = vec![early_high, late_low, tie];

	assert_eq!(select(&subs, "X").map(|c| c.spec().name()), Some("b"));

	subs[1].spec().set_enabled(false);
	assert_eq!(select(&subs, "x").map(|c| c.spec().name()), Some("c"));
}

#[test]
fn sub_commands_sorted_by_name() {
	let log = journal();
	let parent = CommandSpec::builder("root")
		.child(Probe::new(CommandSpec::builder("zeta").sub_command(), &log))
		.child(Probe::new(CommandSpec::builder("alpha").sub_command(), &log))
		.build()
		.unwrap();
	let names: Vec<String> = parent.sub_commands_sorted().iter().map(|c| c.spec().name().to_owned()).collect();
	assert_eq!(names, vec!["alpha", "zeta"]);
}
