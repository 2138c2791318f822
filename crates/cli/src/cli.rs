use std::path::PathBuf;

use clap::Parser;
use herald_registry::QualifiedName;

#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Feed chat lines to a command registry and print the replies")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Registry configuration file (TOML)
	#[arg(long, short = 'c', value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Default command prefix, overriding the configuration
	#[arg(long, short = 'p')]
	pub prefix: Option<String>,

	/// Origin of incoming lines as `qualifier:name`, outermost first
	#[arg(long = "origin", short = 'o', value_name = "QUALIFIER:NAME", value_parser = parse_origin)]
	pub origins: Vec<QualifiedName>,

	/// Read lines from this file instead of stdin
	#[arg(long, short = 's', value_name = "PATH")]
	pub script: Option<PathBuf>,

	/// Verbose logging
	#[arg(long, short = 'v')]
	pub verbose: bool,
}

fn parse_origin(s: &str) -> Result<QualifiedName, String> {
	QualifiedName::parse(s).map_err(|e| e.to_string())
}
