//! Herald console.
//!
//! Reads chat lines from stdin or a script, routes each through the command
//! registry as if posted from the configured origin, and prints replies.

mod cli;
mod commands;
mod session;

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use cli::Cli;
use herald_registry::{CommandRegistry, RegistryConfig};
use session::{Origin, Session};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	setup_tracing(cli.verbose);

	let mut config = match &cli.config {
		Some(path) => RegistryConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => RegistryConfig::default(),
	};
	if let Some(prefix) = cli.prefix {
		config.prefix = prefix;
	}
	config.validate()?;
	info!(prefix = %config.prefix, "starting herald");

	let registry = Arc::new(CommandRegistry::new(config));
	let origin = Arc::new(Origin::from_keys(cli.origins)?);
	let node = registry.tree().get_or_create_node(&*origin)?;
	commands::install(registry.tree(), &node)?;
	info!(node = %node.path(), "cli.origin.ready");

	let input: Box<dyn AsyncBufRead + Unpin> = match &cli.script {
		Some(path) => {
			let file = tokio::fs::File::open(path).await.with_context(|| format!("opening {}", path.display()))?;
			Box::new(BufReader::new(file))
		}
		None => Box::new(BufReader::new(tokio::io::stdin())),
	};

	let handled = Session::new(registry, origin).run(input).await?;
	info!(lines = handled, "input exhausted");
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("HERALD_LOG").unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("herald=debug,herald_registry=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
