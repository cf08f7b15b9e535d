use clap::Parser;
use std::path::PathBuf;

/// Event notification server
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
	/// Path to the eventing.toml configuration file
	#[arg(short, long, default_value = "eventing.toml")]
	pub config: PathBuf,
	/// Override the socket to bind to
	#[arg(short, long)]
	pub bind_to: Option<std::net::SocketAddr>,
}
