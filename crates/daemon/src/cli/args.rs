pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "void")]
#[command(about = "Share files under short, unguessable identifiers")]
pub struct Args {
    /// Server to talk to (defaults to localhost on the configured port)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the void config directory (defaults to ~/.void)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Basic auth username for privileged operations
    #[arg(long, global = true, env = "VOID_USER")]
    pub user: Option<String>,

    /// Basic auth password for privileged operations
    #[arg(long, global = true, env = "VOID_PASS", hide_env_values = true)]
    pub pass: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
