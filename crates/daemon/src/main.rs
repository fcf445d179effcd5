// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Daemon, Del, Down, Init, Ls, Up, Version};

command_enum! {
    (Init, Init),
    #[command(visible_aliases = ["serv", "serve"])]
    (Daemon, Daemon),
    #[command(visible_alias = "upload")]
    (Up, Up),
    #[command(visible_alias = "download")]
    (Down, Down),
    #[command(visible_aliases = ["delete", "rm"])]
    (Del, Del),
    #[command(visible_alias = "list")]
    (Ls, Ls),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Resolve remote URL: explicit flag > config port > default
    let remote = match cli::op::resolve_remote(args.remote, args.config_path.clone()) {
        Ok(remote) => remote,
        Err(e) => {
            eprintln!("Error: invalid remote URL: {}", e);
            std::process::exit(1);
        }
    };
    let credentials = cli::op::resolve_credentials(args.user, args.pass, args.config_path.clone());

    // Build context - always has API client initialized
    let ctx = match cli::op::OpContext::new(remote, args.config_path, credentials) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
