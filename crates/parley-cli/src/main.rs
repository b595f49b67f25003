//! CLI entry point - the composition root.
//!
//! Command dispatch routes to handlers, which get their backends from the
//! [`CliContext`](parley_cli::CliContext) built by bootstrap.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use parley_cli::{Cli, Commands, bootstrap, error::exit_code_for, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "parley=debug,parley_voice=debug,parley_cli=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(ref command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(&cli)?;

    match command {
        Commands::Say { text, voice } => {
            handlers::say::execute(&ctx, &text.join(" "), voice.as_deref()).await?;
        }
        Commands::Listen { voice } => {
            handlers::listen::execute(&ctx, voice.as_deref()).await?;
        }
        Commands::Voices => {
            handlers::voices::execute(&ctx).await?;
        }
        Commands::Health => {
            handlers::health::execute(&ctx).await?;
        }
        Commands::Interrupt => {
            handlers::interrupt::execute(&ctx).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables before parsing so clap `env` defaults see them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}
