//! CLI entry point - the composition root.

use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use chatgate_cli::handlers::{self, ask::AskArgs};
use chatgate_cli::{Cli, Commands, gateway_config, init_logging};
use chatgate_hf::ChatOrchestrator;
use chatgate_proxy::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so clap's env fallbacks see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = gateway_config(&cli.gateway);
    let mut stdout = std::io::stdout();

    match command {
        Commands::Serve {
            bind,
            api_key,
            keep_alive,
        } => {
            let server = ServerConfig::new()
                .with_bind_addr(bind)
                .with_api_key(api_key)
                .with_keep_alive(Duration::from_secs(keep_alive));
            let orchestrator =
                ChatOrchestrator::new(config).context("Failed to build the gateway")?;
            handlers::serve::execute(orchestrator, server).await?;
        }
        Commands::Ask {
            question,
            model,
            system,
            max_tokens,
            no_stream,
        } => {
            let orchestrator =
                ChatOrchestrator::new(config).context("Failed to build the gateway")?;
            let args = AskArgs {
                question,
                model,
                system,
                max_tokens,
                stream: !no_stream,
            };
            handlers::ask::execute(&orchestrator, args, &mut stdout).await?;
        }
        Commands::Models => {
            handlers::models::execute(config.models(), &mut stdout)?;
        }
        Commands::Prompt {
            question,
            model,
            system,
        } => {
            let orchestrator =
                ChatOrchestrator::new(config).context("Failed to build the gateway")?;
            handlers::prompt::execute(
                &orchestrator,
                model.as_deref(),
                system,
                question,
                &mut stdout,
            )?;
        }
    }

    Ok(())
}
