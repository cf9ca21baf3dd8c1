mod commands;
mod http;
mod terminal;

use commands::{CommandLine, Commands, allocate, inventory, scan, serve};
use terminal::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let CommandLine {
        config: cfg,
        command,
    } = CommandLine::parse_args();

    logging::init_logging();

    match command {
        Commands::Serve => serve::serve(&cfg).await,
        Commands::Scan => scan::scan(&cfg).await,
        Commands::Reserve { segment } => allocate::reserve(&cfg, &segment).await,
        Commands::Release { address } => allocate::release(&cfg, &address).await,
        Commands::Inventory { segment } => inventory::inventory(&cfg, segment).await,
    }
}
