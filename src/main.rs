use clap::{Parser, Subcommand};
use nse_livefeed::config::Config;
use nse_livefeed::feeds::FeedKind;
use nse_livefeed::state::AppState;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nse-livefeed", version, about = "NSE live market data feed and query API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the query API
    Serve,
    /// Run one feed's polling loop
    Ingest {
        #[arg(value_enum)]
        feed: FeedKind,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Run every feed and the query API in one process
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    nse_livefeed::init_tracing();

    let config = Config::from_env()?;
    let state = AppState::new(config)?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cli.command {
        Command::Serve => {
            state.api_server().serve(state.config.listen_addr, cancel).await?;
        }
        Command::Ingest { feed, cycles } => {
            let mut poller = state.poller(feed)?;
            if let Some(cycles) = cycles {
                poller = poller.with_max_cycles(cycles);
            }
            poller.run(cancel).await;
        }
        Command::Run => {
            let mut handles = Vec::new();
            for kind in [FeedKind::Equities, FeedKind::Indices, FeedKind::OptionChain] {
                handles.push(state.poller(kind)?.spawn(cancel.clone()));
            }

            let served = state.api_server().serve(state.config.listen_addr, cancel.clone()).await;
            // a server that fails to start takes the feeds down with it
            cancel.cancel();

            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Feed task panicked: {}", e);
                }
            }
            served?;
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Ctrl-C received, stopping...");
        cancel.cancel();
    });
}
