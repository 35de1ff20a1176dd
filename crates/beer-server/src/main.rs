use clap::Parser;
use tracing_subscriber::EnvFilter;

use beer_server::{Cli, Lobby, ServerConfig, Shutdown};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match ServerConfig::resolve(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("beer-server: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config);

    if config.key.is_some() {
        tracing::info!("AES-CTR payload encryption enabled");
    }

    let lobby = match Lobby::bind(config).await {
        Ok(lobby) => lobby,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };

    match lobby.run().await {
        Ok(Shutdown::Terminated) => {}
        Ok(Shutdown::Interrupted) => std::process::exit(130),
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `--debug` and `-q` pick the
/// level.
fn init_logging(config: &ServerConfig) {
    let fallback = if config.silent {
        "error"
    } else if config.debug {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
