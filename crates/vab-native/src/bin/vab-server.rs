//! CLI entrypoint for the standalone model server.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use vab_core::{MapProvider, Value};
use vab_native::{ServerConfig, TcpVabServer};

#[derive(Debug, Parser)]
#[command(
    name = "vab-server",
    version,
    about = "Hosts a model tree behind the native wire protocol",
    after_help = "Examples:\n  vab-server                          # empty model on 127.0.0.1:6998\n  vab-server --listen 0.0.0.0:6998    # reachable from the network\n  vab-server --model plant.json       # seed the tree from a JSON file\n\nThe server runs until the process is terminated."
)]
struct Cli {
    /// Server configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen address override (host:port).
    #[arg(long)]
    listen: Option<SocketAddr>,
    /// JSON file seeding the model root.
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let provider = match &cli.model {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| anyhow::anyhow!("cannot read {}: {err}", path.display()))?;
            MapProvider::with_root(Value::from_json_text(&text)?)
        }
        None => MapProvider::new(),
    };

    let mut server = TcpVabServer::init(config, provider)?;
    if let Some(addr) = server.local_addr() {
        info!(%addr, "serving the model tree");
    }
    loop {
        server.tick()?;
    }
}
