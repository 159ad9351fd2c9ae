#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mcpp_core::load_config;
use mcpp_protocol::ServerConfig;
use mcpp_protocol::tool::Tool;
use mcpp_server::AppState;
use mcpp_server::EchoToolExecutor;
use mcpp_server::router;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mcpp-server", about = "JSON-RPC over HTTP dispatcher for the Model Context Privacy Protocol")]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:4455")]
    listen: SocketAddr,

    /// Path to a TOML server configuration file. Missing fields fall back
    /// to their defaults; an absent file falls back to `ServerConfig::default()`.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    // Tool declarations are expected to come from the embedding host; this
    // binary only demonstrates the dispatcher wired to a no-op executor.
    let tools: Vec<Tool> = Vec::new();
    let state = Arc::new(AppState::new(config, tools, Arc::new(EchoToolExecutor)));

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(addr = %args.listen, "mcpp-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
