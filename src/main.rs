//! # mesh-node
//!
//! Runs one process of the mesh hosting the demo actors, until Ctrl-C.
//!
//! ```bash
//! mesh-node --config node.toml
//! mesh-node --listen 127.0.0.1:8080 --id a1
//! ```

use actor_mesh::actors::{self, Calculator, Greeter, CALCULATOR, GREETER};
use actor_mesh::framework::{MessageRegistry, SpawnOptions};
use actor_mesh::runtime::{setup_tracing, MeshConfig, Node};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mesh-node", about = "Runs one process of an actor mesh")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address of the mailbox endpoint, overriding the configuration
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Hex process id, overriding the configuration
    #[arg(long)]
    id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MeshConfig::load(path)?,
        None => MeshConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.process.listen = listen;
    }
    if let Some(id) = args.id {
        config.process.id = Some(id);
    }

    let mut messages = MessageRegistry::new();
    actors::register_messages(&mut messages);

    let node = Node::start_with_metadata(
        config,
        messages,
        Box::new(|process| {
            process
                .metadata_mut()
                .insert("supportsCalculators".to_string(), "true".to_string());
        }),
    )
    .await?;

    let world = node.world();
    let greeter = world.spawn_with(|_| Greeter, SpawnOptions::well_known(GREETER))?;
    let calculator = world.spawn_with(|_| Calculator::new(), SpawnOptions::well_known(CALCULATOR))?;
    info!(%greeter, %calculator, url = %node.url(), "Demo actors ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl-C");
    }

    node.shutdown().await?;
    Ok(())
}
