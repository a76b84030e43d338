use crate::framework::{MessageRegistry, ProcessInfo, World};
use crate::runtime::config::{ConfigError, MeshConfig};
use crate::transport::{
    DeliveryError, HttpSender, MailboxServer, Network, ProcessRegistry, ReqwestCourier,
    StaticRegistry,
};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Hook run on the local [`ProcessInfo`] before the node announces itself, typically to
/// advertise capabilities such as `supportsCalculators`.
pub type MetadataInit = Box<dyn FnOnce(&mut ProcessInfo) + Send>;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("mailbox server: {0}")]
    Server(#[from] hyper::Error),
    #[error("http client: {0}")]
    Client(#[from] DeliveryError),
    #[error("dispatcher task failed: {0}")]
    Dispatcher(#[from] tokio::task::JoinError),
}

/// A running process of the mesh.
///
/// `Node` wires everything one process needs:
/// - **World**: the local scheduler and its dispatcher task
/// - **Discovery**: a [`StaticRegistry`] seeded with the configured peers, viewed through a [`Network`]
/// - **Outbound**: an [`HttpSender`] posting to peer mailboxes
/// - **Inbound**: a [`MailboxServer`] feeding the World
///
/// # Example
///
/// ```ignore
/// let node = Node::start(MeshConfig::default(), registry).await?;
/// node.world().spawn_with(|_| Greeter, SpawnOptions::well_known(1))?;
///
/// node.shutdown().await?;
/// ```
pub struct Node {
    world: World,
    registry: Arc<StaticRegistry>,
    network: Arc<Network>,
    server: MailboxServer,
    dispatcher: JoinHandle<()>,
}

impl Node {
    pub async fn start(config: MeshConfig, messages: MessageRegistry) -> Result<Self, NodeError> {
        Self::start_with_metadata(config, messages, Box::new(|_| {})).await
    }

    /// Like [`Node::start`], running `init` on the local process description first.
    pub async fn start_with_metadata(
        config: MeshConfig,
        messages: MessageRegistry,
        init: MetadataInit,
    ) -> Result<Self, NodeError> {
        // =====================================================================
        // 1. Identity
        // =====================================================================

        // The port is needed in the process url before anything else is built.
        let addr = config.process.listen;
        let listener =
            TcpListener::bind(addr).map_err(|source| NodeError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| NodeError::Bind { addr, source })?;

        let mut process = config
            .process_info()?
            .with_url(format!("http://{}", local_addr));
        init(&mut process);

        // =====================================================================
        // 2. Discovery
        // =====================================================================

        let registry = Arc::new(StaticRegistry::from_peers(config.peer_infos()?));
        registry.insert(process.clone());
        let network = Arc::new(Network::new(
            process.clone(),
            config.process.applications.clone(),
            Arc::clone(&registry) as Arc<dyn ProcessRegistry>,
        ));

        // =====================================================================
        // 3. World and transports
        // =====================================================================

        let courier = Arc::new(ReqwestCourier::new(config.transport.request_timeout())?);
        let sender = HttpSender::new(Arc::clone(&network), courier, config.transport.clone());
        let (world, dispatcher) = World::new(process, config.world.clone(), Arc::new(sender));
        let dispatcher = tokio::spawn(dispatcher.run());

        let server = MailboxServer::from_listener(listener, world.clone(), Arc::new(messages))?;

        info!(
            process = %world.process().id_string(),
            app = world.process().app_name(),
            url = %server.url(),
            peers = network.processes().len(),
            "Node started"
        );

        Ok(Self {
            world,
            registry,
            network,
            server,
            dispatcher,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// The discovery table; peers can be added or removed while running.
    pub fn registry(&self) -> &Arc<StaticRegistry> {
        &self.registry
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Stops the World, then waits for the dispatcher and the mailbox server.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        info!(process = %self.world.process().id_string(), "Shutting down node...");
        self.world.shutdown();

        if let Err(e) = self.dispatcher.await {
            error!(error = %e, "Dispatcher task failed");
            return Err(e.into());
        }
        self.server.join().await;

        info!("Node shutdown complete.");
        Ok(())
    }
}
