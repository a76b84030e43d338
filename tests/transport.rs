use actor_mesh::actors::{
    self, Calculator, Double, Doubled, Greet, Greeter, CALCULATOR, GREETER,
};
use actor_mesh::framework::mock::MemoryNetwork;
use actor_mesh::framework::{
    ActorAddress, MessageRegistry, ProcessInfo, RuntimeError, SpawnOptions, World, WorldConfig,
};
use actor_mesh::runtime::{MeshConfig, Node, PeerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn messages() -> MessageRegistry {
    let mut registry = MessageRegistry::new();
    actors::register_messages(&mut registry);
    registry
}

fn memory_world(network: &Arc<MemoryNetwork>, id: u64) -> World {
    let (world, _) = World::start(
        ProcessInfo::new(id, "test"),
        WorldConfig::default(),
        network.clone(),
    );
    network.join(&world);
    world
}

#[tokio::test]
async fn queries_cross_the_memory_network() {
    let network = MemoryNetwork::new(Arc::new(messages()));
    let a = memory_world(&network, 0xa);
    let b = memory_world(&network, 0xb);
    b.spawn_with(|_| Calculator::new(), SpawnOptions::well_known(CALCULATOR))
        .unwrap();

    let reply = timeout(
        Duration::from_secs(1),
        a.query(ActorAddress::new(0xb, CALCULATOR), Double { value: 21 }),
    )
    .await
    .unwrap();
    assert_eq!(reply.unwrap(), Doubled { value: 42 });

    let missing = ActorAddress::new(0xb, GREETER);
    let reply = timeout(Duration::from_secs(1), a.query(missing, Double { value: 1 }))
        .await
        .unwrap();
    assert!(matches!(reply, Err(RuntimeError::ActorNotFound(m)) if m == missing));

    let nowhere = ActorAddress::new(0xc, CALCULATOR);
    let reply = timeout(Duration::from_secs(1), a.query(nowhere, Double { value: 1 }))
        .await
        .unwrap();
    assert!(matches!(reply, Err(RuntimeError::ActorNotFound(m)) if m == nowhere));

    network.leave(0xb);
    let gone = ActorAddress::new(0xb, CALCULATOR);
    let reply = timeout(Duration::from_secs(1), a.query(gone, Double { value: 1 }))
        .await
        .unwrap();
    assert!(matches!(reply, Err(RuntimeError::ActorNotFound(m)) if m == gone));
}

fn node_config(id: &str) -> MeshConfig {
    let mut config = MeshConfig::default();
    config.process.id = Some(id.to_string());
    config.process.app_name = "demo".to_string();
    config.transport.resolve_attempts = 2;
    config.transport.resolve_retry_delay_ms = 50;
    config
}

async fn start_pair() -> (Node, Node) {
    let b = Node::start(node_config("b"), messages()).await.unwrap();
    b.world()
        .spawn_with(|_| Greeter, SpawnOptions::well_known(GREETER))
        .unwrap();
    b.world()
        .spawn_with(|_| Calculator::new(), SpawnOptions::well_known(CALCULATOR))
        .unwrap();

    let mut config = node_config("a");
    config.peers.push(PeerConfig {
        id: "b".to_string(),
        app_name: None,
        url: b.url(),
        metadata: Default::default(),
    });
    let a = Node::start(config, messages()).await.unwrap();
    b.registry().insert(a.world().process().clone());
    (a, b)
}

#[tokio::test]
async fn nodes_talk_over_http() {
    let (a, b) = start_pair().await;
    assert_eq!(a.network().processes().len(), 1);

    let greeting = timeout(
        Duration::from_secs(5),
        a.world().query(
            ActorAddress::new(0xb, GREETER),
            Greet {
                name: "Ada".to_string(),
            },
        ),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(greeting.text, "Hello, Ada! (from process 000000000000000b)");

    let missing = ActorAddress::new(0xb, 77);
    let reply = timeout(Duration::from_secs(5), a.world().query(missing, Double { value: 1 }))
        .await
        .unwrap();
    assert!(matches!(reply, Err(RuntimeError::ActorNotFound(m)) if m == missing));

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn blocking_queries_work_outside_the_runtime() {
    let (a, b) = start_pair().await;
    let world = a.world().clone();

    let (doubled, unknown) = tokio::task::spawn_blocking(move || {
        let doubled = world.query_blocking(ActorAddress::new(0xb, CALCULATOR), Double { value: 8 });
        let unknown = world.query_blocking(ActorAddress::new(0xdead, CALCULATOR), Double { value: 8 });
        (doubled, unknown)
    })
    .await
    .unwrap();

    assert_eq!(doubled.unwrap(), Doubled { value: 16 });
    assert!(matches!(unknown, Err(RuntimeError::ActorNotFound(_))));

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn mailbox_rejects_bad_posts() {
    let node = Node::start(node_config("c"), messages()).await.unwrap();
    let client = reqwest::Client::new();
    let mailbox = format!("{}/mailbox", node.url());

    let wrong_process = serde_json::json!({
        "receiver": ActorAddress::new(0xd, GREETER),
        "requestId": 0,
        "body": { "type": "demo.Greet", "data": { "name": "Ada" } },
        "sentAt": "2024-01-01T00:00:00Z",
    });
    let response = client.post(&mailbox).json(&wrong_process).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let unknown_type = serde_json::json!({
        "receiver": ActorAddress::new(0xc, GREETER),
        "body": { "type": "demo.Nope", "data": {} },
        "sentAt": "2024-01-01T00:00:00Z",
    });
    let response = client.post(&mailbox).json(&unknown_type).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client.post(&mailbox).body("not json").send().await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let accepted = serde_json::json!({
        "receiver": ActorAddress::new(0xc, GREETER),
        "body": { "type": "demo.Greet", "data": { "name": "Ada" } },
        "sentAt": "2024-01-01T00:00:00Z",
    });
    let response = client.post(&mailbox).json(&accepted).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client.get(&mailbox).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 405);

    let response = client
        .post(format!("{}/elsewhere", node.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    node.shutdown().await.unwrap();
}
