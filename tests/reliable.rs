use actor_mesh::actors::{Calculate, CalculationDone, Calculator, GetStats};
use actor_mesh::framework::mock::{Probe, ProbeLog};
use actor_mesh::framework::{
    Actor, ActorAddress, ActorError, Context, Envelope, Message, Notification, ProcessInfo,
    RuntimeError, World, WorldConfig,
};
use actor_mesh::reliable::AckRetryer;
use actor_mesh::transport::Unroutable;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

fn world() -> World {
    World::start(
        ProcessInfo::new(0xb2, "test"),
        WorldConfig::default(),
        Arc::new(Unroutable),
    )
    .0
}

#[derive(Clone, Default)]
struct Outcomes {
    done: Arc<Mutex<Vec<CalculationDone>>>,
    duplicate_rejected: Arc<Mutex<bool>>,
}

/// Sends one `Calculate` through an [`AckRetryer`] when spawned.
struct Requester {
    retryer: AckRetryer,
    target: ActorAddress,
    calculate: Calculate,
    outcomes: Outcomes,
}

impl Requester {
    fn new(target: ActorAddress, calculate: Calculate, outcomes: Outcomes) -> Self {
        Self {
            retryer: AckRetryer::constant_delay(Duration::from_millis(100)).with_max_retries(3),
            target,
            calculate,
            outcomes,
        }
    }
}

impl Actor for Requester {
    fn spawned(&mut self, ctx: &mut Context<'_>) {
        let sent = self.retryer.send(ctx, self.target, self.calculate.clone());
        assert!(sent.is_ok());

        let again = self.retryer.send(ctx, self.target, self.calculate.clone());
        *self.outcomes.duplicate_rejected.lock() =
            matches!(again, Err(RuntimeError::AlreadyPending(id)) if id == self.calculate.ack_id);
    }

    fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
        if self.retryer.process(ctx, envelope) {
            return Ok(());
        }
        if let Some(done) = envelope.message::<CalculationDone>() {
            self.outcomes.done.lock().push(done.clone());
        }
        Ok(())
    }
}

fn calculate(value: i64) -> Calculate {
    Calculate {
        ack_id: Uuid::new_v4(),
        value,
    }
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_message_is_retried_until_the_limit() {
    let world = world();
    let log = ProbeLog::default();
    let probe = world.spawn(|_| Probe::new(log.clone())).unwrap();
    let message = calculate(3);
    let outcomes = Outcomes::default();
    world
        .spawn(|_| Requester::new(probe, message.clone(), outcomes.clone()))
        .unwrap();

    sleep(Duration::from_secs(2)).await;
    let received = log.messages::<Calculate>();
    assert_eq!(received.len(), 4, "one send and three retries");
    assert!(received.iter().all(|m| *m == message));
    assert!(*outcomes.duplicate_rejected.lock());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(log.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn acknowledgment_stops_the_retries() {
    let world = world();
    let calculator = world.spawn(|_| Calculator::new()).unwrap();
    let message = calculate(7);
    let outcomes = Outcomes::default();
    world
        .spawn(|_| Requester::new(calculator, message.clone(), outcomes.clone()))
        .unwrap();

    sleep(Duration::from_secs(2)).await;
    assert_eq!(
        *outcomes.done.lock(),
        vec![CalculationDone {
            ack_id: message.ack_id,
            result: 49
        }]
    );
    let stats = world.query(calculator, GetStats).await.unwrap();
    assert_eq!(stats.computed, 1);
}

/// Skips the first attempt, then targets the calculator.
struct LateResolver {
    retryer: AckRetryer,
    calculator: ActorAddress,
    outcomes: Outcomes,
}

impl Actor for LateResolver {
    fn spawned(&mut self, ctx: &mut Context<'_>) {
        let calculator = self.calculator;
        let result = self.retryer.send_with(
            ctx,
            move |retry_count| (retry_count > 1).then_some(calculator),
            calculate(5),
        );
        assert!(result.is_ok());
    }

    fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
        if self.retryer.process(ctx, envelope) {
            return Ok(());
        }
        if let Some(done) = envelope.message::<CalculationDone>() {
            self.outcomes.done.lock().push(done.clone());
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn resolver_may_skip_attempts() {
    let world = world();
    let calculator = world.spawn(|_| Calculator::new()).unwrap();
    let outcomes = Outcomes::default();
    world
        .spawn(|_| LateResolver {
            retryer: AckRetryer::constant_delay(Duration::from_millis(100)),
            calculator,
            outcomes: outcomes.clone(),
        })
        .unwrap();

    sleep(Duration::from_millis(50)).await;
    assert!(outcomes.done.lock().is_empty());

    sleep(Duration::from_secs(2)).await;
    let done = outcomes.done.lock().clone();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].result, 25);
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Fail;

impl Message for Fail {
    const TYPE: &'static str = "test.Fail";
}

impl Notification for Fail {}

/// Keeps a retry chain going while failing on every `Fail`.
struct Stubborn {
    retryer: AckRetryer,
    target: ActorAddress,
}

impl Actor for Stubborn {
    fn spawned(&mut self, ctx: &mut Context<'_>) {
        assert!(self.retryer.send(ctx, self.target, calculate(2)).is_ok());
    }

    fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
        if self.retryer.process(ctx, envelope) {
            return Ok(());
        }
        if envelope.message::<Fail>().is_some() {
            return Err("told to fail".into());
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn retries_survive_a_supervised_failure() {
    let world = world();
    let log = ProbeLog::default();
    let probe = world.spawn(|_| Probe::new(log.clone())).unwrap();
    let stubborn = world
        .spawn(|_| Stubborn {
            retryer: AckRetryer::constant_delay(Duration::from_millis(100)).with_max_retries(5),
            target: probe,
        })
        .unwrap();
    world.send(stubborn, Fail);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(log.messages::<Calculate>().len(), 6);
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Forward {
    calculate: Calculate,
}

impl Message for Forward {
    const TYPE: &'static str = "test.Forward";
}

impl Notification for Forward {}

/// Forwards `Calculate`s to the calculator as if they were retries of its own.
struct Relay {
    calculator: ActorAddress,
    outcomes: Outcomes,
}

impl Actor for Relay {
    fn process(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<(), ActorError> {
        if let Some(forward) = envelope.message::<Forward>() {
            ctx.send(self.calculator, forward.calculate.clone());
        }
        if let Some(done) = envelope.message::<CalculationDone>() {
            self.outcomes.done.lock().push(done.clone());
        }
        Ok(())
    }
}

#[tokio::test]
async fn duplicates_get_the_recorded_answer() {
    let world = world();
    let calculator = world.spawn(|_| Calculator::new()).unwrap();
    let outcomes = Outcomes::default();
    let relay = world
        .spawn(|_| Relay {
            calculator,
            outcomes: outcomes.clone(),
        })
        .unwrap();

    let first = calculate(3);
    let duplicate = Calculate {
        value: 4,
        ..first.clone()
    };
    world.send(relay, Forward { calculate: first });
    world.send(relay, Forward { calculate: duplicate });

    tokio::time::timeout(Duration::from_secs(1), async {
        while outcomes.done.lock().len() < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let results: Vec<i64> = outcomes.done.lock().iter().map(|d| d.result).collect();
    assert_eq!(results, vec![9, 9]);
    let stats = world.query(calculator, GetStats).await.unwrap();
    assert_eq!(stats.computed, 1);
}
